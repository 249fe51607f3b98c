//! Message history merging
//!
//! Messages reach the UI on two independent paths with no cross-ordering
//! guarantee: historical lists (REST fetch or the `thread_joined` snapshot)
//! and real-time `new_message` pushes. Merging deduplicates by message id
//! and re-sorts by timestamp so the result is stable regardless of which
//! path won the race. When both paths carry the same id the later source
//! wins, picking up server-side updates such as the read flag.

use std::collections::HashMap;

use crate::types::{Message, MessageId};

/// Merge a history snapshot with messages received out-of-band.
///
/// Returns one sequence deduplicated by id and ordered by
/// `(timestamp, id)`; entries from `pushed` replace same-id entries from
/// `history`.
pub fn merge_messages(history: Vec<Message>, pushed: Vec<Message>) -> Vec<Message> {
    let mut by_id: HashMap<MessageId, Message> =
        HashMap::with_capacity(history.len() + pushed.len());
    for message in history.into_iter().chain(pushed) {
        by_id.insert(message.id, message);
    }

    let mut merged: Vec<Message> = by_id.into_values().collect();
    merged.sort_by_key(|m| (m.timestamp, m.id));
    merged
}

/// Insert a single pushed message into an ordered list.
///
/// Returns `false` without modifying the list when the id is already
/// present, so callers can ignore echo deliveries.
pub fn insert_message(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    let at = messages
        .partition_point(|m| (m.timestamp, m.id) <= (message.timestamp, message.id));
    messages.insert(at, message);
    true
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
