//! Receiver-side typing indicator bookkeeping
//!
//! Typing indicators are ephemeral: the server confirms nothing, so every
//! indicator expires locally after a fixed TTL unless refreshed. The
//! tracker takes the current instant as a parameter, which keeps expiry
//! deterministic under test.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::ThreadId;

/// Tracks which users are currently typing in which thread
#[derive(Debug)]
pub struct TypingTracker {
    ttl: Duration,
    entries: HashMap<(ThreadId, String), Instant>,
}

impl TypingTracker {
    /// Create a tracker whose indicators expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Record a `typing_start` for (thread, user), refreshing any existing
    /// indicator.
    pub fn note_start(&mut self, thread_id: ThreadId, user: &str, now: Instant) {
        self.entries.insert((thread_id, user.to_string()), now);
    }

    /// Record a `typing_stop` for (thread, user); unknown pairs are ignored.
    pub fn note_stop(&mut self, thread_id: ThreadId, user: &str) {
        self.entries.remove(&(thread_id, user.to_string()));
    }

    /// Whether the user has an unexpired indicator in the thread
    pub fn is_typing(&self, thread_id: ThreadId, user: &str, now: Instant) -> bool {
        self.entries
            .get(&(thread_id, user.to_string()))
            .map(|started| now.duration_since(*started) < self.ttl)
            .unwrap_or(false)
    }

    /// Users with an unexpired indicator in the thread, expired entries
    /// swept as a side effect.
    pub fn active_users(&mut self, thread_id: ThreadId, now: Instant) -> Vec<String> {
        self.sweep(now);
        let mut users: Vec<String> = self
            .entries
            .keys()
            .filter(|(thread, _)| *thread == thread_id)
            .map(|(_, user)| user.clone())
            .collect();
        users.sort();
        users
    }

    /// Drop every indicator older than the TTL
    pub fn sweep(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, started| now.duration_since(*started) < ttl);
    }

    /// Drop all indicators, e.g. on disconnect
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
