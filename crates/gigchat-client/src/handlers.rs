//! Application event callbacks
//!
//! The dispatcher decouples transport events from application code: every
//! inbound event maps to an optional callback, and a missing callback is
//! silently ignored. Handler sets merge key-by-key so callers can register
//! callbacks incrementally without clobbering the rest.

use std::sync::Arc;

use gigchat_core::{ChatError, ChatUser, ConnectionStatus, Message, ThreadId};

// ----------------------------------------------------------------------------
// Handler Types
// ----------------------------------------------------------------------------

pub type ConnectionHandler = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;
pub type ThreadJoinedHandler = Arc<dyn Fn(ThreadId, Vec<Message>) + Send + Sync>;
pub type ConfirmedHandler = Arc<dyn Fn(ChatUser) + Send + Sync>;
pub type PresenceHandler = Arc<dyn Fn(&str, ThreadId) + Send + Sync>;
pub type MessagesReadHandler = Arc<dyn Fn(&str, ThreadId, u64) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&ChatError) + Send + Sync>;

// ----------------------------------------------------------------------------
// Handler Set
// ----------------------------------------------------------------------------

/// Partial set of named event callbacks
#[derive(Clone, Default)]
pub struct ChatEventHandlers {
    pub on_connection_change: Option<ConnectionHandler>,
    pub on_connection_confirmed: Option<ConfirmedHandler>,
    pub on_message: Option<MessageHandler>,
    pub on_thread_joined: Option<ThreadJoinedHandler>,
    pub on_typing_start: Option<PresenceHandler>,
    pub on_typing_stop: Option<PresenceHandler>,
    pub on_user_joined: Option<PresenceHandler>,
    pub on_user_left: Option<PresenceHandler>,
    pub on_messages_read: Option<MessagesReadHandler>,
    pub on_error: Option<ErrorHandler>,
}

impl ChatEventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite only the keys provided in `update`, preserving the rest.
    pub fn merge(&mut self, update: ChatEventHandlers) {
        macro_rules! take {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }
        take!(on_connection_change);
        take!(on_connection_confirmed);
        take!(on_message);
        take!(on_thread_joined);
        take!(on_typing_start);
        take!(on_typing_stop);
        take!(on_user_joined);
        take!(on_user_left);
        take!(on_messages_read);
        take!(on_error);
    }

    pub fn on_connection_change(
        mut self,
        handler: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_change = Some(Arc::new(handler));
        self
    }

    pub fn on_connection_confirmed(
        mut self,
        handler: impl Fn(ChatUser) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_confirmed = Some(Arc::new(handler));
        self
    }

    pub fn on_message(mut self, handler: impl Fn(Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(handler));
        self
    }

    pub fn on_thread_joined(
        mut self,
        handler: impl Fn(ThreadId, Vec<Message>) + Send + Sync + 'static,
    ) -> Self {
        self.on_thread_joined = Some(Arc::new(handler));
        self
    }

    pub fn on_typing_start(
        mut self,
        handler: impl Fn(&str, ThreadId) + Send + Sync + 'static,
    ) -> Self {
        self.on_typing_start = Some(Arc::new(handler));
        self
    }

    pub fn on_typing_stop(
        mut self,
        handler: impl Fn(&str, ThreadId) + Send + Sync + 'static,
    ) -> Self {
        self.on_typing_stop = Some(Arc::new(handler));
        self
    }

    pub fn on_user_joined(
        mut self,
        handler: impl Fn(&str, ThreadId) + Send + Sync + 'static,
    ) -> Self {
        self.on_user_joined = Some(Arc::new(handler));
        self
    }

    pub fn on_user_left(mut self, handler: impl Fn(&str, ThreadId) + Send + Sync + 'static) -> Self {
        self.on_user_left = Some(Arc::new(handler));
        self
    }

    pub fn on_messages_read(
        mut self,
        handler: impl Fn(&str, ThreadId, u64) + Send + Sync + 'static,
    ) -> Self {
        self.on_messages_read = Some(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&ChatError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

impl std::fmt::Debug for ChatEventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        macro_rules! flag {
            ($dbg:ident, $field:ident) => {
                $dbg.field(stringify!($field), &self.$field.is_some())
            };
        }
        let mut dbg = f.debug_struct("ChatEventHandlers");
        flag!(dbg, on_connection_change);
        flag!(dbg, on_connection_confirmed);
        flag!(dbg, on_message);
        flag!(dbg, on_thread_joined);
        flag!(dbg, on_typing_start);
        flag!(dbg, on_typing_stop);
        flag!(dbg, on_user_joined);
        flag!(dbg, on_user_left);
        flag!(dbg, on_messages_read);
        flag!(dbg, on_error);
        dbg.finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn merge_overwrites_only_provided_keys() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let mut registered = ChatEventHandlers::new()
            .on_connection_change({
                let calls = Arc::clone(&first_calls);
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_error({
                let calls = Arc::clone(&first_calls);
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            });

        registered.merge(ChatEventHandlers::new().on_error({
            let calls = Arc::clone(&second_calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        }));

        // The untouched key still points at the first handler.
        registered.on_connection_change.as_ref().unwrap()(ConnectionStatus::Connected);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);

        // The merged key was replaced.
        registered.on_error.as_ref().unwrap()(&ChatError::NotConnected);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_handlers_stay_none() {
        let mut registered = ChatEventHandlers::new().on_message(|_| {});
        registered.merge(ChatEventHandlers::new());
        assert!(registered.on_message.is_some());
        assert!(registered.on_thread_joined.is_none());
    }
}
