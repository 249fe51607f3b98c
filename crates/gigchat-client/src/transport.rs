//! Transport abstraction for the gigchat clients
//!
//! One interface over both client implementations, enabling clean
//! separation between application code and the concrete protocol spoken on
//! the wire.

use async_trait::async_trait;

use gigchat_core::{ConnectionStatus, MessageType, Result, ThreadId};

use crate::handlers::ChatEventHandlers;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Unified interface for a real-time chat connection
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Establish an authenticated connection.
    ///
    /// Resolves once the transport is connected. Fails only when the
    /// initial attempt dies before any automatic reconnection has started;
    /// later failures surface through the registered callbacks instead.
    async fn connect(&self, token: &str) -> Result<()>;

    /// Tear the connection down immediately. Idempotent; cancels pending
    /// typing timers and suppresses any in-flight reconnection.
    async fn disconnect(&self);

    /// Whether traffic can currently be emitted
    fn is_connected(&self) -> bool;

    /// Current lifecycle status
    fn status(&self) -> ConnectionStatus;

    /// Merge a partial set of event callbacks into the registered set.
    /// Only the provided keys are overwritten.
    fn set_event_handlers(&self, handlers: ChatEventHandlers);

    /// Request membership of a thread, leaving any previously tracked one
    async fn join_thread(&self, thread_id: ThreadId) -> Result<()>;

    /// Leave a thread; clears the tracked thread only when the id matches
    async fn leave_thread(&self, thread_id: ThreadId) -> Result<()>;

    /// Send a message to a thread. Content is trimmed; empty content is
    /// refused locally.
    async fn send_message(
        &self,
        thread_id: ThreadId,
        content: &str,
        message_type: MessageType,
    ) -> Result<()>;

    /// Mark the thread's messages as read
    async fn mark_read(&self, thread_id: ThreadId) -> Result<()>;

    /// Signal a typing edge; the client auto-emits the stop after the
    /// configured delay
    async fn start_typing(&self, thread_id: ThreadId);

    /// Cancel the pending auto-stop and emit the stop now; no-op when no
    /// typing edge is active
    async fn stop_typing(&self, thread_id: ThreadId);

    /// Force-disconnect and reconnect with the stored token
    async fn retry_connection(&self) -> Result<()>;

    /// Force-disconnect and reconnect with a fresh token
    async fn reconnect_with_token(&self, token: &str) -> Result<()>;
}
