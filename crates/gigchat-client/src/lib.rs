//! Tokio WebSocket clients for the gigchat real-time messaging protocol
//!
//! Two implementations of one contract:
//!
//! - [`ChatSocket`]: the primary client speaking the named-event protocol
//!   (`{"event": ..., "data": ...}` frames) with automatic bounded-backoff
//!   reconnection, thread membership tracking, and typing debouncing.
//! - [`LegacyChatSocket`]: the fallback client speaking the flat
//!   `{"type": ...}` envelope over per-thread endpoints, with its own
//!   manual reconnect loop.
//!
//! Both implement [`ChatTransport`], so call sites depend on the trait and
//! never on a concrete client. There is no global instance: construct a
//! client from a [`ClientConfig`] and pass it where it is needed.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

mod endpoint;
pub mod handlers;
pub mod legacy;
pub mod socket;
pub mod transport;
mod typing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use handlers::ChatEventHandlers;
pub use legacy::LegacyChatSocket;
pub use socket::ChatSocket;
pub use transport::ChatTransport;

pub use gigchat_core::{
    ChatError, ChatUser, ClientConfig, ConnectionStatus, Message, MessageId, MessageType,
    ReconnectConfig, Result, ThreadId, TypingConfig,
};
