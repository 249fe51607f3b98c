//! Core protocol layer for the gigchat real-time messaging client.
//!
//! This crate provides the transport-agnostic pieces shared by every client
//! implementation: domain types, the named-event wire format and the legacy
//! envelope format, connection status, configuration, error taxonomy, and
//! the pure bookkeeping rules (history merging, typing expiry). It performs
//! no I/O.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod history;
pub mod legacy;
pub mod typing;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ClientConfig, ReconnectConfig, TypingConfig};
pub use errors::{ChatError, Result};
pub use history::merge_messages;
pub use typing::TypingTracker;
pub use types::{ChatUser, ConnectionStatus, Message, MessageId, MessageType, ThreadId, UserId};
pub use wire::{ClientEvent, ServerEvent};
