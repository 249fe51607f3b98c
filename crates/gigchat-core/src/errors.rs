//! Error types for the gigchat client
//!
//! One unified `ChatError` covers the whole taxonomy the clients surface:
//! handshake failures (which fail the `connect` call), mid-session transport
//! errors, server-sent `error` frames, and local misuse such as emitting
//! while disconnected. Callback consumers receive all of these through the
//! same error handler and are not expected to distinguish them.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Type
// ----------------------------------------------------------------------------

/// Errors produced by the gigchat clients
#[derive(Debug, Error)]
pub enum ChatError {
    /// The connection handshake failed before a session was established.
    #[error("Connection failed: {reason}")]
    Handshake { reason: String },

    /// An established connection was lost or refused traffic.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The automatic reconnection policy gave up.
    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// An operation requires a live connection.
    #[error("Not connected to server")]
    NotConnected,

    /// `retry_connection` was called before any token was supplied.
    #[error("No token available for retry")]
    MissingToken,

    /// Refused locally: messages must carry non-whitespace content.
    #[error("Cannot send an empty message")]
    EmptyMessage,

    /// An application-level error frame sent by the server.
    #[error("Server error: {message}")]
    Server { message: String },

    /// A frame could not be encoded or decoded.
    #[error("Invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ChatError {
    /// Create a handshake error with a reason
    pub fn handshake<T: Into<String>>(reason: T) -> Self {
        ChatError::Handshake {
            reason: reason.into(),
        }
    }

    /// Create a transport error with a reason
    pub fn transport<T: Into<String>>(reason: T) -> Self {
        ChatError::Transport {
            reason: reason.into(),
        }
    }

    /// Create a server error from an error frame payload
    pub fn server<T: Into<String>>(message: T) -> Self {
        ChatError::Server {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config<T: Into<String>>(reason: T) -> Self {
        ChatError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error fails the initial `connect` call rather than being
    /// reported out-of-band through the error callback.
    pub fn is_handshake(&self) -> bool {
        matches!(self, ChatError::Handshake { .. })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ChatError::handshake("refused").to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            ChatError::NotConnected.to_string(),
            "Not connected to server"
        );
        assert_eq!(
            ChatError::ReconnectExhausted { attempts: 5 }.to_string(),
            "Reconnect failed after 5 attempts"
        );
    }

    #[test]
    fn handshake_classification() {
        assert!(ChatError::handshake("x").is_handshake());
        assert!(!ChatError::transport("x").is_handshake());
        assert!(!ChatError::server("x").is_handshake());
    }
}
