//! Client configuration
//!
//! Consolidates every tunable the clients use: endpoint, handshake timeout,
//! reconnection policy, and typing timers. Defaults mirror the production
//! server contract; `testing()` presets shrink every delay so integration
//! tests run in milliseconds.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ChatError, Result};

// ----------------------------------------------------------------------------
// Reconnection Configuration
// ----------------------------------------------------------------------------

/// Bounded exponential backoff policy for automatic reconnection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Maximum automatic attempts before the client gives up
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the retry delay
    pub max_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Create a policy with near-zero delays for tests
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
        }
    }

    /// Create a policy that never reconnects automatically
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Backoff delay before the given attempt (first attempt is 1).
    ///
    /// `initial_delay * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

// ----------------------------------------------------------------------------
// Typing Configuration
// ----------------------------------------------------------------------------

/// Timers governing typing indicators on both sides of the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Idle time after which the client auto-emits `typing_stop`
    pub stop_delay: Duration,
    /// Receiver-side lifetime of a typing indicator with no further events
    pub indicator_ttl: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            stop_delay: Duration::from_secs(3),
            indicator_ttl: Duration::from_secs(3),
        }
    }
}

impl TypingConfig {
    pub fn testing() -> Self {
        Self {
            stop_delay: Duration::from_millis(50),
            indicator_ttl: Duration::from_millis(50),
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for a gigchat client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base WebSocket URL of the chat server, e.g. `ws://localhost:8006`
    pub server_url: String,
    /// Maximum time for the connection handshake
    pub connect_timeout: Duration,
    /// Automatic reconnection policy
    pub reconnect: ReconnectConfig,
    /// Typing indicator timers
    pub typing: TypingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8006".to_string(),
            connect_timeout: Duration::from_secs(20),
            reconnect: ReconnectConfig::default(),
            typing: TypingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given server URL
    pub fn new<T: Into<String>>(server_url: T) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Create a configuration with test-friendly timers
    pub fn testing<T: Into<String>>(server_url: T) -> Self {
        Self {
            server_url: server_url.into(),
            connect_timeout: Duration::from_secs(2),
            reconnect: ReconnectConfig::testing(),
            typing: TypingConfig::testing(),
        }
    }

    /// Builder method for the reconnection policy
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Builder method for the typing timers
    pub fn with_typing(mut self, typing: TypingConfig) -> Self {
        self.typing = typing;
        self
    }

    /// Builder method for the handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<()> {
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            return Err(ChatError::config(format!(
                "server_url must use ws:// or wss://, got {}",
                self.server_url
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(ChatError::config("connect_timeout cannot be zero"));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ChatError::config("reconnect multiplier must be >= 1.0"));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(ChatError::config(
                "reconnect initial_delay cannot exceed max_delay",
            ));
        }
        if self.typing.stop_delay.is_zero() {
            return Err(ChatError::config("typing stop_delay cannot be zero"));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
