//! Legacy envelope wire format
//!
//! The fallback client speaks a flat discriminated envelope over a single
//! message channel: `{"type": <name>, ...payload}` with no event/data
//! nesting. Connections are scoped to one thread by the endpoint URL, so
//! frames carry no thread id.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{Message, MessageId, MessageType, ThreadId};

// ----------------------------------------------------------------------------
// Outbound Frames
// ----------------------------------------------------------------------------

/// Frames emitted by the legacy client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyClientFrame {
    ChatMessage {
        message: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    MarkMessagesRead {
        message_ids: Vec<MessageId>,
    },
    TypingIndicator {
        is_typing: bool,
    },
}

impl LegacyClientFrame {
    pub fn name(&self) -> &'static str {
        match self {
            LegacyClientFrame::ChatMessage { .. } => "chat_message",
            LegacyClientFrame::MarkMessagesRead { .. } => "mark_messages_read",
            LegacyClientFrame::TypingIndicator { .. } => "typing_indicator",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ----------------------------------------------------------------------------
// Inbound Frames
// ----------------------------------------------------------------------------

/// Frames delivered to the legacy client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyServerFrame {
    ConnectionEstablished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ChatMessage {
        data: Message,
    },
    MessagesRead {
        message_ids: Vec<MessageId>,
        reader: String,
    },
    TypingIndicator {
        user: String,
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<ThreadId>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl LegacyServerFrame {
    pub fn name(&self) -> &'static str {
        match self {
            LegacyServerFrame::ConnectionEstablished { .. } => "connection_established",
            LegacyServerFrame::ChatMessage { .. } => "chat_message",
            LegacyServerFrame::MessagesRead { .. } => "messages_read",
            LegacyServerFrame::TypingIndicator { .. } => "typing_indicator",
            LegacyServerFrame::Error { .. } => "error",
            LegacyServerFrame::Unknown => "unknown",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
