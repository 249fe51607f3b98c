//! Named-event wire format
//!
//! The primary protocol carries JSON text frames of the shape
//! `{"event": <name>, "data": <payload>}`. Event names are part of the
//! server contract and must stay bit-exact; payload field names follow the
//! server's snake_case JSON.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{ChatUser, Message, MessageType, ThreadId};

// ----------------------------------------------------------------------------
// Outbound Events
// ----------------------------------------------------------------------------

/// Events emitted by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinThread {
        thread_id: ThreadId,
    },
    LeaveThread {
        thread_id: ThreadId,
    },
    SendMessage {
        thread_id: ThreadId,
        content: String,
        #[serde(rename = "type")]
        message_type: MessageType,
    },
    TypingStart {
        thread_id: ThreadId,
    },
    TypingStop {
        thread_id: ThreadId,
    },
    MarkAsRead {
        thread_id: ThreadId,
    },
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinThread { .. } => "join_thread",
            ClientEvent::LeaveThread { .. } => "leave_thread",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::TypingStart { .. } => "typing_start",
            ClientEvent::TypingStop { .. } => "typing_stop",
            ClientEvent::MarkAsRead { .. } => "mark_as_read",
        }
    }

    /// Thread the event is scoped to
    pub fn thread_id(&self) -> ThreadId {
        match self {
            ClientEvent::JoinThread { thread_id }
            | ClientEvent::LeaveThread { thread_id }
            | ClientEvent::SendMessage { thread_id, .. }
            | ClientEvent::TypingStart { thread_id }
            | ClientEvent::TypingStop { thread_id }
            | ClientEvent::MarkAsRead { thread_id } => *thread_id,
        }
    }

    /// Encode to a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON text frame
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ----------------------------------------------------------------------------
// Inbound Events
// ----------------------------------------------------------------------------

/// Events delivered by the server
///
/// Unrecognized event names decode to `Unknown` so a newer server never
/// breaks an older client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionConfirmed {
        status: String,
        user: ChatUser,
    },
    NewMessage(Message),
    ThreadJoined {
        thread_id: ThreadId,
        messages: Vec<Message>,
    },
    TypingStart {
        user: String,
        thread_id: ThreadId,
    },
    TypingStop {
        user: String,
        thread_id: ThreadId,
    },
    UserJoined {
        user: String,
        thread_id: ThreadId,
    },
    UserLeft {
        user: String,
        thread_id: ThreadId,
    },
    MessagesRead {
        user: String,
        thread_id: ThreadId,
        count: u64,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionConfirmed { .. } => "connection_confirmed",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::ThreadJoined { .. } => "thread_joined",
            ServerEvent::TypingStart { .. } => "typing_start",
            ServerEvent::TypingStop { .. } => "typing_stop",
            ServerEvent::UserJoined { .. } => "user_joined",
            ServerEvent::UserLeft { .. } => "user_left",
            ServerEvent::MessagesRead { .. } => "messages_read",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown => "unknown",
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
