//! Transcript message types for Parley.
//!
//! A `Message` is one entry in the conversation transcript. Every turn
//! produces exactly one user message followed by exactly one assistant
//! message. Messages are keyed by a string id and ordered by their
//! millisecond timestamp.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// User-facing text that replaces an assistant reply when the turn fails.
pub const ASSISTANT_ERROR_TEXT: &str = "Sorry, there was an error processing your message.";

/// Delivery status of a transcript message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('sending', 'sent', 'error'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Error,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sending" => Ok(MessageStatus::Sending),
            "sent" => Ok(MessageStatus::Sent),
            "error" => Ok(MessageStatus::Error),
            other => Err(format!("invalid message status: '{other}'")),
        }
    }
}

/// A single entry in the conversation transcript.
///
/// `streaming_complete` is only meaningful for assistant messages: it is
/// `Some(false)` while chunks are still being applied and `Some(true)` once
/// the reply has been fully delivered. User messages carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_complete: Option<bool>,
}

impl Message {
    /// A finalized user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::user_at(content, Utc::now().timestamp_millis())
    }

    /// A finalized user message with an explicit timestamp.
    pub fn user_at(content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: new_message_id(),
            content: content.into(),
            role: MessageRole::User,
            timestamp,
            status: MessageStatus::Sent,
            streaming_complete: None,
        }
    }

    /// An empty assistant message awaiting its reply.
    pub fn assistant_placeholder(timestamp: i64) -> Self {
        Self {
            id: new_message_id(),
            content: String::new(),
            role: MessageRole::Assistant,
            timestamp,
            status: MessageStatus::Sending,
            streaming_complete: Some(false),
        }
    }

    /// Whether this is an assistant message whose reply is fully delivered.
    pub fn is_complete_reply(&self) -> bool {
        self.role == MessageRole::Assistant
            && self.status == MessageStatus::Sent
            && self.streaming_complete == Some(true)
    }
}

/// Generate a fresh, time-sortable message id.
pub fn new_message_id() -> String {
    Uuid::now_v7().to_string()
}
