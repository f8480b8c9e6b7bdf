//! Event types for the Parley conversation event bus.
//!
//! `ChatEvent` is broadcast by the conversation controller on every
//! transcript mutation. All variants are Clone + Send + Sync for use with
//! tokio broadcast channels.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::chat::Message;

/// Where the current turn stands.
///
/// `Idle -> AwaitingReply -> Streaming -> Completed | Failed`. A turn that
/// fails before the first chunk goes straight from `AwaitingReply` to `Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingReply,
    Streaming,
    Completed,
    Failed,
}

impl TurnPhase {
    /// Whether a turn is between its send and its final state.
    pub fn in_flight(self) -> bool {
        matches!(self, TurnPhase::AwaitingReply | TurnPhase::Streaming)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Idle => write!(f, "idle"),
            TurnPhase::AwaitingReply => write!(f, "awaiting_reply"),
            TurnPhase::Streaming => write!(f, "streaming"),
            TurnPhase::Completed => write!(f, "completed"),
            TurnPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Events emitted while the transcript changes.
///
/// Subscribers (the terminal view, logging) render from these events and
/// from transcript snapshots only; they never mutate the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended to the end of the transcript.
    MessageAppended { message: Message },

    /// A reply chunk was appended to the content of the given message.
    ChunkApplied { message_id: String, chunk: String },

    /// A message reached its final state (sent or error).
    MessageFinalized { message: Message },

    /// The turn moved to a new phase.
    PhaseChanged { phase: TurnPhase },

    /// The whole transcript was replaced (history load or clear).
    TranscriptReplaced { message_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_phase_default_is_idle() {
        assert_eq!(TurnPhase::default(), TurnPhase::Idle);
    }

    #[test]
    fn test_turn_phase_in_flight() {
        assert!(!TurnPhase::Idle.in_flight());
        assert!(TurnPhase::AwaitingReply.in_flight());
        assert!(TurnPhase::Streaming.in_flight());
        assert!(!TurnPhase::Completed.in_flight());
        assert!(!TurnPhase::Failed.in_flight());
    }

    #[test]
    fn test_chunk_event_serde() {
        let event = ChatEvent::ChunkApplied {
            message_id: "m1".to_string(),
            chunk: "Hello, ".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"chunk_applied\""));
        assert!(json.contains("\"message_id\":\"m1\""));

        let parsed: ChatEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ChatEvent::ChunkApplied { ref chunk, .. } if chunk == "Hello, "));
    }

    #[test]
    fn test_phase_event_serde() {
        let event = ChatEvent::PhaseChanged {
            phase: TurnPhase::AwaitingReply,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"phase\":\"awaiting_reply\""));
    }
}
