//! Conversation orchestration.

pub mod controller;

pub use controller::{ConversationController, SendOutcome};
