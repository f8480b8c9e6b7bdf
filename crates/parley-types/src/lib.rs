//! Shared domain types for Parley.
//!
//! This crate contains the types every other Parley crate agrees on:
//! transcript messages, user settings, LLM request/response shapes,
//! client configuration, and the error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod settings;
