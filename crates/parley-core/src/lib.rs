//! Conversation logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (`LocalStore`, `LlmProvider`) that the
//! infrastructure layer implements. It depends only on `parley-types` --
//! never on `parley-infra` or any database/HTTP crate.

pub mod chat;
pub mod event;
pub mod llm;
pub mod store;
