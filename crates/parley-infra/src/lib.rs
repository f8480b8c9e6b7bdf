//! Infrastructure layer for Parley.
//!
//! Contains implementations of the port traits defined in `parley-core`:
//! the SQLite local store and the Gemini provider, plus the config file
//! loader and data directory resolution.

pub mod config;
pub mod llm;
pub mod paths;
pub mod sqlite;
