//! Client configuration types for Parley.
//!
//! `ClientConfig` represents the optional `config.toml` in the data
//! directory. Every field has a default, so an empty or missing file yields
//! a working configuration.

use serde::{Deserialize, Serialize};

use crate::llm::GenerationConfig;

/// Top-level configuration for the Parley client.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Model identifier sent to the provider.
    pub model: String,

    /// Base URL of the generative-language API.
    pub base_url: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling threshold.
    pub top_p: f32,

    /// Top-k sampling limit.
    pub top_k: u32,

    /// Maximum tokens the model may generate per reply.
    pub max_output_tokens: u32,

    /// HTTP timeout for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Pacing of the chunked reply replay.
    pub replay: ReplayConfig,

    /// Which Enter combination submits a message.
    pub submit_mode: SubmitMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let generation = GenerationConfig::default();
        Self {
            model: "gemini-1.5-flash-8b".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: generation.temperature,
            top_p: generation.top_p,
            top_k: generation.top_k,
            max_output_tokens: generation.max_output_tokens,
            request_timeout_secs: 300,
            replay: ReplayConfig::default(),
            submit_mode: SubmitMode::default(),
        }
    }
}

impl ClientConfig {
    /// The sampling parameters as sent on each request.
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Chunk size and inter-chunk delay used when replaying a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Characters per chunk.
    pub chunk_chars: usize,
    /// Pause between consecutive chunks, in milliseconds.
    pub delay_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 20,
            delay_ms: 50,
        }
    }
}

/// Key combination that submits the draft.
///
/// The other combination inserts a line break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMode {
    /// Plain Enter submits, modified Enter inserts a line break.
    #[default]
    Enter,
    /// Modified Enter submits, plain Enter inserts a line break.
    ModifierEnter,
}

impl SubmitMode {
    pub fn toggled(self) -> Self {
        match self {
            SubmitMode::Enter => SubmitMode::ModifierEnter,
            SubmitMode::ModifierEnter => SubmitMode::Enter,
        }
    }
}
