//! LLM provider implementations.
//!
//! Contains the Gemini implementation of the [`LlmProvider`] trait defined
//! in `parley-core`, and [`build_chat_client`], which wires a provider and
//! the client configuration into a ready [`ChatClient`].
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod gemini;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::client::ChatClient;
use parley_core::llm::replay::ReplayPacing;
use parley_types::config::ClientConfig;
use parley_types::llm::LlmError;

use self::gemini::GeminiProvider;

/// Build a chat client for `api_key` using the model, sampling, endpoint,
/// and replay settings from `config`.
///
/// Fails with [`LlmError::MissingApiKey`] when the key is blank.
pub fn build_chat_client(api_key: SecretString, config: &ClientConfig) -> Result<ChatClient, LlmError> {
    let provider = GeminiProvider::from_config(api_key, config)?;
    tracing::debug!(model = %config.model, base_url = %config.base_url, "built gemini client");

    Ok(
        ChatClient::new(BoxLlmProvider::new(provider), config.model.clone(), config.generation())
            .with_pacing(ReplayPacing::from(config.replay)),
    )
}
