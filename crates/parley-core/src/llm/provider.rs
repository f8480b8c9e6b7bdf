//! LlmProvider trait definition.
//!
//! Every hosted model backend implements this trait. Uses RPITIT for
//! `complete`; `BoxLlmProvider` adds dynamic dispatch on top.

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends (Gemini, test fakes).
///
/// One request, one complete response. Implementations live in
/// parley-infra (e.g., `GeminiProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
