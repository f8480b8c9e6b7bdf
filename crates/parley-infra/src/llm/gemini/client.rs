//! GeminiProvider -- concrete [`LlmProvider`] implementation for Google Gemini.
//!
//! Sends one `generateContent` request per turn and returns the complete
//! reply. The API key is wrapped in [`secrecy::SecretString`], sent only in
//! the `x-goog-api-key` header, and never logged.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::provider::LlmProvider;
use parley_types::config::ClientConfig;
use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, MessageRole, Usage};

use super::types::{
    Content, ErrorEnvelope, GeminiGenerationConfig, GenerateContentRequest,
    GenerateContentResponse, Part,
};

/// Finish reasons for which Gemini withholds the reply text.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Google Gemini LLM provider.
///
/// Does not derive Debug; the key must never reach log output.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl GeminiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    /// Create a provider against the public endpoint.
    ///
    /// Fails with [`LlmError::MissingApiKey`] if the key is empty or blank.
    pub fn new(api_key: SecretString, request_timeout: Duration) -> Result<Self, LlmError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a provider with the endpoint and timeout from `config`.
    pub fn from_config(api_key: SecretString, config: &ClientConfig) -> Result<Self, LlmError> {
        Ok(Self::new(api_key, Duration::from_secs(config.request_timeout_secs))?
            .with_base_url(config.base_url.clone()))
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Full `generateContent` URL for `model`.
    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Convert a generic [`CompletionRequest`] into a [`GenerateContentRequest`].
    fn to_gemini_request(request: &CompletionRequest) -> GenerateContentRequest {
        let contents = request
            .messages
            .iter()
            .map(|m| Content {
                role: Some(
                    match m.role {
                        MessageRole::User => "user",
                        MessageRole::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: request.generation.temperature,
                top_p: request.generation.top_p,
                top_k: request.generation.top_k,
                max_output_tokens: request.generation.max_output_tokens,
            },
        }
    }

    /// Convert a [`GenerateContentResponse`] into a [`CompletionResponse`].
    fn from_gemini_response(
        response: GenerateContentResponse,
        requested_model: &str,
    ) -> Result<CompletionResponse, LlmError> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked: {r}"))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::EmptyResponse { reason });
        };

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
            {
                return Err(LlmError::EmptyResponse {
                    reason: format!("finish reason {reason}"),
                });
            }
        }

        let usage = response.usage_metadata.unwrap_or_default();
        Ok(CompletionResponse {
            content,
            model: response
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            finish_reason: candidate.finish_reason,
            usage: Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
        })
    }
}

/// Map a non-2xx status and its body to an [`LlmError`].
fn map_error_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        400 => LlmError::InvalidRequest(message),
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after_secs.map(|s| s.saturating_mul(1000)),
        },
        503 | 529 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = Self::to_gemini_request(request);
        let url = self.url(&request.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "gemini request failed");
            return Err(map_error_status(status.as_u16(), &error_body, retry_after));
        }

        let gemini_resp: GenerateContentResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        Self::from_gemini_response(gemini_resp, &request.model)
    }
}
