//! ChatClient: one provider, the remembered conversation, and reply replay.
//!
//! The client keeps the turns the model has already seen and sends them with
//! every request, the way a hosted chat session does. A turn only enters
//! history once the provider has answered it.

use std::time::Instant;

use tracing::{Instrument, debug, info, info_span};

use parley_types::chat::{Message, MessageRole};
use parley_types::llm::{CompletionRequest, GenerationConfig, LlmError, PromptMessage, Usage};

use super::box_provider::BoxLlmProvider;
use super::replay::{ReplayPacing, replay};

/// What a successful `send_message` delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySummary {
    /// Number of chunks handed to the callback.
    pub chunks: usize,
    pub usage: Usage,
    /// Model that produced the reply, as reported by the provider.
    pub model: String,
    pub finish_reason: Option<String>,
}

/// A conversation with one hosted model.
pub struct ChatClient {
    provider: BoxLlmProvider,
    model: String,
    generation: GenerationConfig,
    pacing: ReplayPacing,
    history: Vec<PromptMessage>,
}

impl ChatClient {
    /// Create a client with empty history and the default replay pacing.
    pub fn new(
        provider: BoxLlmProvider,
        model: impl Into<String>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            generation,
            pacing: ReplayPacing::default(),
            history: Vec::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: ReplayPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn pacing(&self) -> ReplayPacing {
        self.pacing
    }

    /// Turns the model will see before the next user message.
    pub fn history(&self) -> &[PromptMessage] {
        &self.history
    }

    /// Forget every remembered turn.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Replace history with the completed turns of a stored transcript.
    ///
    /// A turn counts when a user message is immediately followed by a fully
    /// delivered assistant reply; failed or abandoned turns are skipped so
    /// history keeps strict user/model alternation. Returns the number of
    /// turns seeded.
    pub fn seed_history(&mut self, transcript: &[Message]) -> usize {
        self.history.clear();
        let mut turns = 0;
        for pair in transcript.windows(2) {
            let (user, reply) = (&pair[0], &pair[1]);
            if user.role == MessageRole::User && reply.is_complete_reply() {
                self.history.push(PromptMessage::user(user.content.clone()));
                self.history.push(PromptMessage::assistant(reply.content.clone()));
                turns += 1;
            }
        }
        debug!(turns, "seeded chat history");
        turns
    }

    /// Send `text` and replay the reply through `on_chunk`.
    ///
    /// Resolves after the last chunk was delivered. On error nothing was
    /// delivered and history is unchanged.
    pub async fn send_message<F>(&mut self, text: &str, on_chunk: F) -> Result<ReplySummary, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend(self.history.iter().cloned());
        messages.push(PromptMessage::user(text));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            generation: self.generation.clone(),
        };

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.generation.max_output_tokens,
            gen_ai.request.temperature = request.generation.temperature,
            gen_ai.request.history_len = self.history.len(),
        );

        let started = Instant::now();
        let response = self.provider.complete(&request).instrument(span).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.history.push(PromptMessage::user(text));
        self.history
            .push(PromptMessage::assistant(response.content.clone()));

        let chunks = replay(&response.content, self.pacing, on_chunk).await;

        info!(
            provider = self.provider.name(),
            model = %response.model,
            chunks,
            elapsed_ms,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "reply delivered"
        );

        Ok(ReplySummary {
            chunks,
            usage: response.usage,
            model: response.model,
            finish_reason: response.finish_reason,
        })
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("history_len", &self.history.len())
            .finish()
    }
}
