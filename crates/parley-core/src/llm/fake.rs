//! Hand-written providers for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};

use super::provider::LlmProvider;

pub(crate) fn reply(content: &str) -> Result<CompletionResponse, LlmError> {
    Ok(CompletionResponse {
        content: content.to_string(),
        model: "fake-model".to_string(),
        finish_reason: Some("STOP".to_string()),
        usage: Usage {
            input_tokens: 3,
            output_tokens: 7,
        },
    })
}

/// Returns queued results in order and records every request it sees.
#[derive(Clone, Default)]
pub(crate) struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Result<CompletionResponse, LlmError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Vec<Result<CompletionResponse, LlmError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    /// Hold every response until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Provider {
                message: "script exhausted".to_string(),
            }))
    }
}
