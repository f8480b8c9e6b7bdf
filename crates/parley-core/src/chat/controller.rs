//! Conversation controller: the single owner of the in-memory transcript.
//!
//! `ConversationController` turns one line of user text into a turn: it
//! appends the user message and an assistant placeholder, asks the chat
//! client for a reply, applies replayed chunks to the placeholder, and
//! writes finalized messages through to the local store. Every mutation is
//! published on the event bus.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use parley_types::chat::{ASSISTANT_ERROR_TEXT, Message, MessageStatus};
use parley_types::error::{SendError, StoreError};
use parley_types::event::{ChatEvent, TurnPhase};
use parley_types::llm::{LlmError, Usage};

use crate::event::EventBus;
use crate::llm::client::ChatClient;
use crate::store::LocalStore;

/// Broadcast capacity; one event per reply chunk plus a handful per turn.
const EVENT_CAPACITY: usize = 1024;

/// How a call to [`ConversationController::send`] ended.
#[derive(Debug)]
pub enum SendOutcome {
    /// The text was empty after trimming; nothing happened.
    Ignored,
    /// The reply was fully delivered and persisted.
    Completed {
        message_id: String,
        chunks: usize,
        usage: Usage,
        model: String,
    },
    /// The model call failed; the assistant message now carries the error text.
    Failed { message_id: String, error: LlmError },
}

/// Clears the busy flag when the turn ends, however it ends.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owns the transcript and coordinates the store and the chat client.
///
/// All methods take `&self`. The transcript and phase sit behind
/// `std::sync::Mutex`es that are never held across an await; the client
/// sits behind a `tokio::sync::Mutex` held for the length of one send.
pub struct ConversationController<S: LocalStore> {
    store: S,
    client: tokio::sync::Mutex<Option<ChatClient>>,
    client_ready: AtomicBool,
    transcript: Mutex<Vec<Message>>,
    phase: Mutex<TurnPhase>,
    busy: AtomicBool,
    events: EventBus,
}

impl<S: LocalStore> ConversationController<S> {
    /// Create a controller with an empty transcript and no client.
    pub fn new(store: S) -> Self {
        Self {
            store,
            client: tokio::sync::Mutex::new(None),
            client_ready: AtomicBool::new(false),
            transcript: Mutex::new(Vec::new()),
            phase: Mutex::new(TurnPhase::Idle),
            busy: AtomicBool::new(false),
            events: EventBus::new(EVENT_CAPACITY),
        }
    }

    /// Access the local store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to transcript events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// A snapshot of the transcript in display order.
    pub fn transcript(&self) -> Vec<Message> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Whether a send is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether a chat client is configured.
    pub fn has_client(&self) -> bool {
        self.client_ready.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase.lock().map(|p| *p).unwrap_or_default()
    }

    /// Install or remove the chat client, e.g. after the API key changed.
    ///
    /// A new client is seeded with the completed turns already in the
    /// transcript. Waits for an in-flight send to finish first.
    pub async fn set_client(&self, client: Option<ChatClient>) {
        let mut slot = self.client.lock().await;
        let client = client.map(|mut client| {
            client.seed_history(&self.transcript());
            client
        });
        self.client_ready.store(client.is_some(), Ordering::Release);
        *slot = client;
        info!(configured = slot.is_some(), "chat client updated");
    }

    /// Replace the transcript with the stored history.
    ///
    /// Assistant messages left in `sending` by an abandoned session are
    /// returned as stored. Returns the number of messages loaded.
    pub async fn load_history(&self) -> Result<usize, StoreError> {
        let messages = self.store.list_messages().await?;
        let count = messages.len();

        if let Ok(mut transcript) = self.transcript.lock() {
            *transcript = messages;
        }
        self.set_phase(TurnPhase::Idle);
        self.events.publish(ChatEvent::TranscriptReplaced {
            message_count: count,
        });

        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_mut() {
            client.seed_history(&self.transcript());
        }

        debug!(count, "loaded history");
        Ok(count)
    }

    /// Delete every stored message and empty the transcript.
    ///
    /// Also drops the client's remembered turns. Rejected while a send is
    /// in flight.
    pub async fn clear_history(&self) -> Result<(), SendError> {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(SendError::Busy)?;

        self.store.clear_messages().await?;

        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.clear();
        }
        if let Some(client) = self.client.lock().await.as_mut() {
            client.reset_history();
        }
        self.set_phase(TurnPhase::Idle);
        self.events
            .publish(ChatEvent::TranscriptReplaced { message_count: 0 });

        info!("history cleared");
        Ok(())
    }

    /// Run one turn for `text`.
    ///
    /// Empty or whitespace-only text is ignored. A missing client or an
    /// in-flight send rejects the call without touching the transcript. A
    /// failed model call is not an error here: it yields
    /// [`SendOutcome::Failed`] and an assistant message in the error state.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        if !self.has_client() {
            return Err(SendError::MissingCredential);
        }
        let _guard = BusyGuard::acquire(&self.busy).ok_or(SendError::Busy)?;

        let mut slot = self.client.lock().await;
        let Some(client) = slot.as_mut() else {
            return Err(SendError::MissingCredential);
        };

        let user = Message::user(text);
        let placeholder = Message::assistant_placeholder(user.timestamp + 1);
        let assistant_id = placeholder.id.clone();

        self.set_phase(TurnPhase::AwaitingReply);
        self.append(user.clone());
        self.append(placeholder);

        if let Err(e) = self.store.put_message(&user).await {
            warn!(message_id = %user.id, error = %e, "failed to persist user message");
            self.finalize(&assistant_id, mark_errored);
            self.set_phase(TurnPhase::Failed);
            return Err(e.into());
        }

        let result = client
            .send_message(text, |chunk| self.apply_chunk(&assistant_id, chunk))
            .await;

        let (finalized, outcome) = match result {
            Ok(summary) => {
                let message = self.finalize(&assistant_id, |m| {
                    m.status = MessageStatus::Sent;
                    m.streaming_complete = Some(true);
                });
                self.set_phase(TurnPhase::Completed);
                info!(
                    message_id = %assistant_id,
                    chunks = summary.chunks,
                    finish_reason = summary.finish_reason.as_deref().unwrap_or("unknown"),
                    "turn completed"
                );
                (
                    message,
                    SendOutcome::Completed {
                        message_id: assistant_id.clone(),
                        chunks: summary.chunks,
                        usage: summary.usage,
                        model: summary.model,
                    },
                )
            }
            Err(error) => {
                let message = self.finalize(&assistant_id, mark_errored);
                self.set_phase(TurnPhase::Failed);
                warn!(message_id = %assistant_id, error = %error, "turn failed");
                (
                    message,
                    SendOutcome::Failed {
                        message_id: assistant_id.clone(),
                        error,
                    },
                )
            }
        };

        if let Some(message) = finalized {
            if let Err(e) = self.store.put_message(&message).await {
                warn!(message_id = %message.id, error = %e, "failed to persist assistant message");
                return Err(e.into());
            }
        }

        Ok(outcome)
    }

    fn append(&self, message: Message) {
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(message.clone());
        }
        self.events.publish(ChatEvent::MessageAppended { message });
    }

    fn apply_chunk(&self, message_id: &str, chunk: &str) {
        if let Ok(mut transcript) = self.transcript.lock() {
            if let Some(message) = transcript.iter_mut().find(|m| m.id == message_id) {
                message.content.push_str(chunk);
            }
        }
        if self.phase() == TurnPhase::AwaitingReply {
            self.set_phase(TurnPhase::Streaming);
        }
        self.events.publish(ChatEvent::ChunkApplied {
            message_id: message_id.to_string(),
            chunk: chunk.to_string(),
        });
    }

    /// Apply `update` to the message with `message_id` and publish the result.
    fn finalize(&self, message_id: &str, update: impl FnOnce(&mut Message)) -> Option<Message> {
        let finalized = self.transcript.lock().ok().and_then(|mut transcript| {
            transcript
                .iter_mut()
                .find(|m| m.id == message_id)
                .map(|message| {
                    update(message);
                    message.clone()
                })
        });
        if let Some(message) = &finalized {
            self.events.publish(ChatEvent::MessageFinalized {
                message: message.clone(),
            });
        }
        finalized
    }

    fn set_phase(&self, phase: TurnPhase) {
        if let Ok(mut current) = self.phase.lock() {
            if *current == phase {
                return;
            }
            *current = phase;
        }
        self.events.publish(ChatEvent::PhaseChanged { phase });
    }
}

fn mark_errored(message: &mut Message) {
    message.content = ASSISTANT_ERROR_TEXT.to_string();
    message.status = MessageStatus::Error;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Notify;
    use tokio::sync::broadcast::error::TryRecvError;

    use parley_types::chat::MessageRole;
    use parley_types::llm::GenerationConfig;

    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::fake::{ScriptedProvider, reply};
    use crate::llm::replay::ReplayPacing;
    use crate::store::MemoryStore;

    fn chat_client(provider: &ScriptedProvider) -> ChatClient {
        ChatClient::new(
            BoxLlmProvider::new(provider.clone()),
            "gemini-1.5-flash-8b",
            GenerationConfig::default(),
        )
        .with_pacing(ReplayPacing::instant(20))
    }

    async fn controller_with(provider: &ScriptedProvider) -> ConversationController<MemoryStore> {
        let controller = ConversationController::new(MemoryStore::new());
        controller.set_client(Some(chat_client(provider))).await;
        controller
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(other) => panic!("unexpected receive error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn send_appends_user_then_assistant() {
        let provider = ScriptedProvider::new(vec![reply("Hello! How can I help?")]);
        let controller = controller_with(&provider).await;

        let outcome = controller.send("  hello  ").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed { chunks: 2, .. }));

        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, MessageRole::User);
        assert_eq!(transcript[0].content, "hello");
        assert_eq!(transcript[0].status, MessageStatus::Sent);
        assert_eq!(transcript[1].role, MessageRole::Assistant);
        assert_eq!(transcript[1].content, "Hello! How can I help?");
        assert!(transcript[1].is_complete_reply());
        assert!(transcript[1].timestamp > transcript[0].timestamp);

        assert_eq!(controller.phase(), TurnPhase::Completed);
        assert!(!controller.is_busy());

        let stored = controller.store().list_messages().await.unwrap();
        assert_eq!(stored, transcript);
        assert_eq!(provider.requests()[0].messages.last().unwrap().content, "hello");
    }

    #[tokio::test]
    async fn long_instant_reply_does_not_outrun_subscriber() {
        let reply_text = "y".repeat(2000);
        let provider = ScriptedProvider::new(vec![reply(&reply_text)]);
        let controller = ConversationController::new(MemoryStore::new());
        let client = chat_client(&provider).with_pacing(ReplayPacing::instant(1));
        controller.set_client(Some(client)).await;
        let mut rx = controller.subscribe();

        let subscriber = async {
            let mut text = String::new();
            loop {
                match rx.recv().await {
                    Ok(ChatEvent::ChunkApplied { chunk, .. }) => text.push_str(&chunk),
                    Ok(ChatEvent::MessageFinalized { .. }) => return Ok(text),
                    Ok(_) => {}
                    Err(e) => return Err(e),
                }
            }
        };

        let (outcome, received) = tokio::join!(controller.send("long please"), subscriber);
        assert!(matches!(outcome, Ok(SendOutcome::Completed { chunks: 2000, .. })));
        assert_eq!(received.unwrap(), reply_text);
    }

    #[tokio::test]
    async fn events_follow_turn_order() {
        let reply_text = "a".repeat(45);
        let provider = ScriptedProvider::new(vec![reply(&reply_text)]);
        let controller = controller_with(&provider).await;
        let mut rx = controller.subscribe();

        controller.send("go").await.unwrap();
        let events = drain(&mut rx);

        let assistant_id = controller.transcript()[1].id.clone();
        let kinds: Vec<String> = events
            .iter()
            .map(|e| match e {
                ChatEvent::PhaseChanged { phase } => format!("phase:{phase}"),
                ChatEvent::MessageAppended { message } => format!("append:{}", message.role),
                ChatEvent::ChunkApplied { message_id, .. } => {
                    assert_eq!(message_id, &assistant_id);
                    "chunk".to_string()
                }
                ChatEvent::MessageFinalized { message } => format!("final:{}", message.status),
                ChatEvent::TranscriptReplaced { .. } => "replaced".to_string(),
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                "phase:awaiting_reply",
                "append:user",
                "append:assistant",
                "phase:streaming",
                "chunk",
                "chunk",
                "chunk",
                "final:sent",
                "phase:completed",
            ]
        );
    }

    #[tokio::test]
    async fn chunks_reassemble_into_reply() {
        let reply_text = "Rust ownership means one owner at a time; borrowing is temporary.";
        let provider = ScriptedProvider::new(vec![reply(reply_text)]);
        let controller = controller_with(&provider).await;
        let mut rx = controller.subscribe();

        controller.send("explain").await.unwrap();

        let chunks: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::ChunkApplied { chunk, .. } => Some(chunk),
                _ => None,
            })
            .collect();
        assert_eq!(chunks.len(), reply_text.chars().count().div_ceil(20));
        assert_eq!(chunks.concat(), reply_text);
    }

    #[tokio::test]
    async fn api_failure_marks_assistant_error() {
        let provider = ScriptedProvider::new(vec![Err(LlmError::RateLimited {
            retry_after_ms: None,
        })]);
        let controller = controller_with(&provider).await;
        let mut rx = controller.subscribe();

        let outcome = controller.send("hello").await.unwrap();
        assert!(matches!(
            outcome,
            SendOutcome::Failed {
                error: LlmError::RateLimited { .. },
                ..
            }
        ));

        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "hello");
        assert_eq!(transcript[0].status, MessageStatus::Sent);
        assert_eq!(transcript[1].content, ASSISTANT_ERROR_TEXT);
        assert_eq!(transcript[1].status, MessageStatus::Error);
        assert_eq!(controller.phase(), TurnPhase::Failed);

        let chunk_events = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ChatEvent::ChunkApplied { .. }))
            .count();
        assert_eq!(chunk_events, 0);

        // Errored replies are persisted alongside the user message.
        let stored = controller.store().list_messages().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].status, MessageStatus::Error);
    }

    #[tokio::test]
    async fn failed_turn_allows_resend() {
        let provider = ScriptedProvider::new(vec![
            Err(LlmError::Overloaded("503".to_string())),
            reply("second time lucky"),
        ]);
        let controller = controller_with(&provider).await;

        controller.send("hello").await.unwrap();
        let outcome = controller.send("hello").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed { .. }));
        assert_eq!(controller.transcript().len(), 4);
        assert_eq!(controller.transcript()[3].content, "second time lucky");
    }

    #[tokio::test]
    async fn whitespace_input_is_ignored() {
        let provider = ScriptedProvider::new(vec![reply("unused")]);
        let controller = controller_with(&provider).await;
        let mut rx = controller.subscribe();

        for text in ["", "   ", "\n\t "] {
            let outcome = controller.send(text).await.unwrap();
            assert!(matches!(outcome, SendOutcome::Ignored));
        }

        assert!(controller.transcript().is_empty());
        assert_eq!(provider.call_count(), 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn missing_client_rejects_without_mutation() {
        let controller = ConversationController::new(MemoryStore::new());
        assert!(!controller.has_client());

        let err = controller.send("hello").await.unwrap_err();
        assert!(matches!(err, SendError::MissingCredential));
        assert!(controller.transcript().is_empty());
        assert!(controller.store().list_messages().await.unwrap().is_empty());
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn overlapping_send_is_rejected_as_busy() {
        let gate = Arc::new(Notify::new());
        let provider = ScriptedProvider::new(vec![reply("done")]).gated(gate.clone());
        let controller = controller_with(&provider).await;

        let first = controller.send("first");
        let second = async {
            while !controller.is_busy() {
                tokio::task::yield_now().await;
            }
            let result = controller.send("second").await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Ok(SendOutcome::Completed { .. })));
        assert!(matches!(second, Err(SendError::Busy)));
        assert_eq!(controller.transcript().len(), 2);
        assert_eq!(provider.call_count(), 1);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn user_persist_failure_skips_api_call() {
        let provider = ScriptedProvider::new(vec![reply("unused")]);
        let controller = controller_with(&provider).await;
        controller.store().fail_writes_after(0);

        let err = controller.send("hello").await.unwrap_err();
        assert!(matches!(err, SendError::Store(StoreError::Transaction(_))));
        assert_eq!(provider.call_count(), 0);

        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].status, MessageStatus::Error);
        assert_eq!(transcript[1].content, ASSISTANT_ERROR_TEXT);
        assert_eq!(controller.phase(), TurnPhase::Failed);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn final_persist_failure_keeps_finalized_message() {
        let provider = ScriptedProvider::new(vec![reply("kept in memory")]);
        let controller = controller_with(&provider).await;
        controller.store().fail_writes_after(1);

        let err = controller.send("hello").await.unwrap_err();
        assert!(matches!(err, SendError::Store(_)));

        let transcript = controller.transcript();
        assert!(transcript[1].is_complete_reply());
        assert_eq!(transcript[1].content, "kept in memory");
        // Only the user message reached the store.
        assert_eq!(controller.store().list_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_history_replaces_transcript_and_seeds_client() {
        let store = MemoryStore::new();
        let user = Message::user_at("earlier question", 100);
        let mut answer = Message::assistant_placeholder(101);
        answer.content = "earlier answer".to_string();
        answer.status = MessageStatus::Sent;
        answer.streaming_complete = Some(true);
        // Inserted out of order on purpose.
        store.put_message(&answer).await.unwrap();
        store.put_message(&user).await.unwrap();

        let provider = ScriptedProvider::new(vec![reply("follow-up answer")]);
        let controller = ConversationController::new(store);
        controller.set_client(Some(chat_client(&provider))).await;

        let count = controller.load_history().await.unwrap();
        assert_eq!(count, 2);
        let transcript = controller.transcript();
        assert_eq!(transcript[0].content, "earlier question");
        assert_eq!(transcript[1].content, "earlier answer");

        controller.send("and now?").await.unwrap();
        let sent: Vec<String> = provider.requests()[0]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(sent, vec!["earlier question", "earlier answer", "and now?"]);
    }

    #[tokio::test]
    async fn load_history_keeps_abandoned_placeholder() {
        let store = MemoryStore::new();
        store.put_message(&Message::user_at("q", 1)).await.unwrap();
        store
            .put_message(&Message::assistant_placeholder(2))
            .await
            .unwrap();

        let controller = ConversationController::new(store);
        controller.load_history().await.unwrap();
        assert_eq!(controller.transcript()[1].status, MessageStatus::Sending);
    }

    #[tokio::test]
    async fn set_client_seeds_from_transcript() {
        let first = ScriptedProvider::new(vec![reply("one")]);
        let controller = controller_with(&first).await;
        controller.send("q1").await.unwrap();

        let second = ScriptedProvider::new(vec![reply("two")]);
        controller.set_client(Some(chat_client(&second))).await;
        controller.send("q2").await.unwrap();

        assert_eq!(second.requests()[0].messages.len(), 3);

        controller.set_client(None).await;
        assert!(!controller.has_client());
    }

    #[tokio::test]
    async fn clear_history_empties_store_and_transcript() {
        let provider = ScriptedProvider::new(vec![reply("a"), reply("b")]);
        let controller = controller_with(&provider).await;
        controller.send("q1").await.unwrap();
        let mut rx = controller.subscribe();

        controller.clear_history().await.unwrap();

        assert!(controller.transcript().is_empty());
        assert!(controller.store().list_messages().await.unwrap().is_empty());
        assert_eq!(controller.phase(), TurnPhase::Idle);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, ChatEvent::TranscriptReplaced { message_count: 0 }))
        );

        // The client forgot the earlier turn as well.
        controller.send("q2").await.unwrap();
        assert_eq!(provider.requests()[1].messages.len(), 1);
    }
}
