//! In-memory `LocalStore`.
//!
//! Backs `parley chat --ephemeral` and the controller tests. Nothing
//! survives the process.

use std::sync::Mutex;

use parley_types::chat::Message;
use parley_types::error::StoreError;
use parley_types::settings::Settings;

use super::LocalStore;

#[derive(Debug, Default)]
struct MemoryState {
    /// Insertion order is the tie-breaker for equal timestamps.
    messages: Vec<Message>,
    settings: Option<Settings>,
    closed: bool,
    #[cfg(test)]
    fail_writes_after: Option<usize>,
}

impl MemoryState {
    #[cfg(test)]
    fn take_write_permit(&mut self) -> Result<(), StoreError> {
        match self.fail_writes_after.as_mut() {
            Some(0) => Err(StoreError::Transaction("injected write failure".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    #[cfg(not(test))]
    fn take_write_permit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A `LocalStore` held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything held and stop serving requests; every later call
    /// fails with `NotInitialized`.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.messages.clear();
            state.settings = None;
            state.closed = true;
        }
    }

    /// Let `successes` more message writes through, then fail the rest.
    #[cfg(test)]
    pub(crate) fn fail_writes_after(&self, successes: usize) {
        self.state.lock().unwrap().fail_writes_after = Some(successes);
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("store lock poisoned: {e}")))?;
        if state.closed {
            return Err(StoreError::NotInitialized);
        }
        f(&mut state)
    }
}

impl LocalStore for MemoryStore {
    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        self.with_state(|state| {
            state.take_write_permit()?;

            match state.messages.iter_mut().find(|m| m.id == message.id) {
                Some(existing) => *existing = message.clone(),
                None => state.messages.push(message.clone()),
            }
            Ok(())
        })
    }

    async fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        self.with_state(|state| {
            let mut messages = state.messages.clone();
            // Stable sort keeps insertion order among equal timestamps.
            messages.sort_by_key(|m| m.timestamp);
            Ok(messages)
        })
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.with_state(|state| {
            state.settings = Some(settings.clone());
            Ok(())
        })
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        self.with_state(|state| Ok(state.settings.clone().unwrap_or_default()))
    }

    async fn clear_messages(&self) -> Result<(), StoreError> {
        self.with_state(|state| {
            state.messages.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::chat::MessageStatus;
    use parley_types::settings::Theme;
    use secrecy::{ExposeSecret, SecretString};

    #[tokio::test]
    async fn test_put_message_is_idempotent_upsert() {
        let store = MemoryStore::new();
        let mut msg = Message::assistant_placeholder(10);

        store.put_message(&msg).await.unwrap();
        store.put_message(&msg).await.unwrap();
        assert_eq!(store.list_messages().await.unwrap().len(), 1);

        msg.content = "done".to_string();
        msg.status = MessageStatus::Sent;
        store.put_message(&msg).await.unwrap();

        let listed = store.list_messages().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "done");
        assert_eq!(listed[0].status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_list_messages_sorted_by_timestamp() {
        let store = MemoryStore::new();
        for ts in [30, 10, 20] {
            store.put_message(&Message::user_at("m", ts)).await.unwrap();
        }
        let timestamps: Vec<i64> = store
            .list_messages()
            .await
            .unwrap()
            .iter()
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let store = MemoryStore::new();
        let first = Message::user_at("first", 5);
        let second = Message::user_at("second", 5);
        store.put_message(&first).await.unwrap();
        store.put_message(&second).await.unwrap();
        // Updating the first message must not move it behind the second.
        store.put_message(&first).await.unwrap();

        let listed = store.list_messages().await.unwrap();
        assert_eq!(listed[0].content, "first");
        assert_eq!(listed[1].content, "second");
    }

    #[tokio::test]
    async fn test_settings_default_and_roundtrip() {
        let store = MemoryStore::new();
        let settings = store.get_settings().await.unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.theme, Theme::System);

        store
            .put_settings(&Settings {
                api_key: Some(SecretString::from("k1")),
                theme: Theme::Dark,
            })
            .await
            .unwrap();
        let loaded = store.get_settings().await.unwrap();
        assert_eq!(loaded.api_key.unwrap().expose_secret(), "k1");
        assert_eq!(loaded.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn test_clear_messages_keeps_settings() {
        let store = MemoryStore::new();
        store.put_message(&Message::user_at("a", 1)).await.unwrap();
        store
            .put_settings(&Settings {
                api_key: None,
                theme: Theme::Light,
            })
            .await
            .unwrap();

        store.clear_messages().await.unwrap();
        assert!(store.list_messages().await.unwrap().is_empty());
        assert_eq!(store.get_settings().await.unwrap().theme, Theme::Light);
    }

    #[tokio::test]
    async fn test_shared_store_sees_same_data() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let other = store.clone();
        LocalStore::put_message(&store, &Message::user_at("shared", 1))
            .await
            .unwrap();
        assert_eq!(LocalStore::list_messages(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_reports_not_initialized() {
        let store = MemoryStore::new();
        store.put_message(&Message::user_at("gone", 1)).await.unwrap();
        store.close();
        assert!(store.state.lock().unwrap().messages.is_empty());
        let err = store.list_messages().await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
        let err = store.get_settings().await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }
}
