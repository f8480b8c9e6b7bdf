//! Local store trait.
//!
//! Defines the interface for the durable transcript and settings store.
//! The SQLite implementation lives in parley-infra; an in-memory one lives
//! in [`memory`].

pub mod memory;

use std::sync::Arc;

use parley_types::chat::Message;
use parley_types::error::StoreError;
use parley_types::settings::Settings;

pub use memory::MemoryStore;

/// Trait for the local message and settings store.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait LocalStore: Send + Sync {
    /// Insert a message, or replace the stored record with the same id.
    fn put_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All stored messages in ascending timestamp order.
    ///
    /// Messages with equal timestamps keep their first-insertion order.
    fn list_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Overwrite the settings singleton.
    fn put_settings(
        &self,
        settings: &Settings,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// The stored settings, or `Settings::default()` if none were saved.
    fn get_settings(
        &self,
    ) -> impl std::future::Future<Output = Result<Settings, StoreError>> + Send;

    /// Delete every stored message. Settings are left untouched.
    fn clear_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// A shared store is a store: lets the controller and the settings commands
/// use one connection pool.
impl<T: LocalStore> LocalStore for Arc<T> {
    fn put_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        (**self).put_message(message)
    }

    fn list_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send {
        (**self).list_messages()
    }

    fn put_settings(
        &self,
        settings: &Settings,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        (**self).put_settings(settings)
    }

    fn get_settings(
        &self,
    ) -> impl std::future::Future<Output = Result<Settings, StoreError>> + Send {
        (**self).get_settings()
    }

    fn clear_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        (**self).clear_messages()
    }
}
