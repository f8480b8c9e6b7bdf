//! SQLite local store implementation.
//!
//! Implements `LocalStore` from `parley-core` using sqlx with split
//! read/write pools. The handle starts open (`initialize`) or closed
//! (`uninitialized`); every operation on a closed handle fails with
//! `StoreError::NotInitialized`.

use std::sync::RwLock;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;

use parley_core::store::LocalStore;
use parley_types::chat::{Message, MessageRole, MessageStatus};
use parley_types::error::StoreError;
use parley_types::settings::{SETTINGS_KEY, Settings, Theme};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `LocalStore`.
pub struct SqliteStore {
    pool: RwLock<Option<DatabasePool>>,
}

impl SqliteStore {
    /// Open the database at `database_url`, provisioning tables if absent.
    pub async fn initialize(database_url: &str) -> Result<Self, StoreError> {
        let pool = DatabasePool::new(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tracing::debug!("local store initialized");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already-open pool.
    pub fn from_pool(pool: DatabasePool) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
        }
    }

    /// A handle that is not connected to any database.
    pub fn uninitialized() -> Self {
        Self {
            pool: RwLock::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.read().map(|p| p.is_some()).unwrap_or(false)
    }

    /// Release the connection pools. Later operations fail with `NotInitialized`.
    pub async fn close(&self) {
        let pool = self.pool.write().ok().and_then(|mut slot| slot.take());
        if let Some(pool) = pool {
            pool.close().await;
            tracing::debug!("local store closed");
        }
    }

    fn pool(&self) -> Result<DatabasePool, StoreError> {
        self.pool
            .read()
            .map_err(|e| StoreError::Unavailable(format!("pool lock poisoned: {e}")))?
            .clone()
            .ok_or(StoreError::NotInitialized)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    id: String,
    content: String,
    role: String,
    timestamp: i64,
    status: String,
    streaming_complete: Option<bool>,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            role: row.try_get("role")?,
            timestamp: row.try_get("timestamp")?,
            status: row.try_get("status")?,
            streaming_complete: row.try_get("streaming_complete")?,
        })
    }

    fn into_message(self) -> Result<Message, StoreError> {
        let role: MessageRole = self.role.parse().map_err(StoreError::Corrupt)?;
        let status: MessageStatus = self.status.parse().map_err(StoreError::Corrupt)?;

        Ok(Message {
            id: self.id,
            content: self.content,
            role,
            timestamp: self.timestamp,
            status,
            streaming_complete: self.streaming_complete,
        })
    }
}

struct SettingsRow {
    api_key: Option<String>,
    theme: String,
}

impl SettingsRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            api_key: row.try_get("api_key")?,
            theme: row.try_get("theme")?,
        })
    }

    fn into_settings(self) -> Result<Settings, StoreError> {
        let theme: Theme = self.theme.parse().map_err(StoreError::Corrupt)?;
        Ok(Settings {
            api_key: self.api_key.map(SecretString::from),
            theme,
        })
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StoreError::Unavailable(e.to_string()),
        other => StoreError::Transaction(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// LocalStore implementation
// ---------------------------------------------------------------------------

impl LocalStore for SqliteStore {
    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let pool = self.pool()?;

        sqlx::query(
            r#"INSERT INTO messages (id, content, role, timestamp, status, streaming_complete)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   content = excluded.content,
                   role = excluded.role,
                   timestamp = excluded.timestamp,
                   status = excluded.status,
                   streaming_complete = excluded.streaming_complete"#,
        )
        .bind(&message.id)
        .bind(&message.content)
        .bind(message.role.to_string())
        .bind(message.timestamp)
        .bind(message.status.to_string())
        .bind(message.streaming_complete)
        .execute(&pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        let pool = self.pool()?;

        // rowid survives upserts, so it preserves first-insertion order on ties.
        let rows = sqlx::query(
            "SELECT id, content, role, timestamp, status, streaming_complete FROM messages ORDER BY timestamp ASC, rowid ASC",
        )
        .fetch_all(&pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                MessageRow::from_row(row)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?
                    .into_message()
            })
            .collect()
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let api_key = settings
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_string());

        sqlx::query(
            r#"INSERT INTO settings (id, api_key, theme, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   api_key = excluded.api_key,
                   theme = excluded.theme,
                   updated_at = excluded.updated_at"#,
        )
        .bind(SETTINGS_KEY)
        .bind(api_key)
        .bind(settings.theme.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        let pool = self.pool()?;

        let row = sqlx::query("SELECT api_key, theme FROM settings WHERE id = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(&pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => SettingsRow::from_row(&row)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
                .into_settings(),
            None => Ok(Settings::default()),
        }
    }

    async fn clear_messages(&self) -> Result<(), StoreError> {
        let pool = self.pool()?;

        sqlx::query("DELETE FROM messages")
            .execute(&pool.writer)
            .await
            .map_err(query_error)?;

        Ok(())
    }
}
