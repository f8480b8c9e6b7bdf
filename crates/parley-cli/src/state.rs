//! Application state shared by every command.
//!
//! AppState resolves the data directory, loads `config.toml`, and opens the
//! SQLite store once per process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use parley_core::store::LocalStore;
use parley_infra::config::load_client_config;
use parley_infra::paths::resolve_data_dir;
use parley_infra::sqlite::SqliteStore;
use parley_infra::sqlite::pool::database_url;
use parley_types::config::ClientConfig;
use parley_types::settings::Settings;

/// Environment variable whose value seeds the API key when none is stored.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Shared application state.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: ClientConfig,
    pub store: Arc<SqliteStore>,
}

impl AppState {
    /// Initialize the application state: data dir, config, database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_client_config(&data_dir).await;

        let store = SqliteStore::initialize(&database_url(&data_dir))
            .await
            .with_context(|| format!("failed to open database in {}", data_dir.display()))?;

        tracing::debug!(data_dir = %data_dir.display(), model = %config.model, "app state ready");

        Ok(Self {
            data_dir,
            config,
            store: Arc::new(store),
        })
    }

    /// The stored settings.
    ///
    /// When no key is stored and `GEMINI_API_KEY` is set, that value becomes
    /// the stored key.
    pub async fn settings(&self) -> anyhow::Result<Settings> {
        let settings = self.store.get_settings().await?;
        let env_key = std::env::var(API_KEY_ENV).ok();
        seed_key_from_env(self.store.as_ref(), settings, env_key).await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Persist `env_key` as the API key if `settings` has none.
async fn seed_key_from_env<S: LocalStore>(
    store: &S,
    mut settings: Settings,
    env_key: Option<String>,
) -> anyhow::Result<Settings> {
    if settings.has_api_key() {
        return Ok(settings);
    }
    let Some(key) = env_key.filter(|k| !k.trim().is_empty()) else {
        return Ok(settings);
    };

    settings.api_key = Some(SecretString::from(key.trim().to_string()));
    store.put_settings(&settings).await?;
    tracing::info!("stored API key from {API_KEY_ENV}");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::store::MemoryStore;
    use parley_types::settings::Theme;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn env_key_seeds_empty_settings() {
        let store = MemoryStore::new();
        let settings = seed_key_from_env(&store, Settings::default(), Some(" AIza-env ".to_string()))
            .await
            .unwrap();
        assert_eq!(settings.api_key.unwrap().expose_secret(), "AIza-env");

        let stored = store.get_settings().await.unwrap();
        assert!(stored.has_api_key());
    }

    #[tokio::test]
    async fn env_key_never_replaces_stored_key() {
        let store = MemoryStore::new();
        let existing = Settings {
            api_key: Some(SecretString::from("stored")),
            theme: Theme::Dark,
        };
        let settings = seed_key_from_env(&store, existing, Some("from-env".to_string()))
            .await
            .unwrap();
        assert_eq!(settings.api_key.unwrap().expose_secret(), "stored");
        assert!(!store.get_settings().await.unwrap().has_api_key());
    }

    #[tokio::test]
    async fn blank_env_key_is_ignored() {
        let store = MemoryStore::new();
        let settings = seed_key_from_env(&store, Settings::default(), Some("   ".to_string()))
            .await
            .unwrap();
        assert!(!settings.has_api_key());
    }
}
