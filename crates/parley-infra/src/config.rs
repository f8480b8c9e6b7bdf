//! Client configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` in production)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use parley_types::config::ClientConfig;

use crate::paths::config_path;

/// Load client configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and returns the default.
/// - Otherwise returns the parsed config with out-of-range values clamped.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config_path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => sanitize(config),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ClientConfig::default()
        }
    }
}

/// Clamp values the client cannot work with.
fn sanitize(mut config: ClientConfig) -> ClientConfig {
    config.replay.chunk_chars = config.replay.chunk_chars.max(1);
    config.request_timeout_secs = config.request_timeout_secs.max(1);
    config.base_url = config.base_url.trim_end_matches('/').to_string();
    config
}
