//! User settings for Parley.
//!
//! `Settings` is a singleton record: one instance per installation, stored
//! under a fixed key and overwritten wholesale on every save.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Fixed key under which the settings record is persisted.
pub const SETTINGS_KEY: &str = "user-settings";

/// Color theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    /// The theme the toggle switches to: dark becomes light, anything else dark.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light | Theme::System => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
            Theme::System => write!(f, "system"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!("invalid theme: '{other}'")),
        }
    }
}

/// Per-installation user settings.
///
/// The API key is held as a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub api_key: Option<SecretString>,
    pub theme: Theme,
}

impl Settings {
    /// Whether a non-blank API key is stored.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    /// The API key with all but the first and last four characters hidden.
    ///
    /// Keys of eight characters or fewer are hidden entirely.
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| mask_secret(key.expose_secret()))
    }
}

/// Mask a secret for display, e.g. `AIza...wxyz`.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
