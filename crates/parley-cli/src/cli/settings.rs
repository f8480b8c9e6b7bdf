//! Settings CLI commands: set key, set theme, show.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Password;
use secrecy::SecretString;

use parley_core::store::LocalStore;
use parley_infra::paths::{config_path, database_path};
use parley_types::config::SubmitMode;
use parley_types::settings::{Theme, mask_secret};

use crate::state::AppState;

/// Store the Gemini API key, prompting with hidden input when no value is given.
///
/// ```bash
/// # Secure prompt (recommended)
/// parley set key
///
/// # Script/automation mode
/// parley set key --value AIza...
/// ```
pub async fn set_key(state: &AppState, value: Option<&str>, json: bool) -> Result<()> {
    let key = match value {
        Some(v) => v.to_string(),
        None => Password::new()
            .with_prompt(format!("Enter your {} API key", style("Gemini").bold()))
            .interact()?,
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }

    let mut settings = state.settings().await?;
    let masked = mask_secret(&key);
    settings.api_key = Some(SecretString::from(key));
    state.store.put_settings(&settings).await?;

    if json {
        println!("{}", serde_json::json!({"set": true, "key": "api_key", "masked": masked}));
    } else {
        println!("  {} API key saved ({})", style("✓").green().bold(), masked);
    }

    Ok(())
}

/// Persist the theme preference.
pub async fn set_theme(state: &AppState, theme: Theme, json: bool) -> Result<()> {
    let mut settings = state.settings().await?;
    settings.theme = theme;
    state.store.put_settings(&settings).await?;

    if json {
        println!("{}", serde_json::json!({"set": true, "key": "theme", "value": theme}));
    } else {
        println!("  {} Theme set to {}", style("✓").green().bold(), style(theme).bold());
    }

    Ok(())
}

/// Show the stored settings and the effective client configuration.
pub async fn show_settings(state: &AppState, json: bool) -> Result<()> {
    let settings = state.settings().await?;
    let masked = settings.masked_api_key();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "api_key": masked,
                "theme": settings.theme,
                "model": state.config.model,
                "submit_mode": state.config.submit_mode,
                "data_dir": state.data_dir.display().to_string(),
            }))?
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Setting").fg(Color::White),
        Cell::new("Value").fg(Color::White),
    ]);

    let key_cell = match masked {
        Some(m) if settings.has_api_key() => Cell::new(m).fg(Color::Cyan),
        _ => Cell::new("not set").fg(Color::Yellow),
    };
    table.add_row(vec![Cell::new("API key"), key_cell]);
    table.add_row(vec![Cell::new("Theme"), Cell::new(settings.theme.to_string())]);
    table.add_row(vec![Cell::new("Model"), Cell::new(&state.config.model)]);
    table.add_row(vec![
        Cell::new("Submit mode"),
        Cell::new(submit_mode_label(state.config.submit_mode)),
    ]);
    table.add_row(vec![
        Cell::new("Database"),
        Cell::new(database_path(&state.data_dir).display().to_string()).fg(Color::DarkGrey),
    ]);
    table.add_row(vec![
        Cell::new("Config file"),
        Cell::new(config_path(&state.data_dir).display().to_string()).fg(Color::DarkGrey),
    ]);

    println!();
    println!("{table}");
    if !settings.has_api_key() {
        println!();
        println!(
            "  {} No API key stored. Add one with: {}",
            style("i").blue().bold(),
            style("parley set key").yellow()
        );
    }
    println!();

    Ok(())
}

/// Human label for the submit key binding.
pub fn submit_mode_label(mode: SubmitMode) -> &'static str {
    match mode {
        SubmitMode::Enter => "Enter sends, \\ + Enter adds a line",
        SubmitMode::ModifierEnter => "\\ + Enter sends, Enter adds a line",
    }
}
