//! History CLI commands: show and clear the stored conversation.

use anyhow::Result;
use chrono::{Local, TimeZone};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use parley_core::store::LocalStore;
use parley_types::chat::{Message, MessageRole, MessageStatus};

use crate::state::AppState;

/// Longest preview shown per message, in characters.
const PREVIEW_CHARS: usize = 60;

/// Print the stored conversation, oldest first.
///
/// ```bash
/// parley history
/// parley history --limit 10 --json
/// ```
pub async fn show_history(state: &AppState, limit: Option<usize>, json: bool) -> Result<()> {
    let messages = state.store.list_messages().await?;
    let messages = most_recent(&messages, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages yet. Start chatting with: {}",
            style("i").blue().bold(),
            style("parley").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Message").fg(Color::White),
    ]);

    for message in messages {
        let role = match message.role {
            MessageRole::User => Cell::new("you").fg(Color::Cyan),
            MessageRole::Assistant => Cell::new("gemini").fg(Color::Magenta),
        };
        let status = match message.status {
            MessageStatus::Sent => Cell::new("sent").fg(Color::Green),
            MessageStatus::Sending => Cell::new("sending").fg(Color::Yellow),
            MessageStatus::Error => Cell::new("error").fg(Color::Red),
        };

        table.add_row(vec![
            Cell::new(format_timestamp(message.timestamp)).fg(Color::DarkGrey),
            role,
            status,
            Cell::new(preview(&message.content, PREVIEW_CHARS)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} message{}",
        style(messages.len()).bold(),
        if messages.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Delete every stored message after confirmation (skipped with `--yes`).
pub async fn clear_history(state: &AppState, yes: bool, json: bool) -> Result<()> {
    let count = state.store.list_messages().await?.len();

    if !yes && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} stored message{}?",
                style(count).red().bold(),
                if count == 1 { "" } else { "s" }
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.store.clear_messages().await?;
    tracing::info!(count, "cleared stored conversation");

    if json {
        println!("{}", serde_json::json!({"cleared": true, "count": count}));
    } else {
        println!("  {} Cleared {} message{}", style("✓").green().bold(), count, if count == 1 { "" } else { "s" });
    }

    Ok(())
}

/// The last `limit` messages, or all of them.
fn most_recent(messages: &[Message], limit: Option<usize>) -> &[Message] {
    match limit {
        Some(n) if n < messages.len() => &messages[messages.len() - n..],
        _ => messages,
    }
}

/// Local wall-clock time for an epoch-millisecond timestamp.
fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// First line of `content`, cut to `max` characters.
fn preview(content: &str, max: usize) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    let mut out: String = line.chars().take(max).collect();
    let truncated = line.chars().count() > max || content.trim_end().contains('\n');
    if truncated {
        out.push_str("...");
    }
    out
}
