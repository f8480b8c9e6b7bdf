//! Welcome banner display for chat sessions.

use console::style;

use crate::cli::settings::submit_mode_label;
use parley_types::config::SubmitMode;

/// What the banner reports about the session being started.
pub struct BannerInfo<'a> {
    pub model: &'a str,
    pub history_len: usize,
    pub ephemeral: bool,
    pub has_key: bool,
    pub submit_mode: SubmitMode,
}

/// Print the welcome banner at the start of a chat session.
pub fn print_welcome_banner(info: &BannerInfo<'_>) {
    let history = if info.ephemeral {
        "ephemeral (not saved)".to_string()
    } else {
        match info.history_len {
            0 => "new conversation".to_string(),
            1 => "1 stored message".to_string(),
            n => format!("{n} stored messages"),
        }
    };

    println!();
    println!("  {} {}", style("*").magenta(), style("Parley").cyan().bold());
    println!("  {}", style("Chat with Gemini from your terminal").dim());
    println!();
    println!("  {}    {}", style("Model:").bold(), style(info.model).dim());
    println!("  {}  {}", style("History:").bold(), style(history).dim());
    println!("  {}    {}", style("Input:").bold(), style(submit_mode_label(info.submit_mode)).dim());
    println!();
    if !info.has_key {
        println!(
            "  {} No API key yet. Run {} to add one.",
            style("!").yellow().bold(),
            style("/key").yellow()
        );
    }
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}
