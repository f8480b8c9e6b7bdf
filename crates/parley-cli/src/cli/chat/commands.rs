//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for the screen,
//! the stored history, the theme, and the API key.

use console::style;

use parley_types::settings::Theme;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat session.
    Exit,
    /// Reprint the whole transcript.
    History,
    /// Set the theme, or toggle dark/light when no theme is given.
    Theme(Option<Theme>),
    /// Prompt for a new API key.
    Key,
    /// Delete the stored conversation.
    ClearHistory,
    /// Swap which Enter combination submits.
    Multiline,
    /// Unknown command or bad argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/history" => ChatCommand::History,
        "/theme" => match arg.map(str::parse::<Theme>) {
            None => ChatCommand::Theme(None),
            Some(Ok(theme)) => ChatCommand::Theme(Some(theme)),
            Some(Err(e)) => ChatCommand::Unknown(e),
        },
        "/key" => ChatCommand::Key,
        "/clear-history" => ChatCommand::ClearHistory,
        "/multiline" | "/ml" => ChatCommand::Multiline,
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Print the help text listing all available commands.
pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Clear the screen"),
        ("/history", "Reprint the conversation"),
        ("/theme [light|dark|system]", "Set the theme, or toggle dark/light"),
        ("/key", "Enter a new Gemini API key"),
        ("/clear-history", "Delete the stored conversation"),
        ("/multiline", "Swap Enter and \\ + Enter"),
        ("/exit", "End the chat session"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (cmd, description) in rows {
        println!("  {:<28} {}", style(cmd).cyan(), description);
    }
    println!();
    println!(
        "  {}",
        style("End a line with \\ to use the other Enter. Ctrl+D to exit.").dim()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("  /Q  "), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_theme() {
        assert_eq!(parse("/theme"), Some(ChatCommand::Theme(None)));
        assert_eq!(parse("/theme light"), Some(ChatCommand::Theme(Some(Theme::Light))));
        assert_eq!(parse("/theme  System "), Some(ChatCommand::Theme(Some(Theme::System))));
        assert_eq!(
            parse("/theme neon"),
            Some(ChatCommand::Unknown("invalid theme: 'neon'".to_string()))
        );
    }

    #[test]
    fn test_parse_history_commands() {
        assert_eq!(parse("/history"), Some(ChatCommand::History));
        assert_eq!(parse("/clear-history"), Some(ChatCommand::ClearHistory));
        assert_eq!(parse("/clear"), Some(ChatCommand::Clear));
    }

    #[test]
    fn test_parse_key_and_multiline() {
        assert_eq!(parse("/key"), Some(ChatCommand::Key));
        assert_eq!(parse("/multiline"), Some(ChatCommand::Multiline));
        assert_eq!(parse("/ml"), Some(ChatCommand::Multiline));
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("hello world"), None);
        assert_eq!(parse("a /help"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("/foo"), Some(ChatCommand::Unknown("/foo".to_string())));
    }
}
