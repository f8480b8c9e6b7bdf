//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Running `parley` with no
//! subcommand starts an interactive chat.

pub mod chat;
pub mod history;
pub mod settings;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use parley_types::settings::Theme;

/// Chat with Gemini from your terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session (the default).
    Chat {
        /// Keep this session's transcript in memory only.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Change a setting.
    Set {
        #[command(subcommand)]
        resource: SetResource,
    },

    /// Show current settings.
    Settings,

    /// Show or clear the stored conversation.
    History {
        /// Show only the most recent N messages.
        #[arg(long)]
        limit: Option<usize>,

        /// Delete every stored message.
        #[arg(long)]
        clear: bool,

        /// Skip the confirmation prompt when clearing.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SetResource {
    /// Store the Gemini API key (prompted securely).
    Key {
        /// Key value (optional; prompts if omitted).
        #[arg(long)]
        value: Option<String>,
    },

    /// Set the color theme.
    Theme {
        /// One of: light, dark, system.
        #[arg(value_parser = parse_theme)]
        theme: Theme,
    },
}

fn parse_theme(s: &str) -> Result<Theme, String> {
    s.parse()
}
