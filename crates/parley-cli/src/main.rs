//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, opens the local store, then dispatches to the
//! requested command or starts an interactive chat session.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SetResource};
use parley_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = filter_for_verbosity(cli.verbose, cli.quiet);
    init_tracing(filter, cli.otel).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Commands::Chat { ephemeral: false });

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let outcome = match command {
        Commands::Chat { ephemeral } => cli::chat::loop_runner::run_chat_loop(&state, ephemeral).await,

        Commands::Set { resource } => match resource {
            SetResource::Key { value } => cli::settings::set_key(&state, value.as_deref(), cli.json).await,
            SetResource::Theme { theme } => cli::settings::set_theme(&state, theme, cli.json).await,
        },

        Commands::Settings => cli::settings::show_settings(&state, cli.json).await,

        Commands::History { limit, clear, yes } => {
            if clear {
                cli::history::clear_history(&state, yes, cli.json).await
            } else {
                cli::history::show_history(&state, limit, cli.json).await
            }
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    state.close().await;
    outcome
}
