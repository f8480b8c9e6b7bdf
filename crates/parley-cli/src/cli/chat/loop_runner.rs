//! Main chat loop orchestration.
//!
//! Builds a conversation controller over the SQLite store (or an in-memory
//! store for `--ephemeral`), installs a chat client when a key is stored,
//! then reads drafts until Ctrl+D. Each turn subscribes to the controller's
//! events and prints them while the send is in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use console::style;
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use parley_core::chat::{ConversationController, SendOutcome};
use parley_core::store::{LocalStore, MemoryStore};
use parley_infra::llm::build_chat_client;
use parley_types::chat::{MessageRole, MessageStatus};
use parley_types::config::ClientConfig;
use parley_types::error::SendError;
use parley_types::event::ChatEvent;
use parley_types::settings::Settings;

use crate::state::AppState;

use super::banner::{BannerInfo, print_welcome_banner};
use super::commands::{self, ChatCommand};
use super::composer::{Compose, Composer};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;
use super::transcript_view::{ASSISTANT_LABEL, print_transcript, terminal_width};

/// Run the interactive chat loop.
///
/// Settings are always read from and written to the SQLite store; only the
/// transcript is kept in memory when `ephemeral` is set.
pub async fn run_chat_loop(state: &AppState, ephemeral: bool) -> anyhow::Result<()> {
    if ephemeral {
        let controller = ConversationController::new(MemoryStore::new());
        let result = run_session(state, &controller, true).await;
        controller.store().close();
        debug!("ephemeral transcript discarded");
        result
    } else {
        let controller = ConversationController::new(Arc::clone(&state.store));
        run_session(state, &controller, false).await
    }
}

/// Whether the loop keeps reading after a slash command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

async fn run_session<S: LocalStore>(
    state: &AppState,
    controller: &ConversationController<S>,
    ephemeral: bool,
) -> anyhow::Result<()> {
    let mut settings = state.settings().await?;

    let history_len = controller
        .load_history()
        .await
        .context("failed to load conversation history")?;

    if let Some(key) = settings.api_key.clone().filter(|_| settings.has_api_key()) {
        install_client(controller, key, &state.config).await;
    }

    let mut renderer = ChatRenderer::new(settings.theme);
    print_welcome_banner(&BannerInfo {
        model: &state.config.model,
        history_len,
        ephemeral,
        has_key: controller.has_client(),
        submit_mode: state.config.submit_mode,
    });
    if history_len > 0 {
        print_transcript(&controller.transcript(), &renderer, terminal_width());
    }

    let (mut input, _writer) =
        ChatInput::new().map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let mut composer = Composer::new(state.config.submit_mode);

    loop {
        input.set_composing(composer.is_composing());

        let text = match input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                if composer.is_composing() {
                    composer.discard();
                    println!("\n  {}", style("Draft discarded.").dim());
                } else {
                    println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                }
                continue;
            }
            InputEvent::Line(line) => {
                composer.set_enabled(!controller.is_busy());
                match composer.feed(&line) {
                    Compose::Submit(text) => text,
                    Compose::Continue | Compose::Empty => continue,
                }
            }
        };

        // Slash commands are single-line; a multi-line draft is always a message.
        if !text.contains('\n') {
            if let Some(command) = commands::parse(&text) {
                let flow = handle_command(
                    command,
                    state,
                    controller,
                    &mut settings,
                    &mut renderer,
                    &mut composer,
                    &mut input,
                )
                .await;
                if flow == Flow::Exit {
                    println!("\n  {}", style("Session ended.").dim());
                    break;
                }
                continue;
            }
        }

        run_turn(controller, &renderer, &text).await;
    }

    input.flush();
    Ok(())
}

async fn handle_command<S: LocalStore>(
    command: ChatCommand,
    state: &AppState,
    controller: &ConversationController<S>,
    settings: &mut Settings,
    renderer: &mut ChatRenderer,
    composer: &mut Composer,
    input: &mut ChatInput,
) -> Flow {
    match command {
        ChatCommand::Help => commands::print_help(),
        ChatCommand::Clear => input.clear(),
        ChatCommand::Exit => return Flow::Exit,
        ChatCommand::History => {
            println!();
            print_transcript(&controller.transcript(), renderer, terminal_width());
        }
        ChatCommand::Theme(theme) => {
            let theme = theme.unwrap_or_else(|| settings.theme.toggled());
            settings.theme = theme;
            renderer.set_theme(theme);
            match state.store.put_settings(settings).await {
                Ok(()) => println!("\n  {} Theme set to {}\n", style("✓").green().bold(), style(theme).bold()),
                Err(e) => print_failure(&format!("Theme applied but not saved: {e}")),
            }
        }
        ChatCommand::Key => {
            let Some(key) = prompt_api_key().await else {
                println!("\n  {}\n", style("API key unchanged.").dim());
                return Flow::Continue;
            };
            settings.api_key = Some(SecretString::from(key));
            if let Err(e) = state.store.put_settings(settings).await {
                print_failure(&format!("Could not save API key: {e}"));
                return Flow::Continue;
            }
            if let Some(key) = settings.api_key.clone() {
                if install_client(controller, key, &state.config).await {
                    println!("\n  {} API key saved ({})\n", style("✓").green().bold(), settings.masked_api_key().unwrap_or_default());
                }
            }
        }
        ChatCommand::ClearHistory => {
            let count = controller.transcript().len();
            if count == 0 {
                println!("\n  {}\n", style("Nothing to clear.").dim());
                return Flow::Continue;
            }
            if !confirm(format!("Delete {count} message{}?", if count == 1 { "" } else { "s" })).await {
                println!("  Cancelled.");
                return Flow::Continue;
            }
            match controller.clear_history().await {
                Ok(()) => println!("\n  {} History cleared\n", style("✓").green().bold()),
                Err(e) => print_failure(&format!("Could not clear history: {e}")),
            }
        }
        ChatCommand::Multiline => {
            let mode = composer.toggle_mode();
            println!(
                "\n  {} {}\n",
                style("✓").green().bold(),
                crate::cli::settings::submit_mode_label(mode)
            );
        }
        ChatCommand::Unknown(what) => {
            println!(
                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                style("?").yellow().bold(),
                style(what).dim()
            );
        }
    }
    Flow::Continue
}

/// Build a client for `key` and hand it to the controller.
///
/// Returns whether a client is now installed.
async fn install_client<S: LocalStore>(
    controller: &ConversationController<S>,
    key: SecretString,
    config: &ClientConfig,
) -> bool {
    match build_chat_client(key, config) {
        Ok(client) => {
            controller.set_client(Some(client)).await;
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to build chat client");
            print_failure(&format!("Could not set up the Gemini client: {e}"));
            false
        }
    }
}

/// Send one message and print the turn as its events arrive.
async fn run_turn<S: LocalStore>(controller: &ConversationController<S>, renderer: &ChatRenderer, text: &str) {
    let mut events = controller.subscribe();
    let mut printer = TurnPrinter::new(renderer);
    let started = Instant::now();

    let send = controller.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => printer.handle(&event),
                Err(RecvError::Lagged(skipped)) => printer.note_lagged(skipped),
                Err(RecvError::Closed) => break (&mut send).await,
            },
            result = &mut send => break result,
        }
    };
    drain_pending(&mut events, &mut printer);
    printer.finish();

    match result {
        Ok(SendOutcome::Ignored) => {}
        Ok(SendOutcome::Completed { message_id, chunks, usage, model }) => {
            if printer.missed > 0 {
                reprint_reply(controller, renderer, &message_id);
            }
            let elapsed_ms = started.elapsed().as_millis() as u64;
            renderer.print_stats_footer(usage.output_tokens, chunks, elapsed_ms, &model);
            println!();
        }
        Ok(SendOutcome::Failed { error, .. }) => {
            eprintln!("  {} {}", style("!").red().bold(), style(error).dim());
            eprintln!("  {}", style("Type a message to retry, /exit to quit.").dim());
            println!();
        }
        Err(SendError::MissingCredential) => {
            println!();
            println!(
                "  {} No Gemini API key is set. Run {} or {} first.",
                style("!").yellow().bold(),
                style("/key").yellow(),
                style("parley set key").yellow()
            );
            println!();
        }
        Err(SendError::Busy) => print_failure("A reply is still on its way."),
        Err(SendError::Store(e)) => print_failure(&format!("Could not save the conversation: {e}")),
    }
}

/// Handle every event already queued, stepping over a lag gap.
fn drain_pending(events: &mut Receiver<ChatEvent>, printer: &mut TurnPrinter<'_>) {
    loop {
        match events.try_recv() {
            Ok(event) => printer.handle(&event),
            Err(TryRecvError::Lagged(skipped)) => printer.note_lagged(skipped),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Print the finished reply from the transcript, for turns whose live
/// output lost events.
fn reprint_reply<S: LocalStore>(controller: &ConversationController<S>, renderer: &ChatRenderer, message_id: &str) {
    let transcript = controller.transcript();
    let Some(message) = transcript.iter().find(|m| m.id == message_id) else {
        return;
    };
    println!("\n  {} {}", style(ASSISTANT_LABEL).magenta().bold(), style("(full reply)").dim());
    for line in renderer.render_final(&message.content).lines() {
        println!("  {line}");
    }
}

/// Prints one turn from controller events.
struct TurnPrinter<'a> {
    renderer: &'a ChatRenderer,
    assistant_id: Option<String>,
    spinner: Option<ProgressBar>,
    streaming: bool,
    /// Events dropped because the receiver fell behind.
    missed: u64,
}

impl<'a> TurnPrinter<'a> {
    fn new(renderer: &'a ChatRenderer) -> Self {
        Self {
            renderer,
            assistant_id: None,
            spinner: None,
            streaming: false,
            missed: 0,
        }
    }

    fn note_lagged(&mut self, skipped: u64) {
        debug!(skipped, "event receiver lagged");
        self.missed += skipped;
    }

    fn handle(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::MessageAppended { message } if message.role == MessageRole::Assistant => {
                self.assistant_id = Some(message.id.clone());
                self.spinner = Some(thinking_spinner());
            }
            ChatEvent::ChunkApplied { message_id, chunk } => {
                if self.assistant_id.as_deref() != Some(message_id.as_str()) {
                    return;
                }
                if !self.streaming {
                    self.clear_spinner();
                    self.streaming = true;
                    print!("\n  {} ", style(ASSISTANT_LABEL).magenta().bold());
                }
                self.renderer.print_chunk(chunk);
            }
            ChatEvent::MessageFinalized { message } if message.status == MessageStatus::Error => {
                self.clear_spinner();
                if self.streaming {
                    println!();
                    self.streaming = false;
                }
                println!("\n  {} {}", style(ASSISTANT_LABEL).magenta().bold(), style(&message.content).red());
            }
            _ => {}
        }
    }

    fn finish(&mut self) {
        self.clear_spinner();
        if self.streaming {
            println!();
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::default_spinner()
        .template("  {spinner:.magenta} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(spinner_style);
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_failure(message: &str) {
    println!("\n  {} {}\n", style("!").red().bold(), message);
}

/// Ask for a key with hidden input. `None` when cancelled or blank.
async fn prompt_api_key() -> Option<String> {
    let entered = tokio::task::spawn_blocking(|| {
        Password::new()
            .with_prompt("Gemini API key")
            .allow_empty_password(true)
            .interact()
            .ok()
    })
    .await
    .ok()
    .flatten()?;

    let key = entered.trim().to_string();
    (!key.is_empty()).then_some(key)
}

async fn confirm(prompt: String) -> bool {
    tokio::task::spawn_blocking(move || {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::chat::Message;
    use parley_types::settings::Theme;

    fn printer_renderer() -> ChatRenderer {
        ChatRenderer::new(Theme::Dark)
    }

    #[test]
    fn printer_tracks_assistant_placeholder() {
        let renderer = printer_renderer();
        let mut printer = TurnPrinter::new(&renderer);

        printer.handle(&ChatEvent::MessageAppended {
            message: Message::user_at("hi", 1),
        });
        assert!(printer.assistant_id.is_none());

        let placeholder = Message::assistant_placeholder(2);
        printer.handle(&ChatEvent::MessageAppended {
            message: placeholder.clone(),
        });
        assert_eq!(printer.assistant_id.as_deref(), Some(placeholder.id.as_str()));
        assert!(printer.spinner.is_some());

        printer.handle(&ChatEvent::ChunkApplied {
            message_id: placeholder.id.clone(),
            chunk: "Hello".to_string(),
        });
        assert!(printer.streaming);
        assert!(printer.spinner.is_none());

        printer.finish();
    }

    #[test]
    fn printer_ignores_chunks_for_other_messages() {
        let renderer = printer_renderer();
        let mut printer = TurnPrinter::new(&renderer);
        printer.handle(&ChatEvent::MessageAppended {
            message: Message::assistant_placeholder(1),
        });

        printer.handle(&ChatEvent::ChunkApplied {
            message_id: "someone-else".to_string(),
            chunk: "x".to_string(),
        });
        assert!(!printer.streaming);
        assert!(printer.spinner.is_some());
        printer.finish();
        assert!(printer.spinner.is_none());
    }

    #[test]
    fn drain_steps_over_lag_and_keeps_reading() {
        let renderer = printer_renderer();
        let mut printer = TurnPrinter::new(&renderer);
        let (tx, mut rx) = tokio::sync::broadcast::channel(4);

        let placeholder = Message::assistant_placeholder(1);
        printer.handle(&ChatEvent::MessageAppended {
            message: placeholder.clone(),
        });
        for i in 0..10 {
            tx.send(ChatEvent::ChunkApplied {
                message_id: placeholder.id.clone(),
                chunk: i.to_string(),
            })
            .unwrap();
        }

        drain_pending(&mut rx, &mut printer);
        assert_eq!(printer.missed, 6);
        assert!(printer.streaming);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        printer.finish();
    }

    #[test]
    fn printer_clears_spinner_on_error() {
        let renderer = printer_renderer();
        let mut printer = TurnPrinter::new(&renderer);
        let mut placeholder = Message::assistant_placeholder(1);
        printer.handle(&ChatEvent::MessageAppended {
            message: placeholder.clone(),
        });

        placeholder.status = MessageStatus::Error;
        placeholder.content = "Sorry".to_string();
        printer.handle(&ChatEvent::MessageFinalized { message: placeholder });
        assert!(printer.spinner.is_none());
        assert!(!printer.streaming);
    }
}
