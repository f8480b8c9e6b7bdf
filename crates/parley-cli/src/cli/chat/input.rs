//! Async readline input handling for the chat loop.
//!
//! Wraps `rustyline_async::Readline` to provide async line reading with
//! proper handling of EOF (Ctrl+D) and interrupt (Ctrl+C) signals.

use console::style;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// Events produced by the input handler.
#[derive(Debug)]
pub enum InputEvent {
    /// One line as typed, untrimmed.
    Line(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
}

/// Async input handler wrapping rustyline_async.
pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Create an input handler showing the first-line prompt.
    ///
    /// Returns the input handler and a `SharedWriter` that can be used to
    /// print output without interfering with the readline prompt.
    pub fn new() -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(first_line_prompt())?;
        Ok((Self { rl }, stdout))
    }

    /// Show the continuation prompt while a multi-line draft is open.
    pub fn set_composing(&mut self, composing: bool) {
        let prompt = if composing {
            continuation_prompt()
        } else {
            first_line_prompt()
        };
        let _ = self.rl.update_prompt(&prompt);
    }

    /// Read one line of input.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if !line.trim().is_empty() {
                    self.rl.add_history_entry(line.clone());
                }
                InputEvent::Line(line)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(_) => InputEvent::Eof,
        }
    }

    /// Clear the terminal screen.
    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Flush anything written through the shared writer.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}

fn first_line_prompt() -> String {
    format!("  {} ", style("You >").green().bold())
}

fn continuation_prompt() -> String {
    format!("  {} ", style("    .").green().dim())
}
