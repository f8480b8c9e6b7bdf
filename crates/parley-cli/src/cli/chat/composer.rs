//! The message composer: a multi-line draft and the rules for submitting it.
//!
//! A line editor hands over one line per Enter press and cannot report
//! modifier keys, so a line that ends in `\` stands for "Enter with the
//! modifier". Which of the two Enters submits depends on the `SubmitMode`.

use parley_types::config::SubmitMode;

/// What the composer did with one line of input.
#[derive(Debug, PartialEq, Eq)]
pub enum Compose {
    /// The draft is complete; the trimmed text is ready to send.
    Submit(String),
    /// A line break was inserted; keep reading.
    Continue,
    /// Nothing to send (empty draft, or the composer is disabled).
    Empty,
}

/// Draft text plus the enabled flag and the submit key binding.
#[derive(Debug)]
pub struct Composer {
    lines: Vec<String>,
    enabled: bool,
    mode: SubmitMode,
}

impl Composer {
    pub fn new(mode: SubmitMode) -> Self {
        Self {
            lines: Vec::new(),
            enabled: true,
            mode,
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// Swap the submit binding and return the new one.
    pub fn toggle_mode(&mut self) -> SubmitMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Disabled while a send is in flight.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether a draft has been started.
    pub fn is_composing(&self) -> bool {
        !self.lines.is_empty()
    }

    /// The draft as it would be sent, untrimmed.
    pub fn draft(&self) -> String {
        self.lines.join("\n")
    }

    /// Drop the draft.
    pub fn discard(&mut self) {
        self.lines.clear();
    }

    /// Feed one line as typed, including a trailing `\` if present.
    pub fn feed(&mut self, line: &str) -> Compose {
        let (body, modified) = match line.strip_suffix('\\') {
            Some(body) => (body, true),
            None => (line, false),
        };

        // A plain Enter on an empty draft never starts one.
        if !modified && self.lines.is_empty() && body.trim().is_empty() {
            return Compose::Empty;
        }
        self.lines.push(body.to_string());

        let submits = match self.mode {
            SubmitMode::Enter => !modified,
            // Slash commands stay one-keystroke in either mode.
            SubmitMode::ModifierEnter => modified || self.is_single_command(),
        };

        if submits { self.submit() } else { Compose::Continue }
    }

    /// Take the draft, trimmed. Empty drafts and a disabled composer submit nothing.
    pub fn submit(&mut self) -> Compose {
        if !self.enabled {
            return Compose::Empty;
        }
        let text = self.draft().trim().to_string();
        self.lines.clear();
        if text.is_empty() {
            Compose::Empty
        } else {
            Compose::Submit(text)
        }
    }

    fn is_single_command(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].trim_start().starts_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_mode_submits_on_plain_enter() {
        let mut composer = Composer::new(SubmitMode::Enter);
        assert_eq!(composer.feed("  hello  "), Compose::Submit("hello".to_string()));
        assert!(!composer.is_composing());
    }

    #[test]
    fn enter_mode_backslash_inserts_line_break() {
        let mut composer = Composer::new(SubmitMode::Enter);
        assert_eq!(composer.feed("first\\"), Compose::Continue);
        assert_eq!(composer.draft(), "first");
        assert_eq!(
            composer.feed("second"),
            Compose::Submit("first\nsecond".to_string())
        );
    }

    #[test]
    fn modifier_mode_plain_enter_inserts_line_break() {
        let mut composer = Composer::new(SubmitMode::ModifierEnter);
        assert_eq!(composer.feed("one"), Compose::Continue);
        assert_eq!(composer.feed("two"), Compose::Continue);
        assert_eq!(composer.feed("three\\"), Compose::Submit("one\ntwo\nthree".to_string()));
    }

    #[test]
    fn modifier_mode_commands_submit_immediately() {
        let mut composer = Composer::new(SubmitMode::ModifierEnter);
        assert_eq!(composer.feed("/help"), Compose::Submit("/help".to_string()));

        assert_eq!(composer.feed("text"), Compose::Continue);
        assert_eq!(composer.feed("/not-a-command-here"), Compose::Continue);
    }

    #[test]
    fn whitespace_only_draft_submits_nothing() {
        let mut composer = Composer::new(SubmitMode::Enter);
        assert_eq!(composer.feed("   "), Compose::Empty);
        assert_eq!(composer.feed(""), Compose::Empty);

        assert_eq!(composer.feed(" \\"), Compose::Continue);
        assert_eq!(composer.feed("  "), Compose::Empty);
        assert!(!composer.is_composing());
    }

    #[test]
    fn disabled_composer_keeps_draft() {
        let mut composer = Composer::new(SubmitMode::Enter);
        composer.set_enabled(false);
        assert_eq!(composer.feed("hello"), Compose::Empty);
        assert_eq!(composer.draft(), "hello");

        composer.set_enabled(true);
        assert_eq!(composer.submit(), Compose::Submit("hello".to_string()));
    }

    #[test]
    fn toggle_mode_swaps_binding() {
        let mut composer = Composer::new(SubmitMode::Enter);
        assert_eq!(composer.toggle_mode(), SubmitMode::ModifierEnter);
        assert_eq!(composer.mode(), SubmitMode::ModifierEnter);
        assert_eq!(composer.toggle_mode(), SubmitMode::Enter);
    }

    #[test]
    fn discard_clears_draft() {
        let mut composer = Composer::new(SubmitMode::ModifierEnter);
        composer.feed("partial");
        assert!(composer.is_composing());
        composer.discard();
        assert!(!composer.is_composing());
        assert_eq!(composer.draft(), "");
    }
}
