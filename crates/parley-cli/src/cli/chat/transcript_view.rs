//! Transcript layout for the terminal.
//!
//! Consecutive messages from the same role are grouped under one label.
//! Assistant groups sit on the left under the model label, user groups on
//! the right under "You". `layout` is pure so the arrangement can be tested
//! without a terminal; `print_transcript` writes it out.

use console::{Term, measure_text_width, style};

use parley_types::chat::{Message, MessageRole, MessageStatus};

use super::renderer::ChatRenderer;

pub const ASSISTANT_LABEL: &str = "Gemini";
pub const USER_LABEL: &str = "You";

/// Left indent applied to every line.
const MARGIN: usize = 2;
/// Narrowest column we wrap to, however small the terminal.
const MIN_COLUMN: usize = 20;
/// Fallback width when stdout is not a terminal.
const DEFAULT_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    /// Still waiting for its reply (or abandoned while waiting).
    Pending,
    Error,
}

/// One message inside a group, already wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub tone: Tone,
    pub lines: Vec<String>,
    /// Render from the raw content as markdown instead of `lines`.
    pub markdown: bool,
}

/// A run of consecutive messages from one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub role: MessageRole,
    pub label: &'static str,
    pub align: Align,
    pub items: Vec<Item>,
}

/// Width of the current terminal in columns.
pub fn terminal_width() -> usize {
    let (_rows, cols) = Term::stdout().size();
    if cols == 0 { DEFAULT_WIDTH } else { cols as usize }
}

/// Column available to message text at the given terminal width.
pub fn column_width(width: usize) -> usize {
    (width.saturating_sub(MARGIN * 2) * 3 / 4).max(MIN_COLUMN)
}

/// Greedy word wrap to `width` columns.
///
/// Blank lines are kept. Words longer than the column are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            for piece in split_long(word, width) {
                let needed = if line.is_empty() {
                    measure_text_width(&piece)
                } else {
                    measure_text_width(&line) + 1 + measure_text_width(&piece)
                };
                if needed > width && !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&piece);
            }
        }
        out.push(line);
    }

    out
}

fn split_long(word: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Arrange `messages` into role groups wrapped for a terminal `width` wide.
pub fn layout(messages: &[Message], width: usize) -> Vec<Group> {
    let column = column_width(width);
    let mut groups: Vec<Group> = Vec::new();

    for message in messages {
        let tone = match message.status {
            MessageStatus::Sent => Tone::Normal,
            MessageStatus::Sending => Tone::Pending,
            MessageStatus::Error => Tone::Error,
        };
        let body = if tone == Tone::Pending && message.content.is_empty() {
            "...".to_string()
        } else {
            message.content.clone()
        };
        let item = Item {
            tone,
            lines: wrap(&body, column),
            markdown: message.role == MessageRole::Assistant && tone == Tone::Normal,
        };

        match groups.last_mut() {
            Some(group) if group.role == message.role => group.items.push(item),
            _ => {
                let (label, align) = match message.role {
                    MessageRole::Assistant => (ASSISTANT_LABEL, Align::Left),
                    MessageRole::User => (USER_LABEL, Align::Right),
                };
                groups.push(Group {
                    role: message.role,
                    label,
                    align,
                    items: vec![item],
                });
            }
        }
    }

    groups
}

/// Indent `line` for its alignment within a terminal `width` wide.
pub fn place(line: &str, align: Align, width: usize) -> String {
    let margin = " ".repeat(MARGIN);
    match align {
        Align::Left => format!("{margin}{line}"),
        Align::Right => {
            let used = measure_text_width(line);
            let pad = width.saturating_sub(MARGIN + used).max(MARGIN);
            format!("{}{line}", " ".repeat(pad))
        }
    }
}

/// Print the whole transcript.
pub fn print_transcript(messages: &[Message], renderer: &ChatRenderer, width: usize) {
    if messages.is_empty() {
        println!("  {}", style("No messages yet.").dim());
        println!();
        return;
    }

    let mut remaining = messages.iter();

    for group in layout(messages, width) {
        let label = match group.role {
            MessageRole::Assistant => style(group.label).magenta().bold(),
            MessageRole::User => style(group.label).green().bold(),
        };
        println!("{}", place(&label.to_string(), group.align, width));

        for item in &group.items {
            let Some(message) = remaining.next() else {
                break;
            };
            if item.markdown {
                for line in renderer.render_final(&message.content).lines() {
                    println!("{}", place(line, group.align, width));
                }
                continue;
            }
            for line in &item.lines {
                let styled = match item.tone {
                    Tone::Normal => style(line.as_str()),
                    Tone::Pending => style(line.as_str()).dim(),
                    Tone::Error => style(line.as_str()).red(),
                };
                println!("{}", place(&styled.to_string(), group.align, width));
            }
        }
        println!();
    }
}
