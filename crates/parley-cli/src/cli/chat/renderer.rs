//! Terminal markdown rendering with syntax-highlighted code blocks.
//!
//! `ChatRenderer` combines `termimad` for prose and `syntect` for code block
//! syntax highlighting. While a reply replays, chunks are printed raw; full
//! assistant messages from history are rendered as formatted markdown.

use std::io::Write;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;
use termimad::crossterm::style::Color;

use parley_types::settings::Theme;

/// Environment variable terminals use to advertise their colors, e.g. `15;0`.
const COLORFGBG_ENV: &str = "COLORFGBG";

/// A theme with `System` resolved to a concrete palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Light,
    Dark,
}

/// Resolve a theme preference against the terminal's advertised background.
///
/// `System` reads the background index from `COLORFGBG`; indexes 7 and
/// 9 through 15 are light backgrounds. Anything else, or no value, is dark.
pub fn resolve_theme(theme: Theme, colorfgbg: Option<&str>) -> Palette {
    match theme {
        Theme::Light => Palette::Light,
        Theme::Dark => Palette::Dark,
        Theme::System => {
            let background = colorfgbg
                .and_then(|v| v.rsplit(';').next())
                .and_then(|bg| bg.trim().parse::<u8>().ok());
            match background {
                Some(7 | 9..=15) => Palette::Light,
                _ => Palette::Dark,
            }
        }
    }
}

/// Terminal markdown renderer with syntax highlighting.
pub struct ChatRenderer {
    palette: Palette,
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl ChatRenderer {
    /// Create a renderer for the given theme preference.
    pub fn new(theme: Theme) -> Self {
        let palette = resolve_theme(theme, std::env::var(COLORFGBG_ENV).ok().as_deref());
        Self {
            palette,
            skin: skin_for(palette),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Switch to a new theme preference.
    pub fn set_theme(&mut self, theme: Theme) {
        self.palette = resolve_theme(theme, std::env::var(COLORFGBG_ENV).ok().as_deref());
        self.skin = skin_for(self.palette);
    }

    /// Render a complete markdown reply with syntax-highlighted code blocks.
    ///
    /// Code fences are highlighted via syntect; everything else is rendered
    /// through termimad.
    pub fn render_final(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buf = String::new();

        for line in markdown.lines() {
            let fence = line.trim_start().starts_with("```");
            if fence && !in_code_block {
                in_code_block = true;
                code_lang = line.trim_start().trim_start_matches('`').trim().to_string();
                code_buf.clear();
            } else if fence {
                in_code_block = false;
                output.push_str(&self.highlight_code(&code_buf, &code_lang));
            } else if in_code_block {
                code_buf.push_str(line);
                code_buf.push('\n');
            } else {
                output.push_str(&self.skin.term_text(line).to_string());
            }
        }

        // Unclosed fence
        if in_code_block && !code_buf.is_empty() {
            output.push_str(&self.highlight_code(&code_buf, &code_lang));
        }

        output
    }

    /// Print one replayed chunk (raw, no formatting).
    pub fn print_chunk(&self, chunk: &str) {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    }

    /// Print the stats footer after a reply.
    ///
    /// Format: "| {tokens} tokens . {chunks} chunks . {time}s . {model}"
    pub fn print_stats_footer(&self, tokens: u32, chunks: usize, response_ms: u64, model: &str) {
        let seconds = response_ms as f64 / 1000.0;
        let dot = console::style("\u{00b7}").dim();
        println!(
            "\n  {} {} tokens {dot} {} chunks {dot} {:.1}s {dot} {}",
            console::style("|").dim(),
            console::style(tokens).dim(),
            console::style(chunks).dim(),
            console::style(seconds).dim(),
            console::style(model).dim(),
        );
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            self.syntax_set.find_syntax_plain_text()
        } else {
            self.syntax_set
                .find_syntax_by_token(lang)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
        };

        let theme_name = match self.palette {
            Palette::Light => "base16-ocean.light",
            Palette::Dark => "base16-ocean.dark",
        };
        let mut output = String::new();
        output.push_str(&format!("  {}\n", console::style(format!("--- {lang} ---")).dim()));

        let Some(theme) = self.theme_set.themes.get(theme_name) else {
            for line in code.lines() {
                output.push_str(&format!("  {line}\n"));
            }
            return output;
        };
        let mut h = HighlightLines::new(syntax, theme);

        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = h
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("  {escaped}\x1b[0m\n"));
        }

        output
    }
}

fn skin_for(palette: Palette) -> MadSkin {
    let mut skin = match palette {
        Palette::Light => MadSkin::default_light(),
        Palette::Dark => MadSkin::default_dark(),
    };
    let accent = match palette {
        Palette::Light => Color::DarkMagenta,
        Palette::Dark => Color::Magenta,
    };
    skin.bold.set_fg(accent);
    skin.headers[0].set_fg(accent);
    skin.headers[1].set_fg(accent);
    skin.inline_code.set_fg(match palette {
        Palette::Light => Color::DarkYellow,
        Palette::Dark => Color::Yellow,
    });
    skin
}
