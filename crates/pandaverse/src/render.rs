//! Terminal rendering of chat turns.
//!
//! Markdown is flattened to plain text that reads well in a terminal: block
//! structure (headings, lists, quotes, fenced code) is kept, inline markup is
//! reduced to ANSI styles when styling is on. Fenced code blocks that name a
//! language are syntax highlighted.

use pandaverse_types::{ChatTurn, Role};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};

const THEME: &str = "base16-ocean.dark";

const BOLD: &str = "\x1b[1m";
const BOLD_OFF: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const ITALIC_OFF: &str = "\x1b[23m";
const RESET: &str = "\x1b[0m";

const CELL_SEPARATOR: &str = " | ";

struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    fn load() -> Option<Self> {
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes
            .remove(THEME)
            .or_else(|| themes.into_values().next())?;
        Some(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    fn highlight(&self, code: &str, language: &str) -> Option<String> {
        let syntax = self.syntaxes.find_syntax_by_token(language)?;
        let mut lines = HighlightLines::new(syntax, &self.theme);

        let mut out = String::with_capacity(code.len() * 2);
        for line in LinesWithEndings::from(code) {
            let ranges = lines.highlight_line(line, &self.syntaxes).ok()?;
            out.push_str(&as_24_bit_terminal_escaped(&ranges, false));
        }
        out.push_str(RESET);
        Some(out)
    }
}

/// Renders turns for the terminal.
pub struct Renderer {
    highlighter: Option<Highlighter>,
    styled: bool,
}

impl Renderer {
    /// No ANSI escapes at all.
    pub fn plain() -> Self {
        Self {
            highlighter: None,
            styled: false,
        }
    }

    /// ANSI styles plus syntax highlighting of fenced code.
    pub fn styled() -> Self {
        Self {
            highlighter: Highlighter::load(),
            styled: true,
        }
    }

    pub fn render_turn(&self, turn: &ChatTurn) -> String {
        let label = match turn.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        let body = match turn.role {
            Role::User => turn.content.trim_end().to_string(),
            _ => self.render_markdown(&turn.content),
        };

        if self.styled {
            format!("{BOLD}{label}{BOLD_OFF} › {body}")
        } else {
            format!("{label} › {body}")
        }
    }

    pub fn render_markdown(&self, text: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;

        let mut out = String::new();
        // Buffer offsets where an enclosing quote or list item began.
        let mut blocks: Vec<usize> = Vec::new();
        let mut lists: Vec<Option<u64>> = Vec::new();
        let mut code: Option<(String, String)> = None;
        let mut link_targets: Vec<String> = Vec::new();
        let mut row_start = 0;

        for event in Parser::new_ext(text, options) {
            if let Some((_, body)) = code.as_mut() {
                match event {
                    Event::Text(t) => {
                        body.push_str(&t);
                        continue;
                    }
                    Event::End(TagEnd::CodeBlock) => {}
                    _ => continue,
                }
            }

            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    out.push_str(&"#".repeat(heading_depth(level)));
                    out.push(' ');
                    if self.styled {
                        out.push_str(BOLD);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if self.styled {
                        out.push_str(BOLD_OFF);
                    }
                    out.push_str("\n\n");
                }
                Event::End(TagEnd::Paragraph) => out.push_str("\n\n"),
                Event::Start(Tag::BlockQuote(_)) => blocks.push(out.len()),
                Event::End(TagEnd::BlockQuote(_)) => {
                    let start = blocks.pop().unwrap_or(0).min(out.len());
                    let inner = out.split_off(start);
                    for line in inner.trim_end().lines() {
                        out.push_str("> ");
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push('\n');
                }
                Event::Start(Tag::List(first)) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    lists.push(first);
                }
                Event::End(TagEnd::List(_)) => {
                    lists.pop();
                    if lists.is_empty() {
                        out.push('\n');
                    }
                }
                Event::Start(Tag::Item) => blocks.push(out.len()),
                Event::End(TagEnd::Item) => {
                    let start = blocks.pop().unwrap_or(0).min(out.len());
                    let inner = out.split_off(start);
                    let marker = match lists.last_mut() {
                        Some(Some(n)) => {
                            let marker = format!("{n}. ");
                            *n += 1;
                            marker
                        }
                        _ => "- ".to_string(),
                    };
                    let indent = " ".repeat(marker.len());
                    for (i, line) in inner.trim_end().lines().enumerate() {
                        if i == 0 {
                            out.push_str(&marker);
                        } else if !line.is_empty() {
                            out.push_str(&indent);
                        }
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => code_language(&info).to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code = Some((language, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, body)) = code.take() {
                        self.push_code_block(&mut out, &language, &body);
                    }
                }
                Event::Start(Tag::Emphasis) if self.styled => out.push_str(ITALIC),
                Event::End(TagEnd::Emphasis) if self.styled => out.push_str(ITALIC_OFF),
                Event::Start(Tag::Strong) if self.styled => out.push_str(BOLD),
                Event::End(TagEnd::Strong) if self.styled => out.push_str(BOLD_OFF),
                Event::Start(Tag::Link { dest_url, .. }) => {
                    link_targets.push(dest_url.to_string());
                }
                Event::End(TagEnd::Link) => {
                    if let Some(url) = link_targets.pop() {
                        out.push_str(&format!(" ({url})"));
                    }
                }
                Event::Start(Tag::Image { dest_url, .. }) => {
                    out.push_str("[image: ");
                    link_targets.push(dest_url.to_string());
                }
                Event::End(TagEnd::Image) => {
                    out.push(']');
                    if let Some(url) = link_targets.pop() {
                        out.push_str(&format!(" ({url})"));
                    }
                }
                Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                    row_start = out.len();
                }
                Event::End(TagEnd::TableCell) => out.push_str(CELL_SEPARATOR),
                Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                    // Drop the separator after the last cell, never text before the row.
                    if out.ends_with(CELL_SEPARATOR)
                        && out.len() >= row_start + CELL_SEPARATOR.len()
                    {
                        out.truncate(out.len() - CELL_SEPARATOR.len());
                    }
                    out.push('\n');
                }
                Event::End(TagEnd::Table) => out.push('\n'),
                Event::Text(t) => out.push_str(&t),
                Event::Code(c) => {
                    out.push('`');
                    out.push_str(&c);
                    out.push('`');
                }
                Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
                Event::SoftBreak | Event::HardBreak => out.push('\n'),
                Event::Rule => out.push_str("---\n\n"),
                Event::TaskListMarker(done) => out.push_str(if done { "[x] " } else { "[ ] " }),
                _ => {}
            }
        }

        let mut rendered = out.trim_end().to_string();
        rendered.push('\n');
        rendered
    }

    fn push_code_block(&self, out: &mut String, language: &str, body: &str) {
        let body = if body.ends_with('\n') {
            body.to_string()
        } else {
            format!("{body}\n")
        };

        let highlighted = match (&self.highlighter, language.is_empty()) {
            (Some(highlighter), false) => highlighter.highlight(&body, language),
            _ => None,
        };

        out.push_str("```");
        out.push_str(language);
        out.push('\n');
        out.push_str(highlighted.as_deref().unwrap_or(&body));
        out.push_str("```\n\n");
    }
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// First word of a fence info string: `rust,ignore` and `rust title="x"` both
/// name `rust`.
fn code_language(info: &str) -> &str {
    info.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '+' || c == '#'))
        .next()
        .unwrap_or("")
}
