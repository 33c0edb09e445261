//! Rendering of the markdown dialect to provider-ready text.
//!
//! None of the target platforms render markdown, so emphasis is carried by
//! Unicode Mathematical Sans-Serif code points (the same trick people use by
//! hand), and structure is flattened into plain characters.

use crate::nodes::{Block, Inline};

/// Output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Pseudo-bold and pseudo-italic via Mathematical Sans-Serif letters.
    Unicode,
    /// Markers stripped, no styling.
    Plain,
}

const BULLET: &str = "• ";
const STRIKE_OVERLAY: char = '\u{0336}';

const BOLD_UPPER: u32 = 0x1D5D4;
const BOLD_LOWER: u32 = 0x1D5EE;
const BOLD_DIGIT: u32 = 0x1D7EC;
const ITALIC_UPPER: u32 = 0x1D608;
const ITALIC_LOWER: u32 = 0x1D622;
const BOLD_ITALIC_UPPER: u32 = 0x1D63C;
const BOLD_ITALIC_LOWER: u32 = 0x1D656;

#[derive(Debug, Clone, Copy, Default)]
struct Emphasis {
    bold: bool,
    italic: bool,
    strike: bool,
}

/// Render text with Unicode pseudo-styling.
#[must_use]
pub fn to_unicode(text: &str) -> String {
    render(text, Style::Unicode)
}

/// Render text with all markers stripped.
#[must_use]
pub fn to_plain_text(text: &str) -> String {
    render(text, Style::Plain)
}

/// Render text in the given style.
#[must_use]
pub fn render(text: &str, style: Style) -> String {
    let blocks = crate::parse(text);
    let lines: Vec<String> = blocks.iter().map(|b| render_block(b, style)).collect();
    lines.join("\n")
}

/// Render text into paragraphs, dropping blank lines.
///
/// Used for article bodies that are built from separate paragraph items.
#[must_use]
pub fn to_paragraphs(text: &str, style: Style) -> Vec<String> {
    crate::parse(text)
        .iter()
        .filter(|b| !matches!(b, Block::Blank))
        .map(|b| render_block(b, style))
        .collect()
}

fn render_block(block: &Block, style: Style) -> String {
    let plain = Emphasis::default();
    match block {
        Block::Paragraph { children } => render_inlines(children, style, plain),
        Block::Heading { children, .. } => render_inlines(
            children,
            style,
            Emphasis {
                bold: true,
                ..plain
            },
        ),
        Block::Bullet { children } => {
            format!("{BULLET}{}", render_inlines(children, style, plain))
        }
        Block::Numbered { number, children } => {
            format!("{number}. {}", render_inlines(children, style, plain))
        }
        Block::Quote { children } => format!(
            "“{}”",
            render_inlines(
                children,
                style,
                Emphasis {
                    italic: true,
                    ..plain
                }
            )
        ),
        Block::Blank => String::new(),
    }
}

fn render_inlines(nodes: &[Inline], style: Style, emphasis: Emphasis) -> String {
    nodes
        .iter()
        .map(|n| render_inline(n, style, emphasis))
        .collect()
}

fn render_inline(node: &Inline, style: Style, emphasis: Emphasis) -> String {
    match node {
        Inline::Text { text } => styled(text, style, emphasis),
        Inline::Bold { children } => render_inlines(
            children,
            style,
            Emphasis {
                bold: true,
                ..emphasis
            },
        ),
        Inline::Italic { children } => render_inlines(
            children,
            style,
            Emphasis {
                italic: true,
                ..emphasis
            },
        ),
        Inline::Strike { children } => render_inlines(
            children,
            style,
            Emphasis {
                strike: true,
                ..emphasis
            },
        ),
        // Code is never styled
        Inline::Code { code } => code.clone(),
        Inline::Link { children, url } => {
            let label = render_inlines(children, style, emphasis);
            format!("{label}: {url}")
        }
    }
}

fn styled(text: &str, style: Style, emphasis: Emphasis) -> String {
    if style == Style::Plain {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() * 4);
    for c in text.chars() {
        out.push(map_char(c, emphasis));
        if emphasis.strike && !c.is_whitespace() {
            out.push(STRIKE_OVERLAY);
        }
    }
    out
}

fn map_char(c: char, emphasis: Emphasis) -> char {
    let (upper, lower, digit) = match (emphasis.bold, emphasis.italic) {
        (true, true) => (BOLD_ITALIC_UPPER, BOLD_ITALIC_LOWER, Some(BOLD_DIGIT)),
        (true, false) => (BOLD_UPPER, BOLD_LOWER, Some(BOLD_DIGIT)),
        // Sans-serif italic has no digits
        (false, true) => (ITALIC_UPPER, ITALIC_LOWER, None),
        (false, false) => return c,
    };

    let code = match c {
        'A'..='Z' => upper + (c as u32 - 'A' as u32),
        'a'..='z' => lower + (c as u32 - 'a' as u32),
        '0'..='9' => match digit {
            Some(base) => base + (c as u32 - '0' as u32),
            None => return c,
        },
        _ => return c,
    };
    char::from_u32(code).unwrap_or(c)
}
