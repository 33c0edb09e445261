//! Markdown dialect AST nodes.

use serde::Serialize;

/// A line-level element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "props", rename_all = "camelCase")]
pub enum Block {
    /// Ordinary line of text.
    Paragraph { children: Vec<Inline> },

    /// `#` to `######` heading.
    Heading { level: u8, children: Vec<Inline> },

    /// `-`, `*` or `+` list item.
    Bullet { children: Vec<Inline> },

    /// `1.` list item. The source number is kept.
    Numbered { number: u32, children: Vec<Inline> },

    /// `>` quote line.
    Quote { children: Vec<Inline> },

    /// Empty line.
    Blank,
}

impl Block {
    /// Inline children, if any.
    #[must_use]
    pub fn children(&self) -> &[Inline] {
        match self {
            Self::Paragraph { children }
            | Self::Heading { children, .. }
            | Self::Bullet { children }
            | Self::Numbered { children, .. }
            | Self::Quote { children } => children,
            Self::Blank => &[],
        }
    }
}

/// An inline span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "props", rename_all = "camelCase")]
pub enum Inline {
    /// Plain text.
    Text { text: String },

    /// Bold text (**text** or __text__).
    Bold { children: Vec<Inline> },

    /// Italic text (*text* or _text_).
    Italic { children: Vec<Inline> },

    /// Strikethrough text (~~text~~).
    Strike { children: Vec<Inline> },

    /// Inline code (`code`).
    Code { code: String },

    /// Link [text](url).
    Link { children: Vec<Inline>, url: String },
}

impl Inline {
    /// Create a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Get the type name as a string.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Bold { .. } => "bold",
            Self::Italic { .. } => "italic",
            Self::Strike { .. } => "strike",
            Self::Code { .. } => "code",
            Self::Link { .. } => "link",
        }
    }
}
