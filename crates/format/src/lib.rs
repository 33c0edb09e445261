//! Lightweight markdown dialect used in post content.
//!
//! Posts are written with a small markdown subset and rendered per provider,
//! since none of the supported platforms render markdown themselves.
//!
//! # Features
//!
//! - **Parsing**: Convert text to line blocks via [`parse`]
//! - **Rendering**: Unicode pseudo-styling via [`to_unicode`], stripped text via [`to_plain_text`]
//! - **Limits**: Character-safe truncation via [`truncate`]
//!
//! # Example
//!
//! ```
//! use socialcast_format::{to_plain_text, to_unicode, truncate};
//!
//! let text = "# Flash sale\n- **50%** off\n[Shop](https://shop.example)";
//! let caption = truncate(&to_unicode(text), 2200);
//! assert!(to_plain_text(text).starts_with("Flash sale"));
//! assert!(!caption.is_empty());
//! ```

#![allow(clippy::missing_const_for_fn)]

mod nodes;
mod parser;
mod render;
mod truncate;

pub use nodes::{Block, Inline};
pub use parser::{parse, parse_inline};
pub use render::{Style, render, to_paragraphs, to_plain_text, to_unicode};
pub use truncate::{ELLIPSIS, char_count, truncate};
