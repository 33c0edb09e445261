//! Character-limit helpers.
//!
//! Limits are counted in Unicode scalar values, so a pseudo-bold letter counts
//! as one character like the letter it replaces.

/// Marker appended to truncated text.
pub const ELLIPSIS: char = '…';

/// Number of characters in `text`.
#[must_use]
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Truncate `text` to at most `max_chars` characters.
///
/// Text that fits is returned unchanged. Otherwise it is cut at a character
/// boundary and ends in [`ELLIPSIS`], with the ellipsis counted in the limit.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some(_) => {
            let keep = text
                .char_indices()
                .nth(max_chars - 1)
                .map_or(text.len(), |(idx, _)| idx);
            let mut out = text[..keep].trim_end().to_string();
            out.push(ELLIPSIS);
            out
        }
    }
}
