//! Markdown dialect parser.
//!
//! Block structure is line based. Inline spans are found by collecting every
//! pattern match, sorting by position and dropping overlaps, so the earlier
//! and higher-priority span wins.

use regex::Regex;

use crate::nodes::{Block, Inline};

// Regex patterns - these are valid static patterns that cannot fail
#[allow(clippy::unwrap_used)]
static HEADING_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static BULLET_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static NUMBERED_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^\s*(\d{1,9})[.)]\s+(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static QUOTE_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^>\s?(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static INLINE_CODE_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

#[allow(clippy::unwrap_used)]
static LINK_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((\S+?)\)").unwrap());

#[allow(clippy::unwrap_used)]
static BOLD_STAR_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

#[allow(clippy::unwrap_used)]
static BOLD_UNDERSCORE_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"__(.+?)__").unwrap());

#[allow(clippy::unwrap_used)]
static STRIKE_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"~~(.+?)~~").unwrap());

#[allow(clippy::unwrap_used)]
static ITALIC_STAR_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());

#[allow(clippy::unwrap_used)]
static ITALIC_UNDERSCORE_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"_([^_]+)_").unwrap());

/// Parse text into line blocks.
#[must_use]
#[allow(clippy::unwrap_used)] // Regex capture groups are guaranteed to exist
pub fn parse(text: &str) -> Vec<Block> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| {
            if line.trim().is_empty() {
                Block::Blank
            } else if let Some(cap) = HEADING_RE.captures(line) {
                Block::Heading {
                    level: cap.get(1).unwrap().as_str().len() as u8,
                    children: parse_inline(cap.get(2).unwrap().as_str().trim_end()),
                }
            } else if let Some(cap) = NUMBERED_RE.captures(line) {
                Block::Numbered {
                    number: cap.get(1).unwrap().as_str().parse().unwrap_or(1),
                    children: parse_inline(cap.get(2).unwrap().as_str()),
                }
            } else if let Some(cap) = BULLET_RE.captures(line) {
                Block::Bullet {
                    children: parse_inline(cap.get(1).unwrap().as_str()),
                }
            } else if let Some(cap) = QUOTE_RE.captures(line) {
                Block::Quote {
                    children: parse_inline(cap.get(1).unwrap().as_str()),
                }
            } else {
                Block::Paragraph {
                    children: parse_inline(line),
                }
            }
        })
        .collect()
}

/// Parse inline spans of a single line.
#[must_use]
#[allow(clippy::unwrap_used)] // Regex capture groups are guaranteed to exist
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut nodes = Vec::new();
    let mut pos = 0;

    // Collect all matches with their positions. Push order is the priority
    // for matches starting at the same offset.
    let mut matches: Vec<(usize, usize, Inline)> = Vec::new();

    for cap in INLINE_CODE_RE.captures_iter(text) {
        let m = cap.get(0).unwrap();
        let code = cap.get(1).unwrap().as_str().to_string();
        matches.push((m.start(), m.end(), Inline::Code { code }));
    }

    for cap in LINK_RE.captures_iter(text) {
        let m = cap.get(0).unwrap();
        let children = parse_inline(cap.get(1).unwrap().as_str());
        let url = cap.get(2).unwrap().as_str().to_string();
        matches.push((m.start(), m.end(), Inline::Link { children, url }));
    }

    for re in [&*BOLD_STAR_RE, &*BOLD_UNDERSCORE_RE] {
        for cap in re.captures_iter(text) {
            let m = cap.get(0).unwrap();
            let children = parse_inline(cap.get(1).unwrap().as_str());
            matches.push((m.start(), m.end(), Inline::Bold { children }));
        }
    }

    for cap in STRIKE_RE.captures_iter(text) {
        let m = cap.get(0).unwrap();
        let children = parse_inline(cap.get(1).unwrap().as_str());
        matches.push((m.start(), m.end(), Inline::Strike { children }));
    }

    for (start, end, inner) in emphasis_spans(&ITALIC_STAR_RE, text, |start, end| {
        // Skip if this is actually bold
        text[..start].ends_with('*') || text[end..].starts_with('*')
    }) {
        matches.push((
            start,
            end,
            Inline::Italic {
                children: parse_inline(inner),
            },
        ));
    }

    for (start, end, inner) in emphasis_spans(&ITALIC_UNDERSCORE_RE, text, |start, end| {
        // snake_case identifiers are not emphasis
        text[..start].chars().next_back().is_some_and(is_word_char)
            || text[end..].chars().next().is_some_and(is_word_char)
    }) {
        matches.push((
            start,
            end,
            Inline::Italic {
                children: parse_inline(inner),
            },
        ));
    }

    // Sort matches by position
    matches.sort_by_key(|(start, _, _)| *start);

    // Remove overlapping matches (keep first)
    let mut filtered_matches: Vec<(usize, usize, Inline)> = Vec::new();
    for m in matches {
        if filtered_matches.is_empty() || m.0 >= filtered_matches.last().unwrap().1 {
            filtered_matches.push(m);
        }
    }

    for (start, end, node) in filtered_matches {
        if start > pos {
            nodes.push(Inline::text(&text[pos..start]));
        }
        nodes.push(node);
        pos = end;
    }

    if pos < text.len() {
        nodes.push(Inline::text(&text[pos..]));
    }

    nodes
}

/// Single-marker emphasis spans. A rejected candidate only consumes its
/// opening marker, so `**a** *b*` still finds `*b*`.
#[allow(clippy::unwrap_used)]
fn emphasis_spans<'t>(
    re: &Regex,
    text: &'t str,
    reject: impl Fn(usize, usize) -> bool,
) -> Vec<(usize, usize, &'t str)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while from < text.len() {
        let Some(cap) = re.captures_at(text, from) else {
            break;
        };
        let m = cap.get(0).unwrap();
        let inner = cap.get(1).unwrap().as_str();
        if reject(m.start(), m.end()) || !is_tight(inner) {
            // Markers are ASCII, so one byte on is a char boundary
            from = m.start() + 1;
            continue;
        }
        spans.push((m.start(), m.end(), inner));
        from = m.end();
    }
    spans
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Emphasis content may not start or end with whitespace (`2 * 3 * 4`).
fn is_tight(inner: &str) -> bool {
    !inner.starts_with(char::is_whitespace) && !inner.ends_with(char::is_whitespace)
}
