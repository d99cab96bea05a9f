//! Lexical predicates shared by every pass.
//!
//! All offsets are byte offsets into UTF-8 text. Delimiters the preprocessor
//! cares about are ASCII, so a byte offset that holds one is always a char
//! boundary; identifiers may contain any Unicode letter.

use crate::syntax::span::{scan, SpanKind};

/// Returns true for characters that may begin an identifier.
pub fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

/// Returns true for characters that may continue an identifier.
pub fn is_ident_part(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Space, tab, carriage return or newline.
pub fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Space or tab.
pub fn is_horizontal_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// The character starting at byte offset `index`, if any.
#[inline]
pub fn char_at(text: &str, index: usize) -> Option<char> {
    text.get(index..).and_then(|rest| rest.chars().next())
}

/// The character ending right before byte offset `index`, if any.
#[inline]
pub fn char_before(text: &str, index: usize) -> Option<char> {
    text.get(..index).and_then(|head| head.chars().next_back())
}

/// Advances past any [`is_whitespace`] characters.
pub fn skip_whitespace(text: &str, mut index: usize) -> usize {
    let bytes = text.as_bytes();
    while index < bytes.len() && is_whitespace(bytes[index] as char) {
        index += 1;
    }
    index
}

/// Advances past spaces and tabs only.
pub fn skip_horizontal_whitespace(text: &str, mut index: usize) -> usize {
    let bytes = text.as_bytes();
    while index < bytes.len() && is_horizontal_whitespace(bytes[index] as char) {
        index += 1;
    }
    index
}

/// Returns the end offset of the identifier continuing at `index` (which may be
/// `index` itself when no identifier character follows).
pub fn identifier_end(text: &str, mut index: usize) -> usize {
    while let Some(c) = char_at(text, index) {
        if !is_ident_part(c) {
            break;
        }
        index += c.len_utf8();
    }
    index
}

/// Reads an identifier starting exactly at `index`.
///
/// Returns the identifier and the offset just past it.
pub fn read_identifier(text: &str, index: usize) -> Option<(&str, usize)> {
    let first = char_at(text, index)?;
    if !is_ident_start(first) {
        return None;
    }
    let end = identifier_end(text, index + first.len_utf8());
    Some((&text[index..end], end))
}

/// True when `word` occurs at `index` as a whole word (no identifier
/// characters on either side).
pub fn is_keyword_at(text: &str, index: usize, word: &str) -> bool {
    if !text[index..].starts_with(word) {
        return false;
    }
    let before_ok = char_before(text, index).map_or(true, |c| !is_ident_part(c));
    let after_ok = char_at(text, index + word.len()).map_or(true, |c| !is_ident_part(c));
    before_ok && after_ok
}

/// True when the last non-blank character of `line` is a backslash that sits
/// in plain code (not inside a string or comment).
pub fn ends_with_continuation(line: &str) -> bool {
    let trimmed = line.trim_end_matches([' ', '\t', '\r']);
    if !trimmed.ends_with('\\') {
        return false;
    }
    let last = trimmed.len() - 1;
    scan(line)
        .iter()
        .find(|span| span.contains(last))
        .map_or(false, |span| span.kind == SpanKind::Code)
}

/// Joins lines into one logical line: each line is trimmed, blank lines are
/// dropped, and the rest are separated by a single space.
pub fn join_lines_single_line<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for line in lines {
        let trimmed = line.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(trimmed);
    }
    joined
}

/// Replaces `\r\n` and lone `\r` with `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
