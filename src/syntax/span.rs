//! # Span Scanner
//!
//! A single-pass finite-state scanner that partitions GML source text into
//! typed [`Span`]s. It is the one authoritative description of where code
//! ends and string or comment content begins; every other pass queries it
//! instead of re-implementing the lexer state machine.
//!
//! ## Invariants
//!
//! - Spans are emitted in ascending order, are contiguous and never overlap.
//!   Together they cover the scanned range exactly once.
//! - Empty spans are never emitted.
//! - The scanner never fails. An unterminated construct at end of input is
//!   emitted as a span of that construct's kind.
//!
//! ## Recognised constructs
//!
//! | Opener | Kind            | Terminator                         |
//! |--------|-----------------|------------------------------------|
//! | `//`   | `LineComment`   | newline (excluded from the span)   |
//! | `/*`   | `BlockComment`  | `*/`                               |
//! | `"`    | `EscapedString` | unescaped `"`                      |
//! | `@"`   | `RawString`     | `"` (no escapes)                   |
//! | `@'`   | `RawString`     | `'` (no escapes)                   |
//! | `$"`   | `TemplateText`  | `{` opens `TemplateExpr`, unescaped `"` closes |
//!
//! Inside a `TemplateExpr` the scanner behaves as in code until `}` returns
//! to template text.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Range;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Classification of one contiguous region of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Live code: identifiers, operators, brackets.
    Code,
    /// `// ...` up to but excluding the newline.
    LineComment,
    /// `/* ... */`
    BlockComment,
    /// `"..."`, escape-aware.
    EscapedString,
    /// `@"..."` or `@'...'`.
    RawString,
    /// Literal text of a `$"..."` template string, including the `{` that
    /// opens an expression and the `}` that closes one.
    TemplateText,
    /// Expression embedded in a template string. Treated as code.
    TemplateExpr,
}

impl SpanKind {
    /// Code and template expressions are code; everything else is opaque.
    #[inline]
    pub fn is_code(self) -> bool {
        matches!(self, SpanKind::Code | SpanKind::TemplateExpr)
    }
}

/// A typed half-open byte range `[start, end)` over a source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub fn is_code(&self) -> bool {
        self.kind.is_code()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The slice of `text` this span covers.
    #[inline]
    pub fn text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Internal scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    EscapedString,
    RawString { delimiter: u8 },
    TemplateText,
    TemplateExpr,
}

impl Mode {
    fn span_kind(self) -> SpanKind {
        match self {
            Mode::Code => SpanKind::Code,
            Mode::LineComment => SpanKind::LineComment,
            Mode::BlockComment => SpanKind::BlockComment,
            Mode::EscapedString => SpanKind::EscapedString,
            Mode::RawString { .. } => SpanKind::RawString,
            Mode::TemplateText => SpanKind::TemplateText,
            Mode::TemplateExpr => SpanKind::TemplateExpr,
        }
    }
}

// ============================================================================
// SCANNING
// ============================================================================

/// Scans the whole of `text`.
pub fn scan(text: &str) -> Vec<Span> {
    scan_range(text, 0..text.len())
}

/// Scans the sub-range `range` of `text`, starting in code state.
pub fn scan_range(text: &str, range: Range<usize>) -> Vec<Span> {
    let mut spans = Vec::new();
    walk(text, range, |span| spans.push(span));
    spans
}

/// Walks `range` of `text` and hands every span to `on_span` in order.
///
/// Prefer [`SpanIndex`] when spans will be queried more than once.
pub fn walk(text: &str, range: Range<usize>, mut on_span: impl FnMut(Span)) {
    let bytes = text.as_bytes();
    let end = range.end.min(bytes.len());
    let mut mode = Mode::Code;
    // State that string and comment modes return to when they close.
    let mut resume = Mode::Code;
    // Number of template expressions suspended by a nested `$"` string.
    let mut template_nesting = 0usize;
    let mut escaped = false;
    let mut span_start = range.start;
    let mut i = range.start;

    let mut emit = |kind: SpanKind, exclusive_end: usize, span_start: &mut usize| {
        if exclusive_end > *span_start {
            on_span(Span {
                kind,
                start: *span_start,
                end: exclusive_end,
            });
        }
        *span_start = exclusive_end;
    };

    while i < end {
        let c = bytes[i];
        let next = if i + 1 < end { bytes[i + 1] } else { 0 };

        match mode {
            Mode::LineComment => {
                if c == b'\n' {
                    emit(SpanKind::LineComment, i, &mut span_start);
                    mode = resume;
                    continue;
                }
            }
            Mode::BlockComment => {
                if c == b'*' && next == b'/' {
                    emit(SpanKind::BlockComment, i + 2, &mut span_start);
                    mode = resume;
                    i += 2;
                    continue;
                }
            }
            Mode::EscapedString => {
                if escaped {
                    escaped = false;
                } else if c == b'\\' {
                    escaped = true;
                } else if c == b'"' {
                    emit(SpanKind::EscapedString, i + 1, &mut span_start);
                    mode = resume;
                }
            }
            Mode::RawString { delimiter } => {
                if c == delimiter {
                    emit(SpanKind::RawString, i + 1, &mut span_start);
                    mode = resume;
                }
            }
            Mode::TemplateText => {
                if escaped {
                    escaped = false;
                } else if c == b'\\' {
                    escaped = true;
                } else if c == b'{' {
                    emit(SpanKind::TemplateText, i + 1, &mut span_start);
                    mode = Mode::TemplateExpr;
                } else if c == b'"' {
                    emit(SpanKind::TemplateText, i + 1, &mut span_start);
                    if template_nesting > 0 {
                        template_nesting -= 1;
                        mode = Mode::TemplateExpr;
                    } else {
                        mode = Mode::Code;
                    }
                }
            }
            Mode::Code | Mode::TemplateExpr => {
                let here = mode.span_kind();
                let opened = match (c, next) {
                    (b'/', b'/') => Some((Mode::LineComment, 2)),
                    (b'/', b'*') => Some((Mode::BlockComment, 2)),
                    (b'@', b'"') | (b'@', b'\'') => {
                        Some((Mode::RawString { delimiter: next }, 2))
                    }
                    (b'$', b'"') => Some((Mode::TemplateText, 2)),
                    (b'"', _) => Some((Mode::EscapedString, 1)),
                    _ => None,
                };

                if let Some((opened_mode, width)) = opened {
                    emit(here, i, &mut span_start);
                    if opened_mode == Mode::TemplateText {
                        if mode == Mode::TemplateExpr {
                            template_nesting += 1;
                        }
                    } else {
                        resume = mode;
                    }
                    escaped = false;
                    mode = opened_mode;
                    i += width;
                    continue;
                }

                if mode == Mode::TemplateExpr && c == b'}' {
                    emit(SpanKind::TemplateExpr, i, &mut span_start);
                    mode = Mode::TemplateText;
                }
            }
        }

        i += 1;
    }

    emit(mode.span_kind(), end, &mut span_start);
}

// ============================================================================
// SPAN INDEX
// ============================================================================

/// A span array built once for a text, supporting O(log n) code queries and
/// span-preserving rewrites.
#[derive(Debug, Clone, Default)]
pub struct SpanIndex {
    spans: Vec<Span>,
}

impl SpanIndex {
    /// Scans `text` and indexes the resulting spans.
    pub fn new(text: &str) -> Self {
        Self { spans: scan(text) }
    }

    pub fn from_spans(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// The span containing `index`, by binary search.
    pub fn span_at(&self, index: usize) -> Option<&Span> {
        self.spans
            .binary_search_by(|span| {
                if span.end <= index {
                    Ordering::Less
                } else if span.start > index {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .ok()
            .map(|found| &self.spans[found])
    }

    /// True when `index` falls inside a code span. Offsets outside every span
    /// are not code.
    pub fn is_code(&self, index: usize) -> bool {
        self.span_at(index).map_or(false, Span::is_code)
    }

    /// Given `open_at` holding `open`, returns the offset of the balancing
    /// `close`. Only code characters are counted.
    pub fn matching_close(&self, text: &str, open_at: usize, open: u8, close: u8) -> Option<usize> {
        let bytes = text.as_bytes();
        if bytes.get(open_at) != Some(&open) || !self.is_code(open_at) {
            return None;
        }
        let mut depth = 0usize;
        for span in self.spans.iter().filter(|span| span.is_code() && span.end > open_at) {
            for i in span.start.max(open_at)..span.end {
                if bytes[i] == open {
                    depth += 1;
                } else if bytes[i] == close {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    /// True when `needle` occurs starting at a code offset anywhere in `text`.
    pub fn code_contains(&self, text: &str, needle: &str) -> bool {
        self.spans
            .iter()
            .filter(|span| span.is_code())
            .any(|span| span.text(text).contains(needle))
    }

    /// Rebuilds `text`, passing every code span to `transform` and copying all
    /// other spans verbatim. `transform` returns `None` to keep a span as is.
    ///
    /// Returns `Cow::Borrowed(text)` when nothing changed.
    pub fn rewrite_code<'a, F>(&self, text: &'a str, mut transform: F) -> Cow<'a, str>
    where
        F: FnMut(&str, &Span) -> Option<String>,
    {
        let mut out: Option<String> = None;
        for (position, span) in self.spans.iter().enumerate() {
            let original = span.text(text);
            let replacement = if span.is_code() {
                transform(text, span).filter(|replaced| replaced != original)
            } else {
                None
            };

            match (replacement, out.as_mut()) {
                (Some(replaced), Some(buffer)) => buffer.push_str(&replaced),
                (Some(replaced), None) => {
                    let mut buffer = String::with_capacity(text.len() + 32);
                    for earlier in &self.spans[..position] {
                        buffer.push_str(earlier.text(text));
                    }
                    buffer.push_str(&replaced);
                    out = Some(buffer);
                }
                (None, Some(buffer)) => buffer.push_str(original),
                (None, None) => {}
            }
        }
        match out {
            Some(buffer) => Cow::Owned(buffer),
            None => Cow::Borrowed(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(SpanKind, &str)> {
        scan(text)
            .into_iter()
            .map(|span| (span.kind, span.text(text)))
            .collect()
    }

    #[test]
    fn line_comment_excludes_newline() {
        assert_eq!(
            kinds("a // b\nc"),
            vec![
                (SpanKind::Code, "a "),
                (SpanKind::LineComment, "// b"),
                (SpanKind::Code, "\nc"),
            ]
        );
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        assert_eq!(
            kinds(r#"x = "a\"b";"#),
            vec![
                (SpanKind::Code, "x = "),
                (SpanKind::EscapedString, r#""a\"b""#),
                (SpanKind::Code, ";"),
            ]
        );
    }

    #[test]
    fn raw_strings_ignore_backslashes() {
        assert_eq!(
            kinds(r#"@"C:\dir\" + @'it"s'"#),
            vec![
                (SpanKind::RawString, r#"@"C:\dir\""#),
                (SpanKind::Code, " + "),
                (SpanKind::RawString, r#"@'it"s'"#),
            ]
        );
    }

    #[test]
    fn template_string_alternates_text_and_expressions() {
        assert_eq!(
            kinds(r#"$"hp {hp} of {max}" + 1"#),
            vec![
                (SpanKind::TemplateText, r#"$"hp {"#),
                (SpanKind::TemplateExpr, "hp"),
                (SpanKind::TemplateText, "} of {"),
                (SpanKind::TemplateExpr, "max"),
                (SpanKind::TemplateText, r#"}""#),
                (SpanKind::Code, " + 1"),
            ]
        );
    }

    #[test]
    fn string_inside_template_expression_returns_to_expression() {
        assert_eq!(
            kinds(r#"$"{f("}")}""#),
            vec![
                (SpanKind::TemplateText, r#"$"{"#),
                (SpanKind::TemplateExpr, "f("),
                (SpanKind::EscapedString, r#""}""#),
                (SpanKind::TemplateExpr, ")"),
                (SpanKind::TemplateText, r#"}""#),
            ]
        );
    }

    #[test]
    fn block_comment_hides_string_openers() {
        assert_eq!(
            kinds("/* \" */x"),
            vec![(SpanKind::BlockComment, "/* \" */"), (SpanKind::Code, "x")]
        );
    }

    #[test]
    fn unterminated_constructs_are_flushed_with_their_kind() {
        assert_eq!(kinds("a /* open"), vec![(SpanKind::Code, "a "), (SpanKind::BlockComment, "/* open")]);
        assert_eq!(kinds("\"open"), vec![(SpanKind::EscapedString, "\"open")]);
        assert_eq!(kinds("@'open"), vec![(SpanKind::RawString, "@'open")]);
    }

    #[test]
    fn sub_range_scan_starts_in_code() {
        let text = "\"abc\" + x";
        let spans = scan_range(text, 2..text.len());
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[0].kind, SpanKind::Code);
        assert_eq!(spans.last().map(|span| span.end), Some(text.len()));
    }

    #[test]
    fn is_code_is_false_inside_string_and_true_around_it() {
        let text = r#"a = "a\"b" + c"#;
        let index = SpanIndex::new(text);
        let open = text.find('"').unwrap_or_default();
        let close = text.rfind('"').unwrap_or_default();

        assert!(index.is_code(open - 1));
        for offset in open..=close {
            assert!(!index.is_code(offset), "offset {offset} should not be code");
        }
        assert!(index.is_code(close + 1));
        assert!(!index.is_code(text.len()));
    }

    #[test]
    fn matching_close_skips_delimiters_in_strings() {
        let text = "f(a, \")\", (b)) + 1";
        let index = SpanIndex::new(text);
        assert_eq!(index.matching_close(text, 1, b'(', b')'), Some(13));
        assert_eq!(index.matching_close(text, 0, b'(', b')'), None);

        let open = "g({ s: \"}\" ";
        assert_eq!(SpanIndex::new(open).matching_close(open, 2, b'{', b'}'), None);
    }

    #[test]
    fn rewrite_code_returns_borrowed_when_unchanged() {
        let text = "a \"a\" a";
        let index = SpanIndex::new(text);
        let untouched = index.rewrite_code(text, |_, _| None);
        assert!(matches!(untouched, Cow::Borrowed(_)));

        let same = index.rewrite_code(text, |text, span| Some(span.text(text).to_string()));
        assert!(matches!(same, Cow::Borrowed(_)));

        let changed = index.rewrite_code(text, |text, span| Some(span.text(text).replace('a', "b")));
        assert_eq!(changed, "b \"a\" b");
    }
}
