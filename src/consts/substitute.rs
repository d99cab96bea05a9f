//! Replaces references to inlined constants.

use std::borrow::Cow;

use crate::consts::ConstMap;
use crate::syntax::lexical::{char_at, is_whitespace, read_identifier};
use crate::syntax::span::SpanIndex;

/// Replaces every code identifier naming an `Inline` or `Alias` constant in
/// `consts` with its replacement text. Member names (after `.`) are skipped.
///
/// Returns `text` borrowed when nothing was replaced.
pub fn substitute<'a>(text: &'a str, consts: &ConstMap) -> Cow<'a, str> {
    if consts.values().all(|info| info.plan.replacement().is_none()) {
        return Cow::Borrowed(text);
    }

    SpanIndex::new(text).rewrite_code(text, |text, span| {
        let code = span.text(text);
        let mut out: Option<String> = None;
        let mut prev_non_ws: Option<char> = None;
        let mut i = 0;

        while let Some(c) = char_at(code, i) {
            let Some((ident, end)) = read_identifier(code, i) else {
                if let Some(buffer) = out.as_mut() {
                    buffer.push(c);
                }
                if !is_whitespace(c) {
                    prev_non_ws = Some(c);
                }
                i += c.len_utf8();
                continue;
            };

            let replacement = consts
                .get(ident)
                .filter(|_| prev_non_ws != Some('.'))
                .and_then(|info| info.plan.replacement());
            match (replacement, out.as_mut()) {
                (Some(value), Some(buffer)) => buffer.push_str(value),
                (Some(value), None) => {
                    let mut buffer = String::with_capacity(code.len() + value.len());
                    buffer.push_str(&code[..i]);
                    buffer.push_str(value);
                    out = Some(buffer);
                }
                (None, Some(buffer)) => buffer.push_str(ident),
                (None, None) => {}
            }
            prev_non_ws = Some('a');
            i = end;
        }

        out
    })
}
