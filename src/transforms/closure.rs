//! Lowers `closure(function(...) { ... })` sugar.
//!
//! GML function literals cannot see the local variables of the code that
//! creates them. The sugar is rewritten into a bound method whose context
//! struct carries every captured local:
//!
//! ```text
//! var n = 1;                         var n = 1;
//! f = closure(function() {     =>    f = method({__closure_this: self, __closure_n: n}, function() {var n = __closure_n; with(__closure_this){
//!     return n + 1;                      return n + 1;
//! });                                }}});
//! ```
//!
//! Captures are the identifiers used at the closure's own level that some
//! `var` before the call declares, minus the closure's parameters and its own
//! `var` declarations. Without captures the call becomes a plain function
//! literal. Newlines are never added or removed.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use tracing::debug;

use crate::syntax::lexical::{
    char_at, char_before, is_ident_part, is_ident_start, is_keyword_at, is_whitespace, read_identifier,
    skip_horizontal_whitespace, skip_whitespace,
};
use crate::syntax::span::SpanIndex;

/// Upper bound on lowering passes; each pass lowers the outermost closures.
pub const MAX_CLOSURE_PASSES: usize = 32;

const KEYWORD: &str = "closure";

/// Rewrites closure sugar until none is left (or the pass bound is hit).
pub fn lower_closures(text: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(text);
    for pass in 0..MAX_CLOSURE_PASSES {
        match lower_once(&current) {
            Some(next) => current = Cow::Owned(next),
            None => {
                if pass > 1 {
                    debug!(passes = pass, "nested closures lowered");
                }
                break;
            }
        }
    }
    current
}

/// Byte ranges of one `closure(function(params) sep { body } )` occurrence.
#[derive(Debug, Clone)]
struct Occurrence {
    /// From `closure` through the final `)`.
    whole: Range<usize>,
    params: Range<usize>,
    /// Whitespace between `)` and `{`.
    separator: Range<usize>,
    body: Range<usize>,
}

fn lower_once(text: &str) -> Option<String> {
    let index = SpanIndex::new(text);
    if !index.code_contains(text, KEYWORD) {
        return None;
    }

    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut search = 0;

    while let Some((trigger, params_open)) = find_trigger(text, &index, search) {
        let Some(occurrence) = match_occurrence(text, &index, trigger, params_open) else {
            // Unmatched: skip the whole body, sugar nested in it included.
            match body_close(text, &index, params_open) {
                Some(close) => {
                    search = close + 1;
                    continue;
                }
                None => break,
            }
        };

        let captures = captures(text, &index, &occurrence);
        let replacement = render(text, &occurrence, &captures);

        let buffer = out.get_or_insert_with(|| String::with_capacity(text.len() + 128));
        buffer.push_str(&text[copied..occurrence.whole.start]);
        buffer.push_str(&replacement);
        copied = occurrence.whole.end;
        search = copied;
    }

    out.map(|mut buffer| {
        buffer.push_str(&text[copied..]);
        buffer
    })
}

/// Finds `closure ( function (` in code at or after `from`. Returns the offset
/// of `closure` and of the parameter list's `(`.
fn find_trigger(text: &str, index: &SpanIndex, from: usize) -> Option<(usize, usize)> {
    for (found, _) in text[from..].match_indices(KEYWORD) {
        let at = from + found;
        if !index.is_code(at) || !is_keyword_at(text, at, KEYWORD) {
            continue;
        }
        let before = text[..at].trim_end_matches(|c: char| is_whitespace(c));
        if before.ends_with('.') {
            continue;
        }

        let open_call = skip_horizontal_whitespace(text, at + KEYWORD.len());
        if !text[open_call..].starts_with('(') {
            continue;
        }
        let function = skip_horizontal_whitespace(text, open_call + 1);
        if !is_keyword_at(text, function, "function") {
            continue;
        }
        let params_open = skip_horizontal_whitespace(text, function + "function".len());
        if text[params_open..].starts_with('(') {
            return Some((at, params_open));
        }
    }
    None
}

fn match_occurrence(
    text: &str,
    index: &SpanIndex,
    trigger: usize,
    params_open: usize,
) -> Option<Occurrence> {
    let params_close = index.matching_close(text, params_open, b'(', b')')?;
    let body_open = skip_whitespace(text, params_close + 1);
    let body_close = index.matching_close(text, body_open, b'{', b'}')?;
    let call_close = skip_horizontal_whitespace(text, body_close + 1);
    if !text[call_close..].starts_with(')') {
        return None;
    }
    Some(Occurrence {
        whole: trigger..call_close + 1,
        params: params_open + 1..params_close,
        separator: params_close + 1..body_open,
        body: body_open + 1..body_close,
    })
}

/// Offset of the `}` closing the function body whose parameters open at
/// `params_open`. `None` when the parentheses or braces are unbalanced.
fn body_close(text: &str, index: &SpanIndex, params_open: usize) -> Option<usize> {
    let params_close = index.matching_close(text, params_open, b'(', b')')?;
    let body_open = skip_whitespace(text, params_close + 1);
    index.matching_close(text, body_open, b'{', b'}')
}

fn render(text: &str, occurrence: &Occurrence, captures: &BTreeSet<String>) -> String {
    let params = &text[occurrence.params.clone()];
    let separator = &text[occurrence.separator.clone()];
    let body = &text[occurrence.body.clone()];

    if captures.is_empty() {
        return format!("function({params}){separator}{{{body}}}");
    }

    let mut out = String::with_capacity(body.len() + 128);
    out.push_str("method({__closure_this: self");
    for name in captures {
        out.push_str(&format!(", __closure_{name}: {name}"));
    }
    out.push_str(&format!("}}, function({params}){separator}{{"));
    for name in captures {
        out.push_str(&format!("var {name} = __closure_{name}; "));
    }
    out.push_str("with(__closure_this){");
    out.push_str(body);
    out.push_str("}})");
    out
}

// ============================================================================
// CAPTURE ANALYSIS
// ============================================================================

fn captures(text: &str, index: &SpanIndex, occurrence: &Occurrence) -> BTreeSet<String> {
    let outer = var_declarations(text, index, 0..occurrence.whole.start);
    let mut local = var_declarations(text, index, occurrence.body.clone());
    local.extend(param_names(&text[occurrence.params.clone()]));

    used_identifiers(text, index, occurrence.body.clone())
        .into_iter()
        .filter(|name| outer.contains(*name) && !local.contains(*name))
        .map(str::to_string)
        .collect()
}

/// Names declared by `var` statements in `range`, at any depth.
///
/// Handles `var a`, `var a = expr`, `var a = 1, b = 2` and `var a = 1, var b`.
fn var_declarations<'a>(text: &'a str, index: &SpanIndex, range: Range<usize>) -> HashSet<&'a str> {
    let mut declared = HashSet::new();
    let mut i = range.start;

    while i < range.end {
        if !index.is_code(i) {
            i = next_code(index, i, range.end);
            continue;
        }
        let Some(c) = char_at(text, i) else { break };
        if !is_ident_start(c) {
            i += c.len_utf8();
            continue;
        }
        let Some((word, end)) = read_identifier(text, i) else { break };
        i = end;
        if word != "var" {
            continue;
        }

        let mut at = end;
        loop {
            at = skip_code_whitespace(text, index, at, range.end);
            let Some((name, name_end)) = read_identifier(text, at).filter(|(_, e)| *e <= range.end) else {
                break;
            };
            declared.insert(name);
            at = skip_code_whitespace(text, index, name_end, range.end);

            if at < range.end && text[at..].starts_with('=') {
                at = skip_initializer(text, index, at + 1, range.end);
                at = skip_code_whitespace(text, index, at, range.end);
            }
            if at >= range.end || !text[at..].starts_with(',') || !index.is_code(at) {
                break;
            }
            at = skip_code_whitespace(text, index, at + 1, range.end);
            if is_keyword_at(text, at, "var") {
                at += "var".len();
            }
        }
        i = at.max(i);
    }
    declared
}

/// Skips an initialiser up to a top-level `,` or `;`, or an unbalanced closer.
fn skip_initializer(text: &str, index: &SpanIndex, mut at: usize, end: usize) -> usize {
    let bytes = text.as_bytes();
    let (mut paren, mut brace, mut bracket) = (0i32, 0i32, 0i32);
    while at < end {
        if !index.is_code(at) {
            at += 1;
            continue;
        }
        match bytes[at] {
            b'(' => paren += 1,
            b'{' => brace += 1,
            b'[' => bracket += 1,
            b')' => paren -= 1,
            b'}' => brace -= 1,
            b']' => bracket -= 1,
            b',' | b';' if paren == 0 && brace == 0 && bracket == 0 => break,
            _ => {}
        }
        if paren < 0 || brace < 0 || bracket < 0 {
            break;
        }
        at += 1;
    }
    at
}

/// Identifiers referenced at the closure's own level.
///
/// Nested function literals are skipped, except when they are themselves
/// closure sugar: their free identifiers must flow through this closure.
fn used_identifiers<'a>(text: &'a str, index: &SpanIndex, range: Range<usize>) -> BTreeSet<&'a str> {
    let mut used = BTreeSet::new();
    let mut prev_non_ws: Option<char> = None;
    let mut i = range.start;

    while i < range.end {
        if !index.is_code(i) {
            prev_non_ws = None;
            i = next_code(index, i, range.end);
            continue;
        }
        let Some(c) = char_at(text, i) else { break };
        if !is_ident_start(c) {
            if !is_whitespace(c) {
                prev_non_ws = Some(c);
            }
            i += c.len_utf8();
            continue;
        }

        let Some((word, end)) = read_identifier(text, i) else { break };
        let after_dot = prev_non_ws == Some('.');
        prev_non_ws = Some('a');

        if word == "function" {
            if let Some((params, body)) = function_literal(text, index, end, range.end) {
                if is_closure_argument(text, i) {
                    let mut inner_local = var_declarations(text, index, body.clone());
                    inner_local.extend(param_names(&text[params]));
                    used.extend(
                        used_identifiers(text, index, body.clone())
                            .into_iter()
                            .filter(|name| !inner_local.contains(*name)),
                    );
                }
                i = body.end + 1;
                continue;
            }
        }

        if !after_dot {
            used.insert(word);
        }
        i = end;
    }
    used
}

/// Parameter and body ranges of a function literal whose keyword ends at `at`.
fn function_literal(
    text: &str,
    index: &SpanIndex,
    at: usize,
    limit: usize,
) -> Option<(Range<usize>, Range<usize>)> {
    let mut open = skip_whitespace(text, at);
    if let Some((_, end)) = read_identifier(text, open) {
        open = skip_whitespace(text, end);
    }
    let close = index.matching_close(text, open, b'(', b')')?;
    let body_open = skip_whitespace(text, close + 1);
    let body_close = index.matching_close(text, body_open, b'{', b'}')?;
    (body_close < limit).then(|| (open + 1..close, body_open + 1..body_close))
}

/// True when the `function` keyword at `at` is the first argument of closure sugar.
fn is_closure_argument(text: &str, at: usize) -> bool {
    let before = text[..at].trim_end_matches([' ', '\t']);
    let Some(before_paren) = before.strip_suffix('(') else {
        return false;
    };
    let call = before_paren.trim_end_matches([' ', '\t']);
    call.ends_with(KEYWORD)
        && char_before(call, call.len() - KEYWORD.len())
            .map_or(true, |c| !is_ident_part(c) && c != '.')
}

/// Leading identifier of each comma-separated parameter (`a, b = 1`).
fn param_names(params: &str) -> Vec<&str> {
    params
        .split(',')
        .filter_map(|param| {
            let param = param.trim_start();
            read_identifier(param, 0).map(|(name, _)| name)
        })
        .collect()
}

fn skip_code_whitespace(text: &str, index: &SpanIndex, mut at: usize, end: usize) -> usize {
    while at < end {
        if !index.is_code(at) {
            at = next_code(index, at, end);
            continue;
        }
        match char_at(text, at) {
            Some(c) if is_whitespace(c) => at += 1,
            _ => break,
        }
    }
    at
}

/// First offset at or after `at` that starts a code span, capped at `end`.
fn next_code(index: &SpanIndex, at: usize, end: usize) -> usize {
    index
        .span_at(at)
        .map_or(end, |span| span.end.max(at + 1))
        .min(end)
}
