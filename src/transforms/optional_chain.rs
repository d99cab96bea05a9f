//! Lowers the optional-chaining operator `?.`.
//!
//! ```text
//! a?.b?.c    =>  __struct_get_hashes(a, variable_get_hash("b"), variable_get_hash("c"))
//! a?.b.c     =>  a[$ "b"].c
//! a?.b.c?.d  =>  a[$ "b"].c[$ "d"]
//! ```
//!
//! The base expression is the run of identifier characters and dots before
//! the first `?.`. A chain with an empty base (`f()?.x`) or a segment that is
//! not an identifier (`c?.5:1`) is copied unchanged.

use std::borrow::Cow;

use crate::syntax::lexical::{char_before, identifier_end, is_ident_part, is_ident_start};
use crate::syntax::span::SpanIndex;

const TRIGGER: &str = "?.";

/// Rewrites every optional chain in the code spans of `text`.
pub fn lower_optional_chains(text: &str) -> Cow<'_, str> {
    let index = SpanIndex::new(text);
    if !index.code_contains(text, TRIGGER) {
        return Cow::Borrowed(text);
    }
    index.rewrite_code(text, |text, span| {
        let code = span.text(text);
        code.contains(TRIGGER).then(|| lower_in_code(code))
    })
}

#[derive(Debug)]
struct Segment<'a> {
    guarded: bool,
    name: &'a str,
}

fn lower_in_code(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 32);
    let mut i = 0;

    while let Some(found) = code[i..].find(TRIGGER) {
        let trigger = i + found;
        let start = base_start(code, trigger);
        let (segments, end) = parse_chain(code, trigger);

        out.push_str(&code[i..start]);
        let base = &code[start..trigger];
        let lowerable = !base.is_empty()
            && segments
                .iter()
                .all(|segment| segment.name.chars().next().map_or(false, is_ident_start));

        if lowerable {
            emit_chain(&mut out, base, &segments);
        } else {
            out.push_str(&code[start..end]);
        }
        i = end;
    }

    out.push_str(&code[i..]);
    out
}

/// Walks back from `trigger` over identifier characters and dots.
fn base_start(code: &str, trigger: usize) -> usize {
    let mut start = trigger;
    while let Some(c) = char_before(code, start) {
        if !(is_ident_part(c) || c == '.') {
            break;
        }
        start -= c.len_utf8();
    }
    start
}

/// Parses `?.name` and `.name` segments from `at`. Returns the segments and
/// the offset after the last one.
fn parse_chain(code: &str, mut at: usize) -> (Vec<Segment<'_>>, usize) {
    let mut segments = Vec::new();
    loop {
        let rest = &code[at..];
        let (guarded, name_start) = if rest.starts_with(TRIGGER) {
            (true, at + TRIGGER.len())
        } else if rest.starts_with('.') && !rest[1..].starts_with('.') {
            (false, at + 1)
        } else {
            break;
        };
        let name_end = identifier_end(code, name_start);
        segments.push(Segment {
            guarded,
            name: &code[name_start..name_end],
        });
        at = name_end;
        if name_start == name_end {
            break;
        }
    }
    (segments, at)
}

fn emit_chain(out: &mut String, base: &str, segments: &[Segment<'_>]) {
    if segments.iter().all(|segment| segment.guarded) {
        out.push_str("__struct_get_hashes(");
        out.push_str(base);
        for segment in segments {
            out.push_str(", variable_get_hash(\"");
            out.push_str(segment.name);
            out.push_str("\")");
        }
        out.push(')');
        return;
    }

    out.push_str(base);
    for segment in segments {
        if segment.guarded {
            out.push_str("[$ \"");
            out.push_str(segment.name);
            out.push_str("\"]");
        } else {
            out.push('.');
            out.push_str(segment.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_guarded_chain_uses_hash_lookup() {
        assert_eq!(
            lower_optional_chains("x = a?.b?.c;"),
            "x = __struct_get_hashes(a, variable_get_hash(\"b\"), variable_get_hash(\"c\"));"
        );
    }

    #[test]
    fn mixed_chain_uses_bracket_access() {
        assert_eq!(lower_optional_chains("v = a?.b.c;"), "v = a[$ \"b\"].c;");
        assert_eq!(
            lower_optional_chains("v = o.p?.q.r?.s;"),
            "v = o.p[$ \"q\"].r[$ \"s\"];"
        );
    }

    #[test]
    fn strings_and_comments_are_untouched() {
        let text = "s = \"a?.b\"; // c?.d";
        assert!(matches!(lower_optional_chains(text), Cow::Borrowed(_)));
    }

    #[test]
    fn unsupported_shapes_are_copied() {
        assert_eq!(lower_optional_chains("x = f()?.y;"), "x = f()?.y;");
        assert_eq!(lower_optional_chains("x = c?.5:1;"), "x = c?.5:1;");
        assert_eq!(lower_optional_chains("x = a?.;"), "x = a?.;");
    }

    #[test]
    fn several_chains_on_one_line() {
        assert_eq!(
            lower_optional_chains("f(a?.b, c?.d.e)"),
            "f(__struct_get_hashes(a, variable_get_hash(\"b\")), c[$ \"d\"].e)"
        );
    }

    #[test]
    fn template_expressions_are_lowered() {
        assert_eq!(
            lower_optional_chains("$\"{p?.hp}\""),
            "$\"{__struct_get_hashes(p, variable_get_hash(\"hp\"))}\""
        );
    }
}
