//! Property tests for the scanner and the line-count guarantee.

mod common;

use proptest::prelude::*;
use sketchy::syntax::{scan, SpanIndex, SpanKind};
use sketchy::{MacroTable, Rewriter};

/// Fragments that exercise every scanner state and every rewrite trigger.
const FRAGMENTS: &[&str] = &[
    "x", " ", "\n", "\r\n", "\t", "=", ";", ",", ".", "(", ")", "{", "}", "[", "]",
    "\"", "\\", "'", "@\"", "@'", "$\"", "/*", "*/", "//", "?.", "a?.b", "1.5",
    "const K = 1", "const S = @\"", "function f() {", "var n = 1;", "closure(function(){ return n; })",
    "MAC", "ARG(1, 2)", "#macro ", "é", "{n}",
];

fn source() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..48).prop_map(|parts| parts.concat())
}

fn table() -> MacroTable {
    common::table("#macro MAC 40 + 2\n#macro ARG(a, b) ((a) - (b))")
}

proptest! {
    #[test]
    fn spans_partition_the_input(text in source()) {
        let spans = scan(&text);
        let mut expected_start = 0;
        for span in &spans {
            prop_assert_eq!(span.start, expected_start);
            prop_assert!(span.end > span.start);
            prop_assert!(text.is_char_boundary(span.start));
            expected_start = span.end;
        }
        prop_assert_eq!(expected_start, text.len());
    }

    #[test]
    fn rewrite_preserves_line_count(text in source()) {
        let table = table();
        if let Ok(out) = Rewriter::new(&table).rewrite(std::path::Path::new("scripts/p/p.gml"), &text) {
            let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
            prop_assert_eq!(out.output.lines().count(), normalized.lines().count());
            prop_assert_eq!(out.output.matches('\n').count(), normalized.matches('\n').count());
        }
    }

    #[test]
    fn non_code_text_survives_rewrite(body in "[a-zA-Z0-9 ,?.()]{0,24}") {
        let table = table();
        let text = format!("s = \"MAC {body}\"; // MAC {body}\n/* a?.b MAC */");
        let out = Rewriter::new(&table)
            .rewrite(std::path::Path::new("scripts/p/p.gml"), &text)
            .unwrap();
        prop_assert_eq!(out.output, text);
    }
}

#[test]
fn escaped_quote_interior_is_not_code() {
    let text = "x = \"a\\\"b\";";
    let index = SpanIndex::new(text);
    let open = text.find('"').unwrap();
    let close = text.rfind('"').unwrap();
    assert!(index.is_code(open - 1));
    for i in open..=close {
        assert!(!index.is_code(i), "offset {i} should be inside the string");
    }
    assert!(index.is_code(close + 1));
    assert_eq!(index.span_at(open).map(|span| span.kind), Some(SpanKind::EscapedString));
}
