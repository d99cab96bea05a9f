//! End-to-end rewrites through the public `Rewriter` API.

mod common;

use std::path::Path;

use pretty_assertions::assert_eq;
use sketchy::macros::build_table;
use sketchy::{ErrorCategory, MacroTable, Rewriter, SketchyError};

use common::{rewrite, table};

// ============================================================================
// MACROS
// ============================================================================

#[test]
fn parameterless_macro_expands() {
    let out = rewrite(&table("#macro FOO 1+1"), "x = FOO;");
    assert_eq!(out.output, "x = 1+1;");
    assert!(out.changed);
}

#[test]
fn string_argument_with_comma_is_one_argument() {
    let out = rewrite(&table("#macro ADD(a, b) a+b"), "y = ADD(\"x,y\", 2);");
    assert_eq!(out.output, "y = \"x,y\"+2;");
}

#[test]
fn continued_macro_body_is_flattened() {
    let macros = "#macro CLAMP01(v) \\\n    clamp(v, 0, 1)";
    let out = rewrite(&table(macros), "a = CLAMP01(b);");
    assert_eq!(out.output, "a = clamp(b, 0, 1);");
}

#[test]
fn macro_recursion_is_fatal() {
    let table = table("#macro A B\n#macro B A");
    let err = Rewriter::new(&table)
        .rewrite(Path::new("scripts/test/test.gml"), "x = A;")
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ExpansionFailure);
    match err.root_cause() {
        SketchyError::MacroRecursion { chain } => assert_eq!(chain, "A -> B -> A"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn duplicate_macros_conflict_across_files() {
    let err = build_table([("a.gml", "#macro X 1"), ("b.gml", "\n#macro X 2")]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::DefinitionConflict);
}

#[test]
fn macros_never_touch_strings_or_comments() {
    let text = "s = \"FOO\"; // FOO\n/* FOO */ t = @'FOO'; u = $\"{FOO} FOO\";";
    let out = rewrite(&table("#macro FOO 7"), text);
    assert_eq!(
        out.output,
        "s = \"FOO\"; // FOO\n/* FOO */ t = @'FOO'; u = $\"{7} FOO\";"
    );
}

// ============================================================================
// CONSTANTS
// ============================================================================

#[test]
fn constant_folding_inlines_references() {
    let out = rewrite(&MacroTable::new(), "const K = 7 * (3 + 4)\nshow(K, o.K);");
    assert_eq!(out.output, "//const K = 7 * (3 + 4)\nshow(49, o.K);");
}

#[test]
fn static_fallback_at_root_and_in_functions() {
    let text = "const P = some_runtime_call();\n\
                function f() {\n\
                \tconst Q = some_runtime_call()\n\
                \treturn P + Q;\n\
                }";
    let out = rewrite(&MacroTable::new(), text);
    assert_eq!(
        out.output,
        "var P = (function(){static __ = some_runtime_call(); return __;})();\n\
         function f() {\n\
         \tstatic __const_Q = some_runtime_call(); var Q = __const_Q\n\
         \treturn P + Q;\n\
         }"
    );
}

#[test]
fn repeated_static_value_becomes_alias() {
    let text = "const A = make_list()\nconst B = make_list()\nuse(A, B);";
    let out = rewrite(&MacroTable::new(), text);
    assert_eq!(
        out.output,
        "var A = (function(){static __ = make_list(); return __;})()\n\
         //const B = make_list()\n\
         use(A, A);"
    );
}

#[test]
fn constants_are_scoped_to_their_function() {
    let text = "function outer() { function inner() {\n\
                \tconst K = 1\n\
                \treturn K;\n\
                }\n\
                \tconst J = 2\n\
                \treturn K + J;\n\
                }\n\
                x = J;";
    let out = rewrite(&MacroTable::new(), text);
    assert_eq!(
        out.output,
        "function outer() { function inner() {\n\
         //\tconst K = 1\n\
         \treturn 1;\n\
         }\n\
         //\tconst J = 2\n\
         \treturn K + 2;\n\
         }\n\
         x = J;"
    );
}

#[test]
fn constant_named_like_macro_conflicts() {
    let table = table("#macro K 1");
    let err = Rewriter::new(&table)
        .rewrite(Path::new("scripts/test/test.gml"), "const K = 2")
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::DefinitionConflict);
}

#[test]
fn redefined_constant_conflicts() {
    let err = Rewriter::new(&MacroTable::new())
        .rewrite(Path::new("scripts/test/test.gml"), "const K = 1\nconst K = 2")
        .unwrap_err();
    assert!(matches!(err.root_cause(), SketchyError::ConstantRedefinition { .. }));
}

#[test]
fn unterminated_raw_string_constant_is_malformed() {
    let err = Rewriter::new(&MacroTable::new())
        .rewrite(Path::new("scripts/test/test.gml"), "const S = @\"never\nclosed")
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::MalformedDirective);
}

#[test]
fn macros_feed_constants_and_constants_feed_macro_arguments() {
    let table = table("#macro TILE 16\n#macro PX(n) ((n) * TILE)");
    let text = "const W = TILE * 4\nx = PX(W);";
    let out = rewrite(&table, text);
    assert_eq!(out.output, "//const W = TILE * 4\nx = ((64) * 16);");
}

// ============================================================================
// PIPELINE PROPERTIES
// ============================================================================

#[test]
fn rewriting_inline_only_output_is_a_no_op() {
    let text = "const A = 2\nconst B = A * 10\nx = A + B;\n";
    let first = rewrite(&MacroTable::new(), text);
    assert!(first.changed);
    let second = rewrite(&MacroTable::new(), &first.output);
    assert!(!second.changed);
    assert_eq!(second.output, first.output);
}

#[test]
fn line_count_is_preserved_for_every_construct() {
    let table = table("#macro LONG(a) \\\n  (a) \\\n  + 1");
    let text = "const S = @\"line one\nline two\"\r\n\
                const P = make()\r\n\
                v = LONG(2) + a?.b?.c;\r\n\
                var n = 1;\r\n\
                f = closure(function()\r\n{\r\n  return n;\r\n});\r\n";
    let out = rewrite(&table, text);
    let normalized = text.replace("\r\n", "\n");
    assert_eq!(out.output.lines().count(), normalized.lines().count());
    assert!(!out.output.contains('\r'));
}

#[test]
fn own_macro_definitions_are_commented_out() {
    let table = table("#macro A 1\n#macro B(x) \\\n  x");
    let out = Rewriter::new(&table)
        .rewrite(Path::new("scripts/macros/macros.gml"), "#macro A 1\n#macro B(x) \\\n  x")
        .unwrap();
    assert_eq!(out.output, "//#macro A 1\n//#macro B(x) \\\n//  x");
}

// ============================================================================
// FULL-TEXT TRANSFORMS
// ============================================================================

#[test]
fn optional_chain_all_guarded() {
    let out = rewrite(&MacroTable::new(), "v = a?.b?.c;");
    assert_eq!(
        out.output,
        "v = __struct_get_hashes(a, variable_get_hash(\"b\"), variable_get_hash(\"c\"));"
    );
}

#[test]
fn optional_chain_mixed_segments() {
    let out = rewrite(&MacroTable::new(), "v = inst.stats?.hp.max;");
    assert_eq!(out.output, "v = inst.stats[$ \"hp\"].max;");
}

#[test]
fn closure_captures_outer_variable() {
    let text = "var n = 1;\nf = closure(function(){ return n + 1; });";
    let out = rewrite(&MacroTable::new(), text);
    assert_eq!(
        out.output,
        "var n = 1;\nf = method({__closure_this: self, __closure_n: n}, \
         function(){var n = __closure_n; with(__closure_this){ return n + 1; }});"
    );
}

#[test]
fn closure_without_captures_is_a_bare_function() {
    let text = "var n = 1;\nf = closure(function(m){ return m + global.k; });";
    let out = rewrite(&MacroTable::new(), text);
    assert_eq!(out.output, "var n = 1;\nf = function(m){ return m + global.k; };");
}
