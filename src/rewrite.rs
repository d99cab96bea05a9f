//! # Rewriter
//!
//! Sequences the passes for one file:
//!
//! 1. **Discovery**: normalise line endings, note the lines of macros this
//!    file defines, build and resolve the constant scopes.
//! 2. **Per-line rewrite**: macro definitions and inlined `const` directives
//!    are commented out, `Static` directives become runtime declarations, and
//!    every other line has constants substituted and macros expanded. This pass
//!    never changes the number of lines.
//! 3. **Full-text lowering**: optional chains, then closure sugar.
//!
//! The macro table is shared read-only, so files can be rewritten in any order.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, trace};

use crate::consts::scope::{parse_directive, split_rhs};
use crate::consts::{
    build_scopes, resolve_scopes, substitute, ConstInfo, ConstPlan, FileScopes, ScopeId,
    ROOT_SCOPE,
};
use crate::errors::Result;
use crate::macros::{expand_all, MacroTable};
use crate::syntax::lexical::normalize_line_endings;
use crate::syntax::span::SpanIndex;
use crate::transforms::{lower_closures, lower_optional_chains};

/// Result of rewriting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    /// True when `output` differs from the input with normalised line endings.
    pub changed: bool,
    /// Rewritten text, `\n` line endings.
    pub output: String,
}

/// Rewrites files against one project-wide macro table.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'t> {
    table: &'t MacroTable,
}

impl<'t> Rewriter<'t> {
    pub fn new(table: &'t MacroTable) -> Self {
        Self { table }
    }

    /// Rewrites `text`, the content of the file at `path`.
    ///
    /// `path` is used for diagnostics and to find the macros this file owns.
    ///
    /// # Errors
    /// Any definition conflict, malformed directive or expansion failure in
    /// the file. Expansion failures carry the file and 1-based line.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn rewrite(&self, path: &Path, text: &str) -> Result<RewriteOutput> {
        let normalized = normalize_line_endings(text);

        let macro_lines = self.macro_lines(path);
        let mut scopes = build_scopes(path, &normalized, self.table)?;
        resolve_scopes(path, &mut scopes, self.table)?;
        debug!(
            scopes = scopes.scopes.len(),
            own_macro_lines = macro_lines.len(),
            "discovery complete"
        );

        let index = SpanIndex::new(&normalized);
        let mut lines = Vec::new();
        let mut line_start = 0;
        for (line_index, line) in normalized.split('\n').enumerate() {
            let rewritten = if macro_lines.contains(&line_index) {
                format!("//{line}")
            } else if let Some((scope, info)) = scopes.directive_at(line_index) {
                rewrite_directive(line, scope, info)
            } else {
                let head = carried_head_len(&index, line_start, line.len());
                let (head, rest) = line.split_at(head);
                let rest = self
                    .rewrite_code_line(&scopes, line_index, rest)
                    .map_err(|err| err.in_file(path, line_index))?;
                format!("{head}{rest}")
            };
            if rewritten != line {
                trace!(line = line_index + 1, "line rewritten");
            }
            lines.push(rewritten);
            line_start += line.len() + 1;
        }

        let joined = lines.join("\n");
        let chained = lower_optional_chains(&joined);
        let output = lower_closures(&chained).into_owned();
        let changed = output != normalized;
        debug!(changed, "rewrite complete");

        Ok(RewriteOutput { changed, output })
    }

    /// Constant substitution, macro expansion, then substitution again since
    /// macro bodies may name constants.
    fn rewrite_code_line(&self, scopes: &FileScopes, line_index: usize, text: &str) -> Result<String> {
        let scope = scopes.scope_of_line(line_index);
        let substituted = substitute_visible(scopes, scope, text);
        let expanded = expand_all(self.table, &substituted)?;
        Ok(substitute_visible(scopes, scope, &expanded))
    }

    /// Line indices of every macro definition owned by `path`.
    fn macro_lines(&self, path: &Path) -> BTreeSet<usize> {
        self.table
            .definitions_in(path)
            .flat_map(|definition| definition.line_start..=definition.line_end)
            .collect()
    }
}

/// Substitutes the constants of `scope`, then those of the root scope.
fn substitute_visible(scopes: &FileScopes, scope: ScopeId, text: &str) -> String {
    let local = substitute(text, &scopes.scope(scope).consts);
    if scope == ROOT_SCOPE {
        return local.into_owned();
    }
    substitute(&local, &scopes.root().consts).into_owned()
}

/// Length of the non-code region continued from a previous line (block
/// comment, raw string or template text) at the head of the line starting at
/// `line_start`.
fn carried_head_len(index: &SpanIndex, line_start: usize, line_len: usize) -> usize {
    match index.span_at(line_start) {
        Some(span) if !span.is_code() && span.start < line_start => {
            (span.end - line_start).min(line_len)
        }
        _ => 0,
    }
}

fn rewrite_directive(line: &str, scope: ScopeId, info: &ConstInfo) -> String {
    let Some(directive) = parse_directive(line) else {
        return line.to_string();
    };

    match &info.plan {
        ConstPlan::Inline(_) | ConstPlan::Alias(_) => format!("//{line}"),
        ConstPlan::MultilineRawStringVariable(_) => {
            let after_keyword = directive.indent.len() + "const".len();
            format!("{}var{}", directive.indent, &line[after_keyword..])
        }
        ConstPlan::Static(rhs) => {
            let parts = split_rhs(&line[directive.rhs_start..]);
            let name = &info.name;
            let mut out = if scope == ROOT_SCOPE {
                format!(
                    "{}var {name} = (function(){{static __ = {rhs}; return __;}})()",
                    directive.indent
                )
            } else {
                format!(
                    "{}static __const_{name} = {rhs}; var {name} = __const_{name}",
                    directive.indent
                )
            };
            if parts.semicolon {
                out.push(';');
            }
            if !parts.comment.is_empty() {
                out.push(' ');
                out.push_str(parts.comment);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, SketchyError};
    use crate::macros::build_table;
    use pretty_assertions::assert_eq;

    const MACROS: &str = "#macro K 7\n#macro ADD(a, b) ((a) + (b))\n";

    fn table() -> MacroTable {
        build_table([("scripts/macros.gml", MACROS)]).unwrap()
    }

    fn rewrite(text: &str) -> RewriteOutput {
        Rewriter::new(&table())
            .rewrite(Path::new("scripts/test.gml"), text)
            .unwrap()
    }

    #[test]
    fn own_macro_lines_are_commented_out() {
        let table = table();
        let out = Rewriter::new(&table)
            .rewrite(Path::new("scripts/macros.gml"), MACROS)
            .unwrap();
        assert_eq!(out.output, "//#macro K 7\n//#macro ADD(a, b) ((a) + (b))\n");
        assert!(out.changed);
    }

    #[test]
    fn inline_constant_is_folded_and_directive_commented() {
        let out = rewrite("const X = K * (3 + 4)\ny = X;");
        assert_eq!(out.output, "//const X = K * (3 + 4)\ny = 49;");
    }

    #[test]
    fn static_root_constant_uses_immediately_invoked_function() {
        let out = rewrite("    const P = get_timer(); // start\nx = P;");
        assert_eq!(
            out.output,
            "    var P = (function(){static __ = get_timer(); return __;})(); // start\nx = P;"
        );
    }

    #[test]
    fn static_function_constant_uses_prefixed_static() {
        let out = rewrite("function f() {\n    const P = [1, 2]\n    return P;\n}");
        assert_eq!(
            out.output,
            "function f() {\n    static __const_P = [1, 2]; var P = __const_P\n    return P;\n}"
        );
    }

    #[test]
    fn alias_references_name_the_static_constant() {
        let out = rewrite("const P = make()\nconst Q = make()\nx = Q;");
        assert_eq!(
            out.output,
            "var P = (function(){static __ = make(); return __;})()\n//const Q = make()\nx = P;"
        );
    }

    #[test]
    fn multiline_raw_string_becomes_var() {
        let text = "const M = @\"one\nK two\"\nx = M;";
        let out = rewrite(text);
        assert_eq!(out.output, "var M = @\"one\nK two\"\nx = M;");
    }

    #[test]
    fn macros_inside_carried_comments_are_untouched() {
        let text = "/* start\nK ADD(1, 2) */ x = K;";
        assert_eq!(rewrite(text).output, "/* start\nK ADD(1, 2) */ x = 7;");
    }

    #[test]
    fn root_constants_are_visible_in_functions() {
        let text = "const N = 2\nfunction f() {\n    return N + ADD(N, 1);\n}";
        assert_eq!(
            rewrite(text).output,
            "//const N = 2\nfunction f() {\n    return 2 + ((2) + (1));\n}"
        );
    }

    #[test]
    fn line_endings_are_normalised_without_counting_as_change() {
        let out = rewrite("x = 1;\r\ny = 2;\r\n");
        assert_eq!(out.output, "x = 1;\ny = 2;\n");
        assert!(!out.changed);
    }

    #[test]
    fn full_text_transforms_run_last() {
        let text = "var n = K;\nf = closure(function() {\n    return n?.hp;\n});";
        assert_eq!(
            rewrite(text).output,
            "var n = 7;\nf = method({__closure_this: self, __closure_n: n}, function() {var n = __closure_n; with(__closure_this){\n    return __struct_get_hashes(n, variable_get_hash(\"hp\"));\n}});"
        );
    }

    #[test]
    fn expansion_errors_carry_file_and_line() {
        let err = Rewriter::new(&table())
            .rewrite(Path::new("scripts/test.gml"), "x = 1;\ny = ADD(1);")
            .unwrap_err();
        assert!(matches!(
            &err,
            SketchyError::InFile { line: 2, .. }
        ));
        assert!(matches!(err.root_cause(), SketchyError::ArgumentCountMismatch { .. }));
        assert_eq!(err.category(), ErrorCategory::ExpansionFailure);
    }
}
