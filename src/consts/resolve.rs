//! Per-scope constant resolution.
//!
//! Constants are resolved in definition order. Each right-hand side is macro
//! expanded, then earlier inlined constants of the same scope are substituted
//! into it, and finally it is classified:
//!
//! | Right-hand side                                   | Plan                          |
//! |---------------------------------------------------|-------------------------------|
//! | names or repeats a `Static` constant              | `Alias`                       |
//! | repeats an `Inline` constant's value              | `Inline` (same value)         |
//! | `"..."`, single-line `@"..."`, `$"..."` w/o `{}`  | `Inline`                      |
//! | multi-line `@"..."`                               | `MultilineRawStringVariable`  |
//! | `$"..."` with an interpolation                    | `Static`                      |
//! | contains `[` or `{` in code                       | `Static`                      |
//! | folds with [`evaluate`]                           | `Inline` (folded literal)     |
//! | anything else                                     | `Static`                      |

use std::path::Path;

use tracing::trace;

use crate::consts::eval::evaluate;
use crate::consts::substitute::substitute;
use crate::consts::{ConstInfo, ConstMap, ConstPlan, FileScopes, ROOT_SCOPE};
use crate::errors::Result;
use crate::macros::{expand_all, MacroTable};
use crate::syntax::span::{scan, SpanKind};

/// Resolves every scope of `scopes` in place.
///
/// The root scope is resolved first; its inlined constants are also
/// substituted into the definitions of function scopes, since the directive
/// lines they came from no longer exist at runtime.
pub fn resolve_scopes(path: &Path, scopes: &mut FileScopes, table: &MacroTable) -> Result<()> {
    let mut root = ConstMap::new();
    for (id, scope) in scopes.scopes.iter_mut().enumerate() {
        let ordered: Vec<ConstInfo> = scope.consts_in_order().into_iter().cloned().collect();
        let mut resolved: Vec<ConstInfo> = Vec::with_capacity(ordered.len());
        let mut by_name = ConstMap::with_capacity(ordered.len());

        for info in ordered {
            let rhs = match &info.plan {
                ConstPlan::Static(rhs) => rhs.as_str(),
                _ => continue,
            };
            let expanded = expand_all(table, rhs).map_err(|err| err.in_file(path, info.line))?;
            let mut substituted = substitute(&expanded, &by_name).into_owned();
            if id != ROOT_SCOPE {
                substituted = substitute(&substituted, &root).into_owned();
            }
            let plan = classify(substituted.trim(), &resolved);
            trace!(name = %info.name, plan = plan.kind_name(), "resolved const");

            let next = info.with_plan(plan);
            by_name.insert(next.name.clone(), next.clone());
            resolved.push(next);
        }

        if id == ROOT_SCOPE {
            root = by_name.clone();
        }
        scope.consts = by_name;
    }
    Ok(())
}

/// Chooses a plan for an expanded, substituted right-hand side. `earlier`
/// holds the constants of the same scope resolved so far, in order.
pub fn classify(rhs: &str, earlier: &[ConstInfo]) -> ConstPlan {
    if let Some(plan) = match_earlier(rhs, earlier) {
        return plan;
    }
    if let Some(plan) = classify_string_literal(rhs) {
        return plan;
    }
    if contains_collection_literal(rhs) {
        return ConstPlan::Static(rhs.to_string());
    }
    match evaluate(rhs) {
        Some(literal) => ConstPlan::Inline(literal),
        None => ConstPlan::Static(rhs.to_string()),
    }
}

fn match_earlier(rhs: &str, earlier: &[ConstInfo]) -> Option<ConstPlan> {
    if let Some(target) = earlier.iter().find(|info| info.name == rhs) {
        return match &target.plan {
            ConstPlan::Static(_) => Some(ConstPlan::Alias(target.name.clone())),
            ConstPlan::Inline(value) => Some(ConstPlan::Inline(value.clone())),
            _ => None,
        };
    }
    earlier.iter().find_map(|info| match &info.plan {
        ConstPlan::Static(value) if value == rhs => Some(ConstPlan::Alias(info.name.clone())),
        ConstPlan::Inline(value) if value == rhs => Some(ConstPlan::Inline(value.clone())),
        _ => None,
    })
}

/// Classifies a right-hand side that is exactly one string literal.
fn classify_string_literal(rhs: &str) -> Option<ConstPlan> {
    if rhs.is_empty() {
        return None;
    }
    let spans = scan(rhs);

    if let [only] = spans.as_slice() {
        let whole = only.start == 0 && only.end == rhs.len();
        match only.kind {
            SpanKind::EscapedString if whole && is_closed(rhs, '"') => {
                return Some(ConstPlan::Inline(rhs.to_string()));
            }
            SpanKind::RawString if whole && is_closed_raw(rhs) => {
                return Some(if rhs.contains('\n') {
                    ConstPlan::MultilineRawStringVariable(rhs.to_string())
                } else {
                    ConstPlan::Inline(rhs.to_string())
                });
            }
            _ => {}
        }
    }

    let is_template = spans.first().map_or(false, |span| span.kind == SpanKind::TemplateText)
        && spans.iter().all(|span| span.kind != SpanKind::Code)
        && rhs.ends_with('"');
    if !is_template {
        return None;
    }
    if spans.iter().any(|span| span.kind == SpanKind::TemplateExpr) {
        Some(ConstPlan::Static(rhs.to_string()))
    } else {
        Some(ConstPlan::Inline(rhs.to_string()))
    }
}

fn is_closed(literal: &str, quote: char) -> bool {
    literal.len() >= 2 && literal.ends_with(quote)
}

fn is_closed_raw(literal: &str) -> bool {
    let quote = if literal.starts_with("@'") { '\'' } else { '"' };
    literal.len() >= 3 && literal.ends_with(quote)
}

/// True when `rhs` has an array or struct literal opener in code.
fn contains_collection_literal(rhs: &str) -> bool {
    scan(rhs)
        .iter()
        .filter(|span| span.is_code())
        .any(|span| span.text(rhs).contains(['[', '{']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::build_scopes;
    use crate::macros::MacroDefinition;

    fn resolve(text: &str, table: &MacroTable) -> FileScopes {
        let path = Path::new("test.gml");
        let mut scopes = build_scopes(path, text, table).unwrap();
        resolve_scopes(path, &mut scopes, table).unwrap();
        scopes
    }

    fn plan(scopes: &FileScopes, name: &str) -> ConstPlan {
        scopes.root().consts[name].plan.clone()
    }

    #[test]
    fn arithmetic_folds_to_inline() {
        let scopes = resolve("const K = 7 * (3 + 4)", &MacroTable::new());
        assert_eq!(plan(&scopes, "K"), ConstPlan::Inline("49".into()));
    }

    #[test]
    fn earlier_inline_constants_feed_later_ones() {
        let scopes = resolve("const A = 5 + 5\nconst B = A * 2", &MacroTable::new());
        assert_eq!(plan(&scopes, "A"), ConstPlan::Inline("10".into()));
        assert_eq!(plan(&scopes, "B"), ConstPlan::Inline("20".into()));
    }

    #[test]
    fn repeated_static_value_becomes_alias() {
        let scopes = resolve(
            "const P = some_runtime_call()\nconst Q = some_runtime_call()\nconst R = P",
            &MacroTable::new(),
        );
        assert_eq!(plan(&scopes, "P"), ConstPlan::Static("some_runtime_call()".into()));
        assert_eq!(plan(&scopes, "Q"), ConstPlan::Alias("P".into()));
        assert_eq!(plan(&scopes, "R"), ConstPlan::Alias("P".into()));
    }

    #[test]
    fn macros_are_expanded_before_classification() {
        let mut table = MacroTable::new();
        table
            .add(MacroDefinition::new("BASE", vec![], "100", "m.gml", 0, 0))
            .unwrap();
        let scopes = resolve("const LIMIT = BASE / 4", &table);
        assert_eq!(plan(&scopes, "LIMIT"), ConstPlan::Inline("25".into()));
    }

    #[test]
    fn string_literals_are_classified_by_shape() {
        let text = "const S = \"a\\\"b\"\n\
                    const R = @'c:\\dir'\n\
                    const M = @\"one\ntwo\"\n\
                    const T = $\"plain\"\n\
                    const U = $\"hp {hp}\"";
        let scopes = resolve(text, &MacroTable::new());
        assert_eq!(plan(&scopes, "S"), ConstPlan::Inline("\"a\\\"b\"".into()));
        assert_eq!(plan(&scopes, "R"), ConstPlan::Inline("@'c:\\dir'".into()));
        assert_eq!(
            plan(&scopes, "M"),
            ConstPlan::MultilineRawStringVariable("@\"one\ntwo\"".into())
        );
        assert_eq!(plan(&scopes, "T"), ConstPlan::Inline("$\"plain\"".into()));
        assert_eq!(plan(&scopes, "U"), ConstPlan::Static("$\"hp {hp}\"".into()));
    }

    #[test]
    fn collection_literals_stay_static() {
        let scopes = resolve("const L = [1, 2]\nconst S = {a: 1}\nconst Q = \"[\"", &MacroTable::new());
        assert_eq!(plan(&scopes, "L"), ConstPlan::Static("[1, 2]".into()));
        assert_eq!(plan(&scopes, "S"), ConstPlan::Static("{a: 1}".into()));
        assert_eq!(plan(&scopes, "Q"), ConstPlan::Inline("\"[\"".into()));
    }

    #[test]
    fn function_scopes_see_root_constants() {
        let text = "const A = 1\nfunction f() {\nconst B = A + 1\n}";
        let scopes = resolve(text, &MacroTable::new());
        assert_eq!(scopes.scope(ROOT_SCOPE).consts["A"].plan, ConstPlan::Inline("1".into()));
        assert_eq!(scopes.scope(1).consts["B"].plan, ConstPlan::Inline("2".into()));
        assert!(!scopes.root().consts.contains_key("B"));
    }
}
