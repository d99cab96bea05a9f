//! Scope tracking and `const` directive collection.
//!
//! One forward pass over the code spans of a file. Function bodies open child
//! scopes; every other brace only matters for finding where the current
//! function body ends. Scopes live in an arena indexed by [`ScopeId`] and the
//! open ones are tracked on an explicit stack, so nesting depth is bounded by
//! memory rather than by the call stack.

use std::path::Path;

use tracing::trace;

use crate::consts::{ConstInfo, ConstPlan, FileScopes, ScopeFrame, ScopeId, ROOT_SCOPE};
use crate::errors::{Result, SketchyError};
use crate::macros::MacroTable;
use crate::syntax::lexical::{
    char_at, is_ident_start, is_keyword_at, read_identifier, skip_horizontal_whitespace,
    skip_whitespace,
};
use crate::syntax::span::{scan, SpanIndex, SpanKind};

/// Builds the scope arena for `text` (line endings already normalised) and
/// collects its `const` directives with provisional `Static` plans.
///
/// # Errors
/// - [`SketchyError::ConstantMacroNameCollision`] when a constant is named
///   like a macro.
/// - [`SketchyError::ConstantRedefinition`] when a scope defines a name twice.
/// - [`SketchyError::UnterminatedRawStringConstant`] when a multi-line raw
///   string never closes.
pub fn build_scopes(path: &Path, text: &str, table: &MacroTable) -> Result<FileScopes> {
    let lines: Vec<&str> = text.split('\n').collect();
    let index = SpanIndex::new(text);
    let mut builder = ScopeBuilder::new(lines.len());
    let mut line = 0;
    let mut line_start = 0;
    let mut pending_body: Option<usize> = None;

    for span in index.spans() {
        let mut i = span.start;
        while i < span.end {
            let Some(c) = char_at(text, i) else { break };

            if c == '\n' {
                builder.end_line();
                line += 1;
                line_start = i + 1;
                i += 1;
                continue;
            }
            if !span.is_code() {
                i += c.len_utf8();
                continue;
            }

            if i == line_start {
                if let Some(directive) = parse_directive(lines[line]) {
                    let rhs = read_rhs(path, &lines, line, &directive)?;
                    builder.define(path, table, directive.name, line, rhs)?;
                }
            }

            if is_ident_start(c) {
                let Some((ident, end)) = read_identifier(text, i) else { break };
                if ident == "function" {
                    if let Some(brace) = function_body_open(text, &index, end) {
                        pending_body = Some(brace);
                    }
                }
                i = end;
                continue;
            }

            match c {
                '{' if pending_body == Some(i) => {
                    pending_body = None;
                    builder.open_function();
                }
                '{' => builder.open_brace(),
                '}' => builder.close_brace(),
                _ => {}
            }
            i += 1;
        }
    }

    Ok(builder.finish())
}

// ============================================================================
// SCOPE STATE
// ============================================================================

struct ScopeBuilder {
    scopes: Vec<ScopeFrame>,
    stack: Vec<ScopeId>,
    /// Brace depth of each open function scope; parallel to `stack[1..]`.
    depths: Vec<usize>,
    line_scopes: Vec<ScopeId>,
}

impl ScopeBuilder {
    fn new(line_count: usize) -> Self {
        Self {
            scopes: vec![ScopeFrame::default()],
            stack: vec![ROOT_SCOPE],
            depths: Vec::new(),
            line_scopes: Vec::with_capacity(line_count),
        }
    }

    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ROOT_SCOPE)
    }

    fn end_line(&mut self) {
        let current = self.current();
        self.line_scopes.push(current);
    }

    /// The body brace of a function belongs to the new scope only.
    fn open_function(&mut self) {
        let parent = self.current();
        self.scopes.push(ScopeFrame {
            parent: Some(parent),
            ..ScopeFrame::default()
        });
        self.stack.push(self.scopes.len() - 1);
        self.depths.push(1);
    }

    fn open_brace(&mut self) {
        if let Some(depth) = self.depths.last_mut() {
            *depth += 1;
        }
    }

    fn close_brace(&mut self) {
        let Some(depth) = self.depths.last_mut() else { return };
        *depth -= 1;
        if *depth == 0 {
            self.depths.pop();
            self.stack.pop();
        }
    }

    fn define(
        &mut self,
        path: &Path,
        table: &MacroTable,
        name: &str,
        line: usize,
        rhs: String,
    ) -> Result<()> {
        if table.contains(name) {
            return Err(SketchyError::ConstantMacroNameCollision {
                name: name.to_string(),
                path: path.display().to_string(),
                line: line + 1,
            });
        }
        let scope_id = self.current();
        let scope = &mut self.scopes[scope_id];
        if scope.consts.contains_key(name) {
            return Err(SketchyError::ConstantRedefinition {
                name: name.to_string(),
                path: path.display().to_string(),
                line: line + 1,
            });
        }

        trace!(name, line = line + 1, scope = scope_id, "found const");
        scope.directive_lines.insert(line);
        scope.consts.insert(
            name.to_string(),
            ConstInfo {
                name: name.to_string(),
                line,
                plan: ConstPlan::Static(rhs),
            },
        );
        Ok(())
    }

    fn finish(mut self) -> FileScopes {
        // The final line has no terminating newline.
        self.end_line();
        FileScopes {
            scopes: self.scopes,
            line_scopes: self.line_scopes,
        }
    }
}

/// After the `function` keyword ending at `after_keyword`, finds the `{` that
/// opens the body: `function [name] (params) [: Parent(args)] [constructor] {`.
fn function_body_open(text: &str, index: &SpanIndex, after_keyword: usize) -> Option<usize> {
    let mut at = skip_whitespace(text, after_keyword);
    if let Some((_, end)) = read_identifier(text, at) {
        at = skip_whitespace(text, end);
    }
    at = skip_whitespace(text, index.matching_close(text, at, b'(', b')')? + 1);

    if text[at..].starts_with(':') {
        at = skip_whitespace(text, at + 1);
        let (_, end) = read_identifier(text, at)?;
        at = skip_whitespace(text, end);
        at = skip_whitespace(text, index.matching_close(text, at, b'(', b')')? + 1);
    }
    if is_keyword_at(text, at, "constructor") {
        at = skip_whitespace(text, at + "constructor".len());
    }

    (text[at..].starts_with('{') && index.is_code(at)).then_some(at)
}

// ============================================================================
// DIRECTIVES
// ============================================================================

/// A `const NAME = ...` line, split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Directive<'a> {
    /// Leading horizontal whitespace.
    pub indent: &'a str,
    pub name: &'a str,
    /// Offset in the line where the right-hand side starts.
    pub rhs_start: usize,
}

/// Parses an anchored directive: only horizontal whitespace may precede
/// `const`, which must be a whole word.
pub(crate) fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let head = skip_horizontal_whitespace(line, 0);
    if !is_keyword_at(line, head, "const") {
        return None;
    }
    let name_start = skip_horizontal_whitespace(line, head + "const".len());
    let (name, name_end) = read_identifier(line, name_start)?;
    let eq = skip_horizontal_whitespace(line, name_end);
    if !line[eq..].starts_with('=') || line[eq + 1..].starts_with('=') {
        return None;
    }
    Some(Directive {
        indent: &line[..head],
        name,
        rhs_start: skip_horizontal_whitespace(line, eq + 1),
    })
}

/// The right-hand side of a directive line with any trailing comment and
/// statement terminator separated out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RhsParts<'a> {
    pub expression: &'a str,
    pub semicolon: bool,
    pub comment: &'a str,
}

pub(crate) fn split_rhs(rhs: &str) -> RhsParts<'_> {
    let spans = scan(rhs);
    let mut end = rhs.len();
    loop {
        let trimmed = rhs[..end].trim_end().len();
        if trimmed == 0 {
            end = 0;
            break;
        }
        match spans.iter().find(|span| span.contains(trimmed - 1)) {
            Some(span) if matches!(span.kind, SpanKind::LineComment | SpanKind::BlockComment) => {
                end = span.start;
            }
            _ => {
                end = trimmed;
                break;
            }
        }
    }

    let code = rhs[..end].trim();
    let (expression, semicolon) = match code.strip_suffix(';') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (code, false),
    };
    RhsParts {
        expression,
        semicolon,
        comment: rhs[end..].trim(),
    }
}

/// Reads the right-hand side. A raw string that does not close on the
/// directive line continues, newline-joined, up to the first matching quote on
/// a later line.
fn read_rhs(path: &Path, lines: &[&str], line: usize, directive: &Directive<'_>) -> Result<String> {
    let rhs = &lines[line][directive.rhs_start..];
    let raw_quote = match rhs.as_bytes() {
        [b'@', quote @ (b'"' | b'\''), ..] => Some(*quote as char),
        _ => None,
    };

    if let Some(quote) = raw_quote {
        if !rhs[2..].contains(quote) {
            let mut joined = rhs.to_string();
            for next in &lines[line + 1..] {
                joined.push('\n');
                if let Some(close) = next.find(quote) {
                    joined.push_str(&next[..=close]);
                    return Ok(joined);
                }
                joined.push_str(next);
            }
            return Err(SketchyError::UnterminatedRawStringConstant {
                name: directive.name.to_string(),
                path: path.display().to_string(),
                line: line + 1,
            });
        }
    }

    Ok(split_rhs(rhs).expression.to_string())
}
