//! Span-aware macro expansion.
//!
//! Only code spans are searched for macro names; strings and comments pass
//! through untouched. An identifier preceded by `.` is a member access and is
//! never expanded.
//!
//! ## Recursion
//!
//! The expander keeps an explicit stack of macros currently being expanded.
//! Entering a macro that is already on the stack fails with
//! [`SketchyError::MacroRecursion`] carrying the whole chain (`A -> B -> A`).
//! Arguments of a function-like macro are expanded before the macro itself is
//! entered, so `F(F(1))` is a nested call, not a cycle.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::errors::{Result, SketchyError};
use crate::macros::{MacroDefinition, MacroTable};
use crate::syntax::lexical::{
    char_at, is_ident_start, is_whitespace, read_identifier, skip_horizontal_whitespace,
};
use crate::syntax::span::SpanIndex;

/// Upper bound on whole-text expansion passes for one input.
pub const MAX_EXPANSION_PASSES: usize = 32;

// =============================
// Public API for macro expansion
// =============================

/// Expands every macro reference in `text` against `table`.
pub fn expand_all<'a>(table: &MacroTable, text: &'a str) -> Result<Cow<'a, str>> {
    MacroExpander::new(table).expand_all(text)
}

/// Expansion state for one top-level request.
#[derive(Debug)]
pub struct MacroExpander<'t> {
    table: &'t MacroTable,
    stack: Vec<String>,
    active: HashSet<String>,
}

impl<'t> MacroExpander<'t> {
    pub fn new(table: &'t MacroTable) -> Self {
        Self {
            table,
            stack: Vec::new(),
            active: HashSet::new(),
        }
    }

    /// Applies expansion passes until one changes nothing, or
    /// [`MAX_EXPANSION_PASSES`] have run. Returns the input unchanged (borrowed)
    /// when no macro was found.
    pub fn expand_all<'a>(&mut self, text: &'a str) -> Result<Cow<'a, str>> {
        if self.table.is_empty() {
            return Ok(Cow::Borrowed(text));
        }
        let mut current = Cow::Borrowed(text);
        for _ in 0..MAX_EXPANSION_PASSES {
            match self.expand_once(&current)? {
                Some(next) => current = Cow::Owned(next),
                None => break,
            }
        }
        Ok(current)
    }

    /// One left-to-right pass. `None` means nothing was expanded.
    ///
    /// Walks the whole text rather than span by span because an argument list
    /// may cross string and comment spans.
    fn expand_once(&mut self, text: &str) -> Result<Option<String>> {
        let table = self.table;
        let index = SpanIndex::new(text);
        let mut out: Option<String> = None;
        let mut copied = 0;
        let mut prev_non_ws: Option<char> = None;
        let mut i = 0;

        while i < text.len() {
            let Some(span) = index.span_at(i).copied() else { break };
            if !span.is_code() {
                prev_non_ws = None;
                i = span.end;
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

            let Some((ident, ident_end)) = read_identifier(text, i) else { break };
            let after_dot = prev_non_ws == Some('.');
            prev_non_ws = Some('a');
            let definition = match table.lookup(ident) {
                Some(definition) if !after_dot => definition,
                _ => {
                    i = ident_end;
                    continue;
                }
            };

            let (expansion, resume) = if definition.has_params() {
                let open = skip_horizontal_whitespace(text, ident_end);
                if !text[open..].starts_with('(') {
                    i = ident_end;
                    continue;
                }
                let (args, close_end) = parse_arguments(text, &index, open, &definition.name)?;
                (self.expand_invocation(definition, args)?, close_end)
            } else {
                self.enter(&definition.name)?;
                let expanded = self.expand_all(&definition.body)?.into_owned();
                self.leave();
                (expanded, ident_end)
            };

            trace!(name = %definition.name, "expanded macro");
            let buffer = out.get_or_insert_with(|| String::with_capacity(text.len() + 64));
            buffer.push_str(&text[copied..i]);
            buffer.push_str(&expansion);
            i = resume;
            copied = resume;
        }

        Ok(out.map(|mut buffer| {
            buffer.push_str(&text[copied..]);
            buffer
        }))
    }

    /// Arguments are expanded before `definition` is entered, so a macro used
    /// inside its own argument list is a nested call rather than recursion.
    fn expand_invocation(&mut self, definition: &MacroDefinition, args: Vec<&str>) -> Result<String> {
        if args.len() != definition.params.len() {
            return Err(SketchyError::ArgumentCountMismatch {
                name: definition.name.clone(),
                expected: definition.params.len(),
                found: args.len(),
            });
        }

        let mut bindings = HashMap::with_capacity(args.len());
        for (param, arg) in definition.params.iter().zip(args) {
            let expanded = self.expand_all(arg)?.into_owned();
            bindings.insert(param.as_str(), expanded);
        }

        let body = substitute_params(&definition.body, &bindings);
        self.enter(&definition.name)?;
        let expanded = self.expand_all(&body)?.into_owned();
        self.leave();
        Ok(expanded)
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        if self.active.contains(name) {
            let mut chain = self.stack.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(name);
            return Err(SketchyError::MacroRecursion { chain });
        }
        self.stack.push(name.to_string());
        self.active.insert(name.to_string());
        Ok(())
    }

    fn leave(&mut self) {
        if let Some(name) = self.stack.pop() {
            self.active.remove(&name);
        }
    }
}

// =============================
// Argument handling
// =============================

/// Splits the argument list opening at `open` (which holds `(`).
///
/// Commas separate arguments only at the top level of the call with no open
/// braces or brackets. Characters outside code spans are skipped. Returns the
/// trimmed arguments and the offset just past the closing `)`; a trailing empty
/// argument is dropped so `F()` has zero arguments.
fn parse_arguments<'a>(
    text: &'a str,
    index: &SpanIndex,
    open: usize,
    name: &str,
) -> Result<(Vec<&'a str>, usize)> {
    let bytes = text.as_bytes();
    let mut args = Vec::new();
    let mut paren = 1usize;
    let mut brace = 0usize;
    let mut bracket = 0usize;
    let mut start = open + 1;
    let mut i = open + 1;

    while i < bytes.len() {
        if !index.is_code(i) {
            i += 1;
            continue;
        }
        match bytes[i] {
            b'(' => paren += 1,
            b')' => {
                paren -= 1;
                if paren == 0 {
                    let last = text[start..i].trim();
                    if !last.is_empty() {
                        args.push(last);
                    }
                    return Ok((args, i + 1));
                }
            }
            b'{' => brace += 1,
            b'}' => brace = brace.saturating_sub(1),
            b'[' => bracket += 1,
            b']' => bracket = bracket.saturating_sub(1),
            b',' if paren == 1 && brace == 0 && bracket == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    Err(SketchyError::UnclosedInvocation {
        name: name.to_string(),
    })
}

/// Replaces whole-identifier parameter names in the code spans of `body`.
fn substitute_params(body: &str, bindings: &HashMap<&str, String>) -> String {
    let index = SpanIndex::new(body);
    index
        .rewrite_code(body, |text, span| {
            let code = span.text(text);
            let mut out = String::with_capacity(code.len());
            let mut i = 0;
            while let Some(c) = char_at(code, i) {
                if let Some((ident, end)) = read_identifier(code, i) {
                    match bindings.get(ident) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(ident),
                    }
                    i = end;
                } else {
                    out.push(c);
                    i += c.len_utf8();
                }
            }
            Some(out)
        })
        .into_owned()
}
