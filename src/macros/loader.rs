//! Discovers `#macro` directives in source files.
//!
//! A directive starts on a line whose first non-blank text is `#macro` and
//! continues while each line ends with a backslash in code. Lines inside a
//! block comment opened at the head of a line are skipped.

use std::path::Path;

use tracing::trace;

use crate::errors::{Result, SketchyError};
use crate::macros::{MacroDefinition, MacroTable};
use crate::syntax::lexical::{
    ends_with_continuation, is_ident_part, join_lines_single_line, normalize_line_endings,
    read_identifier, skip_horizontal_whitespace, skip_whitespace,
};

const DIRECTIVE: &str = "#macro";

// =============================
// Public API for macro loading
// =============================

/// Collects every `#macro` definition in `text`, attributing them to `path`.
pub fn collect_definitions(path: &Path, text: &str) -> Result<Vec<MacroDefinition>> {
    let normalized = normalize_line_endings(text);
    let lines: Vec<&str> = normalized.split('\n').collect();
    let mut definitions = Vec::new();
    let mut in_block_comment = false;
    let mut line_index = 0;

    while line_index < lines.len() {
        let line = lines[line_index];
        let head = skip_horizontal_whitespace(line, 0);

        if in_block_comment {
            if line[head..].contains("*/") {
                in_block_comment = false;
            }
            line_index += 1;
            continue;
        }

        if line[head..].starts_with("/*") {
            in_block_comment = !line[head + 2..].contains("*/");
            line_index += 1;
            continue;
        }

        if !is_directive_line(line, head) {
            line_index += 1;
            continue;
        }

        let start_line = line_index;
        let mut block = vec![&line[head..]];
        let mut continued = ends_with_continuation(line);
        while continued && line_index + 1 < lines.len() {
            line_index += 1;
            block.push(lines[line_index]);
            continued = ends_with_continuation(lines[line_index]);
        }

        let definition = parse_block(path, &block, start_line, line_index)?;
        trace!(name = %definition.name, line = start_line + 1, "found macro");
        definitions.push(definition);
        line_index += 1;
    }

    Ok(definitions)
}

/// Builds the project-wide table from `(path, text)` pairs.
///
/// # Errors
/// Fails on the first malformed directive or duplicate name.
pub fn build_table<I, P, S>(files: I) -> Result<MacroTable>
where
    I: IntoIterator<Item = (P, S)>,
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let mut table = MacroTable::new();
    for (path, text) in files {
        for definition in collect_definitions(path.as_ref(), text.as_ref())? {
            table.add(definition)?;
        }
    }
    Ok(table)
}

// =============================
// Directive parsing
// =============================

fn is_directive_line(line: &str, head: usize) -> bool {
    let rest = &line[head..];
    rest.starts_with(DIRECTIVE)
        && rest[DIRECTIVE.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_part(c))
}

/// Parses one directive block. `block[0]` starts at `#macro`.
fn parse_block(
    path: &Path,
    block: &[&str],
    line_start: usize,
    line_end: usize,
) -> Result<MacroDefinition> {
    let header = &block[0][DIRECTIVE.len()..];
    let invalid = |what: String| SketchyError::InvalidMacro {
        what,
        path: path.display().to_string(),
        line: line_start + 1,
    };

    let name_start = skip_horizontal_whitespace(header, 0);
    let (name, mut index) =
        read_identifier(header, name_start).ok_or_else(|| invalid("name".to_string()))?;

    let mut params = Vec::new();
    let after_name = skip_horizontal_whitespace(header, index);
    if header[after_name..].starts_with('(') {
        let (parsed, end) = parse_params(header, after_name)
            .ok_or_else(|| invalid(format!("params for '{name}'")))?;
        params = parsed;
        index = end;
    }

    let mut body_lines = Vec::with_capacity(block.len());
    body_lines.push(strip_continuation(header[index..].trim()));
    body_lines.extend(block[1..].iter().map(|line| strip_continuation(line)));

    Ok(MacroDefinition::new(
        name,
        params,
        join_lines_single_line(body_lines),
        path,
        line_start,
        line_end,
    ))
}

/// Parses `(a, b, c)` starting at the `(`. Returns the names and the offset
/// just past the `)`.
fn parse_params(text: &str, open: usize) -> Option<(Vec<String>, usize)> {
    let mut params = Vec::new();
    let mut index = open + 1;
    loop {
        index = skip_whitespace(text, index);
        if text[index..].starts_with(')') {
            return Some((params, index + 1));
        }
        let (param, end) = read_identifier(text, index)?;
        params.push(param.to_string());
        index = skip_whitespace(text, end);
        if text[index..].starts_with(',') {
            index += 1;
        } else if !text[index..].starts_with(')') {
            return None;
        }
    }
}

fn strip_continuation(line: &str) -> &str {
    let trimmed = line.trim_end();
    trimmed.strip_suffix('\\').unwrap_or(line)
}
