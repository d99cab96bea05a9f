//! Source discovery and the rewrite prefilter.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ProjectConfig;
use crate::consts::scope::parse_directive;
use crate::errors::Result;
use crate::macros::MacroTable;
use crate::syntax::lexical::{
    char_at, is_keyword_at, is_whitespace, normalize_line_endings, read_identifier,
    skip_horizontal_whitespace,
};
use crate::syntax::span::SpanIndex;

/// Extension of rewritable scripts.
pub const SOURCE_EXTENSION: &str = "gml";

/// Recursively collects `*.gml` files under the project root, skipping the
/// configured top-level directories.
///
/// The returned list is sorted so runs are deterministic.
pub fn discover_sources(config: &ProjectConfig) -> Result<Vec<PathBuf>> {
    project_files(config, is_source_file)
}

/// Every file below the root, outside ignored top-level directories, that
/// satisfies `keep`. Sorted.
pub(crate) fn project_files<F>(config: &ProjectConfig, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let root = config.root.as_path();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() != 1
            || !entry.file_type().is_dir()
            || !config.is_ignored(entry.path().strip_prefix(root).unwrap_or(entry.path()))
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && keep(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// Cheap check for whether rewriting `text` could change anything.
///
/// True when the file has an anchored `#macro` or `const` directive in code,
/// names a macro in code (not as a member after `.`), or contains an
/// optional-chain or closure trigger in code.
pub fn needs_rewrite(text: &str, table: &MacroTable) -> bool {
    let text = normalize_line_endings(text);
    let index = SpanIndex::new(&text);

    if has_directive(&text, &index) || index.code_contains(&text, "?.") {
        return true;
    }

    index.spans().iter().filter(|span| span.is_code()).any(|span| {
        let code = span.text(&text);
        let mut prev_non_ws: Option<char> = None;
        let mut i = 0;
        while let Some(c) = char_at(code, i) {
            if let Some((ident, end)) = read_identifier(code, i) {
                let member = prev_non_ws == Some('.');
                if !member && (ident == "closure" || table.contains(ident)) {
                    return true;
                }
                prev_non_ws = Some('a');
                i = end;
                continue;
            }
            if !is_whitespace(c) {
                prev_non_ws = Some(c);
            }
            i += c.len_utf8();
        }
        false
    })
}

fn has_directive(text: &str, index: &SpanIndex) -> bool {
    let mut line_start = 0;
    for line in text.split('\n') {
        let head = skip_horizontal_whitespace(line, 0);
        if head < line.len() && index.is_code(line_start + head) {
            let is_macro = line[head..].starts_with("#macro") && is_keyword_at(line, head + 1, "macro");
            if is_macro || parse_directive(line).is_some() {
                return true;
            }
        }
        line_start += line.len() + 1;
    }
    false
}
