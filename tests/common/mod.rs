//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sketchy::macros::build_table;
use sketchy::{MacroTable, RewriteOutput, Rewriter};

/// Builds a macro table from a single `macros.gml` file.
pub fn table(macros: &str) -> MacroTable {
    build_table([("scripts/macros/macros.gml", macros)]).expect("macro table")
}

/// Rewrites `text` as `scripts/test/test.gml`.
pub fn rewrite(table: &MacroTable, text: &str) -> RewriteOutput {
    Rewriter::new(table)
        .rewrite(Path::new("scripts/test/test.gml"), text)
        .expect("rewrite")
}

/// Writes `files` (relative path, content) under `root`, creating parents.
pub fn write_project(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(relative, content)| {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
            fs::write(&path, content).expect("write file");
            path
        })
        .collect()
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}
