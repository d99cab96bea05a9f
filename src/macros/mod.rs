//! # Sketchy Macro System
//!
//! Project-wide `#macro` definitions. A [`MacroTable`] is built once from every
//! source file in the project, frozen, and then shared read-only by every
//! per-file rewrite.
//!
//! ## Module Structure
//!
//! - **`loader`**: finds `#macro` directives in a file and builds the table
//! - **`expander`**: span-aware expansion of macro references in code
//!
//! ## Example
//!
//! ```rust
//! use sketchy::macros::{MacroDefinition, MacroTable};
//!
//! let mut table = MacroTable::new();
//! table
//!     .add(MacroDefinition::new("TWO", vec![], "1 + 1", "scripts/a.gml", 0, 0))
//!     .unwrap();
//! assert_eq!(table.lookup("TWO").map(|m| m.body.as_str()), Some("1 + 1"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{Result, SketchyError};

pub mod expander;
pub mod loader;

pub use expander::{expand_all, MacroExpander, MAX_EXPANSION_PASSES};
pub use loader::{build_table, collect_definitions};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// One `#macro` definition, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDefinition {
    pub name: String,
    /// Declared parameter names in order; empty for an object-like macro.
    pub params: Vec<String>,
    /// The body flattened onto one logical line.
    pub body: String,
    /// File that owns the definition.
    pub path: PathBuf,
    /// First source line of the directive (0-based, inclusive).
    pub line_start: usize,
    /// Last source line of the directive (0-based, inclusive).
    pub line_end: usize,
}

impl MacroDefinition {
    pub fn new(
        name: impl Into<String>,
        params: Vec<String>,
        body: impl Into<String>,
        path: impl Into<PathBuf>,
        line_start: usize,
        line_end: usize,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            body: body.into(),
            path: path.into(),
            line_start,
            line_end,
        }
    }

    /// True for function-like macros (`#macro NAME(a, b) ...`).
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// True when this definition was loaded from `path`. Comparison ignores
    /// ASCII case, matching how the IDE treats project paths.
    pub fn is_defined_in(&self, path: &Path) -> bool {
        self.path
            .to_string_lossy()
            .eq_ignore_ascii_case(&path.to_string_lossy())
    }
}

/// Name-keyed table of every macro in the project.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition.
    ///
    /// # Errors
    /// Returns [`SketchyError::DuplicateMacro`] naming both locations when the
    /// name is already taken. The table is left unchanged.
    pub fn add(&mut self, definition: MacroDefinition) -> Result<()> {
        if let Some(existing) = self.macros.get(&definition.name) {
            return Err(SketchyError::DuplicateMacro {
                name: definition.name.clone(),
                first_path: existing.path.display().to_string(),
                first_line: existing.line_start + 1,
                second_path: definition.path.display().to_string(),
                second_line: definition.line_start + 1,
            });
        }
        self.macros.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// All definitions, sorted by name for stable output.
    pub fn sorted(&self) -> Vec<&MacroDefinition> {
        let mut all: Vec<_> = self.macros.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Definitions owned by `path`.
    pub fn definitions_in<'a>(
        &'a self,
        path: &'a Path,
    ) -> impl Iterator<Item = &'a MacroDefinition> + 'a {
        self.macros.values().filter(move |m| m.is_defined_in(path))
    }
}
