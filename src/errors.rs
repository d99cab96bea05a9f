//! Sketchy Error Handling
//!
//! Every failure the preprocessor can report is a variant of [`SketchyError`].
//! All of them are fatal for the file being processed: a run that fails never
//! writes partial output for that file.
//!
//! Soft failures are not errors. Constant folding that cannot be performed and
//! structural transforms that cannot confidently rewrite a construct fall back
//! silently (Static plan, verbatim copy) and never surface here.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = SketchyError> = std::result::Result<T, E>;

// ============================================================================
// ERROR CATEGORIES
// ============================================================================

/// Coarse classification of a [`SketchyError`], used for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Two definitions compete for one name (macro/macro, const/macro, const/const).
    DefinitionConflict,
    /// A directive is syntactically incomplete and cannot be elided safely.
    MalformedDirective,
    /// Macro expansion could not complete (recursion, wrong argument count).
    ExpansionFailure,
    /// Filesystem access failed.
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::DefinitionConflict => "definition-conflict",
            ErrorCategory::MalformedDirective => "malformed-directive",
            ErrorCategory::ExpansionFailure => "expansion-failure",
            ErrorCategory::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Unified error type for every Sketchy failure mode.
///
/// Line numbers stored in variants are 1-based, ready for display.
#[derive(Error, Diagnostic, Debug)]
#[diagnostic(url(docsrs))]
pub enum SketchyError {
    #[error("Macro redefinition '{name}'\n  First: {first_path}:{first_line}\n  Again: {second_path}:{second_line}")]
    #[diagnostic(
        code(sketchy::definition::duplicate_macro),
        help("macro names are global to the project; rename or remove one of the definitions")
    )]
    DuplicateMacro {
        name: String,
        first_path: String,
        first_line: usize,
        second_path: String,
        second_line: usize,
    },

    #[error("Invalid macro {what} at {path}:{line}")]
    #[diagnostic(
        code(sketchy::directive::invalid_macro),
        help("expected `#macro NAME body` or `#macro NAME(p1, p2) body`")
    )]
    InvalidMacro {
        what: String,
        path: String,
        line: usize,
    },

    #[error("Const name conflicts with macro '{name}' at {path}:{line}")]
    #[diagnostic(code(sketchy::definition::const_macro_collision))]
    ConstantMacroNameCollision {
        name: String,
        path: String,
        line: usize,
    },

    #[error("Const redefinition '{name}' at {path}:{line}")]
    #[diagnostic(
        code(sketchy::definition::const_redefinition),
        help("a constant may be defined only once per scope")
    )]
    ConstantRedefinition {
        name: String,
        path: String,
        line: usize,
    },

    #[error("Unterminated raw string const '{name}' at {path}:{line}")]
    #[diagnostic(code(sketchy::directive::unterminated_raw_string))]
    UnterminatedRawStringConstant {
        name: String,
        path: String,
        line: usize,
    },

    #[error("Macro '{name}' expected {expected} args, got {found}")]
    #[diagnostic(code(sketchy::expansion::argument_count))]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Macro recursion detected: {chain}")]
    #[diagnostic(
        code(sketchy::expansion::recursion),
        help("a macro body may not expand back into itself")
    )]
    MacroRecursion { chain: String },

    #[error("Unclosed macro invocation argument list for '{name}'")]
    #[diagnostic(code(sketchy::directive::unclosed_invocation))]
    UnclosedInvocation { name: String },

    #[error("Failed to rewrite {path}:{line}")]
    #[diagnostic(code(sketchy::rewrite))]
    InFile {
        path: String,
        line: usize,
        #[source]
        source: Box<SketchyError>,
    },

    #[error("Failed to {operation} '{}'", path.display())]
    #[diagnostic(code(sketchy::io))]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk project directory")]
    #[diagnostic(code(sketchy::io::walk))]
    Walk(#[from] walkdir::Error),

    #[error("Failed to serialize macro table")]
    #[diagnostic(code(sketchy::io::json))]
    Json(#[from] serde_json::Error),
}

impl SketchyError {
    /// Returns the taxonomy bucket of this error. `InFile` reports its cause's category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SketchyError::DuplicateMacro { .. }
            | SketchyError::ConstantMacroNameCollision { .. }
            | SketchyError::ConstantRedefinition { .. } => ErrorCategory::DefinitionConflict,
            SketchyError::InvalidMacro { .. }
            | SketchyError::UnterminatedRawStringConstant { .. }
            | SketchyError::UnclosedInvocation { .. } => ErrorCategory::MalformedDirective,
            SketchyError::ArgumentCountMismatch { .. } | SketchyError::MacroRecursion { .. } => {
                ErrorCategory::ExpansionFailure
            }
            SketchyError::InFile { source, .. } => source.category(),
            SketchyError::Io { .. } | SketchyError::Walk(_) | SketchyError::Json(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Strips any `InFile` wrappers and returns the underlying error.
    pub fn root_cause(&self) -> &SketchyError {
        match self {
            SketchyError::InFile { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Attaches a file location to an error raised without one.
    pub fn in_file(self, path: &Path, line_index: usize) -> Self {
        match self {
            already @ SketchyError::InFile { .. } => already,
            other => SketchyError::InFile {
                path: path.display().to_string(),
                line: line_index + 1,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        SketchyError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
