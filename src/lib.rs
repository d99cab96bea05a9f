//! # Sketchy
//!
//! A source-to-source preprocessor for GameMaker Language projects. It
//! expands `#macro` definitions, folds `const` directives into literals or
//! runtime statics, and lowers optional chaining (`a?.b`) and closure sugar
//! (`closure(function() { ... })`) into plain GML.
//!
//! Everything is built on one lexical primitive: the [`syntax::span`] scanner,
//! which partitions a file into code, string, comment and template spans so no
//! pass ever rewrites text inside a string or comment.
//!
//! ```
//! use std::path::Path;
//! use sketchy::macros::build_table;
//! use sketchy::rewrite::Rewriter;
//!
//! let table = build_table([("macros.gml", "#macro SPEED 4")]).unwrap();
//! let out = Rewriter::new(&table)
//!     .rewrite(Path::new("player.gml"), "const STEP = SPEED * 2\nx += STEP;")
//!     .unwrap();
//! assert_eq!(out.output, "//const STEP = SPEED * 2\nx += 8;");
//! ```

pub mod cli;
pub mod config;
pub mod consts;
pub mod discovery;
pub mod errors;
pub mod macros;
pub mod project;
pub mod rewrite;
pub mod syntax;
pub mod transforms;

pub use errors::{ErrorCategory, Result, SketchyError};
pub use macros::{MacroDefinition, MacroTable};
pub use rewrite::{RewriteOutput, Rewriter};
