//! # Sketchy Syntax Layer
//!
//! The lowest layer of the preprocessor. Nothing here understands directives;
//! it only answers "what kind of text is this?".
//!
//! ## Module Structure
//!
//! - **`lexical`**: character classes, identifier reading, line helpers
//! - **`span`**: the finite-state span scanner and [`SpanIndex`]

pub mod lexical;
pub mod span;

pub use span::{scan, scan_range, Span, SpanIndex, SpanKind};
