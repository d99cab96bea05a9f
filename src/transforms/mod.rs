//! Whole-file syntax lowerings applied after line rewriting.

pub mod closure;
pub mod optional_chain;

pub use closure::{lower_closures, MAX_CLOSURE_PASSES};
pub use optional_chain::lower_optional_chains;
