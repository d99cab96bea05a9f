//! # Compile-Time Constants
//!
//! `const NAME = RHS` directives, anchored at the start of a line, declare
//! constants visible in the scope that contains them (the file root or one
//! function body). Each constant is resolved to a [`ConstPlan`] that tells the
//! rewriter what to do with the directive and with every reference.
//!
//! ## Pipeline
//!
//! 1. [`scope::build_scopes`] walks the code spans, tracks function scopes and
//!    records each directive with a provisional `Static` plan.
//! 2. [`resolve::resolve_scopes`] classifies constants per scope, in source order.
//! 3. [`substitute::substitute`] replaces references to inlined constants.

use std::collections::{BTreeSet, HashMap};

pub mod eval;
pub mod resolve;
pub mod scope;
pub mod substitute;

pub use resolve::resolve_scopes;
pub use scope::build_scopes;
pub use substitute::substitute;

/// Index of a scope in [`FileScopes`]. The file root is always `0`.
pub type ScopeId = usize;

pub const ROOT_SCOPE: ScopeId = 0;

/// How a constant is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstPlan {
    /// Literal text substituted at every reference; the directive is commented out.
    Inline(String),
    /// References become the named constant, which is itself `Static`.
    Alias(String),
    /// Runtime-initialised backing storage holding this expression.
    Static(String),
    /// A raw string literal spanning several lines; the directive becomes a
    /// plain `var` so no line disappears.
    MultilineRawStringVariable(String),
}

impl ConstPlan {
    /// Text that replaces a reference, for plans that replace references.
    pub fn replacement(&self) -> Option<&str> {
        match self {
            ConstPlan::Inline(text) | ConstPlan::Alias(text) => Some(text),
            ConstPlan::Static(_) | ConstPlan::MultilineRawStringVariable(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstPlan::Inline(_) => "inline",
            ConstPlan::Alias(_) => "alias",
            ConstPlan::Static(_) => "static",
            ConstPlan::MultilineRawStringVariable(_) => "multiline-raw-string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstInfo {
    pub name: String,
    /// 0-based line of the directive.
    pub line: usize,
    pub plan: ConstPlan,
}

impl ConstInfo {
    /// Returns a copy carrying `plan`.
    pub fn with_plan(&self, plan: ConstPlan) -> Self {
        Self {
            name: self.name.clone(),
            line: self.line,
            plan,
        }
    }
}

pub type ConstMap = HashMap<String, ConstInfo>;

/// One lexical scope: the file root or a function body.
#[derive(Debug, Clone, Default)]
pub struct ScopeFrame {
    pub parent: Option<ScopeId>,
    pub consts: ConstMap,
    /// Lines holding a `const` directive owned by this scope.
    pub directive_lines: BTreeSet<usize>,
}

impl ScopeFrame {
    pub fn const_at_line(&self, line: usize) -> Option<&ConstInfo> {
        self.consts.values().find(|info| info.line == line)
    }

    /// Constants in definition order.
    pub fn consts_in_order(&self) -> Vec<&ConstInfo> {
        let mut ordered: Vec<_> = self.consts.values().collect();
        ordered.sort_by_key(|info| info.line);
        ordered
    }
}

/// Scope arena for one file plus the scope active on each line.
#[derive(Debug, Clone)]
pub struct FileScopes {
    pub scopes: Vec<ScopeFrame>,
    pub line_scopes: Vec<ScopeId>,
}

impl FileScopes {
    pub fn root(&self) -> &ScopeFrame {
        &self.scopes[ROOT_SCOPE]
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeFrame {
        &self.scopes[id]
    }

    /// Scope active at the end of `line`. Unknown lines belong to the root.
    pub fn scope_of_line(&self, line: usize) -> ScopeId {
        self.line_scopes.get(line).copied().unwrap_or(ROOT_SCOPE)
    }

    /// The scope owning the `const` directive on `line`, with its constant.
    ///
    /// Looked up through the owners rather than `line_scopes`, since a
    /// directive sharing a line with a function header belongs to the outer
    /// scope while the line ends inside the body.
    pub fn directive_at(&self, line: usize) -> Option<(ScopeId, &ConstInfo)> {
        self.scopes.iter().enumerate().find_map(|(id, scope)| {
            if !scope.directive_lines.contains(&line) {
                return None;
            }
            scope.const_at_line(line).map(|info| (id, info))
        })
    }
}
