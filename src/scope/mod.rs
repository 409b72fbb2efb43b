//! Scope Tree - hierarchical symbol table
//!
//! Mirrors the lexical and semantic nesting of the analysed program.
//! Frontends enter and leave scopes while walking a syntax tree; the
//! resolution engine walks the ancestor chain of a scope to find
//! declarations. Namespace scopes are keyed by qualified name so that
//! declarations spread over several files end up in one scope.

pub mod tree;

pub use tree::{Scope, ScopeId, ScopeKind, ScopeTree, Typedef};
