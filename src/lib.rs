//! # cpg-sema - type and symbol resolution for code property graphs
//!
//! The semantic core of a cross-language code property graph:
//! - Type model with an interning registry and common-supertype computation
//! - Per-language type string parser driven by capability tables
//! - Listener-based type propagation with cycle detection
//! - Scope tree with cross-file namespace merging
//! - Name, member, call and constructor resolution
//!
//! Frontends drive a [`Session`]: they enter and leave scopes, declare
//! nodes, parse types and finally run the [`SymbolResolver`].

pub mod config;
pub mod diagnostics;
pub mod graph;
pub mod language;
pub mod name;
pub mod propagation;
pub mod resolution;
pub mod scope;
pub mod session;
pub mod types;
pub mod ui;

// Re-exports for convenient access
pub use diagnostics::{Diagnostics, SemanticError};
pub use graph::{Graph, NodeId, NodeKind};
pub use language::{Language, LanguageRegistry};
pub use name::Name;
pub use propagation::{ListenerKind, TypePropagation};
pub use resolution::{ResolverStats, SymbolResolver};
pub use scope::{ScopeId, ScopeKind, ScopeTree};
pub use session::{Session, SessionOptions};
pub use types::{Type, TypeId, TypeKind, TypeParser, TypeRegistry};

/// Result type alias for cpg-sema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cpg-sema operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Invalid kind: {0}")]
    InvalidKind(String),

    #[error("Scope error: {0}")]
    Scope(String),

    #[error("Merge error: {0}")]
    Merge(String),
}

/// Message sent from parallel unit workers to the coordinator
#[derive(Debug)]
pub enum UnitMessage {
    Done { index: usize, session: Box<Session> },
    Failed { index: usize, error: Error },
}
