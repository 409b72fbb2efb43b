//! Semantic diagnostics
//!
//! Failures of type and symbol resolution are not errors of the run. They
//! degrade to the unknown type or an empty result, get logged, and are
//! collected here so callers can report them.

use crate::graph::NodeId;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticError {
    #[error("Unresolved type: {text}")]
    UnresolvedType { text: String },

    #[error("Ambiguous resolution of {name}: {} candidates", .candidates.len())]
    AmbiguousResolution { name: String, candidates: Vec<NodeId> },

    #[error("Unresolved reference: {name} ({node})")]
    UnresolvedReference { name: String, node: NodeId },

    #[error("Unresolved call: {name} ({node})")]
    UnresolvedCall { name: String, node: NodeId },

    #[error("Scope error: {message}")]
    StructuralScope { message: String },
}

impl SemanticError {
    pub fn kind(&self) -> &'static str {
        match self {
            SemanticError::UnresolvedType { .. } => "unresolved_type",
            SemanticError::AmbiguousResolution { .. } => "ambiguous_resolution",
            SemanticError::UnresolvedReference { .. } => "unresolved_reference",
            SemanticError::UnresolvedCall { .. } => "unresolved_call",
            SemanticError::StructuralScope { .. } => "structural_scope",
        }
    }
}

/// Diagnostics collected during one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<SemanticError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a diagnostic
    pub fn report(&mut self, diagnostic: SemanticError) {
        match &diagnostic {
            SemanticError::StructuralScope { .. } => error!("{}", diagnostic),
            _ => debug!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.entries.iter().filter(|d| d.kind() == kind).count()
    }

    pub(crate) fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.entries.len())?;
        for diagnostic in &self.entries {
            writeln!(f, "  {}", diagnostic)?;
        }
        Ok(())
    }
}
