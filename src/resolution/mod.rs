//! Name and call resolution
//!
//! Resolution algorithm:
//! 1. Walk outward from the scope an expression was created in
//! 2. The first scope holding a matching value declaration wins (shadowing)
//! 3. Calls additionally match the signature against the argument types,
//!    strictly first and with implicit primitive casts second
//! 4. Member and method lookups walk the record's supertypes depth-first
//!
//! [`NameResolver`] is a read-mostly view over one session; the
//! [`SymbolResolver`] pass uses it to connect every recorded expression.

mod calls;
mod names;
mod pass;

pub use calls::MatchMode;
pub use pass::{ResolverStats, SymbolResolver};

use crate::graph::{Graph, NodeId};
use crate::language::LanguageRegistry;
use crate::propagation::TypePropagation;
use crate::scope::ScopeTree;
use crate::types::{TypeId, TypeRegistry};

/// Resolves names, members and calls against a session's scope tree
pub struct NameResolver<'a> {
    graph: &'a Graph,
    scopes: &'a ScopeTree,
    propagation: &'a TypePropagation,
    types: &'a mut TypeRegistry,
    languages: &'a LanguageRegistry,
    use_default_arguments: bool,
}

impl<'a> NameResolver<'a> {
    pub fn new(
        graph: &'a Graph,
        scopes: &'a ScopeTree,
        propagation: &'a TypePropagation,
        types: &'a mut TypeRegistry,
        languages: &'a LanguageRegistry,
    ) -> Self {
        Self {
            graph,
            scopes,
            propagation,
            types,
            languages,
            use_default_arguments: true,
        }
    }

    /// Allow or forbid filling missing arguments from parameter defaults
    pub fn with_default_arguments(mut self, enabled: bool) -> Self {
        self.use_default_arguments = enabled;
        self
    }

    /// Current type of a node, the unknown type of its language if it has none
    fn node_type(&mut self, node: NodeId) -> TypeId {
        match self.propagation.get_type(node) {
            Some(ty) => ty,
            None => {
                let language = self.graph.get(node).and_then(|n| n.language.as_deref());
                self.types.unknown(language)
            }
        }
    }
}
