//! Symbol resolution pass
//!
//! Visits every recorded expression in creation order and connects it to
//! its declaration in the scope the expression was created in.

use crate::diagnostics::SemanticError;
use crate::graph::{NodeId, NodeKind};
use crate::propagation::ListenerKind;
use crate::scope::ScopeId;
use crate::session::Session;
use crate::types::TypeId;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Outcome of a resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub total: usize,
    pub resolved: usize,
    /// Resolved to more than one candidate; also counted as resolved
    pub ambiguous: usize,
    /// Resolved to a synthesised declaration; also counted as resolved
    pub inferred: usize,
    pub unresolved: usize,
}

impl fmt::Display for ResolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolution Statistics:")?;
        writeln!(f, "  Expressions: {}", self.total)?;
        writeln!(f, "  Resolved: {} (ambiguous: {}, inferred: {})", self.resolved, self.ambiguous, self.inferred)?;
        writeln!(f, "  Unresolved: {}", self.unresolved)
    }
}

/// Outcome for one expression
enum Outcome {
    Resolved,
    Ambiguous,
    Inferred,
    Unresolved,
}

/// Resolves every expression of a session
pub struct SymbolResolver<'a> {
    session: &'a mut Session,
    stats: ResolverStats,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            stats: ResolverStats::default(),
        }
    }

    /// Resolve all expressions and return the statistics
    pub fn run(mut self) -> ResolverStats {
        let expressions = self.session.expressions().to_vec();
        for expression in expressions {
            let outcome = self.resolve_expression(expression);
            self.stats.total += 1;
            match outcome {
                Outcome::Resolved => self.stats.resolved += 1,
                Outcome::Ambiguous => {
                    self.stats.resolved += 1;
                    self.stats.ambiguous += 1;
                }
                Outcome::Inferred => {
                    self.stats.resolved += 1;
                    self.stats.inferred += 1;
                }
                Outcome::Unresolved => self.stats.unresolved += 1,
            }
        }

        info!(
            "Resolved {}/{} expressions ({} ambiguous, {} inferred)",
            self.stats.resolved, self.stats.total, self.stats.ambiguous, self.stats.inferred
        );
        self.stats
    }

    fn resolve_expression(&mut self, expression: NodeId) -> Outcome {
        let Some(node) = self.session.graph.get(expression) else {
            return Outcome::Unresolved;
        };
        let scope = node.scope.unwrap_or_else(ScopeId::root);

        match node.kind.clone() {
            NodeKind::Reference { .. } => self.resolve_reference(expression, scope),
            NodeKind::Member { base, .. } => self.resolve_member(expression, base),
            NodeKind::Call { arguments, base, invokes } => {
                self.resolve_call(expression, scope, &arguments, base, &invokes)
            }
            NodeKind::Construct { arguments, .. } => self.resolve_construct(expression, &arguments),
            other => {
                debug!("Skipping {} node {}", other, expression);
                Outcome::Unresolved
            }
        }
    }

    fn resolve_reference(&mut self, expression: NodeId, scope: ScopeId) -> Outcome {
        let Some(name) = self.session.graph.get(expression).map(|n| n.name.clone()) else {
            return Outcome::Unresolved;
        };
        let expected = self.session.propagation.get_type(expression);
        let target = self.session.resolver().resolve_reference(scope, &name, expected);

        match target {
            Some(declaration) => {
                self.set_refers_to(expression, declaration);
                self.session
                    .register_type_listener(declaration, expression, ListenerKind::Mirror);
                Outcome::Resolved
            }
            None => {
                self.session.diagnostics.report(SemanticError::UnresolvedReference {
                    name: name.to_string(),
                    node: expression,
                });
                Outcome::Unresolved
            }
        }
    }

    fn resolve_member(&mut self, expression: NodeId, base: NodeId) -> Outcome {
        let name = self.session.graph.local_name(expression).to_string();
        let base_type = self.session.get_type(base);
        let target = self
            .session
            .types
            .record_of(base_type)
            .and_then(|record| self.session.resolver().resolve_member(record, &name));

        match target {
            Some(member) => {
                self.set_refers_to(expression, member);
                self.session
                    .register_type_listener(member, expression, ListenerKind::Mirror);
                Outcome::Resolved
            }
            None => {
                self.session.diagnostics.report(SemanticError::UnresolvedReference {
                    name,
                    node: expression,
                });
                Outcome::Unresolved
            }
        }
    }

    fn resolve_call(
        &mut self,
        expression: NodeId,
        scope: ScopeId,
        arguments: &[NodeId],
        base: Option<NodeId>,
        previous: &[NodeId],
    ) -> Outcome {
        let Some(name) = self.session.graph.get(expression).map(|n| n.name.clone()) else {
            return Outcome::Unresolved;
        };
        let argument_types = self.argument_types(arguments);
        let record = match base {
            Some(base) => {
                let base_type = self.session.get_type(base);
                self.session.types.record_of(base_type)
            }
            None => None,
        };

        let mut targets = match (base, record) {
            (Some(_), Some(record)) => {
                self.session
                    .resolver()
                    .resolve_method_call(record, name.local_name(), &argument_types)
            }
            (Some(_), None) => Vec::new(),
            (None, _) => self.session.resolver().resolve_call(scope, &name, &argument_types),
        };

        let mut outcome = match targets.len() {
            0 => Outcome::Unresolved,
            1 => Outcome::Resolved,
            _ => {
                self.session.diagnostics.report(SemanticError::AmbiguousResolution {
                    name: name.to_string(),
                    candidates: targets.clone(),
                });
                Outcome::Ambiguous
            }
        };

        if targets.is_empty() && self.session.options.infer_declarations && (base.is_none() || record.is_some()) {
            let inferred = match record {
                Some(record) => self.session.infer_method(record, name.local_name(), &argument_types),
                None => self.session.infer_function_in(scope, &name, &argument_types),
            };
            targets.push(inferred);
            outcome = Outcome::Inferred;
        }

        if targets.is_empty() {
            self.session.diagnostics.report(SemanticError::UnresolvedCall {
                name: name.to_string(),
                node: expression,
            });
            return outcome;
        }

        self.set_invokes(expression, previous, &targets);
        for target in targets {
            self.session
                .register_type_listener(target, expression, ListenerKind::ReturnType);
        }
        outcome
    }

    fn resolve_construct(&mut self, expression: NodeId, arguments: &[NodeId]) -> Outcome {
        let ty = self.session.get_type(expression);
        let Some(record) = self.session.types.record_of(ty) else {
            let name = self.session.graph.get(expression).map(|n| n.name.to_string()).unwrap_or_default();
            self.session.diagnostics.report(SemanticError::UnresolvedCall { name, node: expression });
            return Outcome::Unresolved;
        };

        let argument_types = self.argument_types(arguments);
        let mut targets = self.session.resolver().resolve_constructor(record, &argument_types);
        let mut outcome = match targets.len() {
            0 => Outcome::Unresolved,
            1 => Outcome::Resolved,
            _ => {
                self.session.diagnostics.report(SemanticError::AmbiguousResolution {
                    name: self.session.graph.local_name(record).to_string(),
                    candidates: targets.clone(),
                });
                Outcome::Ambiguous
            }
        };

        if targets.is_empty() {
            if !self.session.options.infer_declarations {
                let name = self.session.graph.local_name(record).to_string();
                self.session.diagnostics.report(SemanticError::UnresolvedCall { name, node: expression });
                return outcome;
            }
            targets.push(self.session.infer_constructor(record, &argument_types));
            outcome = Outcome::Inferred;
        }

        if let Some(NodeKind::Construct { invokes, .. }) = self.session.graph.get_mut(expression).map(|n| &mut n.kind) {
            *invokes = targets;
        }
        outcome
    }

    fn argument_types(&mut self, arguments: &[NodeId]) -> Vec<TypeId> {
        arguments.iter().map(|a| self.session.get_type(*a)).collect()
    }

    fn set_refers_to(&mut self, expression: NodeId, declaration: NodeId) {
        match self.session.graph.get_mut(expression).map(|n| &mut n.kind) {
            Some(NodeKind::Reference { refers_to }) | Some(NodeKind::Member { refers_to, .. }) => {
                *refers_to = Some(declaration);
            }
            _ => {}
        }
    }

    /// Replace the targets of a call. Edges from targets it no longer
    /// invokes are dropped and its type recomputed.
    fn set_invokes(&mut self, call: NodeId, previous: &[NodeId], targets: &[NodeId]) {
        if !previous.is_empty() && previous != targets {
            self.session.propagation.detach(call);
            self.session.propagation.reset_type(call);
        }
        if let Some(NodeKind::Call { invokes, .. }) = self.session.graph.get_mut(call).map(|n| &mut n.kind) {
            *invokes = targets.to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordKind;
    use crate::session::{ParameterSpec, SessionOptions};
    use crate::language::default_registry;

    #[test]
    fn test_reference_takes_declaration_type() {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        let declaration = session.new_variable("count", "unsigned int", None);
        let reference = session.new_reference("count");

        let stats = session.resolve();
        assert_eq!(stats.resolved, 1);
        assert_eq!(
            session.graph.kind(reference),
            Some(&NodeKind::Reference { refers_to: Some(declaration) })
        );
        let ty = session.get_type(reference);
        assert_eq!(session.types.type_name(ty), "unsigned int");
    }

    #[test]
    fn test_call_takes_return_type() {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        let function = session.new_function("make", "double", vec![ParameterSpec::new("seed", "int")]);
        let argument = session.new_literal("1", "int");
        let call = session.new_call("make", vec![argument], None);

        let stats = session.resolve();
        assert_eq!(stats.resolved, 1);
        match session.graph.kind(call) {
            Some(NodeKind::Call { invokes, .. }) => assert_eq!(invokes, &vec![function]),
            other => panic!("unexpected node {:?}", other),
        }
        let ty = session.get_type(call);
        assert_eq!(session.types.type_name(ty), "double");
    }

    #[test]
    fn test_unresolved_call_without_inference() {
        let options = SessionOptions {
            infer_declarations: false,
            ..Default::default()
        };
        let mut session = Session::new(default_registry(), options);
        session.new_translation_unit("main.cpp", "cpp");
        session.new_call("missing", vec![], None);

        let stats = session.resolve();
        assert_eq!(stats.unresolved, 1);
        assert_eq!(session.diagnostics.count("unresolved_call"), 1);
        assert_eq!(session.graph.stats().inferred_functions, 0);
    }

    #[test]
    fn test_method_call_and_member_access() {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        let record = session.new_record("Counter", RecordKind::Class, &[]);
        session.enter_scope(record);
        let field = session.new_field(record, "value", "int");
        let method = session.new_method(record, "next", "int", vec![]);
        session.leave_scope(record);

        let object = session.new_variable("c", "Counter", None);
        let base = session.new_reference("c");
        let member = session.new_member(base, "value");
        let call = session.new_call("next", vec![], Some(base));
        let missing = session.new_call("reset", vec![], Some(base));

        let stats = session.resolve();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.inferred, 1);
        assert_eq!(session.graph.kind(base), Some(&NodeKind::Reference { refers_to: Some(object) }));
        assert_eq!(
            session.graph.kind(member),
            Some(&NodeKind::Member { base, refers_to: Some(field) })
        );
        match session.graph.kind(call) {
            Some(NodeKind::Call { invokes, .. }) => assert_eq!(invokes, &vec![method]),
            other => panic!("unexpected node {:?}", other),
        }
        let inferred = match session.graph.kind(missing) {
            Some(NodeKind::Call { invokes, .. }) => invokes[0],
            other => panic!("unexpected node {:?}", other),
        };
        assert!(session.graph.record(record).unwrap().methods.contains(&inferred));
    }

    #[test]
    fn test_construct_infers_constructor() {
        let mut session = Session::default();
        session.new_translation_unit("Main.java", "java");
        let record = session.new_record("Point", RecordKind::Class, &[]);
        let x = session.new_literal("1", "int");
        let construct = session.new_construct("Point", vec![x]);

        let stats = session.resolve();
        assert_eq!(stats.inferred, 1);
        let constructors = &session.graph.record(record).unwrap().constructors;
        assert_eq!(constructors.len(), 1);
        assert_eq!(
            session.graph.kind(construct),
            Some(&NodeKind::Construct { arguments: vec![x], invokes: constructors.clone() })
        );
    }

    #[test]
    fn test_ambiguous_construct_keeps_all_constructors() {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        let record = session.new_record("Point", RecordKind::Class, &[]);
        session.enter_scope(record);
        let by_int = session.new_constructor(record, vec![ParameterSpec::new("x", "int")]);
        let by_double = session.new_constructor(record, vec![ParameterSpec::new("x", "double")]);
        session.leave_scope(record);

        let value = session.new_literal("v", "UNKNOWN");
        let construct = session.new_construct("Point", vec![value]);

        let stats = session.resolve();
        assert_eq!(stats.ambiguous, 1);
        assert_eq!(stats.inferred, 0);
        assert_eq!(session.diagnostics.count("ambiguous_resolution"), 1);
        assert_eq!(
            session.graph.kind(construct),
            Some(&NodeKind::Construct { arguments: vec![value], invokes: vec![by_int, by_double] })
        );
    }

    #[test]
    fn test_stats_display() {
        let stats = ResolverStats {
            total: 3,
            resolved: 2,
            ambiguous: 1,
            inferred: 0,
            unresolved: 1,
        };
        let text = stats.to_string();
        assert!(text.contains("Expressions: 3"));
        assert!(text.contains("Resolved: 2 (ambiguous: 1, inferred: 0)"));
    }
}
