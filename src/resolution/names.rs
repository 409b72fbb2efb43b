//! Reference and member lookup

use super::NameResolver;
use crate::graph::NodeId;
use crate::name::Name;
use crate::scope::ScopeId;
use crate::types::{TypeId, TypeKind};
use std::collections::HashSet;
use tracing::debug;

impl NameResolver<'_> {
    /// Scopes a name is searched in, innermost first. A qualified name only
    /// searches the scope its qualifier names.
    pub(super) fn lookup_scopes(&self, scope: ScopeId, name: &Name) -> Vec<ScopeId> {
        if !name.is_qualified() {
            return self.scopes.scope_chain(scope);
        }

        let absolute = self.scopes.resolve_qualified_name(scope, name);
        match absolute
            .parent()
            .and_then(|parent| self.scopes.lookup_scope_by_name(&parent.to_string()))
        {
            Some(target) => vec![target],
            None => {
                debug!("No scope for qualifier of {}", absolute);
                Vec::new()
            }
        }
    }

    /// Resolve a name to the nearest visible value declaration.
    ///
    /// With a function-pointer `expected` type only a declaration of the
    /// same signature is accepted.
    pub fn resolve_reference(&mut self, scope: ScopeId, name: &Name, expected: Option<TypeId>) -> Option<NodeId> {
        let expected = expected.filter(|t| matches!(self.types.get(*t).kind, TypeKind::FunctionPointer { .. }));
        let tree = self.scopes;
        let graph = self.graph;
        let local = name.local_name();

        for id in self.lookup_scopes(scope, name) {
            let Some(scope) = tree.scope(id) else {
                continue;
            };
            for declaration in &scope.value_declarations {
                if graph.local_name(*declaration) != local {
                    continue;
                }
                match expected {
                    Some(signature) if !self.same_signature(*declaration, signature) => continue,
                    _ => return Some(*declaration),
                }
            }
        }
        None
    }

    fn same_signature(&mut self, declaration: NodeId, signature: TypeId) -> bool {
        let ty = self.node_type(declaration);
        self.types.unqualified(ty) == self.types.unqualified(signature)
    }

    /// Field or method named `name` in a record or, depth-first, its supertypes
    pub fn resolve_member(&self, record: NodeId, name: &str) -> Option<NodeId> {
        let mut visited = HashSet::new();
        self.member_in(record, name, &mut visited)
    }

    fn member_in(&self, record: NodeId, name: &str, visited: &mut HashSet<NodeId>) -> Option<NodeId> {
        if !visited.insert(record) {
            return None;
        }
        let declaration = self.graph.record(record)?;

        let own = declaration
            .fields
            .iter()
            .chain(declaration.methods.iter())
            .find(|member| self.graph.local_name(**member) == name);
        if let Some(member) = own {
            return Some(*member);
        }

        declaration
            .super_types
            .iter()
            .filter_map(|t| self.types.record_of(*t))
            .find_map(|base| self.member_in(base, name, visited))
    }

    /// Record nodes of the direct supertypes of `record`
    pub(super) fn base_records(&self, record: NodeId) -> Vec<NodeId> {
        self.graph
            .record(record)
            .map(|r| r.super_types.iter().filter_map(|t| self.types.record_of(*t)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Graph, NodeKind, RecordDeclaration};
    use crate::language::default_registry;
    use crate::name::Name;
    use crate::propagation::TypePropagation;
    use crate::resolution::NameResolver;
    use crate::scope::{ScopeId, ScopeKind, ScopeTree};
    use crate::session::{ParameterSpec, Session};
    use crate::types::{RecordBinding, Type, TypeRegistry};

    fn name(text: &str) -> Name {
        Name::parse(text, "::")
    }

    fn variable(graph: &mut Graph, text: &str) -> crate::graph::NodeId {
        graph.add(name(text), NodeKind::Variable { initializer: None }, Some("cpp"), None)
    }

    #[test]
    fn test_inner_declaration_shadows_outer() {
        let mut graph = Graph::new();
        let mut scopes = ScopeTree::new();
        let mut types = TypeRegistry::new();
        let propagation = TypePropagation::new();
        let languages = default_registry();

        let outer = variable(&mut graph, "x");
        scopes.add_value_declaration(outer);
        let block = graph.add(name(""), NodeKind::Block, Some("cpp"), None);
        let inner_scope = scopes.enter(block, ScopeKind::Block, None);
        let inner = variable(&mut graph, "x");
        scopes.add_value_declaration(inner);

        let mut resolver = NameResolver::new(&graph, &scopes, &propagation, &mut types, &languages);
        assert_eq!(resolver.resolve_reference(inner_scope, &name("x"), None), Some(inner));
        assert_eq!(resolver.resolve_reference(ScopeId::root(), &name("x"), None), Some(outer));
        assert_eq!(resolver.resolve_reference(inner_scope, &name("y"), None), None);
    }

    #[test]
    fn test_qualified_reference_searches_named_scope() {
        let mut graph = Graph::new();
        let mut scopes = ScopeTree::new();
        let mut types = TypeRegistry::new();
        let propagation = TypePropagation::new();
        let languages = default_registry();

        let ns = graph.add(name("ns"), NodeKind::Namespace, Some("cpp"), None);
        scopes.enter(ns, ScopeKind::Namespace, Some(name("ns")));
        let inside = variable(&mut graph, "ns::x");
        scopes.add_value_declaration(inside);
        scopes.leave(ns);
        let global = variable(&mut graph, "x");
        scopes.add_value_declaration(global);

        let root = scopes.current();
        let mut resolver = NameResolver::new(&graph, &scopes, &propagation, &mut types, &languages);
        assert_eq!(resolver.resolve_reference(root, &name("ns::x"), None), Some(inside));
        assert_eq!(resolver.resolve_reference(root, &name("x"), None), Some(global));
        assert_eq!(resolver.resolve_reference(root, &name("other::x"), None), None);
    }

    #[test]
    fn test_member_found_in_base_record() {
        let mut graph = Graph::new();
        let mut types = TypeRegistry::new();
        let scopes = ScopeTree::new();
        let propagation = TypePropagation::new();
        let languages = default_registry();

        let base = graph.add(name("Base"), NodeKind::Record(RecordDeclaration::default()), Some("cpp"), None);
        let field = graph.add(name("value"), NodeKind::Field { record: Some(base) }, Some("cpp"), None);
        graph.record_mut(base).unwrap().fields.push(field);

        let base_type = types.intern(Type::object("Base").with_language(Some("cpp")));
        let derived = graph.add(
            name("Derived"),
            NodeKind::Record(RecordDeclaration {
                super_types: vec![base_type],
                ..Default::default()
            }),
            Some("cpp"),
            None,
        );
        types.register_record(RecordBinding::new("Base", Some(base)));
        types.register_record(RecordBinding::new("Derived", Some(derived)).with_super_types(vec!["Base".into()]));

        let resolver = NameResolver::new(&graph, &scopes, &propagation, &mut types, &languages);
        assert_eq!(resolver.resolve_member(derived, "value"), Some(field));
        assert_eq!(resolver.resolve_member(derived, "missing"), None);
        assert_eq!(resolver.base_records(derived), vec![base]);
    }

    #[test]
    fn test_function_pointer_reference_checks_signature() {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        let by_double = session.new_function("f", "void", vec![ParameterSpec::new("x", "double")]);
        let by_int = session.new_function("f", "void", vec![ParameterSpec::new("x", "int")]);

        let takes_int = session.parse_type("void (*)(int)", None);
        let takes_char = session.parse_type("void (*)(char)", None);
        let plain = session.parse_type("int", None);
        let root = session.current_scope();

        let mut resolver = session.resolver();
        assert_eq!(resolver.resolve_reference(root, &name("f"), Some(takes_int)), Some(by_int));
        assert_eq!(resolver.resolve_reference(root, &name("f"), Some(takes_char)), None);
        assert_eq!(resolver.resolve_reference(root, &name("f"), Some(plain)), Some(by_double));
        assert_eq!(resolver.resolve_reference(root, &name("f"), None), Some(by_double));
    }
}
