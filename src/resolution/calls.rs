//! Call, method and constructor resolution

use super::NameResolver;
use crate::graph::{FunctionKind, NodeId, NodeKind};
use crate::name::Name;
use crate::scope::ScopeId;
use crate::types::{TypeId, TypeKind};
use std::collections::HashSet;

/// How strictly argument types have to match parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Same type, or an argument whose common type with the parameter is the parameter
    Strict,
    /// Strict, plus any primitive converts to any other primitive
    ImplicitCast,
}

impl NameResolver<'_> {
    /// Functions named `name` that accept `arguments`.
    ///
    /// Scopes are searched outward; every compatible declaration of the
    /// first scope with a match is returned. Constructors never match a
    /// plain call.
    pub fn resolve_call(&mut self, scope: ScopeId, name: &Name, arguments: &[TypeId]) -> Vec<NodeId> {
        let tree = self.scopes;
        let graph = self.graph;
        let local = name.local_name();

        for id in self.lookup_scopes(scope, name) {
            let Some(scope) = tree.scope(id) else {
                continue;
            };
            let candidates: Vec<NodeId> = scope
                .value_declarations
                .iter()
                .copied()
                .filter(|d| graph.local_name(*d) == local)
                .filter(|d| graph.function(*d).is_some_and(|f| f.kind != FunctionKind::Constructor))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let matches = self.select(&candidates, arguments);
            if !matches.is_empty() {
                return matches;
            }
        }
        Vec::new()
    }

    /// Methods named `name` of a record or, depth-first, its supertypes.
    /// The first record with a compatible method wins.
    pub fn resolve_method_call(&mut self, record: NodeId, name: &str, arguments: &[TypeId]) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        self.method_in(record, name, arguments, &mut visited)
    }

    fn method_in(
        &mut self,
        record: NodeId,
        name: &str,
        arguments: &[TypeId],
        visited: &mut HashSet<NodeId>,
    ) -> Vec<NodeId> {
        if !visited.insert(record) {
            return Vec::new();
        }
        let graph = self.graph;
        let Some(declaration) = graph.record(record) else {
            return Vec::new();
        };

        let candidates: Vec<NodeId> = declaration
            .methods
            .iter()
            .copied()
            .filter(|m| graph.local_name(*m) == name)
            .collect();
        let matches = self.select(&candidates, arguments);
        if !matches.is_empty() {
            return matches;
        }

        for base in self.base_records(record) {
            let matches = self.method_in(base, name, arguments, visited);
            if !matches.is_empty() {
                return matches;
            }
        }
        Vec::new()
    }

    /// Constructors of a record accepting `arguments`
    pub fn resolve_constructor(&mut self, record: NodeId, arguments: &[TypeId]) -> Vec<NodeId> {
        let graph = self.graph;
        match graph.record(record) {
            Some(declaration) => self.select(&declaration.constructors, arguments),
            None => Vec::new(),
        }
    }

    /// Strict matches, or the implicit-cast matches when there are none
    fn select(&mut self, candidates: &[NodeId], arguments: &[TypeId]) -> Vec<NodeId> {
        for mode in [MatchMode::Strict, MatchMode::ImplicitCast] {
            let found: Vec<NodeId> = candidates
                .iter()
                .copied()
                .filter(|c| self.matches_signature(*c, arguments, mode))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Check whether a function accepts `arguments`.
    ///
    /// A variadic parameter swallows everything after it. Missing trailing
    /// arguments are filled from parameter defaults when the function's
    /// language has them.
    pub fn matches_signature(&mut self, function: NodeId, arguments: &[TypeId], mode: MatchMode) -> bool {
        let graph = self.graph;
        let Some(declaration) = graph.function(function) else {
            return false;
        };
        let defaults = self.use_default_arguments
            && graph
                .get(function)
                .and_then(|n| n.language.as_deref())
                .and_then(|l| self.languages.find(l))
                .map_or(true, |l| l.supports_default_arguments);

        for (index, parameter) in declaration.parameters.iter().enumerate() {
            let Some(NodeKind::Parameter { variadic, default, .. }) = graph.kind(*parameter) else {
                return false;
            };
            if *variadic {
                return true;
            }
            match arguments.get(index) {
                Some(argument) => {
                    let expected = self.node_type(*parameter);
                    if !self.is_compatible(*argument, expected, mode) {
                        return false;
                    }
                }
                None if defaults && default.is_some() => {}
                None => return false,
            }
        }

        arguments.len() <= declaration.parameters.len()
    }

    fn is_compatible(&mut self, argument: TypeId, parameter: TypeId, mode: MatchMode) -> bool {
        if self.types.is_unknown(argument) || self.types.is_unknown(parameter) {
            return true;
        }
        if matches!(self.types.get(parameter).kind, TypeKind::Parameterized { .. }) {
            return true;
        }

        let argument = self.types.unqualified(argument);
        let parameter = self.types.unqualified(parameter);
        if argument == parameter || self.types.type_name(argument) == self.types.type_name(parameter) {
            return true;
        }
        if self.types.is_supertype_of(parameter, argument) {
            return true;
        }

        mode == MatchMode::ImplicitCast
            && self.types.get(argument).is_primitive()
            && self.types.get(parameter).is_primitive()
    }

    /// Pairs of (method, overridden base method) for every method of
    /// `record` that redeclares a supertype method with the same signature
    pub fn override_links(&mut self, record: NodeId) -> Vec<(NodeId, NodeId)> {
        let graph = self.graph;
        let Some(declaration) = graph.record(record) else {
            return Vec::new();
        };

        let mut links = Vec::new();
        for method in &declaration.methods {
            let signature = self.parameter_types(*method);
            let mut visited = HashSet::from([record]);
            let bases = self.base_records(record);
            if let Some(base_method) = bases
                .into_iter()
                .find_map(|base| self.overridden_in(base, graph.local_name(*method), &signature, &mut visited))
            {
                links.push((*method, base_method));
            }
        }
        links
    }

    fn overridden_in(
        &mut self,
        record: NodeId,
        name: &str,
        signature: &[TypeId],
        visited: &mut HashSet<NodeId>,
    ) -> Option<NodeId> {
        if !visited.insert(record) {
            return None;
        }
        let graph = self.graph;
        let declaration = graph.record(record)?;

        for method in &declaration.methods {
            if graph.local_name(*method) == name && self.parameter_types(*method) == signature {
                return Some(*method);
            }
        }
        self.base_records(record)
            .into_iter()
            .find_map(|base| self.overridden_in(base, name, signature, visited))
    }

    /// Unqualified parameter types of a function
    fn parameter_types(&mut self, function: NodeId) -> Vec<TypeId> {
        let graph = self.graph;
        let parameters = graph.function(function).map(|f| f.parameters.as_slice()).unwrap_or(&[]);
        parameters
            .iter()
            .map(|p| {
                let ty = self.node_type(*p);
                self.types.unqualified(ty)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FunctionDeclaration, Graph, RecordDeclaration};
    use crate::language::{default_registry, LanguageRegistry};
    use crate::propagation::TypePropagation;
    use crate::scope::ScopeTree;
    use crate::types::{Modifier, Type, TypeRegistry};

    struct Fixture {
        graph: Graph,
        scopes: ScopeTree,
        types: TypeRegistry,
        propagation: TypePropagation,
        languages: LanguageRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: Graph::new(),
                scopes: ScopeTree::new(),
                types: TypeRegistry::new(),
                propagation: TypePropagation::new(),
                languages: default_registry(),
            }
        }

        fn primitive(&mut self, name: &str) -> TypeId {
            self.types
                .intern(Type::primitive(name, Modifier::Signed).with_language(Some("cpp")))
        }

        /// Declare `name(params...)`; `true` marks a defaulted parameter
        fn function(&mut self, name: &str, params: &[(TypeId, bool)]) -> NodeId {
            let mut nodes = Vec::new();
            for (index, (ty, has_default)) in params.iter().enumerate() {
                let default = has_default.then(|| {
                    self.graph.add(Name::parse("", "::"), NodeKind::Literal { value: "0".into() }, Some("cpp"), None)
                });
                let node = self.graph.add(
                    Name::parse(&format!("p{}", index), "::"),
                    NodeKind::Parameter { index, variadic: false, default },
                    Some("cpp"),
                    None,
                );
                self.propagation
                    .set_type(&mut self.types, node, *ty, &HashSet::new());
                nodes.push(node);
            }
            let void = self.types.intern(Type::incomplete("void"));
            let function = self.graph.add(
                Name::parse(name, "::"),
                NodeKind::Function(FunctionDeclaration::new(FunctionKind::Function, void, nodes)),
                Some("cpp"),
                None,
            );
            self.scopes.add_value_declaration(function);
            function
        }

        fn resolver(&mut self) -> NameResolver<'_> {
            NameResolver::new(&self.graph, &self.scopes, &self.propagation, &mut self.types, &self.languages)
        }
    }

    #[test]
    fn test_overload_selected_by_arity() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let one = fx.function("foo", &[(int, false)]);
        let two = fx.function("foo", &[(int, false), (int, false)]);

        let mut resolver = fx.resolver();
        let name = Name::parse("foo", "::");
        assert_eq!(resolver.resolve_call(ScopeId::root(), &name, &[int, int]), vec![two]);
        assert_eq!(resolver.resolve_call(ScopeId::root(), &name, &[int]), vec![one]);
    }

    #[test]
    fn test_default_arguments_fill_missing() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let foo = fx.function("foo", &[(int, false), (int, false), (int, true)]);
        let name = Name::parse("foo", "::");

        let mut resolver = fx.resolver();
        assert_eq!(resolver.resolve_call(ScopeId::root(), &name, &[int, int]), vec![foo]);
        assert!(resolver.resolve_call(ScopeId::root(), &name, &[int]).is_empty());

        let mut resolver = fx.resolver().with_default_arguments(false);
        assert!(resolver.resolve_call(ScopeId::root(), &name, &[int, int]).is_empty());
    }

    #[test]
    fn test_implicit_cast_only_without_exact_match() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let long = fx.primitive("long");
        let exact = fx.function("f", &[(long, false)]);
        let name = Name::parse("f", "::");

        let mut resolver = fx.resolver();
        assert_eq!(resolver.resolve_call(ScopeId::root(), &name, &[int]), vec![exact]);

        let other = fx.function("f", &[(int, false)]);
        let mut resolver = fx.resolver();
        assert_eq!(resolver.resolve_call(ScopeId::root(), &name, &[int]), vec![other]);
    }

    #[test]
    fn test_ambiguous_overloads_returned_together() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let first = fx.function("g", &[(int, false)]);
        let second = fx.function("g", &[(int, false)]);

        let mut resolver = fx.resolver();
        let found = resolver.resolve_call(ScopeId::root(), &Name::parse("g", "::"), &[int]);
        assert_eq!(found, vec![first, second]);
    }

    #[test]
    fn test_variadic_accepts_extra_arguments() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let function = fx.function("printf", &[(int, false)]);
        let variadic = fx.graph.add(
            Name::parse("rest", "::"),
            NodeKind::Parameter { index: 1, variadic: true, default: None },
            Some("cpp"),
            None,
        );
        fx.graph.function_mut(function).unwrap().parameters.push(variadic);

        let mut resolver = fx.resolver();
        assert!(resolver.matches_signature(function, &[int, int, int], MatchMode::Strict));
        assert!(!resolver.matches_signature(function, &[], MatchMode::Strict));
    }

    #[test]
    fn test_constructor_resolution() {
        let mut fx = Fixture::new();
        let int = fx.primitive("int");
        let record = fx
            .graph
            .add(Name::parse("Point", "::"), NodeKind::Record(RecordDeclaration::default()), Some("cpp"), None);
        let constructor = fx.function("Point", &[(int, false), (int, false)]);
        fx.graph.function_mut(constructor).unwrap().kind = FunctionKind::Constructor;
        fx.graph.record_mut(record).unwrap().constructors.push(constructor);

        let mut resolver = fx.resolver();
        assert_eq!(resolver.resolve_constructor(record, &[int, int]), vec![constructor]);
        assert!(resolver.resolve_constructor(record, &[int]).is_empty());
        assert!(resolver
            .resolve_call(ScopeId::root(), &Name::parse("Point", "::"), &[int, int])
            .is_empty());
    }
}
