//! Analysis session
//!
//! A session owns everything one analysis run mutates: the graph arena,
//! the type registry, the scope tree and the propagation state. Frontends
//! drive it while walking their syntax tree:
//!
//! 1. create nodes through the builder methods (see [`builder`])
//! 2. `enter_scope` / `leave_scope` around nested constructs
//! 3. `add_declaration` for every declaration
//! 4. `parse_type` for raw type text
//! 5. `resolve` once the unit is complete
//!
//! Sessions of independent units can be built in parallel and merged
//! afterwards (see [`analyze_units`]).

pub mod builder;
mod merge;

pub use builder::ParameterSpec;
pub use merge::analyze_units;

use crate::config::SemaConfig;
use crate::diagnostics::{Diagnostics, SemanticError};
use crate::graph::{FunctionDeclaration, FunctionKind, Graph, NodeId, NodeKind, RecordDeclaration};
use crate::language::{default_registry, LanguageRegistry};
use crate::name::Name;
use crate::propagation::{ListenerKind, TypePropagation};
use crate::resolution::{NameResolver, ResolverStats, SymbolResolver};
use crate::scope::{ScopeId, ScopeKind, ScopeTree, Typedef};
use crate::types::{Provenance, RecordBinding, Type, TypeId, TypeParser, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const DEFAULT_DELIMITER: &str = "::";

/// Behaviour switches of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Synthesise declarations for calls nothing matches
    pub infer_declarations: bool,
    /// Fill missing trailing arguments from parameter defaults
    pub use_default_arguments: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            infer_declarations: true,
            use_default_arguments: true,
        }
    }
}

impl From<&SemaConfig> for SessionOptions {
    fn from(config: &SemaConfig) -> Self {
        Self {
            infer_declarations: config.infer_declarations,
            use_default_arguments: config.use_default_arguments,
        }
    }
}

/// State of one analysis run
#[derive(Debug, Clone)]
pub struct Session {
    pub graph: Graph,
    pub types: TypeRegistry,
    pub scopes: ScopeTree,
    pub propagation: TypePropagation,
    pub languages: LanguageRegistry,
    pub diagnostics: Diagnostics,
    pub options: SessionOptions,
    /// Language of nodes created without an explicit one
    language: Option<String>,
    /// Translation unit holding global declarations
    unit: Option<NodeId>,
    /// Resolvable expressions in creation order
    expressions: Vec<NodeId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(default_registry(), SessionOptions::default())
    }
}

impl Session {
    pub fn new(languages: LanguageRegistry, options: SessionOptions) -> Self {
        let mut types = TypeRegistry::new();
        for language in languages.languages() {
            types.register_builtin_hierarchy(language);
        }

        Self {
            graph: Graph::new(),
            types,
            scopes: ScopeTree::new(),
            propagation: TypePropagation::new(),
            languages,
            diagnostics: Diagnostics::new(),
            options,
            language: None,
            unit: None,
            expressions: Vec::new(),
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<&str>) {
        self.language = language.map(str::to_string);
    }

    pub fn current_scope(&self) -> ScopeId {
        self.scopes.current()
    }

    pub fn expressions(&self) -> &[NodeId] {
        &self.expressions
    }

    /// Namespace delimiter of the current language
    pub fn delimiter(&self) -> &str {
        self.language
            .as_deref()
            .and_then(|l| self.languages.find(l))
            .map(|l| l.namespace_delimiter.as_str())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// Parse a (possibly qualified) name with the current delimiter
    pub fn name(&self, text: &str) -> Name {
        Name::parse(text, self.delimiter())
    }

    /// Enter the scope a node opens.
    ///
    /// Nodes that open no scope are reported and leave the current scope
    /// unchanged. Entering a function scope for the first time declares
    /// its parameters in it.
    pub fn enter_scope(&mut self, anchor: NodeId) -> ScopeId {
        let current = self.scopes.current();
        let Some(node) = self.graph.get(anchor) else {
            self.report_scope_error(format!("Cannot enter scope of unknown node {}", anchor));
            return current;
        };
        let Some(kind) = ScopeKind::for_node(&node.kind) else {
            let message = format!("Node {} ({}) does not open a scope", anchor, node.kind);
            self.report_scope_error(message);
            return current;
        };

        let name = kind.is_named().then(|| node.name.clone());
        let parameters = match &node.kind {
            NodeKind::Function(function) => function.parameters.clone(),
            _ => Vec::new(),
        };
        let is_new = self.scopes.lookup_scope(anchor).is_none();

        let scope = self.scopes.enter(anchor, kind, name);
        if is_new {
            for parameter in parameters {
                self.scopes.add_value_declaration(parameter);
            }
        }
        scope
    }

    /// Leave the scope of `anchor`, returning the scope that is current afterwards
    pub fn leave_scope(&mut self, anchor: NodeId) -> Option<ScopeId> {
        if self.scopes.lookup_scope(anchor).is_none() {
            self.report_scope_error(format!("Cannot leave scope: node {} has no scope", anchor));
            return None;
        }
        self.scopes.leave(anchor)
    }

    fn report_scope_error(&mut self, message: String) {
        self.diagnostics.report(SemanticError::StructuralScope { message });
    }

    /// Register a declaration with the scope tree.
    ///
    /// Value declarations go into the current scope, fields and methods
    /// additionally into their record. Structural declarations go into the
    /// nearest structural scope and become children of its node.
    pub fn add_declaration(&mut self, declaration: NodeId) {
        let Some(kind) = self.graph.kind(declaration).cloned() else {
            self.report_scope_error(format!("Cannot declare unknown node {}", declaration));
            return;
        };

        if kind.is_value_declaration() {
            self.scopes.add_value_declaration(declaration);
            self.attach_member(declaration, &kind);
        } else if kind.is_structure_declaration() {
            let scope = self.scopes.add_structure_declaration(declaration);
            let container = self.scopes.scope(scope).and_then(|s| s.anchor).or(self.unit);
            if let Some(container) = container {
                self.graph.add_child(container, declaration);
            }
            if let NodeKind::Record(record) = &kind {
                self.bind_record(declaration, record);
            }
        } else {
            self.report_scope_error(format!("Node {} ({}) is not a declaration", declaration, kind));
        }
    }

    /// Record owning the current scope, if that scope is a record scope
    fn current_record(&self) -> Option<NodeId> {
        let scope = self.scopes.scope(self.scopes.current())?;
        match scope.kind {
            ScopeKind::Record => scope.anchor,
            _ => None,
        }
    }

    fn attach_member(&mut self, declaration: NodeId, kind: &NodeKind) {
        let owner = match kind {
            NodeKind::Function(function) => function.record.or_else(|| self.current_record()),
            NodeKind::Field { record } => record.or_else(|| self.current_record()),
            _ => None,
        };
        let Some(owner) = owner else {
            return;
        };

        let function_kind = match kind {
            NodeKind::Function(function) => Some(function.kind),
            _ => None,
        };
        match self.graph.get_mut(declaration).map(|n| &mut n.kind) {
            Some(NodeKind::Function(function)) => function.record = Some(owner),
            Some(NodeKind::Field { record }) => *record = Some(owner),
            _ => {}
        }

        let Some(record) = self.graph.record_mut(owner) else {
            return;
        };
        let members = match function_kind {
            Some(FunctionKind::Constructor) => &mut record.constructors,
            Some(_) => &mut record.methods,
            None => &mut record.fields,
        };
        if !members.contains(&declaration) {
            members.push(declaration);
        }
    }

    fn bind_record(&mut self, node: NodeId, record: &RecordDeclaration) {
        let Some(declared) = self.graph.get(node) else {
            return;
        };
        let name = declared.name.to_string();
        let language = declared.language.clone();
        let super_types = record
            .super_types
            .iter()
            .map(|t| self.types.root_name(*t))
            .collect();

        self.types.register_record(
            RecordBinding::new(name, Some(node))
                .with_super_types(super_types)
                .with_language(language.as_deref()),
        );
    }

    /// Type parameters of every template and record scope enclosing the current scope
    fn visible_type_parameters(&self) -> Vec<TypeId> {
        self.scopes
            .scope_chain(self.scopes.current())
            .into_iter()
            .filter_map(|id| self.scopes.scope(id))
            .filter(|s| matches!(s.kind, ScopeKind::Template | ScopeKind::Record))
            .filter_map(|s| s.anchor)
            .flat_map(|anchor| self.types.type_parameters(anchor).to_vec())
            .collect()
    }

    /// Parse raw type text in the current scope.
    ///
    /// Template parameters in scope parse to their parameterized types and
    /// typedef aliases visible here are resolved. Failures degrade to the
    /// unknown type and are reported.
    pub fn parse_type(&mut self, text: &str, language: Option<&str>) -> TypeId {
        let language = language.map(str::to_string).or_else(|| self.language.clone());
        let parameters = self.visible_type_parameters();

        let Some(table) = language.as_deref().and_then(|l| self.languages.find(l)) else {
            self.diagnostics.report(SemanticError::UnresolvedType {
                text: format!("{} (no language table for {:?})", text, language),
            });
            return self.types.unknown(language.as_deref());
        };

        let current = self.scopes.current();
        let ty = TypeParser::new(table)
            .with_type_parameters(parameters)
            .resolving_aliases(&self.scopes, current)
            .parse(&mut self.types, text);

        let trimmed = text.trim();
        let explicit = trimmed == "UNKNOWN" || table.is_unknown_type_name(trimmed);
        if self.types.is_unknown(ty) && !trimmed.is_empty() && !explicit {
            self.diagnostics.report(SemanticError::UnresolvedType {
                text: trimmed.to_string(),
            });
        }
        ty
    }

    /// Current type of a node, the unknown type if it has none
    pub fn get_type(&mut self, node: NodeId) -> TypeId {
        match self.propagation.get_type(node) {
            Some(ty) => ty,
            None => {
                let language = self.graph.get(node).and_then(|n| n.language.as_deref());
                self.types.unknown(language)
            }
        }
    }

    /// Start a propagation at `node`
    pub fn set_type(&mut self, node: NodeId, ty: TypeId) {
        self.propagation
            .set_type(&mut self.types, node, ty, &HashSet::new());
    }

    /// Make the type of `target` follow the type of `source`
    pub fn register_type_listener(&mut self, source: NodeId, target: NodeId, kind: ListenerKind) {
        self.propagation
            .register_listener(&mut self.types, source, target, kind);
    }

    /// Resolver over the current state of the session
    pub fn resolver(&mut self) -> NameResolver<'_> {
        NameResolver::new(
            &self.graph,
            &self.scopes,
            &self.propagation,
            &mut self.types,
            &self.languages,
        )
        .with_default_arguments(self.options.use_default_arguments)
    }

    /// Resolve a name from the current scope
    pub fn resolve_reference(&mut self, name: &str) -> Option<NodeId> {
        let name = self.name(name);
        let current = self.scopes.current();
        let found = self.resolver().resolve_reference(current, &name, None);
        if found.is_none() {
            debug!("Unresolved reference {} in scope {}", name, current.0);
        }
        found
    }

    /// Resolve a call from the current scope
    pub fn resolve_call(&mut self, name: &str, arguments: &[TypeId]) -> Vec<NodeId> {
        let name = self.name(name);
        let current = self.scopes.current();
        self.resolver().resolve_call(current, &name, arguments)
    }

    /// Run the symbol resolver over all recorded expressions
    pub fn resolve(&mut self) -> ResolverStats {
        SymbolResolver::new(self).run()
    }

    /// Synthesise a function for a call from the current scope
    pub fn infer_function(&mut self, name: &str, arguments: &[TypeId]) -> NodeId {
        let name = self.name(name);
        let current = self.scopes.current();
        self.infer_function_in(current, &name, arguments)
    }

    /// Synthesise a function for a call made in `scope`.
    ///
    /// The declaration lands in the nearest namespace, record or global
    /// scope. A previously inferred declaration with the same name and
    /// argument types is returned instead of creating a second one.
    pub fn infer_function_in(&mut self, scope: ScopeId, name: &Name, arguments: &[TypeId]) -> NodeId {
        let named = name
            .parent()
            .and_then(|parent| self.scopes.lookup_scope_by_name(&parent.to_string()));
        let target = named
            .or_else(|| self.scopes.first_enclosing(scope, |s| s.kind.is_structural()))
            .unwrap_or_else(ScopeId::root);

        if let Some(scope) = self.scopes.scope(target) {
            if let (ScopeKind::Record, Some(record)) = (scope.kind, scope.anchor) {
                return self.infer_method(record, name.local_name(), arguments);
            }
        }

        let candidates: Vec<NodeId> = self
            .scopes
            .scope(target)
            .map(|s| s.value_declarations.clone())
            .unwrap_or_default();
        if let Some(existing) = self.find_inferred(&candidates, name.local_name(), arguments) {
            return existing;
        }

        let qualified = match self.scopes.name_prefix(target) {
            Some(prefix) => prefix.join(name.local_name()),
            None => Name::local(name.local_name(), name.delimiter.clone()),
        };
        let unknown = self.types.unknown(self.language.as_deref());
        let function = self.synthesize(FunctionKind::Function, qualified, arguments, unknown, None);
        self.scopes.add_value_declaration_to(target, function);
        function
    }

    /// Synthesise a method of `record` for an unresolved member call
    pub fn infer_method(&mut self, record: NodeId, name: &str, arguments: &[TypeId]) -> NodeId {
        let methods = self.graph.record(record).map(|r| r.methods.clone()).unwrap_or_default();
        if let Some(existing) = self.find_inferred(&methods, name, arguments) {
            return existing;
        }

        let qualified = self.member_name(record, name);
        let unknown = self.types.unknown(self.language.as_deref());
        let method = self.synthesize(FunctionKind::Method, qualified, arguments, unknown, Some(record));
        if let Some(declaration) = self.graph.record_mut(record) {
            declaration.methods.push(method);
        }
        if let Some(scope) = self.scopes.lookup_scope(record) {
            self.scopes.add_value_declaration_to(scope, method);
        }
        method
    }

    /// Synthesise a constructor of `record` taking `arguments`
    pub fn infer_constructor(&mut self, record: NodeId, arguments: &[TypeId]) -> NodeId {
        let constructors = self
            .graph
            .record(record)
            .map(|r| r.constructors.clone())
            .unwrap_or_default();
        let local = self.graph.local_name(record).to_string();
        if let Some(existing) = self.find_inferred(&constructors, &local, arguments) {
            return existing;
        }

        let qualified = self.member_name(record, &local);
        let record_type = self.get_type(record);
        let constructor = self.synthesize(FunctionKind::Constructor, qualified, arguments, record_type, Some(record));
        if let Some(declaration) = self.graph.record_mut(record) {
            declaration.constructors.push(constructor);
        }
        constructor
    }

    fn member_name(&self, record: NodeId, member: &str) -> Name {
        match self.graph.get(record) {
            Some(node) => node.name.join(member),
            None => self.name(member),
        }
    }

    /// Inferred function among `candidates` with this name and exactly these argument types
    fn find_inferred(&mut self, candidates: &[NodeId], name: &str, arguments: &[TypeId]) -> Option<NodeId> {
        for candidate in candidates {
            let Some(function) = self.graph.function(*candidate) else {
                continue;
            };
            if !function.is_inferred
                || self.graph.local_name(*candidate) != name
                || function.parameters.len() != arguments.len()
            {
                continue;
            }

            let parameters = function.parameters.clone();
            let same = parameters.iter().zip(arguments).all(|(parameter, argument)| {
                let ty = self.get_type(*parameter);
                ty == *argument || (self.types.is_unknown(ty) && self.types.is_unknown(*argument))
            });
            if same {
                return Some(*candidate);
            }
        }
        None
    }

    fn synthesize(
        &mut self,
        kind: FunctionKind,
        name: Name,
        arguments: &[TypeId],
        return_type: TypeId,
        record: Option<NodeId>,
    ) -> NodeId {
        let language = self.language.clone();
        let scope = Some(self.scopes.current());

        let mut parameters = Vec::with_capacity(arguments.len());
        for (index, argument) in arguments.iter().enumerate() {
            let parameter = self.graph.add(
                Name::local(format!("arg{}", index), name.delimiter.clone()),
                NodeKind::Parameter {
                    index,
                    variadic: false,
                    default: None,
                },
                language.as_deref(),
                scope,
            );
            self.set_type(parameter, *argument);
            parameters.push(parameter);
        }

        let mut declaration = FunctionDeclaration::new(kind, return_type, parameters);
        declaration.is_inferred = true;
        declaration.record = record;
        let description = name.to_string();
        let function = self
            .graph
            .add(name, NodeKind::Function(declaration), language.as_deref(), scope);

        let signature = self.types.intern(
            Type::function_pointer(arguments.to_vec(), return_type).with_language(language.as_deref()),
        );
        self.types.set_provenance(signature, Provenance::Guessed);
        self.set_type(function, signature);

        debug!("Inferred {} {} with {} parameters", kind_name(kind), description, arguments.len());
        function
    }

    /// Remove a declaration whose subtree was replaced.
    ///
    /// The node stays in the arena but is dropped from every scope, from its
    /// container and record, and from all listener edges. Returns whether
    /// any scope held it.
    pub fn remove_declaration(&mut self, declaration: NodeId) -> bool {
        let removed = self.scopes.remove_declaration(declaration);
        self.graph.unlink(declaration);
        self.propagation.isolate(declaration);
        if removed {
            debug!("Removed declaration {}", declaration);
        }
        removed
    }

    /// Link the methods of `record` to the supertype methods they override.
    /// Returns the number of links created.
    pub fn link_overrides(&mut self, record: NodeId) -> usize {
        let links = self.resolver().override_links(record);
        for (method, base) in &links {
            if let Some(function) = self.graph.function_mut(*method) {
                if !function.overrides.contains(base) {
                    function.overrides.push(*base);
                }
            }
            if let Some(function) = self.graph.function_mut(*base) {
                if !function.overridden_by.contains(method) {
                    function.overridden_by.push(*method);
                }
            }
        }
        links.len()
    }

    /// Declare a typedef in the current scope.
    ///
    /// Accepts the alias forms `Name`, `*Name` (pointers move onto the
    /// target), `Name[N]` and `(*Name)(args)` for function pointers.
    pub fn create_typedef(&mut self, target: &str, alias: &str, language: Option<&str>) -> NodeId {
        let target = target.trim();
        let alias = alias.trim();

        let (target_text, alias_name) = if alias.starts_with('(') {
            let inner = alias.trim_start_matches('(').split(')').next().unwrap_or_default();
            (format!("{} {}", target, alias), inner.trim_start_matches('*').trim().to_string())
        } else if let Some(bracket) = alias.find('[') {
            (format!("{}[]", target), alias[..bracket].trim().to_string())
        } else {
            let stars = alias.chars().take_while(|c| *c == '*').count();
            (format!("{}{}", target, "*".repeat(stars)), alias[stars..].trim().to_string())
        };

        let target_type = self.parse_type(&target_text, language);
        let language = language.map(str::to_string).or_else(|| self.language.clone());
        let parameters = self.visible_type_parameters();
        let alias_type = match language.as_deref().and_then(|l| self.languages.find(l)) {
            Some(table) => TypeParser::new(table)
                .with_type_parameters(parameters)
                .parse(&mut self.types, &alias_name),
            None => self
                .types
                .intern(Type::object(alias_name.as_str()).with_language(language.as_deref())),
        };

        let scope = Some(self.scopes.current());
        let name = self.name(&alias_name);
        let node = self.graph.add(
            name,
            NodeKind::Typedef {
                alias: alias_type,
                target: target_type,
            },
            language.as_deref(),
            scope,
        );
        self.scopes.add_typedef(Typedef {
            alias: alias_type,
            target: target_type,
            declaration: Some(node),
        });
        debug!("Typedef {} -> {}", alias_name, self.types.type_name(target_type));
        node
    }
}

fn kind_name(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Function => "function",
        FunctionKind::Method => "method",
        FunctionKind::Constructor => "constructor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordKind;

    fn cpp_session() -> Session {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        session
    }

    fn invokes(session: &Session, call: NodeId) -> Vec<NodeId> {
        match session.graph.kind(call) {
            Some(NodeKind::Call { invokes, .. }) => invokes.clone(),
            other => panic!("not a call: {:?}", other),
        }
    }

    #[test]
    fn test_overload_with_two_arguments() {
        let mut session = cpp_session();
        session.new_function("foo", "void", vec![ParameterSpec::new("a", "int")]);
        let two = session.new_function(
            "foo",
            "void",
            vec![ParameterSpec::new("a", "int"), ParameterSpec::new("b", "int")],
        );
        let int = session.parse_type("int", None);

        assert_eq!(session.resolve_call("foo", &[int, int]), vec![two]);
    }

    #[test]
    fn test_default_argument_fill() {
        let mut session = cpp_session();
        let foo = session.new_function(
            "foo",
            "void",
            vec![
                ParameterSpec::new("a", "int"),
                ParameterSpec::new("b", "int"),
                ParameterSpec::new("c", "int").with_default("0"),
            ],
        );
        let int = session.parse_type("int", None);

        assert_eq!(session.resolve_call("foo", &[int, int]), vec![foo]);
    }

    #[test]
    fn test_nested_block_shadowing() {
        let mut session = cpp_session();
        let function = session.new_function("main", "int", vec![]);
        session.enter_scope(function);
        session.new_variable("x", "int", None);
        let block = session.new_block();
        session.enter_scope(block);
        let inner = session.new_variable("x", "double", None);
        let reference = session.new_reference("x");
        session.leave_scope(block);
        session.leave_scope(function);

        session.resolve();
        assert_eq!(
            session.graph.kind(reference),
            Some(&NodeKind::Reference { refers_to: Some(inner) })
        );
        let ty = session.get_type(reference);
        assert_eq!(session.types.type_name(ty), "double");
    }

    #[test]
    fn test_leave_restores_scope() {
        let mut session = cpp_session();
        let before = session.current_scope();
        let block = session.new_block();
        let entered = session.enter_scope(block);
        assert_ne!(entered, before);
        assert_eq!(session.leave_scope(block), Some(before));
        assert_eq!(session.current_scope(), before);

        let literal = session.new_literal("1", "int");
        assert_eq!(session.enter_scope(literal), before);
        assert_eq!(session.leave_scope(literal), None);
        assert_eq!(session.diagnostics.count("structural_scope"), 2);
    }

    #[test]
    fn test_identical_unresolved_calls_share_inferred_declaration() {
        let mut session = cpp_session();
        let function = session.new_function("main", "int", vec![]);
        session.enter_scope(function);
        let first = session.new_call("bar", vec![], None);
        let second = session.new_call("bar", vec![], None);
        session.leave_scope(function);

        // the second call finds the declaration inferred for the first
        let stats = session.resolve();
        assert_eq!(stats.inferred, 1);
        assert_eq!(stats.resolved, 2);
        let target = invokes(&session, first);
        assert_eq!(target.len(), 1);
        assert_eq!(invokes(&session, second), target);
        assert!(session.graph.function(target[0]).unwrap().is_inferred);
        assert_eq!(session.graph.stats().inferred_functions, 1);
        assert!(session
            .scopes
            .scope(ScopeId::root())
            .unwrap()
            .value_declarations
            .contains(&target[0]));
    }

    #[test]
    fn test_typedef_resolution() {
        let mut session = cpp_session();
        session.create_typedef("unsigned long", "size_type", None);
        session.create_typedef("int", "*int_ptr", None);
        session.create_typedef("void", "(*callback)(int)", None);

        let size = session.parse_type("size_type", None);
        assert_eq!(session.types.type_name(size), "unsigned long");
        let pointer = session.parse_type("const size_type*", None);
        assert_eq!(session.types.type_name(pointer), "unsigned long*");
        let int_ptr = session.parse_type("int_ptr", None);
        assert_eq!(session.types.type_name(int_ptr), "int*");
        let callback = session.parse_type("callback", None);
        assert_eq!(session.types.type_name(callback), "void(*)(int)");
    }

    #[test]
    fn test_template_parameters_parse_as_parameterized() {
        let mut session = cpp_session();
        let template = session.new_template("Box", &["T"]);
        session.enter_scope(template);
        let record = session.new_record("Box", RecordKind::Class, &[]);
        session.enter_scope(record);
        let field = session.new_field(record, "value", "T");
        session.leave_scope(record);
        session.leave_scope(template);

        let ty = session.get_type(field);
        assert!(matches!(
            session.types.get(ty).kind,
            crate::types::TypeKind::Parameterized { owner: Some(owner), .. } if owner == template
        ));
        let outside = session.parse_type("T", None);
        assert!(matches!(session.types.get(outside).kind, crate::types::TypeKind::Object { .. }));
    }

    #[test]
    fn test_inherited_method_and_override_links() {
        let mut session = cpp_session();
        let base = session.new_record("Base", RecordKind::Class, &[]);
        session.enter_scope(base);
        let base_draw = session.new_method(base, "draw", "void", vec![ParameterSpec::new("scale", "int")]);
        let base_name = session.new_method(base, "name", "int", vec![]);
        session.leave_scope(base);

        let derived = session.new_record("Derived", RecordKind::Class, &["Base"]);
        session.enter_scope(derived);
        let derived_draw = session.new_method(derived, "draw", "void", vec![ParameterSpec::new("scale", "int")]);
        session.new_method(derived, "draw", "void", vec![ParameterSpec::new("s", "double")]);
        session.leave_scope(derived);

        assert_eq!(session.link_overrides(derived), 1);
        assert_eq!(session.graph.function(derived_draw).unwrap().overrides, vec![base_draw]);
        assert_eq!(session.graph.function(base_draw).unwrap().overridden_by, vec![derived_draw]);

        assert_eq!(session.resolver().resolve_method_call(derived, "name", &[]), vec![base_name]);

        let base_type = session.get_type(base);
        let derived_type = session.get_type(derived);
        assert_eq!(session.types.common_type(&[derived_type, base_type]), Some(base_type));
    }

    #[test]
    fn test_record_in_template_belongs_to_template() {
        let mut session = cpp_session();
        let template = session.new_template("List", &["T"]);
        let template_scope = session.enter_scope(template);
        let record = session.new_record("List", RecordKind::Class, &[]);
        session.leave_scope(template);

        let scope = session.scopes.scope(template_scope).unwrap();
        assert!(scope.structure_declarations.contains(&record));
        assert!(session.graph.get(template).unwrap().children.contains(&record));
        assert!(!session
            .scopes
            .scope(ScopeId::root())
            .unwrap()
            .structure_declarations
            .contains(&record));
    }

    #[test]
    fn test_removed_declaration_is_no_longer_found() {
        let mut session = cpp_session();
        let variable = session.new_variable("count", "int", None);
        let function = session.new_function("run", "void", vec![]);
        let record = session.new_record("Shape", RecordKind::Class, &[]);
        session.enter_scope(record);
        let field = session.new_field(record, "area", "double");
        session.leave_scope(record);
        let reference = session.new_reference("count");
        session.resolve();
        assert_eq!(session.resolve_reference("count"), Some(variable));

        assert!(session.remove_declaration(variable));
        assert!(session.remove_declaration(function));
        assert!(session.remove_declaration(record));
        assert!(session.remove_declaration(field));
        assert!(!session.remove_declaration(variable));

        assert_eq!(session.resolve_reference("count"), None);
        assert!(session.resolve_call("run", &[]).is_empty());
        assert!(session.propagation.listeners(variable).is_empty());
        assert!(session.graph.record(record).unwrap().fields.is_empty());
        let unit = session.graph.iter().find(|n| n.kind == NodeKind::TranslationUnit).unwrap();
        assert!(!unit.children.contains(&record));

        // the reference no longer follows the removed declaration
        let double = session.parse_type("double", None);
        session.set_type(variable, double);
        let ty = session.get_type(reference);
        assert_eq!(session.types.type_name(ty), "int");
    }
}
