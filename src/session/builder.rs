//! Node construction
//!
//! Frontends create graph nodes through these methods. Every node records
//! the scope that was current at creation, which is where the symbol
//! resolver later looks its name up. Declarations are registered with the
//! scope tree as they are created; expressions are queued for resolution.

use super::Session;
use crate::graph::{FunctionDeclaration, FunctionKind, LoopKind, NodeId, NodeKind, RecordDeclaration, RecordKind};
use crate::name::Name;
use crate::propagation::ListenerKind;
use crate::types::{Type, TypeId};

/// Parameter of a function under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub type_text: String,
    /// Source text of the default value
    pub default: Option<String>,
    pub variadic: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            default: None,
            variadic: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

impl Session {
    fn add_node(&mut self, name: Name, kind: NodeKind) -> NodeId {
        let scope = Some(self.scopes.current());
        let language = self.language.clone();
        self.graph.add(name, kind, language.as_deref(), scope)
    }

    fn add_expression(&mut self, name: Name, kind: NodeKind) -> NodeId {
        let node = self.add_node(name, kind);
        self.expressions.push(node);
        node
    }

    /// `name` qualified with the prefix of the current namespace or record
    fn qualified(&self, name: &str) -> Name {
        match self.scopes.current_name_prefix() {
            Some(prefix) => prefix.join(name),
            None => self.name(name),
        }
    }

    fn unnamed(&self) -> Name {
        Name::local("", self.delimiter())
    }

    /// Start a translation unit; its language becomes the session default
    pub fn new_translation_unit(&mut self, name: &str, language: &str) -> NodeId {
        self.set_language(Some(language));
        let name = Name::local(name, self.delimiter());
        let unit = self.add_node(name, NodeKind::TranslationUnit);
        self.unit = Some(unit);
        unit
    }

    pub fn new_namespace(&mut self, name: &str) -> NodeId {
        let name = self.qualified(name);
        let namespace = self.add_node(name, NodeKind::Namespace);
        self.add_declaration(namespace);
        namespace
    }

    /// Declare a record. Supertypes are parsed as type text in the current scope.
    pub fn new_record(&mut self, name: &str, kind: RecordKind, super_types: &[&str]) -> NodeId {
        let name = self.qualified(name);
        let super_types: Vec<TypeId> = super_types.iter().map(|s| self.parse_type(s, None)).collect();

        let record_type = self
            .types
            .intern(Type::object(name.to_string()).with_language(self.language.as_deref()));
        let record = self.add_node(
            name,
            NodeKind::Record(RecordDeclaration {
                kind: Some(kind),
                super_types,
                ..Default::default()
            }),
        );
        self.set_type(record, record_type);
        self.add_declaration(record);
        record
    }

    /// Declare type parameters owned by `owner` (a record or template)
    pub fn add_type_parameters(&mut self, owner: NodeId, names: &[&str]) -> Vec<TypeId> {
        let language = self.language.clone();
        let mut parameters = self.types.type_parameters(owner).to_vec();
        let added: Vec<TypeId> = names
            .iter()
            .map(|n| {
                self.types
                    .intern(Type::parameterized(*n, Some(owner)).with_language(language.as_deref()))
            })
            .collect();
        parameters.extend(added.iter().copied());
        self.types.bind_type_parameters(owner, parameters.clone());

        match self.graph.get_mut(owner).map(|n| &mut n.kind) {
            Some(NodeKind::Record(record)) => record.type_parameters = parameters,
            Some(NodeKind::Template { parameters: declared }) => *declared = parameters,
            _ => {}
        }
        added
    }

    /// Declare a template with its type parameter names
    pub fn new_template(&mut self, name: &str, parameters: &[&str]) -> NodeId {
        let name = self.qualified(name);
        let template = self.add_node(name, NodeKind::Template { parameters: Vec::new() });
        self.add_type_parameters(template, parameters);
        self.add_declaration(template);
        template
    }

    pub fn new_function(&mut self, name: &str, return_type: &str, parameters: Vec<ParameterSpec>) -> NodeId {
        let name = self.qualified(name);
        let return_type = self.parse_type(return_type, None);
        self.new_callable(FunctionKind::Function, name, return_type, parameters, None)
    }

    pub fn new_method(&mut self, record: NodeId, name: &str, return_type: &str, parameters: Vec<ParameterSpec>) -> NodeId {
        let name = self.member_name(record, name);
        let return_type = self.parse_type(return_type, None);
        self.new_callable(FunctionKind::Method, name, return_type, parameters, Some(record))
    }

    /// Declare a constructor; it returns the record type
    pub fn new_constructor(&mut self, record: NodeId, parameters: Vec<ParameterSpec>) -> NodeId {
        let local = self.graph.local_name(record).to_string();
        let name = self.member_name(record, &local);
        let return_type = self.get_type(record);
        self.new_callable(FunctionKind::Constructor, name, return_type, parameters, Some(record))
    }

    fn new_callable(
        &mut self,
        kind: FunctionKind,
        name: Name,
        return_type: TypeId,
        parameters: Vec<ParameterSpec>,
        record: Option<NodeId>,
    ) -> NodeId {
        let mut nodes = Vec::with_capacity(parameters.len());
        let mut types = Vec::with_capacity(parameters.len());
        for (index, spec) in parameters.into_iter().enumerate() {
            let ty = self.parse_type(&spec.type_text, None);
            let default = spec.default.map(|value| {
                let name = self.unnamed();
                self.add_node(name, NodeKind::Literal { value })
            });
            let name = self.name(&spec.name);
            let parameter = self.add_node(
                name,
                NodeKind::Parameter {
                    index,
                    variadic: spec.variadic,
                    default,
                },
            );
            self.set_type(parameter, ty);
            nodes.push(parameter);
            types.push(ty);
        }

        let mut declaration = FunctionDeclaration::new(kind, return_type, nodes);
        declaration.record = record;
        let function = self.add_node(name, NodeKind::Function(declaration));

        let signature = self
            .types
            .intern(Type::function_pointer(types, return_type).with_language(self.language.as_deref()));
        self.set_type(function, signature);
        self.add_declaration(function);
        function
    }

    /// Declare a variable. Without a declared type it takes the type of its initializer.
    pub fn new_variable(&mut self, name: &str, type_text: &str, initializer: Option<NodeId>) -> NodeId {
        let ty = self.parse_type(type_text, None);
        let name = self.name(name);
        let variable = self.add_node(name, NodeKind::Variable { initializer });

        if !self.types.is_unknown(ty) {
            self.set_type(variable, ty);
        } else if let Some(initializer) = initializer {
            self.register_type_listener(initializer, variable, ListenerKind::Mirror);
        }
        self.add_declaration(variable);
        variable
    }

    pub fn new_field(&mut self, record: NodeId, name: &str, type_text: &str) -> NodeId {
        let ty = self.parse_type(type_text, None);
        let name = self.member_name(record, name);
        let field = self.add_node(name, NodeKind::Field { record: Some(record) });
        self.set_type(field, ty);
        self.add_declaration(field);
        field
    }

    pub fn new_block(&mut self) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::Block)
    }

    pub fn new_loop(&mut self, kind: LoopKind) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::Loop { kind })
    }

    pub fn new_switch(&mut self) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::Switch)
    }

    pub fn new_if(&mut self) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::If)
    }

    pub fn new_try(&mut self) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::Try)
    }

    pub fn new_catch(&mut self) -> NodeId {
        let name = self.unnamed();
        self.add_node(name, NodeKind::Catch)
    }

    /// Label `statement` in the current scope
    pub fn new_label(&mut self, label: &str, statement: NodeId) -> NodeId {
        let name = self.unnamed();
        let node = self.add_node(
            name,
            NodeKind::Label {
                label: label.to_string(),
                statement: Some(statement),
            },
        );
        self.scopes.add_label(label, statement);
        node
    }

    pub fn new_break(&mut self, label: Option<&str>) -> NodeId {
        let name = self.unnamed();
        let node = self.add_node(
            name,
            NodeKind::Break {
                label: label.map(str::to_string),
            },
        );
        self.scopes.add_break(node, label);
        node
    }

    pub fn new_continue(&mut self, label: Option<&str>) -> NodeId {
        let name = self.unnamed();
        let node = self.add_node(
            name,
            NodeKind::Continue {
                label: label.map(str::to_string),
            },
        );
        self.scopes.add_continue(node, label);
        node
    }

    /// Reference to a (possibly qualified) name
    pub fn new_reference(&mut self, name: &str) -> NodeId {
        let name = self.name(name);
        self.add_expression(name, NodeKind::Reference { refers_to: None })
    }

    /// Access of member `name` on the value of `base`
    pub fn new_member(&mut self, base: NodeId, name: &str) -> NodeId {
        let name = self.name(name);
        self.add_expression(name, NodeKind::Member { base, refers_to: None })
    }

    /// Call of `name`; with a `base` it is a method call on that value
    pub fn new_call(&mut self, name: &str, arguments: Vec<NodeId>, base: Option<NodeId>) -> NodeId {
        let name = self.name(name);
        self.add_expression(
            name,
            NodeKind::Call {
                arguments,
                base,
                invokes: Vec::new(),
            },
        )
    }

    /// Construction of a value of the record named by `type_text`
    pub fn new_construct(&mut self, type_text: &str, arguments: Vec<NodeId>) -> NodeId {
        let ty = self.parse_type(type_text, None);
        let name = self.name(type_text);
        let construct = self.add_expression(
            name,
            NodeKind::Construct {
                arguments,
                invokes: Vec::new(),
            },
        );
        self.set_type(construct, ty);
        construct
    }

    pub fn new_literal(&mut self, value: &str, type_text: &str) -> NodeId {
        let ty = self.parse_type(type_text, None);
        let name = self.unnamed();
        let literal = self.add_node(name, NodeKind::Literal { value: value.to_string() });
        self.set_type(literal, ty);
        literal
    }
}
