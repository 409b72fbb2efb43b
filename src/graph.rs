//! Graph arena
//!
//! Owns every node of the code property graph. Nodes are addressed by a
//! [`NodeId`] assigned at construction, which is what scopes, listeners and
//! type bindings key off. Declared types are not stored here; they live in
//! the propagation state (see [`crate::propagation`]).

use crate::name::Name;
use crate::scope::ScopeId;
use crate::types::TypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Class,
    Struct,
    Union,
    Enum,
    Interface,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Class => "class",
            RecordKind::Struct => "struct",
            RecordKind::Union => "union",
            RecordKind::Enum => "enum",
            RecordKind::Interface => "interface",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Method,
    Constructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    For,
    ForEach,
    While,
    DoWhile,
}

/// Record (class, struct, ...) declaration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordDeclaration {
    pub kind: Option<RecordKind>,
    pub super_types: Vec<TypeId>,
    pub fields: Vec<NodeId>,
    pub methods: Vec<NodeId>,
    pub constructors: Vec<NodeId>,
    pub type_parameters: Vec<TypeId>,
}

/// Function, method or constructor declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub kind: FunctionKind,
    pub return_type: TypeId,
    /// Parameter nodes in declaration order
    pub parameters: Vec<NodeId>,
    /// Owning record of methods and constructors
    pub record: Option<NodeId>,
    /// Synthesised for a call nothing else matched
    pub is_inferred: bool,
    pub overrides: Vec<NodeId>,
    pub overridden_by: Vec<NodeId>,
}

impl FunctionDeclaration {
    pub fn new(kind: FunctionKind, return_type: TypeId, parameters: Vec<NodeId>) -> Self {
        Self {
            kind,
            return_type,
            parameters,
            record: None,
            is_inferred: false,
            overrides: Vec::new(),
            overridden_by: Vec::new(),
        }
    }
}

/// Closed set of node kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    TranslationUnit,
    Namespace,
    Record(RecordDeclaration),
    Template { parameters: Vec<TypeId> },
    Function(FunctionDeclaration),
    Variable { initializer: Option<NodeId> },
    Parameter {
        index: usize,
        variadic: bool,
        default: Option<NodeId>,
    },
    Field { record: Option<NodeId> },
    Typedef { alias: TypeId, target: TypeId },
    Block,
    Loop { kind: LoopKind },
    Switch,
    If,
    Catch,
    Try,
    Label { label: String, statement: Option<NodeId> },
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Reference { refers_to: Option<NodeId> },
    Member { base: NodeId, refers_to: Option<NodeId> },
    Call {
        arguments: Vec<NodeId>,
        base: Option<NodeId>,
        invokes: Vec<NodeId>,
    },
    Construct {
        arguments: Vec<NodeId>,
        invokes: Vec<NodeId>,
    },
    Literal { value: String },
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::TranslationUnit => "translation_unit",
            NodeKind::Namespace => "namespace",
            NodeKind::Record(_) => "record",
            NodeKind::Template { .. } => "template",
            NodeKind::Function(_) => "function",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::Field { .. } => "field",
            NodeKind::Typedef { .. } => "typedef",
            NodeKind::Block => "block",
            NodeKind::Loop { .. } => "loop",
            NodeKind::Switch => "switch",
            NodeKind::If => "if",
            NodeKind::Catch => "catch",
            NodeKind::Try => "try",
            NodeKind::Label { .. } => "label",
            NodeKind::Break { .. } => "break",
            NodeKind::Continue { .. } => "continue",
            NodeKind::Reference { .. } => "reference",
            NodeKind::Member { .. } => "member",
            NodeKind::Call { .. } => "call",
            NodeKind::Construct { .. } => "construct",
            NodeKind::Literal { .. } => "literal",
        }
    }

    /// Variables, parameters, fields and functions
    pub fn is_value_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::Variable { .. }
                | NodeKind::Parameter { .. }
                | NodeKind::Field { .. }
                | NodeKind::Function(_)
        )
    }

    /// Records, namespaces, templates and typedefs
    pub fn is_structure_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::Record(_) | NodeKind::Namespace | NodeKind::Template { .. } | NodeKind::Typedef { .. }
        )
    }

    /// Expressions the symbol resolver connects to declarations
    pub fn is_resolvable(&self) -> bool {
        matches!(
            self,
            NodeKind::Reference { .. } | NodeKind::Member { .. } | NodeKind::Call { .. } | NodeKind::Construct { .. }
        )
    }

    /// Translate every contained id
    fn remap(&mut self, nodes: &impl Fn(NodeId) -> NodeId, types: &impl Fn(TypeId) -> TypeId) {
        let map_all = |ids: &mut Vec<NodeId>| ids.iter_mut().for_each(|id| *id = nodes(*id));
        match self {
            NodeKind::Record(record) => {
                record.super_types.iter_mut().for_each(|t| *t = types(*t));
                record.type_parameters.iter_mut().for_each(|t| *t = types(*t));
                map_all(&mut record.fields);
                map_all(&mut record.methods);
                map_all(&mut record.constructors);
            }
            NodeKind::Template { parameters } => parameters.iter_mut().for_each(|t| *t = types(*t)),
            NodeKind::Function(function) => {
                function.return_type = types(function.return_type);
                function.record = function.record.map(nodes);
                map_all(&mut function.parameters);
                map_all(&mut function.overrides);
                map_all(&mut function.overridden_by);
            }
            NodeKind::Variable { initializer } => *initializer = initializer.map(nodes),
            NodeKind::Parameter { default, .. } => *default = default.map(nodes),
            NodeKind::Field { record } => *record = record.map(nodes),
            NodeKind::Typedef { alias, target } => {
                *alias = types(*alias);
                *target = types(*target);
            }
            NodeKind::Label { statement, .. } => *statement = statement.map(nodes),
            NodeKind::Reference { refers_to } => *refers_to = refers_to.map(nodes),
            NodeKind::Member { base, refers_to } => {
                *base = nodes(*base);
                *refers_to = refers_to.map(nodes);
            }
            NodeKind::Call { arguments, base, invokes } => {
                map_all(arguments);
                *base = base.map(nodes);
                map_all(invokes);
            }
            NodeKind::Construct { arguments, invokes } => {
                map_all(arguments);
                map_all(invokes);
            }
            _ => {}
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node of the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: Name,
    pub kind: NodeKind,
    pub language: Option<String>,
    /// Scope that was current when the node was created
    pub scope: Option<ScopeId>,
    /// Declarations registered under this node as their container
    pub children: Vec<NodeId>,
}

/// In-memory node arena
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    /// Local name -> nodes carrying it
    by_name: HashMap<String, Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn add(&mut self, name: Name, kind: NodeKind, language: Option<&str>, scope: Option<ScopeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if !name.is_empty() {
            self.by_name
                .entry(name.local_name().to_string())
                .or_default()
                .push(id);
        }
        self.nodes.push(Node {
            id,
            name,
            kind,
            language: language.map(str::to_string),
            scope,
            children: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    /// Local name of a node, empty for unnamed or foreign ids
    pub fn local_name(&self, id: NodeId) -> &str {
        self.get(id).map(|n| n.name.local_name()).unwrap_or("")
    }

    pub fn function(&self, id: NodeId) -> Option<&FunctionDeclaration> {
        match self.kind(id) {
            Some(NodeKind::Function(function)) => Some(function),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, id: NodeId) -> Option<&mut FunctionDeclaration> {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Function(function)) => Some(function),
            _ => None,
        }
    }

    pub fn record(&self, id: NodeId) -> Option<&RecordDeclaration> {
        match self.kind(id) {
            Some(NodeKind::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub fn record_mut(&mut self, id: NodeId) -> Option<&mut RecordDeclaration> {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub fn add_child(&mut self, container: NodeId, child: NodeId) {
        if let Some(node) = self.get_mut(container) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
    }

    /// Drop `node` from every container and record member list
    pub fn unlink(&mut self, node: NodeId) {
        for other in &mut self.nodes {
            other.children.retain(|c| *c != node);
            if let NodeKind::Record(record) = &mut other.kind {
                record.fields.retain(|m| *m != node);
                record.methods.retain(|m| *m != node);
                record.constructors.retain(|m| *m != node);
            }
        }
    }

    /// Nodes whose local name is `name`
    pub fn find_by_name(&self, name: &str) -> &[NodeId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Append the nodes of another arena. Ids shift by the current length.
    pub(crate) fn absorb(
        &mut self,
        other: Graph,
        nodes: impl Fn(NodeId) -> NodeId,
        types: impl Fn(TypeId) -> TypeId,
        scopes: impl Fn(ScopeId) -> ScopeId,
    ) {
        for mut node in other.nodes {
            node.kind.remap(&nodes, &types);
            node.children.iter_mut().for_each(|c| *c = nodes(*c));
            node.scope = node.scope.map(&scopes);
            let id = self.add(node.name, node.kind, node.language.as_deref(), node.scope);
            if let Some(added) = self.get_mut(id) {
                added.children = node.children;
            }
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.nodes.len(),
            ..Default::default()
        };

        for node in &self.nodes {
            match &node.kind {
                NodeKind::Record(_) => stats.records += 1,
                NodeKind::Function(function) => {
                    stats.functions += 1;
                    if function.is_inferred {
                        stats.inferred_functions += 1;
                    }
                }
                NodeKind::Reference { refers_to, .. } | NodeKind::Member { refers_to, .. } => {
                    stats.expressions += 1;
                    if refers_to.is_some() {
                        stats.resolved_expressions += 1;
                    }
                }
                NodeKind::Call { invokes, .. } | NodeKind::Construct { invokes, .. } => {
                    stats.expressions += 1;
                    if !invokes.is_empty() {
                        stats.resolved_expressions += 1;
                    }
                }
                _ => {}
            }
            if node.kind.is_value_declaration() || node.kind.is_structure_declaration() {
                stats.declarations += 1;
            }
        }

        stats
    }
}

/// Statistics about a graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub declarations: usize,
    pub records: usize,
    pub functions: usize,
    pub inferred_functions: usize,
    pub expressions: usize,
    pub resolved_expressions: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        writeln!(
            f,
            "  Declarations: {} (records: {}, functions: {}, inferred: {})",
            self.declarations, self.records, self.functions, self.inferred_functions
        )?;
        writeln!(f, "  Expressions: {} (resolved: {})", self.expressions, self.resolved_expressions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        Name::parse(text, "::")
    }

    #[test]
    fn test_add_and_retrieve_node() {
        let mut graph = Graph::new();
        let id = graph.add(name("ns::x"), NodeKind::Variable { initializer: None }, Some("cpp"), None);

        let node = graph.get(id).unwrap();
        assert_eq!(node.name.to_string(), "ns::x");
        assert_eq!(graph.local_name(id), "x");
        assert_eq!(graph.find_by_name("x"), &[id]);
        assert!(graph.get(NodeId(99)).is_none());
    }

    #[test]
    fn test_kind_accessors() {
        let mut graph = Graph::new();
        let record = graph.add(name("Foo"), NodeKind::Record(RecordDeclaration::default()), None, None);
        let function = graph.add(
            name("f"),
            NodeKind::Function(FunctionDeclaration::new(FunctionKind::Function, TypeId(0), vec![])),
            None,
            None,
        );

        assert!(graph.record(record).is_some());
        assert!(graph.record(function).is_none());
        graph.function_mut(function).unwrap().is_inferred = true;
        assert!(graph.function(function).unwrap().is_inferred);
        assert!(graph.kind(function).unwrap().is_value_declaration());
        assert!(graph.kind(record).unwrap().is_structure_declaration());
    }

    #[test]
    fn test_absorb_shifts_ids() {
        let mut graph = Graph::new();
        graph.add(name("a"), NodeKind::Literal { value: "1".into() }, None, None);

        let mut other = Graph::new();
        let var = other.add(name("v"), NodeKind::Variable { initializer: None }, None, None);
        other.add(name("v"), NodeKind::Reference { refers_to: Some(var) }, None, Some(ScopeId(0)));

        let offset = graph.len() as u32;
        graph.absorb(other, |n| NodeId(n.0 + offset), |t| t, |s| s);

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.kind(NodeId(2)), Some(&NodeKind::Reference { refers_to: Some(NodeId(1)) }));
        assert_eq!(graph.find_by_name("v").len(), 2);
    }

    #[test]
    fn test_unlink_removes_child_and_member() {
        let mut graph = Graph::new();
        let unit = graph.add(name("main.cpp"), NodeKind::TranslationUnit, None, None);
        let record = graph.add(name("Shape"), NodeKind::Record(RecordDeclaration::default()), None, None);
        let field = graph.add(name("area"), NodeKind::Field { record: Some(record) }, None, None);
        graph.add_child(unit, record);
        graph.record_mut(record).unwrap().fields.push(field);

        graph.unlink(field);
        graph.unlink(record);
        assert!(graph.record(record).unwrap().fields.is_empty());
        assert!(graph.get(unit).unwrap().children.is_empty());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_stats() {
        let mut graph = Graph::new();
        let var = graph.add(name("x"), NodeKind::Variable { initializer: None }, None, None);
        graph.add(name("x"), NodeKind::Reference { refers_to: Some(var) }, None, None);
        graph.add(name("f"), NodeKind::Call { arguments: vec![], base: None, invokes: vec![] }, None, None);

        let stats = graph.stats();
        assert_eq!(stats.declarations, 1);
        assert_eq!(stats.expressions, 2);
        assert_eq!(stats.resolved_expressions, 1);
        assert!(stats.to_string().contains("Expressions: 2 (resolved: 1)"));
    }
}
