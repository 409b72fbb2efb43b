//! Scope tree data structure
//!
//! The tree tracks:
//! - Scope hierarchy (parent/child relationships)
//! - Value and structure declarations per scope
//! - Labels, break and continue targets
//! - Typedef aliases
//! - Qualified names of namespace and record scopes

use crate::graph::{NodeId, NodeKind};
use crate::name::Name;
use crate::types::TypeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, error};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The global scope
    pub fn root() -> Self {
        Self(0)
    }
}

/// The kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Namespace,
    /// Class/struct scope
    Record,
    Function,
    Block,
    Loop,
    Switch,
    Try,
    Template,
    /// Unnamed nested scope of if/catch and similar constructs
    ValueDeclaration,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Namespace => "namespace",
            ScopeKind::Record => "record",
            ScopeKind::Function => "function",
            ScopeKind::Block => "block",
            ScopeKind::Loop => "loop",
            ScopeKind::Switch => "switch",
            ScopeKind::Try => "try",
            ScopeKind::Template => "template",
            ScopeKind::ValueDeclaration => "value_declaration",
        }
    }

    /// Scopes that hold records, namespaces and templates
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ScopeKind::Global | ScopeKind::Namespace | ScopeKind::Record | ScopeKind::Template
        )
    }

    /// Scopes with a running qualified-name prefix
    pub fn is_named(&self) -> bool {
        matches!(self, ScopeKind::Namespace | ScopeKind::Record)
    }

    pub fn is_breakable(&self) -> bool {
        matches!(self, ScopeKind::Loop | ScopeKind::Switch)
    }

    pub fn is_continuable(&self) -> bool {
        matches!(self, ScopeKind::Loop)
    }

    /// Scope kind a node opens, `None` if the node opens no scope
    pub fn for_node(kind: &NodeKind) -> Option<ScopeKind> {
        match kind {
            NodeKind::Namespace => Some(ScopeKind::Namespace),
            NodeKind::Record(_) => Some(ScopeKind::Record),
            NodeKind::Template { .. } => Some(ScopeKind::Template),
            NodeKind::Function(_) => Some(ScopeKind::Function),
            NodeKind::Block => Some(ScopeKind::Block),
            NodeKind::Loop { .. } => Some(ScopeKind::Loop),
            NodeKind::Switch => Some(ScopeKind::Switch),
            NodeKind::Try => Some(ScopeKind::Try),
            NodeKind::If | NodeKind::Catch => Some(ScopeKind::ValueDeclaration),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typedef alias registered in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub alias: TypeId,
    pub target: TypeId,
    pub declaration: Option<NodeId>,
}

/// A single scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// AST node owning this scope; the global scope has none
    pub anchor: Option<NodeId>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Qualified name of namespace and record scopes
    pub name: Option<Name>,
    /// Label -> labeled statement
    pub labels: BTreeMap<String, NodeId>,
    pub value_declarations: Vec<NodeId>,
    pub structure_declarations: Vec<NodeId>,
    pub typedefs: Vec<Typedef>,
    pub breaks: Vec<NodeId>,
    pub continues: Vec<NodeId>,
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, anchor: Option<NodeId>, parent: Option<ScopeId>, name: Option<Name>) -> Self {
        Self {
            id,
            kind,
            anchor,
            parent,
            children: Vec::new(),
            name,
            labels: BTreeMap::new(),
            value_declarations: Vec::new(),
            structure_declarations: Vec::new(),
            typedefs: Vec::new(),
            breaks: Vec::new(),
            continues: Vec::new(),
        }
    }

    /// Value declarations followed by structure declarations
    pub fn declarations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.value_declarations
            .iter()
            .chain(self.structure_declarations.iter())
            .copied()
    }
}

/// Scope tree with a single global root
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    /// Anchor node -> scope
    by_anchor: HashMap<NodeId, ScopeId>,
    /// Qualified name -> namespace or record scope
    by_name: HashMap<String, ScopeId>,
    current: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a tree holding only the global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeId::root(), ScopeKind::Global, None, None, None)],
            by_anchor: HashMap::new(),
            by_name: HashMap::new(),
            current: ScopeId::root(),
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.0 as usize)
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).and_then(|s| s.parent)
    }

    pub fn kind(&self, id: ScopeId) -> Option<ScopeKind> {
        self.scope(id).map(|s| s.kind)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Enter the scope of `anchor`, creating it on first sight.
    ///
    /// Namespaces re-open an existing scope with the same qualified name;
    /// the anchor is rebound but declarations are kept.
    pub fn enter(&mut self, anchor: NodeId, kind: ScopeKind, name: Option<Name>) -> ScopeId {
        if let Some(existing) = self.by_anchor.get(&anchor).copied() {
            debug!("Node {} is already scoped, re-entering scope {}", anchor, existing.0);
            self.current = existing;
            return existing;
        }

        if kind == ScopeKind::Namespace {
            let reopened = name
                .as_ref()
                .and_then(|n| self.by_name.get(&n.to_string()).copied())
                .filter(|id| self.kind(*id) == Some(ScopeKind::Namespace));
            if let Some(id) = reopened {
                debug!("Re-opening namespace scope {}", id.0);
                if let Some(scope) = self.scope_mut(id) {
                    scope.anchor = Some(anchor);
                }
                self.by_anchor.insert(anchor, id);
                self.current = id;
                return id;
            }
        }

        let id = ScopeId(self.scopes.len() as u32);
        if kind.is_named() {
            if let Some(name) = &name {
                self.by_name.insert(name.to_string(), id);
            }
        }
        self.scopes
            .push(Scope::new(id, kind, Some(anchor), Some(self.current), name));
        if let Some(parent) = self.scope_mut(self.current) {
            parent.children.push(id);
        }
        self.by_anchor.insert(anchor, id);
        self.current = id;
        id
    }

    /// Leave the scope of `anchor`, making its parent current. `None` if
    /// the anchor was never scoped.
    pub fn leave(&mut self, anchor: NodeId) -> Option<ScopeId> {
        let Some(scope) = self.by_anchor.get(&anchor).copied() else {
            error!("Cannot leave scope: node {} has no scope", anchor);
            return None;
        };
        self.current = self.parent(scope).unwrap_or_else(ScopeId::root);
        Some(self.current)
    }

    /// Make `scope` current and return the previously current scope
    pub fn jump_to(&mut self, scope: ScopeId) -> ScopeId {
        let previous = self.current;
        if self.scope(scope).is_some() {
            self.current = scope;
        }
        previous
    }

    pub fn lookup_scope(&self, anchor: NodeId) -> Option<ScopeId> {
        self.by_anchor.get(&anchor).copied()
    }

    pub fn lookup_scope_by_name(&self, name: &str) -> Option<ScopeId> {
        self.by_name.get(name).copied()
    }

    /// Scope chain from `scope` up to the global scope
    pub fn scope_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Nearest scope (including `from`) matching a predicate
    pub fn first_enclosing(&self, from: ScopeId, pred: impl Fn(&Scope) -> bool) -> Option<ScopeId> {
        self.scope_chain(from)
            .into_iter()
            .find(|id| self.scope(*id).is_some_and(&pred))
    }

    pub fn add_value_declaration(&mut self, declaration: NodeId) -> ScopeId {
        let current = self.current;
        if let Some(scope) = self.scope_mut(current) {
            scope.value_declarations.push(declaration);
        }
        current
    }

    /// Add to the nearest structural scope
    pub fn add_structure_declaration(&mut self, declaration: NodeId) -> ScopeId {
        let target = self
            .first_enclosing(self.current, |s| s.kind.is_structural())
            .unwrap_or_else(ScopeId::root);
        if let Some(scope) = self.scope_mut(target) {
            scope.structure_declarations.push(declaration);
        }
        target
    }

    /// Add a value declaration to a specific scope
    pub fn add_value_declaration_to(&mut self, scope: ScopeId, declaration: NodeId) {
        if let Some(scope) = self.scope_mut(scope) {
            scope.value_declarations.push(declaration);
        }
    }

    /// Remove a declaration from every scope. Used when a subtree is replaced.
    pub fn remove_declaration(&mut self, declaration: NodeId) -> bool {
        let mut removed = false;
        for scope in &mut self.scopes {
            let before = scope.value_declarations.len() + scope.structure_declarations.len();
            scope.value_declarations.retain(|d| *d != declaration);
            scope.structure_declarations.retain(|d| *d != declaration);
            scope.typedefs.retain(|t| t.declaration != Some(declaration));
            removed |= before != scope.value_declarations.len() + scope.structure_declarations.len();
        }
        removed
    }

    pub fn add_label(&mut self, label: &str, statement: NodeId) {
        let current = self.current;
        if let Some(scope) = self.scope_mut(current) {
            scope.labels.insert(label.to_string(), statement);
        }
    }

    /// Scope owning the statement labelled `label`, searched from the current scope
    fn labelled_scope(&self, label: &str) -> Option<ScopeId> {
        let statement = self
            .scope_chain(self.current)
            .into_iter()
            .find_map(|id| self.scope(id).and_then(|s| s.labels.get(label).copied()))?;
        self.lookup_scope(statement)
    }

    /// Attach a break. Without a label it goes to the nearest breakable scope.
    pub fn add_break(&mut self, node: NodeId, label: Option<&str>) -> Option<ScopeId> {
        let target = match label {
            Some(label) => self.labelled_scope(label),
            None => self.first_enclosing(self.current, |s| s.kind.is_breakable()),
        };
        let Some(target) = target else {
            debug!("No break target for node {}", node);
            return None;
        };
        self.scope_mut(target)?.breaks.push(node);
        Some(target)
    }

    /// Attach a continue. Without a label it goes to the nearest loop.
    pub fn add_continue(&mut self, node: NodeId, label: Option<&str>) -> Option<ScopeId> {
        let target = match label {
            Some(label) => self.labelled_scope(label),
            None => self.first_enclosing(self.current, |s| s.kind.is_continuable()),
        };
        let Some(target) = target else {
            debug!("No continue target for node {}", node);
            return None;
        };
        self.scope_mut(target)?.continues.push(node);
        Some(target)
    }

    pub fn add_typedef(&mut self, typedef: Typedef) {
        let current = self.current;
        if let Some(scope) = self.scope_mut(current) {
            scope.typedefs.push(typedef);
        }
    }

    /// Nearest typedef whose alias satisfies `pred`, searched outward from `at`.
    /// Later typedefs in the same scope shadow earlier ones.
    pub fn lookup_typedef(&self, at: ScopeId, pred: impl Fn(TypeId) -> bool) -> Option<Typedef> {
        self.scope_chain(at).into_iter().find_map(|id| {
            self.scope(id)
                .and_then(|s| s.typedefs.iter().rev().find(|t| pred(t.alias)).copied())
        })
    }

    /// Qualified name of the nearest namespace or record scope
    pub fn current_name_prefix(&self) -> Option<&Name> {
        self.name_prefix(self.current)
    }

    pub fn name_prefix(&self, at: ScopeId) -> Option<&Name> {
        let id = self.first_enclosing(at, |s| s.kind.is_named())?;
        self.scope(id).and_then(|s| s.name.as_ref())
    }

    /// Turn a relative qualified name into an absolute one.
    ///
    /// The first segment of `name` is matched against the segments of the
    /// prefix valid at `at`, innermost first; on a match the prefix up to
    /// that segment is prepended. Otherwise `name` is taken as absolute.
    pub fn resolve_qualified_name(&self, at: ScopeId, name: &Name) -> Name {
        let (Some(prefix), Some(first)) = (self.name_prefix(at), name.segments.first()) else {
            return name.clone();
        };

        match prefix.segments.iter().rposition(|s| s == first) {
            Some(pos) => Name {
                segments: prefix.segments[..pos]
                    .iter()
                    .chain(name.segments.iter())
                    .cloned()
                    .collect(),
                delimiter: name.delimiter.clone(),
            },
            None => name.clone(),
        }
    }

    /// Fold another tree into this one: its global scope merges into ours,
    /// namespaces with the same qualified name are unified, everything else
    /// is appended. Returns the scope id mapping.
    pub(crate) fn absorb(&mut self, other: &ScopeTree, nodes: impl Fn(NodeId) -> NodeId, types: impl Fn(TypeId) -> TypeId) -> Vec<ScopeId> {
        let mut mapping: Vec<ScopeId> = Vec::with_capacity(other.scopes.len());

        for scope in &other.scopes {
            let target = if scope.kind == ScopeKind::Global {
                Some(ScopeId::root())
            } else if scope.kind == ScopeKind::Namespace {
                scope
                    .name
                    .as_ref()
                    .and_then(|n| self.lookup_scope_by_name(&n.to_string()))
                    .filter(|id| self.kind(*id) == Some(ScopeKind::Namespace))
            } else {
                None
            };

            let id = match target {
                Some(id) => id,
                None => {
                    let id = ScopeId(self.scopes.len() as u32);
                    let parent = scope
                        .parent
                        .and_then(|p| mapping.get(p.0 as usize).copied())
                        .unwrap_or_else(ScopeId::root);
                    self.scopes.push(Scope::new(
                        id,
                        scope.kind,
                        scope.anchor.map(&nodes),
                        Some(parent),
                        scope.name.clone(),
                    ));
                    if let Some(parent) = self.scope_mut(parent) {
                        parent.children.push(id);
                    }
                    if scope.kind.is_named() {
                        if let Some(name) = &scope.name {
                            self.by_name.insert(name.to_string(), id);
                        }
                    }
                    id
                }
            };
            mapping.push(id);

            if let Some(anchor) = scope.anchor {
                self.by_anchor.insert(nodes(anchor), id);
            }
            if let Some(merged) = self.scope_mut(id) {
                merged.value_declarations.extend(scope.value_declarations.iter().map(|d| nodes(*d)));
                merged.structure_declarations.extend(scope.structure_declarations.iter().map(|d| nodes(*d)));
                merged.labels.extend(scope.labels.iter().map(|(l, s)| (l.clone(), nodes(*s))));
                merged.breaks.extend(scope.breaks.iter().map(|b| nodes(*b)));
                merged.continues.extend(scope.continues.iter().map(|c| nodes(*c)));
                merged.typedefs.extend(scope.typedefs.iter().map(|t| Typedef {
                    alias: types(t.alias),
                    target: types(t.target),
                    declaration: t.declaration.map(&nodes),
                }));
            }
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(text: &str) -> Option<Name> {
        Some(Name::parse(text, "::"))
    }

    #[test]
    fn test_enter_and_leave() {
        let mut tree = ScopeTree::new();

        let function = tree.enter(NodeId(1), ScopeKind::Function, None);
        let block = tree.enter(NodeId(2), ScopeKind::Block, None);

        assert_eq!(tree.parent(block), Some(function));
        assert_eq!(tree.leave(NodeId(2)), Some(function));
        assert_eq!(tree.current(), function);
        assert_eq!(tree.leave(NodeId(1)), Some(ScopeId::root()));
        assert_eq!(tree.scope(ScopeId::root()).unwrap().children, vec![function]);
    }

    #[test]
    fn test_leave_unscoped_anchor_is_noop() {
        let mut tree = ScopeTree::new();
        let block = tree.enter(NodeId(1), ScopeKind::Block, None);

        assert_eq!(tree.leave(NodeId(42)), None);
        assert_eq!(tree.current(), block);
    }

    #[test]
    fn test_reenter_reuses_scope() {
        let mut tree = ScopeTree::new();
        let first = tree.enter(NodeId(1), ScopeKind::Block, None);
        tree.leave(NodeId(1));

        let again = tree.enter(NodeId(1), ScopeKind::Block, None);
        assert_eq!(first, again);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_namespace_reopens_by_name() {
        let mut tree = ScopeTree::new();

        let first = tree.enter(NodeId(1), ScopeKind::Namespace, ns("a::b"));
        tree.add_value_declaration(NodeId(10));
        tree.leave(NodeId(1));

        let second = tree.enter(NodeId(2), ScopeKind::Namespace, ns("a::b"));
        assert_eq!(first, second);
        assert_eq!(tree.scope(second).unwrap().anchor, Some(NodeId(2)));
        assert_eq!(tree.scope(second).unwrap().value_declarations, vec![NodeId(10)]);
        assert_eq!(tree.lookup_scope(NodeId(1)), Some(first));
    }

    #[test]
    fn test_structure_declarations_go_to_structural_scope() {
        let mut tree = ScopeTree::new();
        let namespace = tree.enter(NodeId(1), ScopeKind::Namespace, ns("n"));
        tree.enter(NodeId(2), ScopeKind::Function, None);
        tree.enter(NodeId(3), ScopeKind::Block, None);

        assert_eq!(tree.add_structure_declaration(NodeId(10)), namespace);
        let block = tree.add_value_declaration(NodeId(11));
        assert_eq!(tree.kind(block), Some(ScopeKind::Block));

        assert!(tree.remove_declaration(NodeId(10)));
        assert!(!tree.remove_declaration(NodeId(10)));
        assert!(tree.scope(namespace).unwrap().structure_declarations.is_empty());
    }

    #[test]
    fn test_template_scope_holds_structure_declarations() {
        let mut tree = ScopeTree::new();
        tree.enter(NodeId(1), ScopeKind::Namespace, ns("n"));
        let template = tree.enter(NodeId(2), ScopeKind::Template, None);

        assert_eq!(tree.add_structure_declaration(NodeId(10)), template);
    }

    #[test]
    fn test_break_and_continue_targets() {
        let mut tree = ScopeTree::new();
        let outer = tree.enter(NodeId(1), ScopeKind::Loop, None);
        tree.add_label("outer", NodeId(1));
        let switch = tree.enter(NodeId(2), ScopeKind::Switch, None);
        tree.enter(NodeId(3), ScopeKind::Block, None);

        assert_eq!(tree.add_break(NodeId(20), None), Some(switch));
        assert_eq!(tree.add_continue(NodeId(21), None), Some(outer));
        assert_eq!(tree.add_break(NodeId(22), Some("outer")), Some(outer));
        assert_eq!(tree.add_break(NodeId(23), Some("missing")), None);
        assert_eq!(tree.scope(outer).unwrap().breaks, vec![NodeId(22)]);
    }

    #[test]
    fn test_typedef_shadowing() {
        let mut tree = ScopeTree::new();
        tree.add_typedef(Typedef { alias: TypeId(1), target: TypeId(2), declaration: None });
        let block = tree.enter(NodeId(1), ScopeKind::Block, None);
        tree.add_typedef(Typedef { alias: TypeId(1), target: TypeId(3), declaration: None });

        let inner = tree.lookup_typedef(block, |a| a == TypeId(1)).unwrap();
        assert_eq!(inner.target, TypeId(3));
        let outer = tree.lookup_typedef(ScopeId::root(), |a| a == TypeId(1)).unwrap();
        assert_eq!(outer.target, TypeId(2));
    }

    #[test]
    fn test_resolve_qualified_name() {
        let mut tree = ScopeTree::new();
        tree.enter(NodeId(1), ScopeKind::Namespace, ns("a"));
        tree.enter(NodeId(2), ScopeKind::Namespace, ns("a::b"));
        let inner = tree.enter(NodeId(3), ScopeKind::Record, ns("a::b::C"));

        let resolve = |text: &str| tree.resolve_qualified_name(inner, &Name::parse(text, "::")).to_string();
        assert_eq!(resolve("b::f"), "a::b::f");
        assert_eq!(resolve("C::g"), "a::b::C::g");
        assert_eq!(resolve("x::y"), "x::y");
        assert_eq!(tree.current_name_prefix().unwrap().to_string(), "a::b::C");
    }

    #[test]
    fn test_absorb_unifies_namespaces() {
        let mut tree = ScopeTree::new();
        let ns_a = tree.enter(NodeId(1), ScopeKind::Namespace, ns("a"));
        tree.add_value_declaration(NodeId(2));
        tree.leave(NodeId(1));

        let mut other = ScopeTree::new();
        other.add_value_declaration(NodeId(0));
        other.enter(NodeId(1), ScopeKind::Namespace, ns("a"));
        other.add_value_declaration(NodeId(2));
        other.enter(NodeId(3), ScopeKind::Block, None);

        let mapping = tree.absorb(&other, |n| NodeId(n.0 + 100), |t| t);

        assert_eq!(mapping[0], ScopeId::root());
        assert_eq!(mapping[1], ns_a);
        assert_eq!(tree.parent(mapping[2]), Some(ns_a));
        assert_eq!(tree.scope(ns_a).unwrap().value_declarations, vec![NodeId(2), NodeId(102)]);
        assert_eq!(tree.scope(ScopeId::root()).unwrap().value_declarations, vec![NodeId(100)]);
        assert_eq!(tree.lookup_scope(NodeId(103)), Some(mapping[2]));
    }
}
