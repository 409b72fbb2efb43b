//! Type propagation
//!
//! Every typed node owns a current type and a set of possible subtypes.
//! A node may depend on another node's type through a listener edge; when
//! the source type changes, the change is pushed along the edges. Edges
//! are stored here as an adjacency map, not on the nodes.
//!
//! Cycles in the dependency graph are cut by the `visited` set handed
//! through each propagation call: a node already in the set is not
//! updated again by the same propagation.

use crate::graph::NodeId;
use crate::types::{TypeId, TypeKind, TypeRegistry, WrapKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How a listener derives its type from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    /// Same type as the source (reference -> declaration)
    Mirror,
    /// Return type of a function source (call -> invoked function)
    ReturnType,
    /// Source type with one level removed (`*p`)
    Dereference,
    /// Pointer to the source type (`&x`)
    AddressOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Listener {
    pub target: NodeId,
    pub kind: ListenerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeState {
    pub ty: TypeId,
    pub possible_subtypes: Vec<TypeId>,
}

/// Type state of all nodes plus the listener edges between them
#[derive(Debug, Clone, Default)]
pub struct TypePropagation {
    states: HashMap<NodeId, TypeState>,
    /// Source -> listeners
    listeners: HashMap<NodeId, Vec<Listener>>,
}

impl TypePropagation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_type(&self, node: NodeId) -> Option<TypeId> {
        self.states.get(&node).map(|s| s.ty)
    }

    pub fn possible_subtypes(&self, node: NodeId) -> &[TypeId] {
        self.states
            .get(&node)
            .map(|s| s.possible_subtypes.as_slice())
            .unwrap_or(&[])
    }

    pub fn listeners(&self, source: NodeId) -> &[Listener] {
        self.listeners.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merge `new_type` into the node's type.
    ///
    /// No-op for the unknown type or a node already in `visited`. The node
    /// type becomes the common type of its possible subtypes; listeners are
    /// notified only if it changed.
    pub fn set_type(&mut self, types: &mut TypeRegistry, node: NodeId, new_type: TypeId, visited: &HashSet<NodeId>) {
        if types.is_unknown(new_type) || visited.contains(&node) {
            return;
        }

        let old = self.states.get(&node).cloned();
        let mut new_type = new_type;
        if let Some(old) = &old {
            let old_is_function = matches!(types.get(old.ty).kind, TypeKind::FunctionPointer { .. });
            let new_is_function = matches!(types.get(new_type).kind, TypeKind::FunctionPointer { .. });
            if old_is_function && !new_is_function {
                return;
            }
            let qualifier = types.get(old.ty).qualifier;
            new_type = types.merge_qualifier(new_type, qualifier);
        }

        let mut subtypes: Vec<TypeId> = old
            .as_ref()
            .map(|s| s.possible_subtypes.clone())
            .unwrap_or_default();
        subtypes.retain(|s| !types.is_similar(*s, new_type));
        subtypes.push(new_type);

        let ty = types.common_type(&subtypes).unwrap_or(new_type);
        subtypes.retain(|s| types.is_supertype_of(ty, *s));
        if subtypes.is_empty() {
            subtypes.push(ty);
        }

        let old_type = old.as_ref().map(|s| s.ty);
        self.states.insert(
            node,
            TypeState {
                ty,
                possible_subtypes: subtypes,
            },
        );

        if old_type == Some(ty) {
            return;
        }
        debug!("Type of {} changed to {}", node, types.type_name(ty));

        let mut next = visited.clone();
        next.insert(node);
        for listener in self.listeners(node).to_vec() {
            if listener.target != node {
                self.notify(types, node, listener, &next);
            }
        }
    }

    /// Replace the possible subtypes of a node, notifying mirror listeners on change
    pub fn set_possible_subtypes(
        &mut self,
        types: &mut TypeRegistry,
        node: NodeId,
        subtypes: Vec<TypeId>,
        visited: &HashSet<NodeId>,
    ) {
        let subtypes: Vec<TypeId> = subtypes.into_iter().filter(|t| !types.is_unknown(*t)).collect();
        if visited.contains(&node) || subtypes.is_empty() {
            return;
        }

        let current = self.possible_subtypes(node);
        if subtypes.iter().all(|t| types.get(*t).is_primitive()) && !current.is_empty() {
            return;
        }
        if current == subtypes.as_slice() {
            return;
        }

        match self.states.get_mut(&node) {
            Some(state) => state.possible_subtypes = subtypes.clone(),
            None => {
                let ty = types.common_type(&subtypes).unwrap_or(subtypes[0]);
                self.states.insert(
                    node,
                    TypeState {
                        ty,
                        possible_subtypes: subtypes.clone(),
                    },
                );
            }
        }

        let mut next = visited.clone();
        next.insert(node);
        for listener in self.listeners(node).to_vec() {
            if listener.target == node || listener.kind != ListenerKind::Mirror {
                continue;
            }
            let merged = self.merged_subtypes(listener.target, &subtypes);
            self.set_possible_subtypes(types, listener.target, merged, &next);
        }
    }

    /// Subtypes of `node` extended by `incoming`, order kept
    fn merged_subtypes(&self, node: NodeId, incoming: &[TypeId]) -> Vec<TypeId> {
        let mut merged = self.possible_subtypes(node).to_vec();
        for t in incoming {
            if !merged.contains(t) {
                merged.push(*t);
            }
        }
        merged
    }

    fn notify(&mut self, types: &mut TypeRegistry, source: NodeId, listener: Listener, visited: &HashSet<NodeId>) {
        let Some(ty) = self.get_type(source) else {
            return;
        };

        match listener.kind {
            ListenerKind::Mirror => {
                self.set_type(types, listener.target, ty, visited);
                let merged = self.merged_subtypes(listener.target, self.possible_subtypes(source));
                self.set_possible_subtypes(types, listener.target, merged, visited);
            }
            ListenerKind::ReturnType => {
                let returned = match &types.get(ty).kind {
                    TypeKind::FunctionPointer { return_type, .. } => *return_type,
                    _ => ty,
                };
                self.set_type(types, listener.target, returned, visited);
            }
            ListenerKind::Dereference => {
                let element = types.dereference(ty);
                self.set_type(types, listener.target, element, visited);
            }
            ListenerKind::AddressOf => {
                let pointer = types.reference(ty, WrapKind::Pointer);
                self.set_type(types, listener.target, pointer, visited);
            }
        }
    }

    /// Make `target` depend on `source`. The target is updated right away
    /// when the source already has a type.
    pub fn register_listener(&mut self, types: &mut TypeRegistry, source: NodeId, target: NodeId, kind: ListenerKind) {
        let listener = Listener { target, kind };
        let edges = self.listeners.entry(source).or_default();
        if edges.contains(&listener) {
            return;
        }
        edges.push(listener);

        if source != target && self.states.contains_key(&source) {
            self.notify(types, source, listener, &HashSet::new());
        }
    }

    /// Remove the edges from `source` to `target`
    pub fn unregister_listener(&mut self, source: NodeId, target: NodeId) {
        if let Some(edges) = self.listeners.get_mut(&source) {
            edges.retain(|l| l.target != target);
        }
    }

    /// Remove every edge into `target`, e.g. when a call's targets change
    pub fn detach(&mut self, target: NodeId) {
        for edges in self.listeners.values_mut() {
            edges.retain(|l| l.target != target);
        }
    }

    /// Remove every edge into and out of `node`
    pub fn isolate(&mut self, node: NodeId) {
        self.detach(node);
        self.listeners.remove(&node);
    }

    /// Forget the type of a node so it can be recomputed from scratch
    pub fn reset_type(&mut self, node: NodeId) {
        self.states.remove(&node);
    }

    pub(crate) fn absorb(&mut self, other: TypePropagation, nodes: impl Fn(NodeId) -> NodeId, types: impl Fn(TypeId) -> TypeId) {
        for (node, state) in other.states {
            self.states.insert(
                nodes(node),
                TypeState {
                    ty: types(state.ty),
                    possible_subtypes: state.possible_subtypes.into_iter().map(&types).collect(),
                },
            );
        }
        for (source, edges) in other.listeners {
            let target = self.listeners.entry(nodes(source)).or_default();
            for edge in edges {
                let edge = Listener {
                    target: nodes(edge.target),
                    kind: edge.kind,
                };
                if !target.contains(&edge) {
                    target.push(edge);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Modifier, RecordBinding, Type};

    fn setup() -> (TypeRegistry, TypeId, TypeId, TypeId) {
        let mut types = TypeRegistry::new();
        types.register_record(RecordBinding::new("Base", None));
        types.register_record(RecordBinding::new("Derived", None).with_super_types(vec!["Base".into()]));
        let base = types.intern(Type::object("Base"));
        let derived = types.intern(Type::object("Derived"));
        let int = types.intern(Type::primitive("int", Modifier::Signed));
        (types, base, derived, int)
    }

    #[test]
    fn test_set_type_ignores_unknown() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let unknown = types.unknown(None);

        propagation.set_type(&mut types, NodeId(1), int, &HashSet::new());
        propagation.set_type(&mut types, NodeId(1), unknown, &HashSet::new());
        assert_eq!(propagation.get_type(NodeId(1)), Some(int));
    }

    #[test]
    fn test_subtypes_collapse_to_common_type() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();

        propagation.set_type(&mut types, NodeId(1), derived, &HashSet::new());
        propagation.set_type(&mut types, NodeId(1), base, &HashSet::new());

        assert_eq!(propagation.get_type(NodeId(1)), Some(base));
        assert_eq!(propagation.possible_subtypes(NodeId(1)), &[derived, base]);
    }

    #[test]
    fn test_listener_mirrors_source() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let (decl, reference) = (NodeId(1), NodeId(2));

        propagation.set_type(&mut types, decl, int, &HashSet::new());
        propagation.register_listener(&mut types, decl, reference, ListenerKind::Mirror);
        assert_eq!(propagation.get_type(reference), Some(int));

        let ptr = types.reference(int, WrapKind::Pointer);
        propagation.reset_type(decl);
        propagation.set_type(&mut types, decl, ptr, &HashSet::new());
        // same root name, so the old int entry is replaced
        assert_eq!(propagation.get_type(reference), Some(ptr));
    }

    #[test]
    fn test_mirror_keeps_own_subtypes() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();
        let (decl, reference) = (NodeId(1), NodeId(2));

        propagation.set_type(&mut types, reference, base, &HashSet::new());
        propagation.set_type(&mut types, decl, derived, &HashSet::new());
        propagation.register_listener(&mut types, decl, reference, ListenerKind::Mirror);

        assert_eq!(propagation.get_type(reference), Some(base));
        let subtypes = propagation.possible_subtypes(reference);
        assert!(subtypes.contains(&base));
        assert!(subtypes.contains(&derived));
    }

    #[test]
    fn test_possible_subtypes_reach_mirrors() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();
        let (a, b) = (NodeId(1), NodeId(2));

        propagation.set_type(&mut types, a, base, &HashSet::new());
        propagation.register_listener(&mut types, a, b, ListenerKind::Mirror);
        assert_eq!(propagation.possible_subtypes(b), &[base]);

        propagation.set_possible_subtypes(&mut types, a, vec![base, derived], &HashSet::new());
        assert_eq!(propagation.possible_subtypes(a), &[base, derived]);
        assert_eq!(propagation.possible_subtypes(b), &[base, derived]);
    }

    #[test]
    fn test_equal_subtypes_do_not_notify() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();
        let (a, b) = (NodeId(1), NodeId(2));

        propagation.set_possible_subtypes(&mut types, a, vec![base, derived], &HashSet::new());
        propagation.register_listener(&mut types, a, b, ListenerKind::Mirror);
        assert_eq!(propagation.possible_subtypes(b), &[base, derived]);

        // narrow b directly; b has no listeners of its own
        propagation.set_possible_subtypes(&mut types, b, vec![base], &HashSet::new());
        propagation.set_possible_subtypes(&mut types, a, vec![base, derived], &HashSet::new());
        assert_eq!(propagation.possible_subtypes(b), &[base]);
    }

    #[test]
    fn test_primitive_subtypes_do_not_replace_existing() {
        let (mut types, base, _, int) = setup();
        let mut propagation = TypePropagation::new();

        propagation.set_type(&mut types, NodeId(1), base, &HashSet::new());
        propagation.set_possible_subtypes(&mut types, NodeId(1), vec![int], &HashSet::new());
        assert_eq!(propagation.possible_subtypes(NodeId(1)), &[base]);

        propagation.set_possible_subtypes(&mut types, NodeId(2), vec![int], &HashSet::new());
        assert_eq!(propagation.possible_subtypes(NodeId(2)), &[int]);
        assert_eq!(propagation.get_type(NodeId(2)), Some(int));
    }

    #[test]
    fn test_possible_subtypes_cycle_terminates() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();
        let (a, b) = (NodeId(1), NodeId(2));

        propagation.register_listener(&mut types, a, b, ListenerKind::Mirror);
        propagation.register_listener(&mut types, b, a, ListenerKind::Mirror);
        propagation.set_possible_subtypes(&mut types, a, vec![base, derived], &HashSet::new());

        assert_eq!(propagation.possible_subtypes(a), &[base, derived]);
        assert_eq!(propagation.possible_subtypes(b), &[base, derived]);

        let mut visited = HashSet::new();
        visited.insert(a);
        propagation.set_possible_subtypes(&mut types, a, vec![derived], &visited);
        assert_eq!(propagation.possible_subtypes(a), &[base, derived]);
    }

    #[test]
    fn test_cycle_terminates() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let (a, b) = (NodeId(1), NodeId(2));

        propagation.register_listener(&mut types, a, b, ListenerKind::Mirror);
        propagation.register_listener(&mut types, b, a, ListenerKind::AddressOf);
        propagation.set_type(&mut types, a, int, &HashSet::new());

        assert_eq!(propagation.get_type(a), Some(int));
        assert_eq!(propagation.get_type(b), Some(int));
    }

    #[test]
    fn test_derived_listeners() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let void = types.intern(Type::incomplete("void"));
        let function = types.intern(Type::function_pointer(vec![int], void));
        let (f, call, x, addr, deref) = (NodeId(1), NodeId(2), NodeId(3), NodeId(4), NodeId(5));

        propagation.set_type(&mut types, f, function, &HashSet::new());
        propagation.register_listener(&mut types, f, call, ListenerKind::ReturnType);
        assert_eq!(propagation.get_type(call), Some(void));

        propagation.set_type(&mut types, x, int, &HashSet::new());
        propagation.register_listener(&mut types, x, addr, ListenerKind::AddressOf);
        propagation.register_listener(&mut types, addr, deref, ListenerKind::Dereference);
        let ptr = types.reference(int, WrapKind::Pointer);
        assert_eq!(propagation.get_type(addr), Some(ptr));
        assert_eq!(propagation.get_type(deref), Some(int));
    }

    #[test]
    fn test_function_type_is_not_downgraded() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let function = types.intern(Type::function_pointer(vec![], int));

        propagation.set_type(&mut types, NodeId(1), function, &HashSet::new());
        propagation.set_type(&mut types, NodeId(1), int, &HashSet::new());
        assert_eq!(propagation.get_type(NodeId(1)), Some(function));
    }

    #[test]
    fn test_isolate_drops_both_directions() {
        let (mut types, _, _, int) = setup();
        let mut propagation = TypePropagation::new();
        let (a, b, c) = (NodeId(1), NodeId(2), NodeId(3));

        propagation.register_listener(&mut types, a, b, ListenerKind::Mirror);
        propagation.register_listener(&mut types, b, c, ListenerKind::Mirror);
        propagation.isolate(b);
        assert!(propagation.listeners(a).is_empty());
        assert!(propagation.listeners(b).is_empty());

        propagation.set_type(&mut types, a, int, &HashSet::new());
        assert_eq!(propagation.get_type(b), None);
        assert_eq!(propagation.get_type(c), None);
    }

    #[test]
    fn test_unregister_and_detach() {
        let (mut types, base, derived, _) = setup();
        let mut propagation = TypePropagation::new();

        propagation.register_listener(&mut types, NodeId(1), NodeId(2), ListenerKind::Mirror);
        propagation.register_listener(&mut types, NodeId(3), NodeId(2), ListenerKind::Mirror);
        propagation.unregister_listener(NodeId(1), NodeId(2));
        assert!(propagation.listeners(NodeId(1)).is_empty());

        propagation.detach(NodeId(2));
        assert!(propagation.listeners(NodeId(3)).is_empty());

        propagation.set_type(&mut types, NodeId(3), derived, &HashSet::new());
        propagation.set_type(&mut types, NodeId(1), base, &HashSet::new());
        assert_eq!(propagation.get_type(NodeId(2)), None);
    }
}
