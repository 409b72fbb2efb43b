//! Common supertype computation
//!
//! Inputs are unwrapped in lockstep (references first, then pointer levels),
//! the roots are mapped to record bindings, and the least common ancestor
//! of the bindings is wrapped back into the recorded pointer structure.
//! When no record ancestry exists, the built-in hierarchy table of the
//! inputs' language is used the same way.

use super::registry::TypeRegistry;
use super::ty::{PointerOrigin, Type, TypeId, TypeKind, WrapKind};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Wrapper structure stripped from all inputs
#[derive(Debug, Clone, Default)]
struct WrapState {
    reference: bool,
    origins: Vec<PointerOrigin>,
}

impl TypeRegistry {
    /// Closest common supertype of all inputs, or `None` when there is none
    /// or when the inputs disagree in variant or pointer depth.
    pub fn common_type(&mut self, types: &[TypeId]) -> Option<TypeId> {
        let mut unique: Vec<TypeId> = Vec::new();
        for ty in types {
            if !unique.contains(ty) {
                unique.push(*ty);
            }
        }

        let first = *unique.first()?;
        let variant = self.get(first).variant();
        if unique.iter().any(|t| self.get(*t).variant() != variant) {
            debug!("No common type: inputs differ in variant");
            return None;
        }
        if unique.len() == 1 {
            return Some(first);
        }

        let (roots, state) = self.unwrap_all(&unique)?;
        let mut distinct: Vec<TypeId> = Vec::new();
        for root in roots {
            if !distinct.contains(&root) {
                distinct.push(root);
            }
        }
        if let [only] = distinct.as_slice() {
            return Some(self.wrap(*only, &state));
        }

        let language = self.get(distinct[0]).language.clone();
        let names: Vec<String> = distinct
            .iter()
            .filter_map(|t| match &self.get(*t).kind {
                TypeKind::Object { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();

        let ancestor = self
            .record_ancestor(&names)
            .or_else(|| self.builtin_ancestor(&names, language.as_deref()))?;

        let root = self.intern(Type::object(ancestor).with_language(language.as_deref()));
        Some(self.wrap(root, &state))
    }

    /// Whether a value of type `sub` may be used where `sup` is expected
    pub fn is_supertype_of(&mut self, sup: TypeId, sub: TypeId) -> bool {
        if sup == sub {
            return true;
        }
        if self.is_unknown(sup) && self.is_unknown(sub) {
            return true;
        }
        if self.reference_depth(sup) != self.reference_depth(sub) {
            return false;
        }

        let sup_kind = self.get(sup).kind.clone();
        let sub_kind = self.get(sub).kind.clone();

        // arrays and pointers of the same element name are interchangeable
        if matches!(sup_kind, TypeKind::Pointer { .. })
            && matches!(sub_kind, TypeKind::Pointer { .. })
            && self.root_name(sup) == self.root_name(sub)
        {
            return true;
        }
        if let TypeKind::Reference { element } = sup_kind {
            return self.is_supertype_of(element, sub);
        }
        if let TypeKind::Reference { element } = sub_kind {
            return self.is_supertype_of(sup, element);
        }

        let plain_sup = self.unqualified(sup);
        let plain_sub = self.unqualified(sub);
        if plain_sup == plain_sub {
            return true;
        }

        match self.common_type(&[plain_sup, plain_sub]) {
            Some(common) => {
                let common = self.unqualified(common);
                common == plain_sup || self.same_record(common, plain_sup)
            }
            None => false,
        }
    }

    /// Both roots name the same record binding, e.g. `Base` and `ns::Base`
    fn same_record(&self, a: TypeId, b: TypeId) -> bool {
        match (self.bound_record_name(a), self.bound_record_name(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn bound_record_name(&self, id: TypeId) -> Option<&str> {
        let name = self.base_name(self.root(id))?;
        self.record_binding(name).map(|b| b.name.as_str())
    }

    fn unwrap_all(&self, types: &[TypeId]) -> Option<(Vec<TypeId>, WrapState)> {
        let mut state = WrapState::default();
        let mut current: Vec<TypeId> = types.to_vec();

        if matches!(self.get(current[0]).kind, TypeKind::Reference { .. }) {
            let reference = current[0];
            if current.iter().any(|t| !self.is_similar(reference, *t)) {
                debug!("No common type: references are not similar");
                return None;
            }
            state.reference = true;
            current = current
                .iter()
                .map(|t| self.get(*t).element().unwrap_or(*t))
                .collect();
        }

        let depth = self.reference_depth(current[0]);
        if current.iter().any(|t| self.reference_depth(*t) != depth) {
            debug!("No common type: pointer depth differs");
            return None;
        }
        state.origins = self.pointer_origins(current[0]);

        Some((current.iter().map(|t| self.root(*t)).collect(), state))
    }

    fn wrap(&mut self, root: TypeId, state: &WrapState) -> TypeId {
        let mut ty = root;
        for origin in state.origins.iter().rev() {
            let wrap = match origin {
                PointerOrigin::Pointer => WrapKind::Pointer,
                PointerOrigin::Array => WrapKind::Array,
            };
            ty = self.reference(ty, wrap);
        }
        if state.reference {
            ty = self.reference(ty, WrapKind::Reference);
        }
        ty
    }

    /// Ancestor search over record bindings only. Inputs and supertypes
    /// without a binding are dropped.
    fn record_ancestor(&self, names: &[String]) -> Option<String> {
        let records: Vec<String> = names
            .iter()
            .filter_map(|n| self.record_binding(n).map(|b| b.name.clone()))
            .collect();
        if records.is_empty() {
            return None;
        }

        lowest_common_ancestor(&records, |name| {
            self.record_binding(name)
                .map(|b| {
                    b.super_types
                        .iter()
                        .filter_map(|s| self.record_binding(s).map(|r| r.name.clone()))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Ancestor search over record bindings and the language's built-in table
    fn builtin_ancestor(&self, names: &[String], language: Option<&str>) -> Option<String> {
        let known: Vec<String> = names
            .iter()
            .filter(|n| {
                self.record_binding(n).is_some() || self.builtin_supertypes(language, n).is_some()
            })
            .cloned()
            .collect();
        if known.is_empty() {
            return None;
        }

        let is_known =
            |name: &str| self.record_binding(name).is_some() || self.builtin_supertypes(language, name).is_some();
        lowest_common_ancestor(&known, |name| {
            let supers = match self.record_binding(name) {
                Some(binding) => binding.super_types.clone(),
                None => self
                    .builtin_supertypes(language, name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default(),
            };
            supers.into_iter().filter(|s| is_known(s)).collect()
        })
    }
}

/// Minimum distance from `start` to every ancestor, `start` included
fn ancestor_distances(start: &str, supers: &impl Fn(&str) -> Vec<String>) -> HashMap<String, usize> {
    let mut distances = HashMap::new();
    let mut queue = VecDeque::new();
    distances.insert(start.to_string(), 0usize);
    queue.push_back(start.to_string());

    while let Some(name) = queue.pop_front() {
        let depth = distances.get(&name).copied().unwrap_or(0);
        for parent in supers(&name) {
            if !distances.contains_key(&parent) {
                distances.insert(parent.clone(), depth + 1);
                queue.push_back(parent);
            }
        }
    }
    distances
}

/// Depths are normalised to "distance from the farthest ancestor" so that
/// hierarchy roots sit at 0. The common ancestor with the greatest depth
/// wins; ties go to the lexicographically smallest name.
fn lowest_common_ancestor(names: &[String], supers: impl Fn(&str) -> Vec<String>) -> Option<String> {
    let mut common: Option<HashMap<String, usize>> = None;

    for name in names {
        let distances = ancestor_distances(name, &supers);
        let farthest = distances.values().copied().max().unwrap_or(0);
        let normalized: HashMap<String, usize> = distances
            .into_iter()
            .map(|(ancestor, d)| (ancestor, farthest - d))
            .collect();

        common = Some(match common {
            None => normalized,
            Some(previous) => previous
                .into_iter()
                .filter_map(|(ancestor, d)| normalized.get(&ancestor).map(|other| (ancestor, d.max(*other))))
                .collect(),
        });
    }

    common?
        .into_iter()
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(name, _)| name)
}
