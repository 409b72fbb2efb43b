//! Type registry
//!
//! Interns types for one analysis session and keeps the record and
//! type-parameter bindings needed by common-type computation and the
//! parser.

use super::ty::{PointerOrigin, Provenance, Qualifier, Storage, Type, TypeId, TypeKind, WrapKind};
use crate::graph::NodeId;
use crate::language::Language;
use crate::name::Name;
use crate::scope::{ScopeId, ScopeTree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

static UNKNOWN_TYPE: Type = Type::UNKNOWN;

/// Record name -> direct supertype names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBinding {
    /// Qualified record name
    pub name: String,
    /// Declaring node, if the record is part of the graph
    pub record: Option<NodeId>,
    pub super_types: Vec<String>,
    pub language: Option<String>,
}

impl RecordBinding {
    pub fn new(name: impl Into<String>, record: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            record,
            super_types: Vec::new(),
            language: None,
        }
    }

    pub fn with_super_types(mut self, super_types: Vec<String>) -> Self {
        self.super_types = super_types;
        self
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }
}

/// Interning registry. One per session.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<Type>,
    index: HashMap<Type, TypeId>,
    first_order: HashSet<TypeId>,
    second_order: HashSet<TypeId>,
    provenance: HashMap<TypeId, Provenance>,
    records: BTreeMap<String, RecordBinding>,
    /// Local record name -> qualified names
    records_by_local: HashMap<String, Vec<String>>,
    type_parameters: HashMap<NodeId, Vec<TypeId>>,
    /// Language name -> built-in hierarchy
    builtins: HashMap<String, BTreeMap<String, Vec<String>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical id for `ty`, registering it on first sight
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.index.get(&ty) {
            return *id;
        }

        let id = TypeId(self.types.len() as u32);
        if ty.is_first_order() {
            self.first_order.insert(id);
        } else {
            self.second_order.insert(id);
        }

        let provenance = match &ty.kind {
            TypeKind::Object { primitive: true, .. } | TypeKind::Incomplete { .. } => Provenance::Resolved,
            TypeKind::Object { name, .. } if self.record_binding(name).is_some() => Provenance::Resolved,
            _ => Provenance::Unresolved,
        };
        self.provenance.insert(id, provenance);

        self.index.insert(ty.clone(), id);
        self.types.push(ty);
        id
    }

    /// Look up a type without registering it
    pub fn find(&self, ty: &Type) -> Option<TypeId> {
        self.index.get(ty).copied()
    }

    /// Get a type. Ids from another registry resolve to the unknown sentinel.
    pub fn get(&self, id: TypeId) -> &Type {
        self.types.get(id.0 as usize).unwrap_or(&UNKNOWN_TYPE)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        (id.0 as usize) < self.types.len()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    pub fn first_order_types(&self) -> &HashSet<TypeId> {
        &self.first_order
    }

    pub fn second_order_types(&self) -> &HashSet<TypeId> {
        &self.second_order
    }

    pub fn provenance(&self, id: TypeId) -> Provenance {
        self.provenance.get(&id).copied().unwrap_or_default()
    }

    pub fn set_provenance(&mut self, id: TypeId, provenance: Provenance) {
        if self.contains(id) {
            self.provenance.insert(id, provenance);
        }
    }

    /// The unknown sentinel of a language
    pub fn unknown(&mut self, language: Option<&str>) -> TypeId {
        self.intern(Type::unknown().with_language(language))
    }

    pub fn is_unknown(&self, id: TypeId) -> bool {
        self.get(id).is_unknown()
    }

    /// Wrap a type in one pointer, array or reference level
    pub fn reference(&mut self, id: TypeId, wrap: WrapKind) -> TypeId {
        let language = self.get(id).language.clone();
        let mut ty = match wrap {
            WrapKind::Pointer => Type::pointer(id, PointerOrigin::Pointer),
            WrapKind::Array => Type::pointer(id, PointerOrigin::Array),
            WrapKind::Reference => Type::reference(id),
        };
        ty.language = language;
        self.intern(ty)
    }

    /// Unwrap one level. Object-like types carry no element information and
    /// dereference to unknown; function pointers dereference to themselves.
    pub fn dereference(&mut self, id: TypeId) -> TypeId {
        let ty = self.get(id);
        match &ty.kind {
            TypeKind::Pointer { element, .. } | TypeKind::Reference { element } => *element,
            TypeKind::FunctionPointer { .. } | TypeKind::Unknown => id,
            _ => {
                let language = ty.language.clone();
                self.unknown(language.as_deref())
            }
        }
    }

    /// Innermost wrapped type
    pub fn root(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(element) = self.get(current).element() {
            current = element;
        }
        current
    }

    /// Number of pointer/array levels. References are transparent.
    pub fn reference_depth(&self, id: TypeId) -> usize {
        match &self.get(id).kind {
            TypeKind::Pointer { element, .. } => 1 + self.reference_depth(*element),
            TypeKind::Reference { element } => self.reference_depth(*element),
            _ => 0,
        }
    }

    /// Pointer origins from the outermost level inwards
    pub fn pointer_origins(&self, id: TypeId) -> Vec<PointerOrigin> {
        let mut origins = Vec::new();
        let mut current = id;
        loop {
            match &self.get(current).kind {
                TypeKind::Pointer { element, origin } => {
                    origins.push(*origin);
                    current = *element;
                }
                TypeKind::Reference { element } => current = *element,
                _ => break,
            }
        }
        origins
    }

    /// Textual name of a type, without qualifiers
    pub fn type_name(&self, id: TypeId) -> String {
        match &self.get(id).kind {
            TypeKind::Object { name, generics, .. } => {
                if generics.is_empty() {
                    name.clone()
                } else {
                    let args: Vec<String> = generics.iter().map(|g| self.type_name(*g)).collect();
                    format!("{}<{}>", name, args.join(", "))
                }
            }
            TypeKind::Pointer { element, origin: PointerOrigin::Pointer } => {
                format!("{}*", self.type_name(*element))
            }
            TypeKind::Pointer { element, origin: PointerOrigin::Array } => {
                format!("{}[]", self.type_name(*element))
            }
            TypeKind::Reference { element } => format!("{}&", self.type_name(*element)),
            TypeKind::FunctionPointer { parameters, return_type } => {
                let params: Vec<String> = parameters.iter().map(|p| self.type_name(*p)).collect();
                format!("{}(*)({})", self.type_name(*return_type), params.join(", "))
            }
            TypeKind::Parameterized { name, .. } | TypeKind::Incomplete { name } => name.clone(),
            TypeKind::Unknown => "UNKNOWN".to_string(),
        }
    }

    /// Name with storage and qualifiers spelled out
    pub fn display(&self, id: TypeId) -> String {
        let ty = self.get(id);
        let mut words: Vec<String> = Vec::new();
        if ty.storage != Storage::Auto {
            words.push(ty.storage.to_string());
        }
        words.extend(ty.qualifier.keywords().into_iter().map(str::to_string));
        words.push(self.type_name(id));
        words.join(" ")
    }

    /// Base name of a root type, without generics
    pub fn base_name(&self, id: TypeId) -> Option<&str> {
        match &self.get(id).kind {
            TypeKind::Object { name, .. }
            | TypeKind::Parameterized { name, .. }
            | TypeKind::Incomplete { name } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn root_name(&self, id: TypeId) -> String {
        self.type_name(self.root(id))
    }

    /// Loose equality used when merging subtype sets: equal, or same root name
    pub fn is_similar(&self, a: TypeId, b: TypeId) -> bool {
        a == b || self.root_name(a) == self.root_name(b)
    }

    /// Detached copy for editing before re-interning
    pub fn duplicate(&self, id: TypeId) -> Type {
        self.get(id).duplicate()
    }

    pub fn with_qualifier(&mut self, id: TypeId, qualifier: Qualifier) -> TypeId {
        let ty = self.duplicate(id).with_qualifier(qualifier);
        self.intern(ty)
    }

    /// Add qualifiers on top of the existing ones
    pub fn merge_qualifier(&mut self, id: TypeId, qualifier: Qualifier) -> TypeId {
        let merged = self.get(id).qualifier.merge(qualifier);
        self.with_qualifier(id, merged)
    }

    pub fn with_storage(&mut self, id: TypeId, storage: Storage) -> TypeId {
        let ty = self.duplicate(id).with_storage(storage);
        self.intern(ty)
    }

    /// Same chain with all qualifiers and storage classes removed
    pub fn unqualified(&mut self, id: TypeId) -> TypeId {
        let mut ty = self.duplicate(id);
        ty.qualifier = Qualifier::NONE;
        ty.storage = Storage::Auto;
        ty.kind = match ty.kind {
            TypeKind::Pointer { element, origin } => TypeKind::Pointer {
                element: self.unqualified(element),
                origin,
            },
            TypeKind::Reference { element } => TypeKind::Reference {
                element: self.unqualified(element),
            },
            TypeKind::Object { name, generics, modifier, primitive } => TypeKind::Object {
                name,
                generics: generics.into_iter().map(|g| self.unqualified(g)).collect(),
                modifier,
                primitive,
            },
            TypeKind::FunctionPointer { parameters, return_type } => TypeKind::FunctionPointer {
                parameters: parameters.into_iter().map(|p| self.unqualified(p)).collect(),
                return_type: self.unqualified(return_type),
            },
            other => other,
        };
        self.intern(ty)
    }

    /// Replace the root of `chain` with `new_root`, keeping every wrapper of
    /// `chain` layered on top. Use-site generics and qualifiers carry over
    /// to an object root.
    pub fn rewrap(&mut self, chain: TypeId, new_root: TypeId) -> TypeId {
        let old = self.duplicate(chain);
        match old.kind {
            TypeKind::Pointer { element, origin } => {
                let inner = self.rewrap(element, new_root);
                let ty = Type {
                    kind: TypeKind::Pointer { element: inner, origin },
                    ..old
                };
                self.intern(ty)
            }
            TypeKind::Reference { element } => {
                let inner = self.rewrap(element, new_root);
                let ty = Type {
                    kind: TypeKind::Reference { element: inner },
                    ..old
                };
                self.intern(ty)
            }
            old_kind => {
                let mut root = self.duplicate(new_root);
                if let (
                    TypeKind::Object { generics: use_site, .. },
                    TypeKind::Object { generics, .. },
                ) = (&old_kind, &mut root.kind)
                {
                    if !use_site.is_empty() {
                        *generics = use_site.clone();
                    }
                }
                root.qualifier = root.qualifier.merge(old.qualifier);
                if old.storage != Storage::Auto {
                    root.storage = old.storage;
                }
                let id = self.intern(root);
                if self.provenance(id) == Provenance::Unresolved {
                    let inherited = self.provenance(chain);
                    self.set_provenance(id, inherited);
                }
                id
            }
        }
    }

    /// Resolve a typedef alias visible from `scope`. Types that are not an
    /// alias come back unchanged.
    pub fn resolve_typedef(&mut self, id: TypeId, scopes: &ScopeTree, scope: ScopeId) -> TypeId {
        let root = self.root(id);
        let Some(name) = self.base_name(root).map(str::to_string) else {
            return id;
        };

        let typedef = scopes.lookup_typedef(scope, |alias| {
            self.base_name(self.root(alias)) == Some(name.as_str())
        });

        match typedef {
            Some(typedef) if typedef.target != id => {
                debug!("Resolved alias {} to {}", name, self.type_name(typedef.target));
                self.rewrap(id, typedef.target)
            }
            _ => id,
        }
    }

    /// Register or replace a record binding
    pub fn register_record(&mut self, binding: RecordBinding) {
        let local = local_part(&binding.name);
        let names = self.records_by_local.entry(local).or_default();
        if !names.contains(&binding.name) {
            names.push(binding.name.clone());
        }

        let bound: Vec<TypeId> = self
            .iter()
            .filter(|(_, ty)| matches!(&ty.kind, TypeKind::Object { name, .. } if *name == binding.name))
            .map(|(id, _)| id)
            .collect();
        for id in bound {
            self.provenance.insert(id, Provenance::Resolved);
        }

        self.records.insert(binding.name.clone(), binding);
    }

    pub fn add_super_type(&mut self, record: &str, super_type: &str) {
        if let Some(binding) = self.records.get_mut(record) {
            if !binding.super_types.iter().any(|s| s == super_type) {
                binding.super_types.push(super_type.to_string());
            }
        }
    }

    /// Find a binding by qualified name, or by local name when that is unambiguous
    pub fn record_binding(&self, name: &str) -> Option<&RecordBinding> {
        if let Some(binding) = self.records.get(name) {
            return Some(binding);
        }
        match self.records_by_local.get(name).map(Vec::as_slice) {
            Some([only]) => self.records.get(only),
            _ => None,
        }
    }

    pub fn record_bindings(&self) -> impl Iterator<Item = &RecordBinding> {
        self.records.values()
    }

    /// Record node a type names, looking through wrappers
    pub fn record_of(&self, id: TypeId) -> Option<NodeId> {
        let root = self.root(id);
        match &self.get(root).kind {
            TypeKind::Object { name, .. } => self.record_binding(name).and_then(|b| b.record),
            _ => None,
        }
    }

    pub fn bind_type_parameters(&mut self, owner: NodeId, parameters: Vec<TypeId>) {
        self.type_parameters.insert(owner, parameters);
    }

    pub fn type_parameters(&self, owner: NodeId) -> &[TypeId] {
        self.type_parameters
            .get(&owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn register_builtin_hierarchy(&mut self, language: &Language) {
        if !language.builtin_hierarchy.is_empty() {
            self.builtins
                .insert(language.name.clone(), language.builtin_hierarchy.clone());
        }
    }

    pub fn builtin_supertypes(&self, language: Option<&str>, name: &str) -> Option<&[String]> {
        self.builtins
            .get(language?)
            .and_then(|table| table.get(name))
            .map(Vec::as_slice)
    }

    /// Copy bindings of another registry into this one. `types` maps the
    /// other registry's ids, `nodes` its node ids.
    pub(crate) fn absorb_bindings(
        &mut self,
        other: &TypeRegistry,
        types: &[TypeId],
        nodes: impl Fn(NodeId) -> NodeId,
    ) {
        for binding in other.records.values() {
            let mut binding = binding.clone();
            binding.record = binding.record.map(&nodes);
            match self.records.get_mut(&binding.name) {
                Some(existing) => {
                    if existing.record.is_none() {
                        existing.record = binding.record;
                    }
                    for super_type in binding.super_types {
                        if !existing.super_types.contains(&super_type) {
                            existing.super_types.push(super_type);
                        }
                    }
                }
                None => self.register_record(binding),
            }
        }

        for (owner, params) in &other.type_parameters {
            let params = params
                .iter()
                .filter_map(|p| types.get(p.0 as usize).copied())
                .collect();
            self.type_parameters.insert(nodes(*owner), params);
        }

        for (language, table) in &other.builtins {
            self.builtins
                .entry(language.clone())
                .or_insert_with(|| table.clone());
        }
    }
}

fn local_part(name: &str) -> String {
    name.parse::<Name>()
        .map(|n| n.local_name().to_string())
        .unwrap_or_else(|_| name.to_string())
}
