//! Type model
//!
//! A [`Type`] is a value; the [`TypeRegistry`](super::TypeRegistry) interns
//! it and hands out a [`TypeId`]. Wrapper variants refer to their element
//! through an already interned id, so structural equality of two types
//! reduces to equality of their ids.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handle of an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// How a pointer level was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerOrigin {
    #[default]
    Pointer,
    Array,
}

/// Wrapper requested from [`TypeRegistry::reference`](super::TypeRegistry::reference)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapKind {
    Pointer,
    Array,
    Reference,
}

/// Sign modifier of numeric object types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Signed,
    Unsigned,
    #[default]
    NotApplicable,
}

/// Storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    #[default]
    Auto,
    Extern,
    Static,
    Register,
}

impl Storage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Storage::Auto => "auto",
            Storage::Extern => "extern",
            Storage::Static => "static",
            Storage::Register => "register",
        }
    }

    /// Map a storage keyword; keywords without a storage meaning map to `None`
    pub fn from_keyword(word: &str) -> Option<Storage> {
        match word {
            "extern" => Some(Storage::Extern),
            "static" => Some(Storage::Static),
            "register" => Some(Storage::Register),
            "auto" => Some(Storage::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Qualifier set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Qualifier {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
    pub is_atomic: bool,
}

impl Qualifier {
    pub const NONE: Qualifier = Qualifier {
        is_const: false,
        is_volatile: false,
        is_restrict: false,
        is_atomic: false,
    };

    pub fn from_keyword(word: &str) -> Option<Qualifier> {
        let mut q = Qualifier::NONE;
        match word {
            "const" | "final" | "constexpr" => q.is_const = true,
            "volatile" => q.is_volatile = true,
            "restrict" | "__restrict" => q.is_restrict = true,
            "_Atomic" | "atomic" => q.is_atomic = true,
            _ => return None,
        }
        Some(q)
    }

    /// Union of both qualifier sets
    pub fn merge(self, other: Qualifier) -> Qualifier {
        Qualifier {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
            is_restrict: self.is_restrict || other.is_restrict,
            is_atomic: self.is_atomic || other.is_atomic,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Qualifier::NONE
    }

    pub fn keywords(&self) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.is_const {
            words.push("const");
        }
        if self.is_volatile {
            words.push("volatile");
        }
        if self.is_restrict {
            words.push("restrict");
        }
        if self.is_atomic {
            words.push("atomic");
        }
        words
    }
}

/// Where a type assignment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Bound to a declaration or built into the language
    Resolved,
    /// Derived through type propagation
    Dataflow,
    /// Invented for an inferred declaration
    Guessed,
    #[default]
    Unresolved,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Resolved => "resolved",
            Provenance::Dataflow => "dataflow",
            Provenance::Guessed => "guessed",
            Provenance::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of type variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TypeKind {
    /// Named type: record, primitive or library type
    Object {
        name: String,
        generics: Vec<TypeId>,
        modifier: Modifier,
        primitive: bool,
    },
    Pointer {
        element: TypeId,
        origin: PointerOrigin,
    },
    Reference {
        element: TypeId,
    },
    FunctionPointer {
        parameters: Vec<TypeId>,
        return_type: TypeId,
    },
    /// Unbound generic placeholder, scoped to its declaring record or template
    Parameterized {
        name: String,
        owner: Option<NodeId>,
    },
    /// Void-like marker
    Incomplete {
        name: String,
    },
    Unknown,
}

/// Discriminant of [`TypeKind`], used for "same variant" checks and output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeVariant {
    Object,
    Pointer,
    Reference,
    FunctionPointer,
    Parameterized,
    Incomplete,
    Unknown,
}

impl TypeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeVariant::Object => "object",
            TypeVariant::Pointer => "pointer",
            TypeVariant::Reference => "reference",
            TypeVariant::FunctionPointer => "function_pointer",
            TypeVariant::Parameterized => "parameterized",
            TypeVariant::Incomplete => "incomplete",
            TypeVariant::Unknown => "unknown",
        }
    }

    pub fn all() -> &'static [TypeVariant] {
        &[
            TypeVariant::Object,
            TypeVariant::Pointer,
            TypeVariant::Reference,
            TypeVariant::FunctionPointer,
            TypeVariant::Parameterized,
            TypeVariant::Incomplete,
            TypeVariant::Unknown,
        ]
    }
}

impl FromStr for TypeVariant {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "object" | "obj" => Ok(TypeVariant::Object),
            "pointer" | "ptr" => Ok(TypeVariant::Pointer),
            "reference" | "ref" => Ok(TypeVariant::Reference),
            "function_pointer" | "fnptr" => Ok(TypeVariant::FunctionPointer),
            "parameterized" | "generic" => Ok(TypeVariant::Parameterized),
            "incomplete" | "void" => Ok(TypeVariant::Incomplete),
            "unknown" => Ok(TypeVariant::Unknown),
            _ => Err(crate::Error::InvalidKind(format!("Unknown type variant: {}", s))),
        }
    }
}

impl fmt::Display for TypeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A type value. Equality covers the variant payload, qualifiers, storage
/// and the language the type came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub qualifier: Qualifier,
    pub storage: Storage,
    pub language: Option<String>,
}

impl Type {
    /// The language-less unknown sentinel
    pub const UNKNOWN: Type = Type {
        kind: TypeKind::Unknown,
        qualifier: Qualifier::NONE,
        storage: Storage::Auto,
        language: None,
    };

    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            qualifier: Qualifier::NONE,
            storage: Storage::Auto,
            language: None,
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Object {
            name: name.into(),
            generics: Vec::new(),
            modifier: Modifier::NotApplicable,
            primitive: false,
        })
    }

    pub fn primitive(name: impl Into<String>, modifier: Modifier) -> Self {
        Self::new(TypeKind::Object {
            name: name.into(),
            generics: Vec::new(),
            modifier,
            primitive: true,
        })
    }

    pub fn generic(name: impl Into<String>, generics: Vec<TypeId>) -> Self {
        Self::new(TypeKind::Object {
            name: name.into(),
            generics,
            modifier: Modifier::NotApplicable,
            primitive: false,
        })
    }

    pub fn pointer(element: TypeId, origin: PointerOrigin) -> Self {
        Self::new(TypeKind::Pointer { element, origin })
    }

    pub fn reference(element: TypeId) -> Self {
        Self::new(TypeKind::Reference { element })
    }

    pub fn function_pointer(parameters: Vec<TypeId>, return_type: TypeId) -> Self {
        Self::new(TypeKind::FunctionPointer {
            parameters,
            return_type,
        })
    }

    pub fn parameterized(name: impl Into<String>, owner: Option<NodeId>) -> Self {
        Self::new(TypeKind::Parameterized {
            name: name.into(),
            owner,
        })
    }

    pub fn incomplete(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Incomplete { name: name.into() })
    }

    pub fn unknown() -> Self {
        Self::UNKNOWN
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn variant(&self) -> TypeVariant {
        match &self.kind {
            TypeKind::Object { .. } => TypeVariant::Object,
            TypeKind::Pointer { .. } => TypeVariant::Pointer,
            TypeKind::Reference { .. } => TypeVariant::Reference,
            TypeKind::FunctionPointer { .. } => TypeVariant::FunctionPointer,
            TypeKind::Parameterized { .. } => TypeVariant::Parameterized,
            TypeKind::Incomplete { .. } => TypeVariant::Incomplete,
            TypeKind::Unknown => TypeVariant::Unknown,
        }
    }

    /// Root types are everything that does not wrap another type
    pub fn is_first_order(&self) -> bool {
        !matches!(self.kind, TypeKind::Pointer { .. } | TypeKind::Reference { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Object { primitive: true, .. })
    }

    /// Wrapped element of a pointer or reference
    pub fn element(&self) -> Option<TypeId> {
        match &self.kind {
            TypeKind::Pointer { element, .. } | TypeKind::Reference { element } => Some(*element),
            _ => None,
        }
    }

    /// Detached copy. Elements are shared ids, so this copies the whole chain.
    pub fn duplicate(&self) -> Type {
        self.clone()
    }

    /// Copy with every contained id translated, for moving a type between registries
    pub(crate) fn remap(&self, types: impl Fn(TypeId) -> TypeId, nodes: impl Fn(NodeId) -> NodeId) -> Type {
        let kind = match &self.kind {
            TypeKind::Object { name, generics, modifier, primitive } => TypeKind::Object {
                name: name.clone(),
                generics: generics.iter().map(|g| types(*g)).collect(),
                modifier: *modifier,
                primitive: *primitive,
            },
            TypeKind::Pointer { element, origin } => TypeKind::Pointer {
                element: types(*element),
                origin: *origin,
            },
            TypeKind::Reference { element } => TypeKind::Reference {
                element: types(*element),
            },
            TypeKind::FunctionPointer { parameters, return_type } => TypeKind::FunctionPointer {
                parameters: parameters.iter().map(|p| types(*p)).collect(),
                return_type: types(*return_type),
            },
            TypeKind::Parameterized { name, owner } => TypeKind::Parameterized {
                name: name.clone(),
                owner: owner.map(nodes),
            },
            other => other.clone(),
        };
        Type { kind, ..self.clone() }
    }
}
