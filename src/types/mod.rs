//! Type model, registry and parser

pub mod common;
pub mod parser;
pub mod registry;
pub mod ty;

pub use parser::TypeParser;
pub use registry::{RecordBinding, TypeRegistry};
pub use ty::{
    Modifier, PointerOrigin, Provenance, Qualifier, Storage, Type, TypeId, TypeKind, TypeVariant, WrapKind,
};
