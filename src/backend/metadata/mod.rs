//! Module metadata as seen by the front end
//!
//! The decoder and the synthetic builder consume metadata only through the
//! [`TokenResolver`] and [`Metadata`] traits. [`MetadataModule`] is an
//! in-memory implementation, populated programmatically or from a TOML
//! [`Manifest`].

pub mod manifest;
pub mod module;
pub mod resolver;
pub mod token;
pub mod types;

pub use manifest::{LoadedModule, Manifest, ManifestError, ManifestResult};
pub use module::{MetadataModule, TokenEntry};
pub use resolver::{Metadata, Module, TokenResolver};
pub use token::{Token, TokenTable};
pub use types::{
    Dispatch, EntityKind, FieldDef, FieldId, FieldRef, GenericContext, MethodAttributes, MethodDef,
    MethodId, MethodRef, MethodSignature, Parameter, Primitive, RawReference, ResolvedToken,
    TypeDef, TypeId, TypeKind, TypeSig,
};
