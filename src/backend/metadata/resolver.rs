//! Token resolution and definition lookup interfaces
//!
//! The decoder and the delegate templates only ever see a module through these
//! traits. `MetadataModule` is the in-memory implementation; loaders for real
//! assemblies implement the same pair.

use std::sync::Arc;

use super::token::Token;
use super::types::{
    FieldDef, FieldId, FieldRef, GenericContext, MethodDef, MethodId, MethodRef, ResolvedToken,
    TypeDef, TypeId, TypeSig,
};

/// Resolves metadata tokens to entities
///
/// Every operation must be deterministic for a fixed (module, token, context)
/// triple. A `None` result means the token does not name an entity of the
/// requested kind.
pub trait TokenResolver {
    fn resolve_type(&self, token: Token, context: &GenericContext) -> Option<TypeSig>;

    fn resolve_method(&self, token: Token, context: &GenericContext) -> Option<MethodRef>;

    fn resolve_field(&self, token: Token, context: &GenericContext) -> Option<FieldRef>;

    fn resolve_string(&self, token: Token) -> Option<Arc<str>>;

    /// Resolve a token whose entity kind is not known up front (`ldtoken`)
    fn resolve_token(&self, token: Token, context: &GenericContext) -> Option<ResolvedToken>;
}

/// Definition lookup by id
pub trait Metadata {
    fn type_def(&self, id: TypeId) -> Option<&TypeDef>;

    fn method_def(&self, id: MethodId) -> Option<&MethodDef>;

    fn field_def(&self, id: FieldId) -> Option<&FieldDef>;

    /// Types that are not nested in another type, in declaration order
    fn top_level_types(&self) -> &[TypeId];

    /// All types, each declaring type immediately followed by its nested types
    /// (depth first)
    fn all_types(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut stack: Vec<TypeId> = self.top_level_types().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(def) = self.type_def(id) {
                stack.extend(def.nested.iter().rev().copied());
            }
        }
        out
    }

    /// Find a field by name, optionally walking the base type chain
    fn field_by_name(&self, ty: TypeId, name: &str, search_bases: bool) -> Option<FieldId> {
        let mut current = Some(ty);
        // Guard against malformed cyclic hierarchies
        let mut depth = 0usize;
        while let Some(id) = current {
            let def = self.type_def(id)?;
            let found = def
                .fields
                .iter()
                .copied()
                .find(|f| self.field_def(*f).is_some_and(|fd| fd.name == name));
            if found.is_some() || !search_bases {
                return found;
            }
            depth += 1;
            if depth > 64 {
                return None;
            }
            current = def.base.as_ref().and_then(TypeSig::definition);
        }
        None
    }

    /// Find the first method declared on `ty` with the given name
    fn method_by_name(&self, ty: TypeId, name: &str) -> Option<MethodId> {
        self.type_def(ty)?
            .methods
            .iter()
            .copied()
            .find(|m| self.method_def(*m).is_some_and(|md| md.name == name))
    }

    /// Fully qualified type name, nested types joined with `/`
    fn type_name(&self, id: TypeId) -> String {
        let Some(def) = self.type_def(id) else {
            return format!("<type {}>", id.0);
        };
        match def.declaring {
            Some(outer) => format!("{}/{}", self.type_name(outer), def.name),
            None if def.namespace.is_empty() => def.name.clone(),
            None => format!("{}.{}", def.namespace, def.name),
        }
    }

    /// Render a type signature using definition names
    fn type_sig_name(&self, sig: &TypeSig) -> String {
        match sig {
            TypeSig::Primitive(p) => p.keyword().to_string(),
            TypeSig::Named(id) => self.type_name(*id),
            TypeSig::Generic { definition, args } => {
                let args: Vec<String> = args.iter().map(|a| self.type_sig_name(a)).collect();
                format!("{}<{}>", self.type_name(*definition), args.join(","))
            }
            TypeSig::SzArray(inner) => format!("{}[]", self.type_sig_name(inner)),
            TypeSig::Pointer(inner) => format!("{}*", self.type_sig_name(inner)),
            TypeSig::ByRef(inner) => format!("{}&", self.type_sig_name(inner)),
            TypeSig::TypeParam(n) => format!("!{}", n),
            TypeSig::MethodParam(n) => format!("!!{}", n),
        }
    }

    /// `Namespace.Type::Method`
    fn method_name(&self, id: MethodId) -> String {
        match self.method_def(id) {
            Some(def) => format!("{}::{}", self.type_name(def.declaring), def.name),
            None => format!("<method {}>", id.0),
        }
    }

    /// `Namespace.Type::field`
    fn field_name(&self, id: FieldId) -> String {
        match self.field_def(id) {
            Some(def) => format!("{}::{}", self.type_name(def.declaring), def.name),
            None => format!("<field {}>", id.0),
        }
    }
}

/// A module the front end can decode and synthesize against
pub trait Module: TokenResolver + Metadata {}

impl<T: TokenResolver + Metadata + ?Sized> Module for T {}
