//! In-memory metadata module
//!
//! Definitions are stored in arenas and receive `TypeDef`, `Field` and
//! `MethodDef` tokens in declaration order. Any other token (member
//! references on generic instantiations, type specs, method specs, user
//! strings, raw handles) is bound explicitly with [`MetadataModule::bind`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::resolver::{Metadata, TokenResolver};
use super::token::{Token, TokenTable};
use super::types::{
    FieldDef, FieldId, FieldRef, GenericContext, MethodDef, MethodId, MethodRef, RawReference,
    ResolvedToken, TypeDef, TypeId, TypeSig,
};

/// Entity an explicitly bound token refers to
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEntry {
    Type(TypeSig),
    Method(MethodRef),
    Field(FieldRef),
    String(Arc<str>),
    Raw(RawReference),
}

/// A module held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MetadataModule {
    name: String,
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    top_level: Vec<TypeId>,
    bindings: HashMap<Token, TokenEntry>,
    next_string: u32,
}

impl MetadataModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Add a type definition, linking it into its declaring type if it has one
    pub fn add_type(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        match def.declaring.and_then(|outer| self.types.get_mut(outer.0 as usize)) {
            Some(outer) => outer.nested.push(id),
            None => self.top_level.push(id),
        }
        self.types.push(def);
        id
    }

    /// Add a field to `declaring`
    pub fn add_field(
        &mut self,
        declaring: TypeId,
        name: impl Into<String>,
        ty: TypeSig,
        is_static: bool,
    ) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            name: name.into(),
            declaring,
            ty,
            is_static,
        });
        if let Some(owner) = self.types.get_mut(declaring.0 as usize) {
            owner.fields.push(id);
        }
        id
    }

    /// Add a method to its declaring type
    pub fn add_method(&mut self, def: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        if let Some(owner) = self.types.get_mut(def.declaring.0 as usize) {
            owner.methods.push(id);
        }
        self.methods.push(def);
        id
    }

    pub fn type_def_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        self.types.get_mut(id.0 as usize)
    }

    pub fn method_def_mut(&mut self, id: MethodId) -> Option<&mut MethodDef> {
        self.methods.get_mut(id.0 as usize)
    }

    /// Look a type up by its fully qualified name (`Ns.Outer/Inner`)
    pub fn find_type(&self, full_name: &str) -> Option<TypeId> {
        (0..self.types.len() as u32)
            .map(TypeId)
            .find(|id| self.type_name(*id) == full_name)
    }

    pub fn type_token(id: TypeId) -> Token {
        Token::new(TokenTable::TypeDef, id.0 + 1)
    }

    pub fn method_token(id: MethodId) -> Token {
        Token::new(TokenTable::MethodDef, id.0 + 1)
    }

    pub fn field_token(id: FieldId) -> Token {
        Token::new(TokenTable::Field, id.0 + 1)
    }

    /// Bind an arbitrary token, replacing any previous binding
    pub fn bind(&mut self, token: Token, entry: TokenEntry) {
        self.bindings.insert(token, entry);
    }

    /// Intern a user string and return its `ldstr` token
    pub fn add_string(&mut self, text: impl Into<Arc<str>>) -> Token {
        self.next_string += 1;
        let token = Token::new(TokenTable::UserString, self.next_string);
        self.bindings.insert(token, TokenEntry::String(text.into()));
        token
    }

    /// Entity behind `token`, before generic substitution
    fn entry(&self, token: Token) -> Option<TokenEntry> {
        if let Some(entry) = self.bindings.get(&token) {
            return Some(entry.clone());
        }
        let index = token.row().checked_sub(1)? as usize;
        match token.table()? {
            TokenTable::TypeDef => {
                self.types.get(index)?;
                Some(TokenEntry::Type(TypeSig::Named(TypeId(index as u32))))
            }
            TokenTable::MethodDef => {
                let def = self.methods.get(index)?;
                Some(TokenEntry::Method(MethodRef::direct(
                    MethodId(index as u32),
                    TypeSig::Named(def.declaring),
                )))
            }
            TokenTable::Field => {
                let def = self.fields.get(index)?;
                Some(TokenEntry::Field(FieldRef::new(
                    FieldId(index as u32),
                    TypeSig::Named(def.declaring),
                )))
            }
            _ => None,
        }
    }

    fn miss(&self, token: Token, expected: &str) {
        trace!(target: "cilfront::metadata", module = %self.name, %token, expected, "token did not resolve");
    }
}

impl TokenResolver for MetadataModule {
    fn resolve_type(&self, token: Token, context: &GenericContext) -> Option<TypeSig> {
        match self.entry(token) {
            Some(TokenEntry::Type(sig)) => Some(sig.substitute(context)),
            _ => {
                self.miss(token, "type");
                None
            }
        }
    }

    fn resolve_method(&self, token: Token, context: &GenericContext) -> Option<MethodRef> {
        match self.entry(token) {
            Some(TokenEntry::Method(method)) => Some(method.substitute(context)),
            _ => {
                self.miss(token, "method");
                None
            }
        }
    }

    fn resolve_field(&self, token: Token, context: &GenericContext) -> Option<FieldRef> {
        match self.entry(token) {
            Some(TokenEntry::Field(field)) => Some(field.substitute(context)),
            _ => {
                self.miss(token, "field");
                None
            }
        }
    }

    fn resolve_string(&self, token: Token) -> Option<Arc<str>> {
        match self.entry(token) {
            Some(TokenEntry::String(text)) => Some(text),
            _ => {
                self.miss(token, "string");
                None
            }
        }
    }

    fn resolve_token(&self, token: Token, context: &GenericContext) -> Option<ResolvedToken> {
        let resolved = match self.entry(token)? {
            TokenEntry::Type(sig) => ResolvedToken::Type(sig.substitute(context)),
            TokenEntry::Field(field) => ResolvedToken::Field(field.substitute(context)),
            TokenEntry::Method(method) => ResolvedToken::Method(method.substitute(context)),
            TokenEntry::Raw(raw) => ResolvedToken::Raw(RawReference {
                text: raw.text,
                ty: raw.ty.map(|t| t.substitute(context)),
            }),
            TokenEntry::String(_) => return None,
        };
        Some(resolved)
    }
}

impl Metadata for MetadataModule {
    fn type_def(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0 as usize)
    }

    fn method_def(&self, id: MethodId) -> Option<&MethodDef> {
        self.methods.get(id.0 as usize)
    }

    fn field_def(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.get(id.0 as usize)
    }

    fn top_level_types(&self) -> &[TypeId] {
        &self.top_level
    }
}
