//! Metadata entities: definitions, type signatures and resolved references.

use std::fmt;
use std::sync::Arc;

/// Index of a type definition within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Index of a method definition within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

/// Index of a field definition within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// Built-in element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    IntPtr,
    UIntPtr,
    Object,
    String,
}

impl Primitive {
    /// Keyword used in listings and in the manifest type syntax
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::I1 => "int8",
            Self::U1 => "uint8",
            Self::I2 => "int16",
            Self::U2 => "uint16",
            Self::I4 => "int32",
            Self::U4 => "uint32",
            Self::I8 => "int64",
            Self::U8 => "uint64",
            Self::R4 => "float32",
            Self::R8 => "float64",
            Self::IntPtr => "native int",
            Self::UIntPtr => "native uint",
            Self::Object => "object",
            Self::String => "string",
        }
    }

    /// Parse a keyword, accepting a few common aliases
    pub fn from_keyword(word: &str) -> Option<Self> {
        let prim = match word {
            "void" => Self::Void,
            "bool" => Self::Bool,
            "char" => Self::Char,
            "int8" | "sbyte" => Self::I1,
            "uint8" | "byte" => Self::U1,
            "int16" | "short" => Self::I2,
            "uint16" | "ushort" => Self::U2,
            "int32" | "int" => Self::I4,
            "uint32" | "uint" => Self::U4,
            "int64" | "long" => Self::I8,
            "uint64" | "ulong" => Self::U8,
            "float32" | "float" => Self::R4,
            "float64" | "double" => Self::R8,
            "native int" | "intptr" => Self::IntPtr,
            "native uint" | "uintptr" => Self::UIntPtr,
            "object" => Self::Object,
            "string" => Self::String,
            _ => return None,
        };
        Some(prim)
    }
}

/// A type as it appears in a signature or as a resolved operand
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Primitive(Primitive),
    /// Non-generic (or open generic) type definition
    Named(TypeId),
    /// Generic instantiation of a type definition
    Generic { definition: TypeId, args: Vec<TypeSig> },
    /// Single-dimension zero-based array
    SzArray(Box<TypeSig>),
    Pointer(Box<TypeSig>),
    ByRef(Box<TypeSig>),
    /// `!n`: type parameter of the enclosing type
    TypeParam(u32),
    /// `!!n`: type parameter of the enclosing method
    MethodParam(u32),
}

impl TypeSig {
    pub const VOID: TypeSig = TypeSig::Primitive(Primitive::Void);
    pub const INT32: TypeSig = TypeSig::Primitive(Primitive::I4);
    pub const OBJECT: TypeSig = TypeSig::Primitive(Primitive::Object);
    pub const INTPTR: TypeSig = TypeSig::Primitive(Primitive::IntPtr);

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSig::Primitive(Primitive::Void))
    }

    /// Definition this signature is rooted at, if any
    pub fn definition(&self) -> Option<TypeId> {
        match self {
            TypeSig::Named(id) => Some(*id),
            TypeSig::Generic { definition, .. } => Some(*definition),
            _ => None,
        }
    }

    /// Whether the signature still mentions a type or method parameter
    pub fn is_open(&self) -> bool {
        match self {
            TypeSig::TypeParam(_) | TypeSig::MethodParam(_) => true,
            TypeSig::Generic { args, .. } => args.iter().any(TypeSig::is_open),
            TypeSig::SzArray(inner) | TypeSig::Pointer(inner) | TypeSig::ByRef(inner) => {
                inner.is_open()
            }
            TypeSig::Primitive(_) | TypeSig::Named(_) => false,
        }
    }

    /// Replace type and method parameters with the bindings of `context`
    ///
    /// Parameters without a binding are left in place.
    pub fn substitute(&self, context: &GenericContext) -> TypeSig {
        match self {
            TypeSig::TypeParam(n) => context
                .type_args
                .get(*n as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::MethodParam(n) => context
                .method_args
                .get(*n as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::Generic { definition, args } => TypeSig::Generic {
                definition: *definition,
                args: args.iter().map(|a| a.substitute(context)).collect(),
            },
            TypeSig::SzArray(inner) => TypeSig::SzArray(Box::new(inner.substitute(context))),
            TypeSig::Pointer(inner) => TypeSig::Pointer(Box::new(inner.substitute(context))),
            TypeSig::ByRef(inner) => TypeSig::ByRef(Box::new(inner.substitute(context))),
            TypeSig::Primitive(_) | TypeSig::Named(_) => self.clone(),
        }
    }
}

/// Type-argument bindings active while resolving tokens
///
/// Identical tokens resolve to different entities under different contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GenericContext {
    /// Bindings for `!0`, `!1`, ...
    pub type_args: Vec<TypeSig>,
    /// Bindings for `!!0`, `!!1`, ...
    pub method_args: Vec<TypeSig>,
}

impl GenericContext {
    /// The empty context (non-generic code, or open generic code)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_type_args(type_args: Vec<TypeSig>) -> Self {
        Self {
            type_args,
            method_args: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.type_args.is_empty() && self.method_args.is_empty()
    }
}

/// Kind of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeKind {
    #[default]
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

/// A type definition
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    pub kind: TypeKind,
    pub base: Option<TypeSig>,
    /// Enclosing type for nested types
    pub declaring: Option<TypeId>,
    pub generic_params: u32,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub nested: Vec<TypeId>,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind,
            base: None,
            declaring: None,
            generic_params: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    #[inline]
    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

/// A field definition
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub declaring: TypeId,
    pub ty: TypeSig,
    pub is_static: bool,
}

/// A named, typed method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeSig,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeSig) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Raw method signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub return_type: TypeSig,
    pub parameters: Vec<Parameter>,
    /// Instance method (argument 0 is `this`)
    pub has_this: bool,
}

/// Method attribute flags that matter to code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodAttributes {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    /// Implemented by the runtime (no body in the module)
    pub is_external: bool,
}

/// A method definition
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub declaring: TypeId,
    /// Raw signature; None when the module only knows the method by name
    pub signature: Option<MethodSignature>,
    pub attributes: MethodAttributes,
    pub generic_params: u32,
    /// Encoded instruction stream, if the method has a body
    pub body: Option<Arc<[u8]>>,
    /// Declared local variable types of the body
    pub locals: Vec<TypeSig>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>, declaring: TypeId) -> Self {
        Self {
            name: name.into(),
            declaring,
            signature: None,
            attributes: MethodAttributes::default(),
            generic_params: 0,
            body: None,
            locals: Vec::new(),
        }
    }

    /// Instance constructor
    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor"
    }

    #[inline]
    pub fn is_static_constructor(&self) -> bool {
        self.name == ".cctor"
    }

    /// Return type, void when the signature is unknown
    pub fn return_type(&self) -> TypeSig {
        self.signature
            .as_ref()
            .map_or(TypeSig::VOID, |sig| sig.return_type.clone())
    }
}

/// How a resolved method is reached at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dispatch {
    /// Ordinary call to the method itself
    #[default]
    Direct,
    /// Call through a stored function pointer carrying the method's signature,
    /// passing the stored bound target as `this` when `bound_instance` is set
    ThroughPointer { bound_instance: bool },
}

/// A method reference as produced by token resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub method: MethodId,
    pub declaring_type: TypeSig,
    pub method_args: Vec<TypeSig>,
    pub dispatch: Dispatch,
}

impl MethodRef {
    pub fn direct(method: MethodId, declaring_type: TypeSig) -> Self {
        Self {
            method,
            declaring_type,
            method_args: Vec::new(),
            dispatch: Dispatch::Direct,
        }
    }

    /// Same method, reached through a stored function pointer
    pub fn through_pointer(&self, bound_instance: bool) -> Self {
        Self {
            dispatch: Dispatch::ThroughPointer { bound_instance },
            ..self.clone()
        }
    }

    pub fn substitute(&self, context: &GenericContext) -> Self {
        Self {
            method: self.method,
            declaring_type: self.declaring_type.substitute(context),
            method_args: self.method_args.iter().map(|a| a.substitute(context)).collect(),
            dispatch: self.dispatch,
        }
    }
}

/// A field reference as produced by token resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub field: FieldId,
    pub declaring_type: TypeSig,
}

impl FieldRef {
    pub fn new(field: FieldId, declaring_type: TypeSig) -> Self {
        Self {
            field,
            declaring_type,
        }
    }

    pub fn substitute(&self, context: &GenericContext) -> Self {
        Self {
            field: self.field,
            declaring_type: self.declaring_type.substitute(context),
        }
    }
}

/// An entity the module already knows how to spell in the target language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawReference {
    pub text: Arc<str>,
    pub ty: Option<TypeSig>,
}

impl RawReference {
    pub fn new(text: impl Into<Arc<str>>, ty: Option<TypeSig>) -> Self {
        Self {
            text: text.into(),
            ty,
        }
    }
}

impl fmt::Display for RawReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Result of resolving a token whose entity kind is not known up front
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedToken {
    Type(TypeSig),
    Field(FieldRef),
    Method(MethodRef),
    Raw(RawReference),
}

/// Entity kind a token was expected to resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Type,
    Method,
    Field,
    String,
    Constructor,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Type => "type",
            Self::Method => "method",
            Self::Field => "field",
            Self::String => "string",
            Self::Constructor => "constructor",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_type_params() {
        let list = TypeSig::Generic {
            definition: TypeId(3),
            args: vec![TypeSig::TypeParam(0), TypeSig::SzArray(Box::new(TypeSig::MethodParam(0)))],
        };
        let context = GenericContext {
            type_args: vec![TypeSig::INT32],
            method_args: vec![TypeSig::OBJECT],
        };
        let closed = list.substitute(&context);
        assert_eq!(
            closed,
            TypeSig::Generic {
                definition: TypeId(3),
                args: vec![TypeSig::INT32, TypeSig::SzArray(Box::new(TypeSig::OBJECT))],
            }
        );
        assert!(list.is_open());
        assert!(!closed.is_open());
    }

    #[test]
    fn test_substitute_leaves_unbound_params() {
        let sig = TypeSig::TypeParam(2);
        let context = GenericContext::with_type_args(vec![TypeSig::INT32]);
        assert_eq!(sig.substitute(&context), TypeSig::TypeParam(2));
    }

    #[test]
    fn test_primitive_keywords() {
        for prim in [Primitive::I4, Primitive::IntPtr, Primitive::Object, Primitive::Void] {
            assert_eq!(Primitive::from_keyword(prim.keyword()), Some(prim));
        }
        assert_eq!(Primitive::from_keyword("decimal"), None);
    }

    #[test]
    fn test_through_pointer_keeps_identity() {
        let direct = MethodRef::direct(MethodId(4), TypeSig::Named(TypeId(1)));
        let bound = direct.through_pointer(true);
        assert_eq!(bound.method, MethodId(4));
        assert_eq!(bound.dispatch, Dispatch::ThroughPointer { bound_instance: true });
        assert_ne!(bound, direct);
    }
}
