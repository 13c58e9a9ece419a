//! Translation units
//!
//! A translation unit pairs each method of one type with a declaration and,
//! when the method has a body, a definition: the materialized instruction
//! sequence in the decoder's shape plus its locals. Bodies come from, in
//! order: an explicit override, delegate synthesis, the module's bytecode.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::bytecode::{synthesize_body, BuildError, DecodeError, Instruction, MethodBody};
use super::config::FrontendConfig;
use super::metadata::{GenericContext, MethodId, MethodSignature, Module, TypeId, TypeSig};

/// Marker in the name of the compiler-generated type holding static data
pub const PRIVATE_IMPLEMENTATION_DETAILS: &str = "<PrivateImplementationDetails>";

/// Where a declaration was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationOrigin {
    /// Source-level method metadata
    Source,
    /// The module's raw method signature
    Raw,
}

/// Structural declaration of one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDeclaration {
    pub method: MethodId,
    pub origin: DeclarationOrigin,
    pub text: String,
    /// Raw signature when known
    pub signature: Option<MethodSignature>,
}

impl MethodDeclaration {
    pub fn source(method: MethodId, text: impl Into<String>) -> Self {
        Self {
            method,
            origin: DeclarationOrigin::Source,
            text: text.into(),
            signature: None,
        }
    }

    /// Declaration derived from the raw signature, None when the module has no
    /// signature for the method
    pub fn raw<M: Module + ?Sized>(module: &M, method: MethodId) -> Option<Self> {
        let def = module.method_def(method)?;
        let signature = def.signature.clone()?;
        let params = signature
            .parameters
            .iter()
            .map(|p| format!("{} {}", module.type_sig_name(&p.ty), p.name))
            .join(", ");
        let text = format!(
            "{}{} {}({})",
            if signature.has_this { "" } else { "static " },
            module.type_sig_name(&signature.return_type),
            module.method_name(method),
            params
        );
        Some(Self {
            method,
            origin: DeclarationOrigin::Raw,
            text,
            signature: Some(signature),
        })
    }
}

/// Materialized body of one method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    pub method: MethodId,
    pub name: String,
    pub synthetic: bool,
    pub instructions: Vec<Instruction>,
    pub locals: Vec<TypeSig>,
}

/// Declarations and definitions of one type
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub ty: TypeId,
    pub name: String,
    pub declarations: Vec<MethodDeclaration>,
    pub definitions: Vec<MethodDefinition>,
}

impl TranslationUnit {
    pub fn definition(&self, method: MethodId) -> Option<&MethodDefinition> {
        self.definitions.iter().find(|d| d.method == method)
    }

    pub fn declaration(&self, method: MethodId) -> Option<&MethodDeclaration> {
        self.declarations.iter().find(|d| d.method == method)
    }

    /// Methods declared without a body
    pub fn declaration_only(&self) -> impl Iterator<Item = &MethodDeclaration> {
        self.declarations
            .iter()
            .filter(|d| self.definition(d.method).is_none())
    }
}

/// Failure while building a translation unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitError {
    /// Neither source nor raw metadata describes the method
    MissingDeclaration { method: String },
    /// The method's bytecode failed to decode
    Decode { method: String, source: DecodeError },
    /// The method's synthetic body could not be built
    Synthesis { method: String, source: BuildError },
    /// An id did not name a definition in the module
    DanglingType(TypeId),
    DanglingMethod(MethodId),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDeclaration { method } => {
                write!(f, "No declaration for {}: neither source nor raw metadata", method)
            }
            Self::Decode { method, source } => write!(f, "Cannot decode {}: {}", method, source),
            Self::Synthesis { method, source } => {
                write!(f, "Cannot synthesize {}: {}", method, source)
            }
            Self::DanglingType(id) => write!(f, "Type #{} does not exist", id.0),
            Self::DanglingMethod(id) => write!(f, "Method #{} does not exist", id.0),
        }
    }
}

impl std::error::Error for UnitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::Synthesis { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for translation unit construction
pub type UnitResult<T> = Result<T, UnitError>;

/// Builds translation units for the types of one module
pub struct UnitBuilder<'a, M: Module + ?Sized> {
    module: &'a M,
    config: FrontendConfig,
    source_declarations: HashMap<MethodId, String>,
    overrides: HashMap<MethodId, MethodBody>,
}

impl<'a, M: Module + ?Sized> UnitBuilder<'a, M> {
    pub fn new(module: &'a M, config: FrontendConfig) -> Self {
        Self {
            module,
            config,
            source_declarations: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// Source-level declaration text per method
    pub fn with_source_declarations(mut self, declarations: HashMap<MethodId, String>) -> Self {
        self.source_declarations = declarations;
        self
    }

    /// Use `body` for `method` instead of anything the module provides
    pub fn with_body_override(mut self, method: MethodId, body: MethodBody) -> Self {
        self.overrides.insert(method, body);
        self
    }

    /// Whether `ty` sits inside the compiler-generated static data type
    pub fn is_compiler_generated(&self, ty: TypeId) -> bool {
        let mut current = self.module.type_def(ty).and_then(|t| t.declaring);
        while let Some(outer) = current {
            let Some(def) = self.module.type_def(outer) else {
                return false;
            };
            if def.name.contains(PRIVATE_IMPLEMENTATION_DETAILS) {
                return true;
            }
            current = def.declaring;
        }
        false
    }

    /// Types that get a unit, declaring types before their nested types
    pub fn types(&self) -> Vec<TypeId> {
        self.module
            .all_types()
            .into_iter()
            .filter(|ty| {
                let skip = self.config.skip_compiler_generated && self.is_compiler_generated(*ty);
                if skip {
                    warn!(target: "cilfront::units", ty = %self.module.type_name(*ty), "Skipping compiler-generated type");
                }
                !skip
            })
            .collect()
    }

    /// Declaration of a method: source metadata first, then the raw signature
    pub fn declaration(&self, method: MethodId) -> UnitResult<MethodDeclaration> {
        if let Some(text) = self.source_declarations.get(&method) {
            let mut decl = MethodDeclaration::source(method, text.clone());
            decl.signature = self.module.method_def(method).and_then(|m| m.signature.clone());
            return Ok(decl);
        }
        MethodDeclaration::raw(self.module, method).ok_or_else(|| UnitError::MissingDeclaration {
            method: self.module.method_name(method),
        })
    }

    /// Body source of a method, if it has one
    pub fn body(&self, method: MethodId) -> UnitResult<Option<MethodBody>> {
        if let Some(body) = self.overrides.get(&method) {
            return Ok(Some(body.clone()));
        }
        let synthetic = synthesize_body(self.module, method, &self.config).map_err(|source| {
            UnitError::Synthesis {
                method: self.module.method_name(method),
                source,
            }
        })?;
        if let Some(body) = synthetic {
            return Ok(Some(MethodBody::Synthetic(body)));
        }
        let def = self
            .module
            .method_def(method)
            .ok_or(UnitError::DanglingMethod(method))?;
        Ok(def
            .body
            .clone()
            .map(|code| MethodBody::bytecode(code, GenericContext::empty())))
    }

    fn definition(&self, method: MethodId, body: MethodBody) -> UnitResult<MethodDefinition> {
        let name = self.module.method_name(method);
        let instructions = body.materialize(self.module).map_err(|source| UnitError::Decode {
            method: name.clone(),
            source,
        })?;
        let (synthetic, locals) = match &body {
            MethodBody::Synthetic(s) => (true, s.locals.clone()),
            MethodBody::Bytecode { .. } => (
                false,
                self.module
                    .method_def(method)
                    .map(|m| m.locals.clone())
                    .unwrap_or_default(),
            ),
        };
        trace!(target: "cilfront::units", method = %name, synthetic, instructions = instructions.len(), "Method defined");
        Ok(MethodDefinition {
            method,
            name,
            synthetic,
            instructions,
            locals,
        })
    }

    /// Build the unit of one type
    pub fn build_type(&self, ty: TypeId) -> UnitResult<TranslationUnit> {
        let def = self.module.type_def(ty).ok_or(UnitError::DanglingType(ty))?;
        let name = self.module.type_name(ty);
        debug!(target: "cilfront::units", ty = %name, methods = def.methods.len(), "Building translation unit");

        let mut declarations = Vec::with_capacity(def.methods.len());
        let mut definitions = Vec::new();
        for &method in &def.methods {
            declarations.push(self.declaration(method)?);
            if let Some(body) = self.body(method)? {
                definitions.push(self.definition(method, body)?);
            }
        }

        Ok(TranslationUnit {
            ty,
            name,
            declarations,
            definitions,
        })
    }

    /// Build units for every type, one at a time
    pub fn build_sequential(&self) -> UnitResult<Vec<TranslationUnit>> {
        self.types().into_iter().map(|ty| self.build_type(ty)).collect()
    }
}

impl<'a, M: Module + Sync + ?Sized> UnitBuilder<'a, M> {
    /// Build units for every type across the rayon pool, in type order
    pub fn build_parallel(&self) -> UnitResult<Vec<TranslationUnit>> {
        self.types()
            .into_par_iter()
            .map(|ty| self.build_type(ty))
            .collect()
    }

    /// Build units for every type, in parallel when configured
    pub fn build(&self) -> UnitResult<Vec<TranslationUnit>> {
        if self.config.parallel {
            self.build_parallel()
        } else {
            self.build_sequential()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::metadata::{
        MetadataModule, MethodAttributes, MethodDef, Parameter, TypeDef, TypeKind,
    };

    fn module() -> (MetadataModule, TypeId, MethodId, MethodId, MethodId) {
        let mut module = MetadataModule::new("units");
        let ty = module.add_type(TypeDef::new("Demo", "Shape", TypeKind::Class));

        let mut area = MethodDef::new("Area", ty);
        area.signature = Some(MethodSignature {
            return_type: TypeSig::INT32,
            parameters: vec![Parameter::new("scale", TypeSig::INT32)],
            has_this: true,
        });
        area.body = Some(std::sync::Arc::from(vec![0x03, 0x2A]));
        let area = module.add_method(area);

        let mut draw = MethodDef::new("Draw", ty);
        draw.signature = Some(MethodSignature {
            return_type: TypeSig::VOID,
            parameters: vec![],
            has_this: true,
        });
        draw.attributes = MethodAttributes {
            is_abstract: true,
            is_virtual: true,
            ..Default::default()
        };
        let draw = module.add_method(draw);

        let opaque = module.add_method(MethodDef::new("Opaque", ty));
        (module, ty, area, draw, opaque)
    }

    #[test]
    fn test_raw_declaration_text() {
        let (module, _, area, _, _) = module();
        let decl = MethodDeclaration::raw(&module, area).expect("has signature");
        assert_eq!(decl.origin, DeclarationOrigin::Raw);
        assert_eq!(decl.text, "int32 Demo.Shape::Area(int32 scale)");
    }

    #[test]
    fn test_missing_declaration_is_fatal() {
        let (module, ty, _, _, opaque) = module();
        let builder = UnitBuilder::new(&module, FrontendConfig::default());
        assert_eq!(
            builder.build_type(ty),
            Err(UnitError::MissingDeclaration {
                method: "Demo.Shape::Opaque".to_string()
            })
        );

        let mut sources = HashMap::new();
        sources.insert(opaque, "void Opaque()".to_string());
        let builder = builder.with_source_declarations(sources);
        let unit = builder.build_type(ty).expect("source declaration fills the gap");
        assert_eq!(
            unit.declaration(opaque).map(|d| d.origin),
            Some(DeclarationOrigin::Source)
        );
    }

    #[test]
    fn test_declaration_only_methods() {
        let (module, ty, area, draw, opaque) = module();
        let mut sources = HashMap::new();
        sources.insert(opaque, "void Opaque()".to_string());
        let unit = UnitBuilder::new(&module, FrontendConfig::default())
            .with_source_declarations(sources)
            .build_type(ty)
            .expect("builds");
        assert_eq!(unit.declarations.len(), 3);
        assert_eq!(unit.definitions.len(), 1);
        assert!(unit.definition(area).is_some());
        let bodiless: Vec<_> = unit.declaration_only().map(|d| d.method).collect();
        assert_eq!(bodiless, vec![draw, opaque]);
    }

    #[test]
    fn test_decode_failure_names_method() {
        let (mut module, ty, area, _, opaque) = module();
        if let Some(def) = module.method_def_mut(area) {
            def.body = Some(std::sync::Arc::from(vec![0x20, 0x01]));
        }
        let mut sources = HashMap::new();
        sources.insert(opaque, "void Opaque()".to_string());
        let err = UnitBuilder::new(&module, FrontendConfig::default())
            .with_source_declarations(sources)
            .build_type(ty)
            .expect_err("truncated body");
        match &err {
            UnitError::Decode { method, source } => {
                assert_eq!(method, "Demo.Shape::Area");
                assert!(source.is_malformed());
            }
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_private_implementation_details_skipped() {
        let mut module = MetadataModule::new("pid");
        let details = module.add_type(TypeDef::new("", PRIVATE_IMPLEMENTATION_DETAILS, TypeKind::Class));
        let mut data = TypeDef::new("", "__StaticArrayInitTypeSize=16", TypeKind::Struct);
        data.declaring = Some(details);
        let data = module.add_type(data);
        let user = module.add_type(TypeDef::new("Demo", "User", TypeKind::Class));

        let builder = UnitBuilder::new(&module, FrontendConfig::default());
        assert!(builder.is_compiler_generated(data));
        assert_eq!(builder.types(), vec![details, user]);

        let keep_all = UnitBuilder::new(
            &module,
            FrontendConfig::default().with_skip_compiler_generated(false),
        );
        assert_eq!(keep_all.types(), vec![details, data, user]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (module, _, _, _, opaque) = module();
        let mut sources = HashMap::new();
        sources.insert(opaque, "void Opaque()".to_string());
        let sequential = UnitBuilder::new(&module, FrontendConfig::default())
            .with_source_declarations(sources.clone())
            .build()
            .expect("builds");
        let parallel = UnitBuilder::new(&module, FrontendConfig::default().with_parallel(true))
            .with_source_declarations(sources)
            .build()
            .expect("builds");
        assert_eq!(sequential, parallel);
    }
}
