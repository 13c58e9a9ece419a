//! Module manifests
//!
//! A manifest is a TOML description of a module: its types, fields and
//! methods (with hex-encoded bodies), user strings, explicit token bindings
//! and source-level declarations. It is how the command line tool and the
//! tests feed modules to the front end.
//!
//! ## Format
//!
//! ```toml
//! [module]
//! name = "demo"
//!
//! [config]
//! short_branches = false
//!
//! [[types]]
//! namespace = "Demo"
//! name = "Handler"
//! kind = "delegate"
//! base = "System.MulticastDelegate"
//!
//! [[types.methods]]
//! name = "Invoke"
//! returns = "int32"
//! params = [{ name = "x", type = "int32" }]
//! external = true
//!
//! [[types]]
//! namespace = "Demo"
//! name = "Program"
//!
//! [[types.methods]]
//! name = "Main"
//! static = true
//! body = "16 2a"
//!
//! [[bindings]]
//! token = 0x0A000001
//! method = "Demo.Program::Main"
//!
//! [[declarations]]
//! method = "Demo.Program::Main"
//! text = "static void Main()"
//! ```
//!
//! Type syntax: primitive keywords (`int32`, `object`, ...), `!n` and `!!n`
//! for type and method parameters, suffixes `[]`, `*` and `&`, generic
//! instantiations `Ns.Name<A,B>` and nested types `Ns.Outer/Inner`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::module::{MetadataModule, TokenEntry};
use super::resolver::Metadata;
use super::token::Token;
use super::types::{
    FieldRef, MethodAttributes, MethodDef, MethodId, MethodRef, MethodSignature, Parameter,
    Primitive, RawReference, TypeDef, TypeId, TypeKind, TypeSig,
};
use crate::backend::config::FrontendConfig;

/// Errors raised while loading a manifest
#[derive(Debug)]
pub enum ManifestError {
    /// The manifest file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// The manifest is not valid TOML or does not match the schema
    Parse(toml::de::Error),
    /// A type name does not name a type declared in the manifest
    UnknownType(String),
    /// A `Type::member` reference does not name a declared member
    UnknownMember(String),
    /// Two types share one fully qualified name
    DuplicateType(String),
    /// Malformed type syntax
    BadTypeSyntax { text: String, reason: &'static str },
    /// Malformed hex body
    BadBody { method: String, reason: String },
    /// A binding does not say what it binds to
    BadBinding { token: u32, reason: &'static str },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(f, "cannot read manifest {}: {}", path.display(), source)
            }
            ManifestError::Parse(e) => write!(f, "invalid manifest: {}", e),
            ManifestError::UnknownType(name) => write!(f, "unknown type '{}'", name),
            ManifestError::UnknownMember(name) => write!(f, "unknown member '{}'", name),
            ManifestError::DuplicateType(name) => write!(f, "type '{}' declared twice", name),
            ManifestError::BadTypeSyntax { text, reason } => {
                write!(f, "bad type '{}': {}", text, reason)
            }
            ManifestError::BadBody { method, reason } => {
                write!(f, "bad body for {}: {}", method, reason)
            }
            ManifestError::BadBinding { token, reason } => {
                write!(f, "bad binding for token 0x{:08x}: {}", token, reason)
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ManifestError {
    fn from(e: toml::de::Error) -> Self {
        ManifestError::Parse(e)
    }
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// Manifest document
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub module: ModuleMeta,

    /// Optional front end configuration
    #[serde(default)]
    pub config: Option<FrontendConfig>,

    #[serde(default)]
    pub types: Vec<TypeEntry>,

    /// User strings, bound to `UserString` tokens in order
    #[serde(default)]
    pub strings: Vec<String>,

    #[serde(default)]
    pub bindings: Vec<BindingEntry>,

    /// Source-level declarations
    #[serde(default)]
    pub declarations: Vec<DeclarationEntry>,
}

/// The `[module]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindEntry {
    #[default]
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

impl From<KindEntry> for TypeKind {
    fn from(kind: KindEntry) -> Self {
        match kind {
            KindEntry::Class => TypeKind::Class,
            KindEntry::Struct => TypeKind::Struct,
            KindEntry::Interface => TypeKind::Interface,
            KindEntry::Enum => TypeKind::Enum,
            KindEntry::Delegate => TypeKind::Delegate,
        }
    }
}

/// A `[[types]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TypeEntry {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub kind: KindEntry,
    /// Base type, in type syntax
    #[serde(default)]
    pub base: Option<String>,
    /// Fully qualified name of the declaring type for nested types
    #[serde(default)]
    pub nested_in: Option<String>,
    #[serde(default)]
    pub generic_params: u32,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

/// A `[[types.fields]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// A method parameter
#[derive(Debug, Clone, Deserialize)]
pub struct ParamEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A `[[types.methods]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    /// Return type, `void` when absent
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "external")]
    pub is_external: bool,
    /// The module knows the method by name only (no raw signature)
    #[serde(default)]
    pub opaque: bool,
    #[serde(default)]
    pub generic_params: u32,
    /// Hex-encoded instruction stream
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub locals: Vec<String>,
}

/// A `[[bindings]]` entry: exactly one of `type`, `method`, `field`,
/// `string` or `raw`
#[derive(Debug, Clone, Deserialize)]
pub struct BindingEntry {
    pub token: u32,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
    /// Declaring type of a member reference, in type syntax
    #[serde(default)]
    pub declaring: Option<String>,
    #[serde(default)]
    pub method_args: Vec<String>,
    /// Type of a raw reference
    #[serde(default)]
    pub raw_type: Option<String>,
}

/// A `[[declarations]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct DeclarationEntry {
    /// `Ns.Type::Method`
    pub method: String,
    pub text: String,
}

/// A manifest turned into a module
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub module: MetadataModule,
    pub config: Option<FrontendConfig>,
    /// Source-level declaration text per method
    pub source_declarations: HashMap<MethodId, String>,
}

impl Manifest {
    pub fn parse(content: &str) -> ManifestResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_path(path: &Path) -> ManifestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Build the in-memory module the manifest describes
    pub fn build(&self) -> ManifestResult<LoadedModule> {
        let mut module = MetadataModule::new(self.module.name.clone());

        // Types first so members can refer to any of them
        let mut ids = Vec::with_capacity(self.types.len());
        for entry in &self.types {
            let mut def = TypeDef::new(entry.namespace.clone(), entry.name.clone(), entry.kind.into());
            def.generic_params = entry.generic_params;
            if let Some(outer) = &entry.nested_in {
                def.declaring =
                    Some(module.find_type(outer).ok_or_else(|| ManifestError::UnknownType(outer.clone()))?);
            }
            let id = module.add_type(def);
            let full = module.type_name(id);
            if ids.iter().any(|other| module.type_name(*other) == full) {
                return Err(ManifestError::DuplicateType(full));
            }
            ids.push(id);
        }

        for (entry, &id) in self.types.iter().zip(&ids) {
            if let Some(base) = &entry.base {
                let base = parse_type(base, &module)?;
                if let Some(def) = module.type_def_mut(id) {
                    def.base = Some(base);
                }
            }
            for field in &entry.fields {
                let ty = parse_type(&field.ty, &module)?;
                module.add_field(id, field.name.clone(), ty, field.is_static);
            }
            for method in &entry.methods {
                let def = self.method_def(method, id, &module)?;
                module.add_method(def);
            }
        }

        for text in &self.strings {
            module.add_string(text.as_str());
        }

        for binding in &self.bindings {
            let entry = binding_entry(binding, &module)?;
            module.bind(Token(binding.token), entry);
        }

        let mut source_declarations = HashMap::new();
        for decl in &self.declarations {
            let id = find_method(&decl.method, &module)?;
            source_declarations.insert(id, decl.text.clone());
        }

        debug!(
            target: "cilfront::metadata",
            module = %module.name(),
            types = module.type_count(),
            methods = module.method_count(),
            "manifest loaded"
        );

        Ok(LoadedModule {
            module,
            config: self.config.clone(),
            source_declarations,
        })
    }

    fn method_def(
        &self,
        entry: &MethodEntry,
        declaring: TypeId,
        module: &MetadataModule,
    ) -> ManifestResult<MethodDef> {
        let mut def = MethodDef::new(entry.name.clone(), declaring);
        def.attributes = MethodAttributes {
            is_static: entry.is_static,
            is_virtual: entry.is_virtual,
            is_abstract: entry.is_abstract,
            is_external: entry.is_external,
        };
        def.generic_params = entry.generic_params;
        if !entry.opaque {
            let return_type = match &entry.returns {
                Some(text) => parse_type(text, module)?,
                None => TypeSig::VOID,
            };
            let parameters = entry
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let name = if p.name.is_empty() { format!("arg{}", i) } else { p.name.clone() };
                    Ok(Parameter::new(name, parse_type(&p.ty, module)?))
                })
                .collect::<ManifestResult<Vec<_>>>()?;
            def.signature = Some(MethodSignature {
                return_type,
                parameters,
                has_this: !entry.is_static,
            });
        }
        if let Some(hex) = &entry.body {
            let bytes = parse_hex(hex).map_err(|reason| ManifestError::BadBody {
                method: format!("{}::{}", module.type_name(declaring), entry.name),
                reason,
            })?;
            def.body = Some(Arc::from(bytes));
        }
        def.locals = entry
            .locals
            .iter()
            .map(|l| parse_type(l, module))
            .collect::<ManifestResult<Vec<_>>>()?;
        Ok(def)
    }
}

fn binding_entry(binding: &BindingEntry, module: &MetadataModule) -> ManifestResult<TokenEntry> {
    let declaring = binding
        .declaring
        .as_deref()
        .map(|text| parse_type(text, module))
        .transpose()?;

    if let Some(text) = &binding.ty {
        return Ok(TokenEntry::Type(parse_type(text, module)?));
    }
    if let Some(name) = &binding.method {
        let id = find_method(name, module)?;
        let owner = module
            .method_def(id)
            .map(|m| TypeSig::Named(m.declaring))
            .ok_or_else(|| ManifestError::UnknownMember(name.clone()))?;
        let mut method = MethodRef::direct(id, declaring.unwrap_or(owner));
        method.method_args = binding
            .method_args
            .iter()
            .map(|a| parse_type(a, module))
            .collect::<ManifestResult<Vec<_>>>()?;
        return Ok(TokenEntry::Method(method));
    }
    if let Some(name) = &binding.field {
        let (ty, member) = split_member(name)?;
        let owner = module
            .find_type(ty)
            .ok_or_else(|| ManifestError::UnknownType(ty.to_string()))?;
        let id = module
            .field_by_name(owner, member, true)
            .ok_or_else(|| ManifestError::UnknownMember(name.clone()))?;
        let declaring = declaring.unwrap_or(TypeSig::Named(owner));
        return Ok(TokenEntry::Field(FieldRef::new(id, declaring)));
    }
    if let Some(text) = &binding.string {
        return Ok(TokenEntry::String(Arc::from(text.as_str())));
    }
    if let Some(text) = &binding.raw {
        let ty = binding
            .raw_type
            .as_deref()
            .map(|t| parse_type(t, module))
            .transpose()?;
        return Ok(TokenEntry::Raw(RawReference::new(text.as_str(), ty)));
    }
    Err(ManifestError::BadBinding {
        token: binding.token,
        reason: "expected one of type, method, field, string or raw",
    })
}

fn split_member(name: &str) -> ManifestResult<(&str, &str)> {
    name.rsplit_once("::")
        .ok_or_else(|| ManifestError::UnknownMember(name.to_string()))
}

fn find_method(name: &str, module: &MetadataModule) -> ManifestResult<MethodId> {
    let (ty, member) = split_member(name)?;
    let owner = module
        .find_type(ty)
        .ok_or_else(|| ManifestError::UnknownType(ty.to_string()))?;
    module
        .method_by_name(owner, member)
        .ok_or_else(|| ManifestError::UnknownMember(name.to_string()))
}

/// Decode a whitespace-tolerant hex string (`"16 2a"`, `"162A"`)
pub fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(s, 16).map_err(|_| format!("invalid hex byte '{}'", s))
        })
        .collect()
}

/// Parse a type in manifest type syntax against the types of `module`
pub fn parse_type(text: &str, module: &MetadataModule) -> ManifestResult<TypeSig> {
    let bad = |reason| ManifestError::BadTypeSyntax {
        text: text.to_string(),
        reason,
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(bad("empty type"));
    }

    if let Some(inner) = text.strip_suffix("[]") {
        return Ok(TypeSig::SzArray(Box::new(parse_type(inner, module)?)));
    }
    if let Some(inner) = text.strip_suffix('*') {
        return Ok(TypeSig::Pointer(Box::new(parse_type(inner, module)?)));
    }
    if let Some(inner) = text.strip_suffix('&') {
        return Ok(TypeSig::ByRef(Box::new(parse_type(inner, module)?)));
    }

    if let Some(n) = text.strip_prefix("!!") {
        return n.parse().map(TypeSig::MethodParam).map_err(|_| bad("bad method parameter index"));
    }
    if let Some(n) = text.strip_prefix('!') {
        return n.parse().map(TypeSig::TypeParam).map_err(|_| bad("bad type parameter index"));
    }

    if let Some(prim) = Primitive::from_keyword(text) {
        return Ok(TypeSig::Primitive(prim));
    }

    match text.find('<') {
        Some(open) => {
            let inner = text[open + 1..]
                .strip_suffix('>')
                .ok_or_else(|| bad("unclosed generic argument list"))?;
            let name = &text[..open];
            let definition = module
                .find_type(name)
                .ok_or_else(|| ManifestError::UnknownType(name.to_string()))?;
            let args = split_args(inner)
                .ok_or_else(|| bad("unbalanced generic argument list"))?
                .into_iter()
                .map(|a| parse_type(a, module))
                .collect::<ManifestResult<Vec<_>>>()?;
            if args.is_empty() {
                return Err(bad("empty generic argument list"));
            }
            Ok(TypeSig::Generic { definition, args })
        }
        None => module
            .find_type(text)
            .map(TypeSig::Named)
            .ok_or_else(|| ManifestError::UnknownType(text.to_string())),
    }
}

/// Split a generic argument list at top-level commas
fn split_args(inner: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::metadata::resolver::TokenResolver;
    use crate::backend::metadata::types::GenericContext;

    const SAMPLE: &str = r#"
        strings = ["hello"]

        [module]
        name = "sample"

        [config]
        parallel = true

        [[types]]
        namespace = "System"
        name = "Object"

        [[types]]
        namespace = "Demo"
        name = "Box"
        generic_params = 1
        base = "System.Object"

        [[types.fields]]
        name = "value"
        type = "!0"

        [[types.methods]]
        name = "Get"
        returns = "!0"
        body = "02 7b 01 00 00 04 2a"

        [[types]]
        name = "Inner"
        nested_in = "Demo.Box"

        [[types]]
        namespace = "Demo"
        name = "Program"

        [[types.methods]]
        name = "Main"
        static = true
        params = [{ name = "args", type = "string[]" }]
        body = "72 01 00 00 70 26 2a"
        locals = ["Demo.Box<int32>"]
    "#;

    #[test]
    fn test_parse_and_build() {
        let manifest = Manifest::parse(SAMPLE).expect("sample manifest should parse");
        let loaded = manifest.build().expect("sample manifest should build");
        let module = &loaded.module;
        assert_eq!(module.name(), "sample");
        assert!(loaded.config.as_ref().is_some_and(|c| c.parallel));

        let inner = module.find_type("Demo.Box/Inner").expect("nested type");
        let boxed = module.find_type("Demo.Box").expect("generic type");
        assert_eq!(module.type_def(inner).and_then(|d| d.declaring), Some(boxed));

        let main = module
            .method_by_name(module.find_type("Demo.Program").expect("program"), "Main")
            .expect("main");
        let def = module.method_def(main).expect("main def");
        assert_eq!(def.body.as_deref(), Some(&[0x72, 0x01, 0x00, 0x00, 0x70, 0x26, 0x2a][..]));
        assert_eq!(
            def.locals,
            vec![TypeSig::Generic {
                definition: boxed,
                args: vec![TypeSig::INT32]
            }]
        );
    }

    #[test]
    fn test_parse_type_syntax() {
        let manifest = Manifest::parse(SAMPLE).expect("parse");
        let module = manifest.build().expect("build").module;
        let boxed = module.find_type("Demo.Box").expect("box");
        assert_eq!(
            parse_type("Demo.Box<int32[]>&", &module).expect("byref"),
            TypeSig::ByRef(Box::new(TypeSig::Generic {
                definition: boxed,
                args: vec![TypeSig::SzArray(Box::new(TypeSig::INT32))],
            }))
        );
        assert_eq!(parse_type("!!1", &module).expect("mvar"), TypeSig::MethodParam(1));
        assert_eq!(
            parse_type("uint8*", &module).expect("pointer"),
            TypeSig::Pointer(Box::new(TypeSig::Primitive(Primitive::U1)))
        );
        assert!(matches!(
            parse_type("Demo.Missing", &module),
            Err(ManifestError::UnknownType(_))
        ));
        assert!(matches!(
            parse_type("Demo.Box<int32", &module),
            Err(ManifestError::BadTypeSyntax { .. })
        ));
    }

    #[test]
    fn test_bindings() {
        let text = format!(
            "{}\n{}",
            SAMPLE,
            r#"
            [[bindings]]
            token = 0x0A000001
            field = "Demo.Box::value"
            declaring = "Demo.Box<int32>"

            [[bindings]]
            token = 0x1B000001
            raw = "RuntimeHelpers_Marker"
            "#
        );
        let loaded = Manifest::parse(&text).expect("parse").build().expect("build");
        let module = &loaded.module;
        let ctx = GenericContext::empty();
        let field = module
            .resolve_field(Token(0x0A00_0001), &ctx)
            .expect("member ref binding");
        assert!(matches!(field.declaring_type, TypeSig::Generic { .. }));
        assert!(matches!(
            module.resolve_token(Token(0x1B00_0001), &ctx),
            Some(crate::backend::metadata::types::ResolvedToken::Raw(_))
        ));
    }

    #[test]
    fn test_empty_binding_rejected() {
        let text = format!("{}\n[[bindings]]\ntoken = 0x0A000002\n", SAMPLE);
        let err = Manifest::parse(&text)
            .expect("parse")
            .build()
            .expect_err("binding without a target must fail");
        assert!(matches!(err, ManifestError::BadBinding { token: 0x0A00_0002, .. }));
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("16 2A\n fe01"), Ok(vec![0x16, 0x2a, 0xfe, 0x01]));
        assert!(parse_hex("1").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(Manifest::parse("[[types]\n"), Err(ManifestError::Parse(_))));
    }
}
