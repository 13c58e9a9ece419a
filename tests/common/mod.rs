#![allow(dead_code)]

//! Shared fixtures for integration tests
//!
//! Builds a small module by hand: the runtime delegate base types, one
//! single-target and one multicast delegate, and a program whose bodies are
//! real instruction streams.
use std::sync::Arc;

use cilfront::backend::metadata::{
    MetadataModule, MethodAttributes, MethodDef, MethodId, MethodSignature, Parameter, Token,
    TypeDef, TypeId, TypeKind, TypeSig,
};

/// Ids of everything the fixture declares
pub struct Fixture {
    pub module: MetadataModule,
    pub object: TypeId,
    pub delegate: TypeId,
    pub multicast_delegate: TypeId,
    pub callback: TypeId,
    pub callback_ctor: MethodId,
    pub callback_invoke: MethodId,
    pub callback_begin: MethodId,
    pub callback_end: MethodId,
    pub handler: TypeId,
    pub handler_invoke: MethodId,
    pub program: TypeId,
    pub main: MethodId,
    pub twice: MethodId,
}

/// Append `opcode` followed by the little-endian token
pub fn with_token(bytes: &mut Vec<u8>, opcode: &[u8], token: Token) {
    bytes.extend_from_slice(opcode);
    bytes.extend_from_slice(&token.0.to_le_bytes());
}

pub fn signature(return_type: TypeSig, parameters: Vec<Parameter>, has_this: bool) -> MethodSignature {
    MethodSignature {
        return_type,
        parameters,
        has_this,
    }
}

/// Runtime-implemented method, the way delegate members are declared
pub fn runtime_method(name: &str, declaring: TypeId, sig: MethodSignature) -> MethodDef {
    let mut def = MethodDef::new(name, declaring);
    def.attributes = MethodAttributes {
        is_external: true,
        ..Default::default()
    };
    def.signature = Some(sig);
    def
}

fn delegate_type(module: &mut MetadataModule, name: &str, base: TypeId) -> TypeId {
    let mut def = TypeDef::new("Demo", name, TypeKind::Delegate);
    def.base = Some(TypeSig::Named(base));
    module.add_type(def)
}

fn constructor(module: &mut MetadataModule, declaring: TypeId) -> MethodId {
    module.add_method(runtime_method(
        ".ctor",
        declaring,
        signature(
            TypeSig::VOID,
            vec![
                Parameter::new("object", TypeSig::OBJECT),
                Parameter::new("method", TypeSig::INTPTR),
            ],
            true,
        ),
    ))
}

pub fn fixture() -> Fixture {
    let mut module = MetadataModule::new("fixture");

    let object = module.add_type(TypeDef::new("System", "Object", TypeKind::Class));

    let mut delegate = TypeDef::new("System", "Delegate", TypeKind::Class);
    delegate.base = Some(TypeSig::Named(object));
    let delegate = module.add_type(delegate);
    module.add_field(delegate, "_target", TypeSig::OBJECT, false);
    module.add_field(delegate, "_methodPtr", TypeSig::INTPTR, false);

    let mut multicast_delegate = TypeDef::new("System", "MulticastDelegate", TypeKind::Class);
    multicast_delegate.base = Some(TypeSig::Named(delegate));
    let multicast_delegate = module.add_type(multicast_delegate);
    module.add_field(multicast_delegate, "_invocationCount", TypeSig::INT32, false);
    module.add_field(
        multicast_delegate,
        "_invocationList",
        TypeSig::SzArray(Box::new(TypeSig::Named(multicast_delegate))),
        false,
    );

    // int32 Callback(int32 x)
    let callback = delegate_type(&mut module, "Callback", delegate);
    let callback_ctor = constructor(&mut module, callback);
    let callback_invoke = module.add_method(runtime_method(
        "Invoke",
        callback,
        signature(TypeSig::INT32, vec![Parameter::new("x", TypeSig::INT32)], true),
    ));
    let callback_begin = module.add_method(runtime_method(
        "BeginInvoke",
        callback,
        signature(
            TypeSig::OBJECT,
            vec![
                Parameter::new("x", TypeSig::INT32),
                Parameter::new("callback", TypeSig::OBJECT),
                Parameter::new("state", TypeSig::OBJECT),
            ],
            true,
        ),
    ));
    let callback_end = module.add_method(runtime_method(
        "EndInvoke",
        callback,
        signature(TypeSig::INT32, vec![Parameter::new("result", TypeSig::OBJECT)], true),
    ));

    // void Handler(object sender, int32 code)
    let handler = delegate_type(&mut module, "Handler", multicast_delegate);
    constructor(&mut module, handler);
    let handler_invoke = module.add_method(runtime_method(
        "Invoke",
        handler,
        signature(
            TypeSig::VOID,
            vec![
                Parameter::new("sender", TypeSig::OBJECT),
                Parameter::new("code", TypeSig::INT32),
            ],
            true,
        ),
    ));

    let program = module.add_type(TypeDef::new("Demo", "Program", TypeKind::Class));

    let mut twice = MethodDef::new("Twice", program);
    twice.signature = Some(signature(
        TypeSig::INT32,
        vec![Parameter::new("x", TypeSig::INT32)],
        false,
    ));
    twice.attributes.is_static = true;
    // ldarg.0; ldc.i4.2; mul; ret
    twice.body = Some(Arc::from(vec![0x02, 0x18, 0x5A, 0x2A]));
    let twice = module.add_method(twice);

    let mut main = MethodDef::new("Main", program);
    main.signature = Some(signature(TypeSig::VOID, vec![], false));
    main.attributes.is_static = true;
    let main = module.add_method(main);

    // ldnull; ldftn Twice; newobj Callback::.ctor; ldc.i4.s 5;
    // callvirt Callback::Invoke; pop; ret
    let mut code = vec![0x14];
    with_token(&mut code, &[0xFE, 0x06], MetadataModule::method_token(twice));
    with_token(&mut code, &[0x73], MetadataModule::method_token(callback_ctor));
    code.extend_from_slice(&[0x1F, 0x05]);
    with_token(&mut code, &[0x6F], MetadataModule::method_token(callback_invoke));
    code.extend_from_slice(&[0x26, 0x2A]);
    if let Some(def) = module.method_def_mut(main) {
        def.body = Some(Arc::from(code));
    }

    Fixture {
        module,
        object,
        delegate,
        multicast_delegate,
        callback,
        callback_ctor,
        callback_invoke,
        callback_begin,
        callback_end,
        handler,
        handler_invoke,
        program,
        main,
        twice,
    }
}
