//! Translation unit tests over the hand-built fixture

mod common;

use cilfront::backend::bytecode::{IlBuilder, MethodBody, Opcode};
use cilfront::backend::config::FrontendConfig;
use cilfront::backend::metadata::{Metadata, MethodDef, TypeSig};
use cilfront::backend::units::{DeclarationOrigin, UnitBuilder, UnitError};
use common::fixture;

#[test]
fn test_one_unit_per_type() {
    let f = fixture();
    let units = UnitBuilder::new(&f.module, FrontendConfig::default())
        .build()
        .unwrap();
    let types: Vec<_> = units.iter().map(|u| u.ty).collect();
    assert_eq!(
        types,
        vec![
            f.object,
            f.delegate,
            f.multicast_delegate,
            f.callback,
            f.handler,
            f.program
        ]
    );

    let program = units.iter().find(|u| u.ty == f.program).unwrap();
    assert!(program.declarations.iter().all(|d| d.origin == DeclarationOrigin::Raw));
    let main = program.definition(f.main).unwrap();
    assert!(!main.synthetic);
    assert_eq!(main.instructions.len(), 7);
    assert_eq!(main.instructions.last().map(|i| i.opcode), Some(Opcode::Ret));

    let handler = units.iter().find(|u| u.ty == f.handler).unwrap();
    assert_eq!(handler.definitions.len(), 2);
    assert!(handler.definitions.iter().all(|d| d.synthetic));
    assert_eq!(handler.declaration_only().count(), 0);
}

#[test]
fn test_body_override_wins() {
    let f = fixture();
    let mut b = IlBuilder::new("Demo.Program::Main");
    b.load_constant(0);
    b.append(Opcode::Pop);
    b.ret();
    let replacement = MethodBody::from(b.finish().unwrap());

    let unit = UnitBuilder::new(&f.module, FrontendConfig::default())
        .with_body_override(f.main, replacement)
        .build_type(f.program)
        .unwrap();
    let main = unit.definition(f.main).unwrap();
    assert!(main.synthetic);
    let opcodes: Vec<_> = main.instructions.iter().map(|i| i.opcode).collect();
    assert_eq!(opcodes, vec![Opcode::LdcI4_0, Opcode::Pop, Opcode::Ret]);

    // Overrides also replace delegate synthesis
    let mut stub = IlBuilder::new("Demo.Callback::Invoke");
    stub.load_constant(7);
    stub.ret();
    let unit = UnitBuilder::new(&f.module, FrontendConfig::default())
        .with_body_override(f.callback_invoke, MethodBody::from(stub.finish().unwrap()))
        .build_type(f.callback)
        .unwrap();
    let invoke = unit.definition(f.callback_invoke).unwrap();
    assert_eq!(invoke.instructions.len(), 2);
}

#[test]
fn test_bodyless_method_is_declaration_only() {
    let mut f = fixture();
    let mut shape = MethodDef::new("Area", f.program);
    shape.signature = Some(common::signature(TypeSig::INT32, vec![], true));
    shape.attributes.is_abstract = true;
    let area = f.module.add_method(shape);

    let unit = UnitBuilder::new(&f.module, FrontendConfig::default())
        .build_type(f.program)
        .unwrap();
    assert!(unit.definition(area).is_none());
    let only: Vec<_> = unit.declaration_only().map(|d| d.method).collect();
    assert_eq!(only, vec![area]);
    assert_eq!(
        unit.declaration(area).map(|d| d.text.as_str()),
        Some("int32 Demo.Program::Area()")
    );
}

#[test]
fn test_decode_error_surfaces_with_method_name() {
    let mut f = fixture();
    if let Some(def) = f.module.method_def_mut(f.twice) {
        def.body = Some(std::sync::Arc::from(vec![0x02, 0xFE]));
    }
    let err = UnitBuilder::new(&f.module, FrontendConfig::default())
        .build_type(f.program)
        .unwrap_err();
    match err {
        UnitError::Decode { method, source } => {
            assert_eq!(method, f.module.method_name(f.twice));
            assert_eq!(source.offset(), 1);
        }
        other => panic!("expected decode error, got {}", other),
    }
}

#[test]
fn test_parallel_build_keeps_type_order() {
    let f = fixture();
    let sequential = UnitBuilder::new(&f.module, FrontendConfig::default())
        .build_sequential()
        .unwrap();
    let parallel = UnitBuilder::new(&f.module, FrontendConfig::default())
        .build_parallel()
        .unwrap();
    assert_eq!(sequential, parallel);
}
