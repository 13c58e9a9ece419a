//! Delegate thunk templates
//!
//! Delegate types declare `.ctor`, `Invoke`, `BeginInvoke` and `EndInvoke`
//! as runtime-implemented methods. The front end gives them bodies built
//! with [`IlBuilder`]:
//!
//! - `.ctor` stores the bound target and function pointer
//! - `Invoke` calls through the stored pointer, with or without the bound
//!   target; on types carrying an invocation list it first walks the chain
//! - anything else returns the default value of its return type
//!
//! The delegate's shape is resolved before any instruction is emitted, so a
//! type that does not follow the conventions fails up front.

use tracing::debug;

use super::builder::{BranchKind, IlBuilder, SyntheticBody};
use super::error::{BuildError, BuildResult};
use super::opcodes::Opcode;
use crate::backend::config::{DelegateConventions, FrontendConfig};
use crate::backend::metadata::{
    FieldRef, Metadata, MethodId, MethodRef, MethodSignature, Parameter, TypeId, TypeSig,
};

/// Names of the runtime-implemented delegate members
const CONSTRUCTOR: &str = ".ctor";
const BEGIN_INVOKE: &str = "BeginInvoke";
const END_INVOKE: &str = "EndInvoke";

/// Backing fields of a multicast delegate
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationList {
    pub count: FieldRef,
    pub list: FieldRef,
}

/// Resolved members of a delegate type
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateShape {
    pub delegate: TypeId,
    pub display_name: String,
    pub target: FieldRef,
    pub method_ptr: FieldRef,
    pub invocation_list: Option<InvocationList>,
    pub invoke: MethodRef,
    pub signature: MethodSignature,
}

impl DelegateShape {
    /// Resolve the members the templates need, walking base types for fields
    pub fn resolve<M: Metadata + ?Sized>(
        module: &M,
        delegate: TypeId,
        conventions: &DelegateConventions,
    ) -> BuildResult<Self> {
        let display_name = module.type_name(delegate);
        let def = module
            .type_def(delegate)
            .ok_or_else(|| BuildError::DanglingReference(display_name.clone()))?;
        if !def.is_delegate() {
            return Err(BuildError::NotADelegate { ty: display_name });
        }

        let field = |name: &str| -> Option<FieldRef> {
            let id = module.field_by_name(delegate, name, true)?;
            let owner = module.field_def(id)?.declaring;
            Some(FieldRef::new(id, TypeSig::Named(owner)))
        };
        let required = |name: &str| -> BuildResult<FieldRef> {
            field(name).ok_or_else(|| BuildError::MissingDelegateField {
                delegate: display_name.clone(),
                field: name.to_string(),
            })
        };

        let target = required(&conventions.target_field)?;
        let method_ptr = required(&conventions.method_ptr_field)?;
        let invocation_list = match (
            field(&conventions.invocation_count_field),
            field(&conventions.invocation_list_field),
        ) {
            (Some(count), Some(list)) => Some(InvocationList { count, list }),
            _ => None,
        };

        let invoke_id = module
            .method_by_name(delegate, &conventions.invoke_method)
            .ok_or_else(|| BuildError::MissingInvokeMethod {
                delegate: display_name.clone(),
                method: conventions.invoke_method.clone(),
            })?;
        let signature = module
            .method_def(invoke_id)
            .and_then(|m| m.signature.clone())
            .ok_or_else(|| BuildError::MissingSignature {
                method: module.method_name(invoke_id),
            })?;

        Ok(Self {
            delegate,
            display_name,
            target,
            method_ptr,
            invocation_list,
            invoke: MethodRef::direct(invoke_id, TypeSig::Named(delegate)),
            signature,
        })
    }

    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.invocation_list.is_some()
    }

    fn parameter_count(&self) -> u16 {
        self.signature.parameters.len() as u16
    }
}

/// Whether the runtime expects the front end to supply this method's body
pub fn is_delegate_function_body<M: Metadata + ?Sized>(
    module: &M,
    method: MethodId,
    conventions: &DelegateConventions,
) -> bool {
    let Some(def) = module.method_def(method) else {
        return false;
    };
    def.attributes.is_external
        && module.type_def(def.declaring).is_some_and(|t| t.is_delegate())
        && (def.name == CONSTRUCTOR
            || def.name == conventions.invoke_method
            || def.name == BEGIN_INVOKE
            || def.name == END_INVOKE)
}

/// Build the body of a delegate function, or None if `method` is not one
pub fn synthesize_body<M: Metadata + ?Sized>(
    module: &M,
    method: MethodId,
    config: &FrontendConfig,
) -> BuildResult<Option<SyntheticBody>> {
    let conventions = &config.delegate;
    if !is_delegate_function_body(module, method, conventions) {
        return Ok(None);
    }
    let def = module
        .method_def(method)
        .ok_or_else(|| BuildError::DanglingReference(format!("method #{}", method.0)))?;
    let name = module.method_name(method);
    debug!(target: "cilfront::delegate", method = %name, "Synthesizing delegate body");

    let body = if def.name == CONSTRUCTOR {
        let shape = DelegateShape::resolve(module, def.declaring, conventions)?;
        constructor_thunk(&shape, new_builder(&name, config))?
    } else if def.name == conventions.invoke_method {
        let shape = DelegateShape::resolve(module, def.declaring, conventions)?;
        if shape.is_multicast() {
            multicast_invoke_thunk(&shape, new_builder(&name, config))?
        } else {
            invoke_thunk(&shape, new_builder(&name, config))?
        }
    } else {
        let signature = def
            .signature
            .as_ref()
            .ok_or_else(|| BuildError::MissingSignature { method: name.clone() })?;
        default_stub(signature, new_builder(&name, config))?
    };
    Ok(Some(body))
}

fn new_builder(name: &str, config: &FrontendConfig) -> IlBuilder {
    IlBuilder::new(name).with_short_branches(config.short_branches)
}

/// `.ctor(object target, native int method)`
///
/// `ldarg.0, ldarg.1, stfld target, ldarg.0, ldarg.2, stfld methodPtr, ret`
pub fn constructor_thunk(shape: &DelegateShape, mut b: IlBuilder) -> BuildResult<SyntheticBody> {
    b.parameters = vec![
        Parameter::new("object", TypeSig::OBJECT),
        Parameter::new("method", TypeSig::INTPTR),
    ];
    b.load_argument(0);
    b.load_argument(1);
    b.save_field(shape.target.clone());
    b.load_argument(0);
    b.load_argument(2);
    b.save_field(shape.method_ptr.clone());
    b.ret();
    b.finish()
}

/// Load every declared argument of the invocation method
fn forward_arguments(shape: &DelegateShape, b: &mut IlBuilder) {
    for index in 1..=shape.parameter_count() {
        b.load_argument(index);
    }
}

/// Call through the stored pointer with or without the bound target
///
/// Leaves the result in `result` (when the signature is non-void) and falls
/// through to a single join point.
fn emit_direct_dispatch(shape: &DelegateShape, b: &mut IlBuilder, result: Option<u16>) -> BuildResult<()> {
    b.load_argument(0);
    b.load_field(shape.target.clone());
    let bound = b.branch(BranchKind::IfTrue);

    forward_arguments(shape, b);
    b.call(shape.invoke.through_pointer(false));
    if let Some(local) = result {
        b.save_local(local);
    }
    let join = b.branch(BranchKind::Always);

    b.place_label(bound)?;
    forward_arguments(shape, b);
    b.call(shape.invoke.through_pointer(true));
    if let Some(local) = result {
        b.save_local(local);
    }

    b.place_label(join)
}

fn emit_return(b: &mut IlBuilder, result: Option<u16>) {
    if let Some(local) = result {
        b.load_local(local);
    }
    b.ret();
}

/// `Invoke` for a delegate without an invocation list
pub fn invoke_thunk(shape: &DelegateShape, mut b: IlBuilder) -> BuildResult<SyntheticBody> {
    b.parameters = shape.signature.parameters.clone();
    let return_type = &shape.signature.return_type;
    let result = if return_type.is_void() {
        None
    } else {
        Some(b.declare_local(return_type.clone())?)
    };

    emit_direct_dispatch(shape, &mut b, result)?;
    emit_return(&mut b, result);
    b.finish()
}

/// `Invoke` for a delegate that may carry an invocation list
///
/// Locals: `0` is the loop counter, `1` (non-void only) holds the last
/// result; both the single-target path and the loop return through it.
pub fn multicast_invoke_thunk(shape: &DelegateShape, mut b: IlBuilder) -> BuildResult<SyntheticBody> {
    let chain = shape
        .invocation_list
        .as_ref()
        .ok_or_else(|| BuildError::MissingDelegateField {
            delegate: shape.display_name.clone(),
            field: "invocation list".to_string(),
        })?;

    b.parameters = shape.signature.parameters.clone();
    let counter = b.declare_local(TypeSig::INT32)?;
    let return_type = &shape.signature.return_type;
    let result = if return_type.is_void() {
        None
    } else {
        Some(b.declare_local(return_type.clone())?)
    };

    b.load_argument(0);
    b.load_field(chain.count.clone());
    let multi = b.branch(BranchKind::IfTrue);

    emit_direct_dispatch(shape, &mut b, result)?;
    emit_return(&mut b, result);

    b.place_label(multi)?;
    b.load_constant(0);
    b.save_local(counter);
    let cond = b.branch(BranchKind::Always);

    let top = b.create_label();
    b.load_argument(0);
    b.load_field(chain.list.clone());
    b.load_local(counter);
    b.append(Opcode::LdelemRef);
    forward_arguments(shape, &mut b);
    b.call(shape.invoke.clone());
    if let Some(local) = result {
        b.save_local(local);
    }
    b.load_local(counter);
    b.load_constant(1);
    b.append(Opcode::Add);
    b.save_local(counter);

    b.place_label(cond)?;
    b.load_local(counter);
    b.load_argument(0);
    b.load_field(chain.count.clone());
    b.branch_to(BranchKind::Less, top);

    emit_return(&mut b, result);
    b.finish()
}

/// Return the default value of the return type
///
/// `initobj` on a reference-typed local stores null, so one sequence covers
/// every return type.
pub fn default_stub(signature: &MethodSignature, mut b: IlBuilder) -> BuildResult<SyntheticBody> {
    b.parameters = signature.parameters.clone();
    if !signature.return_type.is_void() {
        let local = b.declare_local(signature.return_type.clone())?;
        b.load_local_address(local);
        b.init_object(signature.return_type.clone());
        b.load_local(local);
    }
    b.ret();
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::instruction::Operand;
    use crate::backend::metadata::{
        Dispatch, MetadataModule, MethodAttributes, MethodDef, TypeDef, TypeKind,
    };

    struct Fixture {
        module: MetadataModule,
        unicast: TypeId,
        multicast: TypeId,
        plain: TypeId,
    }

    fn external(name: &str, declaring: TypeId, signature: MethodSignature) -> MethodDef {
        let mut def = MethodDef::new(name, declaring);
        def.attributes = MethodAttributes {
            is_external: true,
            ..Default::default()
        };
        def.signature = Some(signature);
        def
    }

    fn fixture() -> Fixture {
        let mut module = MetadataModule::new("delegates");
        let base = module.add_type(TypeDef::new("System", "Delegate", TypeKind::Class));
        module.add_field(base, "_target", TypeSig::OBJECT, false);
        module.add_field(base, "_methodPtr", TypeSig::INTPTR, false);

        let mut multi_base = TypeDef::new("System", "MulticastDelegate", TypeKind::Class);
        multi_base.base = Some(TypeSig::Named(base));
        let multi_base = module.add_type(multi_base);
        module.add_field(multi_base, "_invocationCount", TypeSig::INT32, false);
        module.add_field(
            multi_base,
            "_invocationList",
            TypeSig::SzArray(Box::new(TypeSig::Named(multi_base))),
            false,
        );

        let sig = |ret: TypeSig| MethodSignature {
            return_type: ret,
            parameters: vec![Parameter::new("x", TypeSig::INT32)],
            has_this: true,
        };

        let mut unicast = TypeDef::new("Demo", "Func", TypeKind::Delegate);
        unicast.base = Some(TypeSig::Named(base));
        let unicast = module.add_type(unicast);
        module.add_method(external("Invoke", unicast, sig(TypeSig::INT32)));

        let mut multicast = TypeDef::new("Demo", "Handler", TypeKind::Delegate);
        multicast.base = Some(TypeSig::Named(multi_base));
        let multicast = module.add_type(multicast);
        module.add_method(external("Invoke", multicast, sig(TypeSig::INT32)));

        let plain = module.add_type(TypeDef::new("Demo", "NotADelegate", TypeKind::Class));

        Fixture {
            module,
            unicast,
            multicast,
            plain,
        }
    }

    fn opcodes(body: &SyntheticBody) -> Vec<Opcode> {
        body.instructions().iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_constructor_thunk() {
        let f = fixture();
        let shape = DelegateShape::resolve(&f.module, f.unicast, &DelegateConventions::default())
            .expect("shape");
        let body = constructor_thunk(&shape, IlBuilder::new("ctor")).expect("ctor");
        assert_eq!(
            opcodes(&body),
            vec![
                Opcode::Ldarg0,
                Opcode::Ldarg1,
                Opcode::Stfld,
                Opcode::Ldarg0,
                Opcode::Ldarg2,
                Opcode::Stfld,
                Opcode::Ret,
            ]
        );
        assert_eq!(body.instructions()[2].operand, Operand::Field(shape.target.clone()));
        assert_eq!(body.instructions()[5].operand, Operand::Field(shape.method_ptr.clone()));
        assert_eq!(body.parameters.len(), 2);
    }

    #[test]
    fn test_invoke_thunk_arms() {
        let f = fixture();
        let shape = DelegateShape::resolve(&f.module, f.unicast, &DelegateConventions::default())
            .expect("shape");
        assert!(!shape.is_multicast());
        let body = invoke_thunk(&shape, IlBuilder::new("invoke")).expect("invoke");
        assert_eq!(body.locals, vec![TypeSig::INT32]);

        let dispatches: Vec<Dispatch> = body
            .instructions()
            .iter()
            .filter_map(|i| match &i.operand {
                Operand::Method(m) => Some(m.dispatch),
                _ => None,
            })
            .collect();
        assert_eq!(
            dispatches,
            vec![
                Dispatch::ThroughPointer { bound_instance: false },
                Dispatch::ThroughPointer { bound_instance: true },
            ]
        );

        let lowered = body.lowered();
        let last = &lowered[lowered.len() - 2..];
        assert_eq!(last[0].opcode, Opcode::Ldloc0);
        assert_eq!(last[1].opcode, Opcode::Ret);
        assert_eq!(lowered.iter().filter(|i| i.opcode == Opcode::Ret).count(), 1);
    }

    #[test]
    fn test_multicast_single_result_local() {
        let f = fixture();
        let shape = DelegateShape::resolve(&f.module, f.multicast, &DelegateConventions::default())
            .expect("shape");
        assert!(shape.is_multicast());
        let body = multicast_invoke_thunk(&shape, IlBuilder::new("invoke")).expect("invoke");
        assert_eq!(body.locals, vec![TypeSig::INT32, TypeSig::INT32]);

        let lowered = body.lowered();
        let n = lowered.len();
        assert_eq!(lowered[n - 1].opcode, Opcode::Ret);
        assert_eq!(lowered[n - 2].opcode, Opcode::Ldloc1, "returns the captured result");
        assert_eq!(lowered[n - 3].opcode, Opcode::BltS);
        // Loop branch goes backwards
        let targets = lowered[n - 3].branch_targets();
        assert!(targets[0] < i64::from(lowered[n - 3].start));
    }

    #[test]
    fn test_shape_errors() {
        let f = fixture();
        let conventions = DelegateConventions::default();
        assert!(matches!(
            DelegateShape::resolve(&f.module, f.plain, &conventions),
            Err(BuildError::NotADelegate { .. })
        ));

        let renamed = DelegateConventions {
            method_ptr_field: "_fnPtr".to_string(),
            ..DelegateConventions::default()
        };
        assert_eq!(
            DelegateShape::resolve(&f.module, f.unicast, &renamed),
            Err(BuildError::MissingDelegateField {
                delegate: "Demo.Func".to_string(),
                field: "_fnPtr".to_string(),
            })
        );
    }

    #[test]
    fn test_default_stub() {
        let sig = MethodSignature {
            return_type: TypeSig::OBJECT,
            parameters: vec![],
            has_this: true,
        };
        let body = default_stub(&sig, IlBuilder::new("end")).expect("stub");
        assert_eq!(
            opcodes(&body),
            vec![Opcode::LdlocaS, Opcode::Initobj, Opcode::Ldloc0, Opcode::Ret]
        );

        let void = MethodSignature {
            return_type: TypeSig::VOID,
            parameters: vec![],
            has_this: true,
        };
        let body = default_stub(&void, IlBuilder::new("begin")).expect("stub");
        assert_eq!(opcodes(&body), vec![Opcode::Ret]);
    }

    #[test]
    fn test_synthesize_only_delegate_bodies() {
        let mut f = fixture();
        let config = FrontendConfig::default();
        let invoke = f.module.method_by_name(f.unicast, "Invoke").expect("invoke");
        assert!(synthesize_body(&f.module, invoke, &config).expect("ok").is_some());

        let sig = MethodSignature {
            return_type: TypeSig::VOID,
            parameters: vec![],
            has_this: true,
        };
        let managed = f.module.add_method({
            let mut def = MethodDef::new("Invoke", f.plain);
            def.signature = Some(sig);
            def
        });
        assert!(!is_delegate_function_body(&f.module, managed, &config.delegate));
        assert_eq!(synthesize_body(&f.module, managed, &config), Ok(None));
    }
}
