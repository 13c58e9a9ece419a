//! Textual listings of instruction sequences

use std::fmt::Write as _;

use itertools::Itertools;

use super::builder::SyntheticBody;
use super::instruction::{Instruction, Operand};
use super::opcodes::OperandKind;
use crate::backend::metadata::{
    Dispatch, FieldRef, Metadata, MethodRef, ResolvedToken, Token, TypeSig,
};

fn method_text<M: Metadata + ?Sized>(module: &M, method: &MethodRef) -> String {
    let name = module
        .method_def(method.method)
        .map_or_else(|| format!("<method {}>", method.method.0), |m| m.name.clone());
    let mut text = format!("{}::{}", module.type_sig_name(&method.declaring_type), name);
    if !method.method_args.is_empty() {
        let args = method
            .method_args
            .iter()
            .map(|a| module.type_sig_name(a))
            .join(",");
        let _ = write!(text, "<{}>", args);
    }
    match method.dispatch {
        Dispatch::Direct => {}
        Dispatch::ThroughPointer { bound_instance: false } => text.push_str(" [via pointer]"),
        Dispatch::ThroughPointer { bound_instance: true } => {
            text.push_str(" [via pointer, bound]")
        }
    }
    text
}

fn field_text<M: Metadata + ?Sized>(module: &M, field: &FieldRef) -> String {
    let name = module
        .field_def(field.field)
        .map_or_else(|| format!("<field {}>", field.field.0), |f| f.name.clone());
    format!("{}::{}", module.type_sig_name(&field.declaring_type), name)
}

fn type_text<M: Metadata + ?Sized>(module: &M, ty: &TypeSig) -> String {
    module.type_sig_name(ty)
}

/// Render the operand of one instruction, with a leading space when non-empty
pub fn format_operand<M: Metadata + ?Sized>(module: &M, inst: &Instruction) -> String {
    match &inst.operand {
        Operand::None => String::new(),
        Operand::Int32(value) => match inst.opcode.operand_kind() {
            OperandKind::ShortInlineBrTarget | OperandKind::InlineBrTarget => {
                format!(" -> {:04x}", i64::from(inst.end) + i64::from(*value))
            }
            OperandKind::InlineSig => format!(" sig {}", Token(*value as u32)),
            OperandKind::InlineTok => format!(" token {}", Token(*value as u32)),
            _ => format!(" {}", value),
        },
        Operand::Int64(value) => format!(" {}", value),
        Operand::Float32(value) => format!(" {}", value),
        Operand::Float64(value) => format!(" {}", value),
        Operand::String { value, .. } => format!(" {:?}", &**value),
        Operand::Type(ty) => format!(" {}", type_text(module, ty)),
        Operand::Method(method) => format!(" {}", method_text(module, method)),
        Operand::Field(field) => format!(" {}", field_text(module, field)),
        Operand::Token(resolved) => match resolved {
            ResolvedToken::Type(ty) => format!(" type {}", type_text(module, ty)),
            ResolvedToken::Field(field) => format!(" field {}", field_text(module, field)),
            ResolvedToken::Method(method) => format!(" method {}", method_text(module, method)),
            ResolvedToken::Raw(raw) => format!(" raw {}", raw),
        },
        Operand::Switch(_) => {
            let targets = inst
                .branch_targets()
                .iter()
                .map(|t| format!("{:04x}", t))
                .join(", ");
            format!(" ({})", targets)
        }
        Operand::Label(label) => format!(" -> L{}", label.0),
    }
}

/// Render one instruction without its offset
pub fn disassemble_instruction<M: Metadata + ?Sized>(module: &M, inst: &Instruction) -> String {
    format!("{}{}", inst.opcode.mnemonic(), format_operand(module, inst))
}

/// Listing of a decoded (or lowered) instruction sequence
pub fn disassemble<M: Metadata + ?Sized>(
    module: &M,
    name: &str,
    instructions: &[Instruction],
    locals: &[TypeSig],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "=== {} ===", name);
    if !locals.is_empty() {
        let _ = writeln!(
            output,
            "locals: {}",
            locals.iter().map(|l| module.type_sig_name(l)).join(", ")
        );
    }
    for inst in instructions {
        let _ = writeln!(output, "{:04x} {}", inst.start, disassemble_instruction(module, inst));
    }
    output
}

/// Listing of a synthetic body with its labels shown
pub fn disassemble_synthetic<M: Metadata + ?Sized>(module: &M, body: &SyntheticBody) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "=== {} (synthetic) ===", body.name());
    if !body.locals.is_empty() {
        let _ = writeln!(
            output,
            "locals: {}",
            body.locals.iter().map(|l| module.type_sig_name(l)).join(", ")
        );
    }
    for inst in body.instructions() {
        if inst.is_label() {
            if let Operand::Label(label) = inst.operand {
                let _ = writeln!(output, "L{}:", label.0);
            }
            continue;
        }
        let line = disassemble_instruction(module, inst);
        match body.branch_target(inst) {
            Some(target) if matches!(inst.operand, Operand::Label(_)) => {
                let _ = writeln!(output, "{:04x} {} ({:04x})", inst.start, line, target);
            }
            _ => {
                let _ = writeln!(output, "{:04x} {}", inst.start, line);
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::builder::{BranchKind, IlBuilder};
    use crate::backend::bytecode::decoder::decode_all;
    use crate::backend::metadata::{
        GenericContext, MetadataModule, MethodDef, TypeDef, TypeKind,
    };

    #[test]
    fn test_listing() {
        let mut module = MetadataModule::new("listing");
        let ty = module.add_type(TypeDef::new("Demo", "Program", TypeKind::Class));
        let run = module.add_method(MethodDef::new("Run", ty));
        let hello = module.add_string("hello");

        let mut bytes = vec![0x72];
        bytes.extend_from_slice(&hello.0.to_le_bytes());
        bytes.push(0x28);
        bytes.extend_from_slice(&MetadataModule::method_token(run).0.to_le_bytes());
        bytes.extend_from_slice(&[0x2B, 0x00, 0x2A]);

        let code = decode_all(&bytes, &module, &GenericContext::empty()).expect("decodes");
        let listing = disassemble(&module, "Demo.Program::Main", &code, &[TypeSig::INT32]);
        assert_eq!(
            listing,
            "=== Demo.Program::Main ===\n\
             locals: int32\n\
             0000 ldstr \"hello\"\n\
             0005 call Demo.Program::Run\n\
             000a br.s -> 000c\n\
             000c ret\n"
        );
    }

    #[test]
    fn test_synthetic_listing_shows_labels() {
        let module = MetadataModule::new("listing");
        let mut b = IlBuilder::new("thunk");
        let l = b.branch(BranchKind::Always);
        b.place_label(l).expect("placed");
        b.ret();
        let body = b.finish().expect("finished");
        assert_eq!(
            disassemble_synthetic(&module, &body),
            "=== thunk (synthetic) ===\n0000 br.s -> L0 (0002)\nL0:\n0002 ret\n"
        );
    }
}
