//! Decoded instruction model
//!
//! The decoder and the synthetic builder both produce [`Instruction`]s, so
//! code generation consumes one shape regardless of where a body came from.

use std::sync::Arc;

use smallvec::SmallVec;

use super::opcodes::{Opcode, OpcodeDescriptor};
use crate::backend::metadata::{FieldRef, MethodRef, ResolvedToken, Token, TypeSig};

/// Handle to a placeholder in a synthetic body's label arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Jump table displacements, inline for small switches
pub type SwitchTargets = SmallVec<[i32; 8]>;

/// Immediate operand of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// 32-bit integer: constants, argument/local indices, branch
    /// displacements, unresolved tokens
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// `ldstr`: the token and the string it names
    String { token: Token, value: Arc<str> },
    Type(TypeSig),
    Method(MethodRef),
    Field(FieldRef),
    /// `ldtoken`: whichever entity kind the token named
    Token(ResolvedToken),
    /// Relative displacements of a jump table
    Switch(SwitchTargets),
    /// Branch to, or position of, a placeholder in a synthetic body
    Label(LabelId),
}

impl Operand {
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Operand::Int32(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_label(&self) -> Option<LabelId> {
        match self {
            Operand::Label(label) => Some(*label),
            _ => None,
        }
    }
}

/// A decoded or synthesized instruction
///
/// `start..end` is the instruction's byte range in its stream; `end - start`
/// is the opcode size plus the immediate width.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub start: u32,
    pub end: u32,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, start: u32, end: u32, operand: Operand) -> Self {
        Self {
            opcode,
            start,
            end,
            operand,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> OpcodeDescriptor {
        self.opcode.descriptor()
    }

    /// Encoded length in bytes
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Placeholder marker (synthetic bodies only)
    #[inline]
    pub fn is_label(&self) -> bool {
        self.opcode == Opcode::Label
    }

    /// Absolute branch targets, measured from the start of the stream
    ///
    /// Displacements are relative to the end of the instruction. Returns an
    /// empty list for non-branches and for branches still pointing at a
    /// placeholder.
    pub fn branch_targets(&self) -> SmallVec<[i64; 2]> {
        if !self.opcode.is_branch() {
            return SmallVec::new();
        }
        let base = i64::from(self.end);
        match &self.operand {
            Operand::Int32(delta) => smallvec::smallvec![base + i64::from(*delta)],
            Operand::Switch(deltas) => deltas.iter().map(|d| base + i64::from(*d)).collect(),
            _ => SmallVec::new(),
        }
    }
}
