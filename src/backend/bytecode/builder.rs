//! Synthetic IR builder
//!
//! Hand-authors method bodies that have no backing bytecode using the same
//! [`Instruction`] model the decoder produces. Branches refer to labels by
//! handle rather than by byte offset, so a forward branch needs no patching:
//! the label is placed later with [`IlBuilder::place_label`] and offsets are
//! settled once, in [`IlBuilder::finish`].
//!
//! With short branches enabled, every branch starts in its 1-byte form and
//! `finish` widens only those whose displacement does not fit, repeating
//! until the layout is stable.

use tracing::{debug, trace};

use super::error::{BuildError, BuildResult};
use super::instruction::{Instruction, LabelId, Operand};
use super::opcodes::{Opcode, OperandKind};
use crate::backend::metadata::{FieldRef, MethodRef, Parameter, TypeSig};

/// Branch condition, mapped to a (long, short) opcode pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchKind {
    Always,
    IfTrue,
    IfFalse,
    Equal,
    NotEqualUnsigned,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
    /// Exit a protected region
    Leave,
}

impl BranchKind {
    /// (long form, short form)
    pub fn forms(self) -> (Opcode, Opcode) {
        match self {
            Self::Always => (Opcode::Br, Opcode::BrS),
            Self::IfTrue => (Opcode::Brtrue, Opcode::BrtrueS),
            Self::IfFalse => (Opcode::Brfalse, Opcode::BrfalseS),
            Self::Equal => (Opcode::Beq, Opcode::BeqS),
            Self::NotEqualUnsigned => (Opcode::BneUn, Opcode::BneUnS),
            Self::GreaterOrEqual => (Opcode::Bge, Opcode::BgeS),
            Self::Greater => (Opcode::Bgt, Opcode::BgtS),
            Self::LessOrEqual => (Opcode::Ble, Opcode::BleS),
            Self::Less => (Opcode::Blt, Opcode::BltS),
            Self::Leave => (Opcode::Leave, Opcode::LeaveS),
        }
    }
}

/// Builder for one synthetic method body
#[derive(Debug)]
pub struct IlBuilder {
    name: String,
    instructions: Vec<Instruction>,
    /// Instruction index of each placed label
    labels: Vec<Option<usize>>,
    offset: u32,
    short_branches: bool,
    /// Declared parameters, not counting `this`
    pub parameters: Vec<Parameter>,
    /// Declared local variable types
    pub locals: Vec<TypeSig>,
}

impl IlBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            labels: Vec::new(),
            offset: 0,
            short_branches: true,
            parameters: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Start branches in their 1-byte form (the default) or always use 4 bytes
    pub fn with_short_branches(mut self, enabled: bool) -> Self {
        self.short_branches = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset the next instruction will start at
    #[inline]
    pub fn current_offset(&self) -> u32 {
        self.offset
    }

    /// Instructions appended so far
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Declare a local and return its index
    pub fn declare_local(&mut self, ty: TypeSig) -> BuildResult<u16> {
        if self.locals.len() >= usize::from(u16::MAX) {
            return Err(BuildError::TooManyLocals);
        }
        self.locals.push(ty);
        Ok((self.locals.len() - 1) as u16)
    }

    fn push(&mut self, opcode: Opcode, operand: Operand) {
        let start = self.offset;
        let end = start + encoded_len(opcode, &operand);
        self.offset = end;
        self.instructions.push(Instruction::new(opcode, start, end, operand));
    }

    /// Append an instruction without an immediate
    pub fn append(&mut self, opcode: Opcode) {
        debug_assert_eq!(
            opcode.operand_kind(),
            OperandKind::InlineNone,
            "{} needs an operand",
            opcode
        );
        self.push(opcode, Operand::None);
    }

    /// Append an instruction with an explicit operand
    ///
    /// Label markers are placed with [`IlBuilder::place_label`]; a marker
    /// appended here is rejected by `finish`.
    pub fn append_with(&mut self, opcode: Opcode, operand: Operand) {
        self.push(opcode, operand);
    }

    pub fn load_argument(&mut self, index: u16) {
        match index {
            0 => self.append(Opcode::Ldarg0),
            1 => self.append(Opcode::Ldarg1),
            2 => self.append(Opcode::Ldarg2),
            3 => self.append(Opcode::Ldarg3),
            4..=255 => self.push(Opcode::LdargS, Operand::Int32(i32::from(index))),
            _ => self.push(Opcode::Ldarg, Operand::Int32(i32::from(index))),
        }
    }

    pub fn load_local(&mut self, index: u16) {
        match index {
            0 => self.append(Opcode::Ldloc0),
            1 => self.append(Opcode::Ldloc1),
            2 => self.append(Opcode::Ldloc2),
            3 => self.append(Opcode::Ldloc3),
            4..=255 => self.push(Opcode::LdlocS, Operand::Int32(i32::from(index))),
            _ => self.push(Opcode::Ldloc, Operand::Int32(i32::from(index))),
        }
    }

    pub fn save_local(&mut self, index: u16) {
        match index {
            0 => self.append(Opcode::Stloc0),
            1 => self.append(Opcode::Stloc1),
            2 => self.append(Opcode::Stloc2),
            3 => self.append(Opcode::Stloc3),
            4..=255 => self.push(Opcode::StlocS, Operand::Int32(i32::from(index))),
            _ => self.push(Opcode::Stloc, Operand::Int32(i32::from(index))),
        }
    }

    pub fn load_local_address(&mut self, index: u16) {
        match index {
            0..=255 => self.push(Opcode::LdlocaS, Operand::Int32(i32::from(index))),
            _ => self.push(Opcode::Ldloca, Operand::Int32(i32::from(index))),
        }
    }

    /// Push an integer constant using the shortest encoding
    pub fn load_constant(&mut self, value: i32) {
        let opcode = match value {
            -1 => Opcode::LdcI4M1,
            0 => Opcode::LdcI4_0,
            1 => Opcode::LdcI4_1,
            2 => Opcode::LdcI4_2,
            3 => Opcode::LdcI4_3,
            4 => Opcode::LdcI4_4,
            5 => Opcode::LdcI4_5,
            6 => Opcode::LdcI4_6,
            7 => Opcode::LdcI4_7,
            8 => Opcode::LdcI4_8,
            -128..=127 => return self.push(Opcode::LdcI4S, Operand::Int32(value)),
            _ => return self.push(Opcode::LdcI4, Operand::Int32(value)),
        };
        self.append(opcode);
    }

    pub fn load_field(&mut self, field: FieldRef) {
        self.push(Opcode::Ldfld, Operand::Field(field));
    }

    pub fn save_field(&mut self, field: FieldRef) {
        self.push(Opcode::Stfld, Operand::Field(field));
    }

    pub fn call(&mut self, method: MethodRef) {
        self.push(Opcode::Call, Operand::Method(method));
    }

    /// Zero-initialize the location on top of the stack
    pub fn init_object(&mut self, ty: TypeSig) {
        self.push(Opcode::Initobj, Operand::Type(ty));
    }

    pub fn ret(&mut self) {
        self.append(Opcode::Ret);
    }

    /// Allocate a label without placing it
    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(None);
        LabelId((self.labels.len() - 1) as u32)
    }

    /// Create a label at the current position
    pub fn create_label(&mut self) -> LabelId {
        let label = self.new_label();
        self.insert_label(label);
        label
    }

    fn insert_label(&mut self, label: LabelId) {
        self.labels[label.index()] = Some(self.instructions.len());
        self.push(Opcode::Label, Operand::Label(label));
    }

    /// Place a previously allocated label at the current position
    pub fn place_label(&mut self, label: LabelId) -> BuildResult<()> {
        match self.labels.get(label.index()) {
            None => Err(BuildError::UnknownLabel { label }),
            Some(Some(_)) => Err(BuildError::LabelPlacedTwice { label }),
            Some(None) => {
                self.insert_label(label);
                Ok(())
            }
        }
    }

    /// Emit a branch to a new, not yet placed label and return the label
    pub fn branch(&mut self, kind: BranchKind) -> LabelId {
        let label = self.new_label();
        self.branch_to(kind, label);
        label
    }

    /// Emit a branch to an existing label
    pub fn branch_to(&mut self, kind: BranchKind, label: LabelId) {
        let (long, short) = kind.forms();
        let opcode = if self.short_branches { short } else { long };
        self.push(opcode, Operand::Label(label));
    }

    /// Settle branch forms and offsets and seal the body
    pub fn finish(mut self) -> BuildResult<SyntheticBody> {
        let mut positions = Vec::with_capacity(self.labels.len());
        for (index, slot) in self.labels.iter().enumerate() {
            let label = LabelId(index as u32);
            match slot {
                Some(pos) => positions.push(*pos),
                None => {
                    let referenced = self
                        .instructions
                        .iter()
                        .any(|i| i.opcode.is_branch() && i.operand.as_label() == Some(label));
                    if referenced {
                        return Err(BuildError::UnplacedLabel { label });
                    }
                    // Unused and unplaced: keep the slot, it never resolves
                    positions.push(usize::MAX);
                }
            }
        }

        for inst in &self.instructions {
            if let Some(label) = inst.operand.as_label() {
                if label.index() >= positions.len() {
                    return Err(BuildError::UnknownLabel { label });
                }
            }
        }

        // Markers only come from place_label, which records their position
        if let Some(inst) = self.instructions.iter().enumerate().find_map(|(index, i)| {
            let placed = i
                .operand
                .as_label()
                .is_some_and(|label| positions[label.index()] == index);
            (i.opcode.is_pseudo() && !placed).then_some(i)
        }) {
            return Err(BuildError::StrayLabelMarker { offset: inst.start });
        }

        if let Some(inst) = self
            .instructions
            .iter()
            .find(|i| !operand_fits(i.opcode, &i.operand))
        {
            return Err(BuildError::OperandMismatch {
                opcode: inst.opcode,
                offset: inst.start,
            });
        }

        self.relax(&positions);

        debug!(
            target: "cilfront::builder",
            name = %self.name,
            instructions = self.instructions.len(),
            size = self.offset,
            "Synthetic body finished"
        );

        Ok(SyntheticBody {
            name: self.name,
            instructions: self.instructions,
            label_positions: positions,
            parameters: self.parameters,
            locals: self.locals,
        })
    }

    /// Widen short branches whose displacement does not fit in a signed byte
    ///
    /// Widening only ever grows the body, so displacements only grow and the
    /// loop terminates after at most one pass per branch.
    fn relax(&mut self, positions: &[usize]) {
        loop {
            self.layout();
            let mut widened = false;
            for i in 0..self.instructions.len() {
                let inst = &self.instructions[i];
                if !inst.opcode.is_short_branch() {
                    continue;
                }
                let Some(label) = inst.operand.as_label() else {
                    continue;
                };
                let target = self.instructions[positions[label.index()]].start;
                let delta = i64::from(target) - i64::from(inst.end);
                if i8::try_from(delta).is_err() {
                    let long = inst.opcode.long_form();
                    trace!(target: "cilfront::builder", at = inst.start, delta, from = %inst.opcode, to = %long, "Widening branch");
                    self.instructions[i].opcode = long;
                    widened = true;
                }
            }
            if !widened {
                return;
            }
        }
    }

    /// Recompute every offset from the current forms
    fn layout(&mut self) {
        let mut offset = 0;
        for inst in &mut self.instructions {
            inst.start = offset;
            offset += encoded_len(inst.opcode, &inst.operand);
            inst.end = offset;
        }
        self.offset = offset;
    }
}

/// Whether `operand` is the shape `opcode`'s immediate decodes to
fn operand_fits(opcode: Opcode, operand: &Operand) -> bool {
    use OperandKind as K;
    match (opcode.operand_kind(), operand) {
        (K::InlineSwitch, Operand::Label(_)) => false,
        (_, Operand::Label(_)) => opcode.is_pseudo() || opcode.is_branch(),
        (K::InlineNone, Operand::None) => true,
        (
            K::ShortInlineVar
            | K::InlineVar
            | K::ShortInlineI
            | K::InlineI
            | K::ShortInlineBrTarget
            | K::InlineBrTarget
            | K::InlineSig
            | K::InlineTok,
            Operand::Int32(_),
        ) => true,
        (K::InlineI8, Operand::Int64(_))
        | (K::ShortInlineR, Operand::Float32(_))
        | (K::InlineR, Operand::Float64(_))
        | (K::InlineString, Operand::String { .. })
        | (K::InlineMethod, Operand::Method(_))
        | (K::InlineField, Operand::Field(_))
        | (K::InlineType, Operand::Type(_))
        | (K::InlineTok, Operand::Token(_))
        | (K::InlineSwitch, Operand::Switch(_)) => true,
        _ => false,
    }
}

fn encoded_len(opcode: Opcode, operand: &Operand) -> u32 {
    let mut len = opcode.size() + opcode.immediate_size();
    if let Operand::Switch(targets) = operand {
        len += 4 * targets.len();
    }
    len as u32
}

/// A finished synthetic body
///
/// Keeps its label markers; branches still refer to labels by handle and
/// resolve to offsets on demand. [`SyntheticBody::lowered`] produces the
/// decoder's shape instead.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticBody {
    name: String,
    instructions: Vec<Instruction>,
    label_positions: Vec<usize>,
    pub parameters: Vec<Parameter>,
    pub locals: Vec<TypeSig>,
}

impl SyntheticBody {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instructions including label markers
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Encoded size in bytes
    pub fn code_size(&self) -> u32 {
        self.instructions.last().map_or(0, |i| i.end)
    }

    /// Offset a label was placed at
    pub fn label_offset(&self, label: LabelId) -> Option<u32> {
        let pos = *self.label_positions.get(label.index())?;
        self.instructions.get(pos).map(|i| i.start)
    }

    /// Index in `instructions()` of a label marker
    pub fn label_position(&self, label: LabelId) -> Option<usize> {
        self.label_positions
            .get(label.index())
            .copied()
            .filter(|pos| *pos < self.instructions.len())
    }

    /// Absolute target of a branch
    pub fn branch_target(&self, inst: &Instruction) -> Option<u32> {
        if !inst.opcode.is_branch() || inst.is_label() {
            return None;
        }
        match &inst.operand {
            Operand::Label(label) => self.label_offset(*label),
            _ => inst
                .branch_targets()
                .first()
                .and_then(|t| u32::try_from(*t).ok()),
        }
    }

    /// Instructions in the decoder's shape: label markers removed and label
    /// operands rewritten into 32-bit displacements
    pub fn lowered(&self) -> Vec<Instruction> {
        self.instructions
            .iter()
            .filter(|i| !i.is_label())
            .map(|inst| match (&inst.operand, self.branch_target(inst)) {
                (Operand::Label(_), Some(target)) => Instruction::new(
                    inst.opcode,
                    inst.start,
                    inst.end,
                    Operand::Int32((i64::from(target) - i64::from(inst.end)) as i32),
                ),
                _ => inst.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::metadata::{FieldId, TypeId};

    fn field() -> FieldRef {
        FieldRef::new(FieldId(0), TypeSig::Named(TypeId(0)))
    }

    #[test]
    fn test_shortest_encodings() {
        let mut b = IlBuilder::new("enc");
        b.load_argument(0);
        b.load_argument(7);
        b.load_argument(300);
        b.load_constant(-1);
        b.load_constant(8);
        b.load_constant(-100);
        b.load_constant(1000);
        b.save_local(2);
        b.save_local(9);
        b.ret();
        let body = b.finish().expect("no labels");
        let ops: Vec<_> = body.instructions().iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            vec![
                Opcode::Ldarg0,
                Opcode::LdargS,
                Opcode::Ldarg,
                Opcode::LdcI4M1,
                Opcode::LdcI4_8,
                Opcode::LdcI4S,
                Opcode::LdcI4,
                Opcode::Stloc2,
                Opcode::StlocS,
                Opcode::Ret,
            ]
        );
        let sizes: Vec<_> = body.instructions().iter().map(|i| i.len()).collect();
        assert_eq!(sizes, vec![1, 2, 4, 1, 1, 2, 5, 1, 2, 1]);
        // Contiguous offsets
        for pair in body.instructions().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_forward_branch_resolves() {
        let mut b = IlBuilder::new("fwd");
        b.load_argument(0);
        let skip = b.branch(BranchKind::IfFalse);
        b.load_field(field());
        b.append(Opcode::Pop);
        b.place_label(skip).expect("first placement");
        b.ret();
        let body = b.finish().expect("label placed");

        let branch = &body.instructions()[1];
        assert_eq!(branch.opcode, Opcode::BrfalseS);
        assert_eq!(body.branch_target(branch), Some(9));
        assert_eq!(body.label_offset(skip), Some(9));
        assert!(body.label_position(skip).expect("placed") > 1);

        let lowered = body.lowered();
        assert_eq!(lowered.len(), 5);
        assert!(lowered.iter().all(|i| !i.is_label()));
        assert_eq!(lowered[1].operand, Operand::Int32(6));
        assert_eq!(lowered[1].branch_targets().as_slice(), &[9]);
    }

    #[test]
    fn test_backward_branch() {
        let mut b = IlBuilder::new("loop");
        let top = b.create_label();
        b.append(Opcode::Nop);
        b.branch_to(BranchKind::Always, top);
        let body = b.finish().expect("placed");
        let lowered = body.lowered();
        assert_eq!(lowered[1].operand, Operand::Int32(-3));
    }

    #[test]
    fn test_unplaced_label_rejected() {
        let mut b = IlBuilder::new("bad");
        let label = b.branch(BranchKind::Always);
        b.ret();
        assert_eq!(b.finish(), Err(BuildError::UnplacedLabel { label }));
    }

    #[test]
    fn test_label_placed_twice() {
        let mut b = IlBuilder::new("twice");
        let label = b.create_label();
        assert_eq!(b.place_label(label), Err(BuildError::LabelPlacedTwice { label }));
        assert_eq!(
            b.place_label(LabelId(9)),
            Err(BuildError::UnknownLabel { label: LabelId(9) })
        );
    }

    #[test]
    fn test_far_branch_widened() {
        let mut b = IlBuilder::new("far");
        let end = b.branch(BranchKind::Always);
        let near = b.branch(BranchKind::IfTrue);
        for _ in 0..200 {
            b.append(Opcode::Nop);
        }
        b.place_label(near).expect("placed");
        b.place_label(end).expect("placed");
        b.ret();
        let body = b.finish().expect("placed");
        let lowered = body.lowered();
        // 200 bytes of nops do not fit in a signed byte
        assert_eq!(lowered[0].opcode, Opcode::Br);
        assert_eq!(lowered[1].opcode, Opcode::Brtrue);
        assert_eq!(lowered[0].len(), 5);
        assert_eq!(lowered[0].branch_targets().as_slice(), &[210]);
        assert_eq!(lowered[1].branch_targets().as_slice(), &[210]);
    }

    #[test]
    fn test_long_branches_when_disabled() {
        let mut b = IlBuilder::new("long").with_short_branches(false);
        let l = b.branch(BranchKind::Less);
        b.place_label(l).expect("placed");
        let body = b.finish().expect("placed");
        assert_eq!(body.instructions()[0].opcode, Opcode::Blt);
        assert_eq!(body.lowered()[0].operand, Operand::Int32(0));
    }

    #[test]
    fn test_operand_mismatch_rejected() {
        let mut b = IlBuilder::new("mismatch");
        b.append(Opcode::Nop);
        b.append_with(Opcode::Ldfld, Operand::Int32(4));
        b.ret();
        assert_eq!(
            b.finish(),
            Err(BuildError::OperandMismatch {
                opcode: Opcode::Ldfld,
                offset: 1
            })
        );

        let mut b = IlBuilder::new("raw");
        b.append_with(Opcode::LdcI8, Operand::Int64(1 << 40));
        b.append_with(Opcode::BrS, Operand::Int32(0));
        b.ret();
        assert!(b.finish().is_ok());
    }

    #[test]
    fn test_switch_needs_target_table() {
        let mut b = IlBuilder::new("switch");
        let label = b.create_label();
        b.load_argument(0);
        b.append_with(Opcode::Switch, Operand::Label(label));
        b.ret();
        assert_eq!(
            b.finish(),
            Err(BuildError::OperandMismatch {
                opcode: Opcode::Switch,
                offset: 1
            })
        );
    }

    #[test]
    fn test_stray_label_marker_rejected() {
        let mut b = IlBuilder::new("stray");
        let label = b.create_label();
        b.append(Opcode::Nop);
        b.append_with(Opcode::Label, Operand::Label(label));
        b.ret();
        assert_eq!(b.finish(), Err(BuildError::StrayLabelMarker { offset: 1 }));

        let mut b = IlBuilder::new("bare");
        b.append_with(Opcode::Label, Operand::None);
        b.ret();
        assert_eq!(b.finish(), Err(BuildError::StrayLabelMarker { offset: 0 }));
    }

    #[test]
    fn test_too_many_locals() {
        let mut b = IlBuilder::new("locals");
        assert_eq!(b.declare_local(TypeSig::INT32), Ok(0));
        for expected in 1..u16::MAX {
            assert_eq!(b.declare_local(TypeSig::INT32), Ok(expected));
        }
        assert_eq!(b.locals.len(), 65535);
        assert_eq!(b.declare_local(TypeSig::INT32), Err(BuildError::TooManyLocals));
        assert_eq!(b.locals.len(), 65535);
    }
}
