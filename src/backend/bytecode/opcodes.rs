//! CIL opcode table
//!
//! Single-byte instructions occupy codes 0x00-0xE0. Instructions reached
//! through the 0xFE escape byte get the compact code `0x100 + second byte`,
//! so every instruction has exactly one numeric code and one descriptor.
//! Both lookup tables are built at compile time and never mutated.

use std::fmt;

/// First byte of every two-byte instruction
pub const ESCAPE_BYTE: u8 = 0xFE;

/// Compact code of the first extended instruction (`0xFE 0x00`)
pub const EXTENDED_BASE: u16 = 0x100;

/// Number of slots in the extended table (second bytes 0x00-0x1F)
const EXTENDED_SLOTS: usize = 0x20;

/// CIL instruction
///
/// Discriminants are compact codes: the byte itself for single-byte
/// instructions, `0x100 + second byte` for escaped ones.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // === Base instructions (0x00-0x01) ===
    /// No operation
    Nop = 0x00,
    /// Debugger breakpoint
    Break = 0x01,

    // === Arguments and locals (0x02-0x13) ===
    Ldarg0 = 0x02,
    Ldarg1 = 0x03,
    Ldarg2 = 0x04,
    Ldarg3 = 0x05,
    Ldloc0 = 0x06,
    Ldloc1 = 0x07,
    Ldloc2 = 0x08,
    Ldloc3 = 0x09,
    Stloc0 = 0x0A,
    Stloc1 = 0x0B,
    Stloc2 = 0x0C,
    Stloc3 = 0x0D,
    /// Load argument, 1-byte index
    LdargS = 0x0E,
    LdargaS = 0x0F,
    StargS = 0x10,
    LdlocS = 0x11,
    LdlocaS = 0x12,
    StlocS = 0x13,

    // === Constants (0x14-0x23) ===
    Ldnull = 0x14,
    LdcI4M1 = 0x15,
    LdcI4_0 = 0x16,
    LdcI4_1 = 0x17,
    LdcI4_2 = 0x18,
    LdcI4_3 = 0x19,
    LdcI4_4 = 0x1A,
    LdcI4_5 = 0x1B,
    LdcI4_6 = 0x1C,
    LdcI4_7 = 0x1D,
    LdcI4_8 = 0x1E,
    /// Push sign-extended 1-byte integer
    LdcI4S = 0x1F,
    /// Push 4-byte integer
    LdcI4 = 0x20,
    /// Push 8-byte integer
    LdcI8 = 0x21,
    /// Push 4-byte float
    LdcR4 = 0x22,
    /// Push 8-byte float
    LdcR8 = 0x23,

    // === Stack (0x25-0x26) ===
    Dup = 0x25,
    Pop = 0x26,

    // === Calls and return (0x27-0x2A) ===
    /// Exit current method and jump to another with the same arguments
    Jmp = 0x27,
    Call = 0x28,
    /// Indirect call through a function pointer, operand is a standalone signature token
    Calli = 0x29,
    /// Return from method
    Ret = 0x2A,

    // === Short branches (0x2B-0x37) ===
    /// Unconditional branch, 1-byte displacement
    BrS = 0x2B,
    BrfalseS = 0x2C,
    BrtrueS = 0x2D,
    BeqS = 0x2E,
    BgeS = 0x2F,
    BgtS = 0x30,
    BleS = 0x31,
    BltS = 0x32,
    BneUnS = 0x33,
    BgeUnS = 0x34,
    BgtUnS = 0x35,
    BleUnS = 0x36,
    BltUnS = 0x37,

    // === Long branches and switch (0x38-0x45) ===
    /// Unconditional branch, 4-byte displacement
    Br = 0x38,
    Brfalse = 0x39,
    Brtrue = 0x3A,
    Beq = 0x3B,
    Bge = 0x3C,
    Bgt = 0x3D,
    Ble = 0x3E,
    Blt = 0x3F,
    BneUn = 0x40,
    BgeUn = 0x41,
    BgtUn = 0x42,
    BleUn = 0x43,
    BltUn = 0x44,
    /// Jump table: 4-byte count followed by count 4-byte displacements
    Switch = 0x45,

    // === Indirect loads and stores (0x46-0x57) ===
    LdindI1 = 0x46,
    LdindU1 = 0x47,
    LdindI2 = 0x48,
    LdindU2 = 0x49,
    LdindI4 = 0x4A,
    LdindU4 = 0x4B,
    LdindI8 = 0x4C,
    LdindI = 0x4D,
    LdindR4 = 0x4E,
    LdindR8 = 0x4F,
    LdindRef = 0x50,
    StindRef = 0x51,
    StindI1 = 0x52,
    StindI2 = 0x53,
    StindI4 = 0x54,
    StindI8 = 0x55,
    StindR4 = 0x56,
    StindR8 = 0x57,

    // === Arithmetic, bitwise and conversions (0x58-0x6E) ===
    Add = 0x58,
    Sub = 0x59,
    Mul = 0x5A,
    Div = 0x5B,
    DivUn = 0x5C,
    Rem = 0x5D,
    RemUn = 0x5E,
    And = 0x5F,
    Or = 0x60,
    Xor = 0x61,
    Shl = 0x62,
    Shr = 0x63,
    ShrUn = 0x64,
    Neg = 0x65,
    Not = 0x66,
    ConvI1 = 0x67,
    ConvI2 = 0x68,
    ConvI4 = 0x69,
    ConvI8 = 0x6A,
    ConvR4 = 0x6B,
    ConvR8 = 0x6C,
    ConvU4 = 0x6D,
    ConvU8 = 0x6E,

    // === Object model (0x6F-0x81) ===
    Callvirt = 0x6F,
    Cpobj = 0x70,
    Ldobj = 0x71,
    /// Load a user string
    Ldstr = 0x72,
    /// Allocate and call a constructor
    Newobj = 0x73,
    Castclass = 0x74,
    Isinst = 0x75,
    ConvRUn = 0x76,
    Unbox = 0x79,
    Throw = 0x7A,
    Ldfld = 0x7B,
    Ldflda = 0x7C,
    Stfld = 0x7D,
    Ldsfld = 0x7E,
    Ldsflda = 0x7F,
    Stsfld = 0x80,
    Stobj = 0x81,

    // === Unsigned overflow conversions (0x82-0x8B) ===
    ConvOvfI1Un = 0x82,
    ConvOvfI2Un = 0x83,
    ConvOvfI4Un = 0x84,
    ConvOvfI8Un = 0x85,
    ConvOvfU1Un = 0x86,
    ConvOvfU2Un = 0x87,
    ConvOvfU4Un = 0x88,
    ConvOvfU8Un = 0x89,
    ConvOvfIUn = 0x8A,
    ConvOvfUUn = 0x8B,

    // === Arrays and boxing (0x8C-0xA5) ===
    Box = 0x8C,
    Newarr = 0x8D,
    Ldlen = 0x8E,
    Ldelema = 0x8F,
    LdelemI1 = 0x90,
    LdelemU1 = 0x91,
    LdelemI2 = 0x92,
    LdelemU2 = 0x93,
    LdelemI4 = 0x94,
    LdelemU4 = 0x95,
    LdelemI8 = 0x96,
    LdelemI = 0x97,
    LdelemR4 = 0x98,
    LdelemR8 = 0x99,
    LdelemRef = 0x9A,
    StelemI = 0x9B,
    StelemI1 = 0x9C,
    StelemI2 = 0x9D,
    StelemI4 = 0x9E,
    StelemI8 = 0x9F,
    StelemR4 = 0xA0,
    StelemR8 = 0xA1,
    StelemRef = 0xA2,
    Ldelem = 0xA3,
    Stelem = 0xA4,
    UnboxAny = 0xA5,

    // === Overflow conversions (0xB3-0xBA) ===
    ConvOvfI1 = 0xB3,
    ConvOvfU1 = 0xB4,
    ConvOvfI2 = 0xB5,
    ConvOvfU2 = 0xB6,
    ConvOvfI4 = 0xB7,
    ConvOvfU4 = 0xB8,
    ConvOvfI8 = 0xB9,
    ConvOvfU8 = 0xBA,

    // === Typed references and tokens (0xC2-0xD0) ===
    Refanyval = 0xC2,
    Ckfinite = 0xC3,
    Mkrefany = 0xC6,
    /// Load a runtime handle for a type, field or method token
    Ldtoken = 0xD0,

    // === Conversions, overflow arithmetic, exception blocks (0xD1-0xE0) ===
    ConvU2 = 0xD1,
    ConvU1 = 0xD2,
    ConvI = 0xD3,
    ConvOvfI = 0xD4,
    ConvOvfU = 0xD5,
    AddOvf = 0xD6,
    AddOvfUn = 0xD7,
    MulOvf = 0xD8,
    MulOvfUn = 0xD9,
    SubOvf = 0xDA,
    SubOvfUn = 0xDB,
    /// End of a finally or fault handler
    Endfinally = 0xDC,
    /// Exit a protected region
    Leave = 0xDD,
    LeaveS = 0xDE,
    StindI = 0xDF,
    ConvU = 0xE0,

    // === Extended instructions (0xFE prefix, 0xFE00-0xFE1E) ===
    Arglist = 0x100,
    Ceq = 0x101,
    Cgt = 0x102,
    CgtUn = 0x103,
    Clt = 0x104,
    CltUn = 0x105,
    Ldftn = 0x106,
    Ldvirtftn = 0x107,
    /// Load argument, 4-byte index
    Ldarg = 0x109,
    Ldarga = 0x10A,
    Starg = 0x10B,
    Ldloc = 0x10C,
    Ldloca = 0x10D,
    Stloc = 0x10E,
    Localloc = 0x10F,
    Endfilter = 0x111,
    /// Prefix: next access may be unaligned, 1-byte alignment
    Unaligned = 0x112,
    /// Prefix: the access that follows is volatile
    Volatile = 0x113,
    /// Prefix: the call that follows is a tail call
    Tail = 0x114,
    Initobj = 0x115,
    /// Prefix: constrain the virtual call that follows to a type
    Constrained = 0x116,
    Cpblk = 0x117,
    Initblk = 0x118,
    /// Prefix: the type, range or null check that follows may be skipped
    No = 0x119,
    Rethrow = 0x11A,
    Sizeof = 0x11C,
    Refanytype = 0x11D,
    /// Prefix: the element address that follows is read-only
    Readonly = 0x11E,

    // === Pseudo instructions (never encoded) ===
    /// Zero-size branch target marker used by synthetic bodies
    Label = 0x1FF,
}

/// Encoding of an instruction's immediate operand
///
/// Names follow the operand type names of the instruction set definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    InlineNone,
    /// 1-byte unsigned argument or local index
    ShortInlineVar,
    /// 4-byte argument or local index
    InlineVar,
    /// 1-byte integer
    ShortInlineI,
    /// 4-byte integer
    InlineI,
    /// 8-byte integer
    InlineI8,
    /// 4-byte float
    ShortInlineR,
    /// 8-byte float
    InlineR,
    /// 1-byte signed branch displacement
    ShortInlineBrTarget,
    /// 4-byte signed branch displacement
    InlineBrTarget,
    /// User string token
    InlineString,
    /// Method token
    InlineMethod,
    /// Field token
    InlineField,
    /// Type token
    InlineType,
    /// Type, field or method token
    InlineTok,
    /// Standalone signature token
    InlineSig,
    /// 4-byte count followed by that many 4-byte displacements
    InlineSwitch,
}

impl OperandKind {
    /// Width of the immediate in bytes
    ///
    /// For `InlineSwitch` this is the width of the count only; the full width
    /// is `4 + 4 * count`.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            Self::InlineNone => 0,
            Self::ShortInlineVar | Self::ShortInlineI | Self::ShortInlineBrTarget => 1,
            Self::InlineVar
            | Self::InlineI
            | Self::ShortInlineR
            | Self::InlineBrTarget
            | Self::InlineString
            | Self::InlineMethod
            | Self::InlineField
            | Self::InlineType
            | Self::InlineTok
            | Self::InlineSig
            | Self::InlineSwitch => 4,
            Self::InlineI8 | Self::InlineR => 8,
        }
    }
}

/// Control-flow class of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Falls through to the next instruction
    Next,
    /// Debugger break, then falls through
    Break,
    /// Unconditional branch
    Branch,
    /// Conditional branch or jump table
    CondBranch,
    Call,
    Return,
    Throw,
    /// Prefix or pseudo instruction
    Meta,
}

/// Static facts about one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    pub opcode: Opcode,
    /// Compact numeric code
    pub code: u16,
    pub mnemonic: &'static str,
    /// Encoded size of the opcode itself (0 for pseudo instructions)
    pub size: usize,
    pub operand: OperandKind,
    pub flow: FlowKind,
}

impl Opcode {
    /// Look up a compact code, returns None if unmapped
    #[inline]
    pub fn lookup(code: u16) -> Option<Self> {
        if code < EXTENDED_BASE {
            SINGLE_BYTE_TABLE[code as usize]
        } else {
            EXTENDED_TABLE
                .get((code - EXTENDED_BASE) as usize)
                .copied()
                .flatten()
        }
    }

    /// Convert a single byte to an opcode, returns None if invalid
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        SINGLE_BYTE_TABLE[byte as usize]
    }

    /// Convert the byte following the escape byte to an opcode
    #[inline]
    pub fn from_extended_byte(byte: u8) -> Option<Self> {
        EXTENDED_TABLE.get(byte as usize).copied().flatten()
    }

    /// Compact numeric code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether the instruction is encoded with the escape byte
    #[inline]
    pub fn is_extended(self) -> bool {
        self.code() >= EXTENDED_BASE && self != Self::Label
    }

    #[inline]
    pub fn is_pseudo(self) -> bool {
        self == Self::Label
    }

    /// Encoded size of the opcode bytes, excluding the immediate
    #[inline]
    pub fn size(self) -> usize {
        if self.is_pseudo() {
            0
        } else if self.is_extended() {
            2
        } else {
            1
        }
    }

    /// Append the opcode bytes (not the immediate) to `out`
    pub fn encode(self, out: &mut Vec<u8>) {
        if self.is_pseudo() {
            return;
        }
        if self.is_extended() {
            out.push(ESCAPE_BYTE);
            out.push((self.code() - EXTENDED_BASE) as u8);
        } else {
            out.push(self.code() as u8);
        }
    }

    /// Encoding of the immediate operand
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Self::LdargS | Self::LdargaS | Self::StargS | Self::LdlocS | Self::LdlocaS
            | Self::StlocS => OperandKind::ShortInlineVar,

            Self::Ldarg | Self::Ldarga | Self::Starg | Self::Ldloc | Self::Ldloca | Self::Stloc => {
                OperandKind::InlineVar
            }

            Self::LdcI4S | Self::Unaligned | Self::No => OperandKind::ShortInlineI,
            Self::LdcI4 => OperandKind::InlineI,
            Self::LdcI8 => OperandKind::InlineI8,
            Self::LdcR4 => OperandKind::ShortInlineR,
            Self::LdcR8 => OperandKind::InlineR,

            Self::BrS | Self::BrfalseS | Self::BrtrueS | Self::BeqS | Self::BgeS | Self::BgtS
            | Self::BleS | Self::BltS | Self::BneUnS | Self::BgeUnS | Self::BgtUnS
            | Self::BleUnS | Self::BltUnS | Self::LeaveS => OperandKind::ShortInlineBrTarget,

            Self::Br | Self::Brfalse | Self::Brtrue | Self::Beq | Self::Bge | Self::Bgt
            | Self::Ble | Self::Blt | Self::BneUn | Self::BgeUn | Self::BgtUn | Self::BleUn
            | Self::BltUn | Self::Leave => OperandKind::InlineBrTarget,

            Self::Switch => OperandKind::InlineSwitch,
            Self::Ldstr => OperandKind::InlineString,

            Self::Jmp | Self::Call | Self::Callvirt | Self::Newobj | Self::Ldftn
            | Self::Ldvirtftn => OperandKind::InlineMethod,

            Self::Calli => OperandKind::InlineSig,

            Self::Ldfld | Self::Ldflda | Self::Stfld | Self::Ldsfld | Self::Ldsflda
            | Self::Stsfld => OperandKind::InlineField,

            Self::Ldtoken => OperandKind::InlineTok,

            Self::Cpobj | Self::Ldobj | Self::Castclass | Self::Isinst | Self::Unbox
            | Self::Stobj | Self::Box | Self::Newarr | Self::Ldelema | Self::Ldelem
            | Self::Stelem | Self::UnboxAny | Self::Refanyval | Self::Mkrefany | Self::Initobj
            | Self::Constrained | Self::Sizeof => OperandKind::InlineType,

            _ => OperandKind::InlineNone,
        }
    }

    /// Get the number of immediate bytes following this opcode
    ///
    /// For `switch` only the count is included.
    #[inline]
    pub fn immediate_size(self) -> usize {
        self.operand_kind().width()
    }

    /// Control-flow class
    pub fn flow(self) -> FlowKind {
        match self {
            Self::Break => FlowKind::Break,
            Self::Br | Self::BrS | Self::Leave | Self::LeaveS => FlowKind::Branch,
            Self::Jmp | Self::Call | Self::Callvirt | Self::Calli | Self::Newobj => FlowKind::Call,
            Self::Ret | Self::Endfinally | Self::Endfilter => FlowKind::Return,
            Self::Throw | Self::Rethrow => FlowKind::Throw,
            Self::Unaligned
            | Self::Volatile
            | Self::Tail
            | Self::Constrained
            | Self::No
            | Self::Readonly
            | Self::Label => FlowKind::Meta,
            _ if self.is_branch() => FlowKind::CondBranch,
            _ => FlowKind::Next,
        }
    }

    /// Get the mnemonic name for this opcode
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Break => "break",
            Self::Ldarg0 => "ldarg.0",
            Self::Ldarg1 => "ldarg.1",
            Self::Ldarg2 => "ldarg.2",
            Self::Ldarg3 => "ldarg.3",
            Self::Ldloc0 => "ldloc.0",
            Self::Ldloc1 => "ldloc.1",
            Self::Ldloc2 => "ldloc.2",
            Self::Ldloc3 => "ldloc.3",
            Self::Stloc0 => "stloc.0",
            Self::Stloc1 => "stloc.1",
            Self::Stloc2 => "stloc.2",
            Self::Stloc3 => "stloc.3",
            Self::LdargS => "ldarg.s",
            Self::LdargaS => "ldarga.s",
            Self::StargS => "starg.s",
            Self::LdlocS => "ldloc.s",
            Self::LdlocaS => "ldloca.s",
            Self::StlocS => "stloc.s",
            Self::Ldnull => "ldnull",
            Self::LdcI4M1 => "ldc.i4.m1",
            Self::LdcI4_0 => "ldc.i4.0",
            Self::LdcI4_1 => "ldc.i4.1",
            Self::LdcI4_2 => "ldc.i4.2",
            Self::LdcI4_3 => "ldc.i4.3",
            Self::LdcI4_4 => "ldc.i4.4",
            Self::LdcI4_5 => "ldc.i4.5",
            Self::LdcI4_6 => "ldc.i4.6",
            Self::LdcI4_7 => "ldc.i4.7",
            Self::LdcI4_8 => "ldc.i4.8",
            Self::LdcI4S => "ldc.i4.s",
            Self::LdcI4 => "ldc.i4",
            Self::LdcI8 => "ldc.i8",
            Self::LdcR4 => "ldc.r4",
            Self::LdcR8 => "ldc.r8",
            Self::Dup => "dup",
            Self::Pop => "pop",
            Self::Jmp => "jmp",
            Self::Call => "call",
            Self::Calli => "calli",
            Self::Ret => "ret",
            Self::BrS => "br.s",
            Self::BrfalseS => "brfalse.s",
            Self::BrtrueS => "brtrue.s",
            Self::BeqS => "beq.s",
            Self::BgeS => "bge.s",
            Self::BgtS => "bgt.s",
            Self::BleS => "ble.s",
            Self::BltS => "blt.s",
            Self::BneUnS => "bne.un.s",
            Self::BgeUnS => "bge.un.s",
            Self::BgtUnS => "bgt.un.s",
            Self::BleUnS => "ble.un.s",
            Self::BltUnS => "blt.un.s",
            Self::Br => "br",
            Self::Brfalse => "brfalse",
            Self::Brtrue => "brtrue",
            Self::Beq => "beq",
            Self::Bge => "bge",
            Self::Bgt => "bgt",
            Self::Ble => "ble",
            Self::Blt => "blt",
            Self::BneUn => "bne.un",
            Self::BgeUn => "bge.un",
            Self::BgtUn => "bgt.un",
            Self::BleUn => "ble.un",
            Self::BltUn => "blt.un",
            Self::Switch => "switch",
            Self::LdindI1 => "ldind.i1",
            Self::LdindU1 => "ldind.u1",
            Self::LdindI2 => "ldind.i2",
            Self::LdindU2 => "ldind.u2",
            Self::LdindI4 => "ldind.i4",
            Self::LdindU4 => "ldind.u4",
            Self::LdindI8 => "ldind.i8",
            Self::LdindI => "ldind.i",
            Self::LdindR4 => "ldind.r4",
            Self::LdindR8 => "ldind.r8",
            Self::LdindRef => "ldind.ref",
            Self::StindRef => "stind.ref",
            Self::StindI1 => "stind.i1",
            Self::StindI2 => "stind.i2",
            Self::StindI4 => "stind.i4",
            Self::StindI8 => "stind.i8",
            Self::StindR4 => "stind.r4",
            Self::StindR8 => "stind.r8",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::DivUn => "div.un",
            Self::Rem => "rem",
            Self::RemUn => "rem.un",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::ShrUn => "shr.un",
            Self::Neg => "neg",
            Self::Not => "not",
            Self::ConvI1 => "conv.i1",
            Self::ConvI2 => "conv.i2",
            Self::ConvI4 => "conv.i4",
            Self::ConvI8 => "conv.i8",
            Self::ConvR4 => "conv.r4",
            Self::ConvR8 => "conv.r8",
            Self::ConvU4 => "conv.u4",
            Self::ConvU8 => "conv.u8",
            Self::Callvirt => "callvirt",
            Self::Cpobj => "cpobj",
            Self::Ldobj => "ldobj",
            Self::Ldstr => "ldstr",
            Self::Newobj => "newobj",
            Self::Castclass => "castclass",
            Self::Isinst => "isinst",
            Self::ConvRUn => "conv.r.un",
            Self::Unbox => "unbox",
            Self::Throw => "throw",
            Self::Ldfld => "ldfld",
            Self::Ldflda => "ldflda",
            Self::Stfld => "stfld",
            Self::Ldsfld => "ldsfld",
            Self::Ldsflda => "ldsflda",
            Self::Stsfld => "stsfld",
            Self::Stobj => "stobj",
            Self::ConvOvfI1Un => "conv.ovf.i1.un",
            Self::ConvOvfI2Un => "conv.ovf.i2.un",
            Self::ConvOvfI4Un => "conv.ovf.i4.un",
            Self::ConvOvfI8Un => "conv.ovf.i8.un",
            Self::ConvOvfU1Un => "conv.ovf.u1.un",
            Self::ConvOvfU2Un => "conv.ovf.u2.un",
            Self::ConvOvfU4Un => "conv.ovf.u4.un",
            Self::ConvOvfU8Un => "conv.ovf.u8.un",
            Self::ConvOvfIUn => "conv.ovf.i.un",
            Self::ConvOvfUUn => "conv.ovf.u.un",
            Self::Box => "box",
            Self::Newarr => "newarr",
            Self::Ldlen => "ldlen",
            Self::Ldelema => "ldelema",
            Self::LdelemI1 => "ldelem.i1",
            Self::LdelemU1 => "ldelem.u1",
            Self::LdelemI2 => "ldelem.i2",
            Self::LdelemU2 => "ldelem.u2",
            Self::LdelemI4 => "ldelem.i4",
            Self::LdelemU4 => "ldelem.u4",
            Self::LdelemI8 => "ldelem.i8",
            Self::LdelemI => "ldelem.i",
            Self::LdelemR4 => "ldelem.r4",
            Self::LdelemR8 => "ldelem.r8",
            Self::LdelemRef => "ldelem.ref",
            Self::StelemI => "stelem.i",
            Self::StelemI1 => "stelem.i1",
            Self::StelemI2 => "stelem.i2",
            Self::StelemI4 => "stelem.i4",
            Self::StelemI8 => "stelem.i8",
            Self::StelemR4 => "stelem.r4",
            Self::StelemR8 => "stelem.r8",
            Self::StelemRef => "stelem.ref",
            Self::Ldelem => "ldelem",
            Self::Stelem => "stelem",
            Self::UnboxAny => "unbox.any",
            Self::ConvOvfI1 => "conv.ovf.i1",
            Self::ConvOvfU1 => "conv.ovf.u1",
            Self::ConvOvfI2 => "conv.ovf.i2",
            Self::ConvOvfU2 => "conv.ovf.u2",
            Self::ConvOvfI4 => "conv.ovf.i4",
            Self::ConvOvfU4 => "conv.ovf.u4",
            Self::ConvOvfI8 => "conv.ovf.i8",
            Self::ConvOvfU8 => "conv.ovf.u8",
            Self::Refanyval => "refanyval",
            Self::Ckfinite => "ckfinite",
            Self::Mkrefany => "mkrefany",
            Self::Ldtoken => "ldtoken",
            Self::ConvU2 => "conv.u2",
            Self::ConvU1 => "conv.u1",
            Self::ConvI => "conv.i",
            Self::ConvOvfI => "conv.ovf.i",
            Self::ConvOvfU => "conv.ovf.u",
            Self::AddOvf => "add.ovf",
            Self::AddOvfUn => "add.ovf.un",
            Self::MulOvf => "mul.ovf",
            Self::MulOvfUn => "mul.ovf.un",
            Self::SubOvf => "sub.ovf",
            Self::SubOvfUn => "sub.ovf.un",
            Self::Endfinally => "endfinally",
            Self::Leave => "leave",
            Self::LeaveS => "leave.s",
            Self::StindI => "stind.i",
            Self::ConvU => "conv.u",
            Self::Arglist => "arglist",
            Self::Ceq => "ceq",
            Self::Cgt => "cgt",
            Self::CgtUn => "cgt.un",
            Self::Clt => "clt",
            Self::CltUn => "clt.un",
            Self::Ldftn => "ldftn",
            Self::Ldvirtftn => "ldvirtftn",
            Self::Ldarg => "ldarg",
            Self::Ldarga => "ldarga",
            Self::Starg => "starg",
            Self::Ldloc => "ldloc",
            Self::Ldloca => "ldloca",
            Self::Stloc => "stloc",
            Self::Localloc => "localloc",
            Self::Endfilter => "endfilter",
            Self::Unaligned => "unaligned.",
            Self::Volatile => "volatile.",
            Self::Tail => "tail.",
            Self::Initobj => "initobj",
            Self::Constrained => "constrained.",
            Self::Cpblk => "cpblk",
            Self::Initblk => "initblk",
            Self::No => "no.",
            Self::Rethrow => "rethrow",
            Self::Sizeof => "sizeof",
            Self::Refanytype => "refanytype",
            Self::Readonly => "readonly.",
            Self::Label => "label",
        }
    }

    /// Full static descriptor
    pub fn descriptor(self) -> OpcodeDescriptor {
        OpcodeDescriptor {
            opcode: self,
            code: self.code(),
            mnemonic: self.mnemonic(),
            size: self.size(),
            operand: self.operand_kind(),
            flow: self.flow(),
        }
    }

    /// Check if this opcode carries branch displacements
    #[inline]
    pub fn is_branch(self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::ShortInlineBrTarget | OperandKind::InlineBrTarget | OperandKind::InlineSwitch
        )
    }

    /// Check if this opcode is a 1-byte displacement branch
    #[inline]
    pub fn is_short_branch(self) -> bool {
        self.operand_kind() == OperandKind::ShortInlineBrTarget
    }

    /// Check if this opcode is a call instruction
    #[inline]
    pub fn is_call(self) -> bool {
        self.flow() == FlowKind::Call
    }

    /// Check if this opcode is a prefix for the instruction that follows
    #[inline]
    pub fn is_prefix(self) -> bool {
        matches!(
            self,
            Self::Unaligned
                | Self::Volatile
                | Self::Tail
                | Self::Constrained
                | Self::No
                | Self::Readonly
        )
    }

    /// Check if control never falls through to the next instruction
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self.flow(), FlowKind::Branch | FlowKind::Return | FlowKind::Throw)
            || self == Self::Jmp
    }

    /// 4-byte displacement form of a short branch; other opcodes map to themselves
    pub fn long_form(self) -> Self {
        match self {
            Self::BrS => Self::Br,
            Self::BrfalseS => Self::Brfalse,
            Self::BrtrueS => Self::Brtrue,
            Self::BeqS => Self::Beq,
            Self::BgeS => Self::Bge,
            Self::BgtS => Self::Bgt,
            Self::BleS => Self::Ble,
            Self::BltS => Self::Blt,
            Self::BneUnS => Self::BneUn,
            Self::BgeUnS => Self::BgeUn,
            Self::BgtUnS => Self::BgtUn,
            Self::BleUnS => Self::BleUn,
            Self::BltUnS => Self::BltUn,
            Self::LeaveS => Self::Leave,
            other => other,
        }
    }

    /// 1-byte displacement form of a long branch, if there is one
    pub fn short_form(self) -> Option<Self> {
        let short = match self {
            Self::Br => Self::BrS,
            Self::Brfalse => Self::BrfalseS,
            Self::Brtrue => Self::BrtrueS,
            Self::Beq => Self::BeqS,
            Self::Bge => Self::BgeS,
            Self::Bgt => Self::BgtS,
            Self::Ble => Self::BleS,
            Self::Blt => Self::BltS,
            Self::BneUn => Self::BneUnS,
            Self::BgeUn => Self::BgeUnS,
            Self::BgtUn => Self::BgtUnS,
            Self::BleUn => Self::BleUnS,
            Self::BltUn => Self::BltUnS,
            Self::Leave => Self::LeaveS,
            _ => return None,
        };
        Some(short)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Lookup table for single-byte codes
static SINGLE_BYTE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];

    table[0x00] = Some(Opcode::Nop);
    table[0x01] = Some(Opcode::Break);
    table[0x02] = Some(Opcode::Ldarg0);
    table[0x03] = Some(Opcode::Ldarg1);
    table[0x04] = Some(Opcode::Ldarg2);
    table[0x05] = Some(Opcode::Ldarg3);
    table[0x06] = Some(Opcode::Ldloc0);
    table[0x07] = Some(Opcode::Ldloc1);
    table[0x08] = Some(Opcode::Ldloc2);
    table[0x09] = Some(Opcode::Ldloc3);
    table[0x0A] = Some(Opcode::Stloc0);
    table[0x0B] = Some(Opcode::Stloc1);
    table[0x0C] = Some(Opcode::Stloc2);
    table[0x0D] = Some(Opcode::Stloc3);
    table[0x0E] = Some(Opcode::LdargS);
    table[0x0F] = Some(Opcode::LdargaS);
    table[0x10] = Some(Opcode::StargS);
    table[0x11] = Some(Opcode::LdlocS);
    table[0x12] = Some(Opcode::LdlocaS);
    table[0x13] = Some(Opcode::StlocS);
    table[0x14] = Some(Opcode::Ldnull);
    table[0x15] = Some(Opcode::LdcI4M1);
    table[0x16] = Some(Opcode::LdcI4_0);
    table[0x17] = Some(Opcode::LdcI4_1);
    table[0x18] = Some(Opcode::LdcI4_2);
    table[0x19] = Some(Opcode::LdcI4_3);
    table[0x1A] = Some(Opcode::LdcI4_4);
    table[0x1B] = Some(Opcode::LdcI4_5);
    table[0x1C] = Some(Opcode::LdcI4_6);
    table[0x1D] = Some(Opcode::LdcI4_7);
    table[0x1E] = Some(Opcode::LdcI4_8);
    table[0x1F] = Some(Opcode::LdcI4S);
    table[0x20] = Some(Opcode::LdcI4);
    table[0x21] = Some(Opcode::LdcI8);
    table[0x22] = Some(Opcode::LdcR4);
    table[0x23] = Some(Opcode::LdcR8);
    table[0x25] = Some(Opcode::Dup);
    table[0x26] = Some(Opcode::Pop);
    table[0x27] = Some(Opcode::Jmp);
    table[0x28] = Some(Opcode::Call);
    table[0x29] = Some(Opcode::Calli);
    table[0x2A] = Some(Opcode::Ret);
    table[0x2B] = Some(Opcode::BrS);
    table[0x2C] = Some(Opcode::BrfalseS);
    table[0x2D] = Some(Opcode::BrtrueS);
    table[0x2E] = Some(Opcode::BeqS);
    table[0x2F] = Some(Opcode::BgeS);
    table[0x30] = Some(Opcode::BgtS);
    table[0x31] = Some(Opcode::BleS);
    table[0x32] = Some(Opcode::BltS);
    table[0x33] = Some(Opcode::BneUnS);
    table[0x34] = Some(Opcode::BgeUnS);
    table[0x35] = Some(Opcode::BgtUnS);
    table[0x36] = Some(Opcode::BleUnS);
    table[0x37] = Some(Opcode::BltUnS);
    table[0x38] = Some(Opcode::Br);
    table[0x39] = Some(Opcode::Brfalse);
    table[0x3A] = Some(Opcode::Brtrue);
    table[0x3B] = Some(Opcode::Beq);
    table[0x3C] = Some(Opcode::Bge);
    table[0x3D] = Some(Opcode::Bgt);
    table[0x3E] = Some(Opcode::Ble);
    table[0x3F] = Some(Opcode::Blt);
    table[0x40] = Some(Opcode::BneUn);
    table[0x41] = Some(Opcode::BgeUn);
    table[0x42] = Some(Opcode::BgtUn);
    table[0x43] = Some(Opcode::BleUn);
    table[0x44] = Some(Opcode::BltUn);
    table[0x45] = Some(Opcode::Switch);
    table[0x46] = Some(Opcode::LdindI1);
    table[0x47] = Some(Opcode::LdindU1);
    table[0x48] = Some(Opcode::LdindI2);
    table[0x49] = Some(Opcode::LdindU2);
    table[0x4A] = Some(Opcode::LdindI4);
    table[0x4B] = Some(Opcode::LdindU4);
    table[0x4C] = Some(Opcode::LdindI8);
    table[0x4D] = Some(Opcode::LdindI);
    table[0x4E] = Some(Opcode::LdindR4);
    table[0x4F] = Some(Opcode::LdindR8);
    table[0x50] = Some(Opcode::LdindRef);
    table[0x51] = Some(Opcode::StindRef);
    table[0x52] = Some(Opcode::StindI1);
    table[0x53] = Some(Opcode::StindI2);
    table[0x54] = Some(Opcode::StindI4);
    table[0x55] = Some(Opcode::StindI8);
    table[0x56] = Some(Opcode::StindR4);
    table[0x57] = Some(Opcode::StindR8);
    table[0x58] = Some(Opcode::Add);
    table[0x59] = Some(Opcode::Sub);
    table[0x5A] = Some(Opcode::Mul);
    table[0x5B] = Some(Opcode::Div);
    table[0x5C] = Some(Opcode::DivUn);
    table[0x5D] = Some(Opcode::Rem);
    table[0x5E] = Some(Opcode::RemUn);
    table[0x5F] = Some(Opcode::And);
    table[0x60] = Some(Opcode::Or);
    table[0x61] = Some(Opcode::Xor);
    table[0x62] = Some(Opcode::Shl);
    table[0x63] = Some(Opcode::Shr);
    table[0x64] = Some(Opcode::ShrUn);
    table[0x65] = Some(Opcode::Neg);
    table[0x66] = Some(Opcode::Not);
    table[0x67] = Some(Opcode::ConvI1);
    table[0x68] = Some(Opcode::ConvI2);
    table[0x69] = Some(Opcode::ConvI4);
    table[0x6A] = Some(Opcode::ConvI8);
    table[0x6B] = Some(Opcode::ConvR4);
    table[0x6C] = Some(Opcode::ConvR8);
    table[0x6D] = Some(Opcode::ConvU4);
    table[0x6E] = Some(Opcode::ConvU8);
    table[0x6F] = Some(Opcode::Callvirt);
    table[0x70] = Some(Opcode::Cpobj);
    table[0x71] = Some(Opcode::Ldobj);
    table[0x72] = Some(Opcode::Ldstr);
    table[0x73] = Some(Opcode::Newobj);
    table[0x74] = Some(Opcode::Castclass);
    table[0x75] = Some(Opcode::Isinst);
    table[0x76] = Some(Opcode::ConvRUn);
    table[0x79] = Some(Opcode::Unbox);
    table[0x7A] = Some(Opcode::Throw);
    table[0x7B] = Some(Opcode::Ldfld);
    table[0x7C] = Some(Opcode::Ldflda);
    table[0x7D] = Some(Opcode::Stfld);
    table[0x7E] = Some(Opcode::Ldsfld);
    table[0x7F] = Some(Opcode::Ldsflda);
    table[0x80] = Some(Opcode::Stsfld);
    table[0x81] = Some(Opcode::Stobj);
    table[0x82] = Some(Opcode::ConvOvfI1Un);
    table[0x83] = Some(Opcode::ConvOvfI2Un);
    table[0x84] = Some(Opcode::ConvOvfI4Un);
    table[0x85] = Some(Opcode::ConvOvfI8Un);
    table[0x86] = Some(Opcode::ConvOvfU1Un);
    table[0x87] = Some(Opcode::ConvOvfU2Un);
    table[0x88] = Some(Opcode::ConvOvfU4Un);
    table[0x89] = Some(Opcode::ConvOvfU8Un);
    table[0x8A] = Some(Opcode::ConvOvfIUn);
    table[0x8B] = Some(Opcode::ConvOvfUUn);
    table[0x8C] = Some(Opcode::Box);
    table[0x8D] = Some(Opcode::Newarr);
    table[0x8E] = Some(Opcode::Ldlen);
    table[0x8F] = Some(Opcode::Ldelema);
    table[0x90] = Some(Opcode::LdelemI1);
    table[0x91] = Some(Opcode::LdelemU1);
    table[0x92] = Some(Opcode::LdelemI2);
    table[0x93] = Some(Opcode::LdelemU2);
    table[0x94] = Some(Opcode::LdelemI4);
    table[0x95] = Some(Opcode::LdelemU4);
    table[0x96] = Some(Opcode::LdelemI8);
    table[0x97] = Some(Opcode::LdelemI);
    table[0x98] = Some(Opcode::LdelemR4);
    table[0x99] = Some(Opcode::LdelemR8);
    table[0x9A] = Some(Opcode::LdelemRef);
    table[0x9B] = Some(Opcode::StelemI);
    table[0x9C] = Some(Opcode::StelemI1);
    table[0x9D] = Some(Opcode::StelemI2);
    table[0x9E] = Some(Opcode::StelemI4);
    table[0x9F] = Some(Opcode::StelemI8);
    table[0xA0] = Some(Opcode::StelemR4);
    table[0xA1] = Some(Opcode::StelemR8);
    table[0xA2] = Some(Opcode::StelemRef);
    table[0xA3] = Some(Opcode::Ldelem);
    table[0xA4] = Some(Opcode::Stelem);
    table[0xA5] = Some(Opcode::UnboxAny);
    table[0xB3] = Some(Opcode::ConvOvfI1);
    table[0xB4] = Some(Opcode::ConvOvfU1);
    table[0xB5] = Some(Opcode::ConvOvfI2);
    table[0xB6] = Some(Opcode::ConvOvfU2);
    table[0xB7] = Some(Opcode::ConvOvfI4);
    table[0xB8] = Some(Opcode::ConvOvfU4);
    table[0xB9] = Some(Opcode::ConvOvfI8);
    table[0xBA] = Some(Opcode::ConvOvfU8);
    table[0xC2] = Some(Opcode::Refanyval);
    table[0xC3] = Some(Opcode::Ckfinite);
    table[0xC6] = Some(Opcode::Mkrefany);
    table[0xD0] = Some(Opcode::Ldtoken);
    table[0xD1] = Some(Opcode::ConvU2);
    table[0xD2] = Some(Opcode::ConvU1);
    table[0xD3] = Some(Opcode::ConvI);
    table[0xD4] = Some(Opcode::ConvOvfI);
    table[0xD5] = Some(Opcode::ConvOvfU);
    table[0xD6] = Some(Opcode::AddOvf);
    table[0xD7] = Some(Opcode::AddOvfUn);
    table[0xD8] = Some(Opcode::MulOvf);
    table[0xD9] = Some(Opcode::MulOvfUn);
    table[0xDA] = Some(Opcode::SubOvf);
    table[0xDB] = Some(Opcode::SubOvfUn);
    table[0xDC] = Some(Opcode::Endfinally);
    table[0xDD] = Some(Opcode::Leave);
    table[0xDE] = Some(Opcode::LeaveS);
    table[0xDF] = Some(Opcode::StindI);
    table[0xE0] = Some(Opcode::ConvU);

    table
};

/// Lookup table for the byte following the escape byte
static EXTENDED_TABLE: [Option<Opcode>; EXTENDED_SLOTS] = {
    let mut table = [None; EXTENDED_SLOTS];

    table[0x00] = Some(Opcode::Arglist);
    table[0x01] = Some(Opcode::Ceq);
    table[0x02] = Some(Opcode::Cgt);
    table[0x03] = Some(Opcode::CgtUn);
    table[0x04] = Some(Opcode::Clt);
    table[0x05] = Some(Opcode::CltUn);
    table[0x06] = Some(Opcode::Ldftn);
    table[0x07] = Some(Opcode::Ldvirtftn);
    table[0x09] = Some(Opcode::Ldarg);
    table[0x0A] = Some(Opcode::Ldarga);
    table[0x0B] = Some(Opcode::Starg);
    table[0x0C] = Some(Opcode::Ldloc);
    table[0x0D] = Some(Opcode::Ldloca);
    table[0x0E] = Some(Opcode::Stloc);
    table[0x0F] = Some(Opcode::Localloc);
    table[0x11] = Some(Opcode::Endfilter);
    table[0x12] = Some(Opcode::Unaligned);
    table[0x13] = Some(Opcode::Volatile);
    table[0x14] = Some(Opcode::Tail);
    table[0x15] = Some(Opcode::Initobj);
    table[0x16] = Some(Opcode::Constrained);
    table[0x17] = Some(Opcode::Cpblk);
    table[0x18] = Some(Opcode::Initblk);
    table[0x19] = Some(Opcode::No);
    table[0x1A] = Some(Opcode::Rethrow);
    table[0x1C] = Some(Opcode::Sizeof);
    table[0x1D] = Some(Opcode::Refanytype);
    table[0x1E] = Some(Opcode::Readonly);

    table
};

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped() -> impl Iterator<Item = (u16, Opcode)> {
        (0u16..EXTENDED_BASE + EXTENDED_SLOTS as u16)
            .filter_map(|code| Opcode::lookup(code).map(|op| (code, op)))
    }

    #[test]
    fn test_table_codes_match_discriminants() {
        let mut count = 0;
        for (code, op) in mapped() {
            assert_eq!(op.code(), code, "{} registered under the wrong code", op);
            assert!(!op.is_pseudo());
            count += 1;
        }
        assert_eq!(count, 219, "every instruction registered exactly once");
    }

    #[test]
    fn test_unmapped_codes() {
        for code in [0x24u16, 0x77, 0x78, 0xA6, 0xB2, 0xC4, 0xCF, 0xE1, 0xFE, 0xFF] {
            assert!(Opcode::lookup(code).is_none(), "0x{:02x} should be unmapped", code);
        }
        assert!(Opcode::lookup(0x108).is_none());
        assert!(Opcode::lookup(0x11B).is_none());
        assert!(Opcode::lookup(0x1FF).is_none(), "pseudo label is never decodable");
        assert!(Opcode::lookup(0x400).is_none());
    }

    #[test]
    fn test_escape_mapping() {
        assert_eq!(Opcode::from_extended_byte(0x01), Some(Opcode::Ceq));
        assert_eq!(Opcode::lookup(EXTENDED_BASE + 0x01), Some(Opcode::Ceq));
        assert_eq!(Opcode::from_extended_byte(0x16), Some(Opcode::Constrained));
        assert!(Opcode::from_extended_byte(0x40).is_none());

        let mut out = Vec::new();
        Opcode::Ceq.encode(&mut out);
        Opcode::Ret.encode(&mut out);
        Opcode::Label.encode(&mut out);
        assert_eq!(out, vec![0xFE, 0x01, 0x2A]);
    }

    #[test]
    fn test_encoded_sizes() {
        // (opcode, opcode bytes, immediate bytes)
        let cases = [
            (Opcode::Nop, 1, 0),
            (Opcode::LdcI4S, 1, 1),
            (Opcode::LdcI4, 1, 4),
            (Opcode::LdcI8, 1, 8),
            (Opcode::LdcR4, 1, 4),
            (Opcode::LdcR8, 1, 8),
            (Opcode::LdargS, 1, 1),
            (Opcode::Ldarg, 2, 4),
            (Opcode::Stloc, 2, 4),
            (Opcode::Ldloca, 2, 4),
            (Opcode::BrS, 1, 1),
            (Opcode::Br, 1, 4),
            (Opcode::LeaveS, 1, 1),
            (Opcode::Call, 1, 4),
            (Opcode::Calli, 1, 4),
            (Opcode::Ldftn, 2, 4),
            (Opcode::Ldstr, 1, 4),
            (Opcode::Ldtoken, 1, 4),
            (Opcode::Initobj, 2, 4),
            (Opcode::Sizeof, 2, 4),
            (Opcode::Unaligned, 2, 1),
            (Opcode::No, 2, 1),
            (Opcode::Refanytype, 2, 0),
            (Opcode::Ceq, 2, 0),
            (Opcode::Switch, 1, 4),
            (Opcode::Label, 0, 0),
        ];
        for (op, size, immediate) in cases {
            assert_eq!(op.size(), size, "opcode size of {}", op);
            assert_eq!(op.immediate_size(), immediate, "immediate size of {}", op);
        }
    }

    #[test]
    fn test_opcode_categories() {
        assert!(Opcode::BrS.is_branch());
        assert!(Opcode::Switch.is_branch());
        assert!(!Opcode::Call.is_branch());
        assert_eq!(Opcode::Switch.flow(), FlowKind::CondBranch);
        assert_eq!(Opcode::BltUnS.flow(), FlowKind::CondBranch);
        assert_eq!(Opcode::Leave.flow(), FlowKind::Branch);

        assert!(Opcode::Newobj.is_call());
        assert!(Opcode::Calli.is_call());
        assert!(!Opcode::Ldftn.is_call());

        assert!(Opcode::Ret.is_terminator());
        assert!(Opcode::Throw.is_terminator());
        assert!(Opcode::Br.is_terminator());
        assert!(!Opcode::Brtrue.is_terminator());

        assert!(Opcode::Tail.is_prefix());
        assert_eq!(Opcode::Tail.flow(), FlowKind::Meta);
        assert!(Opcode::No.is_prefix());
        assert_eq!(Opcode::No.flow(), FlowKind::Meta);
        assert_eq!(Opcode::from_extended_byte(0x19), Some(Opcode::No));
        assert_eq!(Opcode::No.mnemonic(), "no.");
    }

    #[test]
    fn test_branch_forms_pair_up() {
        for (_, op) in mapped().filter(|(_, op)| op.is_short_branch()) {
            let long = op.long_form();
            assert_ne!(long, op);
            assert_eq!(long.operand_kind(), OperandKind::InlineBrTarget);
            assert_eq!(long.short_form(), Some(op));
            assert_eq!(long.flow(), op.flow());
        }
        assert_eq!(Opcode::Switch.short_form(), None);
        assert_eq!(Opcode::Add.long_form(), Opcode::Add);
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Opcode::LdcI4M1.mnemonic(), "ldc.i4.m1");
        assert_eq!(Opcode::BneUnS.mnemonic(), "bne.un.s");
        assert_eq!(Opcode::Constrained.to_string(), "constrained.");
        let desc = Opcode::Ldvirtftn.descriptor();
        assert_eq!(desc.code, 0x107);
        assert_eq!(desc.size, 2);
        assert_eq!(desc.operand, OperandKind::InlineMethod);
    }
}
