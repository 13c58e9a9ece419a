//! Error types for decoding and synthesizing method bodies.

use super::instruction::LabelId;
use super::opcodes::Opcode;
use crate::backend::metadata::{EntityKind, MethodId, Token};

/// Decode failure for one method body
///
/// Every variant is fatal for the body being decoded; the decoder stops at
/// the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream ended inside an immediate operand
    Truncated {
        opcode: Opcode,
        offset: u32,
        needed: usize,
        available: usize,
    },
    /// No instruction is registered for the code
    UnknownOpcode { code: u16, offset: u32 },
    /// The stream ended right after the escape byte
    DanglingPrefix { offset: u32 },
    /// A token did not resolve to an entity of the expected kind
    UnresolvedToken {
        opcode: Opcode,
        token: Token,
        offset: u32,
        expected: EntityKind,
    },
    /// A `newobj` token resolved to a method that is not a constructor
    NotAConstructor {
        token: Token,
        offset: u32,
        method: MethodId,
    },
}

impl DecodeError {
    /// Byte offset of the instruction that failed
    pub fn offset(&self) -> u32 {
        match self {
            Self::Truncated { offset, .. }
            | Self::UnknownOpcode { offset, .. }
            | Self::DanglingPrefix { offset }
            | Self::UnresolvedToken { offset, .. }
            | Self::NotAConstructor { offset, .. } => *offset,
        }
    }

    /// Malformed-stream failures, as opposed to resolution failures
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::UnknownOpcode { .. } | Self::DanglingPrefix { .. }
        )
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated {
                opcode,
                offset,
                needed,
                available,
            } => write!(
                f,
                "Truncated {} at {:04x}: needs {} operand bytes, {} available",
                opcode, offset, needed, available
            ),
            Self::UnknownOpcode { code, offset } => {
                if *code >= 0x100 {
                    write!(f, "Unknown opcode fe {:02x} at {:04x}", code - 0x100, offset)
                } else {
                    write!(f, "Unknown opcode {:02x} at {:04x}", code, offset)
                }
            }
            Self::DanglingPrefix { offset } => {
                write!(f, "Stream ends after escape byte at {:04x}", offset)
            }
            Self::UnresolvedToken {
                opcode,
                token,
                offset,
                expected,
            } => write!(
                f,
                "Unresolved token {} for {} at {:04x}: expected a {}",
                token, opcode, offset, expected
            ),
            Self::NotAConstructor {
                token,
                offset,
                method,
            } => write!(
                f,
                "newobj at {:04x}: token {} names method #{} which is not a constructor",
                offset, token, method.0
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Failure while building a synthetic body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The type is not a delegate
    NotADelegate { ty: String },
    /// A delegate backing field is missing
    MissingDelegateField { delegate: String, field: String },
    /// The delegate has no invocation method
    MissingInvokeMethod { delegate: String, method: String },
    /// A method needed by a template has no raw signature
    MissingSignature { method: String },
    /// A label was branched to but never placed
    UnplacedLabel { label: LabelId },
    /// A label was placed more than once
    LabelPlacedTwice { label: LabelId },
    /// A label handle does not belong to this builder
    UnknownLabel { label: LabelId },
    /// An operand of the wrong kind for its opcode
    OperandMismatch { opcode: Opcode, offset: u32 },
    /// A label marker that was not placed through the builder's labels
    StrayLabelMarker { offset: u32 },
    /// More locals than a 16-bit index can address
    TooManyLocals,
    /// An id did not name a definition in the module
    DanglingReference(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADelegate { ty } => write!(f, "{} is not a delegate type", ty),
            Self::MissingDelegateField { delegate, field } => {
                write!(f, "Delegate {} has no backing field {}", delegate, field)
            }
            Self::MissingInvokeMethod { delegate, method } => {
                write!(f, "Delegate {} has no {} method", delegate, method)
            }
            Self::MissingSignature { method } => {
                write!(f, "Method {} has no signature", method)
            }
            Self::UnplacedLabel { label } => {
                write!(f, "Label L{} is referenced but never placed", label.0)
            }
            Self::LabelPlacedTwice { label } => {
                write!(f, "Label L{} placed more than once", label.0)
            }
            Self::UnknownLabel { label } => write!(f, "Label L{} does not exist", label.0),
            Self::OperandMismatch { opcode, offset } => {
                write!(f, "Operand of {} at {:04x} does not match its operand kind", opcode, offset)
            }
            Self::StrayLabelMarker { offset } => {
                write!(f, "Label marker at {:04x} was not placed through a label", offset)
            }
            Self::TooManyLocals => write!(f, "Too many local variables (max 65535)"),
            Self::DanglingReference(what) => write!(f, "Dangling reference: {}", what),
        }
    }
}

impl std::error::Error for BuildError {}

/// Result type for synthetic body construction
pub type BuildResult<T> = Result<T, BuildError>;
