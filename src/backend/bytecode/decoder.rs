//! Instruction decoder
//!
//! [`decode`] turns a method's raw instruction bytes into a lazy sequence of
//! [`Instruction`]s. Each call to `next` reads exactly one instruction,
//! resolving any token immediate through the module under the caller's
//! generic context. The sequence is single pass and stops for good at the
//! first error.
//!
//! Immediate extension rules:
//! - branch displacements and `ldc.i4.s` are sign-extended
//! - short argument/local indices and the `unaligned.`/`no.` flags are
//!   zero-extended
//! - long-form argument/local indices are read as 4-byte integers

use std::iter::FusedIterator;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::error::{DecodeError, DecodeResult};
use super::instruction::{Instruction, Operand};
use super::opcodes::{Opcode, OperandKind, ESCAPE_BYTE, EXTENDED_BASE};
use crate::backend::metadata::{EntityKind, GenericContext, Module, Token};

/// Lazy decoder over one instruction stream
pub struct Decoder<'a, M: Module + ?Sized> {
    bytes: &'a [u8],
    pos: usize,
    module: &'a M,
    context: &'a GenericContext,
    failed: bool,
}

/// Decode `bytes` lazily, resolving tokens through `module` under `context`
pub fn decode<'a, M: Module + ?Sized>(
    bytes: &'a [u8],
    module: &'a M,
    context: &'a GenericContext,
) -> Decoder<'a, M> {
    debug!(target: "cilfront::decoder", len = bytes.len(), generic = !context.is_empty(), "Decoding body");
    Decoder {
        bytes,
        pos: 0,
        module,
        context,
        failed: false,
    }
}

/// Decode a whole stream eagerly
pub fn decode_all<M: Module + ?Sized>(
    bytes: &[u8],
    module: &M,
    context: &GenericContext,
) -> DecodeResult<Vec<Instruction>> {
    decode(bytes, module, context).collect()
}

impl<'a, M: Module + ?Sized> Decoder<'a, M> {
    /// Current byte offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take<const N: usize>(&mut self, opcode: Opcode, start: u32) -> DecodeResult<[u8; N]> {
        let available = self.remaining();
        if available < N {
            return Err(DecodeError::Truncated {
                opcode,
                offset: start,
                needed: N,
                available,
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    #[inline]
    fn read_u8(&mut self, opcode: Opcode, start: u32) -> DecodeResult<u8> {
        Ok(self.take::<1>(opcode, start)?[0])
    }

    #[inline]
    fn read_i32(&mut self, opcode: Opcode, start: u32) -> DecodeResult<i32> {
        Ok(i32::from_le_bytes(self.take(opcode, start)?))
    }

    #[inline]
    fn read_token(&mut self, opcode: Opcode, start: u32) -> DecodeResult<Token> {
        Ok(Token(u32::from_le_bytes(self.take(opcode, start)?)))
    }

    fn read_opcode(&mut self, start: u32) -> DecodeResult<Opcode> {
        let first = self.bytes[self.pos];
        self.pos += 1;
        if first != ESCAPE_BYTE {
            return Opcode::from_byte(first).ok_or(DecodeError::UnknownOpcode {
                code: u16::from(first),
                offset: start,
            });
        }
        let Some(&second) = self.bytes.get(self.pos) else {
            return Err(DecodeError::DanglingPrefix { offset: start });
        };
        self.pos += 1;
        Opcode::from_extended_byte(second).ok_or(DecodeError::UnknownOpcode {
            code: EXTENDED_BASE + u16::from(second),
            offset: start,
        })
    }

    fn unresolved(opcode: Opcode, token: Token, start: u32, expected: EntityKind) -> DecodeError {
        DecodeError::UnresolvedToken {
            opcode,
            token,
            offset: start,
            expected,
        }
    }

    fn read_operand(&mut self, opcode: Opcode, start: u32) -> DecodeResult<Operand> {
        let operand = match opcode.operand_kind() {
            OperandKind::InlineNone => Operand::None,

            OperandKind::ShortInlineVar => Operand::Int32(i32::from(self.read_u8(opcode, start)?)),
            OperandKind::InlineVar => Operand::Int32(self.read_i32(opcode, start)?),

            OperandKind::ShortInlineI => {
                let byte = self.read_u8(opcode, start)?;
                if matches!(opcode, Opcode::Unaligned | Opcode::No) {
                    Operand::Int32(i32::from(byte))
                } else {
                    Operand::Int32(i32::from(byte as i8))
                }
            }
            OperandKind::InlineI => Operand::Int32(self.read_i32(opcode, start)?),
            OperandKind::InlineI8 => Operand::Int64(i64::from_le_bytes(self.take(opcode, start)?)),
            OperandKind::ShortInlineR => {
                Operand::Float32(f32::from_le_bytes(self.take(opcode, start)?))
            }
            OperandKind::InlineR => Operand::Float64(f64::from_le_bytes(self.take(opcode, start)?)),

            OperandKind::ShortInlineBrTarget => {
                Operand::Int32(i32::from(self.read_u8(opcode, start)? as i8))
            }
            OperandKind::InlineBrTarget => Operand::Int32(self.read_i32(opcode, start)?),

            OperandKind::InlineString => {
                let token = self.read_token(opcode, start)?;
                let value = self
                    .module
                    .resolve_string(token)
                    .ok_or_else(|| Self::unresolved(opcode, token, start, EntityKind::String))?;
                Operand::String { token, value }
            }

            OperandKind::InlineMethod => {
                let token = self.read_token(opcode, start)?;
                let method = self
                    .module
                    .resolve_method(token, self.context)
                    .ok_or_else(|| Self::unresolved(opcode, token, start, EntityKind::Method))?;
                if opcode == Opcode::Newobj {
                    let is_ctor = self
                        .module
                        .method_def(method.method)
                        .is_some_and(|def| def.is_constructor());
                    if !is_ctor {
                        return Err(DecodeError::NotAConstructor {
                            token,
                            offset: start,
                            method: method.method,
                        });
                    }
                }
                Operand::Method(method)
            }

            OperandKind::InlineField => {
                let token = self.read_token(opcode, start)?;
                let field = self
                    .module
                    .resolve_field(token, self.context)
                    .ok_or_else(|| Self::unresolved(opcode, token, start, EntityKind::Field))?;
                Operand::Field(field)
            }

            OperandKind::InlineType => {
                let token = self.read_token(opcode, start)?;
                let ty = self
                    .module
                    .resolve_type(token, self.context)
                    .ok_or_else(|| Self::unresolved(opcode, token, start, EntityKind::Type))?;
                Operand::Type(ty)
            }

            OperandKind::InlineTok => {
                let token = self.read_token(opcode, start)?;
                match self.module.resolve_token(token, self.context) {
                    Some(resolved) => Operand::Token(resolved),
                    None => {
                        warn!(target: "cilfront::decoder", %token, offset = start, "ldtoken falls back to raw token");
                        Operand::Int32(token.as_i32())
                    }
                }
            }

            // Standalone signatures stay as tokens; the call site signature is
            // the code generator's concern.
            OperandKind::InlineSig => Operand::Int32(self.read_token(opcode, start)?.as_i32()),

            OperandKind::InlineSwitch => {
                let count = u32::from_le_bytes(self.take(opcode, start)?) as usize;
                let needed = count.saturating_mul(4);
                let available = self.remaining();
                if available < needed {
                    return Err(DecodeError::Truncated {
                        opcode,
                        offset: start,
                        needed,
                        available,
                    });
                }
                let mut deltas = SmallVec::with_capacity(count);
                for _ in 0..count {
                    deltas.push(self.read_i32(opcode, start)?);
                }
                Operand::Switch(deltas)
            }
        };
        Ok(operand)
    }

    fn decode_one(&mut self) -> DecodeResult<Instruction> {
        let start = self.pos as u32;
        let opcode = self.read_opcode(start)?;
        let operand = self.read_operand(opcode, start)?;
        let end = self.pos as u32;
        trace!(target: "cilfront::decoder", offset = start, %opcode, ?operand, "Decoded");
        Ok(Instruction::new(opcode, start, end, operand))
    }
}

impl<'a, M: Module + ?Sized> Iterator for Decoder<'a, M> {
    type Item = DecodeResult<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }
        let result = self.decode_one();
        if let Err(e) = &result {
            debug!(target: "cilfront::decoder", error = %e, "Decode failed");
            self.failed = true;
        }
        Some(result)
    }
}

impl<'a, M: Module + ?Sized> FusedIterator for Decoder<'a, M> {}
