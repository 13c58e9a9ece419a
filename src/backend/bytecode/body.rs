//! Method body sources
//!
//! A body is either raw bytecode to be decoded under a generic context or a
//! synthetic body built in memory. Both are consumed through
//! [`MethodBody::instructions`], which yields instructions in the decoder's
//! shape.

use std::sync::Arc;

use super::builder::SyntheticBody;
use super::decoder::{decode, Decoder};
use super::error::DecodeResult;
use super::instruction::Instruction;
use crate::backend::metadata::{GenericContext, Module};

/// Where a method's instructions come from
#[derive(Debug, Clone, PartialEq)]
pub enum MethodBody {
    Bytecode {
        code: Arc<[u8]>,
        context: GenericContext,
    },
    Synthetic(SyntheticBody),
}

impl MethodBody {
    pub fn bytecode(code: Arc<[u8]>, context: GenericContext) -> Self {
        MethodBody::Bytecode { code, context }
    }

    /// Instruction sequence, lazily decoded for bytecode bodies
    pub fn instructions<'a, M: Module + ?Sized>(&'a self, module: &'a M) -> BodyInstructions<'a, M> {
        match self {
            MethodBody::Bytecode { code, context } => {
                BodyInstructions::Decoded(decode(code, module, context))
            }
            MethodBody::Synthetic(body) => BodyInstructions::Synthetic(body.lowered().into_iter()),
        }
    }

    /// Collect the whole instruction sequence
    pub fn materialize<M: Module + ?Sized>(&self, module: &M) -> DecodeResult<Vec<Instruction>> {
        self.instructions(module).collect()
    }
}

impl From<SyntheticBody> for MethodBody {
    fn from(body: SyntheticBody) -> Self {
        MethodBody::Synthetic(body)
    }
}

/// Iterator over a body's instructions
pub enum BodyInstructions<'a, M: Module + ?Sized> {
    Decoded(Decoder<'a, M>),
    Synthetic(std::vec::IntoIter<Instruction>),
}

impl<'a, M: Module + ?Sized> Iterator for BodyInstructions<'a, M> {
    type Item = DecodeResult<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BodyInstructions::Decoded(decoder) => decoder.next(),
            BodyInstructions::Synthetic(iter) => iter.next().map(Ok),
        }
    }
}
