//! Bytecode decoding and synthetic IR construction
//!
//! This module turns method bodies into ordered instruction sequences the
//! code generator can consume, whether the body exists as bytecode or has to
//! be synthesized.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  Method bytes + module       │      │  Delegate type + conventions │
//! │  + generic context           │      │                              │
//! └──────────────────────────────┘      └──────────────────────────────┘
//!                │                                     │
//!                ▼                                     ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  Decoder (lazy iterator)     │      │  IlBuilder + thunk templates │
//! │  opcode table + resolver     │      │  labels, branch relaxation   │
//! └──────────────────────────────┘      └──────────────────────────────┘
//!                │                                     │
//!                └────────────────┬────────────────────┘
//!                                 ▼
//!                  ┌──────────────────────────────┐
//!                  │  MethodBody::instructions    │
//!                  │  one Instruction shape       │
//!                  └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`opcodes`]: static opcode table (single-byte and 0xFE-escaped codes)
//! - [`instruction`]: decoded instruction and operand model
//! - [`decoder`]: lazy instruction decoder
//! - [`builder`]: synthetic body builder with label placeholders
//! - [`delegate`]: delegate constructor and invocation thunk templates
//! - [`body`]: bytecode or synthetic body source
//! - [`disasm`]: textual listings
//!
//! # Example
//!
//! ```ignore
//! use cilfront::backend::bytecode::{decode_all, Opcode};
//! use cilfront::backend::metadata::{GenericContext, MetadataModule};
//!
//! let module = MetadataModule::new("demo");
//! let code = decode_all(&[0x16, 0x2A], &module, &GenericContext::empty())?;
//! assert_eq!(code[0].opcode, Opcode::LdcI4_0);
//! assert_eq!(code[1].opcode, Opcode::Ret);
//! ```

pub mod body;
pub mod builder;
pub mod decoder;
pub mod delegate;
pub mod disasm;
pub mod error;
pub mod instruction;
pub mod opcodes;

pub use body::{BodyInstructions, MethodBody};
pub use builder::{BranchKind, IlBuilder, SyntheticBody};
pub use decoder::{decode, decode_all, Decoder};
pub use delegate::{is_delegate_function_body, synthesize_body, DelegateShape};
pub use disasm::{disassemble, disassemble_synthetic};
pub use error::{BuildError, BuildResult, DecodeError, DecodeResult};
pub use instruction::{Instruction, LabelId, Operand, SwitchTargets};
pub use opcodes::{FlowKind, Opcode, OpcodeDescriptor, OperandKind, ESCAPE_BYTE, EXTENDED_BASE};
