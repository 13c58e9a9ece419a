// Backend of the CIL front end
//
// - `metadata`: tokens, definitions, resolution, manifest loading
// - `bytecode`: opcode table, decoder, synthetic IR builder, delegate thunks
// - `units`: per-type translation units handed to a code generator
// - `codegen`: the code generator seam

pub mod bytecode;
pub mod codegen;
pub mod config;
pub mod metadata;
pub mod units;

pub use bytecode::{
    decode, decode_all, synthesize_body, BuildError, DecodeError, IlBuilder, Instruction,
    MethodBody, Opcode, Operand, SyntheticBody,
};
pub use codegen::{CodeGenerator, ListingGenerator};
pub use config::{DelegateConventions, FrontendConfig};
pub use metadata::{GenericContext, LoadedModule, Manifest, MetadataModule, Module, Token};
pub use units::{TranslationUnit, UnitBuilder, UnitError};
