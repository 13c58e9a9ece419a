/// cilfront - CIL bytecode front end
///
/// This library turns the method bodies of a CIL module into instruction
/// sequences a code generator can consume. Bodies either come from the
/// module's bytecode, decoded lazily against the module's metadata, or are
/// synthesized in memory for delegate types whose methods the runtime
/// normally provides.
///
/// # Architecture
///
/// 1. **Metadata** (`backend::metadata`)
///    - Tokens, type/method/field definitions, generic contexts
///    - Token resolution through the `TokenResolver` trait
///    - TOML manifests describing a module
///
/// 2. **Bytecode** (`backend::bytecode`)
///    - Static opcode table covering single-byte and `0xFE`-escaped codes
///    - Lazy decoder yielding resolved instructions
///    - Synthetic IR builder with labels and branch relaxation
///    - Delegate constructor and invocation thunks
///
/// 3. **Translation units** (`backend::units`)
///    - One unit per type: declarations plus materialized bodies
///    - Handed to a `CodeGenerator`
///
/// # Example
///
/// ```rust
/// use cilfront::backend::*;
///
/// let module = MetadataModule::new("demo");
/// // ldc.i4.1; ret
/// let code = decode_all(&[0x17, 0x2A], &module, &GenericContext::empty()).unwrap();
/// assert_eq!(code.len(), 2);
/// assert_eq!(code[0].opcode, Opcode::LdcI4_1);
/// assert_eq!(code[1].start, 1);
/// ```
pub mod backend;

pub use backend::*;
