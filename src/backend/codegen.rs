//! Code generator seam
//!
//! Generators consume translation units. The only generator shipped here
//! renders listings; real back ends implement [`CodeGenerator`] themselves.

use std::fmt::Write as _;

use super::bytecode::disassemble;
use super::metadata::Metadata;
use super::units::TranslationUnit;

/// Consumer of translation units
pub trait CodeGenerator {
    type Output;
    type Error;

    fn emit_unit<M: Metadata + ?Sized>(
        &mut self,
        module: &M,
        unit: &TranslationUnit,
    ) -> Result<Self::Output, Self::Error>;

    /// Emit every unit in order, stopping at the first failure
    fn emit_all<M: Metadata + ?Sized>(
        &mut self,
        module: &M,
        units: &[TranslationUnit],
    ) -> Result<Vec<Self::Output>, Self::Error> {
        units.iter().map(|unit| self.emit_unit(module, unit)).collect()
    }
}

/// Renders each unit as a declaration block followed by method listings
#[derive(Debug, Default, Clone, Copy)]
pub struct ListingGenerator;

impl CodeGenerator for ListingGenerator {
    type Output = String;
    type Error = std::convert::Infallible;

    fn emit_unit<M: Metadata + ?Sized>(
        &mut self,
        module: &M,
        unit: &TranslationUnit,
    ) -> Result<String, Self::Error> {
        let mut output = String::new();
        let _ = writeln!(output, "// type {}", unit.name);
        for decl in &unit.declarations {
            let _ = writeln!(output, "{};", decl.text);
        }
        for def in &unit.definitions {
            output.push('\n');
            let name = if def.synthetic {
                format!("{} (synthetic)", def.name)
            } else {
                def.name.clone()
            };
            output.push_str(&disassemble(module, &name, &def.instructions, &def.locals));
        }
        Ok(output)
    }
}
