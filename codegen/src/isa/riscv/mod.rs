//! The RISC-V backend: ABI expansion, register definitions, instruction
//! prototypes, and the match/candidate-tree pattern table that instruction
//! selection runs against.

pub mod abi;
pub mod encoding;
pub mod patterns;
pub mod profile;
pub mod regs;

pub use profile::RiscvProfile;

use crate::error::IselError;
use crate::ir::function::Function;
use crate::isa::Backend;

/// `Backend::expand_abi` is [`abi::expand_abi`]; `Backend::select_instructions`
/// is the codegen driver (fallthrough removal, arithmetic softening, operand
/// normalization) followed by the actual selector walk — [`crate::driver`]
/// runs both in sequence, since neither makes sense run alone against this
/// profile.
impl Backend for RiscvProfile {
    fn expand_abi(&self, func: &mut Function) {
        abi::expand_abi(*self, func);
    }

    fn select_instructions(&self, func: &mut Function) -> Result<(), IselError> {
        crate::driver::run_codegen(*self, func)
    }
}
