//! Recoverable compilation errors.
//!
//! Everything here is a property of the *input* (a function instruction
//! selection cannot lower under the active profile) rather than of this
//! crate's own invariants — internal invariant violations panic with a
//! `"[BUG] ..."` message instead of flowing through this type, the same
//! split `cranelift_codegen::CodegenError` draws between "this IR is
//! unsupported" and "this should never happen".

use thiserror::Error;

use crate::ir::entities::Inst;

/// Instruction selection failed to find a matching pattern for some
/// instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IselError {
    #[error("no instruction pattern matches {mnemonic} at {inst} for this target profile")]
    NoMatchingPattern { inst: Inst, mnemonic: &'static str },
    #[error("unsupported operand combination for {mnemonic} at {inst}")]
    UnsupportedOperands { inst: Inst, mnemonic: &'static str },
}
