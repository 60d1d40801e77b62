//! Target backends.
//!
//! Only one concrete backend exists ([`riscv`]), so there is no dynamic
//! `TargetIsa` trait object the way `cranelift_codegen::isa` has one for its
//! many architectures — callers that need to be generic over "a backend"
//! depend on [`Backend`] directly instead of reaching for dynamic dispatch
//! they have no second implementation to justify.

pub mod riscv;

use crate::error::IselError;
use crate::ir::Function;

/// A compilation target: expands ABI-level constructs (calls, returns,
/// argument binding) and runs instruction selection over a function's IR.
pub trait Backend {
    /// Lower calling-convention-visible constructs (argument binding, struct
    /// returns, call sequences) into plain IR the selector can match.
    fn expand_abi(&self, func: &mut Function);

    /// A target-specific pass run immediately before instruction selection
    /// walks the function, after the codegen driver's own fallthrough
    /// removal, arithmetic softening, and operand-order normalization. No
    /// target this crate implements needs one; the default is a no-op so a
    /// future backend can opt in without changing this trait's shape.
    fn pre_isel_pass(&self, _func: &mut Function) {}

    /// Replace every non-machine instruction with a matched
    /// [`crate::ir::Insn::Machine`], or report the first pattern-matching
    /// failure.
    fn select_instructions(&self, func: &mut Function) -> Result<(), IselError>;

    /// A target-specific pass run after every instruction has been replaced
    /// by a machine instruction. Default is a no-op; see [`Self::pre_isel_pass`].
    fn post_isel_pass(&self, _func: &mut Function) {}
}
