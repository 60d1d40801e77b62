//! `lily-codegen`: the SSA intermediate representation, optimizer, and
//! RISC-V instruction selector for the lily C compiler's middle end and
//! backend.
//!
//! A front end (out of scope for this crate) builds a non-SSA
//! [`ir::Function`] with the builder API in [`ir::builder`]. From there:
//!
//! 1. [`ssa`] converts it to SSA form, placing combinators (phi
//!    instructions) at dominance-frontier join points.
//! 2. [`opt`] runs the optimizer fixpoint (constant propagation, unused-
//!    variable removal, dead-code elimination, branch merging) followed by
//!    a one-shot strength-reduction pass.
//! 3. [`driver`] runs the codegen driver: fallthrough-jump removal,
//!    arithmetic softening to library calls, operand-order normalization,
//!    and per-block instruction selection.
//! 4. [`isa::riscv`] expands calling-convention-visible constructs (via
//!    [`isa::Backend::expand_abi`]) and performs instruction selection (via
//!    [`isa::Backend::select_instructions`]), replacing every non-machine
//!    instruction with a target-specific [`ir::Insn::Machine`].
//!
//! [`Context`] ties these stages together the way `cranelift_codegen`'s own
//! `Context` does, reusing one allocation across many compiled functions.

pub mod context;
pub mod dominator_tree;
pub mod driver;
pub mod error;
pub mod fx;
pub mod ir;
pub mod isa;
pub mod isel;
pub mod opt;
pub mod ssa;

pub use context::Context;
pub use error::IselError;
pub use ir::Function;
