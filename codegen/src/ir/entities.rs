//! Stable index handles for IR entities.
//!
//! The IR is a cyclic graph — instructions reference variables and blocks,
//! which reference instructions back through def/use and predecessor/
//! successor sets. Rather than model that with pointers (and reference
//! cycles), every entity is addressed through one of these small `Copy`
//! indices; the data they name lives in arenas owned by [`super::Function`]
//! (see `crate::ir::function`), and all back-references are explicit
//! side-tables keyed by the same indices (`crate::ir::layout`,
//! `Variable::assigned_at`/`Variable::used_at`).

use lily_entity::entity_impl;

/// A variable: one SSA-renameable storage location. See
/// [`crate::ir::function::Variable`] for the data it owns.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Var(u32);
entity_impl!(Var, "v");

/// A code block: an ordered run of instructions with one entry and,
/// normally, one exit control-flow instruction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A stack frame: a stack-allocated region owned by a function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Frame(u32);
entity_impl!(Frame, "frame");

/// An instruction. Stable for the instruction's lifetime; once removed from
/// the function the handle is never reused or revisited.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");
