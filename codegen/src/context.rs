//! Compilation context and main entry point.
//!
//! When compiling many functions, it is important to avoid repeatedly
//! allocating and deallocating the data structures the pipeline needs.
//! `Context` holds on to one `Function` and its `DominatorTree` across the
//! whole pipeline; callers that compile many functions reuse one `Context`
//! per compilation thread, matching `cranelift-codegen`'s own `Context`.
//!
//! The context does not own a target backend — one is passed in to
//! [`Context::compile`], since a [`crate::isa::Backend`] is immutable and
//! can be shared across many contexts compiling concurrently.

use crate::dominator_tree::DominatorTree;
use crate::error::IselError;
use crate::ir::function::Function;
use crate::isa::Backend;
use crate::{opt, ssa};

/// Persistent data structures for one function's compilation pipeline:
/// SSA construction, optimization, ABI expansion, and instruction
/// selection, run in that order by [`Context::compile`].
pub struct Context {
    pub func: Function,
    pub domtree: DominatorTree,
}

impl Context {
    pub fn new(func: Function) -> Self {
        Context { func, domtree: DominatorTree::new() }
    }

    /// Clear `self.func` and reuse its allocations for a fresh function,
    /// the way `cranelift-codegen`'s `Context::clear` lets a caller compile
    /// many functions from one persistent `Context`.
    pub fn clear(&mut self, func: Function) {
        self.func = func;
        self.domtree = DominatorTree::new();
    }

    /// Run the full pipeline over `self.func` against `backend`: SSA
    /// construction (skipped if the function already claims `enforce_ssa`),
    /// the optimizer fixpoint, ABI expansion, and instruction selection.
    ///
    /// Every instruction in the function is either `Insn::Machine` or
    /// `Insn::Combinator` once this returns `Ok`.
    pub fn compile(&mut self, backend: &impl Backend) -> Result<(), IselError> {
        log::debug!("compiling `{}`", self.func.name);

        if !self.func.enforce_ssa {
            self.domtree.compute(&self.func);
            ssa::construct_ssa(&mut self.func, &self.domtree);
            self.func.enforce_ssa = true;
            log::trace!("ssa construction complete for `{}`", self.func.name);
        }

        opt::run_pipeline(&mut self.func);
        log::trace!("optimizer pipeline stable for `{}`", self.func.name);

        backend.expand_abi(&mut self.func);
        log::trace!("abi expansion complete for `{}`", self.func.name);

        backend.select_instructions(&mut self.func)?;
        log::trace!("instruction selection complete for `{}`", self.func.name);

        debug_assert!(
            self.func.all_insts().iter().all(|&inst| {
                let insn = &self.func.insts[inst];
                insn.is_machine() || insn.is_combinator()
            }),
            "[BUG] instruction selection left a non-machine, non-combinator instruction in `{}`",
            self.func.name
        );

        Ok(())
    }
}
