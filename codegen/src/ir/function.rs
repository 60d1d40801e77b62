//! `Function`: the top-level IR container.
//!
//! Owns everything the function needs by value — variables, frames,
//! instructions, and block order — addressed by the index handles in
//! [`super::entities`]. Each function owns an arena of blocks and
//! variables; instructions refer to variables and blocks by stable indices;
//! def/use links are explicit edges stored in side tables keyed by those
//! handles.

use std::collections::HashSet;

use lily_entity::{EntityRef, PrimaryMap, SecondaryMap};

use super::entities::{Block, Frame, Inst, Var};
use super::instructions::{Insn, ReturnTy};
use super::layout::Layout;
use super::types::PrimType;

/// One SSA-renameable storage location.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub ty: PrimType,
    /// Instructions that assign this variable. In SSA mode this never grows
    /// past length 1 (a combinator counts as the single assignment too).
    pub assigned_at: Vec<Inst>,
    /// Instructions that read this variable.
    pub used_at: HashSet<Inst>,
}

impl Variable {
    fn new(name: String, ty: PrimType) -> Self {
        Variable { name, ty, assigned_at: Vec::new(), used_at: HashSet::new() }
    }
}

/// A stack-allocated region owned by a function.
#[derive(Clone, Debug)]
pub struct FrameSlot {
    pub name: String,
    pub size: u64,
    pub align: u64,
    /// The variable this frame backs, if it was created for one (as opposed
    /// to an anonymous spill slot created by the ABI expander).
    pub backing_var: Option<Var>,
    /// Byte offset from the frame pointer, assigned during ABI layout.
    pub offset: Option<i64>,
}

/// A code block: an ordered run of instructions plus its CFG neighbors.
#[derive(Clone, Debug, Default)]
pub struct CodeBlock {
    pub name: String,
    pub preds: HashSet<Block>,
    pub succs: HashSet<Block>,
}

/// Whether an argument slot is a scalar variable, a struct passed via a
/// frame, or an unnamed primitive the front-end never binds to a variable.
#[derive(Clone, Debug)]
pub enum Arg {
    Var(Var),
    Frame(Frame),
    Ignored(PrimType),
}

/// A typed SSA function.
pub struct Function {
    pub name: String,
    pub args: Vec<Arg>,
    pub ret_ty: ReturnTy,
    pub vars: PrimaryMap<Var, Variable>,
    pub frames: PrimaryMap<Frame, FrameSlot>,
    pub blocks: PrimaryMap<Block, CodeBlock>,
    pub insts: PrimaryMap<Inst, Insn>,
    pub layout: Layout,
    pub entry: Option<Block>,
    /// When set, every variable must be assigned at most once across its
    /// instructions (checked by the builder, see `crate::ir::builder`).
    pub enforce_ssa: bool,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            args: Vec::new(),
            ret_ty: ReturnTy::Void,
            vars: PrimaryMap::new(),
            frames: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            layout: Layout::new(),
            entry: None,
            enforce_ssa: false,
        }
    }

    pub fn make_var(&mut self, name: impl Into<String>, ty: PrimType) -> Var {
        let name = name.into();
        let name = if name.is_empty() { self.vars.len().to_string() } else { name };
        self.vars.push(Variable::new(name, ty))
    }

    pub fn make_block(&mut self, name: impl Into<String>) -> Block {
        let name = name.into();
        let name = if name.is_empty() { self.blocks.len().to_string() } else { name };
        let block = self.blocks.push(CodeBlock { name, ..Default::default() });
        self.layout.append_block(block);
        if self.entry.is_none() {
            self.entry = Some(block);
        }
        block
    }

    pub fn make_frame(&mut self, name: impl Into<String>, size: u64, align: u64) -> Frame {
        self.frames.push(FrameSlot {
            name: name.into(),
            size,
            align,
            backing_var: None,
            offset: None,
        })
    }

    /// Record that `inst` (owned by `dest`'s block) assigns `dest`.
    ///
    /// When `enforce_ssa` holds, assigning an already-assigned variable is a
    /// compiler bug.
    pub fn record_assign(&mut self, dest: Var, inst: Inst) {
        let var = &mut self.vars[dest];
        if self.enforce_ssa && !var.assigned_at.is_empty() {
            panic!("[BUG] SSA variable {dest} assigned more than once");
        }
        var.assigned_at.push(inst);
    }

    pub fn record_use(&mut self, var: Var, inst: Inst) {
        self.vars[var].used_at.insert(inst);
    }

    pub fn remove_assign(&mut self, dest: Var, inst: Inst) {
        self.vars[dest].assigned_at.retain(|&i| i != inst);
    }

    pub fn remove_use(&mut self, var: Var, inst: Inst) {
        self.vars[var].used_at.remove(&inst);
    }

    /// Every instruction in the function, in layout order.
    pub fn all_insts(&self) -> Vec<Inst> {
        self.layout.blocks().flat_map(|b| self.layout.block_insts(b)).collect()
    }

    /// Rebuild every block's predecessor/successor sets from the current
    /// control-flow instructions. Used after bulk edits (e.g. dead-code
    /// removal) where incremental maintenance would be fiddlier than a
    /// from-scratch pass.
    pub fn rebuild_cfg_edges(&mut self) {
        for (_, block) in self.blocks.iter_mut() {
            block.preds.clear();
            block.succs.clear();
        }
        for block in self.layout.blocks().collect::<Vec<_>>() {
            for inst in self.layout.block_insts(block).collect::<Vec<_>>() {
                for target in self.insts[inst].targets() {
                    self.blocks[block].succs.insert(target);
                    self.blocks[target].preds.insert(block);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_var_synthesizes_decimal_name() {
        let mut f = Function::new("f");
        let v = f.make_var("", PrimType::S32);
        assert_eq!(f.vars[v].name, "0");
    }

    #[test]
    fn first_block_becomes_entry() {
        let mut f = Function::new("f");
        let b = f.make_block("entry");
        assert_eq!(f.entry, Some(b));
    }
}
