//! The instruction builder and edit cursor.
//!
//! Every `add_*` method here appends one instruction at the cursor's
//! current position, updates the destination variable's assigned-at list
//! and every used variable's used-at set, and — for control-flow
//! instructions — wires up the target block's predecessor set and the
//! current block's successor set. `remove_inst` undoes all of that
//! symmetrically.

use super::entities::{Block, Inst, Var};
use super::function::Function;
use super::immediates::Const;
use super::instructions::{
    BinaryOp, Insn, MemRef, Operand, PhiEdge, ReturnTy, UnaryOp,
};
use crate::isa::riscv::encoding::InsnProto;
use smallvec::SmallVec;

/// Where new instructions are inserted.
#[derive(Clone, Copy, Debug)]
pub enum CursorPos {
    /// Append to the end of this block.
    End(Block),
    /// Insert immediately before this instruction.
    Before(Inst),
}

/// A cursor for building or editing a function's instruction stream.
pub struct FuncCursor<'f> {
    pub func: &'f mut Function,
    pos: CursorPos,
}

impl<'f> FuncCursor<'f> {
    pub fn at_end(func: &'f mut Function, block: Block) -> Self {
        FuncCursor { func, pos: CursorPos::End(block) }
    }

    pub fn before(func: &'f mut Function, inst: Inst) -> Self {
        FuncCursor { func, pos: CursorPos::Before(inst) }
    }

    fn block_at_cursor(&self) -> Block {
        match self.pos {
            CursorPos::End(b) => b,
            CursorPos::Before(i) => {
                self.func.layout.inst_block(i).expect("[BUG] cursor instruction not in layout")
            }
        }
    }

    /// Low-level insertion: place `insn` at the cursor, wire up def/use and
    /// CFG edges, and return its handle. The cursor does not move — callers
    /// that want instructions to land in program order call this
    /// repeatedly with a cursor at `End`.
    fn insert(&mut self, insn: Insn) -> Inst {
        let block = self.block_at_cursor();
        let inst = self.func.insts.push(insn);
        match self.pos {
            CursorPos::End(b) => self.func.layout.append_inst(inst, b),
            CursorPos::Before(before) => self.func.layout.insert_inst_before(inst, before),
        }

        if let Some(dest) = self.func.insts[inst].dest() {
            self.func.record_assign(dest, inst);
        }
        for used in self.func.insts[inst].used_vars() {
            self.func.record_use(used, inst);
        }
        for target in self.func.insts[inst].targets() {
            self.func.blocks[block].succs.insert(target);
            self.func.blocks[target].preds.insert(block);
        }
        inst
    }

    pub fn add_expr1(&mut self, dest: Var, op: UnaryOp, value: Operand) -> Inst {
        self.insert(Insn::Expr1 { dest, op, value })
    }

    pub fn add_expr2(&mut self, dest: Var, op: BinaryOp, lhs: Operand, rhs: Operand) -> Inst {
        self.insert(Insn::Expr2 { dest, op, lhs, rhs })
    }

    pub fn add_combinator(&mut self, dest: Var, edges: Vec<PhiEdge>) -> Inst {
        self.insert(Insn::Combinator { dest, edges })
    }

    pub fn add_undefined(&mut self, dest: Var) -> Inst {
        self.insert(Insn::Undefined { dest })
    }

    pub fn add_load(&mut self, dest: Var, addr: MemRef) -> Inst {
        self.insert(Insn::Load { dest, addr })
    }

    pub fn add_store(&mut self, value: Operand, addr: MemRef) -> Inst {
        self.insert(Insn::Store { value, addr })
    }

    pub fn add_lea_stack(&mut self, dest: Var, frame: super::entities::Frame) -> Inst {
        self.insert(Insn::LeaStack { dest, frame })
    }

    pub fn add_lea_symbol(&mut self, dest: Var, symbol: impl Into<String>) -> Inst {
        self.insert(Insn::LeaSymbol { dest, symbol: symbol.into() })
    }

    pub fn add_jump(&mut self, target: Block) -> Inst {
        self.insert(Insn::Jump { target })
    }

    pub fn add_branch(&mut self, cond: Operand, target: Block) -> Inst {
        self.insert(Insn::Branch { cond, target })
    }

    pub fn add_call(
        &mut self,
        dest: Option<Var>,
        target: Option<String>,
        target_var: Option<Var>,
        args: SmallVec<[Operand; 4]>,
        ret_ty: ReturnTy,
    ) -> Inst {
        self.insert(Insn::Call { dest, target, target_var, args, ret_ty })
    }

    pub fn add_return(&mut self, value: Option<Operand>) -> Inst {
        self.insert(Insn::Return { value })
    }

    pub fn add_memcpy(&mut self, dest: MemRef, src: MemRef, len: u64) -> Inst {
        self.insert(Insn::Memcpy { dest, src, len })
    }

    pub fn add_clobber(&mut self, regs: Vec<&'static str>) -> Inst {
        self.insert(Insn::Clobber { regs })
    }

    pub fn add_machine(
        &mut self,
        proto: InsnProto,
        dest: Option<Var>,
        operands: SmallVec<[Operand; 4]>,
        target: Option<Block>,
    ) -> Inst {
        self.insert(Insn::Machine { proto, dest, operands, target })
    }

    pub fn add_const(&mut self, dest: Var, op: UnaryOp, value: Const) -> Inst {
        self.add_expr1(dest, op, Operand::Const(value))
    }
}

/// Remove `inst` from `func`: unlink it from the layout, its destination's
/// assigned-at list, every used variable's used-at set, and (for
/// control-flow instructions) the predecessor/successor sets it
/// contributed. Does not replace its uses with anything — callers that
/// need that (e.g. deleting a variable outright) use
/// [`delete_var`] instead.
pub fn remove_inst(func: &mut Function, inst: Inst) {
    let block = func.layout.inst_block(inst).expect("[BUG] instruction not in layout");
    if let Some(dest) = func.insts[inst].dest() {
        func.remove_assign(dest, inst);
    }
    for used in func.insts[inst].used_vars() {
        func.remove_use(used, inst);
    }
    for target in func.insts[inst].targets() {
        func.blocks[block].succs.remove(&target);
        func.blocks[target].preds.remove(&block);
    }
    func.layout.remove_inst(inst);
}

/// Delete a variable: first replace every use with `undefined` (inserted
/// right before the using instruction), then remove the instructions that
/// assigned it. Dead-code elimination is responsible for reaping the
/// `undefined` marker and any now-unreachable code it exposes.
pub fn delete_var(func: &mut Function, var: Var) {
    let assigns = func.vars[var].assigned_at.clone();
    for inst in assigns {
        remove_inst(func, inst);
    }
    let uses = func.vars[var].used_at.clone();
    for inst in uses {
        replace_operand_uses(func, inst, var);
    }
}

/// Rewrite every occurrence of `var` as an operand of `inst` to read an
/// `undefined`-bound placeholder instead, inserted right before `inst`, then
/// update the def/use bookkeeping to match. Uses [`replace_var_in_insn`]
/// rather than [`rewrite_operand`] since the replacement here is always a
/// `Var`, so memory-reference operands (a `Load`/`Store`'s address, a
/// `Memcpy`'s two refs) can be substituted too, not just the plain-`Operand`
/// positions `rewrite_operand` covers for `rename_uses`'s `Operand`-typed
/// replacement.
fn replace_operand_uses(func: &mut Function, inst: Inst, var: Var) {
    let ty = func.vars[var].ty;
    let placeholder = func.make_var(format!("{}.undef", var.index()), ty);
    FuncCursor::before(func, inst).add_undefined(placeholder);
    replace_var_in_insn(&mut func.insts[inst], var, placeholder);
    func.remove_use(var, inst);
    func.record_use(placeholder, inst);
}

/// Replace every occurrence of `from` as a `Var` operand of `insn` — plain
/// operand positions, phi edges, and memory-reference bases/indices alike —
/// with `to`.
fn replace_var_in_insn(insn: &mut Insn, from: Var, to: Var) {
    fn swap(o: &mut Operand, from: Var, to: Var) {
        if matches!(o, Operand::Var(v) if *v == from) {
            *o = Operand::Var(to);
        }
    }
    fn swap_mem(mem: &mut MemRef, from: Var, to: Var) {
        if let super::instructions::MemBase::Var(v) = &mut mem.base {
            if *v == from {
                *v = to;
            }
        }
        if let Some((idx, _)) = &mut mem.index {
            if *idx == from {
                *idx = to;
            }
        }
    }
    match insn {
        Insn::Expr1 { value, .. } => swap(value, from, to),
        Insn::Expr2 { lhs, rhs, .. } => {
            swap(lhs, from, to);
            swap(rhs, from, to);
        }
        Insn::Combinator { edges, .. } => {
            for e in edges {
                swap(&mut e.value, from, to);
            }
        }
        Insn::Load { addr, .. } => swap_mem(addr, from, to),
        Insn::Store { value, addr } => {
            swap(value, from, to);
            swap_mem(addr, from, to);
        }
        Insn::Branch { cond, .. } => swap(cond, from, to),
        Insn::Call { args, target_var, .. } => {
            if matches!(target_var, Some(v) if *v == from) {
                *target_var = Some(to);
            }
            for a in args.iter_mut() {
                swap(a, from, to);
            }
        }
        Insn::Return { value: Some(v) } => swap(v, from, to),
        Insn::Memcpy { dest, src, .. } => {
            swap_mem(dest, from, to);
            swap_mem(src, from, to);
        }
        _ => {}
    }
}

/// Replace every use of `from` anywhere in the function with `to`,
/// updating def/use records, then delete `from` (now unused). This is the
/// core rewrite used by `mov`-folding and other constant-propagation
/// rewrites in `crate::opt::constprop`.
pub fn rename_uses(func: &mut Function, from: Var, to: Operand) {
    let uses = func.vars[from].used_at.clone();
    for inst in uses {
        rewrite_operand(func, inst, from, &to);
        func.remove_use(from, inst);
        if let Operand::Var(to_var) = to {
            func.record_use(to_var, inst);
        }
    }
}

fn rewrite_operand(func: &mut Function, inst: Inst, from: Var, to: &Operand) {
    fn swap(o: &mut Operand, from: Var, to: &Operand) {
        if matches!(o, Operand::Var(v) if *v == from) {
            *o = to.clone();
        }
    }
    let insn = &mut func.insts[inst];
    match insn {
        Insn::Expr1 { value, .. } => swap(value, from, to),
        Insn::Expr2 { lhs, rhs, .. } => {
            swap(lhs, from, to);
            swap(rhs, from, to);
        }
        Insn::Combinator { edges, .. } => {
            for e in edges {
                swap(&mut e.value, from, to);
            }
        }
        Insn::Store { value, .. } => swap(value, from, to),
        Insn::Branch { cond, .. } => swap(cond, from, to),
        Insn::Call { args, target_var, .. } => {
            if matches!(target_var, Some(v) if *v == from) {
                if let Operand::Var(v) = to {
                    *target_var = Some(*v);
                }
            }
            for a in args.iter_mut() {
                swap(a, from, to);
            }
        }
        Insn::Return { value: Some(v) } => swap(v, from, to),
        _ => {}
    }
}
