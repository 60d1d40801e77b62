//! Instruction selection: walk a function's instructions in layout order,
//! replace each one with its best-matching machine prototype, or report the
//! first unmatched instruction.
//!
//! Grounded on `original_source/src/compiler/common/back/rv_isel.c`'s
//! per-instruction driver loop; the tie-break rule the original resolves
//! with a runtime fallback branch (try the cheap pattern, fall back to the
//! general one) is instead just a second, higher-cost candidate in the same
//! [`super::candidate_tree::CandidateTree`].

use smallvec::{smallvec, SmallVec};

use crate::error::IselError;
use crate::ir::builder::FuncCursor;
use crate::ir::entities::{Inst, Var};
use crate::ir::function::Function;
use crate::ir::immediates::Const;
use crate::ir::instructions::{Insn, MemBase, MemRef, Operand};
use crate::isa::riscv::encoding::{Encoding, InsnProto, OperandShape};
use super::match_tree::{MatchKey, MatchTree};
use super::operand_rule::fits_signed;

/// The operands stored into the resulting `Insn::Machine`, gathered from an
/// instruction's shape-specific fields.
fn gather_operands(insn: &Insn) -> SmallVec<[Operand; 4]> {
    match insn {
        Insn::Expr1 { value, .. } => SmallVec::from_slice(&[value.clone()]),
        Insn::Expr2 { lhs, rhs, .. } => SmallVec::from_slice(&[lhs.clone(), rhs.clone()]),
        Insn::Load { addr, .. } => SmallVec::from_slice(&[Operand::Mem(addr.clone())]),
        Insn::Store { value, addr } => SmallVec::from_slice(&[value.clone(), Operand::Mem(addr.clone())]),
        Insn::Branch { cond, .. } => SmallVec::from_slice(&[cond.clone()]),
        Insn::Return { value: Some(v) } => SmallVec::from_slice(&[v.clone()]),
        Insn::Return { value: None } => SmallVec::new(),
        Insn::Call { args, .. } => args.clone(),
        _ => SmallVec::new(),
    }
}

/// The operands a candidate's rules are checked against. Usually identical
/// to [`gather_operands`], except for `Load`: `dest` rides along as a
/// trailing operand purely so a rule can constrain the loaded width (`lb`
/// vs `lh` vs `lw` vs `ld`) — the address alone carries no width
/// information, and `dest` is not part of the `Insn::Machine` this produces.
fn gather_match_operands(insn: &Insn) -> SmallVec<[Operand; 4]> {
    match insn {
        Insn::Load { dest, addr } => SmallVec::from_slice(&[Operand::Mem(addr.clone()), Operand::Var(*dest)]),
        _ => gather_operands(insn),
    }
}

/// Replace every eligible instruction in `func` with its matched
/// `Insn::Machine`, in layout order. Stops at (and reports) the first
/// instruction with no matching pattern, leaving everything selected so far
/// in place — callers treat a failure as fatal for the whole function, so
/// partial selection is never observed by later passes.
pub fn select_function(tree: &MatchTree, func: &mut Function) -> Result<(), IselError> {
    for inst in func.all_insts() {
        select_one(tree, func, inst)?;
    }
    Ok(())
}

fn select_one(tree: &MatchTree, func: &mut Function, inst: Inst) -> Result<(), IselError> {
    let insn = func.insts[inst].clone();
    let Some(key) = MatchKey::of(&insn) else { return Ok(()) };
    let Some(candidates) = tree.lookup(key) else {
        return Err(IselError::NoMatchingPattern { inst, mnemonic: key.name() });
    };
    let match_operands = gather_match_operands(&insn);
    let Some(candidate) = candidates.best_match(&match_operands, func) else {
        return Err(IselError::UnsupportedOperands { inst, mnemonic: key.name() });
    };
    let proto = candidate.proto;
    let materialize = candidate.materialize_address;
    let dest = insn.dest();
    let target = match &insn {
        Insn::Jump { target } => Some(*target),
        Insn::Branch { target, .. } => Some(*target),
        _ => None,
    };
    let mut operands = gather_operands(&insn);
    if materialize {
        rematerialize_memory_operand(func, inst, &insn, &mut operands);
    }
    func.insts[inst] = Insn::Machine { proto, dest, operands, target };
    Ok(())
}

/// Swap the `Insn::Machine`-bound operand vector's lone `Mem` entry for one
/// anchored at offset 0 on a freshly materialized base register, when the
/// winning candidate was a `mem_any` fallback (see `Candidate::materialize_address`).
fn rematerialize_memory_operand(
    func: &mut Function,
    inst: Inst,
    insn: &Insn,
    operands: &mut SmallVec<[Operand; 4]>,
) {
    let mem = match insn {
        Insn::Load { addr, .. } | Insn::Store { addr, .. } => addr,
        _ => return,
    };
    // Every `mem_any` candidate this table registers is for Load/Store, and
    // every Load/Store this crate's front-end collaborators build anchors
    // on a `Var` (stack frames and symbols go through `LeaStack`/`LeaSymbol`
    // first); a non-`Var` base here would mean a new memory-instruction
    // shape was added to the IR without a matching fallback, which is a
    // selector bug rather than a case to silently skip.
    let MemBase::Var(base) = &mem.base else {
        panic!("[BUG] materialize_address fallback matched a non-variable memory base");
    };
    let base = *base;
    let index_var = mem.index.map(|(v, _)| v);
    let new_mem = materialize_address(func, inst, base, mem);
    let MemBase::Var(new_addr) = &new_mem.base else {
        unreachable!("materialize_address always returns a Var-anchored MemRef");
    };
    let new_addr = *new_addr;
    // `inst` itself hasn't been reinserted (only spliced-in predecessors
    // were), so its used-at bookkeeping still names the pre-materialization
    // operands; swap it to match the rebuilt `Mem` operand before the
    // caller installs it.
    func.remove_use(base, inst);
    if let Some(idx) = index_var {
        func.remove_use(idx, inst);
    }
    func.record_use(new_addr, inst);
    for op in operands.iter_mut() {
        if matches!(op, Operand::Mem(_)) {
            *op = Operand::Mem(new_mem.clone());
        }
    }
}

fn addi_proto() -> InsnProto {
    InsnProto::new("addi", Encoding::i(0b0010011, 0b000), OperandShape::Binary)
}

fn add_proto() -> InsnProto {
    InsnProto::new("add", Encoding::r(0b0110011, 0b000, 0b0000000), OperandShape::Binary)
}

fn mul_proto() -> InsnProto {
    InsnProto::new("mul", Encoding::r(0b0110011, 0b000, 0b0000001), OperandShape::Binary)
}

fn slli_proto() -> InsnProto {
    InsnProto::new("slli", Encoding::i(0b0010011, 0b001), OperandShape::Binary)
}

fn li_proto() -> InsnProto {
    InsnProto::new("li", Encoding::i(0b0010011, 0b000), OperandShape::UnaryImm)
}

/// Materialize `mem`'s effective address (base plus scaled index plus
/// offset) into a chain of fresh GPR-class `Var`s, emitting whatever
/// `slli`/`mul`/`add`/`addi`/`li` machine instructions that takes directly
/// ahead of `before`, and return a `MemRef` anchored on the final var at
/// offset 0.
///
/// This is the one place this backend's instruction selection recurses
/// past a single IR instruction: the winning candidate's match only
/// inspected the `Load`/`Store`'s own operand, but satisfying it now needs
/// a short, freshly synthesized sub-tree of machine instructions whose
/// result is materialized into a new variable, rather than a flat
/// single-instruction substitution. Kept narrow on purpose: the only shape
/// (`mem_any`) this table's patterns actually need it for.
fn materialize_address(func: &mut Function, before: Inst, base: Var, mem: &MemRef) -> MemRef {
    let ty = func.vars[base].ty;
    let mut addr = base;

    if let Some((index, scale)) = mem.index {
        let scaled = if scale == 1 {
            index
        } else if scale.is_power_of_two() {
            let shift = scale.trailing_zeros() as i128;
            let tmp = func.make_var("addr_idx", ty);
            let mut cur = FuncCursor::before(func, before);
            cur.add_machine(
                slli_proto(),
                Some(tmp),
                smallvec![Operand::Var(index), Operand::Const(Const::int(ty, shift))],
                None,
            );
            tmp
        } else {
            let scale_reg = func.make_var("addr_scale", ty);
            {
                let mut cur = FuncCursor::before(func, before);
                cur.add_machine(
                    li_proto(),
                    Some(scale_reg),
                    smallvec![Operand::Const(Const::int(ty, scale as i128))],
                    None,
                );
            }
            let tmp = func.make_var("addr_idx", ty);
            let mut cur = FuncCursor::before(func, before);
            cur.add_machine(
                mul_proto(),
                Some(tmp),
                smallvec![Operand::Var(index), Operand::Var(scale_reg)],
                None,
            );
            tmp
        };
        let tmp = func.make_var("addr_base", ty);
        let mut cur = FuncCursor::before(func, before);
        cur.add_machine(add_proto(), Some(tmp), smallvec![Operand::Var(addr), Operand::Var(scaled)], None);
        addr = tmp;
    }

    if mem.offset != 0 {
        addr = if fits_signed(mem.offset as i128, 12) {
            let tmp = func.make_var("addr_off", ty);
            let mut cur = FuncCursor::before(func, before);
            cur.add_machine(
                addi_proto(),
                Some(tmp),
                smallvec![Operand::Var(addr), Operand::Const(Const::int(ty, mem.offset as i128))],
                None,
            );
            tmp
        } else {
            let off_reg = func.make_var("addr_off_imm", ty);
            {
                let mut cur = FuncCursor::before(func, before);
                cur.add_machine(
                    li_proto(),
                    Some(off_reg),
                    smallvec![Operand::Const(Const::int(ty, mem.offset as i128))],
                    None,
                );
            }
            let tmp = func.make_var("addr_off", ty);
            let mut cur = FuncCursor::before(func, before);
            cur.add_machine(add_proto(), Some(tmp), smallvec![Operand::Var(addr), Operand::Var(off_reg)], None);
            tmp
        };
    }

    MemRef { base: MemBase::Var(addr), index: None, offset: 0 }
}
