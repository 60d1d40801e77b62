//! Constant propagation and folding.
//!
//! Folds any `Expr1`/`Expr2` whose operands are already constant via
//! [`crate::ir::immediates::Const::calc1`]/`calc2`, propagates a `mov` of a
//! constant or of another variable by rewriting every use with
//! [`crate::ir::builder::rename_uses`], and applies a handful of algebraic
//! identities that don't need full constant folding: `mul` by 0 on either
//! side folds to 0, and `mul`/`div` by 1 on the side that's allowed to carry
//! it renames to the other operand outright. Reports whether it changed
//! anything, so the fixpoint driver in [`super`] knows whether another round
//! is worth running.

use crate::ir::builder::rename_uses;
use crate::ir::function::Function;
use crate::ir::immediates::Const;
use crate::ir::instructions::{BinaryOp, Insn, Operand, UnaryOp};
use crate::ir::types::PrimType;

/// Is `c` exactly 1, for its own primitive kind?
fn is_one(c: Const) -> bool {
    if c.ty.is_float() {
        if c.ty == PrimType::F32 { c.as_f32() == 1.0 } else { c.as_f64() == 1.0 }
    } else {
        c.as_unsigned() == 1
    }
}

pub fn run(func: &mut Function) -> bool {
    let mut changed = false;
    for inst in func.all_insts() {
        // Skip a destination with no remaining uses: its defining
        // instruction already got folded on a previous round and is now
        // dead code for `opt::dce` to reap, not a fresh propagation
        // opportunity. Without this check the pass would never reach a
        // fixpoint on its own between `opt::dce` runs.
        let already_propagated = |func: &Function, dest| func.vars[dest].used_at.is_empty();

        match func.insts[inst].clone() {
            Insn::Expr1 { dest, op: UnaryOp::Mov, value } if !already_propagated(func, dest) => {
                rename_uses(func, dest, value);
                changed = true;
            }
            Insn::Expr1 { dest, op, value: Operand::Const(c) } if !already_propagated(func, dest) => {
                let folded = Const::calc1(op, c);
                rename_uses(func, dest, Operand::Const(folded));
                changed = true;
            }
            Insn::Expr2 { dest, op, lhs: Operand::Const(l), rhs: Operand::Const(r) }
                if !already_propagated(func, dest) =>
            {
                let folded = Const::calc2(op, l, r);
                rename_uses(func, dest, Operand::Const(folded));
                changed = true;
            }
            Insn::Expr2 { dest, op: BinaryOp::Mul, lhs: Operand::Const(c), rhs: _ }
                if !already_propagated(func, dest) && c.is_zero() =>
            {
                rename_uses(func, dest, Operand::Const(c));
                changed = true;
            }
            Insn::Expr2 { dest, op: BinaryOp::Mul, lhs: _, rhs: Operand::Const(c) }
                if !already_propagated(func, dest) && c.is_zero() =>
            {
                rename_uses(func, dest, Operand::Const(c));
                changed = true;
            }
            Insn::Expr2 { dest, op: BinaryOp::Mul, lhs: Operand::Const(c), rhs }
                if !already_propagated(func, dest) && is_one(c) =>
            {
                rename_uses(func, dest, rhs);
                changed = true;
            }
            Insn::Expr2 { dest, op: BinaryOp::Mul, lhs, rhs: Operand::Const(c) }
                if !already_propagated(func, dest) && is_one(c) =>
            {
                rename_uses(func, dest, lhs);
                changed = true;
            }
            Insn::Expr2 { dest, op: BinaryOp::Div, lhs, rhs: Operand::Const(c) }
                if !already_propagated(func, dest) && is_one(c) =>
            {
                rename_uses(func, dest, lhs);
                changed = true;
            }
            _ => {}
        }
    }
    changed
}
