//! Strength reduction: one-shot rewriting of `mul`/`div`/`rem` by a
//! positive power-of-two constant into shifts and masks.
//!
//! `div` → `shr`, `mul` → `shl`, unsigned `rem` → `band` with
//! `(1 << k) - 1`. Signed `rem` is deliberately left un-reduced: the
//! correct rewrite needs a sign-fixup sequence the IR builder's current
//! insertion model cannot splice into the middle of a block, so it is
//! skipped here exactly as the original does.
//!
//! Runs once, after the const-prop/unused/dce/branch-merge loop has
//! reached a fixpoint (see [`super::run_pipeline`]) — it only ever
//! consumes opportunities that loop exposes, and never creates a fresh one
//! of its own kind for a second round to find.

use crate::ir::function::Function;
use crate::ir::immediates::Const;
use crate::ir::instructions::{BinaryOp, Insn, Operand};

pub fn run(func: &mut Function) -> bool {
    let mut changed = false;
    for inst in func.all_insts() {
        let Insn::Expr2 { dest, op, lhs, rhs } = func.insts[inst].clone() else { continue };
        match op {
            BinaryOp::Mul => {
                if let Some((var_side, k)) = pow2_operand(&lhs, &rhs) {
                    func.insts[inst] = Insn::Expr2 {
                        dest,
                        op: BinaryOp::Shl,
                        lhs: var_side,
                        rhs: Operand::Const(shift_amount(func, dest, k)),
                    };
                    changed = true;
                }
            }
            BinaryOp::Div => {
                if let Operand::Const(c) = &rhs {
                    if let Some(k) = c.pow2_exponent() {
                        func.insts[inst] = Insn::Expr2 {
                            dest,
                            op: BinaryOp::Shr,
                            lhs,
                            rhs: Operand::Const(shift_amount(func, dest, k)),
                        };
                        changed = true;
                    }
                }
            }
            BinaryOp::Rem => {
                if func.vars[dest].ty.is_unsigned() {
                    if let Operand::Const(c) = &rhs {
                        if let Some(k) = c.pow2_exponent() {
                            let mask = (1u128 << k) - 1;
                            func.insts[inst] = Insn::Expr2 {
                                dest,
                                op: BinaryOp::Band,
                                lhs,
                                rhs: Operand::Const(Const::from_bits(c.ty, mask)),
                            };
                            changed = true;
                        }
                    }
                }
                // Signed rem by a power of two: left alone, see module docs.
            }
            _ => {}
        }
    }
    changed
}

/// If exactly one of `lhs`/`rhs` is a positive power-of-two constant in the
/// canonical (commuted) position — i.e. the other operand is the value to
/// shift — return `(value_operand, exponent)`.
fn pow2_operand(lhs: &Operand, rhs: &Operand) -> Option<(Operand, u32)> {
    if let Operand::Const(c) = rhs {
        if let Some(k) = c.pow2_exponent() {
            return Some((lhs.clone(), k));
        }
    }
    if let Operand::Const(c) = lhs {
        if let Some(k) = c.pow2_exponent() {
            return Some((rhs.clone(), k));
        }
    }
    None
}

/// Shift counts are always unsigned bytes in this IR's shift operator, per
/// the codegen driver's shift-softening rule — construct the exponent as a
/// `u8` constant so it type-checks regardless of the shifted value's width.
fn shift_amount(func: &Function, dest: crate::ir::entities::Var, k: u32) -> Const {
    let _ = func;
    Const::int(crate::ir::types::PrimType::U8, k as i128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;
    use crate::ir::types::PrimType;

    #[test]
    fn div_by_power_of_two_becomes_shift() {
        let mut f = Function::new("f");
        let x = f.make_var("x", PrimType::U32);
        let q = f.make_var("q", PrimType::U32);
        let entry = f.make_block("entry");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(q, BinaryOp::Div, Operand::Var(x), Operand::Const(Const::int(PrimType::U32, 8)));
            cur.add_return(Some(Operand::Var(q)));
        }
        assert!(run(&mut f));
        let inst = f.layout.first_inst(entry).unwrap();
        match &f.insts[inst] {
            Insn::Expr2 { op: BinaryOp::Shr, rhs: Operand::Const(c), .. } => assert_eq!(c.as_unsigned(), 3),
            other => panic!("expected shr, got {other:?}"),
        }
    }

    #[test]
    fn unsigned_rem_becomes_mask() {
        let mut f = Function::new("f");
        let x = f.make_var("x", PrimType::U32);
        let r = f.make_var("r", PrimType::U32);
        let entry = f.make_block("entry");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(r, BinaryOp::Rem, Operand::Var(x), Operand::Const(Const::int(PrimType::U32, 16)));
            cur.add_return(Some(Operand::Var(r)));
        }
        assert!(run(&mut f));
        let inst = f.layout.first_inst(entry).unwrap();
        match &f.insts[inst] {
            Insn::Expr2 { op: BinaryOp::Band, rhs: Operand::Const(c), .. } => assert_eq!(c.as_unsigned(), 15),
            other => panic!("expected band, got {other:?}"),
        }
    }

    #[test]
    fn signed_rem_is_left_alone() {
        let mut f = Function::new("f");
        let x = f.make_var("x", PrimType::S32);
        let r = f.make_var("r", PrimType::S32);
        let entry = f.make_block("entry");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(r, BinaryOp::Rem, Operand::Var(x), Operand::Const(Const::int(PrimType::S32, 16)));
            cur.add_return(Some(Operand::Var(r)));
        }
        assert!(!run(&mut f));
    }
}
