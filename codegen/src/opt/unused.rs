//! Unused-variable removal.
//!
//! Deletes every variable with no remaining uses whose defining
//! instruction is also side-effect-free, via
//! [`crate::ir::builder::delete_var`]. Loads, stores, calls, and control
//! flow are never touched here even when their destination is unused — a
//! load may fault, a call may have side effects, and `opt::dce` is the pass
//! that reasons about that distinction; this pass only clears away the pure
//! arithmetic `constprop` leaves behind.

use crate::ir::builder::delete_var;
use crate::ir::function::Function;
use crate::ir::instructions::Insn;

fn is_pure(insn: &Insn) -> bool {
    matches!(
        insn,
        Insn::Expr1 { .. } | Insn::Expr2 { .. } | Insn::Combinator { .. } | Insn::LeaStack { .. } | Insn::LeaSymbol { .. }
    )
}

pub fn run(func: &mut Function) -> bool {
    let mut changed = false;
    let vars: Vec<_> = func.vars.keys().collect();
    for var in vars {
        if !func.vars[var].used_at.is_empty() {
            continue;
        }
        let assigns = func.vars[var].assigned_at.clone();
        if assigns.is_empty() {
            continue;
        }
        if assigns.iter().all(|&inst| is_pure(&func.insts[inst])) {
            delete_var(func, var);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;
    use crate::ir::immediates::Const;
    use crate::ir::instructions::{BinaryOp, Operand};
    use crate::ir::types::PrimType;

    #[test]
    fn removes_unused_pure_computation() {
        let mut f = Function::new("f");
        let dead = f.make_var("dead", PrimType::S32);
        let entry = f.make_block("entry");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(
                dead,
                BinaryOp::Add,
                Operand::Const(Const::int(PrimType::S32, 1)),
                Operand::Const(Const::int(PrimType::S32, 2)),
            );
            cur.add_return(None);
        }
        assert!(run(&mut f));
        assert!(f.all_insts().len() == 1, "the dead add should have been removed, leaving only return");
    }
}
