//! The optimizer: a fixpoint loop over four passes, followed by a one-shot
//! strength-reduction pass.
//!
//! Each pass reports whether it changed the function; the loop in
//! [`run_pipeline`] keeps iterating while any pass did. Strength reduction
//! runs exactly once, after the loop has reached a fixpoint, since it never
//! creates new opportunities for the other four passes to find — running
//! the pipeline twice yields the same IR as running it once.

pub mod branch_merge;
pub mod constprop;
pub mod deadcode;
pub mod strength_reduction;
pub mod unused;

use crate::ir::function::Function;

/// Run the const-prop / unused-var / dead-code / branch-merge fixpoint to
/// convergence, then strength reduction once.
pub fn run_pipeline(func: &mut Function) {
    loop {
        let mut changed = false;
        changed |= constprop::run(func);
        changed |= unused::run(func);
        changed |= deadcode::run(func);
        changed |= branch_merge::run(func);
        log::trace!("opt: fixpoint iteration on `{}`, changed = {changed}", func.name);
        if !changed {
            break;
        }
    }
    if strength_reduction::run(func) {
        log::trace!("opt: strength reduction rewrote `{}`", func.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;
    use crate::ir::immediates::Const;
    use crate::ir::instructions::{BinaryOp, Operand, UnaryOp};
    use crate::ir::types::PrimType;

    /// Running the pipeline a second time on already-stable IR produces
    /// byte-identical serialized output.
    #[test]
    fn pipeline_is_idempotent() {
        let mut f = Function::new("f");
        let sum = f.make_var("sum", PrimType::S32);
        let out = f.make_var("out", PrimType::S32);
        let entry = f.make_block("entry");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(
                sum,
                BinaryOp::Add,
                Operand::Const(Const::int(PrimType::S32, 40)),
                Operand::Const(Const::int(PrimType::S32, 2)),
            );
            cur.add_expr1(out, UnaryOp::Mov, Operand::Var(sum));
            cur.add_return(Some(Operand::Var(out)));
        }
        run_pipeline(&mut f);
        let once = crate::ir::serialize::to_string(&f);
        run_pipeline(&mut f);
        let twice = crate::ir::serialize::to_string(&f);
        assert_eq!(once, twice);
    }
}
