//! Dead-code elimination: reachability from the entry block, trimming
//! trailing dead instructions after a terminator and removing blocks never
//! reached at all.
//!
//! `jump`/`return` terminate a block
//! (everything after them in the same block is unreachable), a `branch` on
//! a constant-true condition behaves the same way but also queues its
//! target for the reachability walk, and a `branch` on a constant-false
//! condition is simply deleted (the fall-through instruction stream is
//! already correct). Blocks the walk never reaches are removed wholesale,
//! along with every def/use record their instructions held.

use rustc_hash::FxHashSet;

use crate::ir::builder::remove_inst;
use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instructions::{Insn, Operand};

/// Is this instruction a block terminator that makes everything after it in
/// the same block dead? `Machine` instructions with a CFG target count too,
/// since this pass can also run after instruction selection in principle
/// (though in practice the codegen driver runs it only beforehand).
fn is_terminator(insn: &Insn) -> bool {
    matches!(insn, Insn::Jump { .. } | Insn::Return { .. })
}

pub fn run(func: &mut Function) -> bool {
    let mut changed = false;

    // Constant branches: fold to an unconditional jump (constant-true) or
    // delete outright (constant-false, leaving the fall-through block).
    for inst in func.all_insts() {
        let Insn::Branch { cond: Operand::Const(c), target } = func.insts[inst].clone() else {
            continue;
        };
        if c.as_bool() {
            func.insts[inst] = Insn::Jump { target };
            changed = true;
        } else {
            remove_inst(func, inst);
            changed = true;
        }
    }

    // Trim every instruction following a terminator within its block.
    for block in func.layout.blocks().collect::<Vec<_>>() {
        let insts: Vec<Inst> = func.layout.block_insts(block).collect();
        let mut seen_terminator = false;
        for inst in insts {
            if seen_terminator {
                remove_inst(func, inst);
                changed = true;
                continue;
            }
            if is_terminator(&func.insts[inst]) {
                seen_terminator = true;
            }
        }
    }

    // Reachability DFS from the entry block over the (now-trimmed) CFG.
    let Some(entry) = func.entry else { return changed };
    let mut reachable: FxHashSet<Block> = FxHashSet::default();
    let mut stack = vec![entry];
    while let Some(block) = stack.pop() {
        if !reachable.insert(block) {
            continue;
        }
        for inst in func.layout.block_insts(block).collect::<Vec<_>>() {
            for target in func.insts[inst].targets() {
                stack.push(target);
            }
        }
    }

    let unreachable: Vec<Block> = func.layout.blocks().filter(|b| !reachable.contains(b)).collect();
    for block in unreachable {
        remove_block(func, block);
        changed = true;
    }

    if changed {
        func.rebuild_cfg_edges();
    }
    changed
}

/// Remove every instruction in `block` (clearing their def/use records
/// directly, since the block itself is going away and the usual
/// `remove_inst` CFG-edge bookkeeping is about to be superseded by a full
/// `rebuild_cfg_edges`), then drop the block from the layout.
fn remove_block(func: &mut Function, block: Block) {
    let insts: Vec<Inst> = func.layout.block_insts(block).collect();
    for inst in insts {
        if let Some(dest) = func.insts[inst].dest() {
            func.remove_assign(dest, inst);
        }
        for used in func.insts[inst].used_vars() {
            func.remove_use(used, inst);
        }
        func.layout.remove_inst(inst);
    }
    func.layout.remove_block(block);
    func.blocks[block].preds.clear();
    func.blocks[block].succs.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;
    use crate::ir::immediates::Const;
    use crate::ir::types::PrimType;

    #[test]
    fn trims_instructions_after_jump() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let next = f.make_block("next");
        let v = f.make_var("v", PrimType::S32);
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_jump(next);
            cur.add_expr1(v, crate::ir::instructions::UnaryOp::Mov, Operand::Const(Const::int(PrimType::S32, 1)));
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, next);
            cur.add_return(None);
        }
        assert!(run(&mut f));
        assert_eq!(f.layout.block_insts(entry).count(), 1);
    }

    #[test]
    fn removes_unreachable_block() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let reachable = f.make_block("reachable");
        let dead = f.make_block("dead");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_jump(reachable);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, reachable);
            cur.add_return(None);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, dead);
            cur.add_return(None);
        }
        assert!(run(&mut f));
        assert_eq!(f.layout.num_blocks(), 2);
    }

    #[test]
    fn constant_false_branch_is_deleted() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let taken = f.make_block("taken");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_branch(Operand::Const(Const::bool(false)), taken);
            cur.add_return(None);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, taken);
            cur.add_return(None);
        }
        assert!(run(&mut f));
        assert_eq!(f.layout.block_insts(entry).count(), 1);
    }
}
