//! Branch merging (block concatenation).
//!
//! If a block ends in an unconditional jump to a block that has
//! this block as its *only* predecessor, the two blocks are one straight-
//! line sequence in disguise — concatenate them, drop the now-redundant
//! jump, and rewire the tail's outgoing edges onto the merged block.
//! Recurses (here: re-scans until a full pass finds nothing more to do),
//! since merging can expose a fresh opportunity immediately downstream.

use crate::ir::builder::remove_inst;
use crate::ir::entities::Block;
use crate::ir::function::Function;
use crate::ir::instructions::Insn;

pub fn run(func: &mut Function) -> bool {
    let mut changed = false;
    loop {
        match find_merge_candidate(func) {
            Some((block, succ)) => {
                merge(func, block, succ);
                changed = true;
            }
            None => break,
        }
    }
    changed
}

fn find_merge_candidate(func: &Function) -> Option<(Block, Block)> {
    for block in func.layout.blocks() {
        let Some(last) = func.layout.last_inst(block) else { continue };
        let Insn::Jump { target } = func.insts[last] else { continue };
        if target == block {
            continue;
        }
        let preds = &func.blocks[target].preds;
        if preds.len() == 1 && preds.contains(&block) {
            return Some((block, target));
        }
    }
    None
}

/// Concatenate `succ`'s instructions onto the end of `block`, remove
/// `block`'s trailing jump, and drop `succ` from the layout.
fn merge(func: &mut Function, block: Block, succ: Block) {
    let jump = func.layout.last_inst(block).expect("[BUG] merge candidate without a trailing jump");
    remove_inst(func, jump);

    let succ_insts: Vec<_> = func.layout.block_insts(succ).collect();
    for inst in succ_insts {
        func.layout.remove_inst(inst);
        func.layout.append_inst(inst, block);
    }
    func.layout.remove_block(succ);

    func.rebuild_cfg_edges();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;

    #[test]
    fn merges_single_pred_single_succ_chain() {
        let mut f = Function::new("f");
        let a = f.make_block("a");
        let b = f.make_block("b");
        {
            let mut cur = FuncCursor::at_end(&mut f, a);
            cur.add_jump(b);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, b);
            cur.add_return(None);
        }
        assert!(run(&mut f));
        assert_eq!(f.layout.num_blocks(), 1);
        assert_eq!(f.layout.block_insts(a).count(), 1);
    }

    #[test]
    fn leaves_diamond_join_alone() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let left = f.make_block("left");
        let right = f.make_block("right");
        let join = f.make_block("join");
        let v = f.make_var("v", crate::ir::types::PrimType::Bool);
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_branch(crate::ir::instructions::Operand::Var(v), left);
            cur.add_jump(right);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, left);
            cur.add_jump(join);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, right);
            cur.add_jump(join);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, join);
            cur.add_return(None);
        }
        assert!(!run(&mut f));
        assert_eq!(f.layout.num_blocks(), 4);
    }
}
