//! SSA construction: dominance frontiers, combinator (phi) placement, and
//! the rename pass that turns a non-SSA `Function` (built with
//! `enforce_ssa = false`, one `Var` reused across multiple assignments per
//! source-level local) into one where `enforce_ssa` holds.
//!
//! Grounded on the standard Cytron-Ferrante-Rosen-Wegman-Zadeck algorithm,
//! driven off the [`crate::dominator_tree::DominatorTree`] this crate
//! builds with Lengauer-Tarjan: dominance frontiers fall out of the
//! immediate-dominator array without a second fixpoint pass, combinators go
//! at the dominance-frontier join points of each variable's assigning
//! blocks, and renaming walks the dominator tree top-down with one rename
//! stack per source variable.

use lily_entity::EntityRef;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::dominator_tree::DominatorTree;
use crate::ir::builder::FuncCursor;
use crate::ir::entities::{Block, Var};
use crate::ir::function::Function;
use crate::ir::instructions::{Insn, Operand, PhiEdge};

/// The dominance frontier of every reachable block: the set of blocks where
/// two or more incoming control-flow paths, each dominated differently,
/// first merge.
pub fn dominance_frontiers(func: &Function, domtree: &DominatorTree) -> FxHashMap<Block, FxHashSet<Block>> {
    let mut df: FxHashMap<Block, FxHashSet<Block>> = FxHashMap::default();
    for block in domtree.reachable_blocks() {
        df.entry(block).or_default();
    }
    for block in domtree.reachable_blocks() {
        let preds: Vec<Block> = func.blocks[block].preds.iter().copied().collect();
        if preds.len() < 2 {
            continue;
        }
        for pred in preds {
            if !domtree.is_reachable(pred) {
                continue;
            }
            let mut runner = pred;
            while Some(runner) != domtree.idom(block) {
                df.entry(runner).or_default().insert(block);
                match domtree.idom(runner) {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }
    df
}

/// Rewrite `func` into SSA form in place: insert combinators at every
/// variable's iterated dominance frontier, rename every assignment and use
/// to a fresh per-definition `Var`, and set `enforce_ssa`.
///
/// Variables that already carry one static assignment (already "trivially"
/// SSA, e.g. synthetic temporaries the front end never reassigns) pass
/// through renamed but otherwise untouched.
pub fn construct_ssa(func: &mut Function, domtree: &DominatorTree) {
    let df = dominance_frontiers(func, domtree);
    let original_vars: Vec<Var> = func.vars.keys().collect();

    let mut phi_blocks: FxHashMap<Var, FxHashSet<Block>> = FxHashMap::default();
    for &var in &original_vars {
        let defs: FxHashSet<Block> = func.vars[var]
            .assigned_at
            .iter()
            .filter_map(|&inst| func.layout.inst_block(inst))
            .collect();
        let mut worklist: Vec<Block> = defs.iter().copied().collect();
        let has_phi = phi_blocks.entry(var).or_default();
        while let Some(block) = worklist.pop() {
            if let Some(frontier) = df.get(&block) {
                for &f in frontier {
                    if has_phi.insert(f) {
                        worklist.push(f);
                    }
                }
            }
        }
    }

    let mut phi_sites: Vec<(Var, Block)> =
        phi_blocks.iter().flat_map(|(&var, blocks)| blocks.iter().map(move |&b| (var, b))).collect();
    phi_sites.sort_by_key(|&(var, block)| (var.index(), block.index()));
    let combinator_dest: FxHashMap<(Var, Block), Var> = phi_sites
        .into_iter()
        .map(|(var, block)| {
            let ty = func.vars[var].ty;
            let dest = func.make_var(format!("{}.phi", var.index()), ty);
            ((var, block), dest)
        })
        .collect();

    for (&(var, block), &dest) in &combinator_dest {
        let edges: Vec<PhiEdge> = func.blocks[block]
            .preds
            .iter()
            .map(|&pred| PhiEdge { pred, value: Operand::Var(var) })
            .collect();
        let first_inst = func.layout.first_inst(block);
        match first_inst {
            Some(before) => FuncCursor::before(func, before).add_combinator(dest, edges),
            None => FuncCursor::at_end(func, block).add_combinator(dest, edges),
        };
    }

    rename(func, domtree, &combinator_dest);
    func.enforce_ssa = true;
}

/// Dominator-tree-order renaming: walks each block in preorder, maintaining
/// one rename stack per original variable, substituting every use with the
/// innermost definition still in scope and every assignment with a fresh
/// variable.
fn rename(func: &mut Function, domtree: &DominatorTree, combinator_dest: &FxHashMap<(Var, Block), Var>) {
    let mut stacks: FxHashMap<Var, Vec<Var>> = FxHashMap::default();
    let children = dominator_children(domtree);
    let Some(entry) = func.entry else { return };
    rename_block(func, entry, &children, &mut stacks, combinator_dest);
}

fn dominator_children(domtree: &DominatorTree) -> FxHashMap<Block, Vec<Block>> {
    let mut children: FxHashMap<Block, Vec<Block>> = FxHashMap::default();
    for block in domtree.reachable_blocks() {
        if let Some(idom) = domtree.idom(block) {
            children.entry(idom).or_default().push(block);
        }
    }
    children
}

fn rename_block(
    func: &mut Function,
    block: Block,
    children: &FxHashMap<Block, Vec<Block>>,
    stacks: &mut FxHashMap<Var, Vec<Var>>,
    combinator_dest: &FxHashMap<(Var, Block), Var>,
) {
    let mut pushed: Vec<Var> = Vec::new();

    for inst in func.layout.block_insts(block).collect::<Vec<_>>() {
        if let Insn::Combinator { .. } = &func.insts[inst] {
            // Combinator destinations were already allocated fresh in
            // `construct_ssa`; they still need their *original* variable
            // pushed onto its rename stack so downstream uses resolve to
            // this definition.
            for (&(orig, phi_block), &dest) in combinator_dest {
                if phi_block == block && func.insts[inst].dest() == Some(dest) {
                    stacks.entry(orig).or_default().push(dest);
                    pushed.push(orig);
                }
            }
            continue;
        }

        rewrite_uses(func, inst, stacks);

        if let Some(dest) = func.insts[inst].dest() {
            if !is_phi_allocated_var(dest, combinator_dest) {
                let fresh = func.make_var(format!("{}.{}", dest.index(), inst.index()), func.vars[dest].ty);
                rebind_dest(func, inst, fresh);
                stacks.entry(dest).or_default().push(fresh);
                pushed.push(dest);
            }
        }
    }

    for &succ in sorted_blocks(&func.blocks[block].succs).iter() {
        fill_combinator_edges(func, block, succ, stacks);
    }

    if let Some(kids) = children.get(&block) {
        for &child in kids {
            rename_block(func, child, children, stacks, combinator_dest);
        }
    }

    for var in pushed {
        stacks.get_mut(&var).expect("[BUG] rename stack underflow").pop();
    }
}

fn is_phi_allocated_var(var: Var, combinator_dest: &FxHashMap<(Var, Block), Var>) -> bool {
    combinator_dest.values().any(|&d| d == var)
}

/// Rewrite every operand `inst` reads to the innermost definition still on
/// its variable's rename stack. The def/use side tables (`used_at`) are kept
/// in sync with the rewritten operands by diffing `used_vars()` before and
/// after the swap, the same "remove the old use, record the new one"
/// discipline `isel::selector::rematerialize_memory_operand` follows when it
/// swaps a matched memory operand.
fn rewrite_uses(func: &mut Function, inst: crate::ir::entities::Inst, stacks: &FxHashMap<Var, Vec<Var>>) {
    fn current(var: Var, stacks: &FxHashMap<Var, Vec<Var>>) -> Var {
        stacks.get(&var).and_then(|s| s.last()).copied().unwrap_or(var)
    }
    fn swap(op: &mut Operand, stacks: &FxHashMap<Var, Vec<Var>>) {
        if let Operand::Var(v) = op {
            *v = current(*v, stacks);
        }
    }
    let before: FxHashSet<Var> = func.insts[inst].used_vars().into_iter().collect();
    match &mut func.insts[inst] {
        Insn::Expr1 { value, .. } => swap(value, stacks),
        Insn::Expr2 { lhs, rhs, .. } => {
            swap(lhs, stacks);
            swap(rhs, stacks);
        }
        Insn::Store { value, .. } => swap(value, stacks),
        Insn::Branch { cond, .. } => swap(cond, stacks),
        Insn::Call { args, .. } => {
            for a in args.iter_mut() {
                swap(a, stacks);
            }
        }
        Insn::Return { value: Some(v) } => swap(v, stacks),
        _ => {}
    }
    let after: FxHashSet<Var> = func.insts[inst].used_vars().into_iter().collect();
    for &v in before.difference(&after) {
        func.remove_use(v, inst);
    }
    for &v in after.difference(&before) {
        func.record_use(v, inst);
    }
}

/// Rebind `inst`'s destination to `fresh`, moving its `assigned_at` record
/// off the pre-rename variable and onto `fresh` so P1/P2 keep holding after
/// the rename.
fn rebind_dest(func: &mut Function, inst: crate::ir::entities::Inst, fresh: Var) {
    let old = func.insts[inst].dest().expect("[BUG] rebind_dest called on a dest-less instruction");
    match &mut func.insts[inst] {
        Insn::Expr1 { dest, .. }
        | Insn::Expr2 { dest, .. }
        | Insn::Undefined { dest }
        | Insn::Load { dest, .. }
        | Insn::LeaStack { dest, .. }
        | Insn::LeaSymbol { dest, .. } => *dest = fresh,
        Insn::Call { dest: Some(dest), .. } => *dest = fresh,
        _ => {}
    }
    func.remove_assign(old, inst);
    func.record_assign(fresh, inst);
}

/// Resolve the `succ`-block combinator's incoming edge from `pred` to the
/// definition currently on top of its variable's rename stack, keeping
/// `used_at` in sync the same way [`rewrite_uses`] does.
fn fill_combinator_edges(func: &mut Function, pred: Block, succ: Block, stacks: &FxHashMap<Var, Vec<Var>>) {
    for inst in func.layout.block_insts(succ).collect::<Vec<_>>() {
        if !func.insts[inst].is_combinator() {
            continue;
        }
        let before: FxHashSet<Var> = func.insts[inst].used_vars().into_iter().collect();
        if let Insn::Combinator { edges, .. } = &mut func.insts[inst] {
            for edge in edges.iter_mut() {
                if edge.pred == pred {
                    if let Operand::Var(v) = &edge.value {
                        let resolved = stacks.get(v).and_then(|s| s.last()).copied().unwrap_or(*v);
                        edge.value = Operand::Var(resolved);
                    }
                }
            }
        }
        let after: FxHashSet<Var> = func.insts[inst].used_vars().into_iter().collect();
        for &v in before.difference(&after) {
            func.remove_use(v, inst);
        }
        for &v in after.difference(&before) {
            func.record_use(v, inst);
        }
    }
}

fn sorted_blocks(set: &std::collections::HashSet<Block>) -> Vec<Block> {
    let mut v: Vec<Block> = set.iter().copied().collect();
    v.sort_by_key(|b| b.index());
    v
}
