//! Dominator tree construction via the Lengauer-Tarjan algorithm.
//!
//! A `DominatorTree` type populated by a `compute` call, queried by
//! `idom`/`dominates`. The body is the classic Lengauer-Tarjan
//! construction: depth-first numbering, semidominators via path
//! compression over a union-find-like structure, then bucket-based
//! immediate-dominator recovery. SSA construction elsewhere in this crate
//! needs dominance *frontiers*, which read naturally off the resulting
//! immediate-dominator array.

use lily_entity::EntityRef;
use rustc_hash::FxHashMap;

use crate::ir::entities::Block;
use crate::ir::function::Function;

/// A block's position in the dominator tree, keyed by its depth-first
/// preorder number (not its [`Block`] index) so that every array in this
/// module is dense.
#[derive(Clone, Copy, Debug)]
struct NodeData {
    block: Block,
    parent: usize,
    semi: usize,
    idom: usize,
    ancestor: Option<usize>,
    label: usize,
}

/// The dominance relation over one function's control-flow graph, rooted at
/// its entry block. Unreachable blocks have no entry here.
pub struct DominatorTree {
    nodes: Vec<NodeData>,
    block_to_node: FxHashMap<Block, usize>,
    valid: bool,
}

impl DominatorTree {
    pub fn new() -> Self {
        DominatorTree { nodes: Vec::new(), block_to_node: FxHashMap::default(), valid: false }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// (Re)compute the dominator tree for `func`, starting from its entry
    /// block. Blocks unreachable from the entry are simply absent from the
    /// resulting tree.
    pub fn compute(&mut self, func: &Function) {
        self.nodes.clear();
        self.block_to_node.clear();
        let Some(entry) = func.entry else {
            self.valid = true;
            return;
        };

        // Step 1: DFS numbering.
        let mut stack = vec![(entry, None::<usize>)];
        while let Some((block, parent)) = stack.pop() {
            if self.block_to_node.contains_key(&block) {
                continue;
            }
            let idx = self.nodes.len();
            self.block_to_node.insert(block, idx);
            self.nodes.push(NodeData {
                block,
                parent: parent.unwrap_or(idx),
                semi: idx,
                idom: usize::MAX,
                ancestor: None,
                label: idx,
            });
            for succ in sorted(&func.blocks[block].succs) {
                if !self.block_to_node.contains_key(&succ) {
                    stack.push((succ, Some(idx)));
                }
            }
        }

        let n = self.nodes.len();
        let mut preds_by_node: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let block = self.nodes[i].block;
            for &pred in &func.blocks[block].preds {
                if let Some(&pi) = self.block_to_node.get(&pred) {
                    preds_by_node[i].push(pi);
                }
            }
        }

        let mut bucket: Vec<Vec<usize>> = vec![Vec::new(); n];

        // Step 2 & 3: semidominators and implicit immediate dominators,
        // processed in reverse discovery order (highest index first).
        for w in (1..n).rev() {
            for &v in &preds_by_node[w] {
                let u = self.eval(v);
                if self.nodes[u].semi < self.nodes[w].semi {
                    self.nodes[w].semi = self.nodes[u].semi;
                }
            }
            let semi_w = self.nodes[w].semi;
            bucket[semi_w].push(w);
            let parent_w = self.nodes[w].parent;
            self.link(parent_w, w);

            let parent_bucket = std::mem::take(&mut bucket[parent_w]);
            for v in parent_bucket {
                let u = self.eval(v);
                self.nodes[v].idom = if self.nodes[u].semi < self.nodes[v].semi { u } else { parent_w };
            }
        }

        // Step 4: finalize immediate dominators top-down.
        for w in 1..n {
            if self.nodes[w].idom != self.nodes[w].semi {
                let idom_of_idom = self.nodes[self.nodes[w].idom].idom;
                self.nodes[w].idom = idom_of_idom;
            }
        }
        if n > 0 {
            self.nodes[0].idom = 0;
        }

        self.valid = true;
    }

    /// Path compression with label propagation: returns the ancestor of `v`
    /// (inclusive) with the smallest semidominator number on the path to the
    /// DFS-tree root explored so far.
    fn eval(&mut self, v: usize) -> usize {
        if self.nodes[v].ancestor.is_none() {
            return v;
        }
        self.compress(v);
        self.nodes[v].label
    }

    fn compress(&mut self, v: usize) {
        let Some(ancestor) = self.nodes[v].ancestor else { return };
        if self.nodes[ancestor].ancestor.is_some() {
            self.compress(ancestor);
            if self.nodes[self.nodes[ancestor].label].semi < self.nodes[self.nodes[v].label].semi {
                self.nodes[v].label = self.nodes[ancestor].label;
            }
            self.nodes[v].ancestor = self.nodes[ancestor].ancestor;
        }
    }

    fn link(&mut self, parent: usize, child: usize) {
        self.nodes[child].ancestor = Some(parent);
    }

    /// The immediate dominator of `block`, or `None` if `block` is the entry
    /// or unreachable.
    pub fn idom(&self, block: Block) -> Option<Block> {
        let &idx = self.block_to_node.get(&block)?;
        let idom_idx = self.nodes[idx].idom;
        if idom_idx == idx {
            None
        } else {
            Some(self.nodes[idom_idx].block)
        }
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.block_to_node.contains_key(&block)
    }

    /// Does `a` dominate `b` (reflexively — every block dominates itself)?
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        let (Some(&ai), Some(&bi)) = (self.block_to_node.get(&a), self.block_to_node.get(&b)) else {
            return false;
        };
        let mut cur = bi;
        loop {
            if cur == ai {
                return true;
            }
            let parent_idom = self.nodes[cur].idom;
            if parent_idom == cur {
                return cur == ai;
            }
            cur = parent_idom;
        }
    }

    /// Blocks in DFS postorder (the reverse of their discovery order).
    pub fn cfg_postorder(&self) -> impl Iterator<Item = Block> + '_ {
        self.nodes.iter().rev().map(|n| n.block)
    }

    pub fn reachable_blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.nodes.iter().map(|n| n.block)
    }
}

impl Default for DominatorTree {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(set: &std::collections::HashSet<Block>) -> Vec<Block> {
    let mut v: Vec<Block> = set.iter().copied().collect();
    v.sort_by_key(|b| b.index());
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FuncCursor;
    use crate::ir::immediates::Const;
    use crate::ir::instructions::Operand;
    use crate::ir::types::PrimType;

    /// `entry -> a -> c`, `entry -> b -> c`: `c`'s immediate dominator is
    /// `entry`, not `a` or `b`, since both paths reach it.
    #[test]
    fn diamond_cfg_idom_is_join_ancestor() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let a = f.make_block("a");
        let b = f.make_block("b");
        let c = f.make_block("c");
        let v = f.make_var("v", PrimType::Bool);

        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_expr1(v, crate::ir::instructions::UnaryOp::Mov, Operand::Const(Const::bool(true)));
            cur.add_branch(Operand::Var(v), a);
            cur.add_jump(b);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, a);
            cur.add_jump(c);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, b);
            cur.add_jump(c);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, c);
            cur.add_return(None);
        }

        let mut tree = DominatorTree::new();
        tree.compute(&f);
        assert_eq!(tree.idom(a), Some(entry));
        assert_eq!(tree.idom(b), Some(entry));
        assert_eq!(tree.idom(c), Some(entry));
        assert_eq!(tree.idom(entry), None);
        assert!(tree.dominates(entry, c));
        assert!(!tree.dominates(a, c));
    }

    #[test]
    fn straight_line_chains_idom() {
        let mut f = Function::new("f");
        let entry = f.make_block("entry");
        let mid = f.make_block("mid");
        let end = f.make_block("end");
        {
            let mut cur = FuncCursor::at_end(&mut f, entry);
            cur.add_jump(mid);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, mid);
            cur.add_jump(end);
        }
        {
            let mut cur = FuncCursor::at_end(&mut f, end);
            cur.add_return(None);
        }
        let mut tree = DominatorTree::new();
        tree.compute(&f);
        assert_eq!(tree.idom(mid), Some(entry));
        assert_eq!(tree.idom(end), Some(mid));
        assert!(tree.dominates(entry, end));
    }
}
