//! Block and instruction ordering.
//!
//! Blocks and the instructions within them form two doubly-linked lists
//! threaded through side-tables (`next`/`prev` per entity), the same
//! structure `cranelift_codegen::ir::layout::Layout` uses, so that
//! insertion and removal at a cursor position are O(1) without disturbing
//! any other instruction's stable [`Inst`] handle.

use lily_entity::SecondaryMap;

use super::entities::{Block, Inst};

#[derive(Clone, Default)]
struct BlockNode {
    prev: Option<Block>,
    next: Option<Block>,
    first_inst: Option<Inst>,
    last_inst: Option<Inst>,
}

#[derive(Clone, Default)]
struct InstNode {
    block: Option<Block>,
    prev: Option<Inst>,
    next: Option<Inst>,
}

/// The ordering of blocks within a function, and instructions within each
/// block. Does not own the block or instruction *data* — see
/// `crate::ir::function::CodeBlock` and `crate::ir::dfg`.
#[derive(Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<Block, BlockNode>,
    insts: SecondaryMap<Inst, InstNode>,
    first_block: Option<Block>,
    last_block: Option<Block>,
    num_blocks: usize,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `block` to the end of the block order.
    pub fn append_block(&mut self, block: Block) {
        let prev = self.last_block;
        self.blocks[block].prev = prev;
        if let Some(prev) = prev {
            self.blocks[prev].next = Some(block);
        } else {
            self.first_block = Some(block);
        }
        self.last_block = Some(block);
        self.num_blocks += 1;
    }

    pub fn entry_block(&self) -> Option<Block> {
        self.first_block
    }

    pub fn blocks(&self) -> BlockIter<'_> {
        BlockIter { layout: self, cur: self.first_block }
    }

    pub fn next_block(&self, block: Block) -> Option<Block> {
        self.blocks[block].next
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Remove `block` from the block order (instructions must already be
    /// empty).
    pub fn remove_block(&mut self, block: Block) {
        debug_assert!(self.blocks[block].first_inst.is_none());
        let node = self.blocks[block].clone();
        match node.prev {
            Some(p) => self.blocks[p].next = node.next,
            None => self.first_block = node.next,
        }
        match node.next {
            Some(n) => self.blocks[n].prev = node.prev,
            None => self.last_block = node.prev,
        }
        self.num_blocks -= 1;
    }

    /// Append `inst` to the end of `block`.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        let prev = self.blocks[block].last_inst;
        self.insts[inst] = InstNode { block: Some(block), prev, next: None };
        if let Some(prev) = prev {
            self.insts[prev].next = Some(inst);
        } else {
            self.blocks[block].first_inst = Some(inst);
        }
        self.blocks[block].last_inst = Some(inst);
    }

    /// Insert `inst` immediately before `before`, in `before`'s block.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        let block = self.insts[before].block.expect("[BUG] instruction not in layout");
        let prev = self.insts[before].prev;
        self.insts[inst] = InstNode { block: Some(block), prev, next: Some(before) };
        self.insts[before].prev = Some(inst);
        match prev {
            Some(p) => self.insts[p].next = Some(inst),
            None => self.blocks[block].first_inst = Some(inst),
        }
    }

    pub fn remove_inst(&mut self, inst: Inst) {
        let node = self.insts[inst].clone();
        let block = node.block.expect("[BUG] instruction not in layout");
        match node.prev {
            Some(p) => self.insts[p].next = node.next,
            None => self.blocks[block].first_inst = node.next,
        }
        match node.next {
            Some(n) => self.insts[n].prev = node.prev,
            None => self.blocks[block].last_inst = node.prev,
        }
        self.insts[inst] = InstNode::default();
    }

    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.insts[inst].block
    }

    pub fn first_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].first_inst
    }

    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].last_inst
    }

    pub fn next_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].next
    }

    pub fn prev_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].prev
    }

    pub fn block_insts(&self, block: Block) -> InstIter<'_> {
        InstIter { layout: self, cur: self.first_inst(block) }
    }
}

pub struct BlockIter<'a> {
    layout: &'a Layout,
    cur: Option<Block>,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = Block;
    fn next(&mut self) -> Option<Block> {
        let cur = self.cur?;
        self.cur = self.layout.next_block(cur);
        Some(cur)
    }
}

pub struct InstIter<'a> {
    layout: &'a Layout,
    cur: Option<Inst>,
}

impl<'a> Iterator for InstIter<'a> {
    type Item = Inst;
    fn next(&mut self) -> Option<Inst> {
        let cur = self.cur?;
        self.cur = self.layout.next_inst(cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lily_entity::EntityRef;

    #[test]
    fn appends_preserve_order() {
        let mut l = Layout::new();
        let b0 = Block::new(0);
        let b1 = Block::new(1);
        l.append_block(b0);
        l.append_block(b1);
        assert_eq!(l.blocks().collect::<Vec<_>>(), vec![b0, b1]);

        let i0 = Inst::new(0);
        let i1 = Inst::new(1);
        l.append_inst(i0, b0);
        l.append_inst(i1, b0);
        assert_eq!(l.block_insts(b0).collect::<Vec<_>>(), vec![i0, i1]);
    }

    #[test]
    fn remove_inst_relinks_neighbors() {
        let mut l = Layout::new();
        let b0 = Block::new(0);
        l.append_block(b0);
        let (i0, i1, i2) = (Inst::new(0), Inst::new(1), Inst::new(2));
        l.append_inst(i0, b0);
        l.append_inst(i1, b0);
        l.append_inst(i2, b0);
        l.remove_inst(i1);
        assert_eq!(l.block_insts(b0).collect::<Vec<_>>(), vec![i0, i2]);
    }
}
