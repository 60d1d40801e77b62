//! The match tree: the outer dispatch keyed by an instruction's shape
//! (opcode plus operand count), fanning out to a [`super::candidate_tree::CandidateTree`]
//! of operand-rule-qualified prototypes.
//!
//! Grounded on `original_source/src/compiler/common/back/match_tree.c`'s
//! two-level structure (coarse opcode key, then fine-grained operand
//! matching) — the original's first level is a literal tree keyed on IR node
//! shape; the Rust rendering uses a `HashMap` keyed on [`MatchKey`], since a
//! hash lookup over a small fixed key set gets the same O(1) dispatch
//! without hand-rolling tree nodes for it.

use rustc_hash::FxHashMap;

use crate::ir::instructions::{BinaryOp, Insn, UnaryOp};
use super::candidate_tree::CandidateTree;

/// The coarse shape an instruction is keyed on before its operands are
/// checked against any candidate's rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MatchKey {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Load,
    Store,
    LeaStack,
    LeaSymbol,
    Jump,
    Branch,
    Call,
    Return,
    Memcpy,
    Undefined,
}

impl MatchKey {
    /// A stable, human-readable label for error messages and the IR
    /// printer's machine-instruction fallback name.
    pub fn name(self) -> &'static str {
        match self {
            MatchKey::Unary(op) => op.name(),
            MatchKey::Binary(op) => op.name(),
            MatchKey::Load => "load",
            MatchKey::Store => "store",
            MatchKey::LeaStack => "lea_stack",
            MatchKey::LeaSymbol => "lea_symbol",
            MatchKey::Jump => "jump",
            MatchKey::Branch => "branch",
            MatchKey::Call => "call",
            MatchKey::Return => "return",
            MatchKey::Memcpy => "memcpy",
            MatchKey::Undefined => "undefined",
        }
    }

    pub fn of(insn: &Insn) -> Option<MatchKey> {
        Some(match insn {
            Insn::Expr1 { op, .. } => MatchKey::Unary(*op),
            Insn::Expr2 { op, .. } => MatchKey::Binary(*op),
            Insn::Load { .. } => MatchKey::Load,
            Insn::Store { .. } => MatchKey::Store,
            Insn::LeaStack { .. } => MatchKey::LeaStack,
            Insn::LeaSymbol { .. } => MatchKey::LeaSymbol,
            Insn::Jump { .. } => MatchKey::Jump,
            Insn::Branch { .. } => MatchKey::Branch,
            Insn::Call { .. } => MatchKey::Call,
            Insn::Return { .. } => MatchKey::Return,
            Insn::Memcpy { .. } => MatchKey::Memcpy,
            Insn::Undefined { .. } => MatchKey::Undefined,
            Insn::Combinator { .. } | Insn::Clobber { .. } | Insn::Machine { .. } => return None,
        })
    }
}

/// The whole pattern table for one backend: every candidate tree, keyed by
/// the coarse shape its patterns apply to.
#[derive(Default)]
pub struct MatchTree {
    keys: FxHashMap<MatchKey, CandidateTree>,
}

impl MatchTree {
    pub fn new() -> Self {
        MatchTree::default()
    }

    pub fn entry(&mut self, key: MatchKey) -> &mut CandidateTree {
        self.keys.entry(key).or_default()
    }

    pub fn lookup(&self, key: MatchKey) -> Option<&CandidateTree> {
        self.keys.get(&key)
    }
}
