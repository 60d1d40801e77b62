//! The candidate tree: the set of prototypes competing for one
//! [`super::match_tree::MatchKey`], disambiguated by operand rules and
//! ranked by cost.
//!
//! Grounded on `original_source/src/compiler/common/back/cand_tree.c`: the
//! original builds a genuine trie over operand rule bits so that a failed
//! match at position *N* prunes every candidate sharing that prefix. This
//! rendering keeps candidates in a flat, cost-sorted `Vec` and does a linear
//! scan instead of sharing rule prefixes in a real trie node graph — for the
//! handful of patterns one RISC-V profile needs, the asymptotic difference
//! never matters, and the flat form is far easier to read; a genuine
//! prefix-sharing trie would earn its keep with hundreds of patterns per
//! key, which this backend does not have.

use smallvec::SmallVec;

use crate::ir::function::Function;
use crate::ir::instructions::Operand;
use crate::isa::riscv::encoding::InsnProto;
use super::operand_rule::OperandRule;

/// One candidate instruction pattern: a prototype plus the rule each operand
/// position must satisfy, and a cost used to break ties when more than one
/// candidate matches.
#[derive(Clone)]
pub struct Candidate {
    pub proto: InsnProto,
    pub rules: SmallVec<[OperandRule; 3]>,
    pub cost: u32,
    /// True for a memory-operand fallback candidate (a `mem_any` rule):
    /// winning here means the matched address doesn't fit the direct
    /// `base(off)` encoding, so the selector must first materialize it
    /// into a fresh register before emitting this prototype against
    /// `offset 0`. See `isel::selector::materialize_address`.
    pub materialize_address: bool,
}

impl Candidate {
    /// A plain candidate: no address pre-materialization.
    pub fn new(proto: InsnProto, rules: SmallVec<[OperandRule; 3]>, cost: u32) -> Self {
        Candidate { proto, rules, cost, materialize_address: false }
    }
}

#[derive(Default, Clone)]
pub struct CandidateTree {
    candidates: Vec<Candidate>,
}

impl CandidateTree {
    pub fn insert(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
        self.candidates.sort_by_key(|c| c.cost);
    }

    /// The lowest-cost candidate whose rules all accept `operands`, if any.
    ///
    /// A candidate with no rules at all (pseudo-ops like `lla`/`jal`/`ret`
    /// whose real operand count is target-sequence-dependent rather than a
    /// fixed arity) matches unconditionally — this crate stops at selecting
    /// *which* prototype applies and leaves the pseudo-op's own expansion
    /// for a later emission stage this crate does not implement.
    pub fn best_match(&self, operands: &[Operand], func: &Function) -> Option<&Candidate> {
        self.candidates.iter().find(|c| {
            if c.rules.is_empty() {
                return true;
            }
            c.rules.len() == operands.len()
                && c.rules.iter().zip(operands).all(|(rule, op)| rule.matches(op, func))
        })
    }
}
