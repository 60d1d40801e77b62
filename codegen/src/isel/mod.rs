//! Match-tree / candidate-tree instruction selection.
//!
//! Three small pieces: [`operand_rule`] (the per-position constraints a
//! candidate checks), [`candidate_tree`] (candidates competing for one
//! coarse instruction shape, ranked by cost), and [`match_tree`] (the outer
//! dispatch from instruction shape to its candidate tree). [`selector`] ties
//! them together into the per-function driver.

pub mod candidate_tree;
pub mod match_tree;
pub mod operand_rule;
pub mod selector;

pub use candidate_tree::{Candidate, CandidateTree};
pub use match_tree::{MatchKey, MatchTree};
pub use selector::select_function;
