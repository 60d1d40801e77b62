//! `rustc-hash`-backed map/set aliases, used wherever iteration order doesn't
//! matter and a faster (non-DoS-resistant) hasher than the standard
//! library's default is worth it — internal compiler data structures, never
//! anything keyed on untrusted input.

pub use rustc_hash::{FxHashMap, FxHashSet};
