//! Small index types and arenas for owning compiler data by stable handle
//! rather than by pointer.
//!
//! The IR is inherently a cyclic graph: instructions refer to variables and
//! blocks, and those refer back to the instructions that define or use them.
//! Rather than express that with `Rc`/`RefCell` cycles, every entity is given
//! a small `Copy` index (an [`EntityRef`]) and storage is split between a
//! [`PrimaryMap`] (the arena that owns the data) and any number of
//! [`SecondaryMap`]s (side tables keyed by the same index, e.g. def/use
//! sets). This mirrors the way `cranelift-entity` backs Cranelift's IR.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A type that can be used as a dense, zero-cost arena index.
///
/// Implementors are newtypes around a `u32`. Use [`entity_impl`] to derive
/// this trait along with `Display`/`Debug` for a wrapper type.
pub trait EntityRef: Copy + Eq + Ord + std::fmt::Debug {
    /// Create a new index from a dense `usize`.
    fn new(index: usize) -> Self;
    /// The dense `usize` this index represents.
    fn index(self) -> usize;
}

/// Derive [`EntityRef`] (plus `Display`) for a `u32`-backed newtype.
///
/// ```ignore
/// #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
/// pub struct Var(u32);
/// entity_impl!(Var, "v");
/// ```
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident, $prefix:expr) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }
            fn index(self) -> usize {
                self.0 as usize
            }
        }
        impl std::fmt::Display for $entity {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

/// An arena that owns a dense sequence of `V`s, indexed by `K`.
///
/// Insertion order is preserved and is the only way to obtain a fresh `K`:
/// there is no removal, matching the way IR variables/blocks/frames are
/// never reused once allocated (dead ones are simply orphaned and later
/// skipped by passes that walk the owning function's live lists).
#[derive(Clone, Debug)]
pub struct PrimaryMap<K: EntityRef, V> {
    elems: Vec<V>,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    pub fn new() -> Self {
        Self { elems: Vec::new(), unused: PhantomData }
    }

    pub fn push(&mut self, value: V) -> K {
        let key = K::new(self.elems.len());
        self.elems.push(value);
        key
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.elems.len()).map(K::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.elems.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.elems.iter_mut().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.elems.iter()
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;
    fn index(&self, k: K) -> &V {
        &self.elems[k.index()]
    }
}

impl<K: EntityRef, V> IndexMut<K> for PrimaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        &mut self.elems[k.index()]
    }
}

/// A side table keyed by an entity index, growing on demand and filling new
/// slots with `V::default()`.
///
/// Used for def/use sets, visited flags, and any other per-entity data that
/// doesn't belong in the entity's own arena slot.
#[derive(Clone, Debug)]
pub struct SecondaryMap<K: EntityRef, V: Clone + Default> {
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone + Default> SecondaryMap<K, V> {
    pub fn new() -> Self {
        Self { elems: Vec::new(), default: V::default(), unused: PhantomData }
    }

    fn resize_for(&mut self, index: usize) {
        if index >= self.elems.len() {
            self.elems.resize(index + 1, self.default.clone());
        }
    }

    pub fn get(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone + Default> Index<K> for SecondaryMap<K, V> {
    type Output = V;
    fn index(&self, k: K) -> &V {
        self.get(k)
    }
}

impl<K: EntityRef, V: Clone + Default> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        self.resize_for(k.index());
        &mut self.elems[k.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
    struct Idx(u32);
    entity_impl!(Idx, "i");

    #[test]
    fn primary_map_assigns_dense_keys() {
        let mut m: PrimaryMap<Idx, &str> = PrimaryMap::new();
        let a = m.push("a");
        let b = m.push("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(m[a], "a");
        assert_eq!(m[b], "b");
    }

    #[test]
    fn secondary_map_defaults_unset_slots() {
        let mut m: SecondaryMap<Idx, bool> = SecondaryMap::new();
        let k = Idx::new(3);
        assert_eq!(*m.get(k), false);
        m[k] = true;
        assert_eq!(*m.get(k), true);
        assert_eq!(*m.get(Idx::new(0)), false);
    }
}
