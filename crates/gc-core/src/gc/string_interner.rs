//! Short-string interning table.
//!
//! Lua's own intern table hand-rolls an open-addressing scheme with
//! tombstone-free rehash-on-delete, to avoid pulling in a hashing crate it
//! didn't otherwise need. This crate already depends on `hashbrown` for
//! table hash parts, so the interner reuses it directly — the same dedup
//! behavior without re-deriving linear probing by hand.

use hashbrown::HashMap;

use crate::gc::id::GcId;

pub struct StringInterner {
    table: HashMap<Box<str>, GcId, ahash::RandomState>,
    hasher: ahash::RandomState,
}

impl Default for StringInterner {
    fn default() -> Self {
        StringInterner { table: HashMap::default(), hasher: ahash::RandomState::new() }
    }
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hasher(&self) -> &ahash::RandomState {
        &self.hasher
    }

    pub fn find(&self, s: &str) -> Option<GcId> {
        self.table.get(s).copied()
    }

    pub fn insert(&mut self, s: &str, id: GcId) {
        self.table.insert(s.into(), id);
    }

    pub fn remove(&mut self, s: &str) {
        self.table.remove(s);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Load factor below which the backing table is shrunk at `SweepEnd`.
    pub fn should_shrink(&self) -> bool {
        self.table.capacity() > 64 && self.table.len() * 4 < self.table.capacity()
    }

    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }
}
