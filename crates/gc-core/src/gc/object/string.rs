//! Short (interned) and long (identity-compared) strings.
//!
//! Shaped like Lua's `LuaString`/string-intern table: short strings are
//! interned and compared by pointer identity once deduplicated; long
//! strings are compared by content the one time it matters (construction)
//! and by identity thereafter.

use std::hash::BuildHasher;

use smol_str::SmolStr;

use crate::gc::trace::{Trace, Visitor};

pub const MAX_SHORT_LEN: usize = 40;

#[derive(Debug)]
enum Repr {
    Short(SmolStr),
    Long(Box<str>),
}

#[derive(Debug)]
pub struct GcString {
    hash: u64,
    repr: Repr,
}

impl GcString {
    pub fn new(s: &str, hasher: &ahash::RandomState) -> Self {
        let hash = hasher.hash_one(s);
        let repr = if s.len() <= MAX_SHORT_LEN {
            Repr::Short(SmolStr::new(s))
        } else {
            Repr::Long(s.into())
        };
        GcString { hash, repr }
    }

    pub fn as_str(&self) -> &str {
        match &self.repr {
            Repr::Short(s) => s.as_str(),
            Repr::Long(s) => s,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self.repr, Repr::Short(_))
    }

    pub fn cached_hash(&self) -> u64 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Trace for GcString {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.len()
    }

    fn trace(&self, _visitor: &mut dyn Visitor) {}
}
