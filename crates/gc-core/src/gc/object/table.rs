//! Tables: an array part plus a hash part plus an optional metatable.
//!
//! Grounded in `lua_value/lua_table.rs`'s `LuaTable` (array + `hashbrown`
//! hash part + metatable), generalized only by using [`crate::value::Value`]
//! instead of `LuaValue` directly.

use hashbrown::HashMap;

use crate::gc::id::GcId;
use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

/// Weakness derived from a metatable's `__mode` string, resolved once per
/// traversal by [`crate::gc::heap::Heap::weak_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeakMode {
    pub weak_keys: bool,
    pub weak_values: bool,
}

impl WeakMode {
    pub fn is_strong(self) -> bool {
        !self.weak_keys && !self.weak_values
    }

    pub fn is_fully_weak(self) -> bool {
        self.weak_keys && self.weak_values
    }

    pub fn from_mode_str(s: &str) -> Self {
        WeakMode { weak_keys: s.contains('k'), weak_values: s.contains('v') }
    }
}

#[derive(Debug, Default)]
pub struct GcTable {
    pub array: Vec<Value>,
    pub hash: HashMap<Value, Value, ahash::RandomState>,
    pub metatable: Option<GcId>,
    /// Count of hash entries removed because their key's owning object was
    /// collected. `hashbrown`'s own open addressing tombstones the slot
    /// internally, so removing the entry outright (rather than keeping a
    /// placeholder "dead" key object, as a table with externally-visible
    /// probe chains would need to) does not break lookup or iteration of
    /// any other key.
    pub dead_keys: usize,
}

impl GcTable {
    pub fn new() -> Self {
        GcTable::default()
    }

    pub fn get_int(&self, i: i64) -> Value {
        if i >= 1 && (i as usize) <= self.array.len() {
            self.array[i as usize - 1]
        } else {
            self.hash.get(&Value::Int(i)).copied().unwrap_or(Value::Nil)
        }
    }

    pub fn get(&self, key: &Value) -> Value {
        if let Value::Int(i) = key {
            return self.get_int(*i);
        }
        self.hash.get(key).copied().unwrap_or(Value::Nil)
    }

    pub fn set_int(&mut self, i: i64, value: Value) {
        if i >= 1 && (i as usize) <= self.array.len() {
            self.array[i as usize - 1] = value;
            return;
        }
        if i >= 1 && (i as usize) == self.array.len() + 1 && !value.is_nil() {
            self.array.push(value);
            // absorb any contiguous successors that were waiting in the hash part
            let mut next = self.array.len() as i64 + 1;
            while let Some(v) = self.hash.remove(&Value::Int(next)) {
                self.array.push(v);
                next += 1;
            }
            return;
        }
        if value.is_nil() {
            self.hash.remove(&Value::Int(i));
        } else {
            self.hash.insert(Value::Int(i), value);
        }
    }

    pub fn set(&mut self, key: Value, value: Value) {
        if let Value::Int(i) = key {
            self.set_int(i, value);
            return;
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.array.iter().rposition(|v| !v.is_nil()).map_or(0, |i| i + 1)
    }

    /// Clears array slots and hash values whose referent the visitor
    /// reports as unmarked. Used by the weak-value clearing pass. Strings
    /// are content-addressed and are always "values", never cleared here
    /// regardless of color.
    pub fn clear_dead_values(&mut self, is_marked: &mut dyn FnMut(GcId) -> bool) {
        for slot in self.array.iter_mut() {
            if let Value::Gc(id) = slot {
                if id.kind() != crate::gc::id::ObjectKind::String && !is_marked(*id) {
                    *slot = Value::Nil;
                }
            }
        }
        for value in self.hash.values_mut() {
            if let Value::Gc(id) = value {
                if id.kind() != crate::gc::id::ObjectKind::String && !is_marked(*id) {
                    *value = Value::Nil;
                }
            }
        }
    }

    /// Removes hash entries whose key is unmarked. Used by the ephemeron
    /// key-clearing pass. Array-part keys are plain integers and never weak.
    pub fn clear_dead_keys(&mut self, is_marked: &mut dyn FnMut(GcId) -> bool) {
        let before = self.hash.len();
        self.hash.retain(|k, _| match k {
            Value::Gc(id) => is_marked(*id),
            _ => true,
        });
        self.dead_keys += before - self.hash.len();
    }
}

impl Trace for GcTable {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.array.capacity() * std::mem::size_of::<Value>()
            + self.hash.capacity() * (std::mem::size_of::<Value>() * 2)
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        for v in &self.array {
            v.trace(visitor);
        }
        for (k, v) in &self.hash {
            k.trace(visitor);
            v.trace(visitor);
        }
        if let Some(mt) = self.metatable {
            visitor.visit(mt);
        }
    }
}

/// Traces only keys, skipping values — used while a table's weak mode is
/// still being determined (propagate phase) or for an ephemeron whose
/// values haven't converged yet.
pub fn trace_keys_only(table: &GcTable, visitor: &mut dyn Visitor) {
    for (k, _) in &table.hash {
        k.trace(visitor);
    }
    if let Some(mt) = table.metatable {
        visitor.visit(mt);
    }
}
