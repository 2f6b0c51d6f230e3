//! A compiled function template shared by every closure created from it.
//!
//! Grounded in `lua_value/mod.rs`'s `Chunk`, trimmed to the fields the GC
//! needs to traverse — bytecode, line tables and debug metadata beyond
//! names are the compiler/interpreter's concern, not the collector's.

use crate::gc::id::GcId;
use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct GcPrototype {
    pub source_name: Option<GcId>,
    pub constants: Vec<Value>,
    pub upvalue_names: Vec<GcId>,
    pub child_protos: Vec<GcId>,
    pub local_names: Vec<GcId>,
}

impl Trace for GcPrototype {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.constants.capacity() * std::mem::size_of::<Value>()
            + (self.upvalue_names.capacity() + self.child_protos.capacity() + self.local_names.capacity())
                * std::mem::size_of::<GcId>()
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        if let Some(name) = self.source_name {
            visitor.visit(name);
        }
        for c in &self.constants {
            c.trace(visitor);
        }
        for id in &self.upvalue_names {
            visitor.visit(*id);
        }
        for id in &self.child_protos {
            visitor.visit(*id);
        }
        for id in &self.local_names {
            visitor.visit(*id);
        }
    }
}
