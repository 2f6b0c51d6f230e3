//! Shared mutable upvalue cells: open (aliasing a stack slot, the owning
//! thread traces the real value) or closed (holding its own value).
//!
//! Shaped like Lua's `Upvalue`: open aliasing and closed-cell payload.

use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
pub enum GcUpvalue {
    /// Index into the owning thread's stack. The thread traces the stack
    /// slot directly, so an open upvalue has no outbound reference of its
    /// own and the marker keeps it gray rather than blackening it (its
    /// aliased slot may still change until the thread is re-scanned).
    Open(usize),
    Closed(Value),
}

impl GcUpvalue {
    pub fn is_open(&self) -> bool {
        matches!(self, GcUpvalue::Open(_))
    }

    pub fn stack_index(&self) -> Option<usize> {
        match self {
            GcUpvalue::Open(i) => Some(*i),
            GcUpvalue::Closed(_) => None,
        }
    }

    pub fn close(&mut self, value: Value) {
        *self = GcUpvalue::Closed(value);
    }

    pub fn get_closed(&self) -> Option<Value> {
        match self {
            GcUpvalue::Closed(v) => Some(*v),
            GcUpvalue::Open(_) => None,
        }
    }
}

impl Trace for GcUpvalue {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        if let GcUpvalue::Closed(v) = self {
            v.trace(visitor);
        }
    }
}
