//! A coroutine's value stack and the list of upvalues still open onto it.
//!
//! Frame/bytecode-execution state is the interpreter's concern; the GC
//! only needs the flat value stack and open-upvalue bookkeeping, the same
//! fields Lua's own `LuaThread` traces.

use crate::gc::id::GcId;
use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct GcThread {
    pub stack: Vec<Value>,
    pub top: usize,
    pub open_upvalues: Vec<GcId>,
    /// Set when the mutator has run since this thread was last scanned;
    /// atomic always re-marks such threads because a running thread's
    /// stack can change without ever going through a write barrier.
    pub dirty: bool,
}

impl GcThread {
    pub fn new() -> Self {
        GcThread::default()
    }

    /// Clears stack slots above `top`, keeping the backing allocation.
    /// Skipped during an emergency collection since shrinking can itself
    /// allocate via `Vec::truncate`'s drop glue in pathological cases.
    pub fn shrink_stack(&mut self) {
        self.stack.truncate(self.top);
    }
}

impl Trace for GcThread {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.stack.capacity() * std::mem::size_of::<Value>()
            + self.open_upvalues.capacity() * std::mem::size_of::<GcId>()
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        for v in &self.stack[..self.top.min(self.stack.len())] {
            v.trace(visitor);
        }
        for id in &self.open_upvalues {
            visitor.visit(*id);
        }
    }
}
