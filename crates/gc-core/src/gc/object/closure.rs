//! Closures: a host-function variant closing over plain values, and a
//! language-function variant closing over shared upvalue cells.
//!
//! Shaped like Lua's closure representation split into C and Lua variants.

use crate::gc::id::GcId;
use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

#[derive(Debug)]
pub enum GcClosure {
    Host { upvalues: Vec<Value> },
    Lua { prototype: GcId, upvalues: Vec<GcId> },
}

impl Trace for GcClosure {
    fn size_bytes(&self) -> usize {
        match self {
            GcClosure::Host { upvalues } => {
                std::mem::size_of::<Self>() + upvalues.capacity() * std::mem::size_of::<Value>()
            }
            GcClosure::Lua { upvalues, .. } => {
                std::mem::size_of::<Self>() + upvalues.capacity() * std::mem::size_of::<GcId>()
            }
        }
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        match self {
            GcClosure::Host { upvalues } => {
                for v in upvalues {
                    v.trace(visitor);
                }
            }
            GcClosure::Lua { prototype, upvalues } => {
                visitor.visit(*prototype);
                for id in upvalues {
                    visitor.visit(*id);
                }
            }
        }
    }
}
