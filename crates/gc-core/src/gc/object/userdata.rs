//! Opaque host payloads, optionally carrying a metatable and a fixed
//! number of GC-visible "user value" slots.
//!
//! Grounded in `lua_value/mod.rs`'s `LuaUserdata`, generalized so the
//! payload can own its own outbound `GcId`s: a host type that embeds GC
//! references derives `Trace` (`gc-core-derive`) and is stored directly as
//! the payload rather than smuggling those references through
//! `user_values`.

use std::any::Any;

use crate::gc::id::GcId;
use crate::gc::trace::{Trace, Visitor};
use crate::value::Value;

/// A host userdata payload: any owned, traceable Rust value.
///
/// Blanket-implemented for every `Any + Trace` type, so `#[derive(Trace)]`
/// alone is enough to make a host type usable as a payload.
pub trait Payload: Any + Trace {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Trace> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct GcUserdata {
    pub payload: Box<dyn Payload>,
    pub metatable: Option<GcId>,
    pub user_values: Vec<Value>,
}

impl std::fmt::Debug for GcUserdata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcUserdata")
            .field("metatable", &self.metatable)
            .field("user_values", &self.user_values)
            .finish_non_exhaustive()
    }
}

impl GcUserdata {
    pub fn new(payload: Box<dyn Payload>) -> Self {
        GcUserdata { payload, metatable: None, user_values: Vec::new() }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.payload.as_any_mut().downcast_mut()
    }
}

impl Trace for GcUserdata {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.payload.size_bytes()
            + self.user_values.capacity() * std::mem::size_of::<Value>()
    }

    fn trace(&self, visitor: &mut dyn Visitor) {
        if let Some(mt) = self.metatable {
            visitor.visit(mt);
        }
        for v in &self.user_values {
            v.trace(visitor);
        }
        self.payload.trace(visitor);
    }
}
