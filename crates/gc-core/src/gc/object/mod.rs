//! The concrete collectable object kinds this crate ships with.
//!
//! This is intentionally a small, generic object model — the interpreter,
//! compiler and stdlib that would give these types their full language
//! semantics live outside this crate. What's here exists so every GC
//! operation (mark, sweep, barrier, weak table, finalizer) has something
//! real to exercise.

pub mod closure;
pub mod prototype;
pub mod string;
pub mod table;
pub mod thread;
pub mod upvalue;
pub mod userdata;

pub use closure::GcClosure;
pub use prototype::GcPrototype;
pub use string::GcString;
pub use table::{GcTable, WeakMode};
pub use thread::GcThread;
pub use upvalue::GcUpvalue;
pub use userdata::GcUserdata;
