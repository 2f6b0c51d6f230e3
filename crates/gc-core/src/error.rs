//! Error taxonomy for gc-core.
//!
//! A lightweight, allocation-free error enum, in the spirit of Lua's own
//! terse error idioms, rather than pulling in `thiserror`/`anyhow`: the GC
//! only ever raises a handful of distinct conditions and a manual `Display`
//! impl is cheaper than a macro for that.

use std::fmt;

/// Conditions the collector itself can raise.
///
/// Finalizer errors are deliberately not represented here: they are caught
/// at the call site and routed through [`crate::host::Warn`] instead of
/// becoming a `GcError`, since the collector must never fail because a
/// user's `__gc` metamethod panicked or returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcError {
    /// The host allocator returned `None` even after an emergency collection.
    OutOfMemory,
    /// A size computation (typically a table rehash) would overflow `usize`.
    SizeOverflow,
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcError::OutOfMemory => write!(f, "out of memory"),
            GcError::SizeOverflow => write!(f, "size computation overflowed"),
        }
    }
}

impl std::error::Error for GcError {}

pub type GcResult<T> = Result<T, GcError>;
