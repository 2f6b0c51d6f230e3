//! Interfaces the host embedding provides to the collector.
//!
//! The GC crate never talks to `std::alloc` or `eprintln!` directly except
//! through these traits' default implementations, so an embedder can swap
//! either one without touching collector code.

use std::alloc::{self, Layout};

use crate::gc::id::GcId;
use crate::gc::state::GcState;

/// A single reallocator entry point, mirroring Lua's `frealloc`.
///
/// `new_size == 0` means free `old_ptr` (which may itself be null for a
/// fresh allocation request of size zero — callers never do this).
/// Returning `None` when `new_size > 0` signals out-of-memory.
pub trait Allocator {
    /// # Safety
    /// `old_ptr` must be either null (fresh allocation) or a pointer
    /// previously returned by this same allocator with `old_size` matching
    /// the size it was last (re)allocated at.
    unsafe fn realloc(
        &self,
        old_ptr: *mut u8,
        old_size: usize,
        new_size: usize,
    ) -> Option<*mut u8>;
}

/// The default allocator, backed by `std::alloc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    unsafe fn realloc(
        &self,
        old_ptr: *mut u8,
        old_size: usize,
        new_size: usize,
    ) -> Option<*mut u8> {
        if new_size == 0 {
            if !old_ptr.is_null() && old_size != 0 {
                let layout = Layout::from_size_align(old_size, align_for(old_size)).ok()?;
                unsafe { alloc::dealloc(old_ptr, layout) };
            }
            return Some(std::ptr::null_mut());
        }
        let new_layout = Layout::from_size_align(new_size, align_for(new_size)).ok()?;
        if old_ptr.is_null() || old_size == 0 {
            let p = unsafe { alloc::alloc(new_layout) };
            return if p.is_null() { None } else { Some(p) };
        }
        let old_layout = Layout::from_size_align(old_size, align_for(old_size)).ok()?;
        let p = unsafe { alloc::realloc(old_ptr, old_layout, new_layout.size()) };
        if p.is_null() { None } else { Some(p) }
    }
}

fn align_for(size: usize) -> usize {
    // matches the alignment std::alloc's global allocator would hand out
    // for a plain byte buffer of this size.
    size.min(16).next_power_of_two().max(1)
}

/// Sink for non-fatal diagnostics: finalizer errors and debug warnings.
///
/// No tracing/log dependency is pulled in for this — a single callback is
/// all the collector needs, and Lua's own `lua_warnf` hook works the
/// same way.
pub trait Warn {
    fn warn(&self, message: &str);
}

/// Default `Warn` implementation: writes to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrWarn;

impl Warn for StderrWarn {
    fn warn(&self, message: &str) {
        eprintln!("gc: warning: {message}");
    }
}

/// Bundles the two host hooks the collector needs beyond allocation.
pub trait Host: Allocator + Warn {
    /// Called when an emergency collection still could not satisfy an
    /// allocation request. Expected to not return (panic, longjmp-equivalent,
    /// process exit) but the collector does not require that in-crate; it
    /// treats the call returning as "host chose to continue anyway".
    fn raise_memory_error(&self) {
        panic!("gc: out of memory");
    }

    /// Invokes `id`'s `__gc` metamethod. Called with `id` freshly relinked
    /// onto `all_gc` and the collector `stop()`ped for the duration.
    ///
    /// The interpreter that would actually resolve and call a Lua function
    /// value lives outside this crate, so the default does nothing — an
    /// embedder that wants finalizers to run user code overrides this.
    fn invoke_gc_metamethod(&self, _state: &mut GcState, _id: GcId) -> Result<(), String> {
        Ok(())
    }
}

/// Default host: system allocator + stderr warnings + panicking OOM.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHost;

impl Allocator for DefaultHost {
    unsafe fn realloc(
        &self,
        old_ptr: *mut u8,
        old_size: usize,
        new_size: usize,
    ) -> Option<*mut u8> {
        unsafe { SystemAllocator.realloc(old_ptr, old_size, new_size) }
    }
}

impl Warn for DefaultHost {
    fn warn(&self, message: &str) {
        StderrWarn.warn(message)
    }
}

impl Host for DefaultHost {}
