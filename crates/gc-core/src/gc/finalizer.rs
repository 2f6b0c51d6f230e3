//! Finalizer (`__gc`) scheduling: separating dead-but-finalizable objects
//! onto `to_be_fnz`, and invoking them one at a time.
//!
//! Shaped like Lua's `GCTM`/`separatetobefnz`/`callallpendingfinalizers`
//! family. Actually *calling* a `__gc` metamethod requires invoking
//! host/interpreter code this crate doesn't have, so invocation is
//! delegated to a caller-supplied closure — the same boundary drawn
//! around `raise_memory_error`.

use crate::gc::id::GcId;
use crate::gc::state::GcState;
use crate::host::Warn;
use crate::value::Value;

/// Resolves an object's metatable, if its kind carries one.
pub fn metatable_of(state: &GcState, id: GcId) -> Option<GcId> {
    match id.kind() {
        crate::gc::id::ObjectKind::Table => state.heap.get_table(id).and_then(|t| t.metatable),
        crate::gc::id::ObjectKind::Userdata => state.heap.get_userdata(id).and_then(|u| u.metatable),
        _ => None,
    }
}

/// Whether `id`'s metatable (if any) carries a non-nil `__gc` key.
pub fn has_finalizer(state: &GcState, id: GcId, gc_key: GcId) -> bool {
    let Some(mt_id) = metatable_of(state, id) else { return false };
    let Some(mt) = state.heap.get_table(mt_id) else { return false };
    !mt.get(&Value::Gc(gc_key)).is_nil()
}

/// Whether `metatable` itself (not necessarily yet installed on anything)
/// carries a non-nil `__gc` key.
pub fn metatable_has_gc(state: &GcState, metatable: GcId, gc_key: GcId) -> bool {
    let Some(mt) = state.heap.get_table(metatable) else { return false };
    !mt.get(&Value::Gc(gc_key)).is_nil()
}

/// Called by `setmetatable` right after `new_metatable` is installed on
/// `id`: if `new_metatable` carries a `__gc` key and `id` is still on
/// `all_gc`, move it onto `fin_obj` so it survives to be finalized rather
/// than being swept silently. A no-op if `id` is already finalizable
/// (found on `fin_obj`) or already past finalization (on `to_be_fnz`).
pub fn check_finalizer(state: &mut GcState, id: GcId, new_metatable: GcId, gc_key: GcId) {
    if state.heap.header(id).is_finalized() || state.heap.header(id).is_finalizable() {
        return; // already on to_be_fnz or fin_obj, nothing to do
    }
    if !metatable_has_gc(state, new_metatable, gc_key) {
        return;
    }
    let mut all_gc = std::mem::take(&mut state.all_gc);
    state.unlink(&mut all_gc, id);
    state.all_gc = all_gc;
    let mut fin_obj = std::mem::take(&mut state.fin_obj);
    state.link(&mut fin_obj, id);
    state.fin_obj = fin_obj;
    state.heap.header_mut(id).set_finalizable(true);
}

/// Moves every white entry off `fin_obj` onto `to_be_fnz` (or every entry,
/// when `all` is set, for use at shutdown). Must run after the first mark
/// pass and before the resurrection re-mark in atomic: entries land on
/// `to_be_fnz` *as dead objects*, then get marked again so their finalizer
/// can safely touch them.
pub fn separate_to_finalize(state: &mut GcState, all: bool, current_white: u8) {
    let mut remaining = std::mem::take(&mut state.fin_obj);
    let mut kept: Option<GcId> = None;
    let mut kept_tail: Option<GcId> = None;
    let mut to_be_fnz = std::mem::take(&mut state.to_be_fnz);

    let mut cursor = remaining.take();
    while let Some(id) = cursor {
        let next = state.heap.header(id).next();
        let dead = all || state.heap.header(id).is_dead(current_white);
        if dead {
            state.heap.header_mut(id).set_finalized(true);
            state.heap.header_mut(id).set_finalizable(false);
            state.link(&mut to_be_fnz, id);
        } else {
            state.heap.header_mut(id).set_next(None);
            match kept_tail {
                Some(tail) => state.heap.header_mut(tail).set_next(Some(id)),
                None => kept = Some(id),
            }
            kept_tail = Some(id);
        }
        cursor = next;
    }

    state.fin_obj = kept;
    state.to_be_fnz = to_be_fnz;
}

/// Pops the head of `to_be_fnz`, makes it transiently reachable again on
/// `all_gc`, and invokes its finalizer through `call_gc`. Errors from the
/// finalizer are non-fatal: caught and routed through `warn`.
///
/// Returns `false` if `to_be_fnz` was empty.
pub fn invoke_one(
    state: &mut GcState,
    warn: &dyn Warn,
    call_gc: &mut dyn FnMut(&mut GcState, GcId) -> Result<(), String>,
) -> bool {
    let mut to_be_fnz = std::mem::take(&mut state.to_be_fnz);
    let Some(id) = to_be_fnz else {
        state.to_be_fnz = to_be_fnz;
        return false;
    };
    let next = state.heap.header(id).next();
    to_be_fnz = next;
    state.to_be_fnz = to_be_fnz;

    state.heap.header_mut(id).set_finalized(false);
    state.heap.header_mut(id).make_white(state.current_white);
    let mut all_gc = std::mem::take(&mut state.all_gc);
    state.link(&mut all_gc, id);
    state.all_gc = all_gc;

    let was_stopped = state.stopped;
    state.stopped = true;
    let result = call_gc(state, id);
    state.stopped = was_stopped;
    state.stats.finalizers_run += 1;
    if let Err(message) = result {
        state.stats.finalizer_errors += 1;
        warn.warn(&format!("error in __gc metamethod: {message}"));
    }
    true
}

/// Drains `to_be_fnz` entirely — used at shutdown and when entering
/// generational mode (unless in emergency, where finalizers are skipped
/// since they could themselves allocate).
pub fn invoke_all(
    state: &mut GcState,
    warn: &dyn Warn,
    call_gc: &mut dyn FnMut(&mut GcState, GcId) -> Result<(), String>,
) {
    while invoke_one(state, warn, call_gc) {}
}
