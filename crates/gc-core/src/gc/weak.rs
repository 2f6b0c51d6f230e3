//! Weak table bookkeeping: `__mode` resolution lives on [`crate::gc::heap::Heap`]
//! since it needs arena access; this module is the thin coordinator the
//! orchestrator calls during atomic, owning the order the three weak lists
//! are drained in.

use crate::gc::marker::{clear_by_keys, clear_by_values, converge_ephemerons};
use crate::gc::state::GcState;

/// Runs ephemeron convergence to a fixed point, then clears dead values in
/// weak-value and fully-weak tables. Must run after the main mark pass has
/// fully drained but before [`finish`] clears keys, since a value can only
/// be judged dead once nothing else marks its key.
pub fn resolve(state: &mut GcState) {
    converge_ephemerons(state);
    let weak = state.weak.clone();
    let all_weak = state.all_weak.clone();
    clear_by_values(state, &weak);
    clear_by_values(state, &all_weak);
}

/// Clears dead keys from ephemeron and fully-weak tables. Run after
/// resurrection re-marking (finalizers may have kept a key alive), so a
/// second value-clear pass over just the newly-resurrected ids follows in
/// [`finish_after_resurrection`].
pub fn clear_keys(state: &mut GcState) {
    let ephemeron = state.ephemeron.clone();
    let all_weak = state.all_weak.clone();
    clear_by_keys(state, &ephemeron);
    clear_by_keys(state, &all_weak);
}

/// Final value-clear pass restricted to entries a finalizer's resurrection
/// might have newly affected.
pub fn finish_after_resurrection(state: &mut GcState) {
    let weak = state.weak.clone();
    let all_weak = state.all_weak.clone();
    clear_by_values(state, &weak);
    clear_by_values(state, &all_weak);
}

/// Clears the three transient lists at the start of a cycle.
pub fn reset(state: &mut GcState) {
    state.weak.clear();
    state.ephemeron.clear();
    state.all_weak.clear();
}
