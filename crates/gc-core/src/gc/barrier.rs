//! Write barriers preserving the tri-color invariant across mutation.
//!
//! Shaped like Lua's `luaC_barrier_`/`luaC_barrierback_`, generalized to
//! generational age transitions. Callers pick forward vs. backward based
//! on the shape of the mutation: forward for a single-field store,
//! backward for a bulk update (table rehash) where re-scanning the parent
//! is cheaper than marking every child.

use crate::gc::header::GcAge;
use crate::gc::id::GcId;
use crate::gc::marker::mark_object;
use crate::gc::state::{GcPhase, GcKind, GcState};

/// Call on every pointer store `parent.field = child` where `parent` is
/// black. A no-op unless `child` is white — the cheap check the common
/// path relies on.
///
/// Pre (debug-checked, not enforced): `parent` is black, `child` is white,
/// neither is dead.
pub fn barrier_forward(state: &mut GcState, parent: GcId, child: GcId) {
    debug_assert!(state.heap.header(parent).is_black());
    if !state.heap.header(child).is_white() {
        return;
    }
    debug_assert!(!state.is_dead(parent) && !state.is_dead(child));

    if !state.phase.is_sweep_phase() {
        mark_object(state, child);
        if state.heap.header(parent).age().is_old() {
            // give `child`'s own children a chance to be marked before it
            // is promoted straight to `Old`.
            state.heap.header_mut(child).set_age(GcAge::Old0);
        }
        return;
    }

    match state.kind {
        GcKind::Incremental => {
            // `parent` will be swept away soon; whitening it means further
            // barriers on it are free instead of marking a child that is
            // about to become garbage itself.
            state.heap.header_mut(parent).make_white(state.current_white);
        }
        GcKind::GenMinor | GcKind::GenMajor => {
            // the generational sweep doesn't distinguish white shades, so
            // whitening here would free a live object.
        }
    }
}

/// Call on a bulk mutation of `parent` (rehash, multi-field update) where
/// `parent` is black. Cheaper than N calls to [`barrier_forward`]: instead
/// of marking every new child, re-queue `parent` itself for a fresh scan.
///
/// Pre (debug-checked, not enforced): `parent` is black, not dead.
///
/// Lua's own source carries a commented-out assertion here
/// (`isold(parent) && age != Touched1`) that a refactor found could fail;
/// see DESIGN.md for why this implementation keeps the permissive
/// fallback path rather than re-adding that precondition.
pub fn barrier_back(state: &mut GcState, parent: GcId) {
    debug_assert!(state.heap.header(parent).is_black());
    debug_assert!(!state.is_dead(parent));

    let age = state.heap.header(parent).age();
    if age == GcAge::Touched2 {
        // already on gray_again this cycle; just recolor.
        state.heap.header_mut(parent).make_gray();
        return;
    }
    if state.kind != GcKind::Incremental && age == GcAge::Touched1 {
        return; // already queued this cycle
    }

    state.gray_again.push(parent);
    state.heap.header_mut(parent).make_gray();
    if age.is_old() {
        state.heap.header_mut(parent).set_age(GcAge::Touched1);
    }
}

/// Whether the tri-color invariant is expected to hold for `phase` right
/// now — used by debug assertions at call sites, not by the barriers
/// themselves.
pub fn invariant_expected(phase: GcPhase) -> bool {
    phase.keeps_invariant()
}
