//! The phase state machine: drives mark/atomic/sweep/finalize and the
//! switch between incremental and generational mode.
//!
//! Shaped like Lua's `singlestep`/`fullgen`/`luaC_step` state machine, but
//! reshaped into plain functions operating on [`GcState`] plus a
//! finalizer-invocation callback, so this module has no dependency on a
//! concrete `Host` impl — [`crate::Gc`] supplies that glue.

use crate::gc::finalizer;
use crate::gc::header::GcAge;
use crate::gc::id::GcId;
use crate::gc::marker;
use crate::gc::state::{GcKind, GcPhase, GcState};
use crate::gc::sweeper::{self, Sweeper};
use crate::gc::weak;
use crate::host::Warn;

/// Objects processed per incremental call to a single sweep sub-phase:
/// at most this many objects per call, tunable.
pub const SWEEP_STEP_BUDGET: usize = 20;

pub type CallGc<'a> = dyn FnMut(&mut GcState, GcId) -> Result<(), String> + 'a;

/// Resets gray work-lists and marks every root. Entered from `Pause`.
pub fn restart_collection(state: &mut GcState) {
    state.gray.clear();
    state.gray_again.clear();
    weak::reset(state);
    state.marked_bytes = 0;
    state.old_bytes_added = 0;
    marker::mark_roots(state);
}

/// One transition of the orchestrator's state machine. Returns a
/// work-unit cost the caller can subtract from the step budget; `fast`
/// collapses the `Propagate` and sweep sub-phase transitions into their
/// terminal state (used by [`full`]).
pub fn single_step(
    state: &mut GcState,
    sweeper: &mut Sweeper,
    warn: &dyn Warn,
    call_gc: &mut CallGc,
    fast: bool,
) -> usize {
    match state.phase {
        GcPhase::Pause => {
            restart_collection(state);
            state.phase = GcPhase::Propagate;
            0
        }
        GcPhase::Propagate => {
            if fast || state.gray.is_empty() {
                state.phase = GcPhase::EnterAtomic;
                0
            } else {
                marker::propagate_one(state)
            }
        }
        GcPhase::EnterAtomic => {
            run_atomic(state);
            let head = state.all_gc;
            sweeper.begin(state, head);
            state.phase = GcPhase::SweepAllGc;
            0
        }
        GcPhase::SweepAllGc => {
            let gen = state.kind == GcKind::GenMajor;
            sweep_phase_step(state, sweeper, fast, gen, |s| s.all_gc, |s, h| s.all_gc = h, GcPhase::SweepFinObj)
        }
        GcPhase::SweepFinObj => {
            let gen = state.kind == GcKind::GenMajor;
            sweep_phase_step(state, sweeper, fast, gen, |s| s.fin_obj, |s, h| s.fin_obj = h, GcPhase::SweepToBeFnz)
        }
        GcPhase::SweepToBeFnz => {
            sweep_phase_step(state, sweeper, fast, false, |s| s.to_be_fnz, |s, h| s.to_be_fnz = h, GcPhase::SweepEnd)
        }
        GcPhase::SweepEnd => {
            if state.heap.interner.should_shrink() {
                state.heap.interner.shrink_to_fit();
            }
            state.phase = GcPhase::CallFin;
            0
        }
        GcPhase::CallFin => {
            if state.to_be_fnz.is_some() && !state.emergency {
                finalizer::invoke_one(state, warn, call_gc);
                1
            } else {
                finish_cycle(state);
                state.phase = GcPhase::Pause;
                0
            }
        }
    }
}

/// Drives one budgeted chunk of a sweep sub-phase. `generational` selects
/// [`sweeper::sweep_gen_step`] (age-advancing, used while sweeping a
/// `GenMajor` cycle so promotion survives it) over the plain
/// age-resetting [`sweeper::sweep_step`] used by `Incremental`.
fn sweep_phase_step(
    state: &mut GcState,
    sweeper: &mut Sweeper,
    fast: bool,
    generational: bool,
    get: impl Fn(&GcState) -> Option<GcId>,
    set: impl Fn(&mut GcState, Option<GcId>),
    next: GcPhase,
) -> usize {
    if !sweeper.has_begun() {
        let head = get(state);
        sweeper.begin(state, head);
    }
    let budget = if fast { usize::MAX } else { SWEEP_STEP_BUDGET };
    let current_white = state.current_white;
    let processed = if generational {
        let (processed, freed, bytes, old_bytes) = sweeper::sweep_gen_step(state, sweeper, budget, current_white);
        state.total_bytes -= bytes as i64;
        state.stats.record_sweep(freed, bytes);
        state.old_bytes_added += old_bytes;
        processed
    } else {
        let (processed, freed, bytes) = sweeper::sweep_step(state, sweeper, budget, current_white);
        state.total_bytes -= bytes as i64;
        state.stats.record_sweep(freed, bytes);
        processed
    };
    if sweeper.is_done() {
        let mut head = None;
        sweeper.finish_bounded(state, &mut head, None);
        set(state, head);
        state.phase = next;
    }
    processed
}

/// Ends a cycle at `CallFin -> Pause`. A `GenMajor` cycle rebuilds the
/// generational anchors its age-advancing sweep just invalidated and drops
/// back to `GenMinor` unconditionally — the major/minor threshold is a
/// policy tuning, not a correctness question, so staying major for
/// multiple cycles in a row buys nothing a simpler "one major cycle, then
/// back to minor" doesn't already give (see DESIGN.md).
fn finish_cycle(state: &mut GcState) {
    state.stats.full_collections += 1;
    match state.kind {
        GcKind::Incremental => {
            state.debt = -(state.params.pause_bytes(state.total_bytes));
        }
        GcKind::GenMajor => {
            state.stats.major_collections += 1;
            recompute_generational_anchors(state);
            state.kind = GcKind::GenMinor;
            state.old_bytes_added = 0;
            state.debt = -(state.params.minor_threshold(state.total_bytes.max(1)));
        }
        GcKind::GenMinor => {}
    }
}

/// Steps 1-11 of the atomic phase: the single indivisible pass that
/// finishes marking, resolves weak references, and flips the white bit.
fn run_atomic(state: &mut GcState) {
    let saved_gray_again = std::mem::take(&mut state.gray_again);

    // (2) mark the running thread, registry, primitive metatables again —
    // mutator activity since the last propagate may have dirtied them.
    marker::mark_roots(state);
    // (3) drain gray
    drain(state);

    // (4) re-mark upvalues of threads only seen during propagate.
    let all_gc_snapshot = collect_list(state, state.all_gc);
    marker::remark_dirty_threads(state, &all_gc_snapshot);

    // (5) drain, attach saved gray_again, drain again
    drain(state);
    state.gray.extend(saved_gray_again);
    drain(state);

    // thread tracer's atomic-only step: shrink every thread's stack to its
    // live top (unless emergency) now that marking is finished.
    marker::shrink_thread_stacks(state, &all_gc_snapshot);

    // (6)+(7) converge ephemerons, clear_by_values(weak/all_weak, inf).
    weak::resolve(state);

    // (8) separate dead finalizables, mark to_be_fnz for resurrection,
    // drain, converge again.
    finalizer::separate_to_finalize(state, false, state.current_white);
    let mut cursor = state.to_be_fnz;
    while let Some(id) = cursor {
        marker::mark_object(state, id);
        cursor = state.heap.header(id).next();
    }
    drain(state);
    weak::resolve(state);

    // (9) clear dead keys from ephemeron/fully-weak tables.
    weak::clear_keys(state);

    // (10) final value-clear pass for entries resurrection may have
    // affected.
    weak::finish_after_resurrection(state);

    // (11) shrink string cache, flip current_white.
    if state.heap.interner.should_shrink() {
        state.heap.interner.shrink_to_fit();
    }
    state.current_white = state.other_white();
}

fn drain(state: &mut GcState) {
    while !state.gray.is_empty() {
        marker::propagate_one(state);
    }
}

fn collect_list(state: &GcState, head: Option<GcId>) -> Vec<GcId> {
    let mut out = Vec::new();
    let mut cursor = head;
    while let Some(id) = cursor {
        out.push(id);
        cursor = state.heap.header(id).next();
    }
    out
}

/// Sizes one incremental step by `step_mul * step_size` work units and
/// loops [`single_step`] until that much work is done or the cycle
/// returns to `Pause`.
pub fn inc_step(state: &mut GcState, sweeper: &mut Sweeper, warn: &dyn Warn, call_gc: &mut CallGc) {
    let work2do = (state.params.step_multiplier() * state.params.step_work()).max(1) as usize;
    let mut done = 0usize;
    loop {
        let cost = single_step(state, sweeper, warn, call_gc, false);
        done += cost.max(1);
        if state.phase == GcPhase::Pause || done >= work2do {
            break;
        }
    }
}

/// Runs `step()` the host-visible way: does nothing while stopped; drives
/// a minor collection directly in generational-minor mode (minor
/// collections are not incremental, the nursery is bounded so they always
/// run to completion); otherwise loops [`inc_step`] while debt remains
/// positive.
pub fn step(state: &mut GcState, sweeper: &mut Sweeper, warn: &dyn Warn, call_gc: &mut CallGc) {
    if state.stopped {
        return;
    }
    if state.kind == GcKind::GenMinor {
        if state.debt > 0 {
            young_collection(state, warn, call_gc);
        }
        return;
    }
    while state.debt > 0 && state.kind != GcKind::GenMinor {
        inc_step(state, sweeper, warn, call_gc);
    }
}

/// Runs a complete cycle end to end, ignoring the debt threshold. With
/// `emergency` set, finalizers are skipped for the duration (they could
/// themselves allocate, which would recurse into a collection that is
/// already trying to free memory).
///
/// In either generational sub-mode this must still reclaim every
/// unreachable object, not just the nursery/survivor segments a minor
/// collection touches — mirroring `luaC_changemode`'s temporary switch to
/// `KGC_INC` for the duration of a generational `luaC_fullgc`: the mode is
/// flipped to `Incremental` for one genuine complete mark-sweep cycle, then
/// [`atomic_to_gen`] re-derives the generational anchors and drops back to
/// `GenMinor`, the same transition [`enter_generational`] performs.
pub fn full(state: &mut GcState, sweeper: &mut Sweeper, warn: &dyn Warn, call_gc: &mut CallGc, emergency: bool) {
    let was_emergency = state.emergency;
    state.emergency = emergency;

    let was_kind = state.kind;
    if was_kind != GcKind::Incremental {
        state.kind = GcKind::Incremental;
    }

    // fast-forward to Pause if a cycle is already in flight, then run one
    // complete cycle, fast, Pause -> Pause.
    while state.phase != GcPhase::Pause {
        single_step(state, sweeper, warn, call_gc, true);
    }
    single_step(state, sweeper, warn, call_gc, true); // Pause -> Propagate
    while state.phase != GcPhase::Pause {
        single_step(state, sweeper, warn, call_gc, true);
    }

    if was_kind != GcKind::Incremental {
        atomic_to_gen(state);
    }

    state.emergency = was_emergency;
}

/// Marks `Old1` and everything from `first_old1` (treated here as a
/// single "old generation" anchor, see DESIGN.md) as possibly pointing
/// into the nursery, runs atomic, then `sweep_gen`s the nursery and
/// survivor segments, advancing ages. Not incremental: the nursery is
/// bounded, so a minor collection always runs to completion in one call.
pub fn young_collection(state: &mut GcState, warn: &dyn Warn, call_gc: &mut CallGc) {
    marker::mark_age_barrier_targets(state, state.old1, None);
    drain(state);
    run_atomic(state);

    let current_white = state.current_white;
    let mut old_bytes = 0i64;

    old_bytes += sweep_gen_range(state, |s| s.all_gc, |s, h| s.all_gc = h, state.survival, current_white);
    old_bytes += sweep_gen_range(state, |s| s.survival, |s, h| s.survival = h, state.old1, current_white);
    old_bytes +=
        sweep_gen_range(state, |s| s.fin_obj, |s, h| s.fin_obj = h, state.fin_old1, current_white);

    state.old_bytes_added += old_bytes;
    state.stats.minor_collections += 1;

    if !state.emergency {
        finalizer::invoke_all(state, warn, call_gc);
    }

    recompute_generational_anchors(state);

    state.debt = -(state.params.minor_threshold(state.total_bytes.max(1)));

    if state.old_bytes_added >= state.params.major_threshold(state.total_bytes.max(1)) {
        minor_to_inc(state);
    }
}

/// Sweeps `[get(state), limit)`, writes the rebuilt segment back through
/// `set`, and returns bytes that crossed the `Old1 -> Old` frontier.
fn sweep_gen_range(
    state: &mut GcState,
    get: impl Fn(&GcState) -> Option<GcId>,
    set: impl Fn(&mut GcState, Option<GcId>),
    limit: Option<GcId>,
    current_white: u8,
) -> i64 {
    let head = get(state);
    let mut sweeper = Sweeper::default();
    sweeper.begin_bounded(state, head, limit);
    let mut old_bytes = 0i64;
    while !sweeper.is_done() {
        let (_, freed, bytes, old) = sweeper::sweep_gen_step(state, &mut sweeper, usize::MAX, current_white);
        state.total_bytes -= bytes as i64;
        state.stats.record_sweep(freed, bytes);
        old_bytes += old;
    }
    let mut new_head = None;
    sweeper.finish_bounded(state, &mut new_head, limit);
    set(state, new_head);
    old_bytes
}

/// Recomputes `survival`/`old1` by walking `all_gc` once, finding the
/// first node that is no longer `New` and the first node that has reached
/// `Old`. `first_old1`/`really_old` are intentionally left unused beyond
/// this point — see DESIGN.md for why collapsing them into a single
/// `old1` anchor is a safe (if more conservative) simplification.
fn recompute_generational_anchors(state: &mut GcState) {
    let mut survival = None;
    let mut old1 = None;
    let mut cursor = state.all_gc;
    while let Some(id) = cursor {
        let age = state.heap.header(id).age();
        if survival.is_none() && age != GcAge::New {
            survival = Some(id);
        }
        if old1.is_none() && age.is_old() {
            old1 = Some(id);
        }
        cursor = state.heap.header(id).next();
    }
    state.survival = survival;
    state.old1 = old1;

    let mut fin_old1 = None;
    let mut cursor = state.fin_obj;
    while let Some(id) = cursor {
        if state.heap.header(id).age().is_old() {
            fin_old1 = Some(id);
            break;
        }
        cursor = state.heap.header(id).next();
    }
    state.fin_old1 = fin_old1;
}

/// Transition from incremental mode into generational mode: finish the
/// current cycle, sweep everything to `Old`, set up generational anchors,
/// and arm the next `step()` to run a minor collection.
pub fn enter_generational(state: &mut GcState, sweeper: &mut Sweeper, warn: &dyn Warn, call_gc: &mut CallGc) {
    full(state, sweeper, warn, call_gc, false);
    atomic_to_gen(state);
}

fn atomic_to_gen(state: &mut GcState) {
    let current_white = state.current_white;
    let mut all_gc = state.all_gc;
    sweeper::sweep_to_old(state, &mut all_gc, current_white);
    state.all_gc = all_gc;
    let mut fin_obj = state.fin_obj;
    sweeper::sweep_to_old(state, &mut fin_obj, current_white);
    state.fin_obj = fin_obj;
    drain(state);

    state.survival = None;
    state.old1 = None;
    state.really_old = None;
    state.first_old1 = None;
    state.fin_old1 = None;
    state.old_bytes_added = 0;
    state.kind = GcKind::GenMinor;
    state.debt = -(state.params.minor_threshold(state.total_bytes.max(1)));
}

/// Transition from generational mode back to incremental: runs a minor
/// collection to establish a clean baseline, clears the generational
/// anchors (there is no nursery/survivor segmentation in incremental
/// mode), and arms the next `step()` with a fresh pause-sized debt, the
/// same anchor reset Lua's `change_to_incremental_mode` performs before
/// entering its own sweep phase.
pub fn enter_incremental(state: &mut GcState, warn: &dyn Warn, call_gc: &mut CallGc) {
    if state.kind == GcKind::Incremental {
        return;
    }
    if state.debt > 0 {
        young_collection(state, warn, call_gc);
    }
    state.kind = GcKind::Incremental;
    state.survival = None;
    state.old1 = None;
    state.really_old = None;
    state.first_old1 = None;
    state.fin_old1 = None;
    state.old_bytes_added = 0;
    state.phase = GcPhase::Pause;
    state.debt = state.params.step_work();
}

/// Escalates from a minor to a major generational cycle once accumulated
/// old-byte growth crosses `major_minor × total_bytes`. The next `step()`
/// call drives the major cycle through the ordinary incremental phase
/// machine: `GenMajor` marks and sweeps exactly like `Incremental`, except
/// its sweep advances ages (via [`sweeper::sweep_gen_step`]) instead of
/// resetting them, and [`finish_cycle`] returns it to `GenMinor` instead
/// of leaving it in `Incremental` once the cycle completes.
fn minor_to_inc(state: &mut GcState) {
    state.kind = GcKind::GenMajor;
    state.phase = GcPhase::Pause;
    state.debt = 1;
}

/// `stop()` on the control API: disables further collection work. The
/// mutator may still allocate; `total_bytes`/`debt` keep accruing, they
/// just stop triggering a step.
pub fn stop(state: &mut GcState) {
    state.stopped = true;
}

pub fn restart(state: &mut GcState) {
    state.stopped = false;
}

/// Marks `id` as never-collectable (used for preallocated objects like
/// the out-of-memory message, which must survive the very collection that
/// is trying to reclaim space).
pub fn fix(state: &mut GcState, id: GcId) {
    state.heap.header_mut(id).set_fixed(true);
    state.heap.header_mut(id).make_black();
}
