//! Walking cohort lists in bounded chunks, freeing dead objects and
//! re-tagging survivors.
//!
//! Shaped like Lua's `sweeplist`/`sweepgenlist`, which walk a
//! `GCObject **p` cursor one object at a time so a single step can stop
//! mid-list. Rust has no safe equivalent of a pointer to a link field, so
//! this implementation snapshots a list's membership into `pending` once
//! per sub-phase and relinks survivors into a fresh list as it drains
//! `pending` in budgeted chunks — each step still frees or retags exactly
//! one object at a time, it just resumes from an index rather than a raw
//! predecessor pointer.

use crate::gc::header::GcAge;
use crate::gc::id::GcId;
use crate::gc::state::GcState;

#[derive(Default)]
pub struct Sweeper {
    pending: Vec<GcId>,
    retained_head: Option<GcId>,
    retained_tail: Option<GcId>,
    /// Distinguishes "not started yet" from "drained" — both leave
    /// `pending` empty, but only the latter should advance the phase.
    began: bool,
}

impl Sweeper {
    pub fn begin(&mut self, state: &GcState, head: Option<GcId>) {
        self.begin_bounded(state, head, None);
    }

    /// Like [`Sweeper::begin`] but stops collecting at (and excludes)
    /// `limit` — used by `sweep_gen` to walk only `[head, limit)`, the
    /// nursery/survivor segment of a cohort list rather than its whole
    /// length.
    pub fn begin_bounded(&mut self, state: &GcState, head: Option<GcId>, limit: Option<GcId>) {
        self.pending.clear();
        let mut cursor = head;
        while let Some(id) = cursor {
            if Some(id) == limit {
                break;
            }
            self.pending.push(id);
            cursor = state.heap.header(id).next();
        }
        self.retained_head = None;
        self.retained_tail = None;
        self.began = true;
    }

    pub fn has_begun(&self) -> bool {
        self.began
    }

    pub fn is_done(&self) -> bool {
        self.began && self.pending.is_empty()
    }

    fn retain(&mut self, state: &mut GcState, id: GcId) {
        state.heap.header_mut(id).set_next(None);
        match self.retained_tail {
            Some(tail) => state.heap.header_mut(tail).set_next(Some(id)),
            None => self.retained_head = Some(id),
        }
        self.retained_tail = Some(id);
    }

    /// Writes the rebuilt list (survivors relinked in original order) back
    /// into `*head`, reattaching `limit` (and everything after it) at the
    /// tail — the counterpart to [`Sweeper::begin_bounded`]. Pass `limit =
    /// None` for an unbounded sweep. Call once [`Sweeper::is_done`] is true.
    pub fn finish_bounded(&mut self, state: &mut GcState, head: &mut Option<GcId>, limit: Option<GcId>) {
        match self.retained_tail {
            Some(tail) => {
                state.heap.header_mut(tail).set_next(limit);
                *head = self.retained_head.take();
            }
            None => *head = limit,
        }
        self.retained_tail = None;
        self.began = false;
    }
}

/// Incremental-mode sweep: dead objects are destroyed, survivors are
/// re-tagged to current white with age reset to `New` (ordinary objects
/// must earn survivor status again next cycle). Returns
/// `(objects_processed, objects_freed, bytes_freed)`.
pub fn sweep_step(
    state: &mut GcState,
    sweeper: &mut Sweeper,
    budget: usize,
    current_white: u8,
) -> (usize, u64, u64) {
    let mut processed = 0;
    let mut freed = 0u64;
    let mut bytes = 0u64;
    while processed < budget {
        let Some(id) = sweeper.pending.pop() else { break };
        processed += 1;
        if state.heap.header(id).is_dead(current_white) && !state.heap.header(id).is_fixed() {
            bytes += state.heap.size_bytes(id) as u64;
            state.heap.destroy(id);
            freed += 1;
        } else {
            state.heap.header_mut(id).make_white(current_white);
            state.heap.header_mut(id).set_age(GcAge::New);
            sweeper.retain(state, id);
        }
    }
    (processed, freed, bytes)
}

/// Generational-mode sweep over `[list, limit)`: advances ages per the
/// fixed transition table and reports bytes that crossed the `Old1->Old`
/// frontier, which feeds the major-collection threshold.
pub fn sweep_gen_step(
    state: &mut GcState,
    sweeper: &mut Sweeper,
    budget: usize,
    current_white: u8,
) -> (usize, u64, u64, i64) {
    let mut processed = 0;
    let mut freed = 0u64;
    let mut bytes = 0u64;
    let mut old_bytes_added = 0i64;
    while processed < budget {
        let Some(id) = sweeper.pending.pop() else { break };
        processed += 1;
        if state.heap.header(id).is_dead(current_white) && !state.heap.header(id).is_fixed() {
            bytes += state.heap.size_bytes(id) as u64;
            state.heap.destroy(id);
            freed += 1;
            continue;
        }
        let age = state.heap.header(id).age();
        let next_age = match age {
            GcAge::New => GcAge::Survival,
            GcAge::Survival => GcAge::Old1,
            GcAge::Old1 => {
                old_bytes_added += state.heap.size_bytes(id) as i64;
                GcAge::Old
            }
            GcAge::Touched1 => GcAge::Touched2,
            GcAge::Touched2 => GcAge::Old,
            other => other,
        };
        state.heap.header_mut(id).set_age(next_age);
        state.heap.header_mut(id).make_white(current_white);
        sweeper.retain(state, id);
    }
    (processed, freed, bytes, old_bytes_added)
}

/// Full-list pass used when entering generational mode: every survivor
/// becomes `Old` and is painted black immediately (they are assumed
/// reachable — this runs right after a full incremental cycle completed).
pub fn sweep_to_old(state: &mut GcState, head: &mut Option<GcId>, current_white: u8) {
    let mut sweeper = Sweeper::default();
    sweeper.begin(state, *head);
    while !sweeper.is_done() {
        let Some(id) = sweeper.pending.pop() else { break };
        if state.heap.header(id).is_dead(current_white) {
            state.heap.destroy(id);
            continue;
        }
        state.heap.header_mut(id).set_age(GcAge::Old);
        match id.kind() {
            crate::gc::id::ObjectKind::Thread => {
                state.heap.header_mut(id).make_gray();
                state.gray.push(id);
            }
            crate::gc::id::ObjectKind::Upvalue => {
                if state.heap.get_upvalue(id).is_some_and(|u| u.is_open()) {
                    state.heap.header_mut(id).make_gray();
                    state.gray.push(id);
                } else {
                    state.heap.header_mut(id).make_black();
                }
            }
            _ => state.heap.header_mut(id).make_black(),
        }
        sweeper.retain(state, id);
    }
    sweeper.finish_bounded(state, head, None);
}
