//! Reachability: marking objects, propagating the gray work-list, and
//! converging ephemeron tables.
//!
//! Shaped like Lua's `markobject`/`propagatemark`/`traverse*` family of
//! functions. Where Lua's `traverse*` functions reach straight into a
//! table's fields, this implementation collects a traversal's child ids
//! via the generic [`crate::gc::trace::Trace`] dispatch first (immutable
//! `&Heap` borrow) and marks them in a second pass (mutable borrow) — the
//! two-pass split exists purely to satisfy the borrow checker; C has no
//! such constraint.

use crate::gc::header::GcAge;
use crate::gc::id::GcId;
use crate::gc::state::GcState;
use crate::gc::trace::Visitor;

struct IdCollector {
    ids: Vec<GcId>,
}

impl Visitor for IdCollector {
    fn visit(&mut self, id: GcId) {
        self.ids.push(id);
    }
}

fn children_of(state: &GcState, id: GcId) -> Vec<GcId> {
    let mut collector = IdCollector { ids: Vec::new() };
    state.heap.trace_object(id, &mut collector);
    collector.ids
}

fn children_keys_only(state: &GcState, id: GcId) -> Vec<GcId> {
    let mut collector = IdCollector { ids: Vec::new() };
    state.heap.trace_table_keys_only(id, &mut collector);
    collector.ids
}

/// Marks `id` if it is currently white. Idempotent: marking an
/// already-gray or already-black object is a no-op.
///
/// Leaf kinds (strings; closed upvalues whose value holds no reference)
/// go straight to black since there is nothing left to traverse. Anything
/// else is queued on `gray` for [`propagate_one`] to expand later.
pub fn mark_object(state: &mut GcState, id: GcId) -> bool {
    if state.heap.header(id).is_fixed() {
        return false;
    }
    if !state.heap.header(id).is_white() {
        return false;
    }
    state.marked_bytes += state.heap.size_bytes(id);

    match id.kind() {
        crate::gc::id::ObjectKind::String => {
            state.heap.header_mut(id).make_black();
        }
        crate::gc::id::ObjectKind::Upvalue => {
            let is_open = state.heap.get_upvalue(id).is_some_and(|u| u.is_open());
            if is_open {
                state.heap.header_mut(id).make_gray();
                state.gray.push(id);
            } else {
                state.heap.header_mut(id).make_black();
                for child in children_of(state, id) {
                    mark_object(state, child);
                }
            }
        }
        crate::gc::id::ObjectKind::Table => {
            let weak_mode = state.heap.weak_mode(id);
            state.heap.header_mut(id).make_gray();
            if weak_mode.is_fully_weak() {
                state.all_weak.push(id);
            } else if weak_mode.weak_keys {
                state.ephemeron.push(id);
            } else if weak_mode.weak_values {
                // Always land on `weak`, regardless of phase: `clear_by_values`
                // re-derives which values are live by reading current header
                // color at clear time (atomic), not anything cached here, so
                // there is no staleness to defer — unlike a C collector
                // where a table's list membership at discovery time fixes
                // which sweep-era pass will see it. Keys are marked
                // unconditionally below, independent of list membership.
                state.weak.push(id);
                for child in children_keys_only(state, id) {
                    mark_object(state, child);
                }
                state.heap.header_mut(id).make_black();
            } else {
                state.gray.push(id);
            }
        }
        _ => {
            state.heap.header_mut(id).make_gray();
            state.gray.push(id);
        }
    }
    true
}

/// Pops one object from `gray`, blackens it, and marks everything it
/// references. Returns an approximate traversal cost (number of outbound
/// references visited) used by the orchestrator to size incremental steps.
///
/// A table's weak mode is re-derived here, not assumed from first
/// discovery: a weak-values (or fully-weak) table that was colored black
/// at discovery can still land back on `gray`/`gray_again` later via
/// [`crate::gc::barrier::barrier_back`] after a mutator write, and that
/// re-scan must respect `__mode` exactly as the first traversal did —
/// otherwise a re-grayed weak-values table gets its values strongly
/// re-marked here, which would make [`clear_by_values`] never see them as
/// dead. Mirrors `traversetable` re-deriving `__mode` on every visit, not
/// only the first.
pub fn propagate_one(state: &mut GcState) -> usize {
    let Some(id) = state.gray.pop() else { return 0 };
    if !state.heap.header(id).is_gray() {
        return 0;
    }
    state.heap.header_mut(id).make_black();

    let is_old = state.heap.header(id).age().is_old();

    let weak_mode = if id.kind() == crate::gc::id::ObjectKind::Table {
        state.heap.weak_mode(id)
    } else {
        Default::default()
    };

    let children = if weak_mode.is_fully_weak() {
        if !state.all_weak.contains(&id) {
            state.all_weak.push(id);
        }
        Vec::new()
    } else if weak_mode.weak_values {
        if !state.weak.contains(&id) {
            state.weak.push(id);
        }
        children_keys_only(state, id)
    } else if weak_mode.weak_keys {
        if !state.ephemeron.contains(&id) {
            state.ephemeron.push(id);
        }
        Vec::new()
    } else {
        children_of(state, id)
    };
    let cost = children.len();
    for child in &children {
        mark_object(state, *child);
    }

    // generational bookkeeping: an old object that now references a newly
    // blackened young one must be re-examined next minor cycle too, but
    // that is handled by barrier_back at the mutation site, not here —
    // propagation only happens for objects already gray when a cycle
    // started, which in generational mode are exactly the ones barriers
    // queued.
    let _ = is_old;
    cost
}

/// Shrinks every thread's stack storage down to its live top and nils out
/// slots above it, per the thread tracer's atomic-only step (spec §4.2).
/// Skipped during an emergency collection: `Vec::truncate`'s drop glue
/// could itself allocate, which must not happen while already recovering
/// from an allocation failure.
pub fn shrink_thread_stacks(state: &mut GcState, all_gc_snapshot: &[GcId]) {
    if state.emergency {
        return;
    }
    for &id in all_gc_snapshot {
        if id.kind() != crate::gc::id::ObjectKind::Thread {
            continue;
        }
        if let Some(t) = state.heap.get_thread_mut(id) {
            t.shrink_stack();
        }
    }
}

/// Re-marks upvalues of threads seen only during propagate (not yet
/// rescanned in atomic), per atomic step 4.
pub fn remark_dirty_threads(state: &mut GcState, all_gc_snapshot: &[GcId]) {
    for &id in all_gc_snapshot {
        if id.kind() != crate::gc::id::ObjectKind::Thread {
            continue;
        }
        let dirty = state.heap.get_thread(id).is_some_and(|t| t.dirty);
        if dirty {
            state.heap.header_mut(id).make_gray();
            state.gray.push(id);
            if let Some(t) = state.heap.get_thread_mut(id) {
                t.dirty = false;
            }
        }
    }
}

fn drain_gray(state: &mut GcState) {
    while !state.gray.is_empty() {
        propagate_one(state);
    }
}

/// Alternates iteration direction each pass, which shortens convergence on
/// chains of ephemerons within a single table (`E[k1]=k2; E[k2]=v`).
pub fn converge_ephemerons(state: &mut GcState) {
    drain_gray(state);
    let mut reverse = false;
    loop {
        let mut progressed = false;
        let tables = state.ephemeron.clone();
        let order: Box<dyn Iterator<Item = &GcId>> =
            if reverse { Box::new(tables.iter().rev()) } else { Box::new(tables.iter()) };
        for &table_id in order {
            let Some(table) = state.heap.get_table(table_id) else { continue };
            let mut newly_marked = Vec::new();
            for (k, v) in table.hash.iter() {
                let key_marked = match k {
                    crate::value::Value::Gc(kid) => !state.heap.header(*kid).is_white(),
                    _ => true,
                };
                if key_marked {
                    if let crate::value::Value::Gc(vid) = v {
                        if state.heap.header(*vid).is_white() {
                            newly_marked.push(*vid);
                        }
                    }
                }
            }
            for id in newly_marked {
                if mark_object(state, id) {
                    progressed = true;
                }
            }
        }
        drain_gray(state);
        if !progressed {
            break;
        }
        reverse = !reverse;
    }
}

/// Clears weak-value entries (array slots and hash values) referencing
/// unmarked objects, for every table in `list`.
pub fn clear_by_values(state: &mut GcState, list: &[GcId]) {
    // Computed in two passes per table: which referents are marked (shared
    // `&Heap` borrow), then the clear itself (disjoint `&mut GcTable`
    // borrow) — `GcTable::clear_dead_values` can't take a header-reading
    // closure and a mutable borrow of its own arena slot at once.
    for &table_id in list {
        let marked_ids: Vec<GcId> = {
            let Some(table) = state.heap.get_table(table_id) else { continue };
            table
                .array
                .iter()
                .chain(table.hash.values())
                .filter_map(|v| v.as_gc())
                // strings are content-addressed and always count as "values"
                // for weak-value clearing purposes, regardless of color.
                .filter(|id| id.kind() == crate::gc::id::ObjectKind::String || !state.heap.header(*id).is_white())
                .collect()
        };
        let marked_set: std::collections::HashSet<GcId> = marked_ids.into_iter().collect();
        if let Some(table) = state.heap.get_table_mut(table_id) {
            table.clear_dead_values(&mut |id| marked_set.contains(&id));
        }
    }
}

/// Removes hash entries whose key is unmarked, for every ephemeron/fully
/// weak table in `list`.
pub fn clear_by_keys(state: &mut GcState, list: &[GcId]) {
    for &table_id in list {
        let marked_keys: std::collections::HashSet<GcId> = {
            let Some(table) = state.heap.get_table(table_id) else { continue };
            table
                .hash
                .keys()
                .filter_map(|k| k.as_gc())
                .filter(|id| !state.heap.header(*id).is_white())
                .collect()
        };
        if let Some(table) = state.heap.get_table_mut(table_id) {
            table.clear_dead_keys(&mut |id| marked_keys.contains(&id));
        }
    }
}

/// Marks every root: the running thread, the registry, the string
/// metatable, and anything already queued on `to_be_fnz` (resurrection
/// candidates must stay reachable while their finalizer may still run).
pub fn mark_roots(state: &mut GcState) {
    if let Some(id) = state.main_thread {
        mark_object(state, id);
    }
    if let Some(id) = state.registry {
        mark_object(state, id);
    }
    if let Some(id) = state.string_metatable {
        mark_object(state, id);
    }
    let mut cursor = state.to_be_fnz;
    while let Some(id) = cursor {
        mark_object(state, id);
        cursor = state.heap.header(id).next();
    }
}

pub fn mark_age_barrier_targets(state: &mut GcState, list: Option<GcId>, limit: Option<GcId>) {
    let mut cursor = list;
    while let Some(id) = cursor {
        if Some(id) == limit {
            break;
        }
        mark_object(state, id);
        cursor = state.heap.header(id).next();
    }
}

pub fn set_age_for_new(state: &mut GcState, id: GcId) {
    state.heap.header_mut(id).set_age(GcAge::New);
}
