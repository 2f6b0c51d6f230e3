//! Incremental tri-color / generational garbage collector core for an
//! embeddable dynamic-language runtime.
//!
//! [`Gc`] is the crate's public face. Everything under [`gc`] operates
//! directly on [`gc::GcState`] so the phase machine, marker, sweeper, weak
//! resolver, finalizer and barriers stay testable without a concrete
//! [`Host`] — [`Gc`] just wires a `GcState` together with a `Host` and the
//! bounded [`gc::sweeper::Sweeper`] cursor the orchestrator needs across
//! calls.
//!
//! Object storage and tracing are generic over the [`Host`]/[`host::Trace`]
//! seams, so any embedder's value representation can plug in without this
//! crate knowing its shape.

pub mod error;
pub mod gc;
pub mod host;
pub mod params;
pub mod stats;
pub mod value;

use std::ptr;

pub use error::{GcError, GcResult};
pub use gc::object::{GcClosure, GcPrototype, GcString, GcTable, GcThread, GcUpvalue, GcUserdata, WeakMode};
pub use gc::{GcId, GcKind, GcPhase, GcState, ObjectKind, Trace, Visitor};
pub use gc_core_derive::Trace;
pub use host::{Allocator, DefaultHost, Host, StderrWarn, SystemAllocator, Warn};
pub use params::{GcParams, ParamKind};
pub use stats::GcStats;
pub use value::Value;

use gc::barrier;
use gc::finalizer;
use gc::object::userdata::Payload;
use gc::sweeper::Sweeper;

/// Collection strategy requested through [`Gc::set_mode`].
///
/// The collector internally distinguishes `GenMinor`/`GenMajor` ([`GcKind`]),
/// but the host only ever asks for one of these two; which generational
/// sub-kind is active at any moment is an implementation detail of
/// [`gc::collector::young_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    Incremental,
    Generational,
}

/// The public control surface: a [`GcState`] plus the bounded sweep cursor
/// the orchestrator carries between `step()` calls, plus a `Host` for
/// allocation probing, warnings, and `__gc` invocation.
///
/// `gc_key`/`mode_key` are the interned `"__gc"`/`"__mode"` strings used to
/// look up metatable entries; they are allocated once in [`Gc::with_host`]
/// and [`Gc::fix`]ed so no cycle ever collects them even though nothing
/// traces a reference to them.
pub struct Gc<H: Host = DefaultHost> {
    state: GcState,
    sweeper: Sweeper,
    host: H,
    gc_key: GcId,
    mode_key: GcId,
}

impl Default for Gc<DefaultHost> {
    fn default() -> Self {
        Gc::with_host(DefaultHost)
    }
}

impl Gc<DefaultHost> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: Host> Gc<H> {
    pub fn with_host(host: H) -> Self {
        let mut state = GcState::new(GcParams::default());
        let hasher = state.heap.interner.hasher().clone();
        let white = state.current_white;

        let gc_key = state.heap.alloc_string(GcString::new("__gc", &hasher), white);
        let mode_key = state.heap.alloc_string(GcString::new("__mode", &hasher), white);

        // Both interned keys are roots no trace edge ever reaches, so they
        // are linked onto `all_gc` like any other object — `fix` below
        // keeps the sweeper from ever freeing them regardless.
        let mut all_gc = None;
        state.link(&mut all_gc, gc_key);
        state.link(&mut all_gc, mode_key);
        state.all_gc = all_gc;

        state.heap.interner.insert("__gc", gc_key);
        state.heap.interner.insert("__mode", mode_key);
        state.heap.mode_metatable_key = Some(mode_key);

        gc::collector::fix(&mut state, gc_key);
        gc::collector::fix(&mut state, mode_key);

        Gc { state, sweeper: Sweeper::default(), host, gc_key, mode_key }
    }

    /// The interned `"__gc"` string, used as the metatable key a host
    /// installs a finalizer function under before calling
    /// [`Gc::set_metatable`].
    pub fn gc_key(&self) -> GcId {
        self.gc_key
    }

    /// The interned `"__mode"` string, the metatable key whose value (a
    /// short string containing `'k'`/`'v'`) determines a table's weakness.
    pub fn mode_key(&self) -> GcId {
        self.mode_key
    }

    pub fn state(&self) -> &GcState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GcState {
        &mut self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn stats(&self) -> &GcStats {
        &self.state.stats
    }

    pub fn params(&self) -> &GcParams {
        &self.state.params
    }

    pub fn mode(&self) -> GcMode {
        match self.state.kind {
            GcKind::Incremental => GcMode::Incremental,
            GcKind::GenMinor | GcKind::GenMajor => GcMode::Generational,
        }
    }

    pub fn phase(&self) -> GcPhase {
        self.state.phase
    }

    // ---- control API (spec §6 "Exposed") ----

    /// Returns `total_bytes`: the live-byte counter every allocation and
    /// free adjusts.
    pub fn count_bytes(&self) -> i64 {
        self.state.total_bytes
    }

    /// Runs the collector until `debt <= 0`, i.e. one bounded work quantum
    /// (or, in `GenMinor` mode, exactly one minor collection). A no-op
    /// while [`Gc::stop`]ped.
    pub fn step(&mut self) {
        self.run(|state, sweeper, host, call_gc| gc::collector::step(state, sweeper, host, call_gc));
    }

    /// Runs a complete cycle end to end, ignoring `debt`. `emergency`
    /// skips finalizer invocation for the duration (a finalizer could
    /// itself allocate, recursing into a collection already trying to
    /// free memory).
    pub fn full(&mut self, emergency: bool) {
        self.run(|state, sweeper, host, call_gc| gc::collector::full(state, sweeper, host, call_gc, emergency));
    }

    /// Disables further collection work until [`Gc::restart`]. Allocation
    /// still accrues `total_bytes`/`debt`; it just stops triggering steps.
    pub fn stop(&mut self) {
        gc::collector::stop(&mut self.state);
    }

    pub fn restart(&mut self) {
        gc::collector::restart(&mut self.state);
    }

    /// Transitions to the requested mode at the next safe boundary. Both
    /// directions run one full collection first so the transition always
    /// starts from a clean, fully-marked state.
    pub fn set_mode(&mut self, mode: GcMode) {
        match mode {
            GcMode::Generational if self.state.kind == GcKind::Incremental => {
                self.run(|state, sweeper, host, call_gc| {
                    gc::collector::enter_generational(state, sweeper, host, call_gc)
                });
            }
            GcMode::Incremental if self.state.kind != GcKind::Incremental => {
                self.run(|state, _sweeper, host, call_gc| {
                    gc::collector::enter_incremental(state, host, call_gc)
                });
            }
            _ => {}
        }
    }

    pub fn set_param(&mut self, kind: ParamKind, value: u8) {
        match kind {
            ParamKind::Pause => self.state.params.pause = value,
            ParamKind::StepMul => self.state.params.step_mul = value,
            ParamKind::StepSize => self.state.params.step_size = value,
            ParamKind::MinorMul => self.state.params.minor_mul = value,
            ParamKind::MajorMinor => self.state.params.major_minor = value,
        }
    }

    /// Macro-equivalent of Lua's `luaC_barrier`: checks the cheap
    /// precondition (`parent` black, `child` white) itself, so callers
    /// need not track object color — only that a store `parent.f = child`
    /// just happened.
    pub fn barrier_forward(&mut self, parent: GcId, child: GcId) {
        if self.state.heap.header(parent).is_black() && self.state.heap.header(child).is_white() {
            barrier::barrier_forward(&mut self.state, parent, child);
        }
    }

    /// Macro-equivalent of Lua's `luaC_barrierback`: checks `parent` is
    /// black before the real barrier runs.
    pub fn barrier_back(&mut self, parent: GcId) {
        if self.state.heap.header(parent).is_black() {
            barrier::barrier_back(&mut self.state, parent);
        }
    }

    /// Called by `setmetatable`: installs `metatable` on `id` (a table or
    /// userdata), runs the forward barrier if needed, and migrates `id`
    /// onto `fin_obj` if `metatable` carries a `"__gc"` key.
    pub fn set_metatable(&mut self, id: GcId, metatable: Option<GcId>) {
        match id.kind() {
            ObjectKind::Table => {
                if let Some(t) = self.state.heap.get_table_mut(id) {
                    t.metatable = metatable;
                }
            }
            ObjectKind::Userdata => {
                if let Some(u) = self.state.heap.get_userdata_mut(id) {
                    u.metatable = metatable;
                }
            }
            _ => return,
        }
        if let Some(mt) = metatable {
            self.barrier_forward(id, mt);
            finalizer::check_finalizer(&mut self.state, id, mt, self.gc_key);
        }
        self.recompute_size(id);
    }

    /// Marks `id` as never-collectable (used for preallocated objects that
    /// must survive the very collection trying to reclaim space, e.g. an
    /// out-of-memory message string).
    pub fn fix(&mut self, id: GcId) {
        gc::collector::fix(&mut self.state, id);
    }

    // ---- allocation ----

    /// Interns or reuses a short string; allocates a fresh long string.
    /// Content-addressed, so a short string already present costs nothing
    /// beyond the lookup — no new header, no `total_bytes` change.
    pub fn alloc_string(&mut self, s: &str) -> GcId {
        if s.len() <= gc::object::string::MAX_SHORT_LEN {
            if let Some(id) = self.state.heap.interner.find(s) {
                return id;
            }
        }
        let hasher = self.state.heap.interner.hasher().clone();
        let white = self.state.current_white;
        let data = GcString::new(s, &hasher);
        let is_short = data.is_short();
        let id = self.state.heap.alloc_string(data, white);
        if is_short {
            self.state.heap.interner.insert(s, id);
        }
        self.link_new(id);
        id
    }

    pub fn alloc_table(&mut self) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_table(GcTable::new(), white);
        self.link_new(id);
        id
    }

    pub fn alloc_closure_host(&mut self, upvalues: Vec<Value>) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_closure(GcClosure::Host { upvalues }, white);
        self.link_new(id);
        id
    }

    pub fn alloc_closure_lua(&mut self, prototype: GcId, upvalues: Vec<GcId>) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_closure(GcClosure::Lua { prototype, upvalues }, white);
        self.link_new(id);
        id
    }

    pub fn alloc_prototype(&mut self, prototype: GcPrototype) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_prototype(prototype, white);
        self.link_new(id);
        id
    }

    pub fn alloc_upvalue(&mut self, upvalue: GcUpvalue) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_upvalue(upvalue, white);
        self.link_new(id);
        id
    }

    pub fn alloc_userdata(&mut self, payload: Box<dyn Payload>) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_userdata(GcUserdata::new(payload), white);
        self.link_new(id);
        id
    }

    pub fn alloc_thread(&mut self, thread: GcThread) -> GcId {
        let white = self.state.current_white;
        let id = self.state.heap.alloc_thread(thread, white);
        self.link_new(id);
        id
    }

    /// Links a freshly allocated object onto `all_gc`, stamps its cached
    /// size from its `Trace` impl, and gives the allocation a chance to
    /// trigger a step — mirroring Lua's `luaC_newobj`/`luaC_checkGC`, which
    /// increments debt and may run a step on every allocation. An object
    /// only migrates onto `fin_obj` later, when
    /// [`finalizer::check_finalizer`] sees a `"__gc"` metatable entry.
    fn link_new(&mut self, id: GcId) {
        let mut all_gc = self.state.all_gc.take();
        self.state.link(&mut all_gc, id);
        self.state.all_gc = all_gc;
        let size = self.recompute_size(id).max(0) as i64;
        self.state.debt += size;
        self.maybe_step();
    }

    /// Recomputes `id`'s cached header size from its current `Trace`
    /// impl and adjusts `total_bytes` by the delta. Exposed so a host can
    /// call it after a mutation that changes an object's footprint (a
    /// table growing its hash part, a thread's stack growing).
    ///
    /// Returns the size delta applied.
    pub fn recompute_size(&mut self, id: GcId) -> i64 {
        let heap = &self.state.heap;
        let new_size = match id.kind() {
            ObjectKind::String => heap.get_string(id).map(Trace::size_bytes),
            ObjectKind::Table => heap.get_table(id).map(Trace::size_bytes),
            ObjectKind::Closure => heap.get_closure(id).map(Trace::size_bytes),
            ObjectKind::Prototype => heap.get_prototype(id).map(Trace::size_bytes),
            ObjectKind::Upvalue => heap.get_upvalue(id).map(Trace::size_bytes),
            ObjectKind::Userdata => heap.get_userdata(id).map(Trace::size_bytes),
            ObjectKind::Thread => heap.get_thread(id).map(Trace::size_bytes),
        }
        .unwrap_or(0) as i64;
        let old_size = self.state.heap.header(id).size() as i64;
        self.state.heap.header_mut(id).set_size(new_size as u32);
        let delta = new_size - old_size;
        self.state.total_bytes += delta;
        delta
    }

    fn maybe_step(&mut self) {
        if !self.state.stopped && self.state.debt > 0 {
            self.step();
        }
    }

    /// Probes the host allocator for `bytes` without retaining the
    /// allocation — a way for a host to get genuine out-of-memory +
    /// emergency-collection behavior before a bulk raw-buffer allocation
    /// (e.g. growing a table's array part) it intends to perform itself
    /// right afterward. Ordinary `alloc_*` calls do not go through this:
    /// their backing storage is owned by `Heap`'s own arenas, whose bytes
    /// are already accounted for directly from `Trace::size_bytes`.
    pub fn reserve_bytes(&mut self, bytes: usize) -> GcResult<()> {
        if self.probe_alloc(bytes) {
            return Ok(());
        }
        self.full(true);
        if self.probe_alloc(bytes) {
            return Ok(());
        }
        self.host.raise_memory_error();
        Err(GcError::OutOfMemory)
    }

    fn probe_alloc(&self, bytes: usize) -> bool {
        match unsafe { self.host.realloc(ptr::null_mut(), 0, bytes) } {
            Some(p) => {
                unsafe { self.host.realloc(p, bytes, 0) };
                true
            }
            None => false,
        }
    }

    fn run(&mut self, f: impl FnOnce(&mut GcState, &mut Sweeper, &dyn Warn, &mut gc::collector::CallGc<'_>)) {
        let host = &self.host;
        let mut call_gc = |state: &mut GcState, id: GcId| host.invoke_gc_metamethod(state, id);
        f(&mut self.state, &mut self.sweeper, &self.host, &mut call_gc);
    }

    // ---- accessors ----

    pub fn string(&self, id: GcId) -> Option<&GcString> {
        self.state.heap.get_string(id)
    }

    pub fn table(&self, id: GcId) -> Option<&GcTable> {
        self.state.heap.get_table(id)
    }

    pub fn table_mut(&mut self, id: GcId) -> Option<&mut GcTable> {
        self.state.heap.get_table_mut(id)
    }

    pub fn closure(&self, id: GcId) -> Option<&GcClosure> {
        self.state.heap.get_closure(id)
    }

    pub fn prototype(&self, id: GcId) -> Option<&GcPrototype> {
        self.state.heap.get_prototype(id)
    }

    pub fn upvalue(&self, id: GcId) -> Option<&GcUpvalue> {
        self.state.heap.get_upvalue(id)
    }

    pub fn upvalue_mut(&mut self, id: GcId) -> Option<&mut GcUpvalue> {
        self.state.heap.get_upvalue_mut(id)
    }

    pub fn userdata(&self, id: GcId) -> Option<&GcUserdata> {
        self.state.heap.get_userdata(id)
    }

    pub fn userdata_mut(&mut self, id: GcId) -> Option<&mut GcUserdata> {
        self.state.heap.get_userdata_mut(id)
    }

    pub fn thread(&self, id: GcId) -> Option<&GcThread> {
        self.state.heap.get_thread(id)
    }

    pub fn thread_mut(&mut self, id: GcId) -> Option<&mut GcThread> {
        self.state.heap.get_thread_mut(id)
    }

    /// Convenience wrapper around [`Gc::table_mut`] + [`Gc::barrier_forward`]
    /// for the common single-key-single-value store.
    pub fn table_set(&mut self, table: GcId, key: Value, value: Value) {
        if let Value::Gc(child) = value {
            self.barrier_forward(table, child);
        }
        if let Some(t) = self.state.heap.get_table_mut(table) {
            t.set(key, value);
        }
        self.recompute_size(table);
    }

    // ---- roots ----

    pub fn set_main_thread(&mut self, id: GcId) {
        self.state.main_thread = Some(id);
    }

    pub fn set_registry(&mut self, id: GcId) {
        self.state.registry = Some(id);
    }

    pub fn set_string_metatable(&mut self, id: GcId) {
        self.state.string_metatable = Some(id);
    }

    pub fn main_thread(&self) -> Option<GcId> {
        self.state.main_thread
    }

    pub fn registry(&self) -> Option<GcId> {
        self.state.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FinalizerLog {
        calls: Vec<GcId>,
        resurrect_into: Option<GcId>,
    }

    /// A `Host` that actually runs `__gc`: records every call and, if armed,
    /// re-links the finalized object into a root table so resurrection can
    /// be exercised (the default `Host::invoke_gc_metamethod` is a no-op,
    /// since running real language code is the interpreter's job).
    struct RecordingHost {
        log: Rc<RefCell<FinalizerLog>>,
    }

    impl Allocator for RecordingHost {
        unsafe fn realloc(&self, old_ptr: *mut u8, old_size: usize, new_size: usize) -> Option<*mut u8> {
            unsafe { SystemAllocator.realloc(old_ptr, old_size, new_size) }
        }
    }

    impl Warn for RecordingHost {
        fn warn(&self, _message: &str) {}
    }

    impl Host for RecordingHost {
        fn invoke_gc_metamethod(&self, state: &mut GcState, id: GcId) -> Result<(), String> {
            let mut log = self.log.borrow_mut();
            log.calls.push(id);
            if let Some(target) = log.resurrect_into {
                if let Some(t) = state.heap.get_table_mut(target) {
                    t.set(Value::Int(1), Value::Gc(id));
                }
            }
            Ok(())
        }
    }

    // Every test below builds its object graph with the collector stopped:
    // `link_new` gives every allocation a chance to trigger a real step
    // (`Gc::maybe_step`), and an automatic cycle running mid-construction,
    // before a fresh id is linked under a root, would sweep it out from
    // under the test. `restart` is called once the graph is fully wired.
    fn root_table(gc: &mut Gc<impl Host>) -> GcId {
        gc.stop();
        let r = gc.alloc_table();
        gc.set_registry(r);
        r
    }

    // Spec §8 scenario 1: a reachable table survives a full cycle with its
    // byte count unchanged.
    #[test]
    fn full_collect_keeps_reachable_data() {
        let mut gc = Gc::<DefaultHost>::new();
        let r = root_table(&mut gc);
        let t = gc.alloc_table();
        gc.table_set(r, Value::Int(1), Value::Gc(t));
        for i in 1..=1000i64 {
            let s = gc.alloc_string(&format!("s{i}"));
            gc.table_set(t, Value::Int(i), Value::Gc(s));
        }
        gc.restart();

        let before = gc.count_bytes();
        gc.full(false);
        let after = gc.count_bytes();

        assert_eq!(before, after);
        let table = gc.table(t).expect("rooted table must survive");
        assert_eq!(table.len(), 1000);
        for i in 1..=1000i64 {
            assert!(matches!(table.get_int(i), Value::Gc(_)));
        }
    }

    // Spec §8 scenario 2: unrooting reclaims exactly the dropped subgraph,
    // and a second full collection with no further mutation reclaims 0.
    #[test]
    fn full_collect_reclaims_unreachable_once() {
        let mut gc = Gc::<DefaultHost>::new();
        let r = root_table(&mut gc);
        let baseline = gc.count_bytes();

        let t = gc.alloc_table();
        gc.table_set(r, Value::Int(1), Value::Gc(t));
        for i in 1..=1000i64 {
            let s = gc.alloc_string(&format!("long-unique-string-{i}"));
            gc.table_set(t, Value::Int(i), Value::Gc(s));
        }

        gc.table_set(r, Value::Int(1), Value::Nil);
        gc.restart();
        gc.full(false);
        let after_first = gc.count_bytes();
        assert_eq!(after_first, baseline);

        gc.full(false);
        let after_second = gc.count_bytes();
        assert_eq!(after_second, baseline);
    }

    // Spec §8 scenario 3: a weak-values table clears dead values but
    // survives itself, and the remaining sparse array still reads back nil.
    #[test]
    fn weak_values_table_clears_unreachable_values() {
        let mut gc = Gc::<DefaultHost>::new();
        let r = root_table(&mut gc);

        let mt = gc.alloc_table();
        let mode_v = gc.alloc_string("v");
        gc.table_set(mt, Value::Gc(gc.mode_key()), Value::Gc(mode_v));

        let t = gc.alloc_table();
        gc.set_metatable(t, Some(mt));
        gc.table_set(r, Value::Int(1), Value::Gc(t));

        let mut ud_ids = Vec::new();
        for i in 1..=10i64 {
            let payload: Box<dyn gc::object::userdata::Payload> = Box::new(i as i32);
            let ud = gc.alloc_userdata(payload);
            gc.table_set(t, Value::Int(i), Value::Gc(ud));
            ud_ids.push(ud);
        }
        gc.restart();

        gc.full(false);

        let table = gc.table(t).expect("weak table itself is still rooted");
        for i in 1..=10i64 {
            assert!(table.get_int(i).is_nil(), "value at {i} should have been cleared");
        }
        for ud in ud_ids {
            assert!(gc.userdata(ud).is_none(), "unrooted userdata should have been freed");
        }
    }

    // Spec §8 scenario 4: an ephemeron chain `E[k1] = k2; E[k2] = v` with no
    // external reference to k1/k2/v collects all three in one cycle.
    #[test]
    fn ephemeron_chain_frees_every_link() {
        let mut gc = Gc::<DefaultHost>::new();
        let r = root_table(&mut gc);

        let mt = gc.alloc_table();
        let mode_k = gc.alloc_string("k");
        gc.table_set(mt, Value::Gc(gc.mode_key()), Value::Gc(mode_k));

        let e = gc.alloc_table();
        gc.set_metatable(e, Some(mt));
        gc.table_set(r, Value::Int(1), Value::Gc(e));

        let k1 = gc.alloc_table();
        let k2 = gc.alloc_table();
        let v = gc.alloc_table();
        gc.table_set(e, Value::Gc(k1), Value::Gc(k2));
        gc.table_set(e, Value::Gc(k2), Value::Gc(v));
        gc.restart();

        gc.full(false);

        assert!(gc.table(k1).is_none());
        assert!(gc.table(k2).is_none());
        assert!(gc.table(v).is_none());
        let table = gc.table(e).expect("the ephemeron table itself is still rooted");
        assert_eq!(table.hash.len(), 0);
    }

    // Spec §8 scenario 5: a finalizer that resurrects its object by storing
    // it into a reachable global runs exactly once, and not again once the
    // object becomes unreachable a second time.
    #[test]
    fn finalizer_resurrection_runs_exactly_once() {
        let log = Rc::new(RefCell::new(FinalizerLog::default()));
        let mut gc = Gc::with_host(RecordingHost { log: log.clone() });
        let r = root_table(&mut gc);
        log.borrow_mut().resurrect_into = Some(r);

        let mt = gc.alloc_table();
        let gc_fn = gc.alloc_string("finalizer");
        gc.table_set(mt, Value::Gc(gc.gc_key()), Value::Gc(gc_fn));

        let obj = gc.alloc_table();
        gc.set_metatable(obj, Some(mt));
        gc.table_set(r, Value::Int(1), Value::Gc(obj));
        gc.table_set(r, Value::Int(1), Value::Nil); // unroot
        gc.restart();

        gc.full(false);

        assert_eq!(log.borrow().calls, vec![obj]);
        assert!(gc.table(obj).is_some(), "resurrected object must survive the cycle");
        assert_eq!(
            gc.table(r).unwrap().get_int(1),
            Value::Gc(obj),
            "finalizer should have re-stored itself into the root table"
        );

        // Drop the resurrected reference and collect again: the object is
        // unreachable a second time, but its finalizer must not re-fire.
        gc.table_set(r, Value::Int(1), Value::Nil);
        gc.full(false);

        assert_eq!(log.borrow().calls, vec![obj], "finalizer must not run twice");
        assert!(gc.table(obj).is_none(), "object is freed on its second unreachable cycle");
    }

    // Spec §8 scenario 6: generational mode runs bounded minor collections
    // as short-lived garbage accumulates, and a major cycle fires once
    // enough bytes have been promoted to old.
    #[test]
    fn generational_minor_cycles_reclaim_short_lived_garbage() {
        let mut gc = Gc::<DefaultHost>::new();
        gc.set_mode(GcMode::Generational);
        assert_eq!(gc.mode(), GcMode::Generational);
        gc.set_param(ParamKind::MajorMinor, 32); // small threshold: force a major cycle quickly

        for i in 0..10_000i64 {
            let _ = gc.alloc_string(&format!("garbage-{i}"));
            if i % 100 == 0 {
                gc.step();
            }
        }

        gc.full(false);
        assert_eq!(gc.mode(), GcMode::Generational);
        assert!(gc.count_bytes() < 4096, "unrooted garbage should not accumulate: {}", gc.count_bytes());
        assert!(gc.stats().minor_collections > 0);
        assert!(gc.stats().major_collections > 0, "a major cycle should have fired");
    }

    // Maintainer-flagged fix: `full()` called while in generational mode
    // must still run a genuine complete cycle, reclaiming old-generation
    // garbage a minor collection's nursery/survivor-only sweep never
    // visits — not silently substitute a minor collection and return.
    #[test]
    fn full_collect_in_generational_mode_reclaims_old_garbage() {
        let mut gc = Gc::<DefaultHost>::new();
        gc.set_mode(GcMode::Generational);

        let r = root_table(&mut gc);
        let t = gc.alloc_table();
        gc.table_set(r, Value::Int(1), Value::Gc(t));
        gc.restart();

        // simulate `t` already having survived into the old generation,
        // the segment a minor collection's sweep never walks.
        gc.state_mut().heap.header_mut(t).set_age(gc::header::GcAge::Old);
        gc.table_set(r, Value::Int(1), Value::Nil); // unroot: now unreachable old garbage

        let before = gc.count_bytes();
        gc.full(false);
        let after = gc.count_bytes();

        assert_eq!(gc.mode(), GcMode::Generational, "full() must return to generational mode");
        assert!(
            after < before,
            "a real full collection must reclaim unreachable old garbage, not just run a minor cycle"
        );
    }

    // Round-trip law: marking an already-marked object is a no-op.
    #[test]
    fn mark_object_is_idempotent() {
        let mut gc = Gc::<DefaultHost>::new();
        gc.stop();
        let t = gc.alloc_table();
        let before = gc.state().heap.size_bytes(t);
        gc::marker::mark_object(gc.state_mut(), t);
        let marked_once = gc.state().marked_bytes;
        gc::marker::mark_object(gc.state_mut(), t);
        let marked_twice = gc.state().marked_bytes;
        assert_eq!(marked_once, marked_twice);
        assert_eq!(before, gc.state().heap.size_bytes(t));
    }

    // Round-trip law: incremental <-> generational mode switching returns to
    // an equivalent (empty, Pause) state.
    #[test]
    fn mode_round_trip_returns_to_pause() {
        let mut gc = Gc::<DefaultHost>::new();
        assert_eq!(gc.phase(), GcPhase::Pause);
        gc.set_mode(GcMode::Generational);
        assert_eq!(gc.mode(), GcMode::Generational);
        gc.set_mode(GcMode::Incremental);
        assert_eq!(gc.mode(), GcMode::Incremental);
        assert_eq!(gc.phase(), GcPhase::Pause);
    }
}
