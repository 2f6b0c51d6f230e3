//! Collector bookkeeping: list anchors, gray work-lists, phase, mode, and
//! the byte counters that drive step sizing.
//!
//! A `global_State`-style aggregate that every other module borrows
//! mutably for the duration of one step.

use crate::gc::heap::Heap;
use crate::gc::id::GcId;
use crate::params::GcParams;
use crate::stats::GcStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    Pause,
    Propagate,
    EnterAtomic,
    SweepAllGc,
    SweepFinObj,
    SweepToBeFnz,
    SweepEnd,
    CallFin,
}

impl GcPhase {
    pub fn is_sweep_phase(self) -> bool {
        matches!(
            self,
            GcPhase::SweepAllGc | GcPhase::SweepFinObj | GcPhase::SweepToBeFnz | GcPhase::SweepEnd
        )
    }

    /// Whether the tri-color invariant is expected to hold right now.
    /// During sweep phases dead objects may still be white and reachable
    /// from a soon-to-be-collected black object, so the invariant only
    /// matters again once sweeping finishes.
    pub fn keeps_invariant(self) -> bool {
        !self.is_sweep_phase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcKind {
    Incremental,
    GenMinor,
    GenMajor,
}

/// Bounds one `sweep_gen` pass: walk from `current` up to (not including)
/// `limit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepCursor {
    pub current: Option<GcId>,
    pub limit: Option<GcId>,
}

pub struct GcState {
    pub heap: Heap,

    // cohort membership lists, intrusive via GcHeader::next
    pub all_gc: Option<GcId>,
    pub fin_obj: Option<GcId>,
    pub to_be_fnz: Option<GcId>,

    // generational anchors, pointers into all_gc
    pub survival: Option<GcId>,
    pub old1: Option<GcId>,
    pub really_old: Option<GcId>,
    pub first_old1: Option<GcId>,
    // mirrored anchor within fin_obj, marking the first old finalizable object
    pub fin_old1: Option<GcId>,

    // transient gray work-lists; rebuilt every cycle, so plain Vec stacks
    // rather than intrusive lists (unlike the cohort lists above, which
    // must support O(1) physical unlink during sweep).
    pub gray: Vec<GcId>,
    pub gray_again: Vec<GcId>,
    pub weak: Vec<GcId>,
    pub ephemeron: Vec<GcId>,
    pub all_weak: Vec<GcId>,

    pub phase: GcPhase,
    pub kind: GcKind,
    pub current_white: u8,

    pub total_bytes: i64,
    pub marked_bytes: usize,
    pub debt: i64,
    /// Bytes promoted past Old1->Old since the last major collection;
    /// compared against `params.major_threshold` to decide mode switches.
    pub old_bytes_added: i64,

    pub params: GcParams,
    pub stopped: bool,
    pub emergency: bool,

    pub registry: Option<GcId>,
    pub main_thread: Option<GcId>,
    pub string_metatable: Option<GcId>,

    pub sweep_cursor: SweepCursor,
    pub stats: GcStats,
}

pub const WHITE0: u8 = 1 << 0;
pub const WHITE1: u8 = 1 << 1;

impl GcState {
    pub fn new(params: GcParams) -> Self {
        GcState {
            heap: Heap::new(),
            all_gc: None,
            fin_obj: None,
            to_be_fnz: None,
            survival: None,
            old1: None,
            really_old: None,
            first_old1: None,
            fin_old1: None,
            gray: Vec::new(),
            gray_again: Vec::new(),
            weak: Vec::new(),
            ephemeron: Vec::new(),
            all_weak: Vec::new(),
            phase: GcPhase::Pause,
            kind: GcKind::Incremental,
            current_white: WHITE0,
            total_bytes: 0,
            marked_bytes: 0,
            debt: 0,
            old_bytes_added: 0,
            params,
            stopped: false,
            emergency: false,
            registry: None,
            main_thread: None,
            string_metatable: None,
            sweep_cursor: SweepCursor::default(),
            stats: GcStats::default(),
        }
    }

    pub fn other_white(&self) -> u8 {
        self.current_white ^ (WHITE0 | WHITE1)
    }

    pub fn is_dead(&self, id: GcId) -> bool {
        self.heap.header(id).is_dead(self.current_white)
    }

    /// Links `id` onto the head of `*list`, threading through the header's
    /// `next` field.
    pub fn link(&mut self, list: &mut Option<GcId>, id: GcId) {
        self.heap.header_mut(id).set_next(*list);
        *list = Some(id);
    }

    /// Unlinks `id` from `*list`, which must currently contain it.
    /// O(n) in list length: a plain singly-linked traversal-based unlink
    /// (no doubly-linked list is needed since every unlink site already
    /// holds the predecessor while walking).
    pub fn unlink(&mut self, list: &mut Option<GcId>, id: GcId) {
        if *list == Some(id) {
            *list = self.heap.header(id).next();
            return;
        }
        let mut cursor = *list;
        while let Some(node) = cursor {
            let next = self.heap.header(node).next();
            if next == Some(id) {
                let after = self.heap.header(id).next();
                self.heap.header_mut(node).set_next(after);
                return;
            }
            cursor = next;
        }
    }
}
