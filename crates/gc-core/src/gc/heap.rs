//! Storage for every collectable object, keyed by [`GcId`].
//!
//! One [`Arena`] per object kind — a struct of typed arenas rather than
//! one arena of a boxed enum, so each kind's data stays unboxed and
//! cache-friendly, at the cost of the dispatch `match` below standing in
//! for what a single homogeneous arena would get for free.

use crate::gc::arena::Arena;
use crate::gc::header::GcHeader;
use crate::gc::id::{GcId, ObjectKind};
use crate::gc::object::{GcClosure, GcPrototype, GcString, GcTable, GcThread, GcUpvalue, GcUserdata, WeakMode};
use crate::gc::string_interner::StringInterner;
use crate::gc::trace::{Trace as _, Visitor};

struct GcBox<T> {
    header: GcHeader,
    data: T,
}

#[derive(Default)]
pub struct Heap {
    strings: Arena<GcBox<GcString>>,
    tables: Arena<GcBox<GcTable>>,
    closures: Arena<GcBox<GcClosure>>,
    prototypes: Arena<GcBox<GcPrototype>>,
    upvalues: Arena<GcBox<GcUpvalue>>,
    userdata: Arena<GcBox<GcUserdata>>,
    threads: Arena<GcBox<GcThread>>,
    pub interner: StringInterner,
    pub mode_metatable_key: Option<GcId>,
}

macro_rules! kind_methods {
    ($alloc:ident, $get:ident, $get_mut:ident, $free:ident, $field:ident, $ty:ty, $kind:expr) => {
        pub fn $alloc(&mut self, data: $ty, current_white: u8) -> GcId {
            let size = std::mem::size_of::<GcBox<$ty>>() as u32;
            let index = self.$field.alloc(GcBox { header: GcHeader::new(current_white, size), data });
            GcId::new($kind, index)
        }

        pub fn $get(&self, id: GcId) -> Option<&$ty> {
            self.$field.get(id.index()).map(|b| &b.data)
        }

        pub fn $get_mut(&mut self, id: GcId) -> Option<&mut $ty> {
            self.$field.get_mut(id.index()).map(|b| &mut b.data)
        }

        pub fn $free(&mut self, id: GcId) -> Option<$ty> {
            self.$field.free(id.index()).map(|b| b.data)
        }
    };
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    kind_methods!(alloc_string, get_string, get_string_mut, free_string, strings, GcString, ObjectKind::String);
    kind_methods!(alloc_table, get_table, get_table_mut, free_table, tables, GcTable, ObjectKind::Table);
    kind_methods!(alloc_closure, get_closure, get_closure_mut, free_closure, closures, GcClosure, ObjectKind::Closure);
    kind_methods!(
        alloc_prototype,
        get_prototype,
        get_prototype_mut,
        free_prototype,
        prototypes,
        GcPrototype,
        ObjectKind::Prototype
    );
    kind_methods!(alloc_upvalue, get_upvalue, get_upvalue_mut, free_upvalue, upvalues, GcUpvalue, ObjectKind::Upvalue);
    kind_methods!(
        alloc_userdata,
        get_userdata,
        get_userdata_mut,
        free_userdata,
        userdata,
        GcUserdata,
        ObjectKind::Userdata
    );
    kind_methods!(alloc_thread, get_thread, get_thread_mut, free_thread, threads, GcThread, ObjectKind::Thread);

    pub fn header(&self, id: GcId) -> &GcHeader {
        match id.kind() {
            ObjectKind::String => &self.strings.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Table => &self.tables.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Closure => &self.closures.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Prototype => &self.prototypes.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Upvalue => &self.upvalues.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Userdata => &self.userdata.get(id.index()).expect("dangling GcId").header,
            ObjectKind::Thread => &self.threads.get(id.index()).expect("dangling GcId").header,
        }
    }

    pub fn header_mut(&mut self, id: GcId) -> &mut GcHeader {
        match id.kind() {
            ObjectKind::String => &mut self.strings.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Table => &mut self.tables.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Closure => &mut self.closures.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Prototype => &mut self.prototypes.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Upvalue => &mut self.upvalues.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Userdata => &mut self.userdata.get_mut(id.index()).expect("dangling GcId").header,
            ObjectKind::Thread => &mut self.threads.get_mut(id.index()).expect("dangling GcId").header,
        }
    }

    pub fn is_valid(&self, id: GcId) -> bool {
        match id.kind() {
            ObjectKind::String => self.strings.is_valid(id.index()),
            ObjectKind::Table => self.tables.is_valid(id.index()),
            ObjectKind::Closure => self.closures.is_valid(id.index()),
            ObjectKind::Prototype => self.prototypes.is_valid(id.index()),
            ObjectKind::Upvalue => self.upvalues.is_valid(id.index()),
            ObjectKind::Userdata => self.userdata.is_valid(id.index()),
            ObjectKind::Thread => self.threads.is_valid(id.index()),
        }
    }

    /// Visits every outbound reference of `id`, including weak-table
    /// values — callers that need to skip weak values use
    /// [`Heap::trace_object_keys_only`] instead.
    pub fn trace_object(&self, id: GcId, visitor: &mut dyn Visitor) {
        match id.kind() {
            ObjectKind::String => {}
            ObjectKind::Table => {
                if let Some(t) = self.tables.get(id.index()) {
                    t.data.trace(visitor);
                }
            }
            ObjectKind::Closure => {
                if let Some(c) = self.closures.get(id.index()) {
                    c.data.trace(visitor);
                }
            }
            ObjectKind::Prototype => {
                if let Some(p) = self.prototypes.get(id.index()) {
                    p.data.trace(visitor);
                }
            }
            ObjectKind::Upvalue => {
                if let Some(u) = self.upvalues.get(id.index()) {
                    u.data.trace(visitor);
                }
            }
            ObjectKind::Userdata => {
                if let Some(u) = self.userdata.get(id.index()) {
                    u.data.trace(visitor);
                }
            }
            ObjectKind::Thread => {
                if let Some(t) = self.threads.get(id.index()) {
                    t.data.trace(visitor);
                }
            }
        }
    }

    /// Traces only a table's keys (and metatable), used while a table's
    /// final weak mode hasn't been established yet (propagate phase).
    pub fn trace_table_keys_only(&self, id: GcId, visitor: &mut dyn Visitor) {
        if let Some(t) = self.tables.get(id.index()) {
            crate::gc::object::table::trace_keys_only(&t.data, visitor);
        }
    }

    pub fn weak_mode(&self, table_id: GcId) -> WeakMode {
        let Some(table) = self.tables.get(table_id.index()) else { return WeakMode::default() };
        let Some(mt_id) = table.data.metatable else { return WeakMode::default() };
        let Some(mt) = self.tables.get(mt_id.index()) else { return WeakMode::default() };
        let Some(mode_key) = self.mode_metatable_key else { return WeakMode::default() };
        match mt.data.get(&crate::value::Value::Gc(mode_key)) {
            crate::value::Value::Gc(s) => match self.get_string(s) {
                Some(s) => WeakMode::from_mode_str(s.as_str()),
                None => WeakMode::default(),
            },
            _ => WeakMode::default(),
        }
    }

    pub fn destroy(&mut self, id: GcId) {
        match id.kind() {
            ObjectKind::String => {
                if let Some(b) = self.strings.free(id.index()) {
                    if b.data.is_short() {
                        self.interner.remove(b.data.as_str());
                    }
                }
            }
            ObjectKind::Table => {
                self.tables.free(id.index());
            }
            ObjectKind::Closure => {
                self.closures.free(id.index());
            }
            ObjectKind::Prototype => {
                self.prototypes.free(id.index());
            }
            ObjectKind::Upvalue => {
                self.upvalues.free(id.index());
            }
            ObjectKind::Userdata => {
                self.userdata.free(id.index());
            }
            ObjectKind::Thread => {
                self.threads.free(id.index());
            }
        }
    }

    pub fn size_bytes(&self, id: GcId) -> usize {
        self.header(id).size() as usize
    }

    pub fn shrink_arenas_to_fit(&mut self) {
        self.strings.shrink_to_fit();
        self.tables.shrink_to_fit();
        self.closures.shrink_to_fit();
        self.prototypes.shrink_to_fit();
        self.upvalues.shrink_to_fit();
        self.userdata.shrink_to_fit();
        self.threads.shrink_to_fit();
    }
}
