//! Passive counters exposed for host-side diagnostics.
//!
//! The collector has no tracing/log dependency of its own, so this plus
//! [`crate::host::Warn`] is the entire diagnostic surface.

#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    pub full_collections: u64,
    pub minor_collections: u64,
    pub major_collections: u64,
    pub objects_collected: u64,
    pub bytes_freed: u64,
    pub finalizers_run: u64,
    pub finalizer_errors: u64,
}

impl GcStats {
    pub fn record_sweep(&mut self, objects: u64, bytes: u64) {
        self.objects_collected += objects;
        self.bytes_freed += bytes;
    }
}
