//! Memory-pressure capability read by the cache once per frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Process-level signal asking caches to drop their GPU memory.
///
/// Injected into each manager instead of living in a global, so caches stay testable in
/// isolation.
pub trait MemoryPressureSignal: Send + Sync {
    /// Return `true` when cached GPU images should be dropped this frame.
    fn purge_requested(&self) -> bool;

    /// A cache released GPU memory on its own (region change dropped a real cache).
    fn report_released(&self);
}

#[derive(Debug, Default)]
struct PressureState {
    purge: AtomicBool,
    released: AtomicBool,
    release_reports: AtomicU64,
}

/// Cloneable [`MemoryPressureSignal`] backed by atomics; every clone observes the same state.
#[derive(Clone, Debug, Default)]
pub struct SharedMemoryPressure {
    state: Arc<PressureState>,
}

impl SharedMemoryPressure {
    /// No pressure, nothing released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or lower the purge request.
    pub fn request_purge(&self, on: bool) {
        self.state.purge.store(on, Ordering::Release);
    }

    /// Return and reset the "some cache released memory" marker.
    pub fn take_released(&self) -> bool {
        self.state.released.swap(false, Ordering::AcqRel)
    }

    /// Number of release reports so far.
    pub fn release_reports(&self) -> u64 {
        self.state.release_reports.load(Ordering::Acquire)
    }
}

impl MemoryPressureSignal for SharedMemoryPressure {
    fn purge_requested(&self) -> bool {
        self.state.purge.load(Ordering::Acquire)
    }

    fn report_released(&self) {
        self.state.released.store(true, Ordering::Release);
        self.state.release_reports.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "../tests/unit/pressure.rs"]
mod tests;
