//! fxcache caches backdrop filter results for GPU scene-graph compositors.
//!
//! Each effect node owns a [`FilterCacheManager`] holding two images: the captured backdrop
//! (snapshot) and the filtered result (filtered snapshot). Per frame:
//!
//! - The producer side marks intents (filter changes, region changes, dirty rects)
//! - [`FilterCacheManager::commit`] publishes them and decides what to invalidate
//! - [`FilterCacheManager::draw_filter`] reuses, refilters, regenerates or offloads the blur
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Canvas, capture and filter-execution contracts.
pub mod backend;
/// Snapshot storage.
pub mod cache;
/// Cache tuning knobs.
pub mod config;
/// Filter descriptors and their identity.
pub mod filter;
pub mod headless;
/// Per-node cache manager.
pub mod manager;
pub mod offload;
pub mod policy;
pub mod pressure;
pub mod replay;
pub mod sync;

pub use crate::foundation::core::{Affine, DeviceRect, GpuContextId, NodeId, Rect, Vec2};
pub use crate::foundation::error::{FxCacheError, FxCacheResult};

pub use crate::backend::{Canvas, FilterExecutor, SnapshotCapturer, SurfaceSnapshotCapturer};
pub use crate::cache::region::{BackendHandle, CachedImageRegion, GpuImage, ImageId, ImageRef};
pub use crate::cache::store::{CacheSlot, CacheState, CacheType};
pub use crate::config::FilterCacheConfig;
pub use crate::filter::{FilterDescriptor, FilterIdentity, FilterKind};
pub use crate::manager::{DrawOutcome, FilterCacheManager, FilterCacheStats};
pub use crate::offload::{
    HardwareOffloadAdapter, HardwareOffloadDevice, HardwareOffloadOutputItem, OffloadStats,
};
pub use crate::policy::dirty::DirtyRegion;
pub use crate::policy::{CacheFlags, InvalidationReason};
pub use crate::pressure::{MemoryPressureSignal, SharedMemoryPressure};
pub use crate::replay::{ReplayReport, Scenario, replay};
