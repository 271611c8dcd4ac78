use std::sync::Arc;

use crate::cache::region::{CachedImageRegion, ImageRef};
use crate::filter::FilterIdentity;
use crate::foundation::core::{Affine, DeviceRect};

bitflags::bitflags! {
    /// Set of cache slots, used both for "what is cached" and "what to clear".
    ///
    /// The empty set plays the role of `NONE`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CacheType: u8 {
        /// Pre-filter backdrop capture.
        const SNAPSHOT = 1;
        /// Post-filter image.
        const FILTERED_SNAPSHOT = 2;
        /// Both slots.
        const BOTH = Self::SNAPSHOT.bits() | Self::FILTERED_SNAPSHOT.bits();
    }
}

/// One of the two cache slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    /// Pre-filter backdrop capture.
    Snapshot,
    /// Post-filter image.
    FilteredSnapshot,
}

impl CacheSlot {
    /// Single-slot [`CacheType`].
    pub fn as_type(self) -> CacheType {
        match self {
            CacheSlot::Snapshot => CacheType::SNAPSHOT,
            CacheSlot::FilteredSnapshot => CacheType::FILTERED_SNAPSHOT,
        }
    }
}

/// Per-node cache state.
///
/// `FilteredOnly` is only reachable by compacting away the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Nothing cached.
    Empty,
    /// Snapshot valid, filtered snapshot missing.
    SnapshotOnly,
    /// Filtered snapshot valid, snapshot compacted away.
    FilteredOnly,
    /// Both slots valid.
    FullyCached,
}

/// Storage for the snapshot / filtered-snapshot pair and its bookkeeping.
///
/// Mutated only by the cache manager; no side effects beyond the store itself.
#[derive(Debug, Default)]
pub struct CacheStore {
    snapshot: Option<Arc<CachedImageRegion>>,
    filtered: Option<Arc<CachedImageRegion>>,
    last_filter_identity: Option<FilterIdentity>,
    // Device rect the snapshot was requested for; the image itself may be outset.
    snapshot_region: DeviceRect,
    cache_age: u32,
    pending_purge: bool,
    filtered_from_offload: bool,
}

impl CacheStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` covering `region` into `slot`.
    ///
    /// A missing image or an empty region is equivalent to clearing the slot. Storing a snapshot
    /// restarts the cache age and forgets the filter identity of the previous backdrop.
    pub fn store(
        &mut self,
        slot: CacheSlot,
        image: Option<ImageRef>,
        region: DeviceRect,
        transform: Affine,
    ) -> Option<Arc<CachedImageRegion>> {
        let entry = image
            .and_then(|image| CachedImageRegion::new(image, region, transform).ok())
            .map(Arc::new);
        self.put(slot, entry.clone());
        entry
    }

    /// Store an already built entry, `None` clears the slot.
    pub fn put(&mut self, slot: CacheSlot, entry: Option<Arc<CachedImageRegion>>) {
        let Some(entry) = entry else {
            self.clear(slot.as_type());
            return;
        };
        match slot {
            CacheSlot::Snapshot => {
                self.snapshot_region = entry.region();
                self.snapshot = Some(entry);
                self.last_filter_identity = None;
                self.cache_age = 0;
                self.pending_purge = false;
            }
            CacheSlot::FilteredSnapshot => {
                if self.snapshot.is_none() {
                    self.snapshot_region = entry.region();
                }
                self.filtered = Some(entry);
                self.filtered_from_offload = false;
            }
        }
    }

    /// Swap the entry of an occupied `slot`, keeping identity, age and region bookkeeping.
    ///
    /// Returns `false` (and stores nothing) when the slot is empty.
    pub fn replace(&mut self, slot: CacheSlot, entry: Arc<CachedImageRegion>) -> bool {
        let target = match slot {
            CacheSlot::Snapshot => &mut self.snapshot,
            CacheSlot::FilteredSnapshot => &mut self.filtered,
        };
        if target.is_none() {
            return false;
        }
        *target = Some(entry);
        true
    }

    /// Drop the slots in `types`. Clearing both also resets the filter identity.
    pub fn clear(&mut self, types: CacheType) {
        if types.contains(CacheType::SNAPSHOT) {
            self.snapshot = None;
        }
        if types.contains(CacheType::FILTERED_SNAPSHOT) {
            self.filtered = None;
            self.filtered_from_offload = false;
        }
        if types.contains(CacheType::BOTH) || !self.is_any_valid() {
            self.last_filter_identity = None;
            self.snapshot_region = DeviceRect::EMPTY;
            self.pending_purge = false;
        }
    }

    /// Return `true` when `slot` holds an image.
    pub fn is_valid(&self, slot: CacheSlot) -> bool {
        self.get(slot).is_some()
    }

    /// Return `true` when at least one slot holds an image.
    pub fn is_any_valid(&self) -> bool {
        self.snapshot.is_some() || self.filtered.is_some()
    }

    /// Region covered by the image in `slot`, [`DeviceRect::EMPTY`] when the slot is empty.
    pub fn region(&self, slot: CacheSlot) -> DeviceRect {
        self.get(slot)
            .map(|entry| entry.region())
            .unwrap_or(DeviceRect::EMPTY)
    }

    /// Entry held in `slot`.
    pub fn get(&self, slot: CacheSlot) -> Option<&Arc<CachedImageRegion>> {
        match slot {
            CacheSlot::Snapshot => self.snapshot.as_ref(),
            CacheSlot::FilteredSnapshot => self.filtered.as_ref(),
        }
    }

    /// Region the cache was last validated for, [`DeviceRect::EMPTY`] when nothing is cached.
    pub fn snapshot_region(&self) -> DeviceRect {
        if self.is_any_valid() {
            self.snapshot_region
        } else {
            DeviceRect::EMPTY
        }
    }

    /// Override the validated region (captures may be outset beyond the requested rect).
    pub fn set_snapshot_region(&mut self, region: DeviceRect) {
        self.snapshot_region = region;
    }

    /// Identity of the filter that produced the filtered snapshot.
    pub fn last_filter_identity(&self) -> Option<FilterIdentity> {
        self.last_filter_identity
    }

    /// Record the identity of the filter that produced the filtered snapshot.
    pub fn set_last_filter_identity(&mut self, identity: Option<FilterIdentity>) {
        self.last_filter_identity = identity;
    }

    /// Frames since the last snapshot capture.
    pub fn cache_age(&self) -> u32 {
        self.cache_age
    }

    /// Advance the age by one frame.
    pub fn tick_age(&mut self) {
        if self.is_any_valid() {
            self.cache_age = self.cache_age.saturating_add(1);
        }
    }

    /// Whether a deferred invalidation is waiting for the next non-deferred frame.
    pub fn pending_purge(&self) -> bool {
        self.pending_purge
    }

    /// Record or drop a deferred invalidation.
    pub fn set_pending_purge(&mut self, pending: bool) {
        self.pending_purge = pending && self.is_any_valid();
    }

    /// Whether the filtered snapshot came from the hardware-offload route.
    pub fn filtered_from_offload(&self) -> bool {
        self.filtered_from_offload
    }

    /// Mark the filtered snapshot as produced by the hardware-offload route.
    pub fn set_filtered_from_offload(&mut self, from_offload: bool) {
        self.filtered_from_offload = from_offload && self.filtered.is_some();
    }

    /// Slots currently holding an image.
    pub fn cached_type(&self) -> CacheType {
        let mut out = CacheType::empty();
        if self.snapshot.is_some() {
            out |= CacheType::SNAPSHOT;
        }
        if self.filtered.is_some() {
            out |= CacheType::FILTERED_SNAPSHOT;
        }
        out
    }

    /// State-machine view of the slots.
    pub fn state(&self) -> CacheState {
        match (self.snapshot.is_some(), self.filtered.is_some()) {
            (false, false) => CacheState::Empty,
            (true, false) => CacheState::SnapshotOnly,
            (false, true) => CacheState::FilteredOnly,
            (true, true) => CacheState::FullyCached,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
