//! Two-phase flag exchange between the producing side and the render side.
//!
//! The producer marks intents on [`StagingFlags`] as often as it likes; [`StagingRenderBridge::commit`]
//! publishes them as [`RenderFlags`] once per frame. Render-side readers only ever see the
//! committed copy.

use crate::cache::store::CacheType;
use crate::filter::FilterIdentity;
use crate::policy::CacheFlags;
use crate::policy::dirty::DirtyRegion;

/// Intents recorded by the producer for the next frame.
#[derive(Clone, Debug, Default)]
pub struct StagingFlags {
    flags: CacheFlags,
    filter_identity: Option<FilterIdentity>,
    dirty: DirtyRegion,
}

/// Committed view consumed by the render side.
#[derive(Clone, Debug, Default)]
pub struct RenderFlags {
    flags: CacheFlags,
    filter_identity: Option<FilterIdentity>,
    dirty: DirtyRegion,
    clear_type: CacheType,
    frame: u64,
}

impl RenderFlags {
    /// Flags committed for this frame.
    pub fn flags(&self) -> CacheFlags {
        self.flags
    }

    /// Filter identity the producer last recorded.
    pub fn filter_identity(&self) -> Option<FilterIdentity> {
        self.filter_identity
    }

    /// Dirty rects committed for this frame.
    pub fn dirty(&self) -> &DirtyRegion {
        &self.dirty
    }

    /// Slots the render side decided to drop this frame.
    pub fn clear_type(&self) -> CacheType {
        self.clear_type
    }

    /// Number of commits so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn set_clear_type(&mut self, clear_type: CacheType) {
        self.clear_type = clear_type;
    }
}

/// Owner of both flag sets.
#[derive(Debug, Default)]
pub struct StagingRenderBridge {
    staging: StagingFlags,
    render: RenderFlags,
}

impl StagingRenderBridge {
    /// Fresh bridge, nothing staged.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, flag: CacheFlags, on: bool) {
        self.staging.flags.set(flag, on);
    }

    /// Keep cached images regardless of other triggers, until unmarked.
    pub fn mark_force_use(&mut self, on: bool) {
        self.set(CacheFlags::FORCE_USE, on);
    }

    /// Drop both slots next frame.
    pub fn mark_force_clear(&mut self) {
        self.set(CacheFlags::FORCE_CLEAR, true);
    }

    /// Cancel large-area deferral next frame.
    pub fn mark_force_clear_with_last_frame(&mut self) {
        self.set(CacheFlags::FORCE_CLEAR_WITH_LAST_FRAME, true);
    }

    /// The filter parameters changed.
    pub fn mark_filter_hash_changed(&mut self) {
        self.set(CacheFlags::FILTER_HASH_CHANGED, true);
    }

    /// The filter region moved or grew.
    pub fn mark_region_changed(&mut self) {
        self.set(CacheFlags::REGION_CHANGED, true);
    }

    /// Dirty rects touch the cached region.
    pub fn mark_interacts_with_dirty(&mut self) {
        self.set(CacheFlags::INTERACTS_WITH_DIRTY, true);
    }

    /// Device rotation changed.
    pub fn mark_rotation_changed(&mut self) {
        self.set(CacheFlags::ROTATION_CHANGED, true);
    }

    /// The node is an effect node this frame.
    pub fn mark_effect_node(&mut self) {
        self.set(CacheFlags::EFFECT_NODE, true);
    }

    /// The filter covers a large area this frame.
    pub fn mark_large_area(&mut self) {
        self.set(CacheFlags::LARGE_AREA, true);
    }

    /// Occlusion state, kept until changed.
    pub fn mark_occluded(&mut self, on: bool) {
        self.set(CacheFlags::OCCLUDED, on);
    }

    /// Record the identity of the filter used this frame.
    ///
    /// Marks [`CacheFlags::FILTER_HASH_CHANGED`] when it differs from the previously recorded one.
    pub fn record_filter(&mut self, identity: FilterIdentity) {
        if self
            .staging
            .filter_identity
            .is_some_and(|prev| prev != identity)
        {
            self.mark_filter_hash_changed();
        }
        self.staging.filter_identity = Some(identity);
    }

    /// Accumulate dirty rects for the next frame.
    pub fn add_dirty(&mut self, dirty: &DirtyRegion) {
        self.staging.dirty.extend(dirty);
    }

    /// Producer-side view of the flags staged so far.
    pub fn staged_flags(&self) -> CacheFlags {
        self.staging.flags
    }

    /// Publish staged intents and reset the transient ones.
    pub fn commit(&mut self) -> &RenderFlags {
        self.render = RenderFlags {
            flags: self.staging.flags,
            filter_identity: self.staging.filter_identity,
            dirty: std::mem::take(&mut self.staging.dirty),
            clear_type: CacheType::empty(),
            frame: self.render.frame.saturating_add(1),
        };
        self.staging.flags &= CacheFlags::STICKY;
        &self.render
    }

    /// Flags committed by the last [`StagingRenderBridge::commit`].
    pub fn render(&self) -> &RenderFlags {
        &self.render
    }

    pub(crate) fn render_mut(&mut self) -> &mut RenderFlags {
        &mut self.render
    }
}

#[cfg(test)]
#[path = "../tests/unit/sync.rs"]
mod tests;
