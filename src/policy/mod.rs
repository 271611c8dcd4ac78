//! Pure invalidation decisions for the snapshot / filtered-snapshot pair.
//!
//! Everything the cache knows about a frame is folded into a [`PolicyInput`]; [`evaluate`] turns
//! it into the set of slots to drop. No I/O, no GPU handles, no clock.

/// Dirty-rectangle sets supplied by the pipeline driver.
pub mod dirty;

use crate::cache::store::CacheType;
use crate::filter::FilterIdentity;
use crate::foundation::core::DeviceRect;
use crate::policy::dirty::DirtyRegion;

bitflags::bitflags! {
    /// Per-frame environment flags recorded by the producer and committed for the render side.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CacheFlags: u16 {
        /// Reuse whatever is cached, regardless of other triggers (frozen backdrop).
        const FORCE_USE = 1 << 0;
        /// Drop both slots this frame.
        const FORCE_CLEAR = 1 << 1;
        /// The filter identity differs from the one that produced the filtered snapshot.
        const FILTER_HASH_CHANGED = 1 << 2;
        /// The filter region moved or grew.
        const REGION_CHANGED = 1 << 3;
        /// Dirty rects of this frame touch the cached region.
        const INTERACTS_WITH_DIRTY = 1 << 4;
        /// Device rotation changed since capture.
        const ROTATION_CHANGED = 1 << 5;
        /// The node is an effect node whose output feeds other nodes.
        const EFFECT_NODE = 1 << 6;
        /// Nothing of the node is visible this frame.
        const OCCLUDED = 1 << 7;
        /// The filter covers a large part of the screen.
        const LARGE_AREA = 1 << 8;
        /// No further frame is scheduled; large-area deferral must not apply.
        const FORCE_CLEAR_WITH_LAST_FRAME = 1 << 9;

        /// Flags that survive `commit` until explicitly unmarked.
        const STICKY = Self::FORCE_USE.bits() | Self::OCCLUDED.bits();
    }
}

bitflags::bitflags! {
    /// Why slots were (or would have been) dropped, for logs and statistics.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InvalidationReason: u8 {
        /// Explicit force-clear.
        const FORCE_CLEAR = 1 << 0;
        /// The cached region covers no pixel.
        const ZERO_AREA = 1 << 1;
        /// New filter parameters.
        const FILTER_HASH = 1 << 2;
        /// Draw region no longer contained in the cached region.
        const REGION = 1 << 3;
        /// Backdrop under the cached region changed.
        const DIRTY = 1 << 4;
        /// Device rotation changed.
        const ROTATION = 1 << 5;
        /// An earlier deferred invalidation came due.
        const PENDING_PURGE = 1 << 6;
    }
}

/// Snapshot of everything [`evaluate`] looks at.
#[derive(Clone, Debug)]
pub struct PolicyInput<'a> {
    /// Committed flags for this frame.
    pub flags: CacheFlags,
    /// Identity of the filter about to be drawn.
    pub current_identity: FilterIdentity,
    /// Identity that produced the cached filtered snapshot, if known.
    pub cached_identity: Option<FilterIdentity>,
    /// Region the filter wants to read this frame.
    pub current_region: DeviceRect,
    /// Region the cache was validated for.
    pub cached_region: DeviceRect,
    /// Dirty rects of this frame.
    pub dirty: &'a DirtyRegion,
    /// Slots currently holding an image.
    pub cached: CacheType,
    /// Frames since the last snapshot capture.
    pub cache_age: u32,
    /// Whether an earlier invalidation was deferred.
    pub pending_purge: bool,
    /// Whether the filter tolerates being served stale.
    pub can_skip_frame: bool,
    /// Frames a large-area filter may be served stale, `0` disables deferral.
    pub refresh_interval: u32,
    /// Whether occlusion defers soft invalidations.
    pub occlusion_serves_stale: bool,
}

/// Outcome of [`evaluate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Slots to drop before drawing.
    pub clear: CacheType,
    /// The kept filtered snapshot may be drawn even though it is known to be stale.
    pub serve_stale: bool,
    /// At least one invalidation was postponed this frame.
    pub deferred: bool,
    /// Pending-purge marker to store after applying the decision.
    pub pending_purge: bool,
    /// Reasons behind `clear` (or behind the deferral).
    pub reasons: InvalidationReason,
}

impl PolicyDecision {
    fn clear_both(reason: InvalidationReason) -> Self {
        Self {
            clear: CacheType::BOTH,
            reasons: reason,
            ..Self::default()
        }
    }

    /// Return `true` when the snapshot survives the decision.
    pub fn keeps_snapshot(&self) -> bool {
        !self.clear.contains(CacheType::SNAPSHOT)
    }

    /// Return `true` when the filtered snapshot survives the decision.
    pub fn keeps_filtered(&self) -> bool {
        !self.clear.contains(CacheType::FILTERED_SNAPSHOT)
    }
}

/// Decide which cached slots are still usable.
///
/// Rules, first match wins:
///
/// 1. force-clear drops both;
/// 2. a zero-area cached region drops both;
/// 3. force-use keeps both;
/// 4. while occluded, every remaining trigger is deferred and the cache served stale;
/// 5. region change or rotation drops both;
/// 6. dirty overlap drops both, unless a skippable large-area filter is younger than the refresh
///    interval, in which case the drop is deferred;
/// 7. a deferred invalidation that is no longer deferred drops both;
/// 8. a new filter identity drops the filtered snapshot only.
///
/// The snapshot is never dropped while the filtered snapshot is kept.
pub fn evaluate(input: &PolicyInput<'_>) -> PolicyDecision {
    if input.cached.is_empty() {
        return PolicyDecision::default();
    }
    let flags = input.flags;

    if flags.contains(CacheFlags::FORCE_CLEAR) {
        return PolicyDecision::clear_both(InvalidationReason::FORCE_CLEAR);
    }
    if input.cached_region.is_empty() {
        return PolicyDecision::clear_both(InvalidationReason::ZERO_AREA);
    }
    if flags.contains(CacheFlags::FORCE_USE) {
        return PolicyDecision {
            pending_purge: input.pending_purge,
            ..PolicyDecision::default()
        };
    }

    let mut triggers = InvalidationReason::empty();
    if flags.contains(CacheFlags::FILTER_HASH_CHANGED)
        || input
            .cached_identity
            .is_some_and(|cached| cached != input.current_identity)
    {
        triggers |= InvalidationReason::FILTER_HASH;
    }
    if flags.contains(CacheFlags::REGION_CHANGED)
        || (!input.current_region.is_empty()
            && !input.cached_region.contains(input.current_region))
    {
        triggers |= InvalidationReason::REGION;
    }
    if flags.contains(CacheFlags::INTERACTS_WITH_DIRTY) || input.dirty.intersects(input.cached_region)
    {
        triggers |= InvalidationReason::DIRTY;
    }
    if flags.contains(CacheFlags::ROTATION_CHANGED) {
        triggers |= InvalidationReason::ROTATION;
    }

    if flags.contains(CacheFlags::OCCLUDED) && input.occlusion_serves_stale {
        let stale = !triggers.is_empty();
        return PolicyDecision {
            serve_stale: stale,
            deferred: stale,
            pending_purge: input.pending_purge || stale,
            reasons: triggers,
            ..PolicyDecision::default()
        };
    }

    let hard = triggers & (InvalidationReason::REGION | InvalidationReason::ROTATION);
    if !hard.is_empty() {
        return PolicyDecision::clear_both(triggers);
    }

    let mut decision = PolicyDecision::default();
    if triggers.contains(InvalidationReason::DIRTY) {
        let deferrable = flags.contains(CacheFlags::LARGE_AREA)
            && input.can_skip_frame
            && !flags.contains(CacheFlags::FORCE_CLEAR_WITH_LAST_FRAME)
            && input.cache_age < input.refresh_interval;
        if !deferrable {
            return PolicyDecision::clear_both(triggers);
        }
        decision.deferred = true;
        decision.serve_stale = true;
        decision.pending_purge = true;
        decision.reasons |= InvalidationReason::DIRTY;
    } else if input.pending_purge {
        return PolicyDecision::clear_both(triggers | InvalidationReason::PENDING_PURGE);
    }

    if triggers.contains(InvalidationReason::FILTER_HASH) {
        decision.clear |= CacheType::FILTERED_SNAPSHOT;
        decision.reasons |= InvalidationReason::FILTER_HASH;
        // A new filter has nothing stale to serve.
        decision.serve_stale = false;
    }
    decision
}

#[cfg(test)]
#[path = "../../tests/unit/policy/mod.rs"]
mod tests;
