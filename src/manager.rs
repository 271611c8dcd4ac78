use std::sync::Arc;

use crate::backend::{Canvas, FilterExecutor, SnapshotCapturer, SurfaceSnapshotCapturer};
use crate::cache::region::CachedImageRegion;
use crate::cache::store::{CacheSlot, CacheState, CacheStore, CacheType};
use crate::config::FilterCacheConfig;
use crate::filter::{FilterDescriptor, FilterIdentity};
use crate::foundation::core::{DeviceRect, NodeId};
use crate::foundation::error::FxCacheResult;
use crate::offload::{HardwareOffloadAdapter, HardwareOffloadDevice};
use crate::policy::dirty::DirtyRegion;
use crate::policy::{CacheFlags, InvalidationReason, PolicyDecision, PolicyInput, evaluate};
use crate::pressure::MemoryPressureSignal;
use crate::sync::{RenderFlags, StagingRenderBridge};

/// What a draw call ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOutcome {
    /// Cached filtered snapshot drawn as is.
    FastPath,
    /// Cached filtered snapshot drawn while an invalidation is deferred.
    Stale,
    /// Hardware-offload output adopted and drawn.
    Offloaded,
    /// Cached snapshot filtered again.
    Refiltered,
    /// Backdrop captured and filtered.
    Regenerated,
    /// Filtering failed; the unfiltered snapshot was drawn and the cache emptied.
    FallbackUnfiltered,
    /// Nothing drawn: empty rects or capture failure. The caller may draw uncached.
    Skipped,
}

/// Cache counters, saturating.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilterCacheStats {
    /// Commits seen.
    pub frames: u64,
    /// Draw or generate calls.
    pub draws: u64,
    /// Successful backdrop captures.
    pub captures: u64,
    /// Failed backdrop captures.
    pub capture_failures: u64,
    /// Successful filter runs.
    pub filter_runs: u64,
    /// Failed filter runs.
    pub filter_failures: u64,
    /// Fresh cached images reused.
    pub fast_path_hits: u64,
    /// Stale cached images reused.
    pub stale_hits: u64,
    /// Tasks submitted to the offload device.
    pub offload_submits: u64,
    /// Offload outputs adopted.
    pub offload_hits: u64,
    /// Foreign-context images re-wrapped.
    pub context_rewraps: u64,
    /// Re-wraps that failed and emptied the cache.
    pub context_failures: u64,
    /// Decisions or explicit calls that dropped at least one slot.
    pub invalidations: u64,
    /// Full clears caused by memory pressure.
    pub memory_purges: u64,
}

impl FilterCacheStats {
    fn bump(counter: &mut u64) {
        *counter = counter.saturating_add(1);
    }
}

/// Per-node backdrop filter cache.
///
/// Producer-side calls (`update_cache_state_*`, `mark_*`) only stage intents. [`Self::commit`]
/// publishes them once per frame and resolves the frame's invalidations; draw calls then reuse
/// or regenerate the cached images.
pub struct FilterCacheManager {
    config: FilterCacheConfig,
    node: NodeId,
    store: CacheStore,
    bridge: StagingRenderBridge,
    capturer: Box<dyn SnapshotCapturer>,
    executor: Box<dyn FilterExecutor>,
    offload: Option<HardwareOffloadAdapter>,
    pressure: Option<Arc<dyn MemoryPressureSignal>>,
    staged_can_skip_frame: bool,
    frame_decision: PolicyDecision,
    clear_filtered_after_drawing: bool,
    last_outcome: Option<DrawOutcome>,
    stats: FilterCacheStats,
}

impl std::fmt::Debug for FilterCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCacheManager")
            .field("node", &self.node)
            .field("state", &self.store.state())
            .field("snapshot_region", &self.store.snapshot_region())
            .field("offload", &self.offload)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl FilterCacheManager {
    /// Manager capturing from the canvas surface and filtering with `executor`.
    pub fn new(config: FilterCacheConfig, executor: Box<dyn FilterExecutor>) -> FxCacheResult<Self> {
        config.validate()?;
        let capturer = Box::new(SurfaceSnapshotCapturer::new(config.snapshot_outset_px));
        Ok(Self {
            config,
            node: NodeId::default(),
            store: CacheStore::new(),
            bridge: StagingRenderBridge::new(),
            capturer,
            executor,
            offload: None,
            pressure: None,
            staged_can_skip_frame: false,
            frame_decision: PolicyDecision::default(),
            clear_filtered_after_drawing: true,
            last_outcome: None,
            stats: FilterCacheStats::default(),
        })
    }

    /// Replace the backdrop capturer.
    pub fn with_capturer(mut self, capturer: Box<dyn SnapshotCapturer>) -> Self {
        self.capturer = capturer;
        self
    }

    /// Attach a hardware-offload device, sized from the config.
    pub fn with_offload_device(
        mut self,
        device: Box<dyn HardwareOffloadDevice>,
    ) -> FxCacheResult<Self> {
        let adapter = HardwareOffloadAdapter::new(device, self.config.offload_output_capacity)?
            .with_radius_cap(self.config.offload_max_radius);
        self.offload = Some(adapter);
        Ok(self)
    }

    /// Read memory pressure from `signal` at every commit.
    pub fn with_memory_pressure(mut self, signal: Arc<dyn MemoryPressureSignal>) -> Self {
        self.pressure = Some(signal);
        self
    }

    /// Tag logs with the owning node.
    pub fn with_node_id(mut self, node: NodeId) -> Self {
        self.node = node;
        self
    }

    // ---- producer side -------------------------------------------------------------------------

    /// Record the filter used this frame; a new identity invalidates the filtered snapshot.
    pub fn update_cache_state_with_filter_hash(&mut self, filter: &FilterDescriptor) {
        self.bridge.record_filter(filter.identity());
        self.staged_can_skip_frame = filter.can_skip_frame();
    }

    /// Report the region the filter will read next frame.
    ///
    /// Returns `true` when it is not covered by the cache, which invalidates both slots.
    pub fn update_cache_state_with_filter_region(&mut self, region: DeviceRect) -> bool {
        if !self.store.is_any_valid() || self.store.snapshot_region().contains(region) {
            return false;
        }
        self.bridge.mark_region_changed();
        true
    }

    /// Report this frame's dirty rects.
    ///
    /// Returns `true` when they touch the cached region.
    pub fn update_cache_state_with_dirty_region(&mut self, dirty: &DirtyRegion) -> bool {
        if !self.store.is_any_valid() {
            return false;
        }
        self.bridge.add_dirty(dirty);
        let hit = dirty.intersects(self.store.snapshot_region());
        if hit {
            self.bridge.mark_interacts_with_dirty();
        }
        hit
    }

    /// Keep cached images regardless of other triggers until called with `false`.
    pub fn mark_filter_force_use_cache(&mut self, force_use: bool) {
        self.bridge.mark_force_use(force_use);
    }

    /// Drop both slots at the next commit.
    pub fn mark_filter_force_clear_cache(&mut self) {
        self.bridge.mark_force_clear();
    }

    /// No further frame is scheduled: skip large-area deferral at the next commit.
    pub fn mark_force_clear_cache_with_last_frame(&mut self) {
        self.bridge.mark_force_clear_with_last_frame();
    }

    /// Device rotation changed.
    pub fn mark_rotation_changed(&mut self) {
        self.bridge.mark_rotation_changed();
    }

    /// Occlusion state, kept until changed.
    pub fn mark_node_is_occluded(&mut self, occluded: bool) {
        self.bridge.mark_occluded(occluded);
    }

    /// The filter covers a large part of the screen this frame.
    pub fn mark_filter_region_is_large_area(&mut self) {
        self.bridge.mark_large_area();
    }

    /// The node feeds its filtered output to other nodes this frame.
    pub fn mark_effect_node(&mut self) {
        self.bridge.mark_effect_node();
    }

    /// Return `true` when the staged state implies a large-area blur will be regenerated at the
    /// next frame, so schedulers can budget for it.
    pub fn would_draw_large_area_blur(&self) -> bool {
        let staged = self.bridge.staged_flags();
        if !staged.contains(CacheFlags::LARGE_AREA) {
            return false;
        }
        if !self.staged_can_skip_frame {
            return true;
        }
        staged.contains(CacheFlags::INTERACTS_WITH_DIRTY)
            && self.store.cache_age().saturating_add(1) >= self.config.large_area_refresh_interval
    }

    // ---- frame boundary ------------------------------------------------------------------------

    /// Publish staged intents and resolve this frame's invalidations.
    ///
    /// Must run once per frame on the render side, before any draw call.
    #[tracing::instrument(level = "trace", skip(self), fields(node = self.node.0))]
    pub fn commit(&mut self) {
        self.bridge.commit();
        self.store.tick_age();
        FilterCacheStats::bump(&mut self.stats.frames);

        if let Some(signal) = &self.pressure
            && signal.purge_requested()
            && self.store.is_any_valid()
        {
            tracing::debug!(node = self.node.0, "memory pressure: dropping filter cache");
            self.drop_slots(CacheType::BOTH);
            FilterCacheStats::bump(&mut self.stats.memory_purges);
        }

        let render = self.bridge.render();
        let flags = render.flags();
        let cached_identity = self.store.last_filter_identity();
        let current_identity = render
            .filter_identity()
            .or(cached_identity)
            .unwrap_or(FilterIdentity(0));
        let cached_region = self.store.snapshot_region();
        let decision = evaluate(&PolicyInput {
            flags,
            current_identity,
            cached_identity,
            current_region: cached_region,
            cached_region,
            dirty: render.dirty(),
            cached: self.store.cached_type(),
            cache_age: self.store.cache_age(),
            pending_purge: self.store.pending_purge(),
            can_skip_frame: self.staged_can_skip_frame,
            refresh_interval: self.config.large_area_refresh_interval,
            occlusion_serves_stale: self.config.occlusion_serves_stale,
        });

        let had_cache = self.store.is_any_valid();
        self.apply_decision(&decision);
        self.store.set_pending_purge(decision.pending_purge);
        self.bridge.render_mut().set_clear_type(decision.clear);
        if decision.reasons.contains(InvalidationReason::REGION)
            && had_cache
            && !self.store.is_any_valid()
            && let Some(signal) = &self.pressure
        {
            signal.report_released();
        }

        // Effect nodes and skipped frames keep their filtered image for reuse unless the filter
        // itself changed.
        let hash_changed = flags.contains(CacheFlags::FILTER_HASH_CHANGED);
        let skip_frame = flags.contains(CacheFlags::LARGE_AREA)
            && self.staged_can_skip_frame
            && !flags.contains(CacheFlags::REGION_CHANGED);
        self.clear_filtered_after_drawing =
            if flags.contains(CacheFlags::EFFECT_NODE) || skip_frame {
                hash_changed
            } else {
                hash_changed || !self.store.is_any_valid()
            };
        self.frame_decision = decision;
    }

    fn apply_decision(&mut self, decision: &PolicyDecision) {
        let dropped = decision.clear & self.store.cached_type();
        if dropped.is_empty() {
            if decision.deferred {
                tracing::trace!(
                    node = self.node.0,
                    reasons = ?decision.reasons,
                    "filter cache invalidation deferred"
                );
            }
            return;
        }
        tracing::debug!(
            node = self.node.0,
            clear = ?decision.clear,
            reasons = ?decision.reasons,
            "filter cache invalidated"
        );
        self.drop_slots(decision.clear);
        FilterCacheStats::bump(&mut self.stats.invalidations);
    }

    /// Clear `types` from the store. Offload outputs are filtered backdrops, so they go together
    /// with the snapshot, including results still in flight.
    fn drop_slots(&mut self, types: CacheType) {
        self.store.clear(types);
        if types.contains(CacheType::SNAPSHOT)
            && let Some(adapter) = self.offload.as_mut()
        {
            adapter.discard_outputs();
        }
    }

    // ---- render side ---------------------------------------------------------------------------

    /// Draw `filter` over `rect` (the canvas clip when `None`), reusing cached images when valid.
    ///
    /// Capture, filter, context and offload failures degrade the frame and are reported through
    /// the outcome; only the final canvas draw can fail.
    pub fn draw_filter(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        rect: Option<DeviceRect>,
    ) -> FxCacheResult<DrawOutcome> {
        self.draw_filter_rects(canvas, filter, rect, rect)
    }

    /// [`Self::draw_filter`] with distinct source (capture) and destination rects.
    #[tracing::instrument(
        level = "trace",
        skip(self, canvas, filter),
        fields(node = self.node.0, filter = filter.identity().0)
    )]
    pub fn draw_filter_rects(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        src: Option<DeviceRect>,
        dst: Option<DeviceRect>,
    ) -> FxCacheResult<DrawOutcome> {
        let Some((src, dst)) = validate_rects(canvas, src, dst) else {
            return Ok(self.finish(DrawOutcome::Skipped));
        };
        let (entry, outcome) = self.resolve(canvas, filter, src, dst);
        if let Some(entry) = entry {
            canvas.draw_image_rect(entry.image(), entry.src_rect_for(dst), dst)?;
        }
        Ok(self.finish(outcome))
    }

    /// Non-drawing variant of [`Self::draw_filter_rects`]: returns the filtered image instead of
    /// compositing it.
    ///
    /// The returned entry is the one held by the cache, not a copy. `None` when no filtered image
    /// could be produced.
    #[tracing::instrument(
        level = "trace",
        skip(self, canvas, filter),
        fields(node = self.node.0, filter = filter.identity().0)
    )]
    pub fn generated_cached_effect_data(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        src: Option<DeviceRect>,
        dst: Option<DeviceRect>,
    ) -> Option<Arc<CachedImageRegion>> {
        let Some((src, dst)) = validate_rects(canvas, src, dst) else {
            self.finish(DrawOutcome::Skipped);
            return None;
        };
        let (entry, outcome) = self.resolve(canvas, filter, src, dst);
        self.finish(outcome);
        match outcome {
            DrawOutcome::FallbackUnfiltered | DrawOutcome::Skipped => None,
            _ => entry,
        }
    }

    fn finish(&mut self, outcome: DrawOutcome) -> DrawOutcome {
        FilterCacheStats::bump(&mut self.stats.draws);
        self.last_outcome = Some(outcome);
        outcome
    }

    fn resolve(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        src: DeviceRect,
        dst: DeviceRect,
    ) -> (Option<Arc<CachedImageRegion>>, DrawOutcome) {
        self.ensure_context(canvas);

        // Per-draw guard: the committed triggers were applied at commit, but the filter and rects
        // handed to this call may still differ from what the cache was built for.
        let sticky = self.bridge.render().flags() & CacheFlags::STICKY;
        let no_dirty = DirtyRegion::new();
        let guard = evaluate(&PolicyInput {
            flags: sticky,
            current_identity: filter.identity(),
            cached_identity: self.store.last_filter_identity(),
            current_region: src,
            cached_region: self.store.snapshot_region(),
            dirty: &no_dirty,
            cached: self.store.cached_type(),
            cache_age: self.store.cache_age(),
            pending_purge: false,
            can_skip_frame: filter.can_skip_frame(),
            refresh_interval: self.config.large_area_refresh_interval,
            occlusion_serves_stale: self.config.occlusion_serves_stale,
        });
        self.apply_decision(&guard);
        let serve_stale = guard.serve_stale || self.frame_decision.serve_stale;

        if let Some(entry) = self.adopt_offload_output(canvas, filter, dst) {
            FilterCacheStats::bump(&mut self.stats.offload_hits);
            tracing::trace!(node = self.node.0, region = %entry.region(), "offload output adopted");
            return (Some(entry), DrawOutcome::Offloaded);
        }

        if let Some(cached) = self.store.get(CacheSlot::FilteredSnapshot)
            && cached.region().contains(dst)
        {
            let fresh = self.store.last_filter_identity() == Some(filter.identity());
            if serve_stale {
                FilterCacheStats::bump(&mut self.stats.stale_hits);
                return (Some(Arc::clone(cached)), DrawOutcome::Stale);
            }
            if fresh {
                FilterCacheStats::bump(&mut self.stats.fast_path_hits);
                tracing::trace!(node = self.node.0, "filter cache hit");
                return (Some(Arc::clone(cached)), DrawOutcome::FastPath);
            }
        }

        let had_snapshot = self.store.is_valid(CacheSlot::Snapshot);
        if !had_snapshot && !self.take_snapshot(canvas, filter, src) {
            return (None, DrawOutcome::Skipped);
        }
        let Some(snapshot) = self.store.get(CacheSlot::Snapshot).cloned() else {
            return (None, DrawOutcome::Skipped);
        };

        // Hardware first: a device that already finished serves the frame and the GPU stays idle.
        if self.submit_offload(&snapshot, filter, dst)
            && let Some(entry) = self.adopt_offload_output(canvas, filter, dst)
        {
            FilterCacheStats::bump(&mut self.stats.offload_hits);
            tracing::trace!(
                node = self.node.0,
                region = %entry.region(),
                "offload output ready in frame"
            );
            return (Some(entry), DrawOutcome::Offloaded);
        }

        match self.executor.apply(canvas, &snapshot, filter, dst) {
            Ok(filtered) => {
                FilterCacheStats::bump(&mut self.stats.filter_runs);
                let filtered =
                    Arc::new(filtered.with_refraction_offset(filter.refraction_offset()));
                self.store
                    .put(CacheSlot::FilteredSnapshot, Some(Arc::clone(&filtered)));
                self.store.set_last_filter_identity(Some(filter.identity()));
                let outcome = if had_snapshot {
                    DrawOutcome::Refiltered
                } else {
                    DrawOutcome::Regenerated
                };
                (Some(filtered), outcome)
            }
            Err(err) => {
                tracing::warn!(
                    node = self.node.0,
                    error = %err,
                    "filter produced no image, drawing unfiltered snapshot"
                );
                FilterCacheStats::bump(&mut self.stats.filter_failures);
                self.drop_slots(CacheType::BOTH);
                (Some(snapshot), DrawOutcome::FallbackUnfiltered)
            }
        }
    }

    fn take_snapshot(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        src: DeviceRect,
    ) -> bool {
        let (dx, dy) = filter.capture_offset();
        match self
            .capturer
            .capture(canvas, src.offset(dx, dy), filter.needs_outset())
        {
            Ok(snapshot) => {
                FilterCacheStats::bump(&mut self.stats.captures);
                self.store
                    .put(CacheSlot::Snapshot, Some(Arc::new(snapshot)));
                self.store.set_snapshot_region(src);
                true
            }
            Err(err) => {
                tracing::warn!(node = self.node.0, error = %err, "backdrop capture failed");
                FilterCacheStats::bump(&mut self.stats.capture_failures);
                self.drop_slots(CacheType::BOTH);
                false
            }
        }
    }

    fn ensure_context(&mut self, canvas: &mut dyn Canvas) {
        let context = canvas.context_id();
        for slot in [CacheSlot::Snapshot, CacheSlot::FilteredSnapshot] {
            let Some(entry) = self.store.get(slot).cloned() else {
                continue;
            };
            if entry.image().is_valid_in(context) {
                continue;
            }
            match canvas.rewrap_image(entry.image()) {
                Ok(image) => {
                    self.store.replace(slot, Arc::new(entry.rewrapped(image)));
                    FilterCacheStats::bump(&mut self.stats.context_rewraps);
                    tracing::trace!(node = self.node.0, ?slot, "cached image re-wrapped");
                }
                Err(err) => {
                    tracing::warn!(
                        node = self.node.0,
                        error = %err,
                        "cached image unusable in this context, regenerating"
                    );
                    FilterCacheStats::bump(&mut self.stats.context_failures);
                    self.drop_slots(CacheType::BOTH);
                    return;
                }
            }
        }
    }

    fn adopt_offload_output(
        &mut self,
        canvas: &mut dyn Canvas,
        filter: &FilterDescriptor,
        dst: DeviceRect,
    ) -> Option<Arc<CachedImageRegion>> {
        if !self.config.offload_enabled {
            return None;
        }
        let item = self.offload.as_mut()?.take_output_for(filter.radius())?;
        if !item.region.contains(dst) {
            tracing::trace!(node = self.node.0, region = %item.region, "offload output does not cover draw");
            return None;
        }
        let image = if item.image.is_valid_in(canvas.context_id()) {
            item.image
        } else {
            canvas.rewrap_image(&item.image).ok()?
        };
        let entry = CachedImageRegion::new(image, item.region, canvas.total_matrix())
            .ok()?
            .with_refraction_offset(filter.refraction_offset());
        let entry = Arc::new(entry);
        self.store
            .put(CacheSlot::FilteredSnapshot, Some(Arc::clone(&entry)));
        self.store.set_filtered_from_offload(true);
        self.store.set_last_filter_identity(Some(filter.identity()));
        Some(entry)
    }

    /// Hand the snapshot to the offload device; `true` when a task was queued.
    fn submit_offload(
        &mut self,
        snapshot: &Arc<CachedImageRegion>,
        filter: &FilterDescriptor,
        dst: DeviceRect,
    ) -> bool {
        if !self.config.offload_enabled {
            return false;
        }
        let Some(adapter) = self.offload.as_mut() else {
            return false;
        };
        if !adapter.is_selectable(filter.radius()) {
            return false;
        }
        match adapter.submit(snapshot, filter, dst) {
            Ok(_) => {
                FilterCacheStats::bump(&mut self.stats.offload_submits);
                true
            }
            Err(err) => {
                tracing::trace!(node = self.node.0, error = %err, "offload refused, GPU path only");
                false
            }
        }
    }

    // ---- explicit cache control ----------------------------------------------------------------

    /// Drop the slots in `types` immediately.
    pub fn invalidate_filter_cache(&mut self, types: CacheType) {
        if (types & self.store.cached_type()).is_empty() {
            return;
        }
        tracing::debug!(node = self.node.0, clear = ?types, "filter cache invalidated explicitly");
        self.drop_slots(types);
        FilterCacheStats::bump(&mut self.stats.invalidations);
    }

    /// The node left the render tree: drop everything, including queued offload outputs.
    pub fn release_cache_off_tree(&mut self) {
        self.invalidate_filter_cache(CacheType::BOTH);
        if let Some(adapter) = self.offload.as_mut() {
            adapter.discard_outputs();
        }
    }

    /// Memory-pressure hook: drop the filtered snapshot when `clear_filtered`, else the snapshot.
    pub fn compact_filter_cache(&mut self, clear_filtered: bool) {
        let slot = if clear_filtered {
            CacheSlot::FilteredSnapshot
        } else {
            CacheSlot::Snapshot
        };
        if self.store.is_valid(slot) {
            tracing::debug!(node = self.node.0, ?slot, "filter cache compacted");
            self.store.clear(slot.as_type());
        }
    }

    /// Compact with the slot choice derived from this frame's committed flags.
    pub fn compact_filter_cache_after_drawing(&mut self) {
        self.compact_filter_cache(self.clear_filtered_after_drawing);
    }

    /// Whether [`Self::compact_filter_cache_after_drawing`] drops the filtered snapshot this frame.
    pub fn clear_filtered_after_drawing(&self) -> bool {
        self.clear_filtered_after_drawing
    }

    /// Adopt slots produced elsewhere (e.g. a side cache fed by the offload device).
    ///
    /// `None` clears the corresponding slot. The filter identity of the current cache is kept
    /// when a filtered image is adopted.
    pub fn reset_filter_cache(
        &mut self,
        snapshot: Option<Arc<CachedImageRegion>>,
        filtered: Option<Arc<CachedImageRegion>>,
        snapshot_region: DeviceRect,
        from_offload: bool,
    ) {
        let identity = self.store.last_filter_identity();
        let has_filtered = filtered.is_some();
        self.store.put(CacheSlot::Snapshot, snapshot);
        self.store.put(CacheSlot::FilteredSnapshot, filtered);
        if has_filtered {
            self.store.set_last_filter_identity(identity);
            self.store.set_filtered_from_offload(from_offload);
        }
        self.store.set_snapshot_region(snapshot_region);
    }

    // ---- introspection -------------------------------------------------------------------------

    /// Return `true` when at least one slot holds an image.
    pub fn is_cache_valid(&self) -> bool {
        self.store.is_any_valid()
    }

    /// Region the cache was validated for, [`DeviceRect::EMPTY`] when nothing is cached.
    pub fn cached_image_region(&self) -> DeviceRect {
        self.store.snapshot_region()
    }

    /// Region covered by the image in `slot`, [`DeviceRect::EMPTY`] when the slot is empty.
    pub fn cached_slot_region(&self, slot: CacheSlot) -> DeviceRect {
        self.store.region(slot)
    }

    /// Entry held in `slot`.
    pub fn cached_entry(&self, slot: CacheSlot) -> Option<Arc<CachedImageRegion>> {
        self.store.get(slot).cloned()
    }

    /// State-machine view of the cache.
    pub fn cache_state(&self) -> CacheState {
        self.store.state()
    }

    /// Slots currently holding an image.
    pub fn cached_type(&self) -> CacheType {
        self.store.cached_type()
    }

    /// Whether the filtered snapshot came from the offload device.
    pub fn is_filtered_from_offload(&self) -> bool {
        self.store.filtered_from_offload()
    }

    /// Flags committed for the current frame.
    pub fn render_flags(&self) -> &RenderFlags {
        self.bridge.render()
    }

    /// Outcome of the last draw or generate call.
    pub fn last_outcome(&self) -> Option<DrawOutcome> {
        self.last_outcome
    }

    /// Offload adapter, when a device is attached.
    pub fn offload(&self) -> Option<&HardwareOffloadAdapter> {
        self.offload.as_ref()
    }

    /// Active configuration.
    pub fn config(&self) -> &FilterCacheConfig {
        &self.config
    }

    /// Counters so far.
    pub fn stats(&self) -> FilterCacheStats {
        self.stats.clone()
    }
}

fn validate_rects(
    canvas: &dyn Canvas,
    src: Option<DeviceRect>,
    dst: Option<DeviceRect>,
) -> Option<(DeviceRect, DeviceRect)> {
    let clip = canvas.device_clip_bounds();
    if clip.is_empty() {
        return None;
    }
    let bounds = canvas.device_bounds();
    let src = src.unwrap_or(clip).intersect(bounds);
    let dst = dst.unwrap_or(src).intersect(bounds);
    if src.is_empty() || dst.is_empty() {
        return None;
    }
    Some((src, dst))
}

#[cfg(test)]
#[path = "../tests/unit/manager.rs"]
mod tests;
