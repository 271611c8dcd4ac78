use super::*;
use crate::filter::FilterKind;
use crate::foundation::core::GpuContextId;
use crate::headless::{CallCounter, CountingCapturer, HeadlessCanvas, HeadlessFilterExecutor};
use crate::pressure::SharedMemoryPressure;

const R: DeviceRect = DeviceRect::new(0, 0, 100, 100);

struct Rig {
    mgr: FilterCacheManager,
    canvas: HeadlessCanvas,
    captures: CallCounter,
    filters: CallCounter,
}

fn rig_with(config: FilterCacheConfig, exec: HeadlessFilterExecutor) -> Rig {
    let filters = exec.calls();
    let cap = CountingCapturer::new(SurfaceSnapshotCapturer::new(config.snapshot_outset_px));
    let captures = cap.calls();
    let mgr = FilterCacheManager::new(config, Box::new(exec))
        .unwrap()
        .with_capturer(Box::new(cap));
    Rig {
        mgr,
        canvas: HeadlessCanvas::new(400, 400),
        captures,
        filters,
    }
}

fn rig() -> Rig {
    rig_with(FilterCacheConfig::default(), HeadlessFilterExecutor::new())
}

fn skippable_blur(radius: f32) -> FilterDescriptor {
    FilterDescriptor::blur(radius).unwrap().with_skip_frame(true)
}

fn frame(rig: &mut Rig, filter: &FilterDescriptor) -> DrawOutcome {
    rig.mgr.commit();
    rig.mgr
        .draw_filter(&mut rig.canvas, filter, Some(R))
        .unwrap()
}

fn dirty_over_cache() -> DirtyRegion {
    DirtyRegion::from_rects([DeviceRect::new(50, 50, 60, 60)])
}

fn large_area_dirty_frame(rig: &mut Rig, filter: &FilterDescriptor) -> DrawOutcome {
    rig.mgr.update_cache_state_with_filter_hash(filter);
    rig.mgr.mark_filter_region_is_large_area();
    rig.mgr.update_cache_state_with_dirty_region(&dirty_over_cache());
    frame(rig, filter)
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = FilterCacheConfig {
        offload_output_capacity: 0,
        ..FilterCacheConfig::default()
    };
    assert!(FilterCacheManager::new(cfg, Box::new(HeadlessFilterExecutor::new())).is_err());
}

#[test]
fn large_area_dirty_is_served_stale_until_refresh_interval() {
    let mut r = rig();
    let f = skippable_blur(10.0);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Regenerated);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Stale);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Stale);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Regenerated);
    assert_eq!(r.captures.get(), 2);
    assert_eq!(r.mgr.stats().stale_hits, 2);
}

#[test]
fn non_skippable_large_area_is_not_deferred() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    large_area_dirty_frame(&mut r, &f);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn deferred_invalidation_is_purged_on_next_quiet_frame() {
    let mut r = rig();
    let f = skippable_blur(10.0);
    large_area_dirty_frame(&mut r, &f);
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Stale);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);
}

#[test]
fn last_frame_cancels_deferral() {
    let mut r = rig();
    let f = skippable_blur(10.0);
    large_area_dirty_frame(&mut r, &f);
    r.mgr.mark_force_clear_cache_with_last_frame();
    assert_eq!(large_area_dirty_frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn occlusion_serves_stale_then_purges_when_visible() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);

    r.mgr.mark_node_is_occluded(true);
    r.mgr.update_cache_state_with_dirty_region(&dirty_over_cache());
    assert_eq!(frame(&mut r, &f), DrawOutcome::Stale);
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);

    r.mgr.mark_node_is_occluded(false);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
    assert_eq!(r.captures.get(), 2);
}

#[test]
fn force_clear_wins_over_occlusion() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    r.mgr.mark_node_is_occluded(true);
    r.mgr.mark_filter_force_clear_cache();
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn force_use_keeps_cache_until_unmarked() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);

    r.mgr.mark_filter_force_use_cache(true);
    r.mgr.update_cache_state_with_dirty_region(&dirty_over_cache());
    r.mgr.mark_rotation_changed();
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);

    r.mgr.mark_filter_force_use_cache(false);
    r.mgr.mark_rotation_changed();
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn memory_pressure_drops_cache_at_commit() {
    let pressure = SharedMemoryPressure::new();
    let mut r = rig();
    r.mgr = r.mgr.with_memory_pressure(Arc::new(pressure.clone()));
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);

    pressure.request_purge(true);
    r.mgr.commit();
    assert!(!r.mgr.is_cache_valid());
    assert_eq!(r.mgr.stats().memory_purges, 1);

    pressure.request_purge(false);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn region_change_reports_released_memory() {
    let pressure = SharedMemoryPressure::new();
    let mut r = rig();
    r.mgr = r.mgr.with_memory_pressure(Arc::new(pressure.clone()));
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);

    assert!(!r.mgr.update_cache_state_with_filter_region(DeviceRect::new(10, 10, 90, 90)));
    assert!(r.mgr.update_cache_state_with_filter_region(DeviceRect::new(0, 0, 200, 100)));
    r.mgr.commit();
    assert!(!r.mgr.is_cache_valid());
    assert!(pressure.take_released());
    assert_eq!(r.mgr.render_flags().clear_type(), CacheType::BOTH);
}

#[test]
fn foreign_context_images_are_rewrapped_not_regenerated() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    let before = r.mgr.cached_entry(CacheSlot::FilteredSnapshot).unwrap();

    r.canvas.set_context(GpuContextId(2));
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);
    let after = r.mgr.cached_entry(CacheSlot::FilteredSnapshot).unwrap();
    assert_eq!(after.image().backend(), before.image().backend());
    assert!(after.image().is_valid_in(GpuContextId(2)));
    assert_eq!(r.canvas.last_draw().unwrap().image, after.image().id());
    assert_eq!(r.mgr.stats().context_rewraps, 2);
    assert_eq!(r.captures.get(), 1);
}

#[test]
fn failed_rewrap_forces_full_regeneration() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    r.canvas.set_context(GpuContextId(3));
    r.canvas.set_fail_rewrap(true);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
    assert_eq!(r.mgr.stats().context_failures, 1);
}

#[test]
fn filter_failure_draws_unfiltered_snapshot_and_empties_cache() {
    let mut r = rig_with(
        FilterCacheConfig::default(),
        HeadlessFilterExecutor::new().failing(true),
    );
    let f = FilterDescriptor::blur(10.0).unwrap();
    assert_eq!(frame(&mut r, &f), DrawOutcome::FallbackUnfiltered);
    assert_eq!(r.canvas.draws().len(), 1);
    assert_eq!(r.mgr.cache_state(), CacheState::Empty);
    assert_eq!(r.mgr.stats().filter_failures, 1);

    r.mgr.commit();
    assert!(
        r.mgr
            .generated_cached_effect_data(&mut r.canvas, &f, Some(R), None)
            .is_none()
    );
    assert_eq!(r.captures.get(), 2);
}

#[test]
fn capture_failure_skips_drawing() {
    let mut r = rig();
    r.canvas.set_fail_snapshot(true);
    let f = FilterDescriptor::blur(10.0).unwrap();
    assert_eq!(frame(&mut r, &f), DrawOutcome::Skipped);
    assert!(r.canvas.draws().is_empty());
    assert_eq!(r.filters.get(), 0);
    assert_eq!(r.mgr.cache_state(), CacheState::Empty);

    r.canvas.set_fail_snapshot(false);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn empty_clip_or_rect_skips() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    r.mgr.commit();
    let out = r
        .mgr
        .draw_filter(&mut r.canvas, &f, Some(DeviceRect::new(500, 500, 600, 600)))
        .unwrap();
    assert_eq!(out, DrawOutcome::Skipped);
    r.canvas.set_clip(DeviceRect::EMPTY);
    assert_eq!(
        r.mgr.draw_filter(&mut r.canvas, &f, None).unwrap(),
        DrawOutcome::Skipped
    );
    assert_eq!(r.captures.get(), 0);
}

#[test]
fn explicit_filtered_invalidation_refilters_without_capture() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    r.mgr.invalidate_filter_cache(CacheType::FILTERED_SNAPSHOT);
    assert_eq!(r.mgr.cache_state(), CacheState::SnapshotOnly);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Refiltered);
    assert_eq!(r.captures.get(), 1);
    assert_eq!(r.filters.get(), 2);
}

#[test]
fn compacted_snapshot_still_serves_fast_path() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    r.mgr.compact_filter_cache(false);
    assert_eq!(r.mgr.cache_state(), CacheState::FilteredOnly);
    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);

    // A new filter needs the backdrop again.
    let g = FilterDescriptor::blur(12.0).unwrap();
    assert_eq!(frame(&mut r, &g), DrawOutcome::Regenerated);
}

#[test]
fn compaction_hint_follows_committed_flags() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    assert!(r.mgr.clear_filtered_after_drawing());

    frame(&mut r, &f);
    assert!(!r.mgr.clear_filtered_after_drawing());
    r.mgr.compact_filter_cache_after_drawing();
    assert_eq!(r.mgr.cache_state(), CacheState::FilteredOnly);

    r.mgr.update_cache_state_with_filter_hash(&f);
    r.mgr.update_cache_state_with_filter_hash(&FilterDescriptor::blur(11.0).unwrap());
    r.mgr.mark_effect_node();
    r.mgr.commit();
    assert!(r.mgr.clear_filtered_after_drawing());
}

#[test]
fn reset_filter_cache_adopts_slots_and_keeps_identity() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    let snapshot = r.mgr.cached_entry(CacheSlot::Snapshot);
    let adopted = Arc::new(
        CachedImageRegion::new(
            r.canvas.snapshot(R).unwrap(),
            R,
            crate::foundation::core::Affine::IDENTITY,
        )
        .unwrap(),
    );
    r.mgr
        .reset_filter_cache(snapshot, Some(Arc::clone(&adopted)), R, true);
    assert!(r.mgr.is_filtered_from_offload());

    assert_eq!(frame(&mut r, &f), DrawOutcome::FastPath);
    assert_eq!(r.canvas.last_draw().unwrap().image, adopted.image().id());
}

#[test]
fn reset_with_zero_area_region_regenerates() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    let snapshot = r.mgr.cached_entry(CacheSlot::Snapshot);
    let filtered = r.mgr.cached_entry(CacheSlot::FilteredSnapshot);
    r.mgr
        .reset_filter_cache(snapshot, filtered, DeviceRect::new(0, 0, 0, 10), false);
    assert_eq!(frame(&mut r, &f), DrawOutcome::Regenerated);
}

#[test]
fn would_draw_large_area_blur_tracks_staged_state() {
    let mut r = rig();
    let f = skippable_blur(10.0);
    assert!(!r.mgr.would_draw_large_area_blur());

    r.mgr.mark_filter_region_is_large_area();
    assert!(r.mgr.would_draw_large_area_blur());

    r.mgr.update_cache_state_with_filter_hash(&f);
    assert!(!r.mgr.would_draw_large_area_blur());
    frame(&mut r, &f);

    // Age 0 after capture: the next two dirty frames are deferred, the third regenerates.
    for expected in [false, false, true] {
        r.mgr.update_cache_state_with_filter_hash(&f);
        r.mgr.mark_filter_region_is_large_area();
        r.mgr.update_cache_state_with_dirty_region(&dirty_over_cache());
        assert_eq!(r.mgr.would_draw_large_area_blur(), expected);
        let outcome = frame(&mut r, &f);
        assert_eq!(outcome == DrawOutcome::Regenerated, expected);
    }
}

#[test]
fn magnifier_shifts_capture_rect() {
    let mut r = rig();
    let f = FilterDescriptor::new(FilterKind::Magnifier {
        offset_x: 5,
        offset_y: -3,
        zoom: 2.0,
    })
    .unwrap();
    let src = DeviceRect::new(10, 10, 60, 60);
    r.mgr.commit();
    r.mgr.draw_filter(&mut r.canvas, &f, Some(src)).unwrap();
    assert_eq!(r.canvas.snapshots(), &[DeviceRect::new(15, 7, 65, 57)]);
    assert_eq!(r.mgr.cached_image_region(), src);
}

#[test]
fn refraction_offset_nudges_cached_draw() {
    let mut r = rig();
    let f = FilterDescriptor::new(FilterKind::Refraction {
        radius: 4.0,
        offset: 2.0,
    })
    .unwrap();
    frame(&mut r, &f);
    frame(&mut r, &f);
    let draw = r.canvas.last_draw().unwrap();
    assert_eq!(draw.src.x0, 2.0);
    assert_eq!(draw.dst, R);
}

#[test]
fn release_off_tree_empties_everything() {
    let mut r = rig();
    let f = FilterDescriptor::blur(10.0).unwrap();
    frame(&mut r, &f);
    r.mgr.release_cache_off_tree();
    assert!(!r.mgr.is_cache_valid());
    assert_eq!(r.mgr.cached_image_region(), DeviceRect::EMPTY);
    assert_eq!(r.mgr.cached_type(), CacheType::empty());
}
