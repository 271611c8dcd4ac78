use super::*;
use crate::cache::region::{BackendHandle, GpuImage};
use crate::foundation::core::{Affine, GpuContextId};
use crate::headless::ScriptedOffloadDevice;

fn snapshot() -> Arc<CachedImageRegion> {
    let image = Arc::new(GpuImage::new(100, 100, GpuContextId(1), BackendHandle(5)));
    Arc::new(CachedImageRegion::new(image, DeviceRect::new(0, 0, 100, 100), Affine::IDENTITY).unwrap())
}

fn adapter(max_radius: f32, capacity: usize) -> (HardwareOffloadAdapter, crate::headless::ScriptedOffloadHandle) {
    let dev = ScriptedOffloadDevice::new(max_radius);
    let handle = dev.handle();
    (HardwareOffloadAdapter::new(Box::new(dev), capacity).unwrap(), handle)
}

const DST: DeviceRect = DeviceRect::new(0, 0, 100, 100);

#[test]
fn zero_capacity_is_rejected() {
    let dev = ScriptedOffloadDevice::new(10.0);
    assert!(HardwareOffloadAdapter::new(Box::new(dev), 0).is_err());
}

#[test]
fn submit_fails_fast_on_routing_conditions() {
    let (mut a, handle) = adapter(20.0, 3);
    let blur = |r| FilterDescriptor::blur(r).unwrap();

    assert!(matches!(
        a.submit(&snapshot(), &blur(0.0), DST),
        Err(FxCacheError::Offload(_))
    ));
    assert!(a.submit(&snapshot(), &blur(25.0), DST).is_err());
    handle.set_available(false);
    assert!(!a.is_selectable(10.0));
    assert!(a.submit(&snapshot(), &blur(10.0), DST).is_err());
    assert!(handle.submitted().is_empty());
    assert_eq!(a.stats().rejected, 3);
}

#[test]
fn radius_cap_tightens_device_limit() {
    let (a, _h) = adapter(50.0, 3);
    let a = a.with_radius_cap(30.0);
    assert_eq!(a.radius_limit(), 30.0);
    assert!(a.is_selectable(30.0));
    assert!(!a.is_selectable(31.0));
}

#[test]
fn ring_saturates_with_in_flight_and_outputs() {
    let (mut a, handle) = adapter(50.0, 2);
    let f = FilterDescriptor::blur(10.0).unwrap();
    a.submit(&snapshot(), &f, DST).unwrap();
    a.submit(&snapshot(), &f, DST).unwrap();
    assert!(a.is_saturated());
    assert!(a.submit(&snapshot(), &f, DST).is_err());

    handle.complete_all();
    // Completed outputs still occupy the ring until consumed.
    assert!(a.poll_output().is_some());
    assert_eq!(a.in_flight(), 0);
    assert_eq!(a.pending_outputs(), 1);
    assert!(!a.is_saturated());
}

#[test]
fn outputs_are_fifo_and_empty_completions_skipped() {
    let (mut a, handle) = adapter(50.0, 4);
    handle.push_output(DST, 4.0, GpuContextId(1));
    handle.push_empty(6.0);
    handle.push_output(DST, 8.0, GpuContextId(1));
    assert_eq!(a.poll_output().unwrap().radius, 4.0);
    assert_eq!(a.poll_output().unwrap().radius, 8.0);
    assert!(a.poll_output().is_none());
    assert_eq!(a.stats().empty_completions, 1);
}

#[test]
fn take_output_for_prefers_latest_matching_radius() {
    let (mut a, handle) = adapter(50.0, 4);
    handle.push_output(DST, 10.0, GpuContextId(1));
    handle.push_output(DST, 20.0, GpuContextId(1));
    handle.push_output(DST, 10.0, GpuContextId(1));
    let first_10 = a.poll_output().unwrap();

    let best = a.take_output_for(10.0).unwrap();
    assert!(best.matches_radius(10.0));
    assert!(!Arc::ptr_eq(&best.image, &first_10.image));
    assert_eq!(a.pending_outputs(), 0);
    assert!(a.take_output_for(10.0).is_none());
}

#[test]
fn take_output_for_drops_mismatches() {
    let (mut a, handle) = adapter(50.0, 4);
    handle.push_output(DST, 20.0, GpuContextId(1));
    assert!(a.take_output_for(10.0).is_none());
    assert_eq!(a.stats().dropped, 1);
}

#[test]
fn overflowing_ring_drops_oldest() {
    let (mut a, handle) = adapter(50.0, 2);
    handle.push_output(DST, 1.0, GpuContextId(1));
    handle.push_output(DST, 2.0, GpuContextId(1));
    handle.push_output(DST, 3.0, GpuContextId(1));
    assert_eq!(a.poll_output().unwrap().radius, 2.0);
    assert_eq!(a.poll_output().unwrap().radius, 3.0);
    assert_eq!(a.stats().dropped, 1);
}

#[test]
fn discard_outputs_empties_the_ring() {
    let (mut a, handle) = adapter(50.0, 2);
    handle.push_output(DST, 1.0, GpuContextId(1));
    handle.push_output(DST, 2.0, GpuContextId(1));
    assert!(a.poll_output().is_some());
    assert_eq!(a.pending_outputs(), 1);
    a.discard_outputs();
    assert_eq!(a.pending_outputs(), 0);
    assert_eq!(a.stats().dropped, 1);
}

#[test]
fn completion_of_a_discarded_backdrop_is_dropped() {
    let (mut a, handle) = adapter(50.0, 4);
    let f = FilterDescriptor::blur(10.0).unwrap();
    a.submit(&snapshot(), &f, DST).unwrap();
    assert_eq!(a.generation(), 0);

    a.discard_outputs();
    assert_eq!(a.generation(), 1);
    assert_eq!(a.in_flight(), 1);

    a.submit(&snapshot(), &f, DST).unwrap();
    assert_eq!(handle.complete_all(), 2);
    let current = a.poll_output().unwrap();
    assert_eq!(current.radius, 10.0);
    assert!(a.poll_output().is_none());
    assert_eq!(a.in_flight(), 0);
    assert_eq!(a.stats().dropped, 1);
    assert_eq!(a.stats().completed, 1);
}
