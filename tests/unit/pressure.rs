use super::*;

#[test]
fn clones_share_state() {
    let a = SharedMemoryPressure::new();
    let b = a.clone();
    assert!(!b.purge_requested());
    a.request_purge(true);
    assert!(b.purge_requested());
    a.request_purge(false);
    assert!(!b.purge_requested());
}

#[test]
fn release_marker_is_taken_once() {
    let p = SharedMemoryPressure::new();
    let signal: Arc<dyn MemoryPressureSignal> = Arc::new(p.clone());
    signal.report_released();
    signal.report_released();
    assert!(p.take_released());
    assert!(!p.take_released());
    assert_eq!(p.release_reports(), 2);
}
