use super::*;

#[test]
fn empty_region_never_intersects() {
    let d = DirtyRegion::new();
    assert!(d.is_empty());
    assert!(!d.intersects(DeviceRect::new(0, 0, 100, 100)));
}

#[test]
fn empty_rects_are_dropped() {
    let d = DirtyRegion::from_rects([DeviceRect::EMPTY, DeviceRect::new(5, 5, 5, 10)]);
    assert!(d.is_empty());
    assert!(d.rects().is_empty());
}

#[test]
fn disjoint_and_touching_rects_do_not_intersect() {
    let cached = DeviceRect::new(0, 0, 100, 100);
    let d = DirtyRegion::from_rects([
        DeviceRect::new(200, 200, 300, 300),
        DeviceRect::new(100, 0, 150, 100),
    ]);
    assert!(!d.intersects(cached));
}

#[test]
fn one_pixel_overlap_intersects() {
    let cached = DeviceRect::new(0, 0, 100, 100);
    let d = DirtyRegion::from_rects([DeviceRect::new(99, 99, 150, 150)]);
    assert!(d.intersects(cached));
}

#[test]
fn extend_merges_rects() {
    let mut a = DirtyRegion::from_rects([DeviceRect::new(0, 0, 1, 1)]);
    let b = DirtyRegion::from_rects([DeviceRect::new(5, 5, 6, 6)]);
    a.extend(&b);
    assert_eq!(a.rects().len(), 2);
    assert!(a.intersects(DeviceRect::new(5, 5, 10, 10)));
    a.clear();
    assert!(a.is_empty());
}

#[test]
fn deserializes_from_plain_rect_list() {
    let d: DirtyRegion =
        serde_json::from_str(r#"[{"left":0,"top":0,"right":4,"bottom":4}]"#).unwrap();
    assert!(d.intersects(DeviceRect::new(3, 3, 8, 8)));
}
