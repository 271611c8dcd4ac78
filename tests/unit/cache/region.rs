use super::*;

fn image(w: u32, h: u32) -> ImageRef {
    Arc::new(GpuImage::new(w, h, GpuContextId(1), BackendHandle(7)))
}

#[test]
fn empty_region_is_rejected() {
    let err = CachedImageRegion::new(image(4, 4), DeviceRect::EMPTY, Affine::IDENTITY).unwrap_err();
    assert!(err.to_string().contains("non-empty"));
}

#[test]
fn image_ids_are_unique_per_wrapper() {
    let a = image(1, 1);
    let b = image(1, 1);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.backend(), b.backend());
}

#[test]
fn src_rect_is_identity_for_full_resolution_images() {
    let cached = CachedImageRegion::new(
        image(100, 50),
        DeviceRect::from_xywh(10, 20, 100, 50),
        Affine::IDENTITY,
    )
    .unwrap();
    let src = cached.src_rect_for(DeviceRect::from_xywh(20, 30, 10, 10));
    assert_eq!(src, Rect::new(10.0, 10.0, 20.0, 20.0));
}

#[test]
fn src_rect_scales_for_downsampled_images() {
    let cached = CachedImageRegion::new(
        image(50, 25),
        DeviceRect::from_xywh(0, 0, 100, 50),
        Affine::IDENTITY,
    )
    .unwrap();
    let src = cached.src_rect_for(DeviceRect::from_xywh(0, 0, 100, 50));
    assert_eq!(src, Rect::new(0.0, 0.0, 50.0, 25.0));
}

#[test]
fn refraction_offset_nudges_source_horizontally() {
    let cached = CachedImageRegion::new(
        image(100, 100),
        DeviceRect::from_xywh(0, 0, 100, 100),
        Affine::IDENTITY,
    )
    .unwrap()
    .with_refraction_offset(3.0);
    let src = cached.src_rect_for(DeviceRect::from_xywh(0, 0, 10, 10));
    assert_eq!(src.x0, 3.0);
    assert_eq!(src.y0, 0.0);
}

#[test]
fn rewrap_keeps_geometry_and_swaps_image() {
    let cached = CachedImageRegion::new(
        image(8, 8),
        DeviceRect::from_xywh(0, 0, 8, 8),
        Affine::translate((2.0, 3.0)),
    )
    .unwrap();
    let other = Arc::new(GpuImage::new(8, 8, GpuContextId(2), cached.image().backend()));
    let re = cached.rewrapped(other.clone());
    assert!(Arc::ptr_eq(re.image(), &other));
    assert_eq!(re.region(), cached.region());
    assert_eq!(re.transform(), cached.transform());
    assert!(re.image().is_valid_in(GpuContextId(2)));
    assert!(!cached.image().is_valid_in(GpuContextId(2)));
}

#[test]
fn src_rect_handles_offsets_beyond_i32() {
    let cached = CachedImageRegion::new(
        image(20, 10),
        DeviceRect::new(-10, 0, 10, 10),
        Affine::IDENTITY,
    )
    .unwrap();
    let src = cached.src_rect_for(DeviceRect::new(i32::MAX - 5, 0, i32::MAX, 10));
    assert_eq!(src.x0, 2_147_483_652.0);
    assert_eq!(src.x1, 2_147_483_657.0);
    assert_eq!((src.y0, src.y1), (0.0, 10.0));
}
