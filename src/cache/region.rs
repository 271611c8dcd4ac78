use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::{Affine, DeviceRect, GpuContextId, Rect};
use crate::foundation::error::{FxCacheError, FxCacheResult};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of a [`GpuImage`] wrapper, for logs and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u64);

/// Raw backend texture handle shared by every wrapper of the same GPU allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BackendHandle(pub u64);

/// GPU-resident pixel buffer as seen by the cache.
///
/// The cache never touches pixels. It only needs the size, the context the wrapper was created
/// in and the backend handle, so a foreign-context image can be re-wrapped cheaply.
#[derive(Debug)]
pub struct GpuImage {
    id: ImageId,
    width: u32,
    height: u32,
    context: GpuContextId,
    backend: BackendHandle,
}

impl GpuImage {
    /// Wrap a backend allocation created in `context`.
    pub fn new(width: u32, height: u32, context: GpuContextId, backend: BackendHandle) -> Self {
        Self {
            id: ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            context,
            backend,
        }
    }

    /// Wrapper id.
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Context the wrapper belongs to.
    pub fn context(&self) -> GpuContextId {
        self.context
    }

    /// Underlying backend allocation.
    pub fn backend(&self) -> BackendHandle {
        self.backend
    }

    /// Return `true` when the wrapper can be drawn directly in `context`.
    pub fn is_valid_in(&self, context: GpuContextId) -> bool {
        self.context == context
    }
}

/// Shared-ownership image handle. Clearing a cache slot never frees an image still held by a draw.
pub type ImageRef = Arc<GpuImage>;

/// An image plus the device-space rectangle it covers and the transform it was captured under.
#[derive(Clone, Debug)]
pub struct CachedImageRegion {
    image: ImageRef,
    region: DeviceRect,
    transform: Affine,
    refraction_offset: f32,
}

impl CachedImageRegion {
    /// Pair `image` with `region`.
    ///
    /// Fails when `region` is empty: an image always covers at least one device pixel.
    pub fn new(image: ImageRef, region: DeviceRect, transform: Affine) -> FxCacheResult<Self> {
        if region.is_empty() {
            return Err(FxCacheError::validation(format!(
                "cached image region must be non-empty, got {region}"
            )));
        }
        Ok(Self {
            image,
            region,
            transform,
            refraction_offset: 0.0,
        })
    }

    /// Set the refraction nudge applied when the image is redrawn.
    pub fn with_refraction_offset(mut self, offset: f32) -> Self {
        self.refraction_offset = offset;
        self
    }

    /// Cached image.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Device-space rectangle covered by the image.
    pub fn region(&self) -> DeviceRect {
        self.region
    }

    /// Canvas transform active at capture time.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Horizontal nudge for refractive filters.
    pub fn refraction_offset(&self) -> f32 {
        self.refraction_offset
    }

    /// Same region and transform around a different wrapper of the same pixels.
    pub fn rewrapped(&self, image: ImageRef) -> Self {
        Self {
            image,
            region: self.region,
            transform: self.transform,
            refraction_offset: self.refraction_offset,
        }
    }

    /// Map a device-space destination into image space.
    ///
    /// Images may be stored at a different resolution than the region they cover (hardware
    /// outputs are often down-scaled), so the mapping scales by image size over region size.
    pub fn src_rect_for(&self, dst: DeviceRect) -> Rect {
        let sx = f64::from(self.image.width()) / f64::from(self.region.width().max(1));
        let sy = f64::from(self.image.height()) / f64::from(self.region.height().max(1));
        // Offsets between extreme coordinates do not fit in i32.
        let dx = f64::from(dst.left) - f64::from(self.region.left) + f64::from(self.refraction_offset);
        let dy = f64::from(dst.top) - f64::from(self.region.top);
        Rect::new(
            dx * sx,
            dy * sy,
            (dx + f64::from(dst.width())) * sx,
            (dy + f64::from(dst.height())) * sy,
        )
    }
}

impl std::fmt::Display for CachedImageRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "image#{} {}x{} region {}",
            self.image.id().0,
            self.image.width(),
            self.image.height(),
            self.region
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/region.rs"]
mod tests;
