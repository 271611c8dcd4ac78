//! Collaborator contracts on the drawing side: the canvas, backdrop capture and filter execution.
//!
//! The cache never touches pixels; every GPU operation goes through these traits.

use crate::cache::region::{CachedImageRegion, GpuImage, ImageRef};
use crate::filter::FilterDescriptor;
use crate::foundation::core::{Affine, DeviceRect, GpuContextId, Rect};
use crate::foundation::error::{FxCacheError, FxCacheResult};

/// Drawing surface abstraction the cache captures from and draws into.
pub trait Canvas {
    /// GPU context the canvas records into.
    fn context_id(&self) -> GpuContextId;

    /// Device-space bounds of the bound surface.
    fn device_bounds(&self) -> DeviceRect;

    /// Device-space bounds of the current clip.
    fn device_clip_bounds(&self) -> DeviceRect;

    /// Current canvas transform.
    fn total_matrix(&self) -> Affine;

    /// Return `true` when a drawable surface is bound.
    fn has_surface(&self) -> bool;

    /// Copy the surface contents under `rect` into a new image.
    fn snapshot(&mut self, rect: DeviceRect) -> Option<ImageRef>;

    /// Draw the `src` part of `image` (image space) into `dst` (device space).
    fn draw_image_rect(&mut self, image: &GpuImage, src: Rect, dst: DeviceRect)
    -> FxCacheResult<()>;

    /// Wrap the backend allocation of a foreign-context `image` for this canvas' context.
    fn rewrap_image(&mut self, image: &GpuImage) -> FxCacheResult<ImageRef>;
}

/// Captures the backdrop under a rectangle.
pub trait SnapshotCapturer: Send {
    /// Capture `src`, optionally outset, into a new image.
    ///
    /// Fails with [`FxCacheError::Capture`] when nothing can be captured.
    fn capture(
        &mut self,
        canvas: &mut dyn Canvas,
        src: DeviceRect,
        needs_outset: bool,
    ) -> FxCacheResult<CachedImageRegion>;
}

/// Runs the actual filter over a captured snapshot.
pub trait FilterExecutor: Send {
    /// Filter `snapshot` into a new image covering `dst`.
    ///
    /// Fails with [`FxCacheError::FilterExecution`] when no image was produced.
    fn apply(
        &mut self,
        canvas: &mut dyn Canvas,
        snapshot: &CachedImageRegion,
        filter: &FilterDescriptor,
        dst: DeviceRect,
    ) -> FxCacheResult<CachedImageRegion>;
}

/// [`SnapshotCapturer`] that snapshots the canvas' bound surface.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceSnapshotCapturer {
    outset_px: i32,
}

impl SurfaceSnapshotCapturer {
    /// Capturer adding `outset_px` around outset captures.
    pub fn new(outset_px: u32) -> Self {
        Self {
            outset_px: i32::try_from(outset_px).unwrap_or(i32::MAX),
        }
    }
}

impl Default for SurfaceSnapshotCapturer {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SnapshotCapturer for SurfaceSnapshotCapturer {
    fn capture(
        &mut self,
        canvas: &mut dyn Canvas,
        src: DeviceRect,
        needs_outset: bool,
    ) -> FxCacheResult<CachedImageRegion> {
        if !canvas.has_surface() {
            return Err(FxCacheError::capture("no drawable surface bound"));
        }
        let rect = if needs_outset {
            src.outset(self.outset_px)
        } else {
            src
        };
        let rect = rect.intersect(canvas.device_bounds());
        if rect.is_empty() {
            return Err(FxCacheError::capture(format!(
                "capture rect {src} lies outside the surface"
            )));
        }
        let image = canvas
            .snapshot(rect)
            .ok_or_else(|| FxCacheError::capture(format!("surface snapshot of {rect} failed")))?;
        CachedImageRegion::new(image, rect, canvas.total_matrix())
    }
}

#[cfg(test)]
#[path = "../tests/unit/backend.rs"]
mod tests;
