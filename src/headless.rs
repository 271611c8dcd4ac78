//! GPU-free collaborators: a recording canvas, a filter executor and a scripted offload device.
//!
//! Used by the replay CLI and by tests; images are bookkeeping-only [`GpuImage`] wrappers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{Canvas, FilterExecutor, SnapshotCapturer};
use crate::cache::region::{BackendHandle, CachedImageRegion, GpuImage, ImageId, ImageRef};
use crate::filter::FilterDescriptor;
use crate::foundation::core::{Affine, DeviceRect, GpuContextId, Rect};
use crate::foundation::error::{FxCacheError, FxCacheResult};
use crate::offload::{HardwareOffloadDevice, OffloadCompletion, OffloadTask, TaskHandle};

static NEXT_BACKEND_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_backend() -> BackendHandle {
    BackendHandle(NEXT_BACKEND_HANDLE.fetch_add(1, Ordering::Relaxed))
}

fn extent(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

/// Shared call counter handed out by the headless collaborators.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Calls so far.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// One recorded `draw_image_rect` call.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    /// Image drawn.
    pub image: ImageId,
    /// Source rect in image space.
    pub src: Rect,
    /// Destination rect in device space.
    pub dst: DeviceRect,
}

/// [`Canvas`] that records snapshots and draws.
#[derive(Debug)]
pub struct HeadlessCanvas {
    context: GpuContextId,
    bounds: DeviceRect,
    clip: DeviceRect,
    matrix: Affine,
    has_surface: bool,
    fail_snapshot: bool,
    fail_rewrap: bool,
    snapshots: Vec<DeviceRect>,
    draws: Vec<DrawRecord>,
    rewraps: usize,
}

impl HeadlessCanvas {
    /// Canvas of `width` x `height` device pixels in context `1`, clip = bounds.
    pub fn new(width: i32, height: i32) -> Self {
        let bounds = DeviceRect::from_xywh(0, 0, width, height);
        Self {
            context: GpuContextId(1),
            bounds,
            clip: bounds,
            matrix: Affine::IDENTITY,
            has_surface: true,
            fail_snapshot: false,
            fail_rewrap: false,
            snapshots: Vec::new(),
            draws: Vec::new(),
            rewraps: 0,
        }
    }

    /// Switch the GPU context draws are recorded into.
    pub fn set_context(&mut self, context: GpuContextId) {
        self.context = context;
    }

    /// Bind or unbind the drawable surface.
    pub fn set_surface(&mut self, has_surface: bool) {
        self.has_surface = has_surface;
    }

    /// Make every snapshot fail.
    pub fn set_fail_snapshot(&mut self, fail: bool) {
        self.fail_snapshot = fail;
    }

    /// Make every re-wrap fail.
    pub fn set_fail_rewrap(&mut self, fail: bool) {
        self.fail_rewrap = fail;
    }

    /// Set the device clip.
    pub fn set_clip(&mut self, clip: DeviceRect) {
        self.clip = clip;
    }

    /// Set the canvas transform.
    pub fn set_matrix(&mut self, matrix: Affine) {
        self.matrix = matrix;
    }

    /// Rects snapshotted so far.
    pub fn snapshots(&self) -> &[DeviceRect] {
        &self.snapshots
    }

    /// Draws recorded so far.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Most recent draw.
    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    /// Successful re-wraps so far.
    pub fn rewraps(&self) -> usize {
        self.rewraps
    }

    /// Forget recorded snapshots and draws.
    pub fn clear_records(&mut self) {
        self.snapshots.clear();
        self.draws.clear();
    }
}

impl Canvas for HeadlessCanvas {
    fn context_id(&self) -> GpuContextId {
        self.context
    }

    fn device_bounds(&self) -> DeviceRect {
        self.bounds
    }

    fn device_clip_bounds(&self) -> DeviceRect {
        self.clip.intersect(self.bounds)
    }

    fn total_matrix(&self) -> Affine {
        self.matrix
    }

    fn has_surface(&self) -> bool {
        self.has_surface
    }

    fn snapshot(&mut self, rect: DeviceRect) -> Option<ImageRef> {
        if !self.has_surface || self.fail_snapshot || rect.is_empty() {
            return None;
        }
        self.snapshots.push(rect);
        Some(Arc::new(GpuImage::new(
            extent(rect.width()),
            extent(rect.height()),
            self.context,
            next_backend(),
        )))
    }

    fn draw_image_rect(
        &mut self,
        image: &GpuImage,
        src: Rect,
        dst: DeviceRect,
    ) -> FxCacheResult<()> {
        if !self.has_surface {
            return Err(FxCacheError::Other(anyhow::anyhow!(
                "headless canvas has no surface to draw into"
            )));
        }
        self.draws.push(DrawRecord {
            image: image.id(),
            src,
            dst,
        });
        Ok(())
    }

    fn rewrap_image(&mut self, image: &GpuImage) -> FxCacheResult<ImageRef> {
        if self.fail_rewrap {
            return Err(FxCacheError::context_mismatch(format!(
                "backend {:?} cannot be imported into context {:?}",
                image.backend(),
                self.context
            )));
        }
        self.rewraps += 1;
        Ok(Arc::new(GpuImage::new(
            image.width(),
            image.height(),
            self.context,
            image.backend(),
        )))
    }
}

/// [`FilterExecutor`] that allocates an output image per call and never reads pixels.
#[derive(Debug, Default)]
pub struct HeadlessFilterExecutor {
    fail: bool,
    calls: CallCounter,
}

impl HeadlessFilterExecutor {
    /// Succeeding executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (or succeed again).
    pub fn failing(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }

    /// Counter of `apply` calls, shareable after the executor is boxed.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl FilterExecutor for HeadlessFilterExecutor {
    fn apply(
        &mut self,
        canvas: &mut dyn Canvas,
        _snapshot: &CachedImageRegion,
        filter: &FilterDescriptor,
        dst: DeviceRect,
    ) -> FxCacheResult<CachedImageRegion> {
        self.calls.bump();
        if self.fail {
            return Err(FxCacheError::filter_execution(format!(
                "headless filter {:#x} configured to fail",
                filter.identity().0
            )));
        }
        let image = Arc::new(GpuImage::new(
            extent(dst.width()),
            extent(dst.height()),
            canvas.context_id(),
            next_backend(),
        ));
        CachedImageRegion::new(image, dst, canvas.total_matrix())
    }
}

/// Wraps a [`SnapshotCapturer`] and counts its calls.
pub struct CountingCapturer<C> {
    inner: C,
    calls: CallCounter,
}

impl<C: SnapshotCapturer> CountingCapturer<C> {
    /// Count calls to `inner`.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: CallCounter::default(),
        }
    }

    /// Counter of `capture` calls.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<C: SnapshotCapturer> SnapshotCapturer for CountingCapturer<C> {
    fn capture(
        &mut self,
        canvas: &mut dyn Canvas,
        src: DeviceRect,
        needs_outset: bool,
    ) -> FxCacheResult<CachedImageRegion> {
        self.calls.bump();
        self.inner.capture(canvas, src, needs_outset)
    }
}

#[derive(Debug)]
struct ScriptedState {
    available: bool,
    max_radius: f32,
    downscale: u32,
    synchronous: bool,
    next_task: u64,
    submitted: Vec<(TaskHandle, DeviceRect, f32)>,
    completions: std::collections::VecDeque<OffloadCompletion>,
}

/// Control side of a [`ScriptedOffloadDevice`].
#[derive(Clone, Debug)]
pub struct ScriptedOffloadHandle {
    state: Arc<Mutex<ScriptedState>>,
}

/// [`HardwareOffloadDevice`] whose completions are released by the test or replay script.
#[derive(Debug)]
pub struct ScriptedOffloadDevice {
    state: Arc<Mutex<ScriptedState>>,
}

fn lock(state: &Mutex<ScriptedState>) -> MutexGuard<'_, ScriptedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedOffloadDevice {
    /// Available device accepting radii up to `max_radius`.
    pub fn new(max_radius: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState {
                available: true,
                max_radius,
                downscale: 1,
                synchronous: false,
                next_task: 1,
                submitted: Vec::new(),
                completions: std::collections::VecDeque::new(),
            })),
        }
    }

    /// Handle to drive the device after it has been boxed into an adapter.
    pub fn handle(&self) -> ScriptedOffloadHandle {
        ScriptedOffloadHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl ScriptedOffloadHandle {
    /// Open or close the device.
    pub fn set_available(&self, available: bool) {
        lock(&self.state).available = available;
    }

    /// Produce outputs at `1 / factor` of the region resolution.
    pub fn set_downscale(&self, factor: u32) {
        lock(&self.state).downscale = factor.max(1);
    }

    /// Complete each task inside `submit`, before the caller draws.
    ///
    /// Synchronous tasks never show up in [`Self::submitted`].
    pub fn set_synchronous(&self, synchronous: bool) {
        lock(&self.state).synchronous = synchronous;
    }

    /// Tasks submitted and not completed yet, as `(handle, dst, radius)`.
    pub fn submitted(&self) -> Vec<(TaskHandle, DeviceRect, f32)> {
        lock(&self.state).submitted.clone()
    }

    /// Complete every submitted task that has not completed yet.
    pub fn complete_all(&self) -> usize {
        let mut st = lock(&self.state);
        let pending: Vec<_> = std::mem::take(&mut st.submitted);
        let downscale = st.downscale;
        for (task, dst, radius) in &pending {
            st.completions
                .push_back(finished(*task, *dst, *radius, downscale));
        }
        pending.len()
    }

    /// Queue a completion that was never submitted (e.g. produced for another consumer).
    pub fn push_output(&self, region: DeviceRect, radius: f32, context: GpuContextId) {
        let mut st = lock(&self.state);
        let task = TaskHandle(st.next_task);
        st.next_task += 1;
        let downscale = st.downscale;
        st.completions.push_back(OffloadCompletion {
            task,
            image: Some(Arc::new(GpuImage::new(
                extent(region.width()) / downscale,
                extent(region.height()) / downscale,
                context,
                next_backend(),
            ))),
            region,
            radius,
            reused_from_cache: true,
        });
    }

    /// Queue a completion without an image.
    pub fn push_empty(&self, radius: f32) {
        let mut st = lock(&self.state);
        let task = TaskHandle(st.next_task);
        st.next_task += 1;
        st.completions.push_back(OffloadCompletion {
            task,
            image: None,
            region: DeviceRect::EMPTY,
            radius,
            reused_from_cache: false,
        });
    }
}

fn finished(task: TaskHandle, dst: DeviceRect, radius: f32, downscale: u32) -> OffloadCompletion {
    OffloadCompletion {
        task,
        image: Some(Arc::new(GpuImage::new(
            extent(dst.width()) / downscale,
            extent(dst.height()) / downscale,
            GpuContextId(0),
            next_backend(),
        ))),
        region: dst,
        radius,
        reused_from_cache: false,
    }
}

impl HardwareOffloadDevice for ScriptedOffloadDevice {
    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    fn max_radius(&self) -> f32 {
        lock(&self.state).max_radius
    }

    fn submit(&mut self, task: OffloadTask) -> FxCacheResult<TaskHandle> {
        let mut st = lock(&self.state);
        if !st.available {
            return Err(FxCacheError::offload("scripted device closed"));
        }
        let handle = TaskHandle(st.next_task);
        st.next_task += 1;
        if st.synchronous {
            let done = finished(handle, task.dst, task.radius, st.downscale);
            st.completions.push_back(done);
        } else {
            st.submitted.push((handle, task.dst, task.radius));
        }
        Ok(handle)
    }

    fn poll_completion(&mut self) -> Option<OffloadCompletion> {
        lock(&self.state).completions.pop_front()
    }
}

#[cfg(test)]
#[path = "../tests/unit/headless.rs"]
mod tests;
