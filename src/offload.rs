//! Hardware blur offload: asynchronous submission to a fixed-function accelerator and a small
//! FIFO of completed outputs.

use std::collections::VecDeque;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::cache::region::{CachedImageRegion, ImageRef};
use crate::filter::FilterDescriptor;
use crate::foundation::core::DeviceRect;
use crate::foundation::error::{FxCacheError, FxCacheResult};

const RADIUS_EPSILON: f32 = 1e-3;

/// Handle of a submitted offload task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaskHandle(pub u64);

/// Work handed to the accelerator.
#[derive(Clone, Debug)]
pub struct OffloadTask {
    /// Backdrop to blur.
    pub snapshot: Arc<CachedImageRegion>,
    /// Region the output must cover.
    pub dst: DeviceRect,
    /// Blur radius.
    pub radius: f32,
}

/// Completion reported by the accelerator.
#[derive(Clone, Debug)]
pub struct OffloadCompletion {
    /// Task this completion belongs to.
    pub task: TaskHandle,
    /// Blurred image, `None` when the device produced nothing.
    pub image: Option<ImageRef>,
    /// Region the image covers.
    pub region: DeviceRect,
    /// Radius the image was computed for.
    pub radius: f32,
    /// The device served the output from its own cache instead of recomputing.
    pub reused_from_cache: bool,
}

/// Accelerator capability, owned by the platform and injected into the adapter.
pub trait HardwareOffloadDevice: Send {
    /// Return `true` when the device is open and accepting work.
    fn is_available(&self) -> bool;

    /// Largest blur radius the device supports.
    fn max_radius(&self) -> f32;

    /// Queue `task`. Must not block.
    fn submit(&mut self, task: OffloadTask) -> FxCacheResult<TaskHandle>;

    /// Next finished task, if any. Must not block.
    fn poll_completion(&mut self) -> Option<OffloadCompletion>;
}

/// Completed output waiting to be consumed by the draw path.
#[derive(Clone, Debug)]
pub struct HardwareOffloadOutputItem {
    /// Blurred image.
    pub image: ImageRef,
    /// Region the image covers.
    pub region: DeviceRect,
    /// Radius the image was computed for.
    pub radius: f32,
    /// The device served the output from its own cache.
    pub reused_from_cache: bool,
}

impl HardwareOffloadOutputItem {
    /// Return `true` when the output was computed for `radius`.
    pub fn matches_radius(&self, radius: f32) -> bool {
        (self.radius - radius).abs() <= RADIUS_EPSILON
    }
}

/// Offload bookkeeping, saturating counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct OffloadStats {
    /// Tasks accepted by the device.
    pub submitted: u64,
    /// Submissions refused before or by the device.
    pub rejected: u64,
    /// Completions carrying an image.
    pub completed: u64,
    /// Completions without an image.
    pub empty_completions: u64,
    /// Outputs dropped unread (ring overflow or superseded).
    pub dropped: u64,
}

/// Routes blur work to a [`HardwareOffloadDevice`] and queues its outputs.
pub struct HardwareOffloadAdapter {
    device: Box<dyn HardwareOffloadDevice>,
    capacity: usize,
    radius_cap: f32,
    outputs: VecDeque<HardwareOffloadOutputItem>,
    // In-flight tasks tagged with the backdrop generation they were submitted under.
    in_flight: SmallVec<[(TaskHandle, u64); 4]>,
    generation: u64,
    stats: OffloadStats,
}

impl std::fmt::Debug for HardwareOffloadAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareOffloadAdapter")
            .field("capacity", &self.capacity)
            .field("radius_cap", &self.radius_cap)
            .field("outputs", &self.outputs.len())
            .field("in_flight", &self.in_flight.len())
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish()
    }
}

impl HardwareOffloadAdapter {
    /// Adapter with room for `capacity` outputs and in-flight tasks combined.
    pub fn new(device: Box<dyn HardwareOffloadDevice>, capacity: usize) -> FxCacheResult<Self> {
        if capacity == 0 {
            return Err(FxCacheError::validation(
                "offload output capacity must be >= 1",
            ));
        }
        Ok(Self {
            device,
            capacity,
            radius_cap: 0.0,
            outputs: VecDeque::with_capacity(capacity),
            in_flight: SmallVec::new(),
            generation: 0,
            stats: OffloadStats::default(),
        })
    }

    /// Cap radii below the device limit, `0.0` keeps the device limit.
    pub fn with_radius_cap(mut self, radius_cap: f32) -> Self {
        self.radius_cap = radius_cap.max(0.0);
        self
    }

    /// Return `true` when the device accepts work.
    pub fn is_available(&self) -> bool {
        self.device.is_available()
    }

    /// Largest radius that will be routed to the device.
    pub fn radius_limit(&self) -> f32 {
        let device = self.device.max_radius();
        if self.radius_cap > 0.0 {
            device.min(self.radius_cap)
        } else {
            device
        }
    }

    /// Return `true` when no further task fits the ring.
    pub fn is_saturated(&self) -> bool {
        self.outputs.len() + self.in_flight.len() >= self.capacity
    }

    /// Return `true` when a blur of `radius` would be routed to the device right now.
    pub fn is_selectable(&self, radius: f32) -> bool {
        self.check_submit(radius).is_ok()
    }

    fn check_submit(&self, radius: f32) -> FxCacheResult<()> {
        if !self.is_available() {
            return Err(FxCacheError::offload("device unavailable"));
        }
        if radius <= 0.0 {
            return Err(FxCacheError::offload(format!(
                "radius {radius} has no blur stage"
            )));
        }
        let limit = self.radius_limit();
        if radius > limit {
            return Err(FxCacheError::offload(format!(
                "radius {radius} exceeds device limit {limit}"
            )));
        }
        if self.is_saturated() {
            return Err(FxCacheError::offload("output ring saturated"));
        }
        Ok(())
    }

    /// Submit a blur of `snapshot` covering `dst`. Fails fast without touching the device when
    /// the task cannot be routed.
    pub fn submit(
        &mut self,
        snapshot: &Arc<CachedImageRegion>,
        filter: &FilterDescriptor,
        dst: DeviceRect,
    ) -> FxCacheResult<TaskHandle> {
        let radius = filter.radius();
        if let Err(err) = self.check_submit(radius) {
            self.stats.rejected = self.stats.rejected.saturating_add(1);
            return Err(err);
        }
        let task = OffloadTask {
            snapshot: Arc::clone(snapshot),
            dst,
            radius,
        };
        match self.device.submit(task) {
            Ok(handle) => {
                self.in_flight.push((handle, self.generation));
                self.stats.submitted = self.stats.submitted.saturating_add(1);
                tracing::trace!(task = handle.0, radius, %dst, "offload submitted");
                Ok(handle)
            }
            Err(err) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                Err(err)
            }
        }
    }

    fn pump(&mut self) {
        while let Some(done) = self.device.poll_completion() {
            let submitted_under = self
                .in_flight
                .iter()
                .position(|(h, _)| *h == done.task)
                .map(|i| self.in_flight.remove(i).1);
            // Completions nobody submitted through this adapter count as current.
            if submitted_under.is_some_and(|g| g != self.generation) {
                self.stats.dropped = self.stats.dropped.saturating_add(1);
                tracing::trace!(task = done.task.0, "stale offload completion dropped");
                continue;
            }
            let Some(image) = done.image else {
                self.stats.empty_completions = self.stats.empty_completions.saturating_add(1);
                continue;
            };
            if done.region.is_empty() {
                self.stats.empty_completions = self.stats.empty_completions.saturating_add(1);
                continue;
            }
            if self.outputs.len() >= self.capacity {
                self.outputs.pop_front();
                self.stats.dropped = self.stats.dropped.saturating_add(1);
            }
            self.stats.completed = self.stats.completed.saturating_add(1);
            self.outputs.push_back(HardwareOffloadOutputItem {
                image,
                region: done.region,
                radius: done.radius,
                reused_from_cache: done.reused_from_cache,
            });
        }
    }

    /// Oldest completed output, if any.
    pub fn poll_output(&mut self) -> Option<HardwareOffloadOutputItem> {
        self.pump();
        self.outputs.pop_front()
    }

    /// Most recent completed output computed for `radius`.
    ///
    /// Drains the queue: older or mismatching outputs are superseded and dropped.
    pub fn take_output_for(&mut self, radius: f32) -> Option<HardwareOffloadOutputItem> {
        self.pump();
        let mut best = None;
        while let Some(item) = self.outputs.pop_front() {
            if item.matches_radius(radius) {
                if best.replace(item).is_some() {
                    self.stats.dropped = self.stats.dropped.saturating_add(1);
                }
            } else {
                self.stats.dropped = self.stats.dropped.saturating_add(1);
            }
        }
        best
    }

    /// Tasks submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Outputs waiting to be consumed.
    pub fn pending_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The backdrop was invalidated: drop every completed output and every result still in
    /// flight.
    ///
    /// In-flight tasks keep their ring slot until the device reports them; their images are then
    /// dropped instead of queued.
    pub fn discard_outputs(&mut self) {
        self.pump();
        let n = self.outputs.len() as u64;
        self.outputs.clear();
        self.stats.dropped = self.stats.dropped.saturating_add(n);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Backdrop generation new submissions are tagged with; advanced by
    /// [`Self::discard_outputs`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Counters so far.
    pub fn stats(&self) -> OffloadStats {
        self.stats.clone()
    }
}

#[cfg(test)]
#[path = "../tests/unit/offload.rs"]
mod tests;
