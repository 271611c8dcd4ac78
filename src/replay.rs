//! Frame-script replay: drives a [`FilterCacheManager`] wired to the headless collaborators and
//! reports what every frame ended up doing.
//!
//! Scenarios are JSON documents:
//!
//! ```json
//! {
//!   "canvas": { "width": 256, "height": 256 },
//!   "offload": { "max_radius": 40.0 },
//!   "frames": [
//!     { "filter": { "kind": "blur", "radius": 10.0 }, "rect": { "left": 0, "top": 0, "right": 64, "bottom": 64 } },
//!     { "filter": { "kind": "blur", "radius": 10.0 }, "marks": ["large_area"] }
//!   ]
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::cache::store::CacheState;
use crate::config::FilterCacheConfig;
use crate::filter::{FilterDescriptor, FilterKind};
use crate::foundation::core::{DeviceRect, NodeId};
use crate::foundation::error::{FxCacheError, FxCacheResult};
use crate::headless::{
    HeadlessCanvas, HeadlessFilterExecutor, ScriptedOffloadDevice, ScriptedOffloadHandle,
};
use crate::manager::{DrawOutcome, FilterCacheManager, FilterCacheStats};
use crate::offload::OffloadStats;
use crate::policy::dirty::DirtyRegion;
use crate::pressure::SharedMemoryPressure;

/// Size of the headless canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasSize {
    /// Width in device pixels.
    pub width: i32,
    /// Height in device pixels.
    pub height: i32,
}

/// Scripted hardware-offload device attached to the replayed manager.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OffloadScript {
    /// Largest radius the device accepts.
    pub max_radius: f32,
    /// Outputs are produced at `1 / downscale` of the region resolution.
    pub downscale: u32,
    /// Complete every submitted task right after the frame's draw, so outputs are ready for the
    /// next frame.
    pub complete_after_draw: bool,
    /// Complete each task inside the draw that submitted it.
    pub synchronous: bool,
}

impl Default for OffloadScript {
    fn default() -> Self {
        Self {
            max_radius: 50.0,
            downscale: 1,
            complete_after_draw: true,
            synchronous: false,
        }
    }
}

/// Producer-side intent applied before a frame is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMark {
    /// Start forcing cache reuse.
    ForceUse,
    /// Stop forcing cache reuse.
    ReleaseForceUse,
    /// Drop both slots at commit.
    ForceClear,
    /// No further frame is scheduled.
    LastFrame,
    /// Device rotation changed.
    RotationChanged,
    /// Node became occluded.
    Occluded,
    /// Node became visible again.
    Visible,
    /// Filter covers a large part of the screen.
    LargeArea,
    /// Node feeds its output to other nodes.
    EffectNode,
    /// Raise memory pressure for this frame's commit.
    MemoryPressure,
    /// Node left the render tree before this frame.
    OffTree,
    /// Close the offload device.
    OffloadUnavailable,
    /// Reopen the offload device.
    OffloadAvailable,
}

impl FrameMark {
    fn needs_offload(self) -> bool {
        matches!(self, Self::OffloadUnavailable | Self::OffloadAvailable)
    }
}

/// One frame of a [`Scenario`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFrame {
    /// Filter drawn this frame.
    pub filter: FilterKind,
    /// Whether the filter tolerates a skipped refresh.
    #[serde(default)]
    pub can_skip_frame: bool,
    /// Filter rect, the whole canvas when absent.
    #[serde(default)]
    pub rect: Option<DeviceRect>,
    /// Rects that changed since the previous frame.
    #[serde(default)]
    pub dirty: DirtyRegion,
    /// Producer-side intents.
    #[serde(default)]
    pub marks: Vec<FrameMark>,
    /// Run the post-draw compaction hook.
    #[serde(default)]
    pub compact_after_drawing: bool,
}

/// A canvas, a cache configuration and a list of frames.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Headless canvas size.
    pub canvas: CanvasSize,
    /// Cache configuration.
    #[serde(default)]
    pub config: FilterCacheConfig,
    /// Offload device, none when absent.
    #[serde(default)]
    pub offload: Option<OffloadScript>,
    /// Frames, replayed in order.
    pub frames: Vec<ScenarioFrame>,
}

impl Scenario {
    /// Parse and validate a JSON scenario.
    pub fn from_json_str(s: &str) -> FxCacheResult<Self> {
        let scenario: Self = serde_json::from_str(s)
            .map_err(|e| FxCacheError::serde(format!("parse scenario JSON: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse and validate a JSON scenario file.
    pub fn from_path(path: impl AsRef<Path>) -> FxCacheResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FxCacheError::validation(format!("open scenario JSON '{}': {e}", path.display()))
        })?;
        let scenario: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| FxCacheError::serde(format!("parse scenario JSON: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the canvas, the configuration and every frame's filter.
    pub fn validate(&self) -> FxCacheResult<()> {
        if self.canvas.width <= 0 || self.canvas.height <= 0 {
            return Err(FxCacheError::validation(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        self.config.validate()?;
        if let Some(offload) = &self.offload
            && (!offload.max_radius.is_finite() || offload.max_radius < 0.0)
        {
            return Err(FxCacheError::validation(format!(
                "offload max_radius must be finite and >= 0, got {}",
                offload.max_radius
            )));
        }
        for (index, frame) in self.frames.iter().enumerate() {
            FilterDescriptor::new(frame.filter.clone())
                .map_err(|e| FxCacheError::validation(format!("frame {index}: {e}")))?;
            if self.offload.is_none() && frame.marks.iter().any(|m| m.needs_offload()) {
                return Err(FxCacheError::validation(format!(
                    "frame {index}: offload mark without an offload device"
                )));
            }
        }
        Ok(())
    }
}

/// What one replayed frame did.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameReport {
    /// Frame index within the scenario.
    pub frame: usize,
    /// Draw outcome.
    pub outcome: DrawOutcome,
    /// Cache state after drawing (and compaction, when requested).
    pub state: CacheState,
    /// Region the cache is validated for.
    pub cached_region: DeviceRect,
    /// The filtered snapshot came from the offload device.
    pub from_offload: bool,
}

/// Result of a replay.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ReplayReport {
    /// Per-frame reports.
    pub frames: Vec<FrameReport>,
    /// Cache counters at the end of the replay.
    pub stats: FilterCacheStats,
    /// Offload counters, when a device was attached.
    pub offload: Option<OffloadStats>,
    /// Backdrop snapshots taken from the canvas.
    pub canvas_snapshots: usize,
    /// Filter executor invocations.
    pub filter_calls: usize,
}

/// Replay `scenario` from a cold cache.
#[tracing::instrument(level = "debug", skip(scenario), fields(frames = scenario.frames.len()))]
pub fn replay(scenario: &Scenario) -> FxCacheResult<ReplayReport> {
    scenario.validate()?;

    let mut canvas = HeadlessCanvas::new(scenario.canvas.width, scenario.canvas.height);
    let executor = HeadlessFilterExecutor::new();
    let filter_calls = executor.calls();
    let pressure = SharedMemoryPressure::new();
    let mut manager = FilterCacheManager::new(scenario.config.clone(), Box::new(executor))?
        .with_node_id(NodeId(1))
        .with_memory_pressure(Arc::new(pressure.clone()));

    let mut offload: Option<(ScriptedOffloadHandle, bool)> = None;
    if let Some(script) = &scenario.offload {
        let device = ScriptedOffloadDevice::new(script.max_radius);
        let handle = device.handle();
        handle.set_downscale(script.downscale);
        handle.set_synchronous(script.synchronous);
        manager = manager.with_offload_device(Box::new(device))?;
        offload = Some((handle, script.complete_after_draw));
    }

    let mut frames = Vec::with_capacity(scenario.frames.len());
    for (index, frame) in scenario.frames.iter().enumerate() {
        let filter =
            FilterDescriptor::new(frame.filter.clone())?.with_skip_frame(frame.can_skip_frame);

        let mut purge = false;
        for mark in &frame.marks {
            match mark {
                FrameMark::ForceUse => manager.mark_filter_force_use_cache(true),
                FrameMark::ReleaseForceUse => manager.mark_filter_force_use_cache(false),
                FrameMark::ForceClear => manager.mark_filter_force_clear_cache(),
                FrameMark::LastFrame => manager.mark_force_clear_cache_with_last_frame(),
                FrameMark::RotationChanged => manager.mark_rotation_changed(),
                FrameMark::Occluded => manager.mark_node_is_occluded(true),
                FrameMark::Visible => manager.mark_node_is_occluded(false),
                FrameMark::LargeArea => manager.mark_filter_region_is_large_area(),
                FrameMark::EffectNode => manager.mark_effect_node(),
                FrameMark::MemoryPressure => purge = true,
                FrameMark::OffTree => manager.release_cache_off_tree(),
                FrameMark::OffloadUnavailable | FrameMark::OffloadAvailable => {
                    if let Some((handle, _)) = &offload {
                        handle.set_available(*mark == FrameMark::OffloadAvailable);
                    }
                }
            }
        }

        manager.update_cache_state_with_filter_hash(&filter);
        if let Some(rect) = frame.rect {
            manager.update_cache_state_with_filter_region(rect);
        }
        manager.update_cache_state_with_dirty_region(&frame.dirty);

        pressure.request_purge(purge);
        manager.commit();
        pressure.request_purge(false);

        let outcome = manager.draw_filter(&mut canvas, &filter, frame.rect)?;
        if frame.compact_after_drawing {
            manager.compact_filter_cache_after_drawing();
        }
        if let Some((handle, true)) = &offload {
            handle.complete_all();
        }

        tracing::debug!(frame = index, ?outcome, state = ?manager.cache_state(), "frame replayed");
        frames.push(FrameReport {
            frame: index,
            outcome,
            state: manager.cache_state(),
            cached_region: manager.cached_image_region(),
            from_offload: manager.is_filtered_from_offload(),
        });
    }

    Ok(ReplayReport {
        frames,
        stats: manager.stats(),
        offload: manager.offload().map(|adapter| adapter.stats()),
        canvas_snapshots: canvas.snapshots().len(),
        filter_calls: filter_calls.get(),
    })
}

#[cfg(test)]
#[path = "../tests/unit/replay.rs"]
mod tests;
