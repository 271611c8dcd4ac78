use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::error::{FxCacheError, FxCacheResult};

/// Tunables of a [`crate::FilterCacheManager`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterCacheConfig {
    /// Frames a large-area, skippable filter may be served stale while its backdrop churns.
    /// `0` disables deferral.
    pub large_area_refresh_interval: u32,
    /// Margin added around capture rects of filters that sample beyond their bounds.
    pub snapshot_outset_px: u32,
    /// Allow the hardware-offload route when a device is attached.
    pub offload_enabled: bool,
    /// Size of the offload output ring, in-flight tasks included.
    pub offload_output_capacity: usize,
    /// Extra radius cap on top of the device limit, `0.0` for the device limit only.
    pub offload_max_radius: f32,
    /// While occluded, defer soft invalidations and reuse the previous filtered image.
    pub occlusion_serves_stale: bool,
}

impl Default for FilterCacheConfig {
    fn default() -> Self {
        Self {
            large_area_refresh_interval: 3,
            snapshot_outset_px: 1,
            offload_enabled: true,
            offload_output_capacity: 3,
            offload_max_radius: 0.0,
            occlusion_serves_stale: true,
        }
    }
}

impl FilterCacheConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> FxCacheResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| FxCacheError::serde(format!("parse filter cache config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> FxCacheResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FxCacheError::validation(format!("open config JSON '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| FxCacheError::serde(format!("parse filter cache config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    pub fn validate(&self) -> FxCacheResult<()> {
        if self.offload_output_capacity == 0 {
            return Err(FxCacheError::validation(
                "offload_output_capacity must be >= 1",
            ));
        }
        if !self.offload_max_radius.is_finite() || self.offload_max_radius < 0.0 {
            return Err(FxCacheError::validation(format!(
                "offload_max_radius must be finite and >= 0, got {}",
                self.offload_max_radius
            )));
        }
        if self.snapshot_outset_px > 64 {
            return Err(FxCacheError::validation(format!(
                "snapshot_outset_px must be <= 64, got {}",
                self.snapshot_outset_px
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
