use xxhash_rust::xxh3::Xxh3;

use crate::foundation::error::{FxCacheError, FxCacheResult};

const XXH3_SEED: u64 = 0x5f3c_a9d1_0e7b_4c21;

/// Upper bound on blur radii accepted by descriptors.
pub const MAX_FILTER_RADIUS: f32 = 1024.0;

/// Hash over filter kind, parameters and mask reference.
///
/// Two frames with equal identity may reuse the same filtered snapshot, provided the region and
/// dirty conditions also hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FilterIdentity(pub u64);

/// Filter kinds the cache distinguishes.
///
/// The cache never runs these; it only needs their parameters for identity, capture geometry
/// and offload routing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Gaussian blur.
    Blur {
        /// Blur radius in device pixels.
        radius: f32,
    },
    /// Blur followed by saturation/brightness adjustment and a tint.
    Material {
        /// Blur radius in device pixels.
        radius: f32,
        /// Saturation multiplier.
        saturation: f32,
        /// Brightness multiplier.
        brightness: f32,
        /// Premultiplied RGBA tint, packed `0xRRGGBBAA`.
        mask_color: u32,
    },
    /// 4x5 color matrix, row-major.
    ColorMatrix {
        /// Matrix coefficients.
        matrix: [f32; 20],
    },
    /// Magnifier lens; the backdrop is sampled at an offset.
    Magnifier {
        /// Horizontal sampling offset in device pixels.
        offset_x: i32,
        /// Vertical sampling offset in device pixels.
        offset_y: i32,
        /// Zoom factor.
        zoom: f32,
    },
    /// Refractive distortion; cached output is nudged on redraw.
    Refraction {
        /// Blur radius applied under the distortion.
        radius: f32,
        /// Horizontal refraction nudge in device pixels.
        offset: f32,
    },
}

impl FilterKind {
    /// Blur radius relevant for hardware offload, `0.0` for kinds without a blur stage.
    pub fn radius(&self) -> f32 {
        match self {
            FilterKind::Blur { radius }
            | FilterKind::Material { radius, .. }
            | FilterKind::Refraction { radius, .. } => *radius,
            FilterKind::ColorMatrix { .. } | FilterKind::Magnifier { .. } => 0.0,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            FilterKind::Blur { .. } => 0,
            FilterKind::Material { .. } => 1,
            FilterKind::ColorMatrix { .. } => 2,
            FilterKind::Magnifier { .. } => 3,
            FilterKind::Refraction { .. } => 4,
        }
    }
}

/// A filter as handed to the cache by the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterDescriptor {
    kind: FilterKind,
    mask: Option<u64>,
    can_skip_frame: bool,
    identity: FilterIdentity,
}

impl FilterDescriptor {
    /// Describe a filter of `kind`, validating its parameters.
    pub fn new(kind: FilterKind) -> FxCacheResult<Self> {
        validate_kind(&kind)?;
        let identity = compute_identity(&kind, None);
        Ok(Self {
            kind,
            mask: None,
            can_skip_frame: false,
            identity,
        })
    }

    /// Shorthand for a plain blur.
    pub fn blur(radius: f32) -> FxCacheResult<Self> {
        Self::new(FilterKind::Blur { radius })
    }

    /// Attach a mask reference; masks are part of the identity.
    pub fn with_mask(mut self, mask: u64) -> Self {
        self.mask = Some(mask);
        self.identity = compute_identity(&self.kind, self.mask);
        self
    }

    /// Allow the cache to serve this filter stale for a bounded number of frames.
    pub fn with_skip_frame(mut self, can_skip_frame: bool) -> Self {
        self.can_skip_frame = can_skip_frame;
        self
    }

    /// Filter kind and parameters.
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// Mask reference, if any.
    pub fn mask(&self) -> Option<u64> {
        self.mask
    }

    /// Whether large-area deferral may apply.
    pub fn can_skip_frame(&self) -> bool {
        self.can_skip_frame
    }

    /// Identity hash.
    pub fn identity(&self) -> FilterIdentity {
        self.identity
    }

    /// Blur radius relevant for hardware offload.
    pub fn radius(&self) -> f32 {
        self.kind.radius()
    }

    /// Whether captures should be outset to keep the blur kernel away from edges.
    pub fn needs_outset(&self) -> bool {
        self.radius() > 0.0
    }

    /// Device-space shift applied to the capture rectangle.
    pub fn capture_offset(&self) -> (i32, i32) {
        match self.kind {
            FilterKind::Magnifier {
                offset_x, offset_y, ..
            } => (offset_x, offset_y),
            _ => (0, 0),
        }
    }

    /// Horizontal nudge applied when drawing the filtered image.
    pub fn refraction_offset(&self) -> f32 {
        match self.kind {
            FilterKind::Refraction { offset, .. } => offset,
            _ => 0.0,
        }
    }
}

fn validate_kind(kind: &FilterKind) -> FxCacheResult<()> {
    let radius = kind.radius();
    if !radius.is_finite() || !(0.0..=MAX_FILTER_RADIUS).contains(&radius) {
        return Err(FxCacheError::validation(format!(
            "filter radius must be finite and in [0, {MAX_FILTER_RADIUS}], got {radius}"
        )));
    }
    match kind {
        FilterKind::Material {
            saturation,
            brightness,
            ..
        } => {
            if !saturation.is_finite() || !brightness.is_finite() {
                return Err(FxCacheError::validation(
                    "material saturation/brightness must be finite",
                ));
            }
        }
        FilterKind::ColorMatrix { matrix } => {
            if matrix.iter().any(|v| !v.is_finite()) {
                return Err(FxCacheError::validation(
                    "color matrix coefficients must be finite",
                ));
            }
        }
        FilterKind::Magnifier { zoom, .. } => {
            if !zoom.is_finite() || *zoom <= 0.0 {
                return Err(FxCacheError::validation(
                    "magnifier zoom must be finite and > 0",
                ));
            }
        }
        FilterKind::Refraction { offset, .. } => {
            if !offset.is_finite() {
                return Err(FxCacheError::validation(
                    "refraction offset must be finite",
                ));
            }
        }
        FilterKind::Blur { .. } => {}
    }
    Ok(())
}

fn compute_identity(kind: &FilterKind, mask: Option<u64>) -> FilterIdentity {
    let mut h = StableHasher::new();
    h.write_u8(kind.tag());
    match kind {
        FilterKind::Blur { radius } => h.write_f32(*radius),
        FilterKind::Material {
            radius,
            saturation,
            brightness,
            mask_color,
        } => {
            h.write_f32(*radius);
            h.write_f32(*saturation);
            h.write_f32(*brightness);
            h.write_u32(*mask_color);
        }
        FilterKind::ColorMatrix { matrix } => {
            for v in matrix {
                h.write_f32(*v);
            }
        }
        FilterKind::Magnifier {
            offset_x,
            offset_y,
            zoom,
        } => {
            h.write_u32(*offset_x as u32);
            h.write_u32(*offset_y as u32);
            h.write_f32(*zoom);
        }
        FilterKind::Refraction { radius, offset } => {
            h.write_f32(*radius);
            h.write_f32(*offset);
        }
    }
    match mask {
        Some(m) => {
            h.write_u8(1);
            h.write_u64(m);
        }
        None => h.write_u8(0),
    }
    h.finish()
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        // -0.0 and 0.0 describe the same filter.
        let v = if v == 0.0 { 0.0 } else { v };
        self.write_u32(v.to_bits());
    }

    fn finish(self) -> FilterIdentity {
        FilterIdentity(self.inner.digest())
    }
}

#[cfg(test)]
#[path = "../tests/unit/filter.rs"]
mod tests;
