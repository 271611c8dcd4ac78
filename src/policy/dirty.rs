use smallvec::SmallVec;

use crate::foundation::core::DeviceRect;

/// Device-space rectangles known to have changed since the last frame.
///
/// Supplied by the pipeline driver. Empty rectangles are dropped on insertion, so an empty
/// region never intersects anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DirtyRegion {
    rects: SmallVec<[DeviceRect; 4]>,
}

impl DirtyRegion {
    /// No dirty pixels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region made of `rects` (empty ones ignored).
    pub fn from_rects(rects: impl IntoIterator<Item = DeviceRect>) -> Self {
        let mut out = Self::new();
        for r in rects {
            out.push(r);
        }
        out
    }

    /// Add a rectangle.
    pub fn push(&mut self, rect: DeviceRect) {
        if !rect.is_empty() {
            self.rects.push(rect);
        }
    }

    /// Merge `other` into `self`.
    pub fn extend(&mut self, other: &DirtyRegion) {
        self.rects.extend(other.rects.iter().copied());
    }

    /// Return `true` when no pixel is dirty.
    pub fn is_empty(&self) -> bool {
        self.rects.iter().all(|r| r.is_empty())
    }

    /// Return `true` when at least one dirty pixel falls inside `rect`.
    pub fn intersects(&self, rect: DeviceRect) -> bool {
        !rect.is_empty() && self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Dirty rectangles.
    pub fn rects(&self) -> &[DeviceRect] {
        &self.rects
    }

    /// Forget every rectangle.
    pub fn clear(&mut self) {
        self.rects.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/policy/dirty.rs"]
mod tests;
