pub use kurbo::{Affine, Rect, Vec2};

/// Integer device-space rectangle, half-open: `[left, right) x [top, bottom)`.
///
/// A rectangle whose right edge is not past its left edge (or bottom not past top) is empty.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct DeviceRect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl DeviceRect {
    /// The canonical empty rectangle.
    pub const EMPTY: Self = Self {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Build a rectangle from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rectangle from origin and size.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Smallest integer rectangle covering `rect`.
    pub fn round_out(rect: Rect) -> Self {
        Self::new(
            rect.x0.floor() as i32,
            rect.y0.floor() as i32,
            rect.x1.ceil() as i32,
            rect.y1.ceil() as i32,
        )
    }

    /// Width in pixels, `0` for inverted rectangles.
    pub fn width(self) -> i32 {
        (self.right.saturating_sub(self.left)).max(0)
    }

    /// Height in pixels, `0` for inverted rectangles.
    pub fn height(self) -> i32 {
        (self.bottom.saturating_sub(self.top)).max(0)
    }

    /// Covered pixel count.
    pub fn area(self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Return `true` when no pixel is covered.
    pub fn is_empty(self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Intersection of both rectangles, [`DeviceRect::EMPTY`] when they do not overlap.
    pub fn intersect(self, other: Self) -> Self {
        let out = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if out.is_empty() { Self::EMPTY } else { out }
    }

    /// Return `true` when both rectangles share at least one pixel.
    pub fn intersects(self, other: Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Return `true` when `other` is non-empty and lies fully inside `self`.
    pub fn contains(self, other: Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// Grow every edge outwards by `px` (shrinks for negative values).
    pub fn outset(self, px: i32) -> Self {
        Self::new(
            self.left.saturating_sub(px),
            self.top.saturating_sub(px),
            self.right.saturating_add(px),
            self.bottom.saturating_add(px),
        )
    }

    /// Translate by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }

    /// Convert to a floating-point `kurbo` rectangle.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }
}

impl std::fmt::Display for DeviceRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left,
            self.top,
            self.width(),
            self.height()
        )
    }
}

/// Identity of the GPU context (render thread / device queue) that owns an image.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct GpuContextId(pub u64);

/// Scene-graph node owning a cache manager, used for log correlation only.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u64);

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
