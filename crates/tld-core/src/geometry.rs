//! Geometric primitives: integer and real rectangles, sizes, overlap metrics.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Minimum scanning step along either axis, in pixels.
pub const MIN_SCAN_STEP: i32 = 4;

/// Integer 2D size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Size multiplied by `scale`, truncated toward zero.
    #[inline]
    pub fn scaled(self, scale: f64) -> Self {
        Self::new(
            (self.width as f64 * scale) as i32,
            (self.height as f64 * scale) as i32,
        )
    }

    /// Scanning step for a window of this size: `overlap` of each side,
    /// never below [`MIN_SCAN_STEP`].
    #[inline]
    pub fn scan_step(self, overlap: f64) -> Self {
        Self::new(
            ((self.width as f64 * overlap) as i32).max(MIN_SCAN_STEP),
            ((self.height as f64 * overlap) as i32).max(MIN_SCAN_STEP),
        )
    }

    /// True when a window of this size fits inside `frame`.
    #[inline]
    pub fn fits_in(self, frame: Size) -> bool {
        self.width <= frame.width && self.height <= frame.height
    }
}

/// Axis-aligned integer rectangle (a "strobe").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    #[inline]
    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub fn area(self) -> i64 {
        self.size().area()
    }

    #[inline]
    pub fn right(self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> DVec2 {
        DVec2::new(
            self.x as f64 + 0.5 * self.width as f64,
            self.y as f64 + 0.5 * self.height as f64,
        )
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection-over-union with another rectangle.
    ///
    /// Symmetric, `0.0` for disjoint rectangles and `1.0` for identical
    /// rectangles of positive area.
    pub fn iou(self, other: Self) -> f64 {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = self.right().min(other.right());
        let y_max = self.bottom().min(other.bottom());
        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }
        let intersection = (x_max - x_min) as f64 * (y_max - y_min) as f64;
        let union = self.area() as f64 + other.area() as f64 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// True if the rectangle touches or crosses any border of a frame of
    /// size `frame`.
    pub fn is_outside(self, frame: Size) -> bool {
        self.x < 0
            || self.x >= frame.width
            || self.y < 0
            || self.y >= frame.height
            || self.right() < 0
            || self.right() > frame.width
            || self.bottom() < 0
            || self.bottom() > frame.height
    }

    /// Clip the rectangle into a frame of size `frame`.
    ///
    /// Both corners are clamped, so the result is always contained in the
    /// frame and a rectangle already inside is returned unchanged.
    pub fn adjust_to_frame(self, frame: Size) -> Self {
        let clamp_x = |v: i32| v.clamp(0, frame.width.max(0));
        let clamp_y = |v: i32| v.clamp(0, frame.height.max(0));
        let x1 = clamp_x(self.x);
        let y1 = clamp_y(self.y);
        let x2 = clamp_x(self.right()).max(x1);
        let y2 = clamp_y(self.bottom()).max(y1);
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }
}

impl From<Rect2d> for Rect {
    /// Rounds every component to the nearest integer.
    fn from(r: Rect2d) -> Self {
        Self::new(
            r.x.round() as i32,
            r.y.round() as i32,
            r.width.round() as i32,
            r.height.round() as i32,
        )
    }
}

/// Axis-aligned rectangle with real coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect2d {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect2d {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: DVec2, size: DVec2) -> Self {
        Self::new(
            center.x - size.x * 0.5,
            center.y - size.y * 0.5,
            size.x,
            size.y,
        )
    }

    #[inline]
    pub fn center(self) -> DVec2 {
        DVec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    #[inline]
    pub fn size(self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    #[inline]
    pub fn area(self) -> f64 {
        self.width * self.height
    }
}

impl From<Rect> for Rect2d {
    fn from(r: Rect) -> Self {
        Self::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64)
    }
}

/// Number of scan positions along each axis for a window of `bbox * scale`
/// moving over `frame` with `step`: `1 + (frame - window) / step`, or zero
/// when the window does not fit.
pub fn scan_position_count(frame: Size, bbox: Size, scale: f64, step: Size) -> Size {
    let window = bbox.scaled(scale);
    let axis = |frame_dim: i32, window_dim: i32, step_dim: i32| {
        let area = frame_dim - window_dim;
        if area < 0 || step_dim <= 0 {
            0
        } else {
            1 + area / step_dim
        }
    };
    Size::new(
        axis(frame.width, window.width, step.width),
        axis(frame.height, window.height, step.height),
    )
}
