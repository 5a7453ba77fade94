//! Geometric primitives shared by the crop window, the coordinate transformer
//! and the crop pipeline.
//!
//! # Coordinate System
//!
//! - View coordinates are floating point, origin at the top-left of the view,
//!   y growing downwards.
//! - Source pixel coordinates are integral and refer to the upright (EXIF
//!   corrected) image.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing floating point geometry.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// A point in view or image space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// A rectangle described by its four edges.
///
/// Used for the crop window in view coordinates and for the same window mapped
/// into image pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl CropRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rectangle from its top-left corner and size.
    pub fn from_origin_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    /// Build a rectangle of the given size centered on `center`.
    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        )
    }

    /// Smallest rectangle containing all `points`.
    pub fn bounding(points: &[Point]) -> Self {
        let mut rect = Self::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for p in points {
            rect.left = rect.left.min(p.x);
            rect.top = rect.top.min(p.y);
            rect.right = rect.right.max(p.x);
            rect.bottom = rect.bottom.max(p.y);
        }
        rect
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ]
    }

    /// Returns a copy with `left <= right` and `top <= bottom`.
    pub fn normalized(&self) -> Self {
        Self::new(
            self.left.min(self.right),
            self.top.min(self.bottom),
            self.left.max(self.right),
            self.top.max(self.bottom),
        )
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    /// True when `other` lies inside this rectangle, within `tolerance`.
    pub fn contains_rect(&self, other: &CropRect, tolerance: f64) -> bool {
        other.left >= self.left - tolerance
            && other.top >= self.top - tolerance
            && other.right <= self.right + tolerance
            && other.bottom <= self.bottom + tolerance
    }

    /// Intersection of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &CropRect) -> Option<CropRect> {
        let rect = CropRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }

    /// Edge-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &CropRect, tolerance: f64) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }

    /// Round each edge to the nearest pixel.
    pub fn to_pixel_rect(&self) -> PixelRect {
        let left = self.left.round() as i64;
        let top = self.top.round() as i64;
        let right = self.right.round() as i64;
        let bottom = self.bottom.round() as i64;
        PixelRect {
            x: left,
            y: top,
            width: (right - left).max(1) as u32,
            height: (bottom - top).max(1) as u32,
        }
    }
}

/// Integral rectangle in source pixel space.
///
/// `x`/`y` are signed because a requested region may start outside the source
/// image (see [`crate::decode::BitmapSampler`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp to `[0, width) x [0, height)`; `None` when nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right().min(width as i64);
        let bottom = self.bottom().min(height as i64);
        (right > left && bottom > top)
            .then(|| PixelRect::new(left, top, (right - left) as u32, (bottom - top) as u32))
    }

    pub fn to_crop_rect(&self) -> CropRect {
        CropRect::new(
            self.x as f64,
            self.y as f64,
            self.right() as f64,
            self.bottom() as f64,
        )
    }
}

/// The four corners of the displayed image in view coordinates.
///
/// Point order follows the image's own corners: top-left, top-right,
/// bottom-right, bottom-left of the unrotated source. After a rotation or flip
/// the first point is no longer necessarily the visual top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundPoints(pub [Point; 4]);

impl BoundPoints {
    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// Axis aligned bounding rectangle of the points.
    pub fn bounding_rect(&self) -> CropRect {
        CropRect::bounding(&self.0)
    }

    /// Flat `[x0, y0, x1, y1, ...]` representation.
    pub fn to_array(&self) -> [f64; 8] {
        let mut out = [0.0; 8];
        for (i, p) in self.0.iter().enumerate() {
            out[i * 2] = p.x;
            out[i * 2 + 1] = p.y;
        }
        out
    }

    pub fn approx_eq(&self, other: &BoundPoints, tolerance: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance)
    }
}
