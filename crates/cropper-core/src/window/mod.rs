//! The crop window: the selection rectangle in view coordinates.
//!
//! [`CropWindowHandler`] owns the rectangle together with everything that
//! constrains it:
//! - the visible image bounds (the rectangle never leaves them)
//! - min/max window size in view pixels
//! - min/max result size in source pixels, converted through the current
//!   source-pixels-per-view-pixel factor
//! - the locked aspect ratio, if any
//!
//! Every mutation goes through [`CropWindowHandler::set_rect`] or
//! [`CropWindowHandler::move_handle`], so [`CropWindowHandler::rect`] always
//! satisfies the constraints.

mod handle;

pub use handle::HandleType;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{CropRect, GEOMETRY_EPSILON};
use crate::options::{AspectRatio, CropOptions};
use crate::transform::CoordinateTransformer;

/// Effective window size limits in view pixels.
///
/// Always satisfies `min <= max` on both axes; with a locked ratio both pairs
/// lie on the ratio diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLimits {
    pub min_width: f64,
    pub min_height: f64,
    pub max_width: f64,
    pub max_height: f64,
}

/// Owns the crop rectangle and keeps it valid.
#[derive(Debug, Clone)]
pub struct CropWindowHandler {
    rect: CropRect,
    bounds: CropRect,
    min_window: (f64, f64),
    max_window: (Option<f64>, Option<f64>),
    min_result: (u32, u32),
    max_result: (u32, u32),
    /// Source pixels per view pixel along x and y.
    scale_factor: (f64, f64),
    aspect: Option<AspectRatio>,
}

impl CropWindowHandler {
    pub fn new(options: &CropOptions) -> Self {
        Self {
            rect: CropRect::default(),
            bounds: CropRect::default(),
            min_window: (options.min_crop_window_width, options.min_crop_window_height),
            max_window: (options.max_crop_window_width, options.max_crop_window_height),
            min_result: (options.min_crop_result_width, options.min_crop_result_height),
            max_result: (options.max_crop_result_width, options.max_crop_result_height),
            scale_factor: (1.0, 1.0),
            aspect: options.locked_aspect_ratio(),
        }
    }

    /// Current crop rectangle in view coordinates.
    pub fn rect(&self) -> CropRect {
        self.rect
    }

    /// Area the rectangle must stay inside.
    pub fn bounds(&self) -> CropRect {
        self.bounds
    }

    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.aspect
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds.width() > 0.0 && self.bounds.height() > 0.0
    }

    /// Replace the allowed bounds and the source-pixels-per-view-pixel factor.
    ///
    /// The current rectangle is not re-clamped; callers follow up with
    /// [`set_rect`](Self::set_rect) once they have mapped it to the new view
    /// placement.
    pub fn set_bounds(&mut self, bounds: CropRect, scale_factor: (f64, f64)) {
        self.bounds = bounds.normalized();
        self.scale_factor = scale_factor;
    }

    /// Take bounds and scale factor from the current image placement.
    pub fn follow(&mut self, transformer: &CoordinateTransformer) {
        let bounds = transformer.visible_bounds().unwrap_or_default();
        self.set_bounds(bounds, transformer.source_pixels_per_view_pixel());
    }

    /// Lock (`Some`) or unlock (`None`) the aspect ratio and re-clamp.
    pub fn set_aspect_ratio(&mut self, aspect: Option<AspectRatio>) -> CropRect {
        self.aspect = aspect;
        let rect = self.rect;
        self.set_rect(rect)
    }

    pub fn set_min_crop_result_size(&mut self, width: u32, height: u32) {
        self.min_result = (width, height);
    }

    pub fn set_max_crop_result_size(&mut self, width: u32, height: u32) {
        self.max_result = (width, height);
    }

    /// Effective size limits for the current bounds, scale and ratio.
    pub fn limits(&self) -> WindowLimits {
        let (fx, fy) = self.scale_factor;
        let mut min_w = self.min_window.0.max(self.min_result.0 as f64 / fx);
        let mut min_h = self.min_window.1.max(self.min_result.1 as f64 / fy);
        let mut max_w = (self.max_result.0 as f64 / fx).min(self.bounds.width().max(0.0));
        let mut max_h = (self.max_result.1 as f64 / fy).min(self.bounds.height().max(0.0));
        if let Some(max) = self.max_window.0 {
            max_w = max_w.min(max);
        }
        if let Some(max) = self.max_window.1 {
            max_h = max_h.min(max);
        }

        if let Some(aspect) = self.aspect {
            let ratio = aspect.value();
            min_w = min_w.max(min_h * ratio);
            min_h = min_w / ratio;
            max_w = max_w.min(max_h * ratio);
            max_h = max_w / ratio;
        }
        if min_w > max_w {
            min_w = max_w;
        }
        if min_h > max_h {
            min_h = max_h;
        }

        WindowLimits {
            min_width: min_w,
            min_height: min_h,
            max_width: max_w,
            max_height: max_h,
        }
    }

    /// Clamp `proposed` to the bounds, the size limits and the locked ratio,
    /// store it and return it.
    ///
    /// The rectangle keeps its center where possible; it is resized about the
    /// center and then translated back inside the bounds.
    pub fn set_rect(&mut self, proposed: CropRect) -> CropRect {
        let proposed = proposed.normalized();
        if !self.has_bounds() {
            self.rect = proposed;
            return proposed;
        }

        let limits = self.limits();
        let mut width = bounded(proposed.width(), limits.min_width, limits.max_width);
        let mut height = bounded(proposed.height(), limits.min_height, limits.max_height);
        if let Some(aspect) = self.aspect {
            (width, height) = fit_ratio(width, height, aspect.value());
            if width < limits.min_width {
                (width, height) = (limits.min_width, limits.min_height);
            }
        }

        let rect = CropRect::from_center(proposed.center(), width, height);
        let rect = translate_into(&rect, &self.bounds);
        if !rect.approx_eq(&proposed, GEOMETRY_EPSILON) {
            debug!(?proposed, clamped = ?rect, "crop window clamped");
        }
        self.rect = rect;
        rect
    }

    /// Move `handle` by `(dx, dy)` view pixels.
    ///
    /// Only the edges attached to the handle move; the opposite edges act as
    /// the pivot. [`HandleType::Center`] translates the whole window and is
    /// pushed back inside the bounds without resizing.
    pub fn move_handle(&mut self, handle: HandleType, dx: f64, dy: f64) -> CropRect {
        if !self.has_bounds() {
            return self.rect;
        }
        let rect = match handle {
            HandleType::Center => translate_into(&self.rect.translated(dx, dy), &self.bounds),
            _ => match self.aspect {
                None => self.resize_free(handle, dx, dy),
                Some(aspect) => self.resize_locked(handle, dx, dy, aspect.value()),
            },
        };
        self.rect = rect;
        rect
    }

    /// Default window: the bounds inset by `padding_ratio` on every side,
    /// narrowed to the locked ratio, centered.
    pub fn initial_rect(&self, padding_ratio: f64) -> CropRect {
        let b = self.bounds;
        let pad_x = b.width() * padding_ratio;
        let pad_y = b.height() * padding_ratio;
        let inner = CropRect::new(b.left + pad_x, b.top + pad_y, b.right - pad_x, b.bottom - pad_y);
        match self.aspect {
            Some(aspect) => {
                let (w, h) = fit_ratio(inner.width(), inner.height(), aspect.value());
                CropRect::from_center(inner.center(), w, h)
            }
            None => inner,
        }
    }

    /// Replace the window with the padded default.
    pub fn reset(&mut self, padding_ratio: f64) -> CropRect {
        let rect = self.initial_rect(padding_ratio);
        self.set_rect(rect)
    }

    fn resize_free(&self, handle: HandleType, dx: f64, dy: f64) -> CropRect {
        let limits = self.limits();
        let (r, b) = (self.rect, self.bounds);
        let mut out = r;
        if handle.moves_left() {
            out.left = bounded(
                r.left + dx,
                b.left.max(r.right - limits.max_width),
                r.right - limits.min_width,
            );
        }
        if handle.moves_right() {
            out.right = bounded(
                r.right + dx,
                r.left + limits.min_width,
                b.right.min(r.left + limits.max_width),
            );
        }
        if handle.moves_top() {
            out.top = bounded(
                r.top + dy,
                b.top.max(r.bottom - limits.max_height),
                r.bottom - limits.min_height,
            );
        }
        if handle.moves_bottom() {
            out.bottom = bounded(
                r.bottom + dy,
                r.top + limits.min_height,
                b.bottom.min(r.top + limits.max_height),
            );
        }
        out
    }

    fn resize_locked(&self, handle: HandleType, dx: f64, dy: f64, ratio: f64) -> CropRect {
        let limits = self.limits();
        let (r, b) = (self.rect, self.bounds);

        let raw_w = r.width() + if handle.moves_left() { -dx } else if handle.moves_right() { dx } else { 0.0 };
        let raw_h = r.height() + if handle.moves_top() { -dy } else if handle.moves_bottom() { dy } else { 0.0 };

        // room available from the pivot edges to the bounds
        let avail_w = if handle.moves_left() {
            r.right - b.left
        } else if handle.moves_right() {
            b.right - r.left
        } else {
            b.width()
        };
        let avail_h = if handle.moves_top() {
            r.bottom - b.top
        } else if handle.moves_bottom() {
            b.bottom - r.top
        } else {
            b.height()
        };

        let width = if handle.is_edge() {
            if handle.moves_left() || handle.moves_right() {
                raw_w
            } else {
                raw_h * ratio
            }
        } else {
            let rel_w = (raw_w - r.width()).abs() / r.width().max(GEOMETRY_EPSILON);
            let rel_h = (raw_h - r.height()).abs() / r.height().max(GEOMETRY_EPSILON);
            if rel_w > rel_h + GEOMETRY_EPSILON {
                raw_w
            } else if rel_h > rel_w + GEOMETRY_EPSILON {
                raw_h * ratio
            } else {
                raw_w.min(raw_h * ratio)
            }
        };

        let max_w = limits.max_width.min(avail_w).min(avail_h * ratio);
        let width = bounded(width, limits.min_width.min(max_w), max_w);
        let height = width / ratio;

        let (left, right) = if handle.moves_left() {
            (r.right - width, r.right)
        } else if handle.moves_right() {
            (r.left, r.left + width)
        } else {
            let cx = r.center().x;
            (cx - width / 2.0, cx + width / 2.0)
        };
        let (top, bottom) = if handle.moves_top() {
            (r.bottom - height, r.bottom)
        } else if handle.moves_bottom() {
            (r.top, r.top + height)
        } else {
            let cy = r.center().y;
            (cy - height / 2.0, cy + height / 2.0)
        };

        // edge handles keep the perpendicular axis centered, shifted back inside
        translate_into(&CropRect::new(left, top, right, bottom), &b)
    }
}

/// `value` limited to `[min, max]`; `max` wins if the range is inverted.
fn bounded(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Largest `ratio`-shaped size that fits inside `width` x `height`.
fn fit_ratio(width: f64, height: f64, ratio: f64) -> (f64, f64) {
    if width / height > ratio {
        (height * ratio, height)
    } else {
        (width, width / ratio)
    }
}

/// Translate `rect` the minimum amount needed to lie inside `bounds`.
fn translate_into(rect: &CropRect, bounds: &CropRect) -> CropRect {
    let dx = if rect.left < bounds.left {
        bounds.left - rect.left
    } else if rect.right > bounds.right {
        bounds.right - rect.right
    } else {
        0.0
    };
    let dy = if rect.top < bounds.top {
        bounds.top - rect.top
    } else if rect.bottom > bounds.bottom {
        bounds.bottom - rect.bottom
    } else {
        0.0
    };
    rect.translated(dx, dy)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
