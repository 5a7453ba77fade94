//! Automatic zoom that keeps the crop window comfortably visible.
//!
//! When the window becomes small relative to the view the image is zoomed in
//! so the window fills about two thirds of it; when the window grows large the
//! image is zoomed back out. The change is animated over a short fixed
//! duration with an accelerate-decelerate curve, and the crop window stays on
//! the same image content throughout.

use std::f64::consts::PI;
use std::time::Duration;

use tracing::debug;

use crate::geometry::{CropRect, Point};
use crate::options::CropOptions;
use crate::transform::CoordinateTransformer;
use crate::window::CropWindowHandler;

/// Window smaller than this fraction of the view (both axes) triggers zoom in.
const ZOOM_IN_TRIGGER: f64 = 0.5;
/// Fraction of the view the window fills after zooming in.
const ZOOM_IN_FILL: f64 = 0.64;
/// Window larger than this fraction of the view (either axis) triggers zoom out.
const ZOOM_OUT_TRIGGER: f64 = 0.65;
/// Fraction of the view the window fills after zooming out.
const ZOOM_OUT_FILL: f64 = 0.51;

/// Duration of one auto-zoom animation.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(300);

/// Accelerate-decelerate easing: slow at both ends, `0 -> 0`, `1 -> 1`.
pub fn ease(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    ((t + 1.0) * PI).cos() / 2.0 + 0.5
}

/// Zoom and offset the image should end up at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTarget {
    pub zoom: f64,
    pub offset: Point,
}

#[derive(Debug, Clone, Copy)]
struct ZoomAnimation {
    from: ZoomTarget,
    to: ZoomTarget,
    /// Crop window in source pixels; re-projected every frame.
    image_rect: CropRect,
    elapsed: Duration,
}

/// Decides on and animates auto-zoom.
#[derive(Debug, Clone)]
pub struct AutoZoomController {
    enabled: bool,
    duration: Duration,
    animation: Option<ZoomAnimation>,
}

impl AutoZoomController {
    pub fn new(options: &CropOptions) -> Self {
        Self {
            enabled: options.auto_zoom_enabled,
            duration: ANIMATION_DURATION,
            animation: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.animation = None;
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Target placement for `crop` (view coordinates), `None` when the current
    /// zoom is already comfortable.
    pub fn target(&self, transformer: &CoordinateTransformer, crop: &CropRect) -> Option<ZoomTarget> {
        let (view_w, view_h) = transformer.view_size();
        let zoom = transformer.zoom();
        let max_zoom = transformer.max_zoom();
        let (crop_w, crop_h) = (crop.width(), crop.height());
        if crop_w <= 0.0 || crop_h <= 0.0 {
            return None;
        }

        let mut new_zoom = zoom;
        if zoom < max_zoom && crop_w < view_w * ZOOM_IN_TRIGGER && crop_h < view_h * ZOOM_IN_TRIGGER {
            new_zoom = max_zoom
                .min(view_w / (crop_w / zoom / ZOOM_IN_FILL))
                .min(view_h / (crop_h / zoom / ZOOM_IN_FILL));
        }
        if zoom > 1.0 && (crop_w > view_w * ZOOM_OUT_TRIGGER || crop_h > view_h * ZOOM_OUT_TRIGGER) {
            new_zoom = (view_w / (crop_w / zoom / ZOOM_OUT_FILL))
                .min(view_h / (crop_h / zoom / ZOOM_OUT_FILL))
                .max(1.0);
        }
        if (new_zoom - zoom).abs() < 1e-9 {
            return None;
        }

        let focus = transformer.map_to_image(crop.center());
        Some(ZoomTarget {
            zoom: new_zoom,
            offset: transformer.centering_offset(new_zoom, focus),
        })
    }

    /// Start an animation if the crop window calls for one.
    ///
    /// Returns `true` when an animation was started. Nothing happens while
    /// disabled or while a pinch is in progress.
    pub fn update(
        &mut self,
        transformer: &CoordinateTransformer,
        window: &CropWindowHandler,
        pinching: bool,
    ) -> bool {
        if !self.enabled || pinching {
            return false;
        }
        let crop = window.rect();
        let Some(to) = self.target(transformer, &crop) else {
            return false;
        };
        let from = ZoomTarget {
            zoom: transformer.zoom(),
            offset: transformer.state().offset,
        };
        debug!(from = from.zoom, to = to.zoom, "auto-zoom started");
        self.animation = Some(ZoomAnimation {
            from,
            to,
            image_rect: transformer.to_image_space(&crop),
            elapsed: Duration::ZERO,
        });
        true
    }

    /// Advance the running animation by `dt`, moving the image and the crop
    /// window. Returns `true` while the animation is still running.
    pub fn tick(
        &mut self,
        dt: Duration,
        transformer: &mut CoordinateTransformer,
        window: &mut CropWindowHandler,
    ) -> bool {
        let Some(mut animation) = self.animation.take() else {
            return false;
        };
        animation.elapsed += dt;
        let t = animation.elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let k = ease(t);
        let zoom = animation.from.zoom + (animation.to.zoom - animation.from.zoom) * k;
        let offset = animation.from.offset.lerp(animation.to.offset, k);
        transformer.set_zoom_and_offset(zoom, offset);
        window.follow(transformer);
        window.set_rect(transformer.to_view_space(&animation.image_rect));

        if t >= 1.0 {
            debug!(zoom, "auto-zoom finished");
            false
        } else {
            self.animation = Some(animation);
            true
        }
    }

    /// Jump to the end of the running animation.
    pub fn finish(&mut self, transformer: &mut CoordinateTransformer, window: &mut CropWindowHandler) {
        self.tick(self.duration, transformer, window);
        self.animation = None;
    }

    /// Drop the running animation where it is.
    pub fn cancel(&mut self) {
        self.animation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScaleType;
    use approx::assert_relative_eq;

    fn setup(crop: CropRect) -> (AutoZoomController, CoordinateTransformer, CropWindowHandler) {
        let options = CropOptions::default();
        let transformer = CoordinateTransformer::new((1000, 1000), (1000.0, 1000.0), ScaleType::FitCenter, 4.0);
        let mut window = CropWindowHandler::new(&options);
        window.follow(&transformer);
        window.set_rect(crop);
        (AutoZoomController::new(&options), transformer, window)
    }

    #[test]
    fn test_ease_endpoints() {
        assert_relative_eq!(ease(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ease(0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(ease(1.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ease(3.0), 1.0, epsilon = 1e-12);
        assert!(ease(0.25) < 0.25);
    }

    #[test]
    fn test_small_window_zooms_in() {
        let (zoom, transformer, window) = setup(CropRect::new(400.0, 400.0, 600.0, 600.0));
        let target = zoom.target(&transformer, &window.rect()).unwrap();
        assert_relative_eq!(target.zoom, 3.2, epsilon = 1e-9);
        assert_relative_eq!(target.offset.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zoom_in_is_capped() {
        let (zoom, transformer, window) = setup(CropRect::new(480.0, 480.0, 530.0, 530.0));
        let target = zoom.target(&transformer, &window.rect()).unwrap();
        assert_eq!(target.zoom, 4.0);
    }

    #[test]
    fn test_comfortable_window_leaves_zoom() {
        let (zoom, transformer, window) = setup(CropRect::new(200.0, 200.0, 800.0, 800.0));
        assert!(zoom.target(&transformer, &window.rect()).is_none());
    }

    #[test]
    fn test_large_window_zooms_out() {
        let (zoom, mut transformer, mut window) = setup(CropRect::new(400.0, 400.0, 600.0, 600.0));
        transformer.set_zoom(3.2, Point::new(500.0, 500.0));
        window.follow(&transformer);
        let rect = window.set_rect(CropRect::new(50.0, 50.0, 950.0, 950.0));
        let target = zoom.target(&transformer, &rect).unwrap();
        assert_relative_eq!(target.zoom, 3.2 * 0.51 / 0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_animation_keeps_window_on_content() {
        let (mut zoom, mut transformer, mut window) = setup(CropRect::new(400.0, 400.0, 600.0, 600.0));
        let image_rect = transformer.to_image_space(&window.rect());
        assert!(zoom.update(&transformer, &window, false));

        assert!(zoom.tick(Duration::from_millis(150), &mut transformer, &mut window));
        let halfway = transformer.zoom();
        assert!(halfway > 1.0 && halfway < 3.2);
        assert!(transformer.to_image_space(&window.rect()).approx_eq(&image_rect, 1e-6));

        assert!(!zoom.tick(Duration::from_millis(150), &mut transformer, &mut window));
        assert!(!zoom.is_animating());
        assert_relative_eq!(transformer.zoom(), 3.2, epsilon = 1e-9);
        assert!(window
            .rect()
            .approx_eq(&CropRect::new(180.0, 180.0, 820.0, 820.0), 1e-6));
    }

    #[test]
    fn test_disabled_or_pinching_does_nothing() {
        let (mut zoom, transformer, window) = setup(CropRect::new(400.0, 400.0, 600.0, 600.0));
        assert!(!zoom.update(&transformer, &window, true));
        zoom.set_enabled(false);
        assert!(!zoom.update(&transformer, &window, false));
        assert!(!zoom.is_animating());
    }

    #[test]
    fn test_finish_jumps_to_target() {
        let (mut zoom, mut transformer, mut window) = setup(CropRect::new(400.0, 400.0, 600.0, 600.0));
        zoom.update(&transformer, &window, false);
        zoom.finish(&mut transformer, &mut window);
        assert_relative_eq!(transformer.zoom(), 3.2, epsilon = 1e-9);
        assert!(!zoom.is_animating());
    }
}
