//! Single-threaded editing state.

use std::time::Duration;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::compose::{OutputComposer, OutputTarget, OutputTransform};
use crate::crop::{CropJob, CropPlan, CroppedImage};
use crate::decode::{BitmapSampler, LoadedImage};
use crate::error::{ConfigError, CropError, CropFailureKind};
use crate::geometry::{BoundPoints, CropRect, PixelRect, Point, GEOMETRY_EPSILON};
use crate::gesture::{GestureController, GestureOutcome, PointerEvent};
use crate::options::{AspectRatio, CropOptions, CropShape, Guidelines, ScaleType};
use crate::transform::CoordinateTransformer;
use crate::window::{CropWindowHandler, HandleType};
use crate::zoom::AutoZoomController;

/// Geometry of one editing session: the loaded image, its placement in the
/// view, the crop window and the gesture and auto-zoom state.
///
/// Every mutation happens on the caller's thread. The editor becomes
/// interactive once it has both an image and a view size; until then the
/// geometry accessors return `None`.
#[derive(Debug)]
pub struct CropEditor {
    options: CropOptions,
    image: Option<LoadedImage>,
    view_size: Option<(f64, f64)>,
    transformer: Option<CoordinateTransformer>,
    window: CropWindowHandler,
    gesture: GestureController,
    auto_zoom: AutoZoomController,
    /// Window rectangle a rotation or flip was asked to keep, and the clamped
    /// rectangle it produced.
    reoriented: Option<(CropRect, CropRect)>,
}

impl CropEditor {
    /// Create an editor; options are validated first.
    pub fn new(options: CropOptions) -> Result<Self, CropError> {
        options.validate()?;
        Ok(Self {
            window: CropWindowHandler::new(&options),
            gesture: GestureController::new(&options),
            auto_zoom: AutoZoomController::new(&options),
            options,
            image: None,
            view_size: None,
            transformer: None,
            reoriented: None,
        })
    }

    /// Current options, including every change made through the setters.
    pub fn options(&self) -> &CropOptions {
        &self.options
    }

    // -------------------------------------------------------------------------
    // Image and view
    // -------------------------------------------------------------------------

    /// Show `image`, replacing any previous one and its transform.
    ///
    /// The initial rotation, flips and crop rectangle come from the options.
    pub fn set_image(&mut self, image: LoadedImage) {
        debug!(reference = %image.reference, "image set");
        self.image = Some(image);
        self.transformer = None;
        self.initialize();
    }

    /// Back to the empty state.
    pub fn clear_image(&mut self) {
        self.image = None;
        self.transformer = None;
        self.reoriented = None;
        self.auto_zoom.cancel();
        self.window = CropWindowHandler::new(&self.options);
        self.gesture = GestureController::new(&self.options);
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Set the size of the view the image is shown in. The crop window stays
    /// on the same image content.
    pub fn set_view_size(&mut self, width: f64, height: f64) {
        if !(width > 0.0 && height > 0.0) {
            return;
        }
        self.view_size = Some((width, height));
        if self.transformer.is_some() {
            self.preserving_window(|t| t.set_view_size(width, height));
            self.refresh_auto_zoom();
        } else {
            self.initialize();
        }
    }

    pub fn view_size(&self) -> Option<(f64, f64)> {
        self.view_size
    }

    pub fn transformer(&self) -> Option<&CoordinateTransformer> {
        self.transformer.as_ref()
    }

    pub fn window(&self) -> &CropWindowHandler {
        &self.window
    }

    fn initialize(&mut self) {
        let (Some(image), Some(view)) = (&self.image, self.view_size) else {
            return;
        };
        let options = &self.options;
        let mut transformer = CoordinateTransformer::new(
            image.dimensions(),
            view,
            options.scale_type,
            options.max_zoom as f64,
        );
        if let Some(rotation) = options.initial_rotation {
            transformer.rotate(rotation);
        }
        if options.flip_horizontally {
            transformer.flip_horizontal();
        }
        if options.flip_vertically {
            transformer.flip_vertical();
        }

        self.auto_zoom.cancel();
        self.reoriented = None;
        self.gesture = GestureController::new(options);
        self.window = CropWindowHandler::new(options);
        self.window.follow(&transformer);
        match options.initial_crop_rect {
            Some(rect) => {
                self.window.set_rect(transformer.to_view_space(&rect.to_crop_rect()));
            }
            None => {
                self.window.reset(options.initial_padding_ratio);
            }
        }
        debug!(rect = ?self.window.rect(), "crop window initialized");
        self.transformer = Some(transformer);
    }

    /// Apply `change` to the transform, keeping the crop window on the same
    /// image content and re-clamping it to the new bounds.
    fn preserving_window(&mut self, change: impl FnOnce(&mut CoordinateTransformer)) {
        let Some(transformer) = self.transformer.as_mut() else {
            return;
        };
        self.auto_zoom.cancel();
        let image_rect = transformer.to_image_space(&self.window.rect());
        change(transformer);
        self.window.follow(transformer);
        self.window.set_rect(transformer.to_view_space(&image_rect));
    }

    /// Apply a rotation or flip, keeping the crop window where it is on
    /// screen and re-clamping it to the new bounds.
    ///
    /// While the window is untouched between changes it is re-clamped from
    /// the rectangle first asked for, so turning back restores it even when
    /// an intermediate orientation had to shrink it.
    fn reorient(&mut self, change: impl FnOnce(&mut CoordinateTransformer)) {
        let Some(transformer) = self.transformer.as_mut() else {
            return;
        };
        self.auto_zoom.cancel();
        let current = self.window.rect();
        let placed = match self.reoriented {
            Some((placed, produced)) if produced.approx_eq(&current, GEOMETRY_EPSILON) => placed,
            _ => current,
        };
        change(transformer);
        self.window.follow(transformer);
        let produced = self.window.set_rect(placed);
        self.reoriented = Some((placed, produced));
        self.refresh_auto_zoom();
    }

    fn refresh_auto_zoom(&mut self) {
        if let Some(transformer) = &self.transformer {
            self.auto_zoom
                .update(transformer, &self.window, self.gesture.is_pinching());
        }
    }

    // -------------------------------------------------------------------------
    // Crop window
    // -------------------------------------------------------------------------

    /// Crop window in view coordinates.
    pub fn crop_rect(&self) -> Option<CropRect> {
        self.transformer.as_ref().map(|_| self.window.rect())
    }

    /// Crop window in upright source pixels.
    pub fn crop_rect_in_image(&self) -> Option<PixelRect> {
        let transformer = self.transformer.as_ref()?;
        Some(transformer.to_image_space(&self.window.rect()).to_pixel_rect())
    }

    /// Crop window corners in source pixels, flattened.
    pub fn crop_points(&self) -> Option<[f64; 8]> {
        let transformer = self.transformer.as_ref()?;
        Some(BoundPoints(transformer.to_image_points(&self.window.rect())).to_array())
    }

    /// Propose a crop window in view coordinates; returns the clamped result.
    pub fn set_crop_rect(&mut self, rect: CropRect) -> Option<CropRect> {
        self.transformer.as_ref()?;
        self.auto_zoom.cancel();
        let rect = self.window.set_rect(rect);
        self.refresh_auto_zoom();
        Some(rect)
    }

    /// Restore a crop window given in upright source pixels.
    pub fn set_crop_rect_in_image(&mut self, rect: PixelRect) -> Option<CropRect> {
        let view_rect = self.transformer.as_ref()?.to_view_space(&rect.to_crop_rect());
        self.set_crop_rect(view_rect)
    }

    /// Replace the crop window with the padded default and drop user zoom.
    pub fn reset_crop_rect(&mut self) -> Option<CropRect> {
        let transformer = self.transformer.as_mut()?;
        self.auto_zoom.cancel();
        transformer.reset_zoom();
        self.window.follow(transformer);
        let rect = self.window.reset(self.options.initial_padding_ratio);
        self.refresh_auto_zoom();
        Some(rect)
    }

    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.window.aspect_ratio()
    }

    /// The configured ratio, whether or not it is locked.
    pub fn configured_aspect_ratio(&self) -> AspectRatio {
        self.options.aspect_ratio
    }

    /// Lock the crop window to `x:y`.
    pub fn set_aspect_ratio(&mut self, x: u32, y: u32) -> Result<(), CropError> {
        if x == 0 || y == 0 {
            return Err(ConfigError::InvalidAspectRatio { x, y }.into());
        }
        self.options.aspect_ratio = AspectRatio::new(x, y);
        self.set_fixed_aspect_ratio(true);
        Ok(())
    }

    /// Lock or unlock the configured ratio.
    pub fn set_fixed_aspect_ratio(&mut self, fixed: bool) {
        self.options.fix_aspect_ratio = fixed;
        self.auto_zoom.cancel();
        self.window.set_aspect_ratio(self.options.locked_aspect_ratio());
        self.refresh_auto_zoom();
    }

    pub fn clear_aspect_ratio(&mut self) {
        self.set_fixed_aspect_ratio(false);
    }

    pub fn set_min_crop_result_size(&mut self, width: u32, height: u32) {
        self.options.min_crop_result_width = width;
        self.options.min_crop_result_height = height;
        self.window.set_min_crop_result_size(width, height);
        self.reclamp_window();
    }

    pub fn set_max_crop_result_size(&mut self, width: u32, height: u32) {
        self.options.max_crop_result_width = width;
        self.options.max_crop_result_height = height;
        self.window.set_max_crop_result_size(width, height);
        self.reclamp_window();
    }

    fn reclamp_window(&mut self) {
        if self.transformer.is_some() {
            self.auto_zoom.cancel();
            let rect = self.window.rect();
            self.window.set_rect(rect);
            self.refresh_auto_zoom();
        }
    }

    // -------------------------------------------------------------------------
    // Image transform
    // -------------------------------------------------------------------------

    /// Rotate clockwise by `degrees` (negative turns counter-clockwise).
    ///
    /// Returns `false` when rotation is disabled or no image is shown, and
    /// for negative angles unless counter rotation is allowed.
    pub fn rotate_image(&mut self, degrees: i32) -> bool {
        if !self.options.allow_rotation || self.transformer.is_none() {
            return false;
        }
        if degrees < 0 && !self.options.allow_counter_rotation {
            return false;
        }
        self.reorient(|t| t.rotate(degrees));
        true
    }

    /// Rotate one step clockwise.
    pub fn rotate_clockwise(&mut self) -> bool {
        self.rotate_image(self.options.rotation_step_degrees as i32)
    }

    /// Rotate one step counter-clockwise; needs `allow_counter_rotation`.
    pub fn rotate_counter_clockwise(&mut self) -> bool {
        self.rotate_image(-(self.options.rotation_step_degrees as i32))
    }

    pub fn flip_image_horizontally(&mut self) -> bool {
        if !self.options.allow_flipping || self.transformer.is_none() {
            return false;
        }
        self.reorient(|t| t.flip_horizontal());
        true
    }

    pub fn flip_image_vertically(&mut self) -> bool {
        if !self.options.allow_flipping || self.transformer.is_none() {
            return false;
        }
        self.reorient(|t| t.flip_vertical());
        true
    }

    /// Zoom about `focal` (view coordinates); the crop window follows the
    /// image content.
    pub fn set_zoom(&mut self, scale: f64, focal: Point) {
        self.preserving_window(|t| t.set_zoom(scale, focal));
    }

    pub fn rotation(&self) -> u32 {
        self.transformer.as_ref().map_or(0, |t| t.rotation())
    }

    pub fn is_flipped_horizontally(&self) -> bool {
        self.transformer
            .as_ref()
            .is_some_and(|t| t.is_flipped_horizontally())
    }

    pub fn is_flipped_vertically(&self) -> bool {
        self.transformer
            .as_ref()
            .is_some_and(|t| t.is_flipped_vertically())
    }

    pub fn zoom(&self) -> f64 {
        self.transformer.as_ref().map_or(1.0, |t| t.zoom())
    }

    pub fn scale_type(&self) -> ScaleType {
        self.options.scale_type
    }

    pub fn set_scale_type(&mut self, scale_type: ScaleType) {
        self.options.scale_type = scale_type;
        self.preserving_window(|t| t.set_scale_type(scale_type));
        self.refresh_auto_zoom();
    }

    // -------------------------------------------------------------------------
    // Presentation flags
    // -------------------------------------------------------------------------

    pub fn crop_shape(&self) -> CropShape {
        self.options.crop_shape
    }

    pub fn set_crop_shape(&mut self, shape: CropShape) {
        self.options.crop_shape = shape;
    }

    pub fn guidelines(&self) -> Guidelines {
        self.options.guidelines
    }

    pub fn set_guidelines(&mut self, guidelines: Guidelines) {
        self.options.guidelines = guidelines;
    }

    pub fn is_auto_zoom_enabled(&self) -> bool {
        self.auto_zoom.is_enabled()
    }

    pub fn set_auto_zoom_enabled(&mut self, enabled: bool) {
        self.options.auto_zoom_enabled = enabled;
        self.auto_zoom.set_enabled(enabled);
    }

    pub fn set_multi_touch_enabled(&mut self, enabled: bool) {
        self.options.multi_touch_enabled = enabled;
        self.gesture.set_multi_touch_enabled(enabled);
    }

    // -------------------------------------------------------------------------
    // Input and animation
    // -------------------------------------------------------------------------

    /// Handle being dragged, if any.
    pub fn active_handle(&self) -> Option<HandleType> {
        self.gesture.active_handle()
    }

    /// Handle under `point`, if an image is shown.
    pub fn hit_test(&self, point: Point) -> Option<HandleType> {
        self.transformer.as_ref()?;
        self.gesture.hit_test(&self.window.rect(), point)
    }

    /// Feed one pointer event.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> GestureOutcome {
        let Some(transformer) = self.transformer.as_mut() else {
            return GestureOutcome::Ignored;
        };
        let outcome = self.gesture.handle_event(event, &mut self.window);
        match outcome {
            GestureOutcome::HandleGrabbed { .. } | GestureOutcome::PinchStarted => {
                self.auto_zoom.cancel();
            }
            GestureOutcome::Pinch { scale, focal } => {
                transformer.set_zoom(transformer.zoom() * scale, focal);
                self.window.follow(transformer);
                let rect = self.window.rect();
                self.window.set_rect(rect);
            }
            GestureOutcome::PinchEnded => {
                transformer.clamp_offset();
                self.window.follow(transformer);
                let rect = self.window.rect();
                self.window.set_rect(rect);
            }
            GestureOutcome::Released => {
                self.auto_zoom
                    .update(transformer, &self.window, self.gesture.is_pinching());
            }
            GestureOutcome::Ignored | GestureOutcome::WindowChanged { .. } => {}
        }
        outcome
    }

    pub fn is_animating(&self) -> bool {
        self.auto_zoom.is_animating()
    }

    /// Advance the auto-zoom animation; `true` while it is still running.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(transformer) = self.transformer.as_mut() else {
            return false;
        };
        self.auto_zoom.tick(dt, transformer, &mut self.window)
    }

    /// Jump to the end of the running auto-zoom.
    pub fn finish_animation(&mut self) {
        if let Some(transformer) = self.transformer.as_mut() {
            self.auto_zoom.finish(transformer, &mut self.window);
        }
    }

    // -------------------------------------------------------------------------
    // Cropping
    // -------------------------------------------------------------------------

    /// Geometry of a crop of the current window.
    pub fn plan_crop(&self) -> Result<CropPlan, CropError> {
        let (Some(image), Some(transformer)) = (&self.image, &self.transformer) else {
            return Err(CropError::CropFailure(CropFailureKind::NoImage));
        };
        let transform = OutputTransform::new(
            transformer.rotation(),
            transformer.is_flipped_horizontally(),
            transformer.is_flipped_vertically(),
        );
        Ok(CropPlan::new(
            image.reference.clone(),
            image.dimensions(),
            transformer.to_image_points(&self.window.rect()),
            transform,
            &self.options.output,
        ))
    }

    /// Package a crop of the current window for execution on any thread.
    pub fn crop_job(&self, target: OutputTarget) -> Result<CropJob, CropError> {
        let plan = self.plan_crop()?;
        let decoder = match &self.image {
            Some(image) => image.decoder.clone(),
            None => return Err(CropError::CropFailure(CropFailureKind::NoImage)),
        };
        Ok(CropJob {
            plan,
            decoder,
            composer: OutputComposer::new(&self.options),
            sampler: BitmapSampler::new(),
            target,
            no_output_image: self.options.no_output_image,
        })
    }

    /// Crop synchronously on the calling thread.
    pub fn crop(&self, target: OutputTarget) -> Result<CroppedImage, CropError> {
        self.crop_job(target)?.run(&CancelToken::new())
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use image::RgbaImage;
    use proptest::prelude::*;

    fn image_rect(editor: &CropEditor) -> CropRect {
        let transformer = editor.transformer().unwrap();
        transformer.to_image_space(&editor.crop_rect().unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: four quarter turns return the crop window to the same
        /// source pixels, with or without a locked aspect ratio.
        #[test]
        fn prop_four_rotations_restore_crop(
            image in (800u32..1600, 800u32..1600),
            view in (600.0f64..1000.0, 600.0f64..1000.0),
            aspect in prop::option::of((1u32..=4, 1u32..=4)),
            clockwise in any::<bool>(),
        ) {
            let mut options = CropOptions::default();
            options.allow_counter_rotation = true;
            if let Some((x, y)) = aspect {
                options.aspect_ratio = AspectRatio::new(x, y);
                options.fix_aspect_ratio = true;
            }
            let mut editor = CropEditor::new(options).unwrap();
            editor.set_image(LoadedImage::from_raster("prop", RgbaImage::new(image.0, image.1), 4096).unwrap());
            editor.set_view_size(view.0, view.1);
            let before = image_rect(&editor);

            for _ in 0..4 {
                let turned = if clockwise {
                    editor.rotate_clockwise()
                } else {
                    editor.rotate_counter_clockwise()
                };
                prop_assert!(turned);
                let rect = editor.crop_rect().unwrap();
                prop_assert!(editor.window().bounds().contains_rect(&rect, 1e-6));
            }
            let after = image_rect(&editor);
            prop_assert!(after.approx_eq(&before, 1e-6), "{:?} != {:?}", after, before);
        }
    }
}
