//! Interactive crop editor bindings.
//!
//! `JsCropEditor` owns a [`CropEditor`] and exposes it to the browser with
//! flat arguments. Pointer positions are in view (CSS) pixels.

use std::sync::Arc;
use std::time::Duration;

use cropper_core::compose::OutputTarget;
use cropper_core::decode::{EncodedSource, LoadedImage};
use cropper_core::{
    CancelToken, CropEditor, CropOptions, CropRect, CropSurface, GestureOutcome, PixelRect, Point,
    PointerEvent,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::types::{js_error, parse_crop_shape, parse_guidelines, parse_scale_type, JsCroppedImage};

/// Snapshot of the editor state for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorState {
    pub has_image: bool,
    pub rotation: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub zoom: f64,
    pub animating: bool,
    pub crop_rect: Option<CropRect>,
    pub crop_rect_in_image: Option<PixelRect>,
}

/// A crop editor living in WASM memory.
#[wasm_bindgen]
pub struct JsCropEditor {
    editor: CropEditor,
}

#[wasm_bindgen]
impl JsCropEditor {
    /// Create an editor from an options object; missing fields take defaults.
    ///
    /// # Errors
    /// Returns an error if the options do not deserialize or are invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<JsCropEditor, JsValue> {
        let options: CropOptions = if options.is_undefined() || options.is_null() {
            CropOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(js_error)?
        };
        Self::from_options(options).map_err(js_error)
    }

    /// Decode `bytes` (JPEG or PNG) and show them in the editor.
    pub fn load_bytes(&mut self, reference: &str, bytes: &[u8]) -> Result<(), JsValue> {
        self.load(reference, bytes).map_err(js_error)
    }

    pub fn clear_image(&mut self) {
        self.editor.clear_image();
    }

    #[wasm_bindgen(getter)]
    pub fn has_image(&self) -> bool {
        self.editor.has_image()
    }

    pub fn set_view_size(&mut self, width: f64, height: f64) {
        self.editor.set_view_size(width, height);
    }

    // Pointer input. Each returns true when the event was consumed.

    pub fn pointer_down(&mut self, pointer: u32, x: f64, y: f64) -> bool {
        self.pointer(PointerEvent::Down {
            pointer,
            position: Point::new(x, y),
        })
    }

    pub fn pointer_move(&mut self, pointer: u32, x: f64, y: f64) -> bool {
        self.pointer(PointerEvent::Move {
            pointer,
            position: Point::new(x, y),
        })
    }

    pub fn pointer_up(&mut self, pointer: u32) -> bool {
        self.pointer(PointerEvent::Up { pointer })
    }

    pub fn pointer_cancel(&mut self) -> bool {
        self.pointer(PointerEvent::Cancel)
    }

    /// Advance the auto-zoom animation by `elapsed_ms`. Returns true while
    /// further frames are needed. An elapsed time too large to represent
    /// finishes the animation.
    pub fn tick(&mut self, elapsed_ms: f64) -> bool {
        match Duration::try_from_secs_f64(elapsed_ms.max(0.0) / 1000.0) {
            Ok(dt) => self.editor.tick(dt),
            Err(_) => {
                self.editor.finish_animation();
                false
            }
        }
    }

    pub fn rotate(&mut self, degrees: i32) -> bool {
        self.editor.rotate_image(degrees)
    }

    pub fn rotate_clockwise(&mut self) -> bool {
        self.editor.rotate_clockwise()
    }

    pub fn rotate_counter_clockwise(&mut self) -> bool {
        self.editor.rotate_counter_clockwise()
    }

    pub fn flip_horizontally(&mut self) -> bool {
        self.editor.flip_image_horizontally()
    }

    pub fn flip_vertically(&mut self) -> bool {
        self.editor.flip_image_vertically()
    }

    pub fn set_zoom(&mut self, scale: f64, focal_x: f64, focal_y: f64) {
        self.editor.set_zoom(scale, Point::new(focal_x, focal_y));
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.editor.zoom()
    }

    #[wasm_bindgen(getter)]
    pub fn rotation(&self) -> u32 {
        self.editor.rotation()
    }

    /// Crop window in view pixels as `[left, top, right, bottom]`, empty
    /// without an image.
    pub fn crop_rect(&self) -> Vec<f64> {
        self.editor
            .crop_rect()
            .map(|r| vec![r.left, r.top, r.right, r.bottom])
            .unwrap_or_default()
    }

    /// Crop window in source pixels as `[x, y, width, height]`.
    pub fn crop_rect_in_image(&self) -> Vec<f64> {
        self.editor
            .crop_rect_in_image()
            .map(|r| vec![r.x as f64, r.y as f64, r.width as f64, r.height as f64])
            .unwrap_or_default()
    }

    pub fn set_crop_rect_in_image(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let rect = PixelRect::new(
            x.round() as i64,
            y.round() as i64,
            width.round().max(0.0) as u32,
            height.round().max(0.0) as u32,
        );
        self.editor.set_crop_rect_in_image(rect);
    }

    pub fn reset_crop_rect(&mut self) {
        self.editor.reset_crop_rect();
    }

    pub fn set_aspect_ratio(&mut self, x: u32, y: u32) -> Result<(), JsValue> {
        self.editor.set_aspect_ratio(x, y).map_err(js_error)
    }

    pub fn clear_aspect_ratio(&mut self) {
        self.editor.clear_aspect_ratio();
    }

    /// One of `off`, `on`, `on_touch`.
    pub fn set_guidelines(&mut self, mode: &str) -> Result<(), JsValue> {
        let guidelines = parse_guidelines(mode).map_err(js_error)?;
        self.editor.set_guidelines(guidelines);
        Ok(())
    }

    /// One of `rectangle`, `oval`.
    pub fn set_crop_shape(&mut self, shape: &str) -> Result<(), JsValue> {
        let shape = parse_crop_shape(shape).map_err(js_error)?;
        self.editor.set_crop_shape(shape);
        Ok(())
    }

    pub fn set_scale_type(&mut self, scale_type: &str) -> Result<(), JsValue> {
        let scale_type = parse_scale_type(scale_type).map_err(js_error)?;
        self.editor.set_scale_type(scale_type);
        Ok(())
    }

    pub fn set_auto_zoom_enabled(&mut self, enabled: bool) {
        self.editor.set_auto_zoom_enabled(enabled);
    }

    pub fn set_multi_touch_enabled(&mut self, enabled: bool) {
        self.editor.set_multi_touch_enabled(enabled);
    }

    /// Current state as a plain object.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.snapshot()).map_err(js_error)
    }

    /// Everything needed to draw one frame, or `undefined` before the editor
    /// has an image and a view size.
    pub fn render(&self) -> Result<JsValue, JsValue> {
        match self.editor.render() {
            Some(frame) => serde_wasm_bindgen::to_value(&frame).map_err(js_error),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Crop the current window. With `encode` the output is JPEG/PNG bytes
    /// in the configured format, otherwise raw RGBA pixels.
    pub fn crop(&self, encode: bool) -> Result<JsCroppedImage, JsValue> {
        self.crop_image(encode).map_err(js_error)
    }
}

impl JsCropEditor {
    pub(crate) fn from_options(options: CropOptions) -> Result<Self, String> {
        let editor = CropEditor::new(options).map_err(|e| e.to_string())?;
        Ok(Self { editor })
    }

    pub(crate) fn load(&mut self, reference: &str, bytes: &[u8]) -> Result<(), String> {
        let options = self.editor.options();
        let source = EncodedSource::new(Arc::from(bytes))
            .map_err(|e| e.to_string())?
            .with_memory_limit(options.decode_memory_limit);
        let orientation = source.orientation();
        let loaded = LoadedImage::from_decoder(
            reference,
            Arc::new(source),
            orientation,
            options.max_preview_dimension,
            &CancelToken::new(),
        )
        .map_err(|e| e.to_string())?;
        self.editor.set_image(loaded);
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) -> bool {
        !matches!(self.editor.handle_pointer(event), GestureOutcome::Ignored)
    }

    pub(crate) fn snapshot(&self) -> EditorState {
        EditorState {
            has_image: self.editor.has_image(),
            rotation: self.editor.rotation(),
            flip_horizontal: self.editor.is_flipped_horizontally(),
            flip_vertical: self.editor.is_flipped_vertically(),
            zoom: self.editor.zoom(),
            animating: self.editor.is_animating(),
            crop_rect: self.editor.crop_rect(),
            crop_rect_in_image: self.editor.crop_rect_in_image(),
        }
    }

    pub(crate) fn crop_image(&self, encode: bool) -> Result<JsCroppedImage, String> {
        let target = if encode {
            OutputTarget::Encoded
        } else {
            OutputTarget::Bitmap
        };
        let cropped = self.editor.crop(target).map_err(|e| e.to_string())?;
        JsCroppedImage::from_cropped(cropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropper_core::encode::encode_png;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let pixels: Vec<u8> = (0..width * height)
            .flat_map(|i| [(i % 256) as u8, (i / 256 % 256) as u8, 64, 255])
            .collect();
        encode_png(&pixels, width, height).unwrap()
    }

    fn editor() -> JsCropEditor {
        let mut js = JsCropEditor::from_options(CropOptions::default()).unwrap();
        js.load("photo.png", &png(200, 100)).unwrap();
        js.set_view_size(400.0, 200.0);
        js
    }

    #[test]
    fn test_empty_editor() {
        let js = JsCropEditor::from_options(CropOptions::default()).unwrap();
        assert!(!js.has_image());
        assert!(js.crop_rect().is_empty());
        assert!(js.crop_image(false).is_err());
        assert!(!js.snapshot().has_image);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut options = CropOptions::default();
        options.max_zoom = 0;
        assert!(JsCropEditor::from_options(options).is_err());
    }

    #[test]
    fn test_load_garbage_fails() {
        let mut js = JsCropEditor::from_options(CropOptions::default()).unwrap();
        assert!(js.load("junk", &[1, 2, 3]).is_err());
        assert!(!js.has_image());
    }

    #[test]
    fn test_loaded_editor_has_window() {
        let js = editor();
        assert!(js.has_image());
        let rect = js.crop_rect();
        assert_eq!(rect.len(), 4);
        assert!(rect[2] > rect[0] && rect[3] > rect[1]);
        assert_eq!(js.crop_rect_in_image().len(), 4);
    }

    #[test]
    fn test_rotate_and_flip() {
        let mut js = editor();
        assert!(js.rotate_clockwise());
        assert_eq!(js.rotation(), 90);
        assert!(js.flip_horizontally());
        let state = js.snapshot();
        assert!(state.flip_horizontal);
        assert!(!state.flip_vertical);
    }

    #[test]
    fn test_pointer_outside_window_is_ignored() {
        let mut js = editor();
        assert!(!js.pointer_down(0, -500.0, -500.0));
    }

    #[test]
    fn test_crop_to_pixels() {
        let mut js = editor();
        js.set_crop_rect_in_image(20.0, 10.0, 100.0, 50.0);
        let cropped = js.crop_image(false).unwrap();
        assert!(!cropped.is_encoded());
        assert_eq!(
            cropped.pixels().len() as u32,
            cropped.width() * cropped.height() * 4
        );
        assert_eq!(cropped.sample_size(), 1);
    }

    #[test]
    fn test_crop_encoded() {
        let js = editor();
        let cropped = js.crop_image(true).unwrap();
        assert!(cropped.is_encoded());
        // JPEG is the default output format.
        assert_eq!(&cropped.encoded()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_tick_accepts_any_elapsed_time() {
        let mut js = editor();
        js.set_crop_rect_in_image(90.0, 45.0, 20.0, 10.0);
        assert!(js.snapshot().animating);
        assert!(js.tick(f64::NAN));
        assert!(!js.tick(f64::INFINITY));
        let state = js.snapshot();
        assert!(!state.animating);
        assert!(state.zoom > 1.0);
    }

    #[test]
    fn test_negative_rotation_needs_permission() {
        let mut js = editor();
        assert!(!js.rotate(-90));
        assert_eq!(js.rotation(), 0);
        assert!(js.rotate(180));
        assert_eq!(js.rotation(), 180);
    }

    #[test]
    fn test_enum_setters() {
        let mut js = editor();
        js.editor.set_guidelines(parse_guidelines("on").unwrap());
        assert_eq!(js.editor.guidelines(), cropper_core::Guidelines::On);
        js.editor.set_crop_shape(parse_crop_shape("oval").unwrap());
        assert_eq!(js.editor.crop_shape(), cropper_core::CropShape::Oval);
    }
}
