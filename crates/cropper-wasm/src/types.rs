//! WASM-compatible wrapper types for crop output.
//!
//! Values cross into JavaScript as plain numbers, strings and byte arrays.
//! Richer structures (options, render frames) go through
//! `serde-wasm-bindgen` in the modules that need them.

use std::fmt::Display;

use cropper_core::{CropShape, CroppedImage, Guidelines, ScaleType};
use cropper_core::compose::CropOutput;
use wasm_bindgen::prelude::*;

/// A finished crop for JavaScript.
///
/// Holds either RGBA pixels or encoded bytes, plus the crop metadata as JSON.
///
/// # Memory Management
///
/// The data is stored in WASM memory. `pixels()` and `encoded()` copy it into
/// a JavaScript `Uint8Array`.
#[wasm_bindgen]
pub struct JsCroppedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    encoded: Vec<u8>,
    sample_size: u32,
    rotation: u32,
    result_json: String,
}

#[wasm_bindgen]
impl JsCroppedImage {
    /// Output width in pixels; 0 for metadata-only crops.
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter)]
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    #[wasm_bindgen(getter)]
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    /// True when the output was encoded rather than kept as pixels.
    #[wasm_bindgen(getter)]
    pub fn is_encoded(&self) -> bool {
        !self.encoded.is_empty()
    }

    /// RGBA pixel data (4 bytes per pixel, row-major). Empty when encoded.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Encoded JPEG/PNG bytes. Empty when the output is raw pixels.
    pub fn encoded(&self) -> Vec<u8> {
        self.encoded.clone()
    }

    /// Crop metadata (source rectangle, crop points, flips, ...) as JSON.
    pub fn result_json(&self) -> String {
        self.result_json.clone()
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl JsCroppedImage {
    pub(crate) fn from_cropped(cropped: CroppedImage) -> Result<Self, String> {
        let result_json = cropped.result.encode().map_err(|e| e.to_string())?;
        let (width, height) = cropped.result.output_size.unwrap_or((0, 0));
        let (pixels, encoded) = match cropped.output {
            CropOutput::Bitmap(image) => (image.into_raw(), Vec::new()),
            CropOutput::Encoded { bytes, .. } => (Vec::new(), bytes),
            CropOutput::None | CropOutput::File { .. } => (Vec::new(), Vec::new()),
        };
        Ok(Self {
            width,
            height,
            pixels,
            encoded,
            sample_size: cropped.result.sample_size,
            rotation: cropped.result.rotation,
            result_json,
        })
    }
}

/// Turn an error into a JavaScript exception value, logging it to the
/// browser console.
pub(crate) fn js_error(err: impl Display) -> JsValue {
    let message = err.to_string();
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

pub(crate) fn parse_guidelines(value: &str) -> Result<Guidelines, String> {
    match value {
        "off" => Ok(Guidelines::Off),
        "on" => Ok(Guidelines::On),
        "on_touch" => Ok(Guidelines::OnTouch),
        other => Err(format!("Unknown guidelines mode: {}", other)),
    }
}

pub(crate) fn parse_crop_shape(value: &str) -> Result<CropShape, String> {
    match value {
        "rectangle" => Ok(CropShape::Rectangle),
        "oval" => Ok(CropShape::Oval),
        other => Err(format!("Unknown crop shape: {}", other)),
    }
}

pub(crate) fn parse_scale_type(value: &str) -> Result<ScaleType, String> {
    match value {
        "fit_center" => Ok(ScaleType::FitCenter),
        "center" => Ok(ScaleType::Center),
        "center_inside" => Ok(ScaleType::CenterInside),
        "center_crop" => Ok(ScaleType::CenterCrop),
        "fit_xy" => Ok(ScaleType::FitXy),
        other => Err(format!("Unknown scale type: {}", other)),
    }
}
