//! One-shot cropping without an editor.

use std::sync::Arc;

use cropper_core::compose::OutputTarget;
use cropper_core::decode::{BitmapSampler, EncodedSource, RegionDecoder};
use cropper_core::{
    CancelToken, CropJob, CropOptions, CropPlan, OutputComposer, OutputTransform, PixelRect,
};
use wasm_bindgen::prelude::*;

use crate::types::{js_error, JsCroppedImage};

/// Crop a rectangle of an encoded image.
///
/// The rectangle is in upright source pixels (after EXIF orientation). The
/// region is rotated by `rotation` degrees clockwise, then flipped, then
/// resized according to `options.output`.
///
/// # Arguments
/// * `bytes` - JPEG or PNG file contents
/// * `options` - Crop options object; `undefined` uses the defaults
/// * `x`, `y`, `width`, `height` - Source rectangle
/// * `rotation` - Multiple of 90
/// * `encode` - Return encoded bytes instead of RGBA pixels
///
/// # Errors
/// Returns an error if decoding fails, the options are invalid, or the
/// rectangle does not overlap the image.
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn crop_image(
    bytes: &[u8],
    options: JsValue,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    rotation: i32,
    flip_horizontal: bool,
    flip_vertical: bool,
    encode: bool,
) -> Result<JsCroppedImage, JsValue> {
    let options: CropOptions = if options.is_undefined() || options.is_null() {
        CropOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(js_error)?
    };
    let rect = PixelRect::new(x as i64, y as i64, width, height);
    let transform =
        OutputTransform::new(rotation.rem_euclid(360) as u32, flip_horizontal, flip_vertical);
    crop_bytes(bytes, &options, rect, transform, encode).map_err(js_error)
}

pub(crate) fn crop_bytes(
    bytes: &[u8],
    options: &CropOptions,
    rect: PixelRect,
    transform: OutputTransform,
    encode: bool,
) -> Result<JsCroppedImage, String> {
    options.validate().map_err(|e| e.to_string())?;
    let source = EncodedSource::new(Arc::from(bytes))
        .map_err(|e| e.to_string())?
        .with_memory_limit(options.decode_memory_limit);
    let (image_width, image_height) = source.dimensions();
    if rect.clamp_to(image_width, image_height).is_none() {
        return Err(format!(
            "Crop rectangle {}x{} at ({}, {}) lies outside the {}x{} image",
            rect.width, rect.height, rect.x, rect.y, image_width, image_height
        ));
    }

    let plan = CropPlan::new(
        "bytes",
        (image_width, image_height),
        rect.to_crop_rect().corners(),
        transform,
        &options.output,
    );
    let job = CropJob {
        plan,
        decoder: Arc::new(source),
        composer: OutputComposer::new(options),
        sampler: BitmapSampler::new(),
        target: if encode {
            OutputTarget::Encoded
        } else {
            OutputTarget::Bitmap
        },
        no_output_image: options.no_output_image,
    };
    let cropped = job.run(&CancelToken::new()).map_err(|e| e.to_string())?;
    JsCroppedImage::from_cropped(cropped)
}
