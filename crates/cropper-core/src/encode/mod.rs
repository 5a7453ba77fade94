//! Output encoding.
//!
//! This module provides functionality for:
//! - Encoding RGBA crops to JPEG (alpha flattened onto white) or PNG
//! - Persisting encoded bytes to a file
//!
//! # Examples
//!
//! ```ignore
//! use cropper_core::encode::encode_image;
//! use cropper_core::options::OutputFormat;
//!
//! let image = image::RgbaImage::new(100, 100);
//! let bytes = encode_image(&image, OutputFormat::Png, 90).unwrap();
//! println!("Encoded {} bytes", bytes.len());
//! ```

mod jpeg;
mod png;

use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

use crate::options::OutputFormat;

pub use jpeg::{encode_jpeg, flatten_alpha};
pub use png::encode_png;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The encoder rejected the image
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// Writing the encoded output failed
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Check dimensions and buffer length for `channels` bytes per pixel.
fn validate(pixels: &[u8], width: u32, height: u32, channels: usize) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }
    let expected = (width as usize) * (height as usize) * channels;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Encode an RGBA image in `format`.
///
/// `quality` only applies to JPEG.
pub fn encode_image(image: &RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_alpha(image);
            encode_jpeg(rgb.as_raw(), width, height, quality)
        }
        OutputFormat::Png => encode_png(image.as_raw(), width, height),
    }
}

/// Write encoded bytes to `path`, creating parent directories.
pub fn write_encoded(path: &Path, bytes: &[u8]) -> Result<(), EncodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
