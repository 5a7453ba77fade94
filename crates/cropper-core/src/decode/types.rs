//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image loading and region decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// Out of memory during decoding.
    #[error("Out of memory during decoding")]
    OutOfMemory,

    /// I/O error during source reading.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The source reference does not resolve to anything.
    #[error("Image source not found: {0}")]
    SourceUnavailable(String),

    /// The source exists but may not be read.
    #[error("Permission denied reading image source: {0}")]
    PermissionDenied(String),

    /// The decode was cancelled before finishing.
    #[error("Decode cancelled")]
    Cancelled,
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DecodeError::SourceUnavailable(err.to_string()),
            std::io::ErrorKind::PermissionDenied => DecodeError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::OutOfMemory => DecodeError::OutOfMemory,
            _ => DecodeError::IoError(err.to_string()),
        }
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(_) => DecodeError::OutOfMemory,
            image::ImageError::Unsupported(_) => DecodeError::InvalidFormat,
            image::ImageError::IoError(io) => DecodeError::from(io),
            other => DecodeError::CorruptedFile(other.to_string()),
        }
    }
}

/// Resampling filter used when the output is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Nearest,
    /// Triangle filter; the default for crop output.
    #[default]
    Bilinear,
    Lanczos3,
}

impl FilterType {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation tag (values 1-8), applied once at load so every later
/// coordinate refers to the upright image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Mirrored along the main diagonal.
    Transpose = 5,
    Rotate90CW = 6,
    /// Mirrored along the anti-diagonal.
    Transverse = 7,
    Rotate270CW = 8,
}

impl Orientation {
    /// Returns true if this orientation swaps width and height dimensions.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }

    /// Map a pixel of the upright image back to the stored (raw) image.
    ///
    /// `upright` is the size of the upright image. Used by region decoding to
    /// read only the stored pixels a region needs.
    pub fn to_stored(self, x: u32, y: u32, upright: (u32, u32)) -> (u32, u32) {
        let (w, h) = upright;
        match self {
            Orientation::Normal => (x, y),
            Orientation::FlipHorizontal => (w - 1 - x, y),
            Orientation::Rotate180 => (w - 1 - x, h - 1 - y),
            Orientation::FlipVertical => (x, h - 1 - y),
            Orientation::Transpose => (y, x),
            Orientation::Rotate90CW => (y, w - 1 - x),
            Orientation::Transverse => (h - 1 - y, w - 1 - x),
            Orientation::Rotate270CW => (h - 1 - y, x),
        }
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// What is known about a source before any pixels are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Stored width in pixels (before orientation correction).
    pub width: u32,
    /// Stored height in pixels (before orientation correction).
    pub height: u32,
    /// EXIF orientation.
    pub orientation: Orientation,
}

impl SourceInfo {
    /// Get the effective dimensions after orientation correction.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        if self.orientation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::exif::apply_orientation;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn test_filter_type_conversion() {
        assert!(matches!(
            FilterType::Nearest.to_image_filter(),
            image::imageops::FilterType::Nearest
        ));
        assert!(matches!(
            FilterType::Bilinear.to_image_filter(),
            image::imageops::FilterType::Triangle
        ));
        assert!(matches!(
            FilterType::Lanczos3.to_image_filter(),
            image::imageops::FilterType::Lanczos3
        ));
    }

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(99), Orientation::Normal); // Invalid defaults to Normal
    }

    #[test]
    fn test_oriented_dimensions() {
        let mut info = SourceInfo {
            width: 6000,
            height: 4000,
            ..Default::default()
        };
        assert_eq!(info.oriented_dimensions(), (6000, 4000));

        info.orientation = Orientation::Rotate90CW;
        assert_eq!(info.oriented_dimensions(), (4000, 6000));
    }

    #[test]
    fn test_to_stored_matches_pixel_transform() {
        // Unique value per stored pixel, so any mismatch shows up.
        let stored = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        for value in 1..=8u32 {
            let orientation = Orientation::from(value);
            let upright = apply_orientation(DynamicImage::ImageRgba8(stored.clone()), orientation)
                .into_rgba8();
            let size = upright.dimensions();
            for (x, y, pixel) in upright.enumerate_pixels() {
                let (sx, sy) = orientation.to_stored(x, y, size);
                assert_eq!(
                    stored.get_pixel(sx, sy),
                    pixel,
                    "orientation {:?} at ({}, {})",
                    orientation,
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_decode_error_from_io() {
        let err = DecodeError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, DecodeError::SourceUnavailable(_)));

        let err = DecodeError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        assert!(matches!(err, DecodeError::PermissionDenied(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidFormat;
        assert_eq!(err.to_string(), "Invalid or unsupported image format");
        assert_eq!(DecodeError::Cancelled.to_string(), "Decode cancelled");
    }
}
