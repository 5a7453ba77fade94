//! Error types surfaced by the crop engine.

use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;

/// Errors reported to the host for load and crop requests.
///
/// Load and crop failures never invalidate the editing session: a failed load
/// leaves the editor in its empty state, a failed crop leaves the crop window
/// untouched so the request can be retried.
#[derive(Debug, Error)]
pub enum CropError {
    /// The source could not be resolved, read or decoded.
    #[error("Failed to load image: {0}")]
    ImageLoadFailure(#[source] DecodeError),

    /// Every decode attempt ran out of memory, even at the largest sample size.
    #[error("Out of memory decoding crop region after {attempts} attempts (last sample size {sample_size})")]
    DecodeOutOfMemory { attempts: u32, sample_size: u32 },

    /// Options were rejected before any session started.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// Decoding succeeded but composing or encoding the output failed.
    #[error("Crop failed: {0}")]
    CropFailure(#[source] CropFailureKind),

    /// The request was superseded or the session was torn down.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Underlying cause of a [`CropError::CropFailure`].
#[derive(Debug, Error)]
pub enum CropFailureKind {
    #[error("no image loaded")]
    NoImage,

    #[error("crop region {width}x{height} at ({x}, {y}) lies outside the source image")]
    RegionOutsideImage { x: i64, y: i64, width: u32, height: u32 },

    #[error("region decode failed: {0}")]
    Decode(#[source] DecodeError),

    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("resize to {width}x{height} failed")]
    Resize { width: u32, height: u32 },

    #[error("worker thread failed: {0}")]
    Worker(String),
}

impl From<EncodeError> for CropError {
    fn from(err: EncodeError) -> Self {
        CropError::CropFailure(CropFailureKind::Encode(err))
    }
}

/// Option validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("snap radius must be >= 0, got {0}")]
    NegativeSnapRadius(f64),

    #[error("touch radius must be >= 0, got {0}")]
    NegativeTouchRadius(f64),

    #[error("max zoom must be >= 1, got {0}")]
    InvalidMaxZoom(u32),

    #[error("initial padding ratio must be in [0, 0.5), got {0}")]
    InvalidPaddingRatio(f64),

    #[error("aspect ratio components must be > 0, got {x}:{y}")]
    InvalidAspectRatio { x: u32, y: u32 },

    #[error("min crop window size must be >= 0, got {width}x{height}")]
    NegativeMinWindow { width: f64, height: f64 },

    #[error("max crop window {max} is smaller than min crop window {min} ({axis})")]
    MaxWindowBelowMin {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("max crop result {max} is smaller than min crop result {min} ({axis})")]
    MaxResultBelowMin {
        axis: &'static str,
        min: u32,
        max: u32,
    },

    #[error("rotation step must be a multiple of 90 in (0, 360], got {0}")]
    InvalidRotationStep(u32),

    #[error("initial rotation must be a multiple of 90, got {0}")]
    InvalidInitialRotation(i32),

    #[error("output quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),

    #[error("resize policy {policy} needs a non-zero output size, got {width}x{height}")]
    MissingOutputSize {
        policy: &'static str,
        width: u32,
        height: u32,
    },

    #[error("max preview dimension must be > 0")]
    InvalidPreviewDimension,

    #[error("malformed options: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidAspectRatio { x: 0, y: 3 };
        assert_eq!(err.to_string(), "aspect ratio components must be > 0, got 0:3");

        let err = CropError::from(ConfigError::NegativeTouchRadius(-2.0));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: touch radius must be >= 0, got -2"
        );
    }

    #[test]
    fn test_crop_error_keeps_source() {
        use std::error::Error as _;

        let err = CropError::ImageLoadFailure(DecodeError::InvalidFormat);
        let source = err.source().expect("load failure carries its cause");
        assert_eq!(source.to_string(), "Invalid or unsupported image format");
    }

    #[test]
    fn test_out_of_memory_display() {
        let err = CropError::DecodeOutOfMemory {
            attempts: 4,
            sample_size: 8,
        };
        assert!(err.to_string().contains("after 4 attempts"));
    }
}
