//! Sample size selection and region decoding with out-of-memory retry.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{CropError, CropFailureKind};
use crate::geometry::PixelRect;

use super::region::{sampled_dimensions, RegionDecoder};
use super::DecodeError;

/// Decode attempts before giving up: sample size 1x, 2x, 4x and 8x the
/// initial choice.
pub const MAX_DECODE_ATTEMPTS: u32 = 4;

/// Power-of-two downsample factor and the decoded size it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSizeDecision {
    pub sample_size: u32,
    pub decoded_width: u32,
    pub decoded_height: u32,
}

impl SampleSizeDecision {
    /// Pick the sample size for a `width` x `height` region.
    ///
    /// With a target, this is the largest power of two `s` that still keeps
    /// `width / s >= target_width` and `height / s >= target_height`, so the
    /// decode is as small as possible without dropping below the requested
    /// output. Without a target, or with a target larger than the region,
    /// `s = 1`.
    pub fn for_region(width: u32, height: u32, target: Option<(u32, u32)>) -> Self {
        let mut sample_size = 1u32;
        if let Some((target_w, target_h)) = target.filter(|(w, h)| *w > 0 && *h > 0) {
            let (width, height) = (width as u64, height as u64);
            let (target_w, target_h) = (target_w as u64, target_h as u64);
            while sample_size < (1 << 30)
                && width >= target_w * sample_size as u64 * 2
                && height >= target_h * sample_size as u64 * 2
            {
                sample_size *= 2;
            }
        }
        Self::with_sample_size(width, height, sample_size)
    }

    pub fn with_sample_size(width: u32, height: u32, sample_size: u32) -> Self {
        let (decoded_width, decoded_height) = sampled_dimensions(width, height, sample_size);
        Self {
            sample_size,
            decoded_width,
            decoded_height,
        }
    }
}

/// Result of [`BitmapSampler::sample`].
#[derive(Debug, Clone)]
pub struct SampledRegion {
    pub image: RgbaImage,
    pub sample_size: u32,
    /// Region asked for, in upright source pixels.
    pub requested: PixelRect,
    /// Part of the request that lies inside the source and was decoded.
    pub decoded: PixelRect,
    /// True when the request exceeded the source and the output was padded
    /// with transparent pixels.
    pub clamped: bool,
}

/// Decodes a crop region at the smallest resolution that still satisfies the
/// requested output size.
#[derive(Debug, Clone, Copy)]
pub struct BitmapSampler {
    max_attempts: u32,
}

impl Default for BitmapSampler {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DECODE_ATTEMPTS,
        }
    }
}

impl BitmapSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `region` from `source`.
    ///
    /// # Arguments
    ///
    /// * `source` - Decoder over the upright image
    /// * `region` - Crop rectangle in upright source pixels; may extend past
    ///   the image
    /// * `target` - Requested output size, already in the region's orientation
    /// * `cancel` - Checked by the decoder between rows
    ///
    /// # Errors
    ///
    /// * `CropError::DecodeOutOfMemory` when every attempt ran out of memory
    /// * `CropError::Cancelled` when `cancel` was set
    /// * `CropError::CropFailure` when the region misses the image or the
    ///   decoder fails otherwise
    pub fn sample(
        &self,
        source: &dyn RegionDecoder,
        region: PixelRect,
        target: Option<(u32, u32)>,
        cancel: &CancelToken,
    ) -> Result<SampledRegion, CropError> {
        let (width, height) = source.dimensions();
        let decoded = region.clamp_to(width, height).ok_or(CropError::CropFailure(
            CropFailureKind::RegionOutsideImage {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
            },
        ))?;
        let clamped = decoded != region;
        let decision = SampleSizeDecision::for_region(region.width, region.height, target);

        let mut sample_size = decision.sample_size;
        for attempt in 1..=self.max_attempts {
            match source.decode_region(decoded, sample_size, cancel) {
                Ok(image) => {
                    debug!(
                        sample_size,
                        width = image.width(),
                        height = image.height(),
                        clamped,
                        "region decoded"
                    );
                    let image = if clamped {
                        pad_to_request(image, region, decoded, sample_size)
                    } else {
                        image
                    };
                    return Ok(SampledRegion {
                        image,
                        sample_size,
                        requested: region,
                        decoded,
                        clamped,
                    });
                }
                Err(DecodeError::OutOfMemory) if attempt < self.max_attempts => {
                    warn!(attempt, sample_size, "out of memory decoding region, retrying smaller");
                    sample_size = sample_size.saturating_mul(2);
                }
                Err(DecodeError::OutOfMemory) => break,
                Err(DecodeError::Cancelled) => return Err(CropError::Cancelled),
                Err(err) => return Err(CropError::CropFailure(CropFailureKind::Decode(err))),
            }
        }

        Err(CropError::DecodeOutOfMemory {
            attempts: self.max_attempts,
            sample_size,
        })
    }
}

/// Place the decoded part of a clamped request on a transparent canvas of the
/// full requested size.
fn pad_to_request(
    image: RgbaImage,
    requested: PixelRect,
    decoded: PixelRect,
    sample_size: u32,
) -> RgbaImage {
    let s = sample_size.max(1) as i64;
    let (w, h) = sampled_dimensions(requested.width, requested.height, sample_size);
    let mut canvas = RgbaImage::new(w, h);
    let x = (decoded.x - requested.x) / s;
    let y = (decoded.y - requested.y) / s;
    image::imageops::replace(&mut canvas, &image, x, y);
    canvas
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: the sample size is the largest power of two that keeps the
        /// target satisfied.
        #[test]
        fn prop_sample_size_is_tightest_power_of_two(
            width in 1u32..20_000,
            height in 1u32..20_000,
            target_w in 1u32..4_000,
            target_h in 1u32..4_000,
        ) {
            let decision = SampleSizeDecision::for_region(width, height, Some((target_w, target_h)));
            let s = decision.sample_size;
            prop_assert!(s.is_power_of_two());
            if s > 1 {
                prop_assert!(width / s >= target_w && height / s >= target_h);
            }
            let next = s * 2;
            prop_assert!(width / next < target_w || height / next < target_h);
        }

        /// Property: decoded pixels never exceed the region area divided by
        /// the squared sample size, plus one partial row and column.
        #[test]
        fn prop_decoded_pixel_bound(
            width in 1u32..20_000,
            height in 1u32..20_000,
            target_w in 0u32..4_000,
            target_h in 0u32..4_000,
        ) {
            let decision = SampleSizeDecision::for_region(width, height, Some((target_w, target_h)));
            let s = decision.sample_size as u64;
            let decoded = decision.decoded_width as u64 * decision.decoded_height as u64;
            let area = width as u64 * height as u64;
            let overhead = width as u64 / s + height as u64 / s + 1;
            prop_assert!(decoded <= area / (s * s) + overhead);
        }
    }
}
