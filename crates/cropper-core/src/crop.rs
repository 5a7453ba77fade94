//! Crop requests: from the editor's geometry to a finished output.
//!
//! A [`CropPlan`] is computed synchronously from the crop window (it only
//! reads geometry), then a [`CropJob`] carries the plan and everything needed
//! to decode and compose it onto a worker thread.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::cancel::CancelToken;
use crate::compose::{CropOutput, OutputComposer, OutputTarget, OutputTransform};
use crate::decode::{BitmapSampler, RegionDecoder, SampleSizeDecision};
use crate::error::CropError;
use crate::geometry::{CropRect, PixelRect, Point};
use crate::options::{OutputRequest, ResizePolicy};
use crate::result::CropResult;

/// Geometry of one crop, in upright source pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CropPlan {
    pub reference: String,
    pub region: PixelRect,
    pub crop_points: [f64; 8],
    pub whole_image_rect: PixelRect,
    pub transform: OutputTransform,
    /// Target size in the region's orientation, `None` to decode at full
    /// resolution.
    pub sample_target: Option<(u32, u32)>,
    /// Sample size chosen before any out-of-memory retry.
    pub sample: SampleSizeDecision,
}

impl CropPlan {
    /// Plan a crop of the window whose corners map to `image_points`.
    pub fn new(
        reference: impl Into<String>,
        image_size: (u32, u32),
        image_points: [Point; 4],
        transform: OutputTransform,
        request: &OutputRequest,
    ) -> Self {
        let region = CropRect::bounding(&image_points).to_pixel_rect();
        let mut crop_points = [0.0; 8];
        for (i, p) in image_points.iter().enumerate() {
            crop_points[2 * i] = p.x;
            crop_points[2 * i + 1] = p.y;
        }

        let sample_target = match request.policy {
            ResizePolicy::None => None,
            _ if !request.has_target() => None,
            _ if transform.swaps_dimensions() => Some((request.height, request.width)),
            _ => Some((request.width, request.height)),
        };
        let sample = SampleSizeDecision::for_region(region.width, region.height, sample_target);

        Self {
            reference: reference.into(),
            region,
            crop_points,
            whole_image_rect: PixelRect::new(0, 0, image_size.0, image_size.1),
            transform,
            sample_target,
            sample,
        }
    }

    fn result(&self) -> CropResult {
        CropResult {
            original_reference: self.reference.clone(),
            output_location: None,
            error: None,
            crop_points: self.crop_points,
            crop_rect: self.region,
            whole_image_rect: self.whole_image_rect,
            rotation: self.transform.rotation,
            flip_horizontal: self.transform.flip_horizontal,
            flip_vertical: self.transform.flip_vertical,
            sample_size: self.sample.sample_size,
            clamped: false,
            output_size: None,
        }
    }

    /// Metadata for a crop that failed with `error`.
    pub fn failure(&self, error: &CropError) -> CropResult {
        CropResult {
            error: Some(error.to_string()),
            ..self.result()
        }
    }
}

/// A finished crop.
#[derive(Debug, Clone)]
pub struct CroppedImage {
    pub result: CropResult,
    pub output: CropOutput,
}

/// Everything a worker needs to execute a [`CropPlan`].
#[derive(Clone)]
pub struct CropJob {
    pub plan: CropPlan,
    pub decoder: Arc<dyn RegionDecoder>,
    pub composer: OutputComposer,
    pub sampler: BitmapSampler,
    pub target: OutputTarget,
    /// Report metadata only; nothing is decoded.
    pub no_output_image: bool,
}

impl fmt::Debug for CropJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CropJob")
            .field("plan", &self.plan)
            .field("target", &self.target)
            .field("no_output_image", &self.no_output_image)
            .finish_non_exhaustive()
    }
}

impl CropJob {
    /// Decode, compose and deliver the planned crop.
    pub fn run(&self, cancel: &CancelToken) -> Result<CroppedImage, CropError> {
        let plan = &self.plan;
        if self.no_output_image {
            return Ok(CroppedImage {
                result: plan.result(),
                output: CropOutput::None,
            });
        }

        let sampled =
            self.sampler
                .sample(self.decoder.as_ref(), plan.region, plan.sample_target, cancel)?;
        if cancel.is_cancelled() {
            return Err(CropError::Cancelled);
        }
        let image = self.composer.compose(sampled.image, plan.transform)?;
        let output_size = image.dimensions();
        let output = self.composer.deliver(image, &self.target)?;
        info!(
            reference = %plan.reference,
            sample_size = sampled.sample_size,
            width = output_size.0,
            height = output_size.1,
            "crop finished"
        );

        Ok(CroppedImage {
            result: CropResult {
                output_location: output.location().cloned(),
                sample_size: sampled.sample_size,
                clamped: sampled.clamped,
                output_size: Some(output_size),
                ..plan.result()
            },
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodeError, RasterSource};
    use crate::options::CropOptions;
    use image::RgbaImage;

    #[derive(Debug)]
    struct Untouchable;

    impl RegionDecoder for Untouchable {
        fn dimensions(&self) -> (u32, u32) {
            (4000, 3000)
        }

        fn decode_region(
            &self,
            _region: PixelRect,
            _sample_size: u32,
            _cancel: &CancelToken,
        ) -> Result<RgbaImage, DecodeError> {
            panic!("metadata-only crop must not decode");
        }
    }

    fn points(rect: CropRect) -> [Point; 4] {
        rect.corners()
    }

    fn job(options: &CropOptions, plan: CropPlan, decoder: Arc<dyn RegionDecoder>) -> CropJob {
        CropJob {
            plan,
            decoder,
            composer: OutputComposer::new(options),
            sampler: BitmapSampler::new(),
            target: OutputTarget::Bitmap,
            no_output_image: options.no_output_image,
        }
    }

    #[test]
    fn test_plan_scenario_sample_size() {
        let request = OutputRequest::new(400, 300, ResizePolicy::ResizeInside);
        let plan = CropPlan::new(
            "photo",
            (4000, 3000),
            points(CropRect::new(1000.0, 750.0, 3000.0, 2250.0)),
            OutputTransform::default(),
            &request,
        );
        assert_eq!(plan.region, PixelRect::new(1000, 750, 2000, 1500));
        assert_eq!(plan.sample.sample_size, 4);
        assert_eq!((plan.sample.decoded_width, plan.sample.decoded_height), (500, 375));
        assert_eq!(plan.crop_points[2..4], [3000.0, 750.0]);
    }

    #[test]
    fn test_plan_transposes_target_for_quarter_turns() {
        // Output 300x400 after a 90 degree turn is 400x300 in the source
        let request = OutputRequest::new(300, 400, ResizePolicy::ResizeInside);
        let plan = CropPlan::new(
            "photo",
            (4000, 3000),
            points(CropRect::new(0.0, 0.0, 2000.0, 1500.0)),
            OutputTransform::new(90, false, false),
            &request,
        );
        assert_eq!(plan.sample_target, Some((400, 300)));
        assert_eq!(plan.sample.sample_size, 4);
    }

    #[test]
    fn test_plan_without_policy_decodes_full_resolution() {
        let request = OutputRequest::new(400, 300, ResizePolicy::None);
        let plan = CropPlan::new(
            "photo",
            (4000, 3000),
            points(CropRect::new(0.0, 0.0, 2000.0, 1500.0)),
            OutputTransform::default(),
            &request,
        );
        assert_eq!(plan.sample_target, None);
        assert_eq!(plan.sample.sample_size, 1);
    }

    #[test]
    fn test_job_scenario_resize_inside() {
        let options = CropOptions::default().with_output(400, 300, ResizePolicy::ResizeInside);
        let plan = CropPlan::new(
            "photo",
            (4000, 3000),
            points(CropRect::new(1000.0, 750.0, 3000.0, 2250.0)),
            OutputTransform::default(),
            &options.output,
        );
        let decoder = Arc::new(RasterSource::new(RgbaImage::new(4000, 3000)));
        let cropped = job(&options, plan, decoder).run(&CancelToken::new()).unwrap();

        assert_eq!(cropped.result.sample_size, 4);
        assert_eq!(cropped.result.output_size, Some((400, 300)));
        assert_eq!(cropped.output.bitmap().unwrap().dimensions(), (400, 300));
        assert!(cropped.result.is_success());
    }

    #[test]
    fn test_job_rotated_output() {
        let options = CropOptions::default();
        let plan = CropPlan::new(
            "photo",
            (100, 80),
            points(CropRect::new(10.0, 10.0, 70.0, 50.0)),
            OutputTransform::new(270, false, false),
            &options.output,
        );
        let decoder = Arc::new(RasterSource::new(RgbaImage::new(100, 80)));
        let cropped = job(&options, plan, decoder).run(&CancelToken::new()).unwrap();
        assert_eq!(cropped.output.bitmap().unwrap().dimensions(), (40, 60));
        assert_eq!(cropped.result.rotation, 270);
    }

    #[test]
    fn test_no_output_image_skips_decode() {
        let mut options = CropOptions::default().with_output(400, 300, ResizePolicy::ResizeInside);
        options.no_output_image = true;
        let plan = CropPlan::new(
            "photo",
            (4000, 3000),
            points(CropRect::new(1000.0, 750.0, 3000.0, 2250.0)),
            OutputTransform::new(180, true, false),
            &options.output,
        );
        let cropped = job(&options, plan, Arc::new(Untouchable))
            .run(&CancelToken::new())
            .unwrap();

        assert!(matches!(cropped.output, CropOutput::None));
        assert_eq!(cropped.result.crop_rect, PixelRect::new(1000, 750, 2000, 1500));
        assert_eq!(cropped.result.rotation, 180);
        assert!(cropped.result.flip_horizontal);
        assert_eq!(cropped.result.sample_size, 4);
        assert_eq!(cropped.result.output_size, None);
    }

    #[test]
    fn test_cancelled_job() {
        let options = CropOptions::default();
        let plan = CropPlan::new(
            "photo",
            (50, 50),
            points(CropRect::new(0.0, 0.0, 50.0, 50.0)),
            OutputTransform::default(),
            &options.output,
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        let decoder = Arc::new(RasterSource::new(RgbaImage::new(50, 50)));
        let result = job(&options, plan.clone(), decoder).run(&cancel);
        let err = result.unwrap_err();
        assert!(matches!(err, CropError::Cancelled));
        assert_eq!(plan.failure(&err).error.as_deref(), Some("Operation cancelled"));
    }
}
