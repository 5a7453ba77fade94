//! Editing session configuration.
//!
//! [`CropOptions`] is a plain value struct so it can cross process or thread
//! boundaries through [`CropOptions::to_json`] / [`CropOptions::from_json`].
//! Validation is synchronous: hosts call [`CropOptions::validate`] (or any
//! constructor that takes options) before showing any UI.

use serde::{Deserialize, Serialize};

use crate::decode::FilterType;
use crate::error::ConfigError;
use crate::geometry::PixelRect;

/// Shape of the crop window and of the produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropShape {
    #[default]
    Rectangle,
    /// Pixels outside the inscribed ellipse are made transparent.
    Oval,
}

/// When the rule-of-thirds guidelines are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guidelines {
    Off,
    On,
    /// Only while a handle is being dragged.
    #[default]
    OnTouch,
}

/// How the image is fitted into the view before any user zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// Scale up or down uniformly until the image touches the view edges.
    #[default]
    FitCenter,
    /// Natural size, centered.
    Center,
    /// Like `FitCenter` but never scales up.
    CenterInside,
    /// Scale uniformly until the view is fully covered.
    CenterCrop,
    /// Stretch each axis independently to the view size.
    FitXy,
}

/// How the sampled crop is brought to the requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Keep the cropped region at full resolution.
    #[default]
    None,
    /// Only apply the power-of-two sample size, no exact resize.
    Sampling,
    /// Shrink to fit inside the target, preserving aspect ratio. Never enlarges.
    ResizeInside,
    /// Scale to cover the target box and crop the overflow.
    ResizeFit,
    /// Stretch to exactly the target size.
    ResizeExact,
}

impl ResizePolicy {
    pub fn as_label(self) -> &'static str {
        match self {
            ResizePolicy::None => "none",
            ResizePolicy::Sampling => "sampling",
            ResizePolicy::ResizeInside => "resize_inside",
            ResizePolicy::ResizeFit => "resize_fit",
            ResizePolicy::ResizeExact => "resize_exact",
        }
    }

    /// True when the policy is meaningless without a target size.
    pub fn needs_target(self) -> bool {
        matches!(
            self,
            ResizePolicy::ResizeInside | ResizePolicy::ResizeFit | ResizePolicy::ResizeExact
        )
    }
}

/// Encoding of the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

/// Width:height ratio for the locked crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Width divided by height.
    pub fn value(&self) -> f64 {
        self.x as f64 / self.y as f64
    }

    /// The same ratio with the axes swapped.
    pub fn transposed(&self) -> Self {
        Self::new(self.y, self.x)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Output request: target size and the policy used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputRequest {
    pub width: u32,
    pub height: u32,
    pub policy: ResizePolicy,
}

impl OutputRequest {
    pub fn new(width: u32, height: u32, policy: ResizePolicy) -> Self {
        Self {
            width,
            height,
            policy,
        }
    }

    /// True when a non-zero target size is present.
    pub fn has_target(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Swap width and height, used when the output is rotated by 90/270.
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width, self.policy)
    }
}

/// Every recognized option of an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    pub crop_shape: CropShape,
    pub guidelines: Guidelines,
    pub scale_type: ScaleType,
    /// Edges closer than this (view pixels) to an image bound snap onto it.
    pub snap_radius: f64,
    /// Pointer distance (view pixels) within which a handle is grabbed.
    pub touch_radius: f64,
    pub max_zoom: u32,
    /// Fraction of the image left around the initial crop window on each side.
    pub initial_padding_ratio: f64,
    pub fix_aspect_ratio: bool,
    pub aspect_ratio: AspectRatio,
    pub min_crop_window_width: f64,
    pub min_crop_window_height: f64,
    /// `None` leaves the window limited only by the visible image.
    pub max_crop_window_width: Option<f64>,
    pub max_crop_window_height: Option<f64>,
    pub min_crop_result_width: u32,
    pub min_crop_result_height: u32,
    pub max_crop_result_width: u32,
    pub max_crop_result_height: u32,
    pub output: OutputRequest,
    pub output_format: OutputFormat,
    pub output_quality: u8,
    /// Resampling filter for resized output.
    pub resize_filter: FilterType,
    /// Report crop metadata without decoding any pixels.
    pub no_output_image: bool,
    /// Crop window restored at load time, in source pixel space.
    pub initial_crop_rect: Option<PixelRect>,
    pub initial_rotation: Option<i32>,
    pub rotation_step_degrees: u32,
    pub allow_rotation: bool,
    pub allow_flipping: bool,
    pub allow_counter_rotation: bool,
    pub flip_horizontally: bool,
    pub flip_vertically: bool,
    pub multi_touch_enabled: bool,
    pub auto_zoom_enabled: bool,
    /// Longest side of the display preview produced at load time.
    pub max_preview_dimension: u32,
    /// Allocation ceiling for a single decode, in bytes.
    pub decode_memory_limit: Option<u64>,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            crop_shape: CropShape::Rectangle,
            guidelines: Guidelines::OnTouch,
            scale_type: ScaleType::FitCenter,
            snap_radius: 3.0,
            touch_radius: 24.0,
            max_zoom: 4,
            initial_padding_ratio: 0.1,
            fix_aspect_ratio: false,
            aspect_ratio: AspectRatio::default(),
            min_crop_window_width: 42.0,
            min_crop_window_height: 42.0,
            max_crop_window_width: None,
            max_crop_window_height: None,
            min_crop_result_width: 40,
            min_crop_result_height: 40,
            max_crop_result_width: 99_999,
            max_crop_result_height: 99_999,
            output: OutputRequest::default(),
            output_format: OutputFormat::Jpeg,
            output_quality: 90,
            resize_filter: FilterType::Bilinear,
            no_output_image: false,
            initial_crop_rect: None,
            initial_rotation: None,
            rotation_step_degrees: 90,
            allow_rotation: true,
            allow_flipping: true,
            allow_counter_rotation: false,
            flip_horizontally: false,
            flip_vertically: false,
            multi_touch_enabled: false,
            auto_zoom_enabled: true,
            max_preview_dimension: 2048,
            decode_memory_limit: None,
        }
    }
}

impl CropOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the crop window to `x:y`.
    pub fn with_aspect_ratio(mut self, x: u32, y: u32) -> Self {
        self.fix_aspect_ratio = true;
        self.aspect_ratio = AspectRatio::new(x, y);
        self
    }

    pub fn with_output(mut self, width: u32, height: u32, policy: ResizePolicy) -> Self {
        self.output = OutputRequest::new(width, height, policy);
        self
    }

    /// Locked aspect ratio, if any.
    pub fn locked_aspect_ratio(&self) -> Option<AspectRatio> {
        self.fix_aspect_ratio.then_some(self.aspect_ratio)
    }

    /// Check every option against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snap_radius < 0.0 || self.snap_radius.is_nan() {
            return Err(ConfigError::NegativeSnapRadius(self.snap_radius));
        }
        if self.touch_radius < 0.0 || self.touch_radius.is_nan() {
            return Err(ConfigError::NegativeTouchRadius(self.touch_radius));
        }
        if self.max_zoom < 1 {
            return Err(ConfigError::InvalidMaxZoom(self.max_zoom));
        }
        if !(0.0..0.5).contains(&self.initial_padding_ratio) {
            return Err(ConfigError::InvalidPaddingRatio(self.initial_padding_ratio));
        }
        if self.aspect_ratio.x == 0 || self.aspect_ratio.y == 0 {
            return Err(ConfigError::InvalidAspectRatio {
                x: self.aspect_ratio.x,
                y: self.aspect_ratio.y,
            });
        }
        if self.min_crop_window_width < 0.0 || self.min_crop_window_height < 0.0 {
            return Err(ConfigError::NegativeMinWindow {
                width: self.min_crop_window_width,
                height: self.min_crop_window_height,
            });
        }
        if let Some(max) = self.max_crop_window_width {
            if max < self.min_crop_window_width {
                return Err(ConfigError::MaxWindowBelowMin {
                    axis: "width",
                    min: self.min_crop_window_width,
                    max,
                });
            }
        }
        if let Some(max) = self.max_crop_window_height {
            if max < self.min_crop_window_height {
                return Err(ConfigError::MaxWindowBelowMin {
                    axis: "height",
                    min: self.min_crop_window_height,
                    max,
                });
            }
        }
        if self.max_crop_result_width < self.min_crop_result_width {
            return Err(ConfigError::MaxResultBelowMin {
                axis: "width",
                min: self.min_crop_result_width,
                max: self.max_crop_result_width,
            });
        }
        if self.max_crop_result_height < self.min_crop_result_height {
            return Err(ConfigError::MaxResultBelowMin {
                axis: "height",
                min: self.min_crop_result_height,
                max: self.max_crop_result_height,
            });
        }
        if self.rotation_step_degrees == 0
            || self.rotation_step_degrees > 360
            || self.rotation_step_degrees % 90 != 0
        {
            return Err(ConfigError::InvalidRotationStep(self.rotation_step_degrees));
        }
        if let Some(rotation) = self.initial_rotation {
            if rotation % 90 != 0 {
                return Err(ConfigError::InvalidInitialRotation(rotation));
            }
        }
        if !(1..=100).contains(&self.output_quality) {
            return Err(ConfigError::InvalidQuality(self.output_quality));
        }
        if self.output.policy.needs_target() && !self.output.has_target() {
            return Err(ConfigError::MissingOutputSize {
                policy: self.output.policy.as_label(),
                width: self.output.width,
                height: self.output.height,
            });
        }
        if self.max_preview_dimension == 0 {
            return Err(ConfigError::InvalidPreviewDimension);
        }
        Ok(())
    }

    /// Encode the options as JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Decode options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: CropOptions =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CropOptions::default().validate().is_ok());
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut options = CropOptions::default();
        options.snap_radius = -1.0;
        assert_eq!(
            options.validate(),
            Err(ConfigError::NegativeSnapRadius(-1.0))
        );

        let mut options = CropOptions::default();
        options.touch_radius = -0.5;
        assert!(matches!(
            options.validate(),
            Err(ConfigError::NegativeTouchRadius(_))
        ));
    }

    #[test]
    fn test_zero_aspect_rejected() {
        let options = CropOptions::default().with_aspect_ratio(0, 4);
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidAspectRatio { x: 0, y: 4 })
        );
    }

    #[test]
    fn test_max_result_below_min_rejected() {
        let mut options = CropOptions::default();
        options.min_crop_result_width = 200;
        options.max_crop_result_width = 100;
        assert!(matches!(
            options.validate(),
            Err(ConfigError::MaxResultBelowMin { axis: "width", .. })
        ));
    }

    #[test]
    fn test_max_window_below_min_rejected() {
        let mut options = CropOptions::default();
        options.max_crop_window_height = Some(10.0);
        assert!(matches!(
            options.validate(),
            Err(ConfigError::MaxWindowBelowMin { axis: "height", .. })
        ));
    }

    #[test]
    fn test_padding_ratio_range() {
        let mut options = CropOptions::default();
        options.initial_padding_ratio = 0.5;
        assert!(options.validate().is_err());
        options.initial_padding_ratio = 0.0;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rotation_step_must_be_quarter_turns() {
        let mut options = CropOptions::default();
        for step in [0, 45, 400] {
            options.rotation_step_degrees = step;
            assert_eq!(
                options.validate(),
                Err(ConfigError::InvalidRotationStep(step))
            );
        }
        options.rotation_step_degrees = 180;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_resize_policy_needs_size() {
        let options = CropOptions::default().with_output(0, 300, ResizePolicy::ResizeInside);
        assert!(matches!(
            options.validate(),
            Err(ConfigError::MissingOutputSize { .. })
        ));

        let options = CropOptions::default().with_output(0, 0, ResizePolicy::Sampling);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_quality_range() {
        let mut options = CropOptions::default();
        options.output_quality = 0;
        assert_eq!(options.validate(), Err(ConfigError::InvalidQuality(0)));
    }

    #[test]
    fn test_json_round_trip_keeps_values() {
        let mut options = CropOptions::default().with_aspect_ratio(16, 9);
        options.crop_shape = CropShape::Oval;
        options.initial_crop_rect = Some(PixelRect::new(10, 20, 300, 200));

        let json = options.to_json().unwrap();
        let decoded = CropOptions::from_json(&json).unwrap();
        assert_eq!(decoded, options);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let options = CropOptions::from_json(r#"{"snap_radius": 5.0, "guidelines": "on"}"#).unwrap();
        assert_eq!(options.snap_radius, 5.0);
        assert_eq!(options.guidelines, Guidelines::On);
        assert_eq!(options.touch_radius, 24.0);
        assert_eq!(options.resize_filter, FilterType::Bilinear);

        let options = CropOptions::from_json(r#"{"resize_filter": "lanczos3"}"#).unwrap();
        assert_eq!(options.resize_filter, FilterType::Lanczos3);
    }

    #[test]
    fn test_from_json_validates() {
        let result = CropOptions::from_json(r#"{"max_zoom": 0}"#);
        assert_eq!(result, Err(ConfigError::InvalidMaxZoom(0)));

        let result = CropOptions::from_json("not json");
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_output_request_transposed() {
        let request = OutputRequest::new(400, 300, ResizePolicy::ResizeExact);
        let t = request.transposed();
        assert_eq!((t.width, t.height), (300, 400));
        assert_eq!(t.policy, ResizePolicy::ResizeExact);
    }
}
