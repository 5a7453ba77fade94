//! Output composition.
//!
//! Turns a sampled crop region into the final output:
//! - Rotation and mirroring at the pixel level ([`apply_transform`])
//! - Resize per [`ResizePolicy`](crate::options::ResizePolicy) ([`apply_resize`])
//! - Oval masking ([`apply_oval_mask`])
//! - Encoding and persisting ([`OutputComposer::deliver`])

mod orient;
mod oval;
mod resize;

use std::path::PathBuf;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::FilterType;
use crate::encode::{encode_image, write_encoded};
use crate::error::CropError;
use crate::options::{CropOptions, CropShape, OutputFormat, OutputRequest};

pub use orient::{apply_transform, OutputTransform};
pub use oval::apply_oval_mask;
pub use resize::{apply_resize, inside_dimensions};

/// Where a finished crop goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OutputTarget {
    /// Keep the RGBA pixels in memory.
    #[default]
    Bitmap,
    /// Encode in the configured format and return the bytes.
    Encoded,
    /// Encode and write to `path`.
    File { path: PathBuf },
}

/// A delivered crop.
#[derive(Debug, Clone)]
pub enum CropOutput {
    /// Metadata-only request; nothing was decoded.
    None,
    Bitmap(RgbaImage),
    Encoded { bytes: Vec<u8>, format: OutputFormat },
    File { path: PathBuf, format: OutputFormat },
}

impl CropOutput {
    pub fn bitmap(&self) -> Option<&RgbaImage> {
        match self {
            CropOutput::Bitmap(image) => Some(image),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            CropOutput::Encoded { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Path the output was persisted to, if any.
    pub fn location(&self) -> Option<&PathBuf> {
        match self {
            CropOutput::File { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Finalizes sampled crops.
#[derive(Debug, Clone)]
pub struct OutputComposer {
    shape: CropShape,
    request: OutputRequest,
    filter: FilterType,
    format: OutputFormat,
    quality: u8,
}

impl OutputComposer {
    pub fn new(options: &CropOptions) -> Self {
        Self {
            shape: options.crop_shape,
            request: options.output,
            filter: options.resize_filter,
            format: options.output_format,
            quality: options.output_quality,
        }
    }

    /// Output request, expressed in the output's orientation.
    pub fn request(&self) -> &OutputRequest {
        &self.request
    }

    /// Orient, resize and shape a sampled region.
    pub fn compose(&self, sampled: RgbaImage, transform: OutputTransform) -> Result<RgbaImage, CropError> {
        let oriented = apply_transform(sampled, transform);
        let mut image =
            apply_resize(oriented, &self.request, self.filter).map_err(CropError::CropFailure)?;
        if self.shape == CropShape::Oval {
            apply_oval_mask(&mut image);
        }
        debug!(
            width = image.width(),
            height = image.height(),
            rotation = transform.rotation,
            "output composed"
        );
        Ok(image)
    }

    /// Hand `image` over to `target`, encoding when needed.
    pub fn deliver(&self, image: RgbaImage, target: &OutputTarget) -> Result<CropOutput, CropError> {
        match target {
            OutputTarget::Bitmap => Ok(CropOutput::Bitmap(image)),
            OutputTarget::Encoded => {
                let bytes = encode_image(&image, self.format, self.quality)?;
                Ok(CropOutput::Encoded {
                    bytes,
                    format: self.format,
                })
            }
            OutputTarget::File { path } => {
                let bytes = encode_image(&image, self.format, self.quality)?;
                write_encoded(path, &bytes)?;
                debug!(path = %path.display(), bytes = bytes.len(), "output written");
                Ok(CropOutput::File {
                    path: path.clone(),
                    format: self.format,
                })
            }
        }
    }
}
