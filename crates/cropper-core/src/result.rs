//! Crop result metadata.
//!
//! [`CropResult`] is what a host keeps after a crop: enough to locate the
//! output and to map it back onto the full resolution source. It is a plain
//! value with explicit JSON [`encode`](CropResult::encode) and
//! [`decode`](CropResult::decode).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::geometry::PixelRect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropResult {
    /// Reference the image was loaded from.
    pub original_reference: String,
    /// Where the encoded output was written, for file targets.
    pub output_location: Option<PathBuf>,
    /// Failure description; `None` on success.
    pub error: Option<String>,
    /// Crop window corners in upright source pixels, as
    /// `[x0, y0, x1, y1, x2, y2, x3, y3]` clockwise from the window's top-left.
    pub crop_points: [f64; 8],
    /// Region taken from the upright source.
    pub crop_rect: PixelRect,
    pub whole_image_rect: PixelRect,
    /// Clockwise degrees applied to the output.
    pub rotation: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Power-of-two factor the region was decoded at.
    pub sample_size: u32,
    /// True when the region exceeded the source and was padded.
    pub clamped: bool,
    /// Final output size, `None` when nothing was decoded.
    pub output_size: Option<(u32, u32)>,
}

impl CropResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
