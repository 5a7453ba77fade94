//! Pixel-level rotation and mirroring of the sampled crop.

use image::imageops;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Rotation and flips that turn the upright crop into what the user saw.
///
/// Applied in this order: clockwise rotation, then mirroring along the
/// output's own axes. This matches how the editor composes its display
/// matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTransform {
    /// Clockwise degrees, one of 0, 90, 180, 270.
    pub rotation: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl OutputTransform {
    pub fn new(rotation: u32, flip_horizontal: bool, flip_vertical: bool) -> Self {
        Self {
            rotation: rotation % 360,
            flip_horizontal,
            flip_vertical,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == 0 && !self.flip_horizontal && !self.flip_vertical
    }

    /// True when the output's width and height are the source's swapped.
    pub fn swaps_dimensions(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    /// Size after the transform of a `width` x `height` image.
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Rotate then mirror `image`.
pub fn apply_transform(image: RgbaImage, transform: OutputTransform) -> RgbaImage {
    if transform.is_identity() {
        return image;
    }
    let mut out = match transform.rotation {
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        _ => image,
    };
    if transform.flip_horizontal {
        imageops::flip_horizontal_in_place(&mut out);
    }
    if transform.flip_vertical {
        imageops::flip_vertical_in_place(&mut out);
    }
    out
}
