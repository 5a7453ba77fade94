//! Region decoders: read a sub-rectangle of the upright image at a reduced
//! resolution.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits, RgbaImage};

use crate::cancel::CancelToken;
use crate::geometry::PixelRect;

use super::{exif, stream, DecodeError, Orientation, SourceInfo};

/// Decodes regions of one source image.
///
/// Coordinates are in the upright (orientation corrected) image.
pub trait RegionDecoder: Send + Sync + std::fmt::Debug {
    /// Upright dimensions in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Decode `region` keeping every `sample_size`-th pixel on both axes.
    ///
    /// `region` must lie inside [`dimensions`](Self::dimensions). The output
    /// is `ceil(width / s) x ceil(height / s)`. Implementations check
    /// `cancel` between rows and return [`DecodeError::Cancelled`] once it
    /// is set.
    fn decode_region(
        &self,
        region: PixelRect,
        sample_size: u32,
        cancel: &CancelToken,
    ) -> Result<RgbaImage, DecodeError>;
}

/// Output size of a region decode at `sample_size`.
pub fn sampled_dimensions(width: u32, height: u32, sample_size: u32) -> (u32, u32) {
    let s = sample_size.max(1);
    (width.div_ceil(s).max(1), height.div_ceil(s).max(1))
}

/// Nearest-pixel subsampling of `region`, reading pixels through `pixel`.
pub(super) fn subsample<F>(
    region: PixelRect,
    sample_size: u32,
    cancel: &CancelToken,
    mut pixel: F,
) -> Result<RgbaImage, DecodeError>
where
    F: FnMut(u32, u32) -> image::Rgba<u8>,
{
    let s = sample_size.max(1);
    let (out_w, out_h) = sampled_dimensions(region.width, region.height, s);
    let (x0, y0) = (region.x.max(0) as u32, region.y.max(0) as u32);
    let mut out = RgbaImage::new(out_w, out_h);
    for y in 0..out_h {
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        for x in 0..out_w {
            out.put_pixel(x, y, pixel(x0 + x * s, y0 + y * s));
        }
    }
    Ok(out)
}

/// Region decoder over pixels that are already in memory.
#[derive(Debug, Clone)]
pub struct RasterSource {
    image: Arc<RgbaImage>,
    pixel_budget: Option<u64>,
}

impl RasterSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            pixel_budget: None,
        }
    }

    /// Refuse decodes producing more than `pixels` output pixels with
    /// [`DecodeError::OutOfMemory`].
    pub fn with_pixel_budget(mut self, pixels: u64) -> Self {
        self.pixel_budget = Some(pixels);
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl RegionDecoder for RasterSource {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn decode_region(
        &self,
        region: PixelRect,
        sample_size: u32,
        cancel: &CancelToken,
    ) -> Result<RgbaImage, DecodeError> {
        let (w, h) = sampled_dimensions(region.width, region.height, sample_size);
        if let Some(budget) = self.pixel_budget {
            if w as u64 * h as u64 > budget {
                return Err(DecodeError::OutOfMemory);
            }
        }
        let image = &self.image;
        subsample(region, sample_size, cancel, |x, y| *image.get_pixel(x, y))
    }
}

/// Region decoder over encoded bytes (JPEG or PNG).
///
/// Non-interlaced PNG is streamed row by row and keeps only the sampled
/// pixels, so a larger sample size needs less memory. Other files are decoded
/// whole under the allocation limit. Either way the pixels are read through
/// the EXIF orientation instead of rotating the image.
#[derive(Debug, Clone)]
pub struct EncodedSource {
    bytes: Arc<[u8]>,
    info: SourceInfo,
    format: Option<ImageFormat>,
    memory_limit: Option<u64>,
}

impl EncodedSource {
    /// Probe `bytes` and build a decoder for them.
    pub fn new(bytes: Arc<[u8]>) -> Result<Self, DecodeError> {
        let info = exif::probe(&bytes)?;
        let format = image::guess_format(&bytes).ok();
        Ok(Self {
            bytes,
            info,
            format,
            memory_limit: None,
        })
    }

    /// Cap the allocation of a single decode; exceeding it is reported as
    /// [`DecodeError::OutOfMemory`].
    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn orientation(&self) -> Orientation {
        self.info.orientation
    }

    fn decode_stored(&self) -> Result<DynamicImage, DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(&self.bytes[..])).with_guessed_format()?;
        let mut limits = Limits::default();
        limits.max_alloc = self.memory_limit;
        reader.limits(limits);
        Ok(reader.decode()?)
    }
}

impl RegionDecoder for EncodedSource {
    fn dimensions(&self) -> (u32, u32) {
        self.info.oriented_dimensions()
    }

    fn decode_region(
        &self,
        region: PixelRect,
        sample_size: u32,
        cancel: &CancelToken,
    ) -> Result<RgbaImage, DecodeError> {
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let orientation = self.info.orientation;
        let upright = self.dimensions();
        if self.format == Some(ImageFormat::Png) {
            let streamed = stream::decode_png_region(
                &self.bytes,
                region,
                sample_size,
                orientation,
                upright,
                self.memory_limit,
                cancel,
            )?;
            if let Some(image) = streamed {
                return Ok(image);
            }
        }

        let (out_w, out_h) = sampled_dimensions(region.width, region.height, sample_size);
        let (stored_w, stored_h) = (self.info.width as u64, self.info.height as u64);
        stream::check_budget(
            (stored_w * stored_h + out_w as u64 * out_h as u64) * 4,
            self.memory_limit,
        )?;
        let stored = self.decode_stored()?;
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        subsample(region, sample_size, cancel, |x, y| {
            let (sx, sy) = orientation.to_stored(x, y, upright);
            stored.get_pixel(sx, sy)
        })
    }
}
