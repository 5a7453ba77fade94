//! Loading an image reference into a display preview plus a region decoder.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::geometry::PixelRect;
use crate::options::CropOptions;

use super::region::{EncodedSource, RasterSource, RegionDecoder};
use super::sampler::MAX_DECODE_ATTEMPTS;
use super::source::SourceResolver;
use super::{DecodeError, Orientation};

/// Smallest power of two that brings both sides within `max_dimension`.
pub fn preview_sample_size(width: u32, height: u32, max_dimension: u32) -> u32 {
    let max_dimension = max_dimension.max(1);
    let mut sample_size = 1u32;
    while sample_size < (1 << 30)
        && (width.div_ceil(sample_size) > max_dimension
            || height.div_ceil(sample_size) > max_dimension)
    {
        sample_size *= 2;
    }
    sample_size
}

/// A loaded image: what the editor displays and what crops decode from.
#[derive(Clone)]
pub struct LoadedImage {
    pub reference: String,
    /// Upright full resolution size.
    pub width: u32,
    pub height: u32,
    /// EXIF orientation that was applied.
    pub orientation: Orientation,
    /// Upright preview, downsampled by `preview_sample_size`.
    pub preview: Arc<RgbaImage>,
    pub preview_sample_size: u32,
    /// Full resolution region decoder.
    pub decoder: Arc<dyn RegionDecoder>,
}

impl fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedImage")
            .field("reference", &self.reference)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("orientation", &self.orientation)
            .field("preview", &self.preview.dimensions())
            .field("preview_sample_size", &self.preview_sample_size)
            .finish()
    }
}

impl LoadedImage {
    /// Build from any region decoder, decoding the preview.
    pub fn from_decoder(
        reference: impl Into<String>,
        decoder: Arc<dyn RegionDecoder>,
        orientation: Orientation,
        max_preview_dimension: u32,
        cancel: &CancelToken,
    ) -> Result<Self, DecodeError> {
        let (width, height) = decoder.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidFormat);
        }
        let full = PixelRect::new(0, 0, width, height);
        let mut sample_size = preview_sample_size(width, height, max_preview_dimension);
        let mut attempt = 1;
        let preview = loop {
            match decoder.decode_region(full, sample_size, cancel) {
                Ok(preview) => break preview,
                Err(DecodeError::OutOfMemory) if attempt < MAX_DECODE_ATTEMPTS => {
                    warn!(attempt, sample_size, "out of memory decoding preview, retrying smaller");
                    sample_size *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        Ok(Self {
            reference: reference.into(),
            width,
            height,
            orientation,
            preview: Arc::new(preview),
            preview_sample_size: sample_size,
            decoder,
        })
    }

    /// Wrap pixels the host already holds.
    pub fn from_raster(
        reference: impl Into<String>,
        image: RgbaImage,
        max_preview_dimension: u32,
    ) -> Result<Self, DecodeError> {
        Self::from_decoder(
            reference,
            Arc::new(RasterSource::new(image)),
            Orientation::Normal,
            max_preview_dimension,
            &CancelToken::new(),
        )
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Resolves references and decodes them into [`LoadedImage`]s.
#[derive(Clone)]
pub struct ImageLoader {
    resolver: Arc<dyn SourceResolver>,
    max_preview_dimension: u32,
    memory_limit: Option<u64>,
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("max_preview_dimension", &self.max_preview_dimension)
            .field("memory_limit", &self.memory_limit)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    pub fn new(resolver: Arc<dyn SourceResolver>, options: &CropOptions) -> Self {
        Self {
            resolver,
            max_preview_dimension: options.max_preview_dimension,
            memory_limit: options.decode_memory_limit,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn SourceResolver> {
        &self.resolver
    }

    /// Resolve, probe and preview-decode `reference`.
    ///
    /// # Errors
    ///
    /// Resolver errors (missing source, permission) pass through unchanged;
    /// undecodable bytes give `DecodeError::InvalidFormat` or
    /// `DecodeError::CorruptedFile`.
    pub fn load(&self, reference: &str, cancel: &CancelToken) -> Result<LoadedImage, DecodeError> {
        let bytes = self.resolver.open(reference)?;
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let source = EncodedSource::new(bytes)?.with_memory_limit(self.memory_limit);
        let orientation = source.orientation();
        let loaded = LoadedImage::from_decoder(
            reference,
            Arc::new(source),
            orientation,
            self.max_preview_dimension,
            cancel,
        )?;
        info!(
            reference,
            width = loaded.width,
            height = loaded.height,
            preview_sample_size = loaded.preview_sample_size,
            "image loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::exif::tests::png_bytes;
    use crate::decode::MemoryResolver;

    #[test]
    fn test_preview_sample_size() {
        assert_eq!(preview_sample_size(2048, 1000, 2048), 1);
        assert_eq!(preview_sample_size(2049, 1000, 2048), 2);
        assert_eq!(preview_sample_size(8000, 6000, 2048), 4);
        assert_eq!(preview_sample_size(10, 10, 0), 16);
    }

    #[test]
    fn test_load_from_memory() {
        let resolver = Arc::new(MemoryResolver::new());
        resolver.insert("photo", png_bytes(300, 200));
        let mut options = CropOptions::default();
        options.max_preview_dimension = 100;
        let loader = ImageLoader::new(resolver, &options);

        let loaded = loader.load("photo", &CancelToken::new()).unwrap();
        assert_eq!(loaded.dimensions(), (300, 200));
        assert_eq!(loaded.preview_sample_size, 4);
        assert_eq!(loaded.preview.dimensions(), (75, 50));
        assert_eq!(loaded.decoder.dimensions(), (300, 200));
    }

    #[test]
    fn test_load_missing_reference() {
        let loader = ImageLoader::new(Arc::new(MemoryResolver::new()), &CropOptions::default());
        let result = loader.load("nothing", &CancelToken::new());
        assert!(matches!(result, Err(DecodeError::SourceUnavailable(_))));
    }

    #[test]
    fn test_load_garbage_bytes() {
        let resolver = Arc::new(MemoryResolver::new());
        resolver.insert("junk", vec![1u8, 2, 3, 4, 5]);
        let loader = ImageLoader::new(resolver, &CropOptions::default());
        assert!(matches!(
            loader.load("junk", &CancelToken::new()),
            Err(DecodeError::InvalidFormat)
        ));
    }

    #[test]
    fn test_preview_retries_on_out_of_memory() {
        let image = RgbaImage::new(400, 400);
        let decoder = Arc::new(RasterSource::new(image).with_pixel_budget(100 * 100));
        let loaded =
            LoadedImage::from_decoder("raw", decoder, Orientation::Normal, 400, &CancelToken::new())
                .unwrap();
        assert_eq!(loaded.preview_sample_size, 4);
        assert_eq!(loaded.preview.dimensions(), (100, 100));
    }

    #[test]
    fn test_from_raster() {
        let loaded = LoadedImage::from_raster("pixels", RgbaImage::new(50, 40), 2048).unwrap();
        assert_eq!(loaded.dimensions(), (50, 40));
        assert_eq!(loaded.preview_sample_size, 1);
    }
}
