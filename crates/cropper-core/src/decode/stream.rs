//! Streaming PNG region decode.
//!
//! Rows are read one at a time and only the pixels hit by the sampled region
//! are kept, so memory follows the output size rather than the stored image.

use std::io::Cursor;

use image::{Rgba, RgbaImage};
use png::{BitDepth, ColorType, Transformations};
use tracing::trace;

use crate::cancel::CancelToken;
use crate::geometry::PixelRect;

use super::region::{sampled_dimensions, subsample};
use super::{DecodeError, Orientation};

/// Stored-space grid of the pixels a sampled upright region reads.
///
/// Orientation only mirrors and transposes, so the sample points of an
/// upright region land on a regular grid with the same step in the stored
/// image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Lattice {
    x: u32,
    y: u32,
    cols: u32,
    rows: u32,
    step: u32,
}

impl Lattice {
    pub(super) fn new(
        region: PixelRect,
        sample_size: u32,
        orientation: Orientation,
        upright: (u32, u32),
    ) -> Self {
        let step = sample_size.max(1);
        let (out_w, out_h) = sampled_dimensions(region.width, region.height, step);
        let (x0, y0) = (region.x.max(0) as u32, region.y.max(0) as u32);
        let first = orientation.to_stored(x0, y0, upright);
        let last = orientation.to_stored(x0 + (out_w - 1) * step, y0 + (out_h - 1) * step, upright);
        let (x, y) = (first.0.min(last.0), first.1.min(last.1));
        Self {
            x,
            y,
            cols: (first.0.max(last.0) - x) / step + 1,
            rows: (first.1.max(last.1) - y) / step + 1,
            step,
        }
    }

    /// Grid row holding stored row `stored_y`, if the region reads it.
    fn row_index(&self, stored_y: u32) -> Option<u32> {
        if stored_y < self.y || (stored_y - self.y) % self.step != 0 {
            return None;
        }
        let row = (stored_y - self.y) / self.step;
        (row < self.rows).then_some(row)
    }

    fn last_row(&self) -> u32 {
        self.y + (self.rows - 1) * self.step
    }

    fn column(&self, col: u32) -> u32 {
        self.x + col * self.step
    }

    fn cell(&self, stored: (u32, u32)) -> usize {
        let col = (stored.0 - self.x) / self.step;
        let row = (stored.1 - self.y) / self.step;
        (row * self.cols + col) as usize
    }

    fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    fn bytes(&self) -> u64 {
        self.len() as u64 * 4
    }
}

pub(super) fn check_budget(bytes: u64, limit: Option<u64>) -> Result<(), DecodeError> {
    match limit {
        Some(limit) if bytes > limit => Err(DecodeError::OutOfMemory),
        _ => Ok(()),
    }
}

/// Decode `region` of a PNG at `sample_size` without holding the full image.
///
/// `upright` is the size of the image after `orientation` is applied. Returns
/// `Ok(None)` for interlaced or palette files; those need the whole image and
/// go through the regular decoder instead.
///
/// # Errors
///
/// * `DecodeError::OutOfMemory` when row buffers, sample grid and output
///   together exceed `memory_limit`
/// * `DecodeError::Cancelled` when `cancel` is set between rows
/// * `DecodeError::CorruptedFile` when the stream is invalid or ends early
pub(super) fn decode_png_region(
    bytes: &[u8],
    region: PixelRect,
    sample_size: u32,
    orientation: Orientation,
    upright: (u32, u32),
    memory_limit: Option<u64>,
    cancel: &CancelToken,
) -> Result<Option<RgbaImage>, DecodeError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(png_error)?;
    if reader.info().interlaced {
        return Ok(None);
    }
    let channels = match reader.output_color_type() {
        (ColorType::Grayscale, BitDepth::Eight) => 1,
        (ColorType::GrayscaleAlpha, BitDepth::Eight) => 2,
        (ColorType::Rgb, BitDepth::Eight) => 3,
        (ColorType::Rgba, BitDepth::Eight) => 4,
        _ => return Ok(None),
    };

    let lattice = Lattice::new(region, sample_size, orientation, upright);
    let (out_w, out_h) = sampled_dimensions(region.width, region.height, sample_size);
    let line = reader
        .output_line_size(reader.info().width)
        .ok_or(DecodeError::OutOfMemory)? as u64;
    check_budget(
        2 * line + lattice.bytes() + out_w as u64 * out_h as u64 * 4,
        memory_limit,
    )?;

    let mut grid = vec![Rgba([0, 0, 0, 0]); lattice.len()];
    let last_row = lattice.last_row();
    let mut stored_y = 0u32;
    let mut complete = false;
    while let Some(row) = reader.next_row().map_err(png_error)? {
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        if let Some(grid_row) = lattice.row_index(stored_y) {
            let data = row.data();
            let start = (grid_row * lattice.cols) as usize;
            for col in 0..lattice.cols {
                grid[start + col as usize] = png_pixel(data, lattice.column(col) as usize, channels);
            }
        }
        if stored_y == last_row {
            complete = true;
            break;
        }
        stored_y += 1;
    }
    if !complete {
        return Err(DecodeError::CorruptedFile(format!(
            "image data ended at row {stored_y}"
        )));
    }
    trace!(rows = stored_y + 1, grid = lattice.len(), "png region streamed");

    subsample(region, sample_size, cancel, |x, y| {
        grid[lattice.cell(orientation.to_stored(x, y, upright))]
    })
    .map(Some)
}

fn png_pixel(data: &[u8], x: usize, channels: usize) -> Rgba<u8> {
    let p = &data[x * channels..(x + 1) * channels];
    match channels {
        1 => Rgba([p[0], p[0], p[0], 255]),
        2 => Rgba([p[0], p[0], p[0], p[1]]),
        3 => Rgba([p[0], p[1], p[2], 255]),
        _ => Rgba([p[0], p[1], p[2], p[3]]),
    }
}

fn png_error(err: png::DecodingError) -> DecodeError {
    match err {
        png::DecodingError::IoError(io) => DecodeError::from(io),
        png::DecodingError::LimitsExceeded => DecodeError::OutOfMemory,
        other => DecodeError::CorruptedFile(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{apply_orientation, png_bytes, RasterSource, RegionDecoder};
    use image::{DynamicImage, ImageFormat};

    const ORIENTATIONS: [Orientation; 8] = [
        Orientation::Normal,
        Orientation::FlipHorizontal,
        Orientation::Rotate180,
        Orientation::FlipVertical,
        Orientation::Transpose,
        Orientation::Rotate90CW,
        Orientation::Transverse,
        Orientation::Rotate270CW,
    ];

    #[test]
    fn test_lattice_covers_sampled_rows() {
        let lattice = Lattice::new(PixelRect::new(10, 20, 17, 9), 4, Orientation::Normal, (100, 100));
        assert_eq!(
            lattice,
            Lattice { x: 10, y: 20, cols: 5, rows: 3, step: 4 }
        );
        assert_eq!(lattice.row_index(20), Some(0));
        assert_eq!(lattice.row_index(21), None);
        assert_eq!(lattice.row_index(28), Some(2));
        assert_eq!(lattice.row_index(32), None);
        assert_eq!(lattice.last_row(), 28);
        assert_eq!(lattice.cell((26, 24)), 5 + 4);
    }

    #[test]
    fn test_lattice_follows_rotation() {
        // upright 60x100 of a stored 100x60 image turned a quarter clockwise
        let lattice = Lattice::new(PixelRect::new(0, 0, 10, 30), 10, Orientation::Rotate90CW, (60, 100));
        assert_eq!(lattice.cols, 3);
        assert_eq!(lattice.rows, 1);
        assert_eq!(lattice.y, 59);
    }

    #[test]
    fn test_matches_full_decode_for_every_orientation() {
        let bytes = png_bytes(37, 23);
        let stored = image::load_from_memory(&bytes).unwrap();
        let region = PixelRect::new(3, 5, 17, 14);
        for orientation in ORIENTATIONS {
            let upright = apply_orientation(stored.clone(), orientation).into_rgba8();
            let dims = upright.dimensions();
            let expected = RasterSource::new(upright)
                .decode_region(region, 3, &CancelToken::new())
                .unwrap();
            let streamed = decode_png_region(&bytes, region, 3, orientation, dims, None, &CancelToken::new())
                .unwrap()
                .unwrap();
            assert_eq!(streamed, expected, "{:?}", orientation);
        }
    }

    #[test]
    fn test_budget_scales_with_sample_size() {
        let bytes = png_bytes(512, 512);
        let region = PixelRect::new(0, 0, 512, 512);
        let limit = Some(200_000);
        let full = decode_png_region(&bytes, region, 1, Orientation::Normal, (512, 512), limit, &CancelToken::new());
        assert!(matches!(full, Err(DecodeError::OutOfMemory)));

        let small = decode_png_region(&bytes, region, 4, Orientation::Normal, (512, 512), limit, &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(small.dimensions(), (128, 128));
        assert_eq!(small.get_pixel(1, 2).0, [4, 8, 128, 255]);
    }

    #[test]
    fn test_cancel_stops_streaming() {
        let bytes = png_bytes(64, 64);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = decode_png_region(&bytes, PixelRect::new(0, 0, 64, 64), 1, Orientation::Normal, (64, 64), None, &cancel);
        assert!(matches!(result, Err(DecodeError::Cancelled)));
    }

    #[test]
    fn test_grayscale_alpha_is_expanded() {
        let img = image::GrayAlphaImage::from_fn(8, 8, |x, _| image::LumaA([x as u8 * 10, 200]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageLumaA8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        let decoded = decode_png_region(
            out.get_ref(),
            PixelRect::new(2, 0, 4, 4),
            1,
            Orientation::Normal,
            (8, 8),
            None,
            &CancelToken::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(decoded.get_pixel(1, 0).0, [30, 30, 30, 200]);
    }

    #[test]
    fn test_truncated_file_is_corrupted() {
        let bytes = png_bytes(64, 64);
        let truncated = &bytes[..bytes.len() / 2];
        let result = decode_png_region(truncated, PixelRect::new(0, 0, 64, 64), 1, Orientation::Normal, (64, 64), None, &CancelToken::new());
        assert!(result.is_err());
    }
}
