//! Final resize of the oriented crop.

use image::imageops;
use image::RgbaImage;

use crate::decode::FilterType;
use crate::error::CropFailureKind;
use crate::options::{OutputRequest, ResizePolicy};

/// Size `ResizeInside` shrinks a `width` x `height` image to; unchanged when
/// it already fits.
pub fn inside_dimensions(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if width <= target_w && height <= target_h {
        return (width, height);
    }
    let scale = (target_w as f64 / width as f64).min(target_h as f64 / height as f64);
    (
        ((width as f64 * scale).round() as u32).clamp(1, target_w),
        ((height as f64 * scale).round() as u32).clamp(1, target_h),
    )
}

/// Apply `request` to `image`.
///
/// # Errors
///
/// `CropFailureKind::Resize` when the policy needs a target and none is set.
pub fn apply_resize(
    image: RgbaImage,
    request: &OutputRequest,
    filter: FilterType,
) -> Result<RgbaImage, CropFailureKind> {
    if request.policy.needs_target() && !request.has_target() {
        return Err(CropFailureKind::Resize {
            width: request.width,
            height: request.height,
        });
    }
    let (width, height) = image.dimensions();
    let (target_w, target_h) = (request.width, request.height);
    let filter = filter.to_image_filter();

    let out = match request.policy {
        ResizePolicy::None | ResizePolicy::Sampling => image,
        ResizePolicy::ResizeInside => {
            let (w, h) = inside_dimensions(width, height, target_w, target_h);
            if (w, h) == (width, height) {
                image
            } else {
                imageops::resize(&image, w, h, filter)
            }
        }
        ResizePolicy::ResizeExact => {
            if (width, height) == (target_w, target_h) {
                image
            } else {
                imageops::resize(&image, target_w, target_h, filter)
            }
        }
        ResizePolicy::ResizeFit => {
            // Cover the target box, then cut the overflow evenly from both sides
            let scale = (target_w as f64 / width as f64).max(target_h as f64 / height as f64);
            let cover_w = ((width as f64 * scale).ceil() as u32).max(target_w);
            let cover_h = ((height as f64 * scale).ceil() as u32).max(target_h);
            let covered = imageops::resize(&image, cover_w, cover_h, filter);
            let x = (cover_w - target_w) / 2;
            let y = (cover_h - target_h) / 2;
            imageops::crop_imm(&covered, x, y, target_w, target_h).to_image()
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn request(width: u32, height: u32, policy: ResizePolicy) -> OutputRequest {
        OutputRequest::new(width, height, policy)
    }

    #[test]
    fn test_inside_shrinks_preserving_aspect() {
        let image = RgbaImage::new(500, 375);
        let out = apply_resize(image, &request(400, 300, ResizePolicy::ResizeInside), FilterType::Bilinear)
            .unwrap();
        assert_eq!(out.dimensions(), (400, 300));
    }

    #[test]
    fn test_inside_never_enlarges() {
        let image = RgbaImage::new(100, 50);
        let out = apply_resize(image, &request(400, 300, ResizePolicy::ResizeInside), FilterType::Bilinear)
            .unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn test_inside_dimensions_limited_by_tighter_axis() {
        assert_eq!(inside_dimensions(1000, 500, 400, 400), (400, 200));
        assert_eq!(inside_dimensions(500, 1000, 400, 400), (200, 400));
    }

    #[test]
    fn test_exact_stretches() {
        let image = RgbaImage::new(100, 50);
        let out = apply_resize(image, &request(30, 90, ResizePolicy::ResizeExact), FilterType::Nearest)
            .unwrap();
        assert_eq!(out.dimensions(), (30, 90));
    }

    #[test]
    fn test_fit_covers_and_crops_center() {
        // Left half red, right half blue; a square fit keeps the middle
        let image = RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let out = apply_resize(image, &request(50, 50, ResizePolicy::ResizeFit), FilterType::Nearest)
            .unwrap();
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.get_pixel(0, 25).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(49, 25).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_none_and_sampling_keep_size() {
        for policy in [ResizePolicy::None, ResizePolicy::Sampling] {
            let out = apply_resize(RgbaImage::new(37, 21), &request(10, 10, policy), FilterType::Bilinear)
                .unwrap();
            assert_eq!(out.dimensions(), (37, 21));
        }
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let result = apply_resize(
            RgbaImage::new(10, 10),
            &request(0, 10, ResizePolicy::ResizeFit),
            FilterType::Bilinear,
        );
        assert!(matches!(result, Err(CropFailureKind::Resize { width: 0, height: 10 })));
    }
}

// =============================================================================
// Property-Based Tests
// =============================================================================
