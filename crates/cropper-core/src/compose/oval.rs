//! Oval crop shape.

use image::RgbaImage;

/// Normalized squared distance of a pixel center from the center of a
/// `width` x `height` image; 1.0 lies on the inscribed ellipse.
#[inline]
fn ellipse_distance_sq(x: u32, y: u32, width: u32, height: u32) -> f64 {
    let rx = (width as f64 / 2.0).max(0.5);
    let ry = (height as f64 / 2.0).max(0.5);
    let dx = (x as f64 + 0.5 - rx) / rx;
    let dy = (y as f64 + 0.5 - ry) / ry;
    dx * dx + dy * dy
}

/// Make every pixel outside the inscribed ellipse fully transparent.
pub fn apply_oval_mask(image: &mut RgbaImage) {
    let (width, height) = image.dimensions();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if ellipse_distance_sq(x, y, width, height) > 1.0 {
            pixel.0 = [0, 0, 0, 0];
        }
    }
}
