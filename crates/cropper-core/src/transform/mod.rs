//! Image placement in the view: rotation, mirroring, fit scale and zoom.
//!
//! The editor keeps a single [`CoordinateTransformer`] per loaded image. The
//! crop window lives in view coordinates; every time the image transform
//! changes the window is mapped through image space so it keeps covering the
//! same source pixels.
//!
//! # Coordinate System
//!
//! - Rotation angles are in degrees, positive = clockwise
//! - Only quarter turns are supported
//! - Origin is the top-left corner, y grows downwards

mod coordinates;
mod matrix;

pub use coordinates::{base_scale, CoordinateTransformer, ImageTransformState};
pub use matrix::Affine;
