//! Cropper Core - interactive image crop engine
//!
//! This crate provides the geometry and pixel pipeline behind an interactive
//! crop view: a movable, resizable crop window driven by pointer input, the
//! mapping between view space and source pixels across rotation, flip and
//! zoom, and a memory-bounded decode of only the pixels a crop needs.
//!
//! Typical flow:
//! 1. Create a [`CropSession`] (or a bare [`CropEditor`]) from [`CropOptions`]
//! 2. Load an image through a [`SourceResolver`](decode::SourceResolver)
//! 3. Feed pointer events and rotate/flip/zoom calls to the editor
//! 4. Request a crop; the result arrives as a [`CroppedImage`] carrying the
//!    output and its [`CropResult`] metadata

pub mod cancel;
pub mod compose;
pub mod crop;
pub mod decode;
pub mod encode;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod options;
pub mod render;
pub mod result;
pub mod session;
pub mod transform;
pub mod window;
pub mod zoom;

pub use cancel::CancelToken;
pub use compose::{CropOutput, OutputComposer, OutputTarget, OutputTransform};
pub use crop::{CropJob, CropPlan, CroppedImage};
pub use error::{ConfigError, CropError, CropFailureKind};
pub use geometry::{BoundPoints, CropRect, PixelRect, Point};
pub use gesture::{GestureController, GestureOutcome, PointerEvent};
pub use options::{
    AspectRatio, CropOptions, CropShape, Guidelines, OutputFormat, OutputRequest, ResizePolicy,
    ScaleType,
};
pub use render::{CropSurface, RenderFrame};
pub use result::CropResult;
pub use session::{CropEditor, CropSession, SessionEvent};
pub use transform::CoordinateTransformer;
pub use window::{CropWindowHandler, HandleType};
pub use zoom::AutoZoomController;
