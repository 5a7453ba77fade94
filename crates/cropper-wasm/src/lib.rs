//! Cropper WASM - WebAssembly bindings for the crop engine
//!
//! Exposes the cropper-core editor and one-shot cropping to
//! JavaScript/TypeScript applications.
//!
//! # Module Structure
//!
//! - `editor` - Interactive crop editor (pointer input, rotation, rendering)
//! - `crop` - One-shot crop of encoded bytes
//! - `types` - WASM-compatible wrapper types for crop output
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsCropEditor } from '@cropper/wasm';
//!
//! await init();
//!
//! const editor = new JsCropEditor({ fix_aspect_ratio: true });
//! editor.load_bytes('photo.jpg', new Uint8Array(await file.arrayBuffer()));
//! editor.set_view_size(canvas.width, canvas.height);
//! const frame = editor.render();
//! const cropped = editor.crop(true);
//! ```

use wasm_bindgen::prelude::*;

mod crop;
mod editor;
mod types;

pub use crop::crop_image;
pub use editor::{EditorState, JsCropEditor};
pub use types::JsCroppedImage;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
