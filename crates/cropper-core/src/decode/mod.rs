//! Image decoding pipeline.
//!
//! This module provides functionality for:
//! - Resolving image references to encoded bytes ([`SourceResolver`])
//! - Reading EXIF orientation and applying it once at load
//! - Producing a downsampled display preview ([`ImageLoader`])
//! - Decoding only a crop region at a power-of-two sample size, with
//!   out-of-memory retry ([`BitmapSampler`]); PNG regions stream row by row
//!
//! # Architecture
//!
//! Decoding runs on background threads (see [`crate::session`]). Every decode
//! loop checks a [`CancelToken`](crate::cancel::CancelToken) between rows so a
//! superseded or torn-down request stops early and drops its buffers.

mod exif;
mod loader;
mod region;
mod sampler;
mod source;
mod stream;
mod types;

pub use exif::{apply_orientation, probe, read_orientation};
pub use loader::{preview_sample_size, ImageLoader, LoadedImage};
pub use region::{sampled_dimensions, EncodedSource, RasterSource, RegionDecoder};
pub use sampler::{BitmapSampler, SampleSizeDecision, SampledRegion, MAX_DECODE_ATTEMPTS};
pub use source::{FsResolver, MemoryResolver, SourceOption, SourceResolver};
pub use types::{DecodeError, FilterType, Orientation, SourceInfo};

#[cfg(test)]
pub(crate) use exif::tests::png_bytes;
