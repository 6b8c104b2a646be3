//! Image decoding pipeline.
//!
//! This module provides functionality for:
//! - Probing a source's dimensions and EXIF orientation from its header
//! - Choosing decode factors that keep buffers bounded
//! - Sampled whole-image decode for the preview
//! - Region decode for export
//! - Image resizing and export size computation
//!
//! # Memory Strategy
//!
//! Decodes are charged against an allocation budget before any pixel
//! buffer is reserved. PNG rows are streamed into a block sampler that
//! keeps only the requested rect at the requested factor. JPEG is scaled
//! down by up to 8 in the DCT domain and the remaining factor is applied
//! to the rows of that smaller frame. Other formats, and PNG or JPEG
//! variants the streaming decoders do not handle, decode whole under
//! `image::Limits::max_alloc` and are reduced straight away.
//!
//! # Examples
//!
//! ```ignore
//! use cropper_core::decode::{compute_sample_size, SampleStrategy, SourceImage};
//!
//! let source = SourceImage::open("photo.jpg")?;
//! let (w, h) = source.oriented_dimensions();
//! let factor = compute_sample_size(w, h, 1080, 1080, SampleStrategy::PowerOfTwo);
//! let preview = source.decode_sampled(factor, Some(512 * 1024 * 1024))?;
//! ```

mod block;
mod orientation;
mod resize;
mod sample;
mod source;
mod stream;
mod types;

pub use orientation::{orientation_from_bytes, read_orientation};
pub use resize::{fit_within, resize, shrink_to};
pub use sample::{compute_sample_size, region_sample_size, sampled_dimensions, SampleStrategy};
pub use source::{ByteSource, FileBytes, MemoryBytes, ReadSeek, SourceImage};
pub use types::{DecodedImage, FilterType, Orientation, Rotation};
