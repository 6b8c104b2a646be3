//! Image encoding pipeline.
//!
//! This module provides functionality for:
//! - Encoding images to JPEG format with configurable quality
//! - Writing the EXIF orientation tag into the encoded stream
//!
//! # Examples
//!
//! ```ignore
//! use cropper_core::decode::Orientation;
//! use cropper_core::encode::{embed_orientation, encode_jpeg};
//!
//! let pixels = vec![128u8; 100 * 100 * 3]; // Gray image
//! let jpeg = encode_jpeg(&pixels, 100, 100, 90)?;
//! let tagged = embed_orientation(&jpeg, Orientation::Rotate90CW)?;
//! ```

mod jpeg;

pub use jpeg::{embed_orientation, encode_jpeg, EncodeError};
