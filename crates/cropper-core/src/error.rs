//! Error type shared by the decode, export and session layers.

use thiserror::Error;

use crate::encode::EncodeError;

/// Errors surfaced by the crop engine.
///
/// Geometry code (sampler, transforms, crop region) never produces these;
/// they come from touching image bytes or from validating caller input.
#[derive(Debug, Error)]
pub enum CropError {
    /// Missing or unreadable source, or a malformed configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A decode or resize step could not allocate its buffer.
    #[error("Out of memory")]
    OutOfMemory,

    /// The image data is corrupt or in an unsupported format.
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CropError {
    /// Returns true for the out-of-memory condition, which callers may retry
    /// with smaller bounds.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, CropError::OutOfMemory)
    }

    /// Classify an error from the `image` crate.
    pub(crate) fn from_image(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(_) => CropError::OutOfMemory,
            image::ImageError::IoError(e) => CropError::from_source_io(e),
            other => CropError::DecodeFailure(other.to_string()),
        }
    }

    /// Classify an I/O error raised while reading the source.
    ///
    /// Not-found and permission errors mean the source reference is bad;
    /// anything else happened mid-stream and counts as a decode failure.
    pub(crate) fn from_source_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CropError::InvalidInput(format!("unreadable source: {err}"))
            }
            std::io::ErrorKind::OutOfMemory => CropError::OutOfMemory,
            _ => CropError::DecodeFailure(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CropError>;
