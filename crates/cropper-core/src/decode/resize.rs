//! Image resizing for preview sampling and export.
//!
//! All functions return new `DecodedImage` instances without modifying the
//! input. None of them upscale unless asked for exact dimensions.

use super::{DecodedImage, FilterType};
use crate::error::{CropError, Result};

/// Resize an image to exact dimensions.
///
/// # Arguments
///
/// * `image` - The source image to resize
/// * `width` - Target width in pixels
/// * `height` - Target height in pixels
/// * `filter` - Interpolation filter to use
///
/// # Errors
///
/// Returns `CropError::InvalidInput` for zero target dimensions.
pub fn resize(
    image: DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage> {
    if width == 0 || height == 0 {
        return Err(CropError::InvalidInput(format!(
            "cannot resize to {width}x{height}"
        )));
    }

    // Fast path: if dimensions match, hand the buffer back
    if image.width == width && image.height == height {
        return Ok(image);
    }

    // Reserve the output up front so an impossible allocation is reported
    // rather than aborting inside the resampler.
    drop(DecodedImage::try_alloc(width, height)?);

    let rgb_image = image
        .into_rgb_image()
        .ok_or_else(|| CropError::DecodeFailure("pixel buffer size mismatch".to_string()))?;

    let resized = image::imageops::resize(&rgb_image, width, height, filter.to_image_filter());

    Ok(DecodedImage::from_rgb_image(resized))
}

/// Shrink an image so it is no larger than `max_width x max_height`.
///
/// If the image already fits on both axes it is returned unchanged; otherwise
/// it is resized to exactly the given dimensions (the caller computed them to
/// preserve aspect ratio).
pub fn shrink_to(
    image: DecodedImage,
    max_width: u32,
    max_height: u32,
    filter: FilterType,
) -> Result<DecodedImage> {
    if image.width <= max_width && image.height <= max_height {
        return Ok(image);
    }
    resize(image, max_width, max_height, filter)
}

/// Compute the export size for a `width x height` crop under optional bounds.
///
/// A zero bound means that axis is unbounded. When the crop exceeds a bound
/// it is scaled down preserving its aspect ratio. With both bounds set, the
/// binding axis is picked by comparing the bound ratio to the crop ratio: a
/// wider bound box than the crop means height binds.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let exceeds_w = max_width > 0 && width > max_width;
    let exceeds_h = max_height > 0 && height > max_height;
    if !exceeds_w && !exceeds_h {
        return (width, height);
    }

    let ratio = width as f64 / height as f64;
    let height_binds = match (max_width > 0, max_height > 0) {
        (true, true) => max_width as f64 / max_height as f64 > ratio,
        (false, true) => true,
        _ => false,
    };

    if height_binds {
        let out_w = (max_height as f64 * ratio + 0.5) as u32;
        (out_w.max(1), max_height)
    } else {
        let out_h = (max_width as f64 / ratio + 0.5) as u32;
        (max_width, out_h.max(1))
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
