//! Pixel-rect cropping.
//!
//! # Coordinate System
//!
//! - (0, 0) = top-left pixel of the buffer being cropped
//! - the rect is clipped to the buffer before copying
//!
//! # Example
//!
//! ```ignore
//! // Copy out a 50x50 block at (25, 25)
//! let cropped = extract_region(&image, PixelRect::new(25, 25, 50, 50))?;
//! ```

use crate::decode::DecodedImage;
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;

/// Copy a rectangular region out of an image.
///
/// # Arguments
///
/// * `image` - Source image to crop
/// * `rect` - Region in the image's own pixel coordinates
///
/// # Returns
///
/// A new `DecodedImage` containing only the region.
///
/// # Errors
///
/// - `CropError::InvalidInput` if the rect does not overlap the image
/// - `CropError::OutOfMemory` if the output buffer cannot be allocated
pub fn extract_region(image: &DecodedImage, rect: PixelRect) -> Result<DecodedImage> {
    let clipped = rect.clip_to(image.width, image.height);
    if clipped.is_empty() {
        return Err(CropError::InvalidInput(format!(
            "crop {}x{}+{}+{} is outside the {}x{} image",
            rect.width, rect.height, rect.x, rect.y, image.width, image.height
        )));
    }

    // Fast path: full crop returns a clone
    if clipped.width == image.width && clipped.height == image.height {
        return Ok(image.clone());
    }

    let mut output = DecodedImage::try_alloc(clipped.width, clipped.height)?;

    // Copy pixel data row by row for efficiency
    let src_stride = image.width as usize * 3;
    let row_len = clipped.width as usize * 3;
    for y in 0..clipped.height as usize {
        let src_start = (clipped.y as usize + y) * src_stride + clipped.x as usize * 3;
        let dst_start = y * row_len;
        output.pixels[dst_start..dst_start + row_len]
            .copy_from_slice(&image.pixels[src_start..src_start + row_len]);
    }

    Ok(output)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
