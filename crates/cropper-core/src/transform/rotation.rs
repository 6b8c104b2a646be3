//! Quarter-turn orientation handling.
//!
//! Stored pixels stay in sensor orientation throughout the engine. This
//! module maps rectangles between the oriented (upright) frame the user
//! sees and the stored frame the decoder produces, and renders an upright
//! copy when a host needs one.
//!
//! # Algorithm
//!
//! A clockwise quarter turn of a `W x H` stored image sends stored pixel
//! `(sx, sy)` to upright pixel `(H - 1 - sy, sx)`. Inverting that for a whole
//! rectangle gives:
//! ```text
//!  90: (x, y, w, h) -> (y, H - x - w, h, w)
//! 180: (x, y, w, h) -> (W - x - w, H - y - h, w, h)
//! 270: (x, y, w, h) -> (W - y - h, x, h, w)
//! ```

use crate::decode::{DecodedImage, Rotation};
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;

/// Map a rect in the oriented frame back to stored pixel coordinates.
///
/// `stored_width x stored_height` are the dimensions before rotation. The
/// result is clipped to the stored bounds and may be empty if the rect
/// lies entirely outside the image.
pub fn unorient_rect(
    rect: PixelRect,
    rotation: Rotation,
    stored_width: u32,
    stored_height: u32,
) -> PixelRect {
    let (x, y) = (rect.x as i64, rect.y as i64);
    let (w, h) = (rect.width as i64, rect.height as i64);
    let (sw, sh) = (stored_width as i64, stored_height as i64);

    let (left, top, width, height) = match rotation {
        Rotation::None => (x, y, w, h),
        Rotation::Deg90 => (y, sh - x - w, h, w),
        Rotation::Deg180 => (sw - x - w, sh - y - h, w, h),
        Rotation::Deg270 => (sw - y - h, x, h, w),
    };

    let x0 = left.clamp(0, sw);
    let y0 = top.clamp(0, sh);
    let x1 = (left + width).clamp(0, sw);
    let y1 = (top + height).clamp(0, sh);

    PixelRect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
}

/// Map a rect in stored pixel coordinates into the oriented frame.
pub fn orient_rect(
    rect: PixelRect,
    rotation: Rotation,
    stored_width: u32,
    stored_height: u32,
) -> PixelRect {
    // Rotating by the complementary angle in the oriented frame undoes the
    // stored-to-oriented mapping.
    let (ow, oh) = rotation.oriented_dimensions(stored_width, stored_height);
    let inverse = match rotation {
        Rotation::None => Rotation::None,
        Rotation::Deg90 => Rotation::Deg270,
        Rotation::Deg180 => Rotation::Deg180,
        Rotation::Deg270 => Rotation::Deg90,
    };
    unorient_rect(rect, inverse, ow, oh)
}

/// Rotate an image clockwise by a quarter-turn multiple.
///
/// # Errors
///
/// Returns `CropError::OutOfMemory` if the rotated buffer cannot be
/// reserved.
pub fn rotate_image(image: DecodedImage, rotation: Rotation) -> Result<DecodedImage> {
    if rotation == Rotation::None {
        return Ok(image);
    }

    let (width, height) = rotation.oriented_dimensions(image.width, image.height);
    drop(DecodedImage::try_alloc(width, height)?);

    let rgb = image
        .into_rgb_image()
        .ok_or_else(|| CropError::DecodeFailure("pixel buffer size mismatch".to_string()))?;

    let rotated = match rotation {
        Rotation::Deg90 => image::imageops::rotate90(&rgb),
        Rotation::Deg180 => image::imageops::rotate180(&rgb),
        Rotation::Deg270 => image::imageops::rotate270(&rgb),
        Rotation::None => rgb,
    };

    Ok(DecodedImage::from_rgb_image(rotated))
}


// ============================================================================
// Property-Based Tests
// ============================================================================
