//! The downsampled bitmap shown while the user picks a crop.

use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::decode::{compute_sample_size, DecodedImage, Orientation, Rotation, SourceImage};
use crate::error::{CropError, Result};
use crate::transform::{rotate_image, ImageFrame};

/// Viewport pixel bounds the preview is fitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSize {
    width: u32,
    height: u32,
}

impl PreviewSize {
    /// Bounds clamped to `max_texture_size` on each axis.
    ///
    /// # Errors
    ///
    /// Returns `CropError::InvalidInput` if either dimension is zero.
    pub fn new(width: u32, height: u32, max_texture_size: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CropError::InvalidInput(format!(
                "preview bounds must be positive, got {width}x{height}"
            )));
        }
        let limit = max_texture_size.max(1);
        Ok(Self {
            width: width.min(limit),
            height: height.min(limit),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Preview pixels plus the orientation needed to show them upright.
///
/// Pixels stay in stored orientation; [`width`](Self::width) and
/// [`height`](Self::height) report the oriented size.
#[derive(Debug)]
pub struct PreviewImage {
    pixels: DecodedImage,
    sample_size: u32,
    orientation: Orientation,
}

impl PreviewImage {
    /// Decode `source` at the coarsest factor that still fills `size`.
    pub fn build(source: &SourceImage, size: PreviewSize, settings: &EngineSettings) -> Result<Self> {
        let (ow, oh) = source.oriented_dimensions();
        let sample_size = compute_sample_size(
            ow,
            oh,
            size.width(),
            size.height(),
            settings.preview_sampling,
        );
        let pixels = source.decode_sampled(sample_size, settings.max_decode_alloc)?;

        info!(
            sample_size,
            width = pixels.width,
            height = pixels.height,
            bytes = pixels.byte_size(),
            "built preview"
        );

        Ok(Self {
            pixels,
            sample_size,
            orientation: source.orientation(),
        })
    }

    /// Wrap already-decoded pixels.
    pub fn from_parts(pixels: DecodedImage, sample_size: u32, orientation: Orientation) -> Self {
        Self {
            pixels,
            sample_size: sample_size.max(1),
            orientation,
        }
    }

    /// Oriented width.
    pub fn width(&self) -> u32 {
        self.frame().oriented_width()
    }

    /// Oriented height.
    pub fn height(&self) -> u32 {
        self.frame().oriented_height()
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn rotation(&self) -> Rotation {
        self.orientation.rotation()
    }

    /// Stored-orientation pixels.
    pub fn pixels(&self) -> &DecodedImage {
        &self.pixels
    }

    pub fn frame(&self) -> ImageFrame {
        ImageFrame::new(self.pixels.width, self.pixels.height, self.rotation())
    }

    /// An upright copy of the pixels.
    pub fn upright(&self) -> Result<DecodedImage> {
        rotate_image(self.pixels.clone(), self.rotation())
    }

    /// Free the pixel buffer now.
    pub fn release(self) {
        debug!(bytes = self.pixels.byte_size(), "releasing preview");
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_source(width: u32, height: u32) -> SourceImage {
        let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        SourceImage::from_bytes(out.into_inner()).unwrap()
    }

    #[test]
    fn test_preview_size_rejects_zero() {
        assert!(PreviewSize::new(0, 100, 4096).is_err());
        assert!(PreviewSize::new(100, 0, 4096).is_err());
    }

    #[test]
    fn test_preview_size_clamps_to_texture() {
        let size = PreviewSize::new(5000, 300, 2048).unwrap();
        assert_eq!((size.width(), size.height()), (2048, 300));
    }

    #[test]
    fn test_build_samples_large_source() {
        let source = png_source(400, 300);
        let size = PreviewSize::new(108, 108, 4096).unwrap();
        let preview = PreviewImage::build(&source, size, &EngineSettings::default()).unwrap();
        // Same proportions as 4000x3000 into 1080x1080.
        assert_eq!(preview.sample_size(), 2);
        assert_eq!((preview.width(), preview.height()), (200, 150));
    }

    #[test]
    fn test_build_keeps_small_source() {
        let source = png_source(40, 30);
        let size = PreviewSize::new(100, 100, 4096).unwrap();
        let preview = PreviewImage::build(&source, size, &EngineSettings::default()).unwrap();
        assert_eq!(preview.sample_size(), 1);
        assert_eq!(preview.pixels().pixel(3, 4), [3, 4, 0]);
    }

    #[test]
    fn test_oriented_dimensions_and_upright() {
        let source = png_source(40, 30).with_orientation(Orientation::Rotate90CW);
        let size = PreviewSize::new(100, 100, 4096).unwrap();
        let preview = PreviewImage::build(&source, size, &EngineSettings::default()).unwrap();

        assert_eq!((preview.width(), preview.height()), (30, 40));
        assert_eq!((preview.pixels().width, preview.pixels().height), (40, 30));

        let upright = preview.upright().unwrap();
        assert_eq!((upright.width, upright.height), (30, 40));
        // Stored bottom-left lands at upright top-left.
        assert_eq!(upright.pixel(0, 0), [0, 29, 0]);
        preview.release();
    }
}
