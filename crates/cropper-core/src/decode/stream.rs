//! Reduced decodes that never hold the full-resolution image.
//!
//! PNG rows are streamed straight into a [`BlockSampler`], so only the
//! rect's reduced copy and one source row are ever resident. JPEG is
//! decoded at 1/2, 1/4 or 1/8 scale in the DCT domain, then cropped and
//! reduced by whatever factor remains.
//!
//! Both return `Ok(None)` for variants they cannot stream (interlaced PNG,
//! CMYK or 16-bit JPEG); the caller then falls back to a full decode.

use std::io::Read;

use jpeg_decoder::PixelFormat;
use tracing::debug;

use super::block::{charge, BlockSampler, PixelLayout};
use super::DecodedImage;
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;

/// Largest DCT scale divisor usable for `factor`: a power of two that
/// divides it, at most 8.
pub(crate) fn dct_scale(factor: u32) -> u32 {
    1 << factor.max(1).trailing_zeros().min(3)
}

fn jpeg_error(err: jpeg_decoder::Error) -> CropError {
    match err {
        jpeg_decoder::Error::Io(e) => CropError::from_source_io(e),
        other => CropError::DecodeFailure(other.to_string()),
    }
}

fn png_error(err: png::DecodingError) -> CropError {
    match err {
        png::DecodingError::IoError(e) => CropError::from_source_io(e),
        png::DecodingError::LimitsExceeded => CropError::OutOfMemory,
        other => CropError::DecodeFailure(other.to_string()),
    }
}

/// Decode `rect` of a `width x height` JPEG reduced by `factor`.
pub(crate) fn decode_jpeg(
    stream: impl Read,
    width: u32,
    height: u32,
    rect: PixelRect,
    factor: u32,
    max_alloc: Option<u64>,
) -> Result<Option<DecodedImage>> {
    let mut decoder = jpeg_decoder::Decoder::new(stream);
    decoder.read_info().map_err(jpeg_error)?;
    let layout = match decoder.info().map(|info| info.pixel_format) {
        Some(PixelFormat::RGB24) => PixelLayout::Rgb,
        Some(PixelFormat::L8) => PixelLayout::Gray,
        _ => return Ok(None),
    };

    let scale = dct_scale(factor);
    let want_w = u16::try_from(width.div_ceil(scale))
        .map_err(|_| CropError::DecodeFailure(format!("JPEG width {width} out of range")))?;
    let want_h = u16::try_from(height.div_ceil(scale))
        .map_err(|_| CropError::DecodeFailure(format!("JPEG height {height} out of range")))?;
    let (sw, sh) = decoder.scale(want_w, want_h).map_err(jpeg_error)?;
    if (sw, sh) != (want_w, want_h) {
        return Ok(None);
    }
    let (sw, sh) = (sw as u32, sh as u32);

    let scaled_rect = PixelRect::new(
        rect.x / scale,
        rect.y / scale,
        (rect.width / scale).max(1),
        (rect.height / scale).max(1),
    )
    .clip_to(sw, sh);
    let remainder = factor.max(1) / scale;

    let stride = sw as usize * layout.channels();
    let buffer = stride as u64 * sh as u64;
    charge(
        max_alloc,
        buffer + BlockSampler::footprint(scaled_rect, remainder),
    )?;
    let mut sampler = BlockSampler::new(scaled_rect, remainder, layout)?;

    let pixels = decoder.decode().map_err(jpeg_error)?;
    if pixels.len() as u64 != buffer {
        return Err(CropError::DecodeFailure(format!(
            "JPEG decoder returned {} bytes for {sw}x{sh}",
            pixels.len()
        )));
    }
    debug!(scale, width = sw, height = sh, remainder, "decoded JPEG at reduced scale");

    for (y, row) in pixels
        .chunks_exact(stride)
        .enumerate()
        .skip(scaled_rect.y as usize)
        .take(scaled_rect.height as usize)
    {
        sampler.push_row(y as u32, row)?;
    }
    drop(pixels);
    sampler.finish().map(Some)
}

/// Decode `rect` of a PNG reduced by `factor`, one row at a time.
pub(crate) fn decode_png(
    stream: impl Read,
    rect: PixelRect,
    factor: u32,
    max_alloc: Option<u64>,
) -> Result<Option<DecodedImage>> {
    let mut decoder = png::Decoder::new(stream);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(png_error)?;
    if reader.info().interlaced {
        return Ok(None);
    }
    let layout = match reader.output_color_type().0 {
        png::ColorType::Grayscale => PixelLayout::Gray,
        png::ColorType::GrayscaleAlpha => PixelLayout::GrayAlpha,
        png::ColorType::Rgb => PixelLayout::Rgb,
        png::ColorType::Rgba => PixelLayout::Rgba,
        _ => return Ok(None),
    };

    // The decoder keeps the current and previous row for unfiltering.
    let row_bytes = reader.output_line_size(reader.info().width) as u64;
    charge(max_alloc, BlockSampler::footprint(rect, factor) + 2 * row_bytes)?;
    let mut sampler = BlockSampler::new(rect, factor, layout)?;

    let mut y = 0;
    while !sampler.is_done() {
        let Some(row) = reader.next_row().map_err(png_error)? else {
            break;
        };
        sampler.push_row(y, row.data())?;
        y += 1;
    }
    sampler.finish().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_jpeg;
    use std::io::Cursor;

    #[test]
    fn test_dct_scale() {
        assert_eq!(dct_scale(1), 1);
        assert_eq!(dct_scale(2), 2);
        assert_eq!(dct_scale(3), 1);
        assert_eq!(dct_scale(6), 2);
        assert_eq!(dct_scale(8), 8);
        assert_eq!(dct_scale(16), 8);
        assert_eq!(dct_scale(12), 4);
    }

    #[test]
    fn test_jpeg_scaled_dimensions_match_row_reduction() {
        let jpeg = encode_jpeg(&vec![90u8; 100 * 60 * 3], 100, 60, 90).unwrap();
        // 100x60 at 1/8 decodes to 13x8; the rect then reduces to 12x7.
        let out = decode_jpeg(
            Cursor::new(&jpeg),
            100,
            60,
            PixelRect::new(0, 0, 100, 60),
            8,
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!((out.width, out.height), (12, 7));
        for px in out.pixels.chunks_exact(3) {
            assert!(px.iter().all(|&v| v.abs_diff(90) <= 4), "{px:?}");
        }
    }

    #[test]
    fn test_jpeg_remainder_factor() {
        let jpeg = encode_jpeg(&vec![200u8; 96 * 96 * 3], 96, 96, 90).unwrap();
        // Factor 6: DCT at 1/2, then 3x3 blocks.
        let out = decode_jpeg(
            Cursor::new(&jpeg),
            96,
            96,
            PixelRect::new(12, 24, 48, 36),
            6,
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!((out.width, out.height), (8, 6));
    }

    #[test]
    fn test_png_stops_after_rect() {
        let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let mut bytes = png.into_inner();
        // Without IEND: decoding stops once the rect is filled.
        let len = bytes.len();
        bytes.truncate(len - 12);

        let out = decode_png(Cursor::new(bytes), PixelRect::new(4, 2, 8, 3), 1, None)
            .unwrap()
            .unwrap();
        assert_eq!((out.width, out.height), (8, 3));
        assert_eq!(out.pixel(0, 0), [4, 2, 0]);
    }
}
