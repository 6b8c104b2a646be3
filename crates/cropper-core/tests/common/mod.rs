#![allow(dead_code)]

use std::io::Cursor;

use cropper_core::decode::{DecodedImage, Orientation};
use cropper_core::encode::{embed_orientation, encode_jpeg};

/// RGB value that is unique for every `(x, y)` below 4096x4096.
pub fn unique_pixel(x: u32, y: u32) -> [u8; 3] {
    [
        (x & 0xFF) as u8,
        (y & 0xFF) as u8,
        (((x >> 8) & 0x0F) | (((y >> 8) & 0x0F) << 4)) as u8,
    ]
}

/// Build a PNG whose every pixel is [`unique_pixel`].
///
/// PNG is lossless, so exported pixels can be compared exactly.
pub fn unique_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb(unique_pixel(x, y)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode PNG");
    out.into_inner()
}

/// Build a flat-gray JPEG tagged with `orientation`.
pub fn tagged_jpeg(width: u32, height: u32, orientation: Orientation) -> Vec<u8> {
    let pixels = vec![128u8; (width * height * 3) as usize];
    let jpeg = encode_jpeg(&pixels, width, height, 90).expect("encode JPEG");
    embed_orientation(&jpeg, orientation).expect("embed orientation")
}

/// Assert two images match pixel for pixel.
pub fn assert_same_pixels(actual: &DecodedImage, expected: &DecodedImage) {
    assert_eq!(
        (actual.width, actual.height),
        (expected.width, expected.height),
        "dimension mismatch"
    );
    for y in 0..actual.height {
        for x in 0..actual.width {
            assert_eq!(
                actual.pixel(x, y),
                expected.pixel(x, y),
                "pixel mismatch at ({x}, {y})"
            );
        }
    }
}

/// Assert two images match within `tolerance` per channel, for lossy output.
pub fn assert_close_pixels(actual: &DecodedImage, expected: &DecodedImage, tolerance: u8) {
    assert_eq!(
        (actual.width, actual.height),
        (expected.width, expected.height),
        "dimension mismatch"
    );
    for y in 0..actual.height {
        for x in 0..actual.width {
            let (a, e) = (actual.pixel(x, y), expected.pixel(x, y));
            assert!(
                a.iter().zip(e).all(|(&a, e)| a.abs_diff(e) <= tolerance),
                "pixel mismatch at ({x}, {y}): {a:?} vs {e:?}"
            );
        }
    }
}
