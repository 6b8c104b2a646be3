//! Source image access and bounded-memory decoding.
//!
//! A [`SourceImage`] is created by reading only the header of the image:
//! dimensions and EXIF orientation. Pixels are decoded later, either whole
//! at a reduced scale for the preview or as a region for export. Every
//! decode reopens the byte stream, so the source can be shared across
//! threads behind an `Arc`.
//!
//! PNG and JPEG never materialize at full resolution unless the factor
//! is 1 (and, for JPEG, the whole frame then has to fit the budget).
//! Other formats decode whole under `image::Limits` and are reduced at
//! once.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, ImageReader, Limits};
use tracing::debug;

use super::block::{charge, BlockSampler, PixelLayout};
use super::orientation::read_orientation;
use super::stream::{decode_jpeg, decode_png};
use super::{DecodedImage, Orientation, Rotation};
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;

/// A readable, seekable byte stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Something that can hand out a fresh stream over the original image bytes.
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Open a new stream positioned at the start of the image.
    fn open(&self) -> io::Result<Box<dyn ReadSeek + Send>>;
}

/// Image bytes read from a file on each open.
#[derive(Debug, Clone)]
pub struct FileBytes(pub PathBuf);

impl ByteSource for FileBytes {
    fn open(&self) -> io::Result<Box<dyn ReadSeek + Send>> {
        Ok(Box::new(File::open(&self.0)?))
    }
}

/// Image bytes held in memory.
#[derive(Clone)]
pub struct MemoryBytes(pub Arc<Vec<u8>>);

impl fmt::Debug for MemoryBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryBytes({} bytes)", self.0.len())
    }
}

/// Cursor target that shares the buffer instead of copying it.
struct SharedSlice(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedSlice {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl ByteSource for MemoryBytes {
    fn open(&self) -> io::Result<Box<dyn ReadSeek + Send>> {
        Ok(Box::new(Cursor::new(SharedSlice(Arc::clone(&self.0)))))
    }
}

/// Header-level description of the original image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Arc<dyn ByteSource>,
    width: u32,
    height: u32,
    orientation: Orientation,
}

impl SourceImage {
    /// Read dimensions and orientation without decoding pixels.
    ///
    /// # Errors
    ///
    /// - `CropError::InvalidInput` if the source cannot be opened
    /// - `CropError::DecodeFailure` if the header is unreadable or the format
    ///   is not supported
    pub fn probe(bytes: Arc<dyn ByteSource>) -> Result<Self> {
        let reader = open_reader(bytes.as_ref())?;
        let (width, height) = reader.into_dimensions().map_err(CropError::from_image)?;
        if width == 0 || height == 0 {
            return Err(CropError::DecodeFailure(format!(
                "image reports empty dimensions {width}x{height}"
            )));
        }

        let stream = bytes.open().map_err(CropError::from_source_io)?;
        let orientation = read_orientation(&mut BufReader::new(stream));

        debug!(width, height, ?orientation, source = ?bytes, "probed source");

        Ok(Self {
            bytes,
            width,
            height,
            orientation,
        })
    }

    /// Probe an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::probe(Arc::new(FileBytes(path.as_ref().to_path_buf())))
    }

    /// Probe in-memory image bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::probe(Arc::new(MemoryBytes(Arc::new(bytes))))
    }

    /// Override the orientation read from the header.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Stored width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Stored height.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn rotation(&self) -> Rotation {
        self.orientation.rotation()
    }

    /// Dimensions as displayed upright.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        self.rotation().oriented_dimensions(self.width, self.height)
    }

    /// Decode the whole image at `1/factor` resolution.
    pub fn decode_sampled(&self, factor: u32, max_alloc: Option<u64>) -> Result<DecodedImage> {
        let sampled = self.decode_reduced(
            PixelRect::new(0, 0, self.width, self.height),
            factor,
            max_alloc,
        )?;
        debug!(
            factor,
            width = sampled.width,
            height = sampled.height,
            "decoded sampled image"
        );
        Ok(sampled)
    }

    /// Decode the stored-space `rect` at `1/factor` resolution.
    ///
    /// The rect is clipped to the image first.
    ///
    /// # Errors
    ///
    /// Returns `CropError::InvalidInput` if the rect does not overlap the
    /// image.
    pub fn decode_region(
        &self,
        rect: PixelRect,
        factor: u32,
        max_alloc: Option<u64>,
    ) -> Result<DecodedImage> {
        let clipped = rect.clip_to(self.width, self.height);
        if clipped.is_empty() {
            return Err(CropError::InvalidInput(format!(
                "region {}x{}+{}+{} is outside the {}x{} source",
                rect.width, rect.height, rect.x, rect.y, self.width, self.height
            )));
        }

        let sampled = self.decode_reduced(clipped, factor, max_alloc)?;
        debug!(
            factor,
            width = sampled.width,
            height = sampled.height,
            "decoded region"
        );
        Ok(sampled)
    }

    /// Reduced decode of an in-bounds `rect`, streaming where the format
    /// allows it.
    fn decode_reduced(
        &self,
        rect: PixelRect,
        factor: u32,
        max_alloc: Option<u64>,
    ) -> Result<DecodedImage> {
        let factor = factor.max(1);
        let format = open_reader(self.bytes.as_ref())?.format();
        let stream = || {
            self.bytes
                .open()
                .map(BufReader::new)
                .map_err(CropError::from_source_io)
        };

        let streamed = match format {
            Some(ImageFormat::Jpeg) => {
                decode_jpeg(stream()?, self.width, self.height, rect, factor, max_alloc)?
            }
            Some(ImageFormat::Png) => decode_png(stream()?, rect, factor, max_alloc)?,
            _ => None,
        };

        match streamed {
            Some(image) => Ok(image),
            None => {
                debug!(?format, "no streaming decoder, decoding full image");
                self.decode_full(rect, factor, max_alloc)
            }
        }
    }

    /// Decode everything, then reduce. The full buffer lives only inside
    /// this call.
    fn decode_full(
        &self,
        rect: PixelRect,
        factor: u32,
        max_alloc: Option<u64>,
    ) -> Result<DecodedImage> {
        charge(max_alloc, BlockSampler::footprint(rect, factor))?;
        let mut sampler = BlockSampler::new(rect, factor, PixelLayout::Rgb)?;

        let mut reader = open_reader(self.bytes.as_ref())?;
        let mut limits = Limits::default();
        limits.max_alloc = max_alloc;
        reader.limits(limits);

        let img = reader.decode().map_err(CropError::from_image)?;
        let rgb = img.into_rgb8();
        if rgb.dimensions() != (self.width, self.height) {
            return Err(CropError::DecodeFailure(format!(
                "decoded {}x{} but header reported {}x{}",
                rgb.width(),
                rgb.height(),
                self.width,
                self.height
            )));
        }

        let stride = self.width as usize * 3;
        for (y, row) in rgb
            .as_raw()
            .chunks_exact(stride)
            .enumerate()
            .skip(rect.y as usize)
            .take(rect.height as usize)
        {
            sampler.push_row(y as u32, row)?;
        }
        drop(rgb);
        sampler.finish()
    }
}

fn open_reader(
    bytes: &dyn ByteSource,
) -> Result<ImageReader<BufReader<Box<dyn ReadSeek + Send>>>> {
    let stream = bytes.open().map_err(CropError::from_source_io)?;
    ImageReader::new(BufReader::new(stream))
        .with_guessed_format()
        .map_err(CropError::from_source_io)
}
