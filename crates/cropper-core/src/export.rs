//! Full-resolution export of the selected crop.
//!
//! The preview only ever holds a subsampled bitmap, so the export goes back
//! to the source bytes: the oriented crop rect is mapped into stored
//! coordinates, that region is decoded at the coarsest factor that still
//! covers the output size, shrunk to the exact size and encoded as a JPEG
//! that carries the source's orientation tag.
//!
//! # Pipeline
//!
//! ```text
//! oriented rect -> stored rect -> region decode (1/f) -> shrink -> JPEG + EXIF -> persist
//! ```
//!
//! Nothing reaches the destination until the encoded buffer is complete.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{CropConfig, EngineSettings, OutputTarget};
use crate::decode::{fit_within, region_sample_size, shrink_to, DecodedImage, Orientation, SourceImage};
use crate::encode::{embed_orientation, encode_jpeg};
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;
use crate::transform::unorient_rect;

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutput {
    Memory(Vec<u8>),
    File(PathBuf),
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Stored-orientation width of the encoded image.
    pub width: u32,
    /// Stored-orientation height of the encoded image.
    pub height: u32,
    /// Orientation tag written to the output.
    pub orientation: Orientation,
    /// Encoded size in bytes.
    pub encoded_len: usize,
    pub output: ExportOutput,
}

/// Stored-frame geometry of one export, computed before any decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPlan {
    /// The crop in stored source pixels.
    pub region: PixelRect,
    /// Final stored-frame pixel size.
    pub output_width: u32,
    pub output_height: u32,
    /// Region decode factor.
    pub sample_size: u32,
}

/// Exports a crop of one source image.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    source: SourceImage,
    settings: EngineSettings,
}

impl ExportPipeline {
    pub fn new(source: SourceImage, settings: EngineSettings) -> Self {
        Self { source, settings }
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    /// Work out the stored region, output size and decode factor for
    /// `crop_rect` (oriented source pixels).
    ///
    /// The size bounds in `config` apply to the image as viewed, so they are
    /// applied in the oriented frame and swapped back for quarter turns.
    ///
    /// # Errors
    ///
    /// Returns `CropError::InvalidInput` if the rect does not overlap the
    /// source.
    pub fn plan(&self, crop_rect: PixelRect, config: &CropConfig) -> Result<ExportPlan> {
        let rotation = self.source.rotation();
        let region = unorient_rect(
            crop_rect,
            rotation,
            self.source.width(),
            self.source.height(),
        );
        if region.is_empty() {
            return Err(CropError::InvalidInput(format!(
                "crop {}x{}+{}+{} does not overlap the source",
                crop_rect.width, crop_rect.height, crop_rect.x, crop_rect.y
            )));
        }

        let (oriented_w, oriented_h) = rotation.oriented_dimensions(region.width, region.height);
        let (out_w, out_h) = fit_within(oriented_w, oriented_h, config.max_width, config.max_height);
        let (output_width, output_height) = rotation.oriented_dimensions(out_w, out_h);

        let sample_size =
            region_sample_size(region.width, region.height, output_width, output_height);

        Ok(ExportPlan {
            region,
            output_width,
            output_height,
            sample_size,
        })
    }

    /// Decode and size the crop without encoding it.
    ///
    /// Pixels are in stored orientation.
    pub fn render(&self, crop_rect: PixelRect, config: &CropConfig) -> Result<DecodedImage> {
        let plan = self.plan(crop_rect, config)?;
        debug!(
            x = plan.region.x,
            y = plan.region.y,
            width = plan.region.width,
            height = plan.region.height,
            sample_size = plan.sample_size,
            "decoding export region"
        );

        let region = self.source.decode_region(
            plan.region,
            plan.sample_size,
            self.settings.max_decode_alloc,
        )?;

        shrink_to(
            region,
            plan.output_width,
            plan.output_height,
            self.settings.export_filter,
        )
    }

    /// Encode rendered pixels as a JPEG tagged with the source orientation.
    pub fn encode(&self, image: &DecodedImage) -> Result<Vec<u8>> {
        let jpeg = encode_jpeg(
            &image.pixels,
            image.width,
            image.height,
            self.settings.jpeg_quality,
        )?;
        Ok(embed_orientation(&jpeg, self.source.orientation())?)
    }

    /// Render, encode and persist the crop.
    pub fn run(&self, crop_rect: PixelRect, config: &CropConfig) -> Result<ExportSummary> {
        config.validate()?;

        let image = self.render(crop_rect, config)?;
        let (width, height) = (image.width, image.height);
        let bytes = self.encode(&image)?;
        drop(image);

        let encoded_len = bytes.len();
        let output = persist(bytes, &config.output)?;

        info!(width, height, encoded_len, "export finished");
        Ok(ExportSummary {
            width,
            height,
            orientation: self.source.orientation(),
            encoded_len,
            output,
        })
    }
}

/// Hand the encoded bytes to their destination.
///
/// A file target is written to a sibling temporary file and renamed over
/// the destination, so a failed write never leaves a partial image.
pub fn persist(bytes: Vec<u8>, target: &OutputTarget) -> Result<ExportOutput> {
    match target {
        OutputTarget::Memory => Ok(ExportOutput::Memory(bytes)),
        OutputTarget::File(path) => {
            write_replace(path, &bytes)?;
            debug!(path = %path.display(), bytes = bytes.len(), "wrote export");
            Ok(ExportOutput::File(path.clone()))
        }
    }
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    if let Err(e) = fs::write(&staging, bytes).and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
