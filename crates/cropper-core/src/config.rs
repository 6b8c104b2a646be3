//! Caller-supplied crop constraints and engine tuning.
//!
//! [`CropConfig`] carries what the host asked for: aspect ratio, maximum
//! output size and where the result goes. [`EngineSettings`] carries the
//! knobs that bound memory and shape interaction. Both deserialize with
//! defaults for missing fields, so a host can keep them in its own settings
//! file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::decode::{FilterType, SampleStrategy};
use crate::error::{CropError, Result};

/// Where the exported image is written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    /// Return the encoded bytes to the caller.
    #[default]
    Memory,
    /// Write to a file, replacing it only once the full image is encoded.
    File(PathBuf),
}

/// A fixed width:height ratio for the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    pub fn ratio(self) -> f64 {
        self.x as f64 / self.y as f64
    }
}

/// Export constraints supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Aspect ratio X (0 = free).
    pub aspect_x: u32,
    /// Aspect ratio Y (0 = free).
    pub aspect_y: u32,
    /// Maximum output width (0 = unbounded).
    pub max_width: u32,
    /// Maximum output height (0 = unbounded).
    pub max_height: u32,
    pub output: OutputTarget,
}

impl CropConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the crop rectangle to `x:y`.
    pub fn with_aspect(mut self, x: u32, y: u32) -> Self {
        self.aspect_x = x;
        self.aspect_y = y;
        self
    }

    /// Lock the crop rectangle to 1:1.
    pub fn as_square(self) -> Self {
        self.with_aspect(1, 1)
    }

    /// Bound the exported image to `width x height`.
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn output(mut self, target: OutputTarget) -> Self {
        self.output = target;
        self
    }

    /// The locked aspect ratio, if any.
    pub fn aspect(&self) -> Option<AspectRatio> {
        if self.aspect_x > 0 && self.aspect_y > 0 {
            Some(AspectRatio {
                x: self.aspect_x,
                y: self.aspect_y,
            })
        } else {
            None
        }
    }

    /// Check the both-zero-or-both-positive rule for the aspect fields.
    pub fn validate(&self) -> Result<()> {
        if (self.aspect_x == 0) != (self.aspect_y == 0) {
            return Err(CropError::InvalidInput(format!(
                "aspect must be both zero or both positive, got {}:{}",
                self.aspect_x, self.aspect_y
            )));
        }
        if let OutputTarget::File(path) = &self.output {
            if path.as_os_str().is_empty() {
                return Err(CropError::InvalidInput("empty output path".into()));
            }
        }
        Ok(())
    }
}

/// Engine-wide tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Largest texture edge the host can draw; preview bounds are clamped to it.
    pub max_texture_size: u32,
    /// Allocation budget handed to the decoder. Exceeding it is reported as
    /// out-of-memory instead of aborting the process.
    pub max_decode_alloc: Option<u64>,
    /// Quality for the exported JPEG (1-100).
    pub jpeg_quality: u8,
    /// How the preview decode factor grows.
    pub preview_sampling: SampleStrategy,
    /// Filter for the final export resize.
    pub export_filter: FilterType,
    /// Multiplicative step for `zoom_in` / `zoom_out`.
    pub zoom_step: f64,
    /// Duration of the re-zoom animation after a crop drag, in milliseconds.
    pub zoom_animation_ms: u64,
    /// Smallest crop edge, in preview pixels.
    pub min_crop_size: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            max_decode_alloc: Some(512 * 1024 * 1024),
            jpeg_quality: 90,
            preview_sampling: SampleStrategy::PowerOfTwo,
            export_filter: FilterType::Lanczos3,
            zoom_step: 1.25,
            zoom_animation_ms: 300,
            min_crop_size: 25.0,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_texture_size == 0 {
            return Err(CropError::InvalidInput(
                "max_texture_size must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CropError::InvalidInput(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.zoom_step.is_nan() || self.zoom_step <= 1.0 {
            return Err(CropError::InvalidInput(format!(
                "zoom_step must be greater than 1, got {}",
                self.zoom_step
            )));
        }
        if self.min_crop_size.is_nan() || self.min_crop_size < 1.0 {
            return Err(CropError::InvalidInput(format!(
                "min_crop_size must be at least 1, got {}",
                self.min_crop_size
            )));
        }
        Ok(())
    }
}
