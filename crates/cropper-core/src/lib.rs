//! Cropper Core - bounded-memory image crop engine
//!
//! This crate provides everything behind an interactive crop screen:
//! decoding a subsampled preview of an arbitrarily large image, fitting it
//! into a viewport with zoom and pan, a draggable crop rectangle with an
//! optional aspect lock, and exporting the selected region from the
//! full-resolution source as an orientation-tagged JPEG.
//!
//! # Layout
//!
//! - [`decode`]: source probing, sampled and region decodes, EXIF orientation
//! - [`transform`]: affine matrices, the preview transform pipeline, region
//!   extraction and quarter-turn rotation
//! - [`region`]: the crop rectangle state machine
//! - [`viewport`]: pointer handling, auto pan and animated zoom
//! - [`export`]: region decode, resize, encode and persist
//! - [`session`]: background setup and export with a callback
//!
//! The library never installs a `tracing` subscriber; hosts choose their own.

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod export;
pub mod geometry;
pub mod preview;
pub mod region;
pub mod session;
pub mod transform;
pub mod viewport;

pub use config::{AspectRatio, CropConfig, EngineSettings, OutputTarget};
pub use decode::{ByteSource, FileBytes, MemoryBytes, Orientation, Rotation, SourceImage};
pub use error::{CropError, Result};
pub use export::{ExportOutput, ExportPipeline, ExportSummary};
pub use geometry::{PixelRect, RectF};
pub use preview::{PreviewImage, PreviewSize};
pub use region::{CropRegion, Handle, ModifyMode};
pub use session::{CropSession, SessionBusy, SessionEvent, SetupRequest, SetupSummary, TaskEvent};
pub use transform::{Matrix, TransformPipeline};
pub use viewport::{ViewportController, ZoomAnimation};
