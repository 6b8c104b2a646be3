//! Coordinate transforms between stored pixels, the preview and the screen.
//!
//! # Coordinate Spaces
//!
//! - **Stored**: pixels as the decoder produces them, before EXIF rotation
//! - **Oriented**: the upright frame the user sees; crop rects live here
//! - **Screen**: viewport pixels after fit, pan and zoom
//!
//! Rotation is always a clockwise quarter turn. Origin is the top-left
//! corner and y grows downward.

mod crop;
mod matrix;
mod pipeline;
mod rotation;

pub use crop::extract_region;
pub use matrix::Matrix;
pub use pipeline::{ImageFrame, TransformPipeline};
pub use rotation::{orient_rect, rotate_image, unorient_rect};
