//! Preview-to-viewport transform state.
//!
//! Two transforms are kept. The *base* transform fits the preview bitmap in
//! the viewport: it rotates the stored pixels upright, scales them by at
//! most 3x and centers them. The *interactive* transform accumulates the
//! user's pan and zoom on top of it.
//!
//! The crop overlay is drawn with the *unrotated* transform, which is the
//! base fit computed without the rotation term, followed by the same
//! interactive transform. Rect coordinates for the overlay therefore live
//! in the oriented preview frame `[0, 0, oriented_w, oriented_h]`.

use tracing::trace;

use super::matrix::Matrix;
use crate::decode::Rotation;
use crate::geometry::RectF;

/// Largest upscale applied when fitting a small preview to the viewport.
const MAX_FIT_SCALE: f64 = 3.0;

/// Stored dimensions and rotation of the bitmap being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFrame {
    /// Stored (pre-rotation) width.
    pub width: u32,
    /// Stored (pre-rotation) height.
    pub height: u32,
    pub rotation: Rotation,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }

    /// Width as displayed.
    pub fn oriented_width(&self) -> u32 {
        self.rotation.oriented_dimensions(self.width, self.height).0
    }

    /// Height as displayed.
    pub fn oriented_height(&self) -> u32 {
        self.rotation.oriented_dimensions(self.width, self.height).1
    }

    /// The oriented frame `[0, 0, oriented_w, oriented_h]`.
    pub fn oriented_rect(&self) -> RectF {
        RectF::from_size(self.oriented_width() as f64, self.oriented_height() as f64)
    }

    /// Matrix that rotates stored pixels about their center so they land
    /// in the oriented frame.
    fn rotate_matrix(&self) -> Matrix {
        let mut m = Matrix::translate(-(self.width as f64) / 2.0, -(self.height as f64) / 2.0);
        m.post_concat(&Matrix::rotate(self.rotation));
        m.post_translate(
            self.oriented_width() as f64 / 2.0,
            self.oriented_height() as f64 / 2.0,
        );
        m
    }
}

/// Base and interactive transforms for one displayed bitmap.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    viewport_width: f64,
    viewport_height: f64,
    image: ImageFrame,
    base: Matrix,
    base_unrotated: Matrix,
    interactive: Matrix,
    revision: u64,
}

impl TransformPipeline {
    /// Fit `image` into a `viewport_width x viewport_height` viewport.
    ///
    /// # Panics
    ///
    /// Panics if the viewport or the image is empty.
    pub fn new(image: ImageFrame, viewport_width: f64, viewport_height: f64) -> Self {
        assert!(
            viewport_width > 0.0 && viewport_height > 0.0,
            "viewport must be non-empty, got {viewport_width}x{viewport_height}"
        );
        assert!(
            image.width > 0 && image.height > 0,
            "image must be non-empty, got {}x{}",
            image.width,
            image.height
        );

        let mut pipeline = Self {
            viewport_width,
            viewport_height,
            image,
            base: Matrix::IDENTITY,
            base_unrotated: Matrix::IDENTITY,
            interactive: Matrix::IDENTITY,
            revision: 0,
        };
        pipeline.rebuild_base();
        pipeline
    }

    fn rebuild_base(&mut self) {
        self.base = self.fit_matrix(true);
        self.base_unrotated = self.fit_matrix(false);
        self.revision += 1;
    }

    fn fit_matrix(&self, include_rotation: bool) -> Matrix {
        let w = self.image.oriented_width() as f64;
        let h = self.image.oriented_height() as f64;

        let width_scale = (self.viewport_width / w).min(MAX_FIT_SCALE);
        let height_scale = (self.viewport_height / h).min(MAX_FIT_SCALE);
        let scale = width_scale.min(height_scale);

        let mut m = if include_rotation {
            self.image.rotate_matrix()
        } else {
            Matrix::IDENTITY
        };
        m.post_scale(scale, scale, 0.0, 0.0);
        m.post_translate(
            (self.viewport_width - w * scale) / 2.0,
            (self.viewport_height - h * scale) / 2.0,
        );
        m
    }

    /// Replace the displayed bitmap. The interactive transform is reset.
    pub fn set_image(&mut self, image: ImageFrame) {
        self.image = image;
        self.interactive.reset();
        self.rebuild_base();
    }

    /// Resize the viewport. The interactive transform is kept.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        assert!(width > 0.0 && height > 0.0, "viewport must be non-empty");
        self.viewport_width = width;
        self.viewport_height = height;
        self.rebuild_base();
    }

    pub fn image(&self) -> ImageFrame {
        self.image
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn base(&self) -> Matrix {
        self.base
    }

    pub fn interactive(&self) -> Matrix {
        self.interactive
    }

    /// Stored bitmap pixels to screen.
    pub fn composed(&self) -> Matrix {
        Matrix::concat(&self.base, &self.interactive)
    }

    /// Oriented preview frame to screen.
    pub fn unrotated(&self) -> Matrix {
        Matrix::concat(&self.base_unrotated, &self.interactive)
    }

    /// Interactive zoom level; 1.0 means fitted.
    pub fn scale(&self) -> f64 {
        self.interactive.scale_factor()
    }

    /// Zoom ceiling: four times the bitmap-to-viewport size ratio.
    pub fn max_zoom(&self) -> f64 {
        let fw = self.image.oriented_width() as f64 / self.viewport_width;
        let fh = self.image.oriented_height() as f64 / self.viewport_height;
        fw.max(fh) * 4.0
    }

    fn zoom_ceiling(&self) -> f64 {
        self.max_zoom().max(1.0)
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Where the whole bitmap lands on screen.
    pub fn image_screen_rect(&self) -> RectF {
        self.composed().map_rect(&RectF::from_size(
            self.image.width as f64,
            self.image.height as f64,
        ))
    }

    /// Map a rect in the oriented preview frame to screen coordinates.
    pub fn map_to_screen(&self, rect: &RectF) -> RectF {
        self.unrotated().map_rect(rect)
    }

    /// Zoom to `scale` about the screen point `(cx, cy)`, then recenter.
    ///
    /// The scale is clamped to `[1, max(max_zoom, 1)]`.
    pub fn zoom_to(&mut self, scale: f64, cx: f64, cy: f64) {
        let target = scale.clamp(1.0, self.zoom_ceiling());
        let delta = target / self.scale();
        self.interactive.post_scale(delta, delta, cx, cy);
        self.revision += 1;
        self.center(true, true);
    }

    /// Zoom in by `rate` about the viewport center.
    pub fn zoom_in(&mut self, rate: f64) {
        let current = self.scale();
        if current >= self.max_zoom() {
            return;
        }
        let target = (current * rate).min(self.zoom_ceiling());
        let delta = target / current;
        let (cx, cy) = (self.viewport_width / 2.0, self.viewport_height / 2.0);
        self.interactive.post_scale(delta, delta, cx, cy);
        self.revision += 1;
        self.center(true, true);
    }

    /// Zoom out by `rate` about the viewport center, never below 1x.
    pub fn zoom_out(&mut self, rate: f64) {
        let (cx, cy) = (self.viewport_width / 2.0, self.viewport_height / 2.0);

        let mut probe = self.interactive;
        probe.post_scale(1.0 / rate, 1.0 / rate, cx, cy);
        if probe.scale_factor() < 1.0 {
            self.interactive.reset();
        } else {
            self.interactive = probe;
        }
        self.revision += 1;
        self.center(true, true);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.interactive.post_translate(dx, dy);
        self.revision += 1;
    }

    /// Keep the bitmap placed sensibly on each requested axis.
    ///
    /// If the bitmap is smaller than the viewport on an axis it is centered;
    /// otherwise a gap at the leading edge is closed first, then a gap at
    /// the trailing edge.
    pub fn center(&mut self, horizontal: bool, vertical: bool) {
        let rect = self.image_screen_rect();

        let mut dx = 0.0;
        let mut dy = 0.0;

        if vertical {
            dy = Self::axis_delta(rect.top, rect.bottom, self.viewport_height);
        }
        if horizontal {
            dx = Self::axis_delta(rect.left, rect.right, self.viewport_width);
        }

        if dx != 0.0 || dy != 0.0 {
            trace!(dx, dy, "recentering preview");
        }
        self.interactive.post_translate(dx, dy);
        self.revision += 1;
    }

    fn axis_delta(start: f64, end: f64, extent: f64) -> f64 {
        let size = end - start;
        if size < extent {
            (extent - size) / 2.0 - start
        } else if start > 0.0 {
            -start
        } else if end < extent {
            extent - end
        } else {
            0.0
        }
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
