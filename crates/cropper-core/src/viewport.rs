//! Pointer handling, auto pan and animated zoom for the crop screen.
//!
//! [`ViewportController`] owns everything the user interacts with: the
//! transform pipeline, the preview bitmap and the crop region. It runs on
//! the host's UI thread; the animated zoom is a cooperative task advanced
//! by [`ViewportController::tick`].

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::{AspectRatio, EngineSettings};
use crate::geometry::{PixelRect, RectF};
use crate::preview::PreviewImage;
use crate::region::{CropRegion, ModifyMode};
use crate::transform::TransformPipeline;

/// Share of the viewport's smaller axis the crop rect is zoomed to fill
/// after a drag.
const REZOOM_FILL: f64 = 0.6;

/// Relative scale change below which no re-zoom is started.
const REZOOM_THRESHOLD: f64 = 0.1;

/// A linear zoom from one scale to another over wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomAnimation {
    started: Instant,
    duration: Duration,
    from: f64,
    to: f64,
    center_x: f64,
    center_y: f64,
}

impl ZoomAnimation {
    pub fn new(from: f64, to: f64, center_x: f64, center_y: f64, duration: Duration, now: Instant) -> Self {
        Self {
            started: now,
            duration,
            from,
            to,
            center_x,
            center_y,
        }
    }

    /// Scale at `now`, and whether the animation has finished.
    pub fn sample(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * t, false)
    }

    pub fn target(&self) -> f64 {
        self.to
    }
}

/// Owns the interactive state of one crop screen.
#[derive(Debug)]
pub struct ViewportController {
    pipeline: TransformPipeline,
    preview: PreviewImage,
    region: CropRegion,
    aspect: Option<AspectRatio>,
    animation: Option<ZoomAnimation>,
    zoom_step: f64,
    animation_duration: Duration,
    min_crop_size: f64,
}

impl ViewportController {
    /// Show `preview` fitted in a `viewport_width x viewport_height` viewport
    /// with a default crop rect.
    pub fn new(
        preview: PreviewImage,
        viewport_width: f64,
        viewport_height: f64,
        aspect: Option<AspectRatio>,
        settings: &EngineSettings,
    ) -> Self {
        let pipeline = TransformPipeline::new(preview.frame(), viewport_width, viewport_height);
        let region = CropRegion::new(preview.width(), preview.height(), aspect, settings.min_crop_size);

        Self {
            pipeline,
            preview,
            region,
            aspect,
            animation: None,
            zoom_step: settings.zoom_step,
            animation_duration: Duration::from_millis(settings.zoom_animation_ms),
            min_crop_size: settings.min_crop_size,
        }
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    pub fn preview(&self) -> &PreviewImage {
        &self.preview
    }

    pub fn region(&self) -> &CropRegion {
        &self.region
    }

    /// The crop rect on screen, for drawing the overlay.
    pub fn crop_screen_rect(&self) -> RectF {
        self.region.screen_rect(&self.pipeline.unrotated())
    }

    /// The crop rect in oriented source pixels.
    pub fn crop_rect(&self) -> PixelRect {
        self.region.scaled_crop_rect(self.preview.sample_size())
    }

    /// Begin a drag. A running zoom animation stops where it is.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> ModifyMode {
        self.cancel_animation();
        self.region.pointer_down(x, y, &self.pipeline.unrotated())
    }

    /// Apply a screen-space drag to the crop rect. Returns true if it moved.
    pub fn pointer_move(&mut self, dx: f64, dy: f64) -> bool {
        let changed = self.region.pointer_move(dx, dy, &self.pipeline.unrotated());
        if changed {
            self.ensure_visible();
        }
        if (self.pipeline.scale() - 1.0).abs() < f64::EPSILON {
            self.pipeline.center(true, true);
        }
        changed
    }

    /// End a drag. If the region was being dragged, start a re-zoom so it
    /// fills a comfortable share of the viewport.
    pub fn pointer_up(&mut self, now: Instant) {
        if self.region.mode() != ModifyMode::None {
            self.center_on_region(now);
            self.region.pointer_up();
        }
        self.pipeline.center(true, true);
    }

    fn center_on_region(&mut self, now: Instant) {
        let screen = self.crop_screen_rect();
        let (vw, vh) = (self.pipeline.viewport_width(), self.pipeline.viewport_height());
        let scale = self.pipeline.scale();

        if screen.width() > 0.0 && screen.height() > 0.0 {
            let z1 = vw / screen.width() * REZOOM_FILL;
            let z2 = vh / screen.height() * REZOOM_FILL;
            let zoom = (z1.min(z2) * scale).max(1.0);

            if (zoom - scale).abs() / zoom > REZOOM_THRESHOLD {
                let rect = self.region.rect();
                let (cx, cy) = self
                    .pipeline
                    .unrotated()
                    .map_point(rect.center_x(), rect.center_y());
                debug!(from = scale, to = zoom, "re-zooming on crop rect");
                self.zoom_to_animated(zoom, cx, cy, self.animation_duration, now);
            }
        }

        self.ensure_visible();
    }

    /// Pan by the minimal amount that brings the crop rect back on screen.
    ///
    /// On each axis an overflow past the leading edge wins over one past
    /// the trailing edge.
    pub fn ensure_visible(&mut self) {
        let r = self.crop_screen_rect();
        let (vw, vh) = (self.pipeline.viewport_width(), self.pipeline.viewport_height());

        let dx_lead = (0.0 - r.left).max(0.0);
        let dx_trail = (vw - r.right).min(0.0);
        let dy_lead = (0.0 - r.top).max(0.0);
        let dy_trail = (vh - r.bottom).min(0.0);

        let dx = if dx_lead != 0.0 { dx_lead } else { dx_trail };
        let dy = if dy_lead != 0.0 { dy_lead } else { dy_trail };

        if dx != 0.0 || dy != 0.0 {
            trace!(dx, dy, "panning crop rect into view");
            self.pipeline.pan_by(dx, dy);
        }
    }

    /// Start zooming to `scale` about `(cx, cy)` over `duration`.
    ///
    /// Replaces any animation already running.
    pub fn zoom_to_animated(&mut self, scale: f64, cx: f64, cy: f64, duration: Duration, now: Instant) {
        self.animation = Some(ZoomAnimation::new(
            self.pipeline.scale(),
            scale,
            cx,
            cy,
            duration,
            now,
        ));
    }

    /// Advance the running animation. Returns true while it is still running.
    ///
    /// Every step re-pans so the crop rect stays on screen.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        let (scale, finished) = animation.sample(now);
        self.pipeline
            .zoom_to(scale, animation.center_x, animation.center_y);
        self.ensure_visible();
        if finished {
            self.animation = None;
        }
        !finished
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Stop the running animation where it is.
    pub fn cancel_animation(&mut self) {
        if self.animation.take().is_some() {
            trace!("zoom animation cancelled");
        }
    }

    pub fn zoom_in(&mut self) {
        self.cancel_animation();
        self.pipeline.zoom_in(self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.cancel_animation();
        self.pipeline.zoom_out(self.zoom_step);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pipeline.pan_by(dx, dy);
    }

    /// The viewport was resized.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.pipeline.set_viewport(width, height);
        self.pipeline.center(true, true);
    }

    /// Show a new preview. The old bitmap is released immediately and the
    /// crop rect is reset.
    pub fn replace_preview(&mut self, preview: PreviewImage) {
        self.cancel_animation();
        let old = std::mem::replace(&mut self.preview, preview);
        old.release();

        self.pipeline.set_image(self.preview.frame());
        self.region = CropRegion::new(
            self.preview.width(),
            self.preview.height(),
            self.aspect,
            self.min_crop_size,
        );
    }

    /// Tear down: stop the animation and free the preview.
    pub fn release(mut self) {
        self.cancel_animation();
        self.preview.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedImage, Orientation};
    use approx::assert_relative_eq;

    fn preview(width: u32, height: u32, orientation: Orientation) -> PreviewImage {
        PreviewImage::from_parts(DecodedImage::try_alloc(width, height).unwrap(), 1, orientation)
    }

    fn controller(width: u32, height: u32, vw: f64, vh: f64) -> ViewportController {
        ViewportController::new(
            preview(width, height, Orientation::Normal),
            vw,
            vh,
            None,
            &EngineSettings::default(),
        )
    }

    #[test]
    fn test_zoom_animation_samples_linearly() {
        let now = Instant::now();
        let anim = ZoomAnimation::new(1.0, 3.0, 0.0, 0.0, Duration::from_millis(300), now);
        assert_eq!(anim.sample(now), (1.0, false));
        let (mid, done) = anim.sample(now + Duration::from_millis(150));
        assert_relative_eq!(mid, 2.0, epsilon = 1e-9);
        assert!(!done);
        assert_eq!(anim.sample(now + Duration::from_millis(300)), (3.0, true));
        assert_eq!(anim.sample(now + Duration::from_secs(5)), (3.0, true));
    }

    #[test]
    fn test_tick_runs_animation_to_completion() {
        let mut c = controller(1000, 1000, 500.0, 500.0);
        let now = Instant::now();
        c.zoom_to_animated(2.0, 250.0, 250.0, Duration::from_millis(300), now);
        assert!(c.tick(now + Duration::from_millis(100)));
        let partial = c.pipeline().scale();
        assert!(partial > 1.0 && partial < 2.0);
        assert!(!c.tick(now + Duration::from_millis(300)));
        assert_relative_eq!(c.pipeline().scale(), 2.0, epsilon = 1e-9);
        assert!(!c.is_animating());
        assert!(!c.tick(now + Duration::from_millis(400)));
    }

    #[test]
    fn test_cancel_animation_leaves_state() {
        let mut c = controller(1000, 1000, 500.0, 500.0);
        let now = Instant::now();
        c.zoom_to_animated(3.0, 250.0, 250.0, Duration::from_millis(300), now);
        c.tick(now + Duration::from_millis(100));
        let scale = c.pipeline().scale();
        c.cancel_animation();
        assert!(!c.tick(now + Duration::from_millis(300)));
        assert_relative_eq!(c.pipeline().scale(), scale);
    }

    #[test]
    fn test_locked_right_edge_drag_grows_height() {
        // Preview shown at exactly 1:1 so screen and preview pixels match.
        let aspect = Some(AspectRatio { x: 1, y: 1 });
        let mut c = ViewportController::new(
            preview(1000, 1000, Orientation::Normal),
            1000.0,
            1000.0,
            aspect,
            &EngineSettings::default(),
        );
        c.region.grow_by(crate::region::Handle::Right, -400.0, 0.0);
        let before = c.region().rect();

        let screen = c.crop_screen_rect();
        assert_eq!(
            c.pointer_down(screen.right, screen.center_y()),
            ModifyMode::Grow(crate::region::Handle::Right)
        );
        assert!(c.pointer_move(50.0, 0.0));
        let after = c.region().rect();
        assert_relative_eq!(after.height(), before.height() + 50.0);
        assert_relative_eq!(after.width(), before.width() + 50.0);
    }

    #[test]
    fn test_pointer_up_rezooms_small_rect() {
        // Fitted at 0.5: the default rect sits at (5, 5, 995, 995) on screen.
        let mut c = controller(2000, 2000, 1000.0, 1000.0);
        let now = Instant::now();
        let screen = c.crop_screen_rect();
        c.pointer_down(screen.left, screen.top);
        // Shrink to 100x100 screen pixels via the top-left handle.
        assert!(c.pointer_move(890.0, 890.0));
        assert_relative_eq!(c.region().rect().width(), 200.0);
        c.pointer_up(now);

        assert!(c.is_animating());
        assert_eq!(c.region().mode(), ModifyMode::None);
        while c.tick(now + Duration::from_millis(300)) {}
        // 1000 / 100 * 0.6 = 6
        assert_relative_eq!(c.pipeline().scale(), 6.0, epsilon = 1e-9);

        // The rect is on screen after the zoom settles.
        let r = c.crop_screen_rect();
        assert!(r.left >= -1.0 && r.right <= 1001.0);
        assert!(r.top >= -1.0 && r.bottom <= 1001.0);
    }

    #[test]
    fn test_rezoom_keeps_shrunk_rect_near_top_left_on_screen() {
        let mut c = controller(2000, 2000, 1000.0, 1000.0);
        let now = Instant::now();
        let screen = c.crop_screen_rect();
        c.pointer_down(screen.right, screen.bottom);
        // Shrink towards the top-left corner: (5, 5, 105, 105) on screen.
        assert!(c.pointer_move(-890.0, -890.0));
        c.pointer_up(now);

        let mut steps = 0;
        while c.tick(now + Duration::from_millis(100 * steps)) {
            steps += 1;
            let r = c.crop_screen_rect();
            if r.width() < 1000.0 {
                assert!(r.left >= -1e-6 && r.top >= -1e-6, "step {steps}: {r:?}");
            }
        }
        assert_relative_eq!(c.pipeline().scale(), 6.0, epsilon = 1e-9);

        let r = c.crop_screen_rect();
        assert_relative_eq!(r.width(), 600.0, epsilon = 1e-6);
        assert!(r.left >= -1e-6 && r.top >= -1e-6, "{r:?}");
        assert!(r.right <= 1000.0 + 1e-6 && r.bottom <= 1000.0 + 1e-6, "{r:?}");
    }

    #[test]
    fn test_pointer_move_recenters_at_unit_scale() {
        let mut c = controller(1000, 1000, 1000.0, 1000.0);
        c.pipeline.pan_by(40.0, -30.0);
        let screen = c.crop_screen_rect();
        c.pointer_down(screen.center_x(), screen.center_y());
        // A move that changes nothing still recenters the bitmap.
        c.pointer_move(0.0, 0.0);
        let image = c.pipeline().image_screen_rect();
        assert_relative_eq!(image.left, 0.0, epsilon = 1e-9);
        assert_relative_eq!(image.top, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pointer_up_small_change_does_not_animate() {
        let mut c = controller(1000, 1000, 1000.0, 1000.0);
        let screen = c.crop_screen_rect();
        c.pointer_down(screen.center_x(), screen.center_y());
        c.pointer_move(1.0, 1.0);
        c.pointer_up(Instant::now());
        // The default rect already fills most of the viewport; zoom stays 1.
        assert!(!c.is_animating());
    }

    #[test]
    fn test_pointer_up_without_drag_is_plain_recenter() {
        let mut c = controller(1000, 1000, 1000.0, 1000.0);
        c.pointer_up(Instant::now());
        assert!(!c.is_animating());
    }

    #[test]
    fn test_ensure_visible_pans_minimally() {
        let mut c = controller(2000, 2000, 500.0, 500.0);
        c.pipeline.zoom_to(4.0, 0.0, 0.0);
        // Zoomed on the top-left corner: the default rect spills right.
        let before = c.crop_screen_rect();
        assert_relative_eq!(before.left, 10.0);
        assert!(before.right > 500.0);

        c.ensure_visible();
        let after = c.crop_screen_rect();
        assert_relative_eq!(after.right, 500.0);
        assert_relative_eq!(after.width(), before.width());

        // Overflowing on both sides: the leading edge wins.
        c.pan_by(-50.0, 0.0);
        c.ensure_visible();
        assert_relative_eq!(c.crop_screen_rect().left, 0.0);
    }

    #[test]
    fn test_crop_rect_uses_sample_size() {
        let p = PreviewImage::from_parts(DecodedImage::try_alloc(100, 80).unwrap(), 4, Orientation::Normal);
        let c = ViewportController::new(p, 200.0, 200.0, None, &EngineSettings::default());
        let r = c.region().rect();
        let px = c.crop_rect();
        assert_eq!(px.x, (r.left * 4.0) as u32);
        assert_eq!(px.width, (r.right * 4.0) as u32 - px.x);
    }

    #[test]
    fn test_rotated_preview_region_uses_oriented_size() {
        let c = ViewportController::new(
            preview(200, 100, Orientation::Rotate90CW),
            500.0,
            500.0,
            None,
            &EngineSettings::default(),
        );
        assert_eq!(c.region().image_rect(), RectF::from_size(100.0, 200.0));
        // The overlay matches where the rotated bitmap lands on screen.
        let overlay = c.pipeline().map_to_screen(&c.region().image_rect());
        let bitmap = c.pipeline().image_screen_rect();
        assert_relative_eq!(overlay.left, bitmap.left, epsilon = 1e-9);
        assert_relative_eq!(overlay.bottom, bitmap.bottom, epsilon = 1e-9);
    }

    #[test]
    fn test_replace_preview_resets_region() {
        let mut c = controller(1000, 1000, 500.0, 500.0);
        c.zoom_in();
        c.replace_preview(preview(300, 200, Orientation::Normal));
        assert_eq!(c.region().image_rect(), RectF::from_size(300.0, 200.0));
        assert_relative_eq!(c.pipeline().scale(), 1.0);
        c.release();
    }
}
