//! The interactive crop rectangle.
//!
//! The rect lives in the oriented preview frame `[0, 0, w, h]`. Screen
//! input is converted with the overlay transform the caller passes in (the
//! pipeline's unrotated matrix), so the region itself never needs to know
//! about pan, zoom or EXIF rotation.
//!
//! After every mutation the rect is inside the image, at least
//! `min(min_size, image)` on each side, and holds its aspect ratio when
//! locked.

use tracing::trace;

use crate::config::AspectRatio;
use crate::geometry::{PixelRect, RectF};
use crate::transform::Matrix;

/// Touch slop around the rect edges, in screen pixels.
pub const HYSTERESIS: f64 = 20.0;

/// Default smallest crop edge, in preview pixels.
pub const MIN_SIZE: f64 = 25.0;

/// Which part of the rect is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::Left,
        Handle::Right,
        Handle::Top,
        Handle::Bottom,
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];

    fn from_edges(left: bool, right: bool, top: bool, bottom: bool) -> Option<Handle> {
        match (left, right, top, bottom) {
            (true, false, true, false) => Some(Handle::TopLeft),
            (false, true, true, false) => Some(Handle::TopRight),
            (true, false, false, true) => Some(Handle::BottomLeft),
            (false, true, false, true) => Some(Handle::BottomRight),
            (true, false, false, false) => Some(Handle::Left),
            (false, true, false, false) => Some(Handle::Right),
            (false, false, true, false) => Some(Handle::Top),
            (false, false, false, true) => Some(Handle::Bottom),
            _ => None,
        }
    }

    pub fn moves_left(self) -> bool {
        matches!(self, Handle::Left | Handle::TopLeft | Handle::BottomLeft)
    }

    pub fn moves_right(self) -> bool {
        matches!(self, Handle::Right | Handle::TopRight | Handle::BottomRight)
    }

    pub fn moves_top(self) -> bool {
        matches!(self, Handle::Top | Handle::TopLeft | Handle::TopRight)
    }

    pub fn moves_bottom(self) -> bool {
        matches!(self, Handle::Bottom | Handle::BottomLeft | Handle::BottomRight)
    }

    pub fn is_corner(self) -> bool {
        (self.moves_left() || self.moves_right()) && (self.moves_top() || self.moves_bottom())
    }
}

/// What a pointer drag currently does to the rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifyMode {
    #[default]
    None,
    Move,
    Grow(Handle),
}

/// Which edge of an axis stays fixed while the other moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    End,
    Center,
}

impl Anchor {
    fn horizontal(handle: Handle) -> Self {
        if handle.moves_left() {
            Anchor::End
        } else if handle.moves_right() {
            Anchor::Start
        } else {
            Anchor::Center
        }
    }

    fn vertical(handle: Handle) -> Self {
        if handle.moves_top() {
            Anchor::End
        } else if handle.moves_bottom() {
            Anchor::Start
        } else {
            Anchor::Center
        }
    }

    /// Proposed size after the free edge moves by `delta`.
    fn resize(self, size: f64, delta: f64) -> f64 {
        match self {
            Anchor::Start => size + delta,
            Anchor::End => size - delta,
            Anchor::Center => size,
        }
    }

    fn place(self, start: f64, end: f64, size: f64) -> (f64, f64) {
        match self {
            Anchor::Start => (start, start + size),
            Anchor::End => (end - size, end),
            Anchor::Center => {
                let center = (start + end) / 2.0;
                (center - size / 2.0, center + size / 2.0)
            }
        }
    }
}

/// Crop rectangle with optional aspect lock and drag state.
#[derive(Debug, Clone)]
pub struct CropRegion {
    rect: RectF,
    image: RectF,
    aspect: Option<AspectRatio>,
    min_size: f64,
    mode: ModifyMode,
}

impl CropRegion {
    /// Default rect for a `width x height` oriented preview.
    ///
    /// The rect covers 99% of the shorter side, is square unless an aspect
    /// is given, and is centered.
    ///
    /// # Panics
    ///
    /// Panics if the image is empty.
    pub fn new(width: u32, height: u32, aspect: Option<AspectRatio>, min_size: f64) -> Self {
        assert!(width > 0 && height > 0, "crop image must be non-empty");

        let shorter = width.min(height) as u64;
        let side = (shorter * 99 / 100).max(1) as f64;

        let (mut crop_w, mut crop_h) = (side, side);
        if let Some(a) = aspect {
            if a.x > a.y {
                crop_h = side * a.y as f64 / a.x as f64;
            } else {
                crop_w = side * a.x as f64 / a.y as f64;
            }
        }

        let x = ((width as f64 - crop_w) / 2.0).trunc();
        let y = ((height as f64 - crop_h) / 2.0).trunc();

        Self {
            rect: RectF::new(x, y, x + crop_w, y + crop_h),
            image: RectF::from_size(width as f64, height as f64),
            aspect,
            min_size,
            mode: ModifyMode::None,
        }
    }

    /// The crop rect in the oriented preview frame.
    pub fn rect(&self) -> RectF {
        self.rect
    }

    pub fn image_rect(&self) -> RectF {
        self.image
    }

    pub fn aspect(&self) -> Option<AspectRatio> {
        self.aspect
    }

    pub fn mode(&self) -> ModifyMode {
        self.mode
    }

    /// Start a drag without a hit test.
    pub fn set_mode(&mut self, mode: ModifyMode) {
        self.mode = mode;
    }

    /// The rect on screen, rounded to whole pixels.
    pub fn screen_rect(&self, overlay: &Matrix) -> RectF {
        overlay.map_rect(&self.rect).round()
    }

    /// What a pointer at screen `(x, y)` would grab.
    pub fn hit(&self, x: f64, y: f64, overlay: &Matrix) -> ModifyMode {
        let r = self.screen_rect(overlay);

        let vertical_check = y >= r.top - HYSTERESIS && y < r.bottom + HYSTERESIS;
        let horizontal_check = x >= r.left - HYSTERESIS && x < r.right + HYSTERESIS;

        let mut near_left = (r.left - x).abs() < HYSTERESIS && vertical_check;
        let mut near_right = (r.right - x).abs() < HYSTERESIS && vertical_check;
        let mut near_top = (r.top - y).abs() < HYSTERESIS && horizontal_check;
        let mut near_bottom = (r.bottom - y).abs() < HYSTERESIS && horizontal_check;

        // A narrow rect can put both opposite edges in reach; keep the closer.
        if near_left && near_right {
            if (r.left - x).abs() <= (r.right - x).abs() {
                near_right = false;
            } else {
                near_left = false;
            }
        }
        if near_top && near_bottom {
            if (r.top - y).abs() <= (r.bottom - y).abs() {
                near_bottom = false;
            } else {
                near_top = false;
            }
        }

        if let Some(handle) = Handle::from_edges(near_left, near_right, near_top, near_bottom) {
            return ModifyMode::Grow(handle);
        }
        if r.contains(x, y) {
            return ModifyMode::Move;
        }
        ModifyMode::None
    }

    /// Begin a drag at screen `(x, y)`.
    pub fn pointer_down(&mut self, x: f64, y: f64, overlay: &Matrix) -> ModifyMode {
        self.mode = self.hit(x, y, overlay);
        trace!(x, y, mode = ?self.mode, "crop pointer down");
        self.mode
    }

    /// Apply a screen-space drag. Returns true if the rect changed.
    pub fn pointer_move(&mut self, dx: f64, dy: f64, overlay: &Matrix) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        let scale = overlay.scale_factor();
        if scale <= 0.0 || !scale.is_finite() {
            return false;
        }
        let (dx, dy) = (dx / scale, dy / scale);

        let before = self.rect;
        match self.mode {
            ModifyMode::None => return false,
            ModifyMode::Move => self.move_by(dx, dy),
            ModifyMode::Grow(handle) => self.grow_by(handle, dx, dy),
        }
        self.rect != before
    }

    pub fn pointer_up(&mut self) {
        self.mode = ModifyMode::None;
    }

    /// Translate in preview pixels, staying inside the image.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.rect.offset(dx, dy);
        self.shift_inside();
    }

    /// Move the handle's edges by `(dx, dy)` preview pixels.
    ///
    /// The opposite edges stay put. With an aspect lock the dragged
    /// dimension drives the other; a corner drag is driven by width when
    /// the aspect is wider than tall. A followed dimension whose edge is not
    /// dragged changes symmetrically about its center.
    pub fn grow_by(&mut self, handle: Handle, dx: f64, dy: f64) {
        let r = self.rect;
        let (image_w, image_h) = (self.image.width(), self.image.height());

        let h_anchor = Anchor::horizontal(handle);
        let v_anchor = Anchor::vertical(handle);

        let mut w = h_anchor.resize(r.width(), dx);
        let mut h = v_anchor.resize(r.height(), dy);

        let min_w = self.min_size.min(image_w);
        let min_h = self.min_size.min(image_h);

        match self.aspect {
            Some(aspect) => {
                let ratio = aspect.ratio();
                let drags_x = handle.moves_left() || handle.moves_right();
                let width_drives = if handle.is_corner() {
                    aspect.x > aspect.y
                } else {
                    drags_x
                };
                if !width_drives {
                    w = h * ratio;
                }

                let lo = min_w.max(min_h * ratio);
                let hi = image_w.min(image_h * ratio);
                w = if lo > hi { hi } else { w.clamp(lo, hi) };
                h = w / ratio;
            }
            None => {
                w = w.clamp(min_w, image_w);
                h = h.clamp(min_h, image_h);
            }
        }

        let (left, right) = h_anchor.place(r.left, r.right, w);
        let (top, bottom) = v_anchor.place(r.top, r.bottom, h);
        self.rect = RectF::new(left, top, right, bottom);
        self.shift_inside();
    }

    fn shift_inside(&mut self) {
        let mut dx = 0.0;
        if self.rect.left < self.image.left {
            dx = self.image.left - self.rect.left;
        } else if self.rect.right > self.image.right {
            dx = self.image.right - self.rect.right;
        }

        let mut dy = 0.0;
        if self.rect.top < self.image.top {
            dy = self.image.top - self.rect.top;
        } else if self.rect.bottom > self.image.bottom {
            dy = self.image.bottom - self.rect.bottom;
        }

        self.rect.offset(dx, dy);
    }

    /// The rect in oriented source pixels, for a preview decoded at
    /// `1/sample_size`. Each edge is multiplied and truncated.
    pub fn scaled_crop_rect(&self, sample_size: u32) -> PixelRect {
        let s = sample_size as f64;
        let left = (self.rect.left * s) as u32;
        let top = (self.rect.top * s) as u32;
        let right = (self.rect.right * s) as u32;
        let bottom = (self.rect.bottom * s) as u32;
        PixelRect::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Move(f64, f64),
        Grow(Handle, f64, f64),
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        let delta = -3000.0f64..3000.0;
        prop_oneof![
            (delta.clone(), delta.clone()).prop_map(|(x, y)| Step::Move(x, y)),
            (prop::sample::select(Handle::ALL.to_vec()), delta.clone(), delta)
                .prop_map(|(h, x, y)| Step::Grow(h, x, y)),
        ]
    }

    fn aspect_strategy() -> impl Strategy<Value = Option<AspectRatio>> {
        prop_oneof![
            Just(None),
            (1u32..=16, 1u32..=16).prop_map(|(x, y)| Some(AspectRatio { x, y })),
        ]
    }

    proptest! {
        /// Property: the rect stays inside the image, non-empty, and holds
        /// its ratio when locked, across any drag sequence.
        #[test]
        fn prop_region_invariants_hold(
            w in 1u32..=3000,
            h in 1u32..=3000,
            aspect in aspect_strategy(),
            steps in prop::collection::vec(step_strategy(), 1..40),
        ) {
            let mut region = CropRegion::new(w, h, aspect, MIN_SIZE);
            let image = region.image_rect();
            let eps = 1e-6 * (w.max(h) as f64);

            for step in steps {
                match step {
                    Step::Move(dx, dy) => region.move_by(dx, dy),
                    Step::Grow(handle, dx, dy) => region.grow_by(handle, dx, dy),
                }
                let r = region.rect();
                prop_assert!(!r.is_empty(), "degenerate rect {:?}", r);
                prop_assert!(r.left >= image.left - eps && r.top >= image.top - eps);
                prop_assert!(r.right <= image.right + eps && r.bottom <= image.bottom + eps);
                if let Some(a) = aspect {
                    let ratio = r.width() / r.height();
                    prop_assert!(
                        (ratio - a.ratio()).abs() <= 1e-6 * a.ratio(),
                        "ratio {} drifted from {}", ratio, a.ratio()
                    );
                }
            }
        }
    }
}
