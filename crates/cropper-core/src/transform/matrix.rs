//! 2D affine matrix for preview-to-screen mapping.

use crate::decode::Rotation;
use crate::geometry::RectF;

/// A 2D affine transform.
///
/// A point `(x, y)` maps to `(X, Y)` by:
///
/// ```text
///   X = sx * x + kx * y + tx
///   Y = ky * x + sy * y + ty
/// ```
///
/// `post_*` operations apply *after* the current transform, so
/// `m.post_scale(..)` first maps by `m` and then scales the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub sx: f64,
    pub kx: f64,
    pub tx: f64,
    pub ky: f64,
    pub sy: f64,
    pub ty: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        sx: 1.0,
        kx: 0.0,
        tx: 0.0,
        ky: 0.0,
        sy: 1.0,
        ty: 0.0,
    };

    pub fn translate(dx: f64, dy: f64) -> Self {
        Matrix {
            tx: dx,
            ty: dy,
            ..Self::IDENTITY
        }
    }

    /// Scale about the pivot `(px, py)`.
    pub fn scale(sx: f64, sy: f64, px: f64, py: f64) -> Self {
        Matrix {
            sx,
            sy,
            tx: px - sx * px,
            ty: py - sy * py,
            ..Self::IDENTITY
        }
    }

    /// Clockwise quarter-turn about the origin (y axis pointing down).
    ///
    /// Uses exact sines and cosines so rotated rects keep integer edges.
    pub fn rotate(rotation: Rotation) -> Self {
        let (sin, cos) = match rotation {
            Rotation::None => (0.0, 1.0),
            Rotation::Deg90 => (1.0, 0.0),
            Rotation::Deg180 => (0.0, -1.0),
            Rotation::Deg270 => (-1.0, 0.0),
        };
        Matrix {
            sx: cos,
            kx: -sin,
            ky: sin,
            sy: cos,
            ..Self::IDENTITY
        }
    }

    pub fn reset(&mut self) {
        *self = Self::IDENTITY;
    }

    /// `self = other ∘ self`: map by `self`, then by `other`.
    pub fn post_concat(&mut self, other: &Matrix) {
        let s = *self;
        self.sx = other.sx * s.sx + other.kx * s.ky;
        self.kx = other.sx * s.kx + other.kx * s.sy;
        self.tx = other.sx * s.tx + other.kx * s.ty + other.tx;
        self.ky = other.ky * s.sx + other.sy * s.ky;
        self.sy = other.ky * s.kx + other.sy * s.sy;
        self.ty = other.ky * s.tx + other.sy * s.ty + other.ty;
    }

    pub fn post_translate(&mut self, dx: f64, dy: f64) {
        self.tx += dx;
        self.ty += dy;
    }

    pub fn post_scale(&mut self, sx: f64, sy: f64, px: f64, py: f64) {
        self.post_concat(&Matrix::scale(sx, sy, px, py));
    }

    /// `m` followed by `then`.
    pub fn concat(m: &Matrix, then: &Matrix) -> Matrix {
        let mut out = *m;
        out.post_concat(then);
        out
    }

    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }

    /// Axis-aligned bounding box of the mapped rect.
    pub fn map_rect(&self, rect: &RectF) -> RectF {
        let corners = [
            self.map_point(rect.left, rect.top),
            self.map_point(rect.right, rect.top),
            self.map_point(rect.left, rect.bottom),
            self.map_point(rect.right, rect.bottom),
        ];
        let mut out = RectF::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (x, y) in corners {
            out.left = out.left.min(x);
            out.top = out.top.min(y);
            out.right = out.right.max(x);
            out.bottom = out.bottom.max(y);
        }
        out
    }

    /// Uniform scale factor (length of the mapped unit x vector).
    pub fn scale_factor(&self) -> f64 {
        self.sx.hypot(self.ky)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_maps_unchanged() {
        assert_eq!(Matrix::IDENTITY.map_point(3.5, -2.0), (3.5, -2.0));
        assert_eq!(Matrix::default(), Matrix::IDENTITY);
    }

    #[test]
    fn test_scale_about_pivot_fixes_pivot() {
        let m = Matrix::scale(2.0, 2.0, 10.0, 20.0);
        assert_eq!(m.map_point(10.0, 20.0), (10.0, 20.0));
        assert_eq!(m.map_point(11.0, 20.0), (12.0, 20.0));
    }

    #[test]
    fn test_rotate_quarter_turn_is_clockwise() {
        // In y-down coordinates, +x turns to +y.
        let (x, y) = Matrix::rotate(Rotation::Deg90).map_point(1.0, 0.0);
        assert_eq!((x, y), (0.0, 1.0));
        let (x, y) = Matrix::rotate(Rotation::Deg270).map_point(1.0, 0.0);
        assert_eq!((x, y), (0.0, -1.0));
    }

    #[test]
    fn test_post_concat_order() {
        // Translate then scale: (1, 0) -> (2, 0) -> (4, 0).
        let mut m = Matrix::translate(1.0, 0.0);
        m.post_scale(2.0, 2.0, 0.0, 0.0);
        assert_eq!(m.map_point(1.0, 0.0), (4.0, 0.0));

        // Scale then translate: (1, 0) -> (2, 0) -> (3, 0).
        let mut m = Matrix::scale(2.0, 2.0, 0.0, 0.0);
        m.post_translate(1.0, 0.0);
        assert_eq!(m.map_point(1.0, 0.0), (3.0, 0.0));
    }

    #[test]
    fn test_map_rect_rotated_is_bounding_box() {
        let m = Matrix::rotate(Rotation::Deg90);
        let r = m.map_rect(&RectF::new(0.0, 0.0, 40.0, 20.0));
        assert_eq!(r, RectF::new(-20.0, 0.0, 0.0, 40.0));
    }

    #[test]
    fn test_scale_factor_ignores_rotation() {
        let mut m = Matrix::rotate(Rotation::Deg90);
        m.post_scale(2.5, 2.5, 0.0, 0.0);
        assert_relative_eq!(m.scale_factor(), 2.5);
    }

    #[test]
    fn test_concat() {
        let a = Matrix::translate(5.0, 0.0);
        let b = Matrix::scale(3.0, 3.0, 0.0, 0.0);
        assert_eq!(Matrix::concat(&a, &b).map_point(0.0, 0.0), (15.0, 0.0));
    }
}
