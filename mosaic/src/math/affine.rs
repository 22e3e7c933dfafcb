//! 2D affine transform: a linear part plus a translation.

use glam::{DMat2, DVec2};
use serde::{Deserialize, Serialize};

use super::Aabb;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_DET: f64 = 1e-10;

/// Maps `p` to `matrix * p + translation`.
///
/// Pixel coordinates are used directly: integer coordinates address pixel
/// positions on the grid, with no half-pixel shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub matrix: DMat2,
    pub translation: DVec2,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.matrix;
        write!(
            f,
            "Affine([{:.6}, {:.6}; {:.6}, {:.6}], t=({:.3}, {:.3}))",
            m.x_axis.x, m.y_axis.x, m.x_axis.y, m.y_axis.y, self.translation.x, self.translation.y
        )
    }
}

impl AffineTransform {
    #[inline]
    pub const fn new(matrix: DMat2, translation: DVec2) -> Self {
        Self {
            matrix,
            translation,
        }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self::new(DMat2::IDENTITY, DVec2::ZERO)
    }

    #[inline]
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new(DMat2::IDENTITY, DVec2::new(dx, dy))
    }

    /// Build from row-major parameters `[a, b, tx, c, d, ty]`:
    /// `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`.
    #[inline]
    pub fn from_params(p: [f64; 6]) -> Self {
        Self::new(
            DMat2::from_cols(DVec2::new(p[0], p[3]), DVec2::new(p[1], p[4])),
            DVec2::new(p[2], p[5]),
        )
    }

    /// Row-major parameters `[a, b, tx, c, d, ty]`.
    pub fn to_params(&self) -> [f64; 6] {
        let m = self.matrix;
        [
            m.x_axis.x,
            m.y_axis.x,
            self.translation.x,
            m.x_axis.y,
            m.y_axis.y,
            self.translation.y,
        ]
    }

    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        self.matrix * p + self.translation
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }

    #[inline]
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() > SINGULAR_DET && self.translation.is_finite()
    }

    /// Inverse transform, or `None` when the linear part is singular.
    pub fn try_inverse(&self) -> Option<Self> {
        if !self.is_invertible() {
            return None;
        }
        let inv = self.matrix.inverse();
        Some(Self::new(inv, -(inv * self.translation)))
    }

    /// `self ∘ inner`: applies `inner` first, then `self`.
    ///
    /// `(M2, t2) ∘ (M1, t1) = (M2·M1, M2·t1 + t2)`.
    #[inline]
    pub fn compose(&self, inner: &Self) -> Self {
        Self::new(
            self.matrix * inner.matrix,
            self.matrix * inner.translation + self.translation,
        )
    }

    /// Box on the pixel grid covering the image of `bbox` under this transform.
    pub fn transform_aabb(&self, bbox: &Aabb) -> Aabb {
        if bbox.is_empty() {
            return Aabb::empty();
        }
        Aabb::covering(&bbox.corners().map(|c| self.apply(c)))
    }

    /// Largest distance between where `self` and `other` send the corners
    /// of `bbox`.
    pub fn max_corner_deviation(&self, other: &Self, bbox: &Aabb) -> f64 {
        bbox.corners()
            .iter()
            .map(|&c| self.apply(c).distance(other.apply(c)))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    const EPSILON: f64 = 1e-9;

    fn rotation(angle: f64) -> DMat2 {
        DMat2::from_angle(angle)
    }

    #[test]
    fn test_params_layout() {
        let t = AffineTransform::from_params([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let p = t.apply(DVec2::new(1.0, 1.0));
        assert_eq!(p, DVec2::new(6.0, 15.0));
        assert_eq!(t.to_params(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = AffineTransform::new(rotation(0.3) * 1.7, DVec2::new(12.5, -4.0));
        let inv = t.try_inverse().unwrap();
        let p = DVec2::new(31.0, 7.25);
        assert!(inv.apply(t.apply(p)).distance(p) < EPSILON);
        assert!(t.apply(inv.apply(p)).distance(p) < EPSILON);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let t = AffineTransform::from_params([1.0, 2.0, 0.0, 2.0, 4.0, 0.0]);
        assert!(!t.is_invertible());
        assert!(t.try_inverse().is_none());

        let nan = AffineTransform::from_params([f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(nan.try_inverse().is_none());
    }

    #[test]
    fn test_compose_applies_inner_first() {
        let scale = AffineTransform::new(DMat2::from_diagonal(DVec2::splat(2.0)), DVec2::ZERO);
        let shift = AffineTransform::translation(10.0, 0.0);
        let p = DVec2::new(1.0, 1.0);

        assert_eq!(scale.compose(&shift).apply(p), DVec2::new(22.0, 2.0));
        assert_eq!(shift.compose(&scale).apply(p), DVec2::new(12.0, 2.0));
    }

    #[test]
    fn test_compose_with_identity_is_unchanged() {
        let id = AffineTransform::identity();
        let transforms = [
            AffineTransform::translation(80.0, -3.5),
            AffineTransform::new(rotation(0.7) * 1.3, DVec2::new(-12.0, 400.25)),
            AffineTransform::from_params([1.01, 0.02, 50.0, -0.03, 0.99, 3.0]),
        ];
        for t in transforms {
            assert_eq!(t.compose(&id), t);
            assert_eq!(id.compose(&t), t);
        }
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let t = AffineTransform::new(rotation(-1.1) * 0.8, DVec2::new(-300.0, 45.5));
        let id = t.compose(&t.try_inverse().unwrap());
        let bbox = Aabb::from_size(1000, 1000);
        assert!(id.max_corner_deviation(&AffineTransform::identity(), &bbox) < 1e-6);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let t = AffineTransform::translation(80.0, 0.0);
        let b = t.transform_aabb(&Aabb::from_size(100, 100));
        assert_eq!(b, Aabb::from_xywh(80, 0, 100, 100));
    }

    #[test]
    fn test_transform_aabb_rotation_covers_corners() {
        let t = AffineTransform::new(rotation(std::f64::consts::FRAC_PI_4), DVec2::ZERO);
        let src = Aabb::from_size(10, 10);
        let b = t.transform_aabb(&src);
        for c in src.corners() {
            let p = t.apply(c);
            assert!(p.x >= b.min.x as f64 && p.x <= b.max.x as f64);
            assert!(p.y >= b.min.y as f64 && p.y <= b.max.y as f64);
        }
        assert_eq!(b.min, IVec2::new(-8, 0));
        assert_eq!(b.max, IVec2::new(8, 15));
    }

    #[test]
    fn test_transform_empty_aabb() {
        let t = AffineTransform::translation(3.0, 3.0);
        assert!(t.transform_aabb(&Aabb::empty()).is_empty());
    }
}
