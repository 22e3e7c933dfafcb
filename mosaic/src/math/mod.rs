//! Integer pixel boxes and 2D affine transforms.

mod affine;
mod bbox;

pub use affine::AffineTransform;
pub use bbox::Aabb;

/// Values within this distance of an integer are treated as that integer
/// when snapping continuous coordinates onto the pixel grid.
pub(crate) const GRID_SNAP_EPSILON: f64 = 1e-6;

/// Snap `v` to the nearest integer when it is within [`GRID_SNAP_EPSILON`].
#[inline]
pub(crate) fn snap_to_grid(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < GRID_SNAP_EPSILON { r } else { v }
}
