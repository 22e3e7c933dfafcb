//! Masked bilinear resampling of native patches into the mosaic frame.

use common::{BitBuffer2, Buffer2};
use glam::{DVec2, IVec2};

use crate::math::{Aabb, AffineTransform, snap_to_grid};
use crate::raster::RasterPatch;

/// Bilinear sample of `patch` at continuous position `p` (patch frame).
///
/// Only taps with non-zero weight are read, so positions on the pixel grid
/// reproduce the source pixel exactly and never depend on a neighbour. The
/// sample is `None` if any needed tap is outside the patch or masked.
#[inline]
pub fn sample_bilinear(patch: &RasterPatch, p: DVec2) -> Option<f32> {
    if !p.is_finite() {
        return None;
    }
    let x = snap_to_grid(p.x);
    let y = snap_to_grid(p.y);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let base = IVec2::new(x0 as i32, y0 as i32);

    let taps = [
        (IVec2::new(0, 0), (1.0 - fx) * (1.0 - fy)),
        (IVec2::new(1, 0), fx * (1.0 - fy)),
        (IVec2::new(0, 1), (1.0 - fx) * fy),
        (IVec2::new(1, 1), fx * fy),
    ];

    let mut value = 0.0f64;
    for (offset, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        value += weight * patch.sample(base + offset)? as f64;
    }
    Some(value as f32)
}

/// Resample `patch` onto the mosaic-frame `region`.
///
/// `inverse` maps mosaic coordinates into the patch's native frame. Pixels
/// whose sample is unavailable are zero-filled and marked invalid.
pub fn warp_patch_bilinear(patch: &RasterPatch, inverse: &AffineTransform, region: Aabb) -> RasterPatch {
    let width = region.width() as usize;
    let height = region.height() as usize;
    let mut values = Buffer2::new_filled(width, height, 0.0f32);
    let mut valid = BitBuffer2::new_default(width, height);

    for y in 0..height {
        let row = values.row_mut(y);
        for (x, out) in row.iter_mut().enumerate() {
            let p = region.min + IVec2::new(x as i32, y as i32);
            if let Some(v) = sample_bilinear(patch, inverse.apply(p.as_dvec2())) {
                *out = v;
                valid.set(x, y, true);
            }
        }
    }

    RasterPatch::new(region, values, valid)
}
