//! Centerline blending weights.
//!
//! Every valid pixel gets a weight that is largest at the middle of its
//! valid row and column spans and falls off linearly toward the span ends.
//! The pixel's weight is the smaller of the horizontal and vertical
//! components, so weights shrink toward every edge of the valid footprint.
//!
//! Invalid pixels get one of two sentinels: `hole_fill` when the pixel lies
//! inside both its row span and its column span (a gap surrounded by data),
//! `border_fill` otherwise. Sentinels are never used as blending weights;
//! compositing looks at the validity mask first.

#[cfg(test)]
mod tests;

use common::{BitBuffer2, Buffer2};
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::math::Aabb;
use crate::raster::RasterPatch;

/// Weight computation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Sentinel for invalid pixels enclosed by valid data on both axes.
    pub hole_fill: f32,
    /// Sentinel for invalid pixels outside the valid envelope.
    pub border_fill: f32,
    /// Clip weights at the blend cutoff before compositing, which keeps
    /// interior pixels of each image at equal weight.
    pub clip_to_cutoff: bool,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            hole_fill: 0.0,
            border_fill: -1.0,
            clip_to_cutoff: true,
        }
    }
}

/// Valid span `[first, last]` of one row or column, `None` when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    first: usize,
    last: usize,
}

impl Span {
    #[inline]
    fn include(span: &mut Option<Span>, pos: usize) {
        match span {
            Some(s) => {
                s.first = s.first.min(pos);
                s.last = s.last.max(pos);
            }
            None => *span = Some(Span {
                first: pos,
                last: pos,
            }),
        }
    }

    #[inline]
    fn contains(&self, pos: usize) -> bool {
        pos >= self.first && pos <= self.last
    }

    /// Linear falloff from 1 at the span center.
    ///
    /// The half-width counts the end pixels as fully inside, so every pixel
    /// of the span gets a strictly positive weight and a single-pixel span
    /// gets weight 1.
    #[inline]
    fn weight(&self, pos: usize) -> f32 {
        let center = (self.first + self.last) as f64 / 2.0;
        let half = (self.last - self.first + 1) as f64 / 2.0;
        (1.0 - (pos as f64 - center).abs() / half) as f32
    }
}

/// Centerline weights for a validity mask.
///
/// Returns a buffer of the mask's size. Valid pixels get weights in `(0, 1]`;
/// invalid pixels get `hole_fill` or `border_fill`. A fully invalid mask
/// yields `border_fill` everywhere.
pub fn centerline_weights(valid: &BitBuffer2, config: &WeightConfig) -> Buffer2<f32> {
    let (width, height) = (valid.width(), valid.height());
    let mut rows: Vec<Option<Span>> = vec![None; height];
    let mut cols: Vec<Option<Span>> = vec![None; width];

    for (y, row_span) in rows.iter_mut().enumerate() {
        for (x, col_span) in cols.iter_mut().enumerate() {
            if valid.get(x, y) {
                Span::include(row_span, x);
                Span::include(col_span, y);
            }
        }
    }

    Buffer2::from_fn(width, height, |x, y| {
        let (row, col) = (rows[y], cols[x]);
        if valid.get(x, y) {
            // A valid pixel is always inside both of its spans.
            match (row, col) {
                (Some(r), Some(c)) => r.weight(x).min(c.weight(y)),
                _ => 0.0,
            }
        } else {
            let inside_row = row.is_some_and(|r| r.contains(x));
            let inside_col = col.is_some_and(|c| c.contains(y));
            if inside_row && inside_col {
                config.hole_fill
            } else {
                config.border_fill
            }
        }
    })
}

/// Weight ceiling for compositing an image over `area`.
///
/// `margin / (min(width, height) / 2 + margin)`: the weight reached roughly
/// `margin` pixels in from the edge of `area`. Clipping at this value makes
/// the interior of every image uniformly weighted while keeping the ramp
/// near its edges. Returns 1 (no clipping) for an empty area or zero margin.
pub fn blend_cutoff(area: &Aabb, blend_margin: u32) -> f32 {
    if area.is_empty() || blend_margin == 0 {
        return 1.0;
    }
    let half_extent = area.width().min(area.height()) as f64 / 2.0;
    let margin = blend_margin as f64;
    (margin / (half_extent + margin)) as f32
}

/// Clip every weight above `cutoff` down to it. Sentinels are unaffected
/// as long as they are below the cutoff.
pub fn clip_to_cutoff(weights: &mut Buffer2<f32>, cutoff: f32) {
    for w in weights.iter_mut() {
        if *w > cutoff {
            *w = cutoff;
        }
    }
}

/// Weights of one image over a region of the mosaic.
#[derive(Debug, Clone)]
pub struct WeightField {
    region: Aabb,
    weights: Buffer2<f32>,
    valid: BitBuffer2,
}

impl WeightField {
    /// Compute the centerline weights of `valid`, whose pixels cover `region`.
    ///
    /// # Panics
    ///
    /// Panics if the mask does not match the size of `region`.
    pub fn compute(region: Aabb, valid: BitBuffer2, config: &WeightConfig) -> Self {
        assert_eq!(
            (valid.width(), valid.height()),
            (region.width() as usize, region.height() as usize),
            "mask must match region size"
        );
        let weights = centerline_weights(&valid, config);
        Self {
            region,
            weights,
            valid,
        }
    }

    /// Weights of a patch's validity mask over the patch region.
    pub fn from_patch(patch: &RasterPatch, config: &WeightConfig) -> Self {
        Self::compute(*patch.region(), patch.validity().clone(), config)
    }

    #[inline]
    pub fn region(&self) -> &Aabb {
        &self.region
    }

    #[inline]
    pub fn weights(&self) -> &Buffer2<f32> {
        &self.weights
    }

    /// Blending weight at `p`: `None` outside the region or at invalid pixels.
    #[inline]
    pub fn weight_at(&self, p: IVec2) -> Option<f32> {
        if !self.region.contains(p) {
            return None;
        }
        let local = p - self.region.min;
        let (x, y) = (local.x as usize, local.y as usize);
        self.valid.get(x, y).then(|| *self.weights.get(x, y))
    }

    /// Raw weight or sentinel at `p`, `None` outside the region.
    #[inline]
    pub fn raw_at(&self, p: IVec2) -> Option<f32> {
        if !self.region.contains(p) {
            return None;
        }
        let local = p - self.region.min;
        Some(*self.weights.get(local.x as usize, local.y as usize))
    }

    pub fn clip(&mut self, cutoff: f32) {
        clip_to_cutoff(&mut self.weights, cutoff);
    }
}
