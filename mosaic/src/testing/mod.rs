//! Testing utilities for mosaic.

#![allow(dead_code)]

use std::sync::Arc;

use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::alignment::{Correspondence, CorrespondenceFinder, ImageRegion};
use crate::error::AlignmentError;
use crate::math::AffineTransform;
use crate::raster::{MemoryRaster, RasterSource};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Raster filled with a single value.
pub fn constant_raster(width: usize, height: usize, value: f32, nodata: f32) -> MemoryRaster {
    MemoryRaster::from_fn(width, height, nodata, |_, _| value)
}

/// Smooth, non-repeating texture with values in `[10, 110]`.
pub fn scene_value(x: f64, y: f64) -> f32 {
    let v = 60.0
        + 25.0 * (x * 0.11).sin() * (y * 0.07).cos()
        + 15.0 * (x * 0.031 + y * 0.053).sin()
        + 10.0 * ((x - y) * 0.017).cos();
    v as f32
}

/// A strip of the synthetic scene whose pixel `(x, y)` shows scene point
/// `(x + offset_x, y + offset_y)`.
pub fn scene_strip(width: usize, height: usize, offset_x: f64, offset_y: f64) -> MemoryRaster {
    MemoryRaster::from_fn(width, height, 0.0, |x, y| {
        scene_value(x as f64 + offset_x, y as f64 + offset_y)
    })
}

pub fn shared(rasters: Vec<MemoryRaster>) -> Vec<Arc<dyn RasterSource>> {
    rasters
        .into_iter()
        .map(|r| Arc::new(r) as Arc<dyn RasterSource>)
        .collect()
}

/// Correspondence finder that knows the true relative transforms.
///
/// `relative[i]` maps pixels of image `i` into image `i - 1`; entry 0 is
/// unused. Matches are laid on a regular grid over the second region and
/// kept where they land inside the first. Seeded outliers are appended.
#[derive(Debug, Clone)]
pub struct KnownTransformFinder {
    pub relative: Vec<AffineTransform>,
    pub spacing: f64,
    pub outliers: usize,
    pub seed: u64,
}

impl KnownTransformFinder {
    pub fn new(relative: Vec<AffineTransform>) -> Self {
        Self {
            relative,
            spacing: 4.0,
            outliers: 0,
            seed: 7,
        }
    }

    /// Horizontal chain of pure translations by `step` pixels.
    pub fn horizontal(count: usize, step: f64) -> Self {
        Self::new(vec![AffineTransform::translation(step, 0.0); count])
    }

    pub fn with_outliers(mut self, outliers: usize) -> Self {
        self.outliers = outliers;
        self
    }
}

impl CorrespondenceFinder for KnownTransformFinder {
    fn find(
        &self,
        a: ImageRegion<'_>,
        b: ImageRegion<'_>,
    ) -> Result<Vec<Correspondence>, AlignmentError> {
        let Some(transform) = self.relative.get(b.image) else {
            return Err(AlignmentError::CorrespondenceSearch(format!(
                "no transform for image {}",
                b.image
            )));
        };
        let region_a = a.patch.region();
        let region_b = b.patch.region();
        let origin_a = region_a.min.as_dvec2();
        let origin_b = region_b.min.as_dvec2();
        let max_a = (region_a.max - 1).as_dvec2();

        let mut matches = Vec::new();
        let mut y = self.spacing / 2.0;
        while y < region_b.height() as f64 {
            let mut x = self.spacing / 2.0;
            while x < region_b.width() as f64 {
                let local_b = DVec2::new(x, y);
                let in_a = transform.apply(local_b + origin_b);
                if in_a.cmpge(origin_a).all() && in_a.cmple(max_a).all() {
                    matches.push(Correspondence::new(in_a - origin_a, local_b));
                }
                x += self.spacing;
            }
            y += self.spacing;
        }

        // Outliers land 30 to 60 pixels away from the true match.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let size_b = region_b.size().as_dvec2();
        for _ in 0..self.outliers {
            let local_b = DVec2::new(rng.random::<f64>(), rng.random::<f64>()) * size_b;
            let angle = rng.random_range(0.0..std::f64::consts::TAU);
            let distance = rng.random_range(30.0..60.0);
            let in_a = transform.apply(local_b + origin_b) + DVec2::from_angle(angle) * distance;
            matches.push(Correspondence::new(in_a - origin_a, local_b));
        }
        Ok(matches)
    }
}

/// Finder that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMatches;

impl CorrespondenceFinder for NoMatches {
    fn find(
        &self,
        _a: ImageRegion<'_>,
        _b: ImageRegion<'_>,
    ) -> Result<Vec<Correspondence>, AlignmentError> {
        Ok(Vec::new())
    }
}
