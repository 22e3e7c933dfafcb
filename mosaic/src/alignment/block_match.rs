//! Block matching by normalized cross-correlation.
//!
//! The overlap regions handed to a finder nominally show the same ground, but
//! the true overlap rarely equals the configured strip width. Matching runs
//! in two passes:
//! 1. a coarse pass correlates a few large templates from the second region
//!    over a wide window of the first, and takes the median displacement
//! 2. a fine pass matches a regular grid of small templates within
//!    `search_radius` of that displacement
//!
//! A correlation peak is only accepted when all four neighbours were scored,
//! so peaks clamped to the edge of the search window or of the region are
//! dropped. Accepted peaks are refined to sub-pixel accuracy by Gauss-Newton
//! iterations on the image gradient, with gain and offset re-estimated each
//! step.

use glam::{DMat2, DVec2, IVec2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compositor::sample_bilinear;
use crate::error::AlignmentError;
use crate::raster::RasterPatch;

use super::{Correspondence, CorrespondenceFinder, ImageRegion};

const REFINE_ITERATIONS: usize = 20;
const REFINE_TOLERANCE: f64 = 1e-4;

/// Configuration for block matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMatchConfig {
    /// Distance between template centers.
    pub grid_step: u32,
    /// Template half-size; templates are `2r + 1` pixels square.
    pub template_radius: u32,
    /// Largest displacement from the coarse shift searched on each axis.
    pub search_radius: u32,
    /// Largest coarse displacement searched on each axis. Zero disables the
    /// coarse pass.
    pub coarse_radius: u32,
    /// Upper bound for the coarse template half-size. The half-size used is
    /// also limited to a quarter of the region's shorter side.
    pub coarse_template_radius: u32,
    /// Coarse templates spread along the region's longer side.
    pub coarse_templates: u32,
    /// Minimum correlation peak to accept a match.
    pub min_correlation: f64,
    /// Templates with a standard deviation below this are skipped.
    pub min_contrast: f64,
}

impl Default for BlockMatchConfig {
    fn default() -> Self {
        Self {
            grid_step: 16,
            template_radius: 7,
            search_radius: 8,
            coarse_radius: 24,
            coarse_template_radius: 20,
            coarse_templates: 5,
            min_correlation: 0.9,
            min_contrast: 1e-3,
        }
    }
}

/// Integer correlation maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    offset: IVec2,
    score: f64,
}

/// Correlation-based [`CorrespondenceFinder`].
#[derive(Debug, Clone, Default)]
pub struct BlockMatchFinder {
    config: BlockMatchConfig,
}

impl BlockMatchFinder {
    pub fn new(config: BlockMatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlockMatchConfig {
        &self.config
    }

    /// Median displacement of the coarse templates, zero when none matched.
    fn coarse_shift(&self, a: &RasterPatch, b: &RasterPatch) -> IVec2 {
        let cfg = &self.config;
        if cfg.coarse_radius == 0 || cfg.coarse_templates == 0 {
            return IVec2::ZERO;
        }
        let size = b.region().size();
        let r = (cfg.coarse_template_radius as i32)
            .min((cfg.template_radius as i32).max(size.min_element() / 4));
        let side = 2 * r + 1;
        if r <= 0 || size.x < side || size.y < side {
            return IVec2::ZERO;
        }

        let n = cfg.coarse_templates as i32;
        let along = |len: i32, k: i32| r + (len - side) * (2 * k + 1) / (2 * n);
        let centers: Vec<IVec2> = (0..n)
            .map(|k| {
                if size.y >= size.x {
                    IVec2::new(size.x / 2, along(size.y, k))
                } else {
                    IVec2::new(along(size.x, k), size.y / 2)
                }
            })
            .collect();

        let offsets: Vec<IVec2> = centers
            .par_iter()
            .filter_map(|&center| {
                let template = Window::read(b, center, r)?;
                if template.std_dev() < cfg.min_contrast {
                    return None;
                }
                let peak = search_peak(a, &template, center, r, cfg.coarse_radius as i32)?;
                (peak.score >= cfg.min_correlation).then_some(peak.offset)
            })
            .collect();

        if offsets.is_empty() {
            tracing::debug!("Coarse block matching found no shift, searching around zero");
            return IVec2::ZERO;
        }
        let shift = IVec2::new(
            median(offsets.iter().map(|o| o.x).collect()),
            median(offsets.iter().map(|o| o.y).collect()),
        );
        tracing::debug!(
            "Coarse shift ({}, {}) from {} of {} templates",
            shift.x,
            shift.y,
            offsets.len(),
            centers.len()
        );
        shift
    }

    /// Match the template centered at `center` (local to `b`) against `a`
    /// around `center + shift`.
    fn match_point(
        &self,
        a: &RasterPatch,
        b: &RasterPatch,
        center: IVec2,
        shift: IVec2,
    ) -> Option<Correspondence> {
        let r = self.config.template_radius as i32;
        let template = Window::read(b, center, r)?;
        if template.std_dev() < self.config.min_contrast {
            return None;
        }

        let start = center + shift;
        let peak = search_peak(a, &template, start, r, self.config.search_radius as i32)?;
        if peak.score < self.config.min_correlation {
            return None;
        }

        let local_a = refine(a, &template, (start + peak.offset).as_dvec2(), r)?;
        Some(Correspondence::new(local_a, center.as_dvec2()))
    }
}

impl CorrespondenceFinder for BlockMatchFinder {
    fn find(
        &self,
        a: ImageRegion<'_>,
        b: ImageRegion<'_>,
    ) -> Result<Vec<Correspondence>, AlignmentError> {
        if self.config.grid_step == 0 {
            return Err(AlignmentError::CorrespondenceSearch(
                "grid_step must be positive".into(),
            ));
        }
        let shift = self.coarse_shift(a.patch, b.patch);

        // One spare pixel around each template keeps the gradient taps of a
        // refined match inside the region.
        let margin = self.config.template_radius as i32 + 1;
        let size = b.patch.region().size();
        let step = self.config.grid_step as usize;

        let centers: Vec<IVec2> = (margin..size.y - margin)
            .step_by(step)
            .flat_map(|y| {
                (margin..size.x - margin)
                    .step_by(step)
                    .map(move |x| IVec2::new(x, y))
            })
            .collect();

        let matches: Vec<Correspondence> = centers
            .par_iter()
            .filter_map(|&c| self.match_point(a.patch, b.patch, c, shift))
            .collect();

        tracing::debug!(
            "Block matching images {} and {}: {} of {} templates matched",
            a.image,
            b.image,
            matches.len(),
            centers.len()
        );
        Ok(matches)
    }
}

/// Best integer displacement within `radius` of `center` (local to `a`).
///
/// `None` when nothing could be scored or when a 4-neighbour of the maximum
/// was not scored, i.e. the maximum sits on the border of the search window
/// or against the edge of the region.
fn search_peak(a: &RasterPatch, template: &Window, center: IVec2, r: i32, radius: i32) -> Option<Peak> {
    let side = (2 * radius + 1) as usize;
    let index = |d: IVec2| ((d.y + radius) as usize) * side + (d.x + radius) as usize;
    let mut scores = vec![f64::NEG_INFINITY; side * side];
    let mut best: Option<Peak> = None;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let offset = IVec2::new(dx, dy);
            let Some(window) = Window::read(a, center + offset, r) else {
                continue;
            };
            let score = template.correlation(&window);
            scores[index(offset)] = score;
            if best.is_none_or(|b| score > b.score) {
                best = Some(Peak { offset, score });
            }
        }
    }

    let peak = best?;
    let scored = |d: IVec2| d.abs().max_element() <= radius && scores[index(d)].is_finite();
    let interior = [IVec2::X, IVec2::NEG_X, IVec2::Y, IVec2::NEG_Y]
        .iter()
        .all(|&n| scored(peak.offset + n));
    interior.then_some(peak)
}

/// Sub-pixel position (local to `a`) of `template`, starting from the
/// integer match `start`.
///
/// Solves for the displacement that makes the gain- and offset-corrected
/// template agree with `a` to first order, iterating until the update is
/// negligible. `None` when the gradients are degenerate, a sample is
/// unavailable, or the refinement wanders more than a pixel from `start`.
fn refine(a: &RasterPatch, template: &Window, start: DVec2, r: i32) -> Option<DVec2> {
    let origin = a.region().min.as_dvec2() + start;
    let count = template.values.len() as f64;
    let mut samples = Vec::with_capacity(template.values.len());
    let mut d = DVec2::ZERO;

    for _ in 0..REFINE_ITERATIONS {
        samples.clear();
        for y in -r..=r {
            for x in -r..=r {
                let p = origin + d + DVec2::new(x as f64, y as f64);
                let value = sample_bilinear(a, p)? as f64;
                let gx = (sample_bilinear(a, p + DVec2::X)? - sample_bilinear(a, p - DVec2::X)?)
                    as f64
                    * 0.5;
                let gy = (sample_bilinear(a, p + DVec2::Y)? - sample_bilinear(a, p - DVec2::Y)?)
                    as f64
                    * 0.5;
                samples.push((value, DVec2::new(gx, gy)));
            }
        }

        let mean = samples.iter().map(|(v, _)| v).sum::<f64>() / count;
        let energy: f64 = samples.iter().map(|(v, _)| (v - mean) * (v - mean)).sum();
        let gain = if template.energy > f64::EPSILON {
            (energy / template.energy).sqrt()
        } else {
            1.0
        };

        let mut hessian = DMat2::ZERO;
        let mut rhs = DVec2::ZERO;
        for (&t, &(value, g)) in template.values.iter().zip(&samples) {
            let residual = t * gain + mean - value;
            hessian += DMat2::from_cols(g * g.x, g * g.y);
            rhs += g * residual;
        }
        if hessian.determinant().abs() < 1e-12 {
            return None;
        }
        let update = hessian.inverse() * rhs;
        d += update;
        if d.abs().max_element() > 1.0 {
            return None;
        }
        if update.length() < REFINE_TOLERANCE {
            break;
        }
    }
    Some(start + d)
}

fn median(mut values: Vec<i32>) -> i32 {
    values.sort_unstable();
    values[values.len() / 2]
}

/// Mean-subtracted pixels of a fully valid square window.
struct Window {
    values: Vec<f64>,
    energy: f64,
}

impl Window {
    /// Window of radius `r` around `center` (local to the patch). `None` if
    /// any pixel is outside the patch or masked.
    fn read(patch: &RasterPatch, center: IVec2, r: i32) -> Option<Self> {
        let origin = patch.region().min;
        let side = (2 * r + 1) as usize;
        let mut values = Vec::with_capacity(side * side);
        for y in -r..=r {
            for x in -r..=r {
                let v = patch.sample(origin + center + IVec2::new(x, y))?;
                values.push(v as f64);
            }
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let mut energy = 0.0;
        for v in &mut values {
            *v -= mean;
            energy += *v * *v;
        }
        Some(Self { values, energy })
    }

    fn std_dev(&self) -> f64 {
        (self.energy / self.values.len() as f64).sqrt()
    }

    fn correlation(&self, other: &Window) -> f64 {
        let denom = (self.energy * other.energy).sqrt();
        if denom <= f64::EPSILON {
            return 0.0;
        }
        let dot: f64 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum();
        dot / denom
    }
}
