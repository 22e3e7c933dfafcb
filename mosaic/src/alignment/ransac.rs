//! RANSAC (Random Sample Consensus) fit of an affine transform.
//!
//! 1. Randomly sample minimal sets of three correspondences
//! 2. Fit an exact affine to each sample
//! 3. Count correspondences that the candidate maps within the threshold
//! 4. Keep the candidate with the most inliers
//! 5. Refit by least squares on the inliers
//!
//! The generator is seeded from the configuration, so a run is reproducible.

use glam::{DMat2, DVec2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AlignmentError, ConfigError};
use crate::math::AffineTransform;

/// Correspondences needed to determine an affine transform.
pub const MIN_SAMPLES: usize = 3;

/// RANSAC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Number of random samples drawn.
    pub max_iterations: usize,
    /// Inlier distance threshold in pixels.
    pub inlier_threshold: f64,
    /// Fraction of all correspondences that must be inliers.
    pub min_inlier_ratio: f64,
    /// Halve the inlier requirement (down to [`MIN_SAMPLES`]) when no model
    /// reaches it.
    pub relax_min_inliers: bool,
    /// Random seed.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            inlier_threshold: 10.0,
            min_inlier_ratio: 0.5,
            relax_min_inliers: true,
            seed: 0,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidRansac(
                "max_iterations must be positive".into(),
            ));
        }
        if !(self.inlier_threshold.is_finite() && self.inlier_threshold > 0.0) {
            return Err(ConfigError::InvalidRansac(format!(
                "inlier_threshold must be positive, got {}",
                self.inlier_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_ratio) {
            return Err(ConfigError::InvalidRansac(format!(
                "min_inlier_ratio must be in [0, 1], got {}",
                self.min_inlier_ratio
            )));
        }
        Ok(())
    }

    /// Inliers required before relaxation for `n` correspondences.
    pub fn required_inliers(&self, n: usize) -> usize {
        ((n as f64 * self.min_inlier_ratio).floor() as usize).max(MIN_SAMPLES)
    }
}

/// Result of RANSAC estimation.
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// Maps `src` points onto `dst` points.
    pub transform: AffineTransform,
    /// Indices of inlier correspondences, ascending.
    pub inliers: Vec<usize>,
    /// Inlier requirement the result satisfied, after any relaxation.
    pub required_inliers: usize,
}

/// Robustly estimate the affine transform mapping `src[i]` onto `dst[i]`.
pub fn estimate_affine_ransac(
    src: &[DVec2],
    dst: &[DVec2],
    config: &RansacConfig,
) -> Result<RansacResult, AlignmentError> {
    debug_assert_eq!(src.len(), dst.len());
    let n = src.len();
    if n == 0 {
        return Err(AlignmentError::NoCorrespondences);
    }
    if n < MIN_SAMPLES {
        return Err(AlignmentError::TooFewCorrespondences {
            found: n,
            required: MIN_SAMPLES,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let threshold_sq = config.inlier_threshold * config.inlier_threshold;

    let mut best: Option<(AffineTransform, Vec<usize>, f64)> = None;
    let mut sample = Vec::with_capacity(MIN_SAMPLES);

    for _ in 0..config.max_iterations {
        random_sample_into(&mut rng, n, MIN_SAMPLES, &mut sample);
        let sample_src: Vec<DVec2> = sample.iter().map(|&i| src[i]).collect();
        let sample_dst: Vec<DVec2> = sample.iter().map(|&i| dst[i]).collect();

        let Some(candidate) = fit_affine(&sample_src, &sample_dst) else {
            continue;
        };

        let (inliers, residual) = count_inliers(src, dst, &candidate, threshold_sq);
        let better = match &best {
            None => true,
            Some((_, best_inliers, best_residual)) => {
                inliers.len() > best_inliers.len()
                    || (inliers.len() == best_inliers.len() && residual < *best_residual)
            }
        };
        if better {
            best = Some((candidate, inliers, residual));
        }
    }

    let Some((transform, inliers, _)) = best else {
        return Err(AlignmentError::Degenerate);
    };

    let (transform, inliers) = refine(src, dst, transform, inliers, threshold_sq);

    let mut required = config.required_inliers(n);
    while inliers.len() < required {
        if !config.relax_min_inliers || required <= MIN_SAMPLES {
            return Err(AlignmentError::InsufficientInliers {
                best: inliers.len(),
                required,
            });
        }
        let relaxed = (required / 2).max(MIN_SAMPLES);
        tracing::warn!(
            "RANSAC found {} of {} required inliers, relaxing requirement to {}",
            inliers.len(),
            required,
            relaxed
        );
        required = relaxed;
    }

    Ok(RansacResult {
        transform,
        inliers,
        required_inliers: required,
    })
}

/// Least-squares refit on the inliers, kept only if it does not lose any.
fn refine(
    src: &[DVec2],
    dst: &[DVec2],
    transform: AffineTransform,
    inliers: Vec<usize>,
    threshold_sq: f64,
) -> (AffineTransform, Vec<usize>) {
    let inlier_src: Vec<DVec2> = inliers.iter().map(|&i| src[i]).collect();
    let inlier_dst: Vec<DVec2> = inliers.iter().map(|&i| dst[i]).collect();
    let Some(refined) = fit_affine(&inlier_src, &inlier_dst) else {
        return (transform, inliers);
    };
    let (refined_inliers, _) = count_inliers(src, dst, &refined, threshold_sq);
    if refined_inliers.len() >= inliers.len() {
        (refined, refined_inliers)
    } else {
        (transform, inliers)
    }
}

/// Floyd's algorithm for sampling `k` distinct indices from `0..n`.
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "Cannot sample {} indices from {}", k, n);
    buffer.clear();
    for j in (n - k)..n {
        let t = rng.random_range(0..=j);
        if buffer.contains(&t) {
            buffer.push(j);
        } else {
            buffer.push(t);
        }
    }
}

/// Inlier indices and their summed squared residual.
fn count_inliers(
    src: &[DVec2],
    dst: &[DVec2],
    transform: &AffineTransform,
    threshold_sq: f64,
) -> (Vec<usize>, f64) {
    let mut inliers = Vec::new();
    let mut residual = 0.0;
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let dist_sq = transform.apply(*s).distance_squared(*d);
        if dist_sq < threshold_sq {
            inliers.push(i);
            residual += dist_sq;
        }
    }
    (inliers, residual)
}

/// Least-squares affine fit mapping `src` onto `dst`; exact for three
/// non-collinear points.
///
/// Points are centered on their centroids, which decouples the translation
/// and leaves a 2x2 normal-equation system for the linear part. Returns
/// `None` for collinear or coincident input.
pub fn fit_affine(src: &[DVec2], dst: &[DVec2]) -> Option<AffineTransform> {
    let n = src.len();
    if n < MIN_SAMPLES || dst.len() != n {
        return None;
    }

    let src_centroid = src.iter().copied().sum::<DVec2>() / n as f64;
    let dst_centroid = dst.iter().copied().sum::<DVec2>() / n as f64;

    // Scatter of source points and cross-covariance with destination points.
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    let mut cross = DMat2::ZERO;
    for (s, d) in src.iter().zip(dst) {
        let s = *s - src_centroid;
        let d = *d - dst_centroid;
        sxx += s.x * s.x;
        sxy += s.x * s.y;
        syy += s.y * s.y;
        // Column j of `cross` holds sum(d * s[j]).
        cross.x_axis += d * s.x;
        cross.y_axis += d * s.y;
    }

    let scatter = DMat2::from_cols(DVec2::new(sxx, sxy), DVec2::new(sxy, syy));
    let det = scatter.determinant();
    let scale = (sxx + syy) * (sxx + syy);
    if !det.is_finite() || scale <= 0.0 || det.abs() <= 1e-12 * scale {
        return None;
    }

    // Normal equations: M * scatter = cross.
    let matrix = cross * scatter.inverse();
    let translation = dst_centroid - matrix * src_centroid;
    let transform = AffineTransform::new(matrix, translation);
    transform.is_invertible().then_some(transform)
}
