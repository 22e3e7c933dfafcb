//! Pairwise alignment of neighbouring images.
//!
//! Correspondence search itself is pluggable through [`CorrespondenceFinder`];
//! this module turns the correspondences found in two overlap regions into a
//! robust affine estimate.

pub mod block_match;
pub mod ransac;


use glam::DVec2;

use crate::error::{AlignmentError, MosaicError};
use crate::math::{Aabb, AffineTransform};
use crate::raster::{RasterPatch, RasterSource};

pub use block_match::{BlockMatchConfig, BlockMatchFinder};
pub use ransac::{RansacConfig, RansacResult, estimate_affine_ransac, fit_affine};

/// A matched point pair. `a` lies in the first image, `b` in the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub a: DVec2,
    pub b: DVec2,
}

impl Correspondence {
    #[inline]
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self { a, b }
    }
}

/// An image region handed to a correspondence finder.
#[derive(Debug, Clone, Copy)]
pub struct ImageRegion<'a> {
    /// Index of the image in the mosaic sequence.
    pub image: usize,
    /// Pixels of the region, in the image's own frame.
    pub patch: &'a RasterPatch,
}

/// Finds matching points between two raster regions.
///
/// Returned coordinates are relative to each region's top-left corner.
/// Finding no matches is not an error; the aligner reports it.
pub trait CorrespondenceFinder: Send + Sync {
    fn find(
        &self,
        a: ImageRegion<'_>,
        b: ImageRegion<'_>,
    ) -> Result<Vec<Correspondence>, AlignmentError>;
}

/// Outcome of aligning image `b` to image `a`.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Maps pixel coordinates of `b` into the frame of `a`.
    pub transform: AffineTransform,
    /// All correspondences, in full-image coordinates.
    pub correspondences: Vec<Correspondence>,
    /// Indices into `correspondences` consistent with `transform`.
    pub inliers: Vec<usize>,
}

impl Alignment {
    pub fn inlier_ratio(&self) -> f64 {
        if self.correspondences.is_empty() {
            0.0
        } else {
            self.inliers.len() as f64 / self.correspondences.len() as f64
        }
    }
}

/// Aligns a pair of images from their overlap regions.
pub struct PairwiseAligner<'f> {
    finder: &'f dyn CorrespondenceFinder,
    ransac: RansacConfig,
}

impl<'f> PairwiseAligner<'f> {
    pub fn new(finder: &'f dyn CorrespondenceFinder, ransac: RansacConfig) -> Self {
        Self { finder, ransac }
    }

    /// Estimate the transform taking `b`'s pixel coordinates into `a`'s frame.
    ///
    /// `roi_a` and `roi_b` are the overlap regions in each image's own frame.
    pub fn align(
        &self,
        (index_a, source_a, roi_a): (usize, &dyn RasterSource, Aabb),
        (index_b, source_b, roi_b): (usize, &dyn RasterSource, Aabb),
    ) -> Result<Alignment, MosaicError> {
        let patch_a = source_a
            .read_region(&roi_a)
            .map_err(|source| MosaicError::Raster {
                image: index_a,
                source,
            })?;
        let patch_b = source_b
            .read_region(&roi_b)
            .map_err(|source| MosaicError::Raster {
                image: index_b,
                source,
            })?;

        let pair_error = |source| MosaicError::Alignment {
            first: index_a,
            second: index_b,
            source,
        };

        let local = self
            .finder
            .find(
                ImageRegion {
                    image: index_a,
                    patch: &patch_a,
                },
                ImageRegion {
                    image: index_b,
                    patch: &patch_b,
                },
            )
            .map_err(pair_error)?;

        let correspondences = to_image_frame(&local, &roi_a, &roi_b);
        let result = self.fit(&correspondences).map_err(pair_error)?;

        tracing::info!(
            "Aligned image {} to {}: {} of {} correspondences are inliers, {}",
            index_b,
            index_a,
            result.inliers.len(),
            correspondences.len(),
            result.transform
        );

        Ok(Alignment {
            transform: result.transform,
            correspondences,
            inliers: result.inliers,
        })
    }

    /// Robust fit of the transform mapping each `b` onto its `a`.
    pub fn fit(&self, correspondences: &[Correspondence]) -> Result<RansacResult, AlignmentError> {
        let a: Vec<DVec2> = correspondences.iter().map(|c| c.a).collect();
        let b: Vec<DVec2> = correspondences.iter().map(|c| c.b).collect();
        estimate_affine_ransac(&b, &a, &self.ransac)
    }
}

/// Shift region-local correspondences by the region offsets.
pub fn to_image_frame(local: &[Correspondence], roi_a: &Aabb, roi_b: &Aabb) -> Vec<Correspondence> {
    let offset_a = roi_a.min.as_dvec2();
    let offset_b = roi_b.min.as_dvec2();
    local
        .iter()
        .map(|c| Correspondence::new(c.a + offset_a, c.b + offset_b))
        .collect()
}
