//! Chaining pairwise alignments into a single mosaic frame.
//!
//! Image 0 defines the mosaic frame. Each later image is aligned to its
//! predecessor and its absolute transform is the predecessor's composed with
//! the pairwise one. The canvas is the union of the placed footprints.


use std::str::FromStr;
use std::sync::Arc;

use common::parallel::{default_concurrency, par_map_limited};
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::alignment::{Alignment, CorrespondenceFinder, PairwiseAligner, RansacConfig};
use crate::error::{ConfigError, MosaicError};
use crate::math::{Aabb, AffineTransform};
use crate::raster::RasterSource;

/// Arrangement of the input images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Left to right: each image's right edge overlaps the next one's left edge.
    #[default]
    Horizontal,
}

impl FromStr for Layout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Layout::Horizontal),
            _ => Err(ConfigError::UnsupportedLayout(s.to_string())),
        }
    }
}

/// Overlap regions of two neighbouring images, each in its own frame.
///
/// For [`Layout::Horizontal`] these are the last `overlap_width` columns of
/// `a` and the first `overlap_width` columns of `b`, at full height.
pub fn overlap_strips(
    layout: Layout,
    (index_a, extent_a): (usize, &Aabb),
    (index_b, extent_b): (usize, &Aabb),
    overlap_width: u32,
) -> Result<(Aabb, Aabb), ConfigError> {
    if overlap_width == 0 {
        return Err(ConfigError::ZeroOverlap);
    }
    let overlap = overlap_width as i32;
    for (image, extent) in [(index_a, extent_a), (index_b, extent_b)] {
        if overlap > extent.width() {
            return Err(ConfigError::OverlapTooWide {
                image,
                overlap: overlap_width,
                width: extent.width(),
            });
        }
    }

    match layout {
        Layout::Horizontal => {
            let roi_a = Aabb::new(
                IVec2::new(extent_a.max.x - overlap, extent_a.min.y),
                extent_a.max,
            );
            let roi_b = Aabb::new(
                extent_b.min,
                IVec2::new(extent_b.min.x + overlap, extent_b.max.y),
            );
            Ok((roi_a, roi_b))
        }
    }
}

/// Where one image lands in the mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Native pixel coordinates to mosaic coordinates.
    pub transform: AffineTransform,
    /// Mosaic coordinates to native pixel coordinates.
    pub inverse: AffineTransform,
    /// Mosaic-frame box that may receive data from this image: the mapped
    /// footprint grown by one pixel for resampling, clipped to the canvas.
    pub bbox: Aabb,
    /// Native extent of the image.
    pub extent: Aabb,
}

/// The finished layout of a mosaic. Immutable once planned.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicPlan {
    pub placements: Vec<Placement>,
    /// Union of all placement boxes, in the mosaic frame.
    pub canvas: Aabb,
}

impl MosaicPlan {
    /// Output raster size.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width() as u32, self.canvas.height() as u32)
    }

    /// Mosaic-frame position of output raster pixel (0, 0).
    ///
    /// The mosaic frame is image 0's native frame, so the origin is negative
    /// when a later image reaches above or left of image 0. Image 0's output
    /// box then starts at `-canvas_origin` rather than at (0, 0); renderers
    /// translate output boxes by this origin.
    pub fn canvas_origin(&self) -> IVec2 {
        self.canvas.min
    }

    /// Indices of images whose placement intersects `region`.
    pub fn images_in(&self, region: Aabb) -> impl Iterator<Item = usize> + '_ {
        self.placements
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.bbox.intersects(&region))
            .map(|(i, _)| i)
    }
}

/// Accumulates placements image by image.
///
/// The planner owns the running absolute transform and canvas; each
/// [`ChainPlanner::place_next`] consumes one pairwise transform.
#[derive(Debug, Clone)]
pub struct ChainPlanner {
    /// (native→mosaic transform, native extent, mapped footprint) per image.
    placed: Vec<(AffineTransform, Aabb, Aabb)>,
    canvas: Aabb,
}

impl ChainPlanner {
    /// Start a chain with image 0, which defines the mosaic frame.
    pub fn new(first_extent: Aabb) -> Self {
        Self {
            placed: vec![(AffineTransform::identity(), first_extent, first_extent)],
            canvas: first_extent,
        }
    }

    /// Number of images placed so far.
    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    pub fn canvas(&self) -> &Aabb {
        &self.canvas
    }

    /// Place the next image given `relative`, which maps its pixels into the
    /// previously placed image.
    pub fn place_next(
        &mut self,
        relative: &AffineTransform,
        extent: Aabb,
    ) -> Result<AffineTransform, ConfigError> {
        let image = self.placed.len();
        let Some((previous, _, _)) = self.placed.last() else {
            return Err(ConfigError::NoImages);
        };
        let absolute = previous.compose(relative);
        if !absolute.is_invertible() {
            return Err(ConfigError::SingularTransform { image });
        }

        let footprint = absolute.transform_aabb(&extent);
        self.canvas = self.canvas.union(&footprint);
        tracing::debug!(
            "Placed image {} at {:?}, canvas now {:?}",
            image,
            footprint,
            self.canvas
        );
        self.placed.push((absolute, extent, footprint));
        Ok(absolute)
    }

    pub fn finish(self) -> Result<MosaicPlan, ConfigError> {
        let canvas = self.canvas;
        let placements = self
            .placed
            .into_iter()
            .enumerate()
            .map(|(image, (transform, extent, footprint))| {
                let inverse = transform
                    .try_inverse()
                    .ok_or(ConfigError::SingularTransform { image })?;
                Ok(Placement {
                    transform,
                    inverse,
                    bbox: footprint.expand(1).intersection(&canvas),
                    extent,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(MosaicPlan { placements, canvas })
    }
}

/// Settings consumed by [`plan_chain`].
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub layout: Layout,
    pub overlap_width: u32,
    pub ransac: RansacConfig,
    /// Pairs aligned at once. Unset means one per rayon thread.
    pub max_concurrent_pairs: Option<usize>,
}

/// Align every consecutive pair and chain the results into a plan.
///
/// Pairs are independent, so they are aligned in parallel with at most
/// `settings.max_concurrent_pairs` in flight; only the chaining is
/// sequential. Returns the plan and the pairwise alignments, in order. A
/// failed pair aborts planning with an error naming it; when several fail,
/// the first in chain order is reported.
pub fn plan_chain(
    sources: &[Arc<dyn RasterSource>],
    finder: &dyn CorrespondenceFinder,
    settings: &ChainSettings,
) -> Result<(MosaicPlan, Vec<Alignment>), MosaicError> {
    let Some(first) = sources.first() else {
        return Err(ConfigError::NoImages.into());
    };

    let pairs = sources
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (extent_a, extent_b) = (pair[0].extent(), pair[1].extent());
            let strips = overlap_strips(
                settings.layout,
                (i, &extent_a),
                (i + 1, &extent_b),
                settings.overlap_width,
            )?;
            Ok((i, strips))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let aligner = PairwiseAligner::new(finder, settings.ransac.clone());
    let max_concurrent = settings
        .max_concurrent_pairs
        .unwrap_or_else(default_concurrency)
        .max(1);
    let results = par_map_limited(&pairs, max_concurrent, |&(i, (roi_a, roi_b))| {
        aligner.align(
            (i, sources[i].as_ref(), roi_a),
            (i + 1, sources[i + 1].as_ref(), roi_b),
        )
    });

    let mut planner = ChainPlanner::new(first.extent());
    let mut alignments = Vec::with_capacity(results.len());
    for (i, result) in results.into_iter().enumerate() {
        let alignment = result?;
        planner.place_next(&alignment.transform, sources[i + 1].extent())?;
        alignments.push(alignment);
    }

    let plan = planner.finish()?;
    let (width, height) = plan.canvas_size();
    tracing::info!(
        "Planned mosaic of {} images: canvas {}x{} at {:?}",
        plan.placements.len(),
        width,
        height,
        plan.canvas.min
    );
    Ok((plan, alignments))
}
