//! Mosaic - seam-free compositing of overlapping raster strips.
//!
//! Adjacent images are aligned pairwise from correspondences in their
//! overlap, the pairwise affine transforms are chained into one mosaic
//! frame, and the mosaic is rendered lazily tile by tile as a weighted blend
//! of every image covering the tile:
//! - Centerline weight fields that fall off toward each image's valid edge
//! - RANSAC affine estimation from noisy correspondences
//! - Chain planning of placements and the output canvas
//! - Parallel tiled rendering into a pluggable raster sink
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mosaic::{BlockMatchFinder, MemorySink, Mosaic, MosaicConfig};
//!
//! let config = MosaicConfig::load("mosaic.yaml")?;
//! let mosaic = Mosaic::build(sources, &BlockMatchFinder::default(), &config)?;
//!
//! let mut sink = MemorySink::new();
//! mosaic.write(&mut sink)?;
//! ```

pub mod alignment;
pub mod compositor;
pub mod config;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod planner;
pub mod raster;
pub mod weights;
pub mod writer;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Geometry
// ============================================================================

pub use math::{Aabb, AffineTransform};

// ============================================================================
// Rasters
// ============================================================================

pub use raster::{
    EncodedTile, MemoryRaster, MemorySink, OutputType, RasterPatch, RasterSink, RasterSource,
};

// ============================================================================
// Weights
// ============================================================================

pub use weights::{WeightConfig, WeightField, blend_cutoff, centerline_weights};

// ============================================================================
// Alignment
// ============================================================================

pub use alignment::{
    Alignment, BlockMatchConfig, BlockMatchFinder, Correspondence, CorrespondenceFinder,
    ImageRegion, PairwiseAligner, RansacConfig, estimate_affine_ransac,
};

// ============================================================================
// Planning
// ============================================================================

pub use planner::{ChainPlanner, ChainSettings, Layout, MosaicPlan, Placement, plan_chain};

// ============================================================================
// Compositing and output
// ============================================================================

pub use compositor::{CompositorSettings, Tile, TileCompositor, WeightScope};
pub use writer::{TileGrid, WriteOptions, effective_tile_size, write_mosaic};

// ============================================================================
// Pipeline
// ============================================================================

pub use config::MosaicConfig;
pub use error::{AlignmentError, ConfigError, MosaicError, RasterError};
pub use pipeline::Mosaic;
