//! Error types for mosaicking.
//!
//! Configuration and alignment errors are fatal and abort a run before any
//! output is written. Raster read failures inside tile rendering are not
//! errors at all: the affected image simply contributes nothing to that tile.

use common::file_format::FileFormatError;
use thiserror::Error;

use crate::math::Aabb;

/// Invalid or unsupported run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No input images to mosaic")]
    NoImages,

    #[error("Unsupported layout '{0}', supported layouts: horizontal")]
    UnsupportedLayout(String),

    #[error("Overlap width must be positive")]
    ZeroOverlap,

    #[error("Overlap width {overlap} exceeds width {width} of image {image}")]
    OverlapTooWide {
        image: usize,
        overlap: u32,
        width: i32,
    },

    #[error("Tile size must be positive, got {width}x{height}")]
    ZeroTileSize { width: u32, height: u32 },

    #[error("Invalid RANSAC parameter: {0}")]
    InvalidRansac(String),

    #[error("Transform of image {image} is not invertible")]
    SingularTransform { image: usize },

    #[error("Plan has {placements} placements for {sources} images")]
    PlacementCountMismatch { placements: usize, sources: usize },

    #[error("Output destination unavailable: {0}")]
    OutputDestination(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] FileFormatError),
}

/// Reasons a pairwise alignment can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error("no correspondences found")]
    NoCorrespondences,

    #[error("too few correspondences: found {found}, need {required}")]
    TooFewCorrespondences { found: usize, required: usize },

    #[error("every sampled correspondence subset was degenerate")]
    Degenerate,

    #[error("robust fit found {best} inliers, need {required}")]
    InsufficientInliers { best: usize, required: usize },

    #[error("correspondence search failed: {0}")]
    CorrespondenceSearch(String),
}

/// Raster access failures reported by sources and sinks.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Region {region:?} lies outside raster extent {extent:?}")]
    OutOfBounds { region: Aabb, extent: Aabb },

    #[error("Failed to read raster: {0}")]
    Read(String),

    #[error("Failed to write tile {tile:?}: {reason}")]
    Write { tile: Aabb, reason: String },
}

/// Top-level error of a mosaic run.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Alignment of images {first} and {second} failed: {source}")]
    Alignment {
        first: usize,
        second: usize,
        #[source]
        source: AlignmentError,
    },

    #[error("Raster access failed for image {image}: {source}")]
    Raster {
        image: usize,
        #[source]
        source: RasterError,
    },

    #[error("Failed to write mosaic: {0}")]
    Write(#[source] RasterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_error_names_pair() {
        let err = MosaicError::Alignment {
            first: 2,
            second: 3,
            source: AlignmentError::NoCorrespondences,
        };
        assert_eq!(
            err.to_string(),
            "Alignment of images 2 and 3 failed: no correspondences found"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: MosaicError = ConfigError::UnsupportedLayout("vertical".into()).into();
        assert_eq!(
            err.to_string(),
            "Unsupported layout 'vertical', supported layouts: horizontal"
        );
    }

    #[test]
    fn test_insufficient_inliers_message() {
        let err = AlignmentError::InsufficientInliers {
            best: 4,
            required: 10,
        };
        assert_eq!(err.to_string(), "robust fit found 4 inliers, need 10");
    }
}
