//! Tiled output: render every tile of the canvas and hand it to a sink.

use common::parallel::{default_concurrency, par_map_limited_each};
use glam::IVec2;

use crate::compositor::TileCompositor;
use crate::error::{ConfigError, MosaicError};
use crate::math::Aabb;
use crate::raster::encoding::encode_tile;
use crate::raster::{OutputType, RasterSink};

/// Tile sizes are rounded up to a multiple of this when they need growing.
pub const TILE_ALIGNMENT: u32 = 16;

/// Tile size actually used for a requested size and blend margin.
///
/// A tile narrower than twice the blend margin would be dominated by its
/// margins, so such axes grow to `2 * blend_margin` rounded up to
/// [`TILE_ALIGNMENT`]. Other axes keep the requested size.
pub fn effective_tile_size(requested: (u32, u32), blend_margin: u32) -> (u32, u32) {
    let minimum = blend_margin.saturating_mul(2);
    let fix = |size: u32| {
        if size < minimum {
            minimum.div_ceil(TILE_ALIGNMENT).saturating_mul(TILE_ALIGNMENT)
        } else {
            size.max(1)
        }
    };
    (fix(requested.0), fix(requested.1))
}

/// Row-major grid of tiles covering a `width` x `height` raster.
///
/// Tiles are in output-raster coordinates; the last row and column are
/// clipped to the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
}

impl TileGrid {
    /// # Panics
    ///
    /// Panics if either tile dimension is zero.
    pub fn new(width: u32, height: u32, tile_size: (u32, u32)) -> Self {
        assert!(tile_size.0 > 0 && tile_size.1 > 0, "tile size must be positive");
        Self {
            width,
            height,
            tile_width: tile_size.0,
            tile_height: tile_size.1,
        }
    }

    pub fn columns(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    pub fn len(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tiles(&self) -> Vec<Aabb> {
        let bounds = Aabb::from_size(self.width as i32, self.height as i32);
        let mut tiles = Vec::with_capacity(self.len());
        for row in 0..self.rows() {
            for col in 0..self.columns() {
                let min = IVec2::new(
                    (col * self.tile_width) as i32,
                    (row * self.tile_height) as i32,
                );
                let size = IVec2::new(self.tile_width as i32, self.tile_height as i32);
                tiles.push(Aabb::new(min, min + size).intersection(&bounds));
            }
        }
        tiles
    }
}

/// How [`write_mosaic`] lays out and encodes the output.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub output_type: OutputType,
    pub tile_size: (u32, u32),
    /// Tiles rendered at once; `None` means one per rayon thread.
    pub max_concurrent_tiles: Option<usize>,
}

/// Render the whole canvas tile by tile into `sink`.
///
/// Output pixel `(0, 0)` is the canvas's minimum corner. Tiles are rendered
/// in parallel, at most `max_concurrent_tiles` at a time, and written in
/// row-major order on the calling thread. A sink that cannot be started is a
/// configuration error; a failed tile write aborts the run.
pub fn write_mosaic(
    compositor: &TileCompositor,
    sink: &mut dyn RasterSink,
    options: &WriteOptions,
) -> Result<(), MosaicError> {
    let plan = compositor.plan();
    let (width, height) = plan.canvas_size();
    let origin = plan.canvas_origin();
    let nodata = compositor.settings().output_nodata;

    sink.begin(width, height, nodata, options.output_type)
        .map_err(|err| ConfigError::OutputDestination(err.to_string()))?;

    let grid = TileGrid::new(width, height, options.tile_size);
    let tiles = grid.tiles();
    let max_concurrent = options
        .max_concurrent_tiles
        .unwrap_or_else(default_concurrency)
        .max(1);

    tracing::info!(
        "Writing {}x{} mosaic as {} tiles of {}x{} ({:?})",
        width,
        height,
        tiles.len(),
        options.tile_size.0,
        options.tile_size.1,
        options.output_type
    );

    let mut written = 0usize;
    par_map_limited_each(
        &tiles,
        max_concurrent,
        |tile| {
            let rendered = compositor.render_tile(&tile.translate(origin));
            encode_tile(&rendered.values, options.output_type)
        },
        |tile, encoded| -> Result<(), MosaicError> {
            sink.write_tile(tile, encoded).map_err(MosaicError::Write)?;
            written += 1;
            tracing::debug!("Wrote tile {}/{} at {:?}", written, tiles.len(), tile.min);
            Ok(())
        },
    )?;

    tracing::info!("Mosaic written: {} tiles", written);
    Ok(())
}
