//! End-to-end mosaicking: plan the chain once, then render on demand.


use std::sync::Arc;

use crate::alignment::{Alignment, CorrespondenceFinder};
use crate::compositor::{CompositorSettings, Tile, TileCompositor};
use crate::config::MosaicConfig;
use crate::error::{ConfigError, MosaicError};
use crate::math::Aabb;
use crate::planner::{MosaicPlan, plan_chain};
use crate::raster::{RasterSink, RasterSource};
use crate::writer::{WriteOptions, effective_tile_size, write_mosaic};

/// A planned mosaic, ready to render.
///
/// Construction runs every pairwise alignment and fails before anything is
/// rendered. Afterwards the mosaic is immutable: tiles may be rendered from
/// any thread, in any order, any number of times.
pub struct Mosaic {
    compositor: TileCompositor,
    alignments: Vec<Alignment>,
    write_options: WriteOptions,
}

impl Mosaic {
    /// Align the chain of `sources` and prepare the compositor.
    ///
    /// Images are chained in the given order. The output no-data value
    /// defaults to the last input's.
    pub fn build(
        sources: Vec<Arc<dyn RasterSource>>,
        finder: &dyn CorrespondenceFinder,
        config: &MosaicConfig,
    ) -> Result<Self, MosaicError> {
        config.validate()?;
        let Some(last) = sources.last() else {
            return Err(ConfigError::NoImages.into());
        };

        let blend_margin = config.effective_blend_margin();
        if config.blend_margin.unwrap_or(0) == 0 {
            tracing::info!("No blend margin configured, using overlap width {}", blend_margin);
        }
        let output_nodata = config.output_nodata.unwrap_or_else(|| last.nodata());

        tracing::info!(
            "Building mosaic of {} images ({:?} layout, overlap {})",
            sources.len(),
            config.layout,
            config.overlap_width
        );
        let (plan, alignments) = plan_chain(&sources, finder, &config.chain_settings())?;

        let settings = CompositorSettings {
            blend_margin,
            output_nodata,
            weight_scope: config.weight_scope,
            weights: config.weights,
        };
        let compositor = TileCompositor::new(sources, plan, settings)?;

        let tile_size = effective_tile_size(config.tile_size, blend_margin);
        if tile_size != config.tile_size {
            tracing::warn!(
                "Tile size {:?} is below twice the blend margin {}, using {:?}",
                config.tile_size,
                blend_margin,
                tile_size
            );
        }

        Ok(Self {
            compositor,
            alignments,
            write_options: WriteOptions {
                output_type: config.output_type,
                tile_size,
                max_concurrent_tiles: config.max_concurrent_tiles,
            },
        })
    }

    pub fn plan(&self) -> &MosaicPlan {
        self.compositor.plan()
    }

    /// Pairwise alignments; entry `i` places image `i + 1` relative to `i`.
    pub fn alignments(&self) -> &[Alignment] {
        &self.alignments
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.plan().canvas_size()
    }

    pub fn output_nodata(&self) -> f32 {
        self.compositor.settings().output_nodata
    }

    pub fn write_options(&self) -> &WriteOptions {
        &self.write_options
    }

    /// Render `tile`, given in output-raster coordinates (origin at the
    /// canvas's minimum corner). The returned tile keeps those coordinates.
    pub fn render_tile(&self, tile: &Aabb) -> Tile {
        let origin = self.plan().canvas_origin();
        let mut rendered = self.compositor.render_tile(&tile.translate(origin));
        rendered.bbox = *tile;
        rendered
    }

    /// Render every tile into `sink`.
    pub fn write(&self, sink: &mut dyn RasterSink) -> Result<(), MosaicError> {
        write_mosaic(&self.compositor, sink, &self.write_options)
    }
}
