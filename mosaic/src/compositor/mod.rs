//! Lazy tile rendering: the weighted blend of every image covering a tile.
//!
//! [`TileCompositor::render_tile`] is a pure function of the tile box and the
//! immutable inputs (sources, plan, settings). Tiles can therefore be
//! rendered in any order and on any number of threads.
//!
//! Per contributing image the compositor:
//! 1. intersects the image's placement with the tile
//! 2. reads the native pixels behind that area, grown by the blend margin
//!    and the one-pixel bilinear support
//! 3. warps them into the mosaic frame with masked bilinear resampling
//! 4. computes centerline weights over the warped patch, clipped at the
//!    blend cutoff
//! 5. accumulates `value * weight` and `weight` inside the intersection
//!
//! Pixels with positive total weight become the weighted average; the rest
//! keep the output no-data value.
//!
//! Under [`WeightScope::Footprint`] steps 2 to 4 run once per image over its
//! whole placement box and the result is cached, so the blend does not
//! depend on the tiling.

pub mod resample;


use std::sync::{Arc, OnceLock};

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RasterError};
use crate::math::Aabb;
use crate::planner::MosaicPlan;
use crate::raster::{RasterPatch, RasterSource};
use crate::weights::{WeightConfig, WeightField, blend_cutoff};

pub use resample::{sample_bilinear, warp_patch_bilinear};

/// Area over which an image's centerline weights are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScope {
    /// The image/tile intersection grown by the blend margin. Memory stays
    /// bounded by the tile size, but weights near tile edges depend on the
    /// tile, so only the blended values of agreeing inputs are independent
    /// of the tiling.
    Tile,
    /// The image's whole placement box. Weights and output are identical
    /// for any tiling. Each image is resampled once, on first use, and kept
    /// for the compositor's lifetime.
    #[default]
    Footprint,
}

/// Settings for tile rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSettings {
    /// Extra radius around each intersection used for weight computation.
    pub blend_margin: u32,
    /// Value of pixels no image contributes to.
    pub output_nodata: f32,
    pub weight_scope: WeightScope,
    pub weights: WeightConfig,
}

/// A rendered tile in the mosaic frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub bbox: Aabb,
    /// Blended values, no-data where nothing contributed.
    pub values: Buffer2<f32>,
    /// Total blending weight per pixel, zero where nothing contributed.
    pub weights: Buffer2<f32>,
}

impl Tile {
    /// Number of pixels that received data.
    pub fn covered_pixels(&self) -> usize {
        self.weights.iter().filter(|&&w| w > 0.0).count()
    }
}

/// One image resampled into the mosaic frame, with its blending weights.
struct Layer {
    warped: RasterPatch,
    field: WeightField,
}

/// Renders arbitrary boxes of the mosaic on demand.
pub struct TileCompositor {
    sources: Vec<Arc<dyn RasterSource>>,
    plan: MosaicPlan,
    settings: CompositorSettings,
    /// Footprint layers, filled on first use. `None` when the image had
    /// nothing to contribute or could not be read.
    layers: Vec<OnceLock<Option<Layer>>>,
}

impl TileCompositor {
    /// Validate the plan against its sources.
    ///
    /// Every placement must carry invertible transforms; a singular one means
    /// planning went wrong and is reported as a configuration error.
    pub fn new(
        sources: Vec<Arc<dyn RasterSource>>,
        plan: MosaicPlan,
        settings: CompositorSettings,
    ) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::NoImages);
        }
        if sources.len() != plan.placements.len() {
            return Err(ConfigError::PlacementCountMismatch {
                placements: plan.placements.len(),
                sources: sources.len(),
            });
        }
        for (image, placement) in plan.placements.iter().enumerate() {
            if !placement.transform.is_invertible() || !placement.inverse.is_invertible() {
                return Err(ConfigError::SingularTransform { image });
            }
        }
        let layers = (0..sources.len()).map(|_| OnceLock::new()).collect();
        Ok(Self {
            sources,
            plan,
            settings,
            layers,
        })
    }

    pub fn plan(&self) -> &MosaicPlan {
        &self.plan
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Render the mosaic-frame box `tile`.
    ///
    /// Never fails: an image whose pixels cannot be read is left out of this
    /// tile and a warning is logged.
    pub fn render_tile(&self, tile: &Aabb) -> Tile {
        let width = tile.width() as usize;
        let height = tile.height() as usize;
        let mut accum = Buffer2::new_filled(width, height, 0.0f64);
        let mut total = Buffer2::new_filled(width, height, 0.0f64);

        for image in self.plan.images_in(*tile) {
            match self.accumulate(image, tile, &mut accum, &mut total) {
                Ok(pixels) => {
                    tracing::debug!("Image {} contributed {} pixels to tile {:?}", image, pixels, tile)
                }
                Err(err) => {
                    tracing::warn!("Skipping image {} for tile {:?}: {}", image, tile, err)
                }
            }
        }

        let nodata = self.settings.output_nodata;
        let values = Buffer2::from_fn(width, height, |x, y| {
            let w = *total.get(x, y);
            if w > 0.0 {
                (*accum.get(x, y) / w) as f32
            } else {
                nodata
            }
        });
        let weights = total.map(|&w| w as f32);

        Tile {
            bbox: *tile,
            values,
            weights,
        }
    }

    /// Add image `image`'s weighted contribution to the tile accumulators.
    /// Returns the number of pixels it contributed to.
    fn accumulate(
        &self,
        image: usize,
        tile: &Aabb,
        accum: &mut Buffer2<f64>,
        total: &mut Buffer2<f64>,
    ) -> Result<usize, RasterError> {
        let placement = &self.plan.placements[image];
        let intersection = placement.bbox.intersection(tile);
        if intersection.is_empty() {
            return Ok(0);
        }

        let contributed = match self.settings.weight_scope {
            WeightScope::Tile => {
                let margin = self.settings.blend_margin as i32;
                match self.layer(image, intersection.expand(margin), intersection)? {
                    Some(layer) => blend(&layer, &intersection, tile, accum, total),
                    None => 0,
                }
            }
            WeightScope::Footprint => {
                let cached = self.layers[image].get_or_init(|| {
                    self.layer(image, placement.bbox, placement.bbox)
                        .unwrap_or_else(|err| {
                            tracing::warn!("Leaving out image {}: {}", image, err);
                            None
                        })
                });
                match cached {
                    Some(layer) => blend(layer, &intersection, tile, accum, total),
                    None => 0,
                }
            }
        };
        Ok(contributed)
    }

    /// Resample image `image` over the mosaic-frame `work_region` and weight
    /// it, clipping at the blend cutoff of `cutoff_area`. `None` when the
    /// region maps outside the image.
    fn layer(
        &self,
        image: usize,
        work_region: Aabb,
        cutoff_area: Aabb,
    ) -> Result<Option<Layer>, RasterError> {
        let placement = &self.plan.placements[image];
        let native = placement
            .inverse
            .transform_aabb(&work_region)
            .expand(1)
            .intersection(&placement.extent);
        if native.is_empty() {
            return Ok(None);
        }

        let patch = self.sources[image].read_region(&native)?;
        let warped = warp_patch_bilinear(&patch, &placement.inverse, work_region);
        let mut field = WeightField::from_patch(&warped, &self.settings.weights);
        if self.settings.weights.clip_to_cutoff {
            field.clip(blend_cutoff(&cutoff_area, self.settings.blend_margin));
        }
        Ok(Some(Layer { warped, field }))
    }
}

/// Accumulate `layer` over `intersection`, a sub-box of `tile`. Returns the
/// number of pixels it contributed to.
fn blend(
    layer: &Layer,
    intersection: &Aabb,
    tile: &Aabb,
    accum: &mut Buffer2<f64>,
    total: &mut Buffer2<f64>,
) -> usize {
    let mut contributed = 0;
    for p in intersection.pixels() {
        let (Some(value), Some(weight)) = (layer.warped.sample(p), layer.field.weight_at(p)) else {
            continue;
        };
        if weight <= 0.0 {
            continue;
        }
        let local = p - tile.min;
        let (x, y) = (local.x as usize, local.y as usize);
        *accum.get_mut(x, y) += value as f64 * weight as f64;
        *total.get_mut(x, y) += weight as f64;
        contributed += 1;
    }
    contributed
}
