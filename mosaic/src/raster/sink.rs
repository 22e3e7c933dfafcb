//! Destinations for encoded output tiles.

use common::Buffer2;

use crate::error::RasterError;
use crate::math::Aabb;

use super::{EncodedTile, OutputType};

/// A destination raster receiving tiles in output-raster coordinates.
///
/// `begin` is called once before any tile is written. Tiles never overlap
/// and together cover the `width` x `height` raster exactly.
pub trait RasterSink {
    fn begin(
        &mut self,
        width: u32,
        height: u32,
        nodata: f32,
        output_type: OutputType,
    ) -> Result<(), RasterError>;

    fn write_tile(&mut self, tile: &Aabb, pixels: EncodedTile) -> Result<(), RasterError>;
}

/// Collects the output raster in memory, widened to `f64`.
#[derive(Debug, Default)]
pub struct MemorySink {
    raster: Option<Buffer2<f64>>,
    nodata: f32,
    output_type: OutputType,
    tiles_written: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assembled raster, `None` until `begin` was called.
    pub fn raster(&self) -> Option<&Buffer2<f64>> {
        self.raster.as_ref()
    }

    pub fn into_raster(self) -> Option<Buffer2<f64>> {
        self.raster
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    pub fn tiles_written(&self) -> usize {
        self.tiles_written
    }
}

impl RasterSink for MemorySink {
    fn begin(
        &mut self,
        width: u32,
        height: u32,
        nodata: f32,
        output_type: OutputType,
    ) -> Result<(), RasterError> {
        self.raster = Some(Buffer2::new_filled(
            width as usize,
            height as usize,
            nodata as f64,
        ));
        self.nodata = nodata;
        self.output_type = output_type;
        self.tiles_written = 0;
        Ok(())
    }

    fn write_tile(&mut self, tile: &Aabb, pixels: EncodedTile) -> Result<(), RasterError> {
        let Some(raster) = self.raster.as_mut() else {
            return Err(RasterError::Write {
                tile: *tile,
                reason: "sink was not started".to_string(),
            });
        };
        let extent = Aabb::from_size(raster.width() as i32, raster.height() as i32);
        if !extent.contains_box(tile) {
            return Err(RasterError::OutOfBounds {
                region: *tile,
                extent,
            });
        }
        if pixels.size() != (tile.width() as usize, tile.height() as usize) {
            return Err(RasterError::Write {
                tile: *tile,
                reason: format!("pixel buffer size {:?} does not match tile", pixels.size()),
            });
        }

        for y in 0..tile.height() as usize {
            let row = raster.row_mut(tile.min.y as usize + y);
            for x in 0..tile.width() as usize {
                row[tile.min.x as usize + x] = pixels.value_f64(x, y);
            }
        }
        self.tiles_written += 1;
        Ok(())
    }
}
