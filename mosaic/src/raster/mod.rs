//! Raster access: read-only sources, patches, output encoding and sinks.
//!
//! Inputs are single-band rasters of `f32` samples. A sample is valid when it
//! is a number strictly greater than the raster's no-data value; everything
//! at or below no-data is masked out.

pub mod encoding;
pub mod sink;

use std::sync::Arc;

use common::{BitBuffer2, Buffer2};
use glam::IVec2;

use crate::error::RasterError;
use crate::math::Aabb;

pub use encoding::{EncodedTile, OutputType};
pub use sink::{MemorySink, RasterSink};

/// True if `value` counts as data for a raster with the given no-data value.
///
/// NaN samples are always invalid. A NaN no-data value masks only NaNs.
#[inline]
pub fn is_valid_sample(value: f32, nodata: f32) -> bool {
    !value.is_nan() && !(value <= nodata)
}

/// A read-only raster that can be read region by region.
///
/// Implementations must be safe to read from several tile workers at once.
pub trait RasterSource: Send + Sync {
    /// Pixel extent of the raster, anchored at the origin.
    fn extent(&self) -> Aabb;

    /// The no-data value of the raster.
    fn nodata(&self) -> f32;

    /// Read the pixels of `region`, which must lie within [`Self::extent`].
    fn read_region(&self, region: &Aabb) -> Result<RasterPatch, RasterError>;
}

/// Pixels of a raster region together with their validity mask.
///
/// Coordinates passed to the accessors are in the frame of the raster the
/// patch was read from, not relative to the patch.
#[derive(Debug, Clone)]
pub struct RasterPatch {
    region: Aabb,
    values: Buffer2<f32>,
    valid: BitBuffer2,
}

impl RasterPatch {
    /// # Panics
    ///
    /// Panics if the buffers do not match the size of `region`.
    pub fn new(region: Aabb, values: Buffer2<f32>, valid: BitBuffer2) -> Self {
        assert_eq!(
            (values.width(), values.height()),
            (region.width() as usize, region.height() as usize),
            "values must match region size"
        );
        assert_eq!(
            (valid.width(), valid.height()),
            (values.width(), values.height()),
            "mask must match values size"
        );
        Self {
            region,
            values,
            valid,
        }
    }

    /// Build a patch, masking samples against `nodata`.
    pub fn from_values(region: Aabb, values: Buffer2<f32>, nodata: f32) -> Self {
        let valid = BitBuffer2::from_fn(values.width(), values.height(), |x, y| {
            is_valid_sample(*values.get(x, y), nodata)
        });
        Self::new(region, values, valid)
    }

    #[inline]
    pub fn region(&self) -> &Aabb {
        &self.region
    }

    #[inline]
    pub fn values(&self) -> &Buffer2<f32> {
        &self.values
    }

    #[inline]
    pub fn validity(&self) -> &BitBuffer2 {
        &self.valid
    }

    /// Value at `p`, or `None` if `p` is outside the patch or masked.
    #[inline]
    pub fn sample(&self, p: IVec2) -> Option<f32> {
        if !self.region.contains(p) {
            return None;
        }
        let local = p - self.region.min;
        let (x, y) = (local.x as usize, local.y as usize);
        self.valid.get(x, y).then(|| *self.values.get(x, y))
    }

    /// Number of valid pixels.
    pub fn valid_count(&self) -> usize {
        self.valid.count_ones()
    }
}

/// An in-memory raster.
///
/// Cloning is cheap: the pixels are shared.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    pixels: Arc<Buffer2<f32>>,
    nodata: f32,
}

impl MemoryRaster {
    pub fn new(pixels: Buffer2<f32>, nodata: f32) -> Self {
        Self {
            pixels: Arc::new(pixels),
            nodata,
        }
    }

    /// Raster of `width` x `height` built from `f(x, y)`.
    pub fn from_fn<F>(width: usize, height: usize, nodata: f32, f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        Self::new(Buffer2::from_fn(width, height, f), nodata)
    }

    pub fn pixels(&self) -> &Buffer2<f32> {
        &self.pixels
    }
}

impl RasterSource for MemoryRaster {
    fn extent(&self) -> Aabb {
        Aabb::from_size(self.pixels.width() as i32, self.pixels.height() as i32)
    }

    fn nodata(&self) -> f32 {
        self.nodata
    }

    fn read_region(&self, region: &Aabb) -> Result<RasterPatch, RasterError> {
        let extent = self.extent();
        if region.is_empty() || !extent.contains_box(region) {
            return Err(RasterError::OutOfBounds {
                region: *region,
                extent,
            });
        }
        let values = self.pixels.crop(
            region.min.x as usize,
            region.min.y as usize,
            region.width() as usize,
            region.height() as usize,
        );
        Ok(RasterPatch::from_values(*region, values, self.nodata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_rule() {
        assert!(is_valid_sample(1.0, 0.0));
        assert!(!is_valid_sample(0.0, 0.0));
        assert!(!is_valid_sample(-5.0, 0.0));
        assert!(!is_valid_sample(f32::NAN, 0.0));
        assert!(is_valid_sample(-5.0, f32::NAN));
        assert!(!is_valid_sample(f32::NAN, f32::NAN));
    }

    #[test]
    fn test_read_region_masks_nodata() {
        let raster = MemoryRaster::from_fn(8, 6, -1.0, |x, y| {
            if x == 5 && y == 2 { -1.0 } else { (x + 10 * y) as f32 }
        });
        let region = Aabb::from_xywh(4, 1, 3, 3);
        let patch = raster.read_region(&region).unwrap();

        assert_eq!(patch.region(), &region);
        assert_eq!(patch.values().width(), 3);
        assert_eq!(patch.valid_count(), 8);
        assert_eq!(patch.sample(IVec2::new(4, 1)), Some(14.0));
        assert_eq!(patch.sample(IVec2::new(6, 3)), Some(36.0));
        assert_eq!(patch.sample(IVec2::new(5, 2)), None);
        assert_eq!(patch.sample(IVec2::new(3, 1)), None);
    }

    #[test]
    fn test_read_region_out_of_bounds() {
        let raster = MemoryRaster::from_fn(4, 4, 0.0, |_, _| 1.0);
        let err = raster.read_region(&Aabb::from_xywh(2, 2, 3, 1)).unwrap_err();
        assert!(matches!(err, RasterError::OutOfBounds { .. }));
        assert!(raster.read_region(&Aabb::empty()).is_err());
    }

    #[test]
    #[should_panic(expected = "values must match region size")]
    fn test_patch_size_mismatch_panics() {
        RasterPatch::from_values(Aabb::from_size(3, 3), Buffer2::new_filled(2, 2, 1.0), 0.0);
    }
}
