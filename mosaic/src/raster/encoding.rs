//! Conversion of composited `f32` tiles to the requested output pixel type.

use common::Buffer2;
use serde::{Deserialize, Serialize};

/// Pixel type of the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Float32,
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
}

impl OutputType {
    /// Inclusive value range representable by the type.
    pub fn range(&self) -> (f64, f64) {
        match self {
            OutputType::Float32 => (f32::MIN as f64, f32::MAX as f64),
            OutputType::Byte => (u8::MIN as f64, u8::MAX as f64),
            OutputType::UInt16 => (u16::MIN as f64, u16::MAX as f64),
            OutputType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            OutputType::UInt32 => (u32::MIN as f64, u32::MAX as f64),
            OutputType::Int32 => (i32::MIN as f64, i32::MAX as f64),
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, OutputType::Float32)
    }
}

/// A tile converted to its output pixel type.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedTile {
    Float32(Buffer2<f32>),
    Byte(Buffer2<u8>),
    UInt16(Buffer2<u16>),
    Int16(Buffer2<i16>),
    UInt32(Buffer2<u32>),
    Int32(Buffer2<i32>),
}

impl EncodedTile {
    pub fn output_type(&self) -> OutputType {
        match self {
            EncodedTile::Float32(_) => OutputType::Float32,
            EncodedTile::Byte(_) => OutputType::Byte,
            EncodedTile::UInt16(_) => OutputType::UInt16,
            EncodedTile::Int16(_) => OutputType::Int16,
            EncodedTile::UInt32(_) => OutputType::UInt32,
            EncodedTile::Int32(_) => OutputType::Int32,
        }
    }

    /// Width and height in pixels.
    pub fn size(&self) -> (usize, usize) {
        match self {
            EncodedTile::Float32(b) => (b.width(), b.height()),
            EncodedTile::Byte(b) => (b.width(), b.height()),
            EncodedTile::UInt16(b) => (b.width(), b.height()),
            EncodedTile::Int16(b) => (b.width(), b.height()),
            EncodedTile::UInt32(b) => (b.width(), b.height()),
            EncodedTile::Int32(b) => (b.width(), b.height()),
        }
    }

    /// Pixel at `(x, y)` widened to `f64`.
    pub fn value_f64(&self, x: usize, y: usize) -> f64 {
        match self {
            EncodedTile::Float32(b) => *b.get(x, y) as f64,
            EncodedTile::Byte(b) => *b.get(x, y) as f64,
            EncodedTile::UInt16(b) => *b.get(x, y) as f64,
            EncodedTile::Int16(b) => *b.get(x, y) as f64,
            EncodedTile::UInt32(b) => *b.get(x, y) as f64,
            EncodedTile::Int32(b) => *b.get(x, y) as f64,
        }
    }
}

/// Round to nearest (half away from zero) and clamp into `[min, max]`.
/// NaN maps to the value in range closest to zero.
#[inline]
pub fn round_and_clamp(value: f32, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() {
        return 0.0f64.clamp(min, max);
    }
    (value as f64).round().clamp(min, max)
}

/// Convert a composited tile to `output_type`.
///
/// `Float32` passes values through unchanged. Integer types round and clamp.
pub fn encode_tile(values: &Buffer2<f32>, output_type: OutputType) -> EncodedTile {
    let range = output_type.range();
    match output_type {
        OutputType::Float32 => EncodedTile::Float32(values.clone()),
        OutputType::Byte => EncodedTile::Byte(values.map(|&v| round_and_clamp(v, range) as u8)),
        OutputType::UInt16 => {
            EncodedTile::UInt16(values.map(|&v| round_and_clamp(v, range) as u16))
        }
        OutputType::Int16 => EncodedTile::Int16(values.map(|&v| round_and_clamp(v, range) as i16)),
        OutputType::UInt32 => {
            EncodedTile::UInt32(values.map(|&v| round_and_clamp(v, range) as u32))
        }
        OutputType::Int32 => EncodedTile::Int32(values.map(|&v| round_and_clamp(v, range) as i32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_and_clamp() {
        let byte = OutputType::Byte.range();
        assert_eq!(round_and_clamp(2.5, byte), 3.0);
        assert_eq!(round_and_clamp(2.49, byte), 2.0);
        assert_eq!(round_and_clamp(-7.0, byte), 0.0);
        assert_eq!(round_and_clamp(300.0, byte), 255.0);
        assert_eq!(round_and_clamp(f32::NAN, byte), 0.0);

        let int16 = OutputType::Int16.range();
        assert_eq!(round_and_clamp(-2.5, int16), -3.0);
        assert_eq!(round_and_clamp(-40000.0, int16), -32768.0);
    }

    #[test]
    fn test_encode_byte_tile() {
        let values = Buffer2::new(3, 1, vec![-1.0, 127.6, 1000.0]);
        let encoded = encode_tile(&values, OutputType::Byte);
        assert_eq!(encoded, EncodedTile::Byte(Buffer2::new(3, 1, vec![0, 128, 255])));
        assert_eq!(encoded.output_type(), OutputType::Byte);
        assert_eq!(encoded.size(), (3, 1));
    }

    #[test]
    fn test_encode_float_passthrough() {
        let values = Buffer2::new(2, 1, vec![0.25, f32::NAN]);
        let encoded = encode_tile(&values, OutputType::Float32);
        assert_eq!(encoded.value_f64(0, 0), 0.25);
        assert!(encoded.value_f64(1, 0).is_nan());
    }

    #[test]
    fn test_output_type_serde_names() {
        let json = serde_json::to_string(&OutputType::UInt16).unwrap();
        assert_eq!(json, "\"uint16\"");
        let back: OutputType = serde_json::from_str("\"int32\"").unwrap();
        assert_eq!(back, OutputType::Int32);
    }
}
