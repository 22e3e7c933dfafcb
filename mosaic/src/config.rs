//! Run configuration.

use std::path::Path;

use common::file_format;
use serde::{Deserialize, Serialize};

use crate::alignment::RansacConfig;
use crate::compositor::WeightScope;
use crate::error::ConfigError;
use crate::planner::{ChainSettings, Layout};
use crate::raster::OutputType;
use crate::weights::WeightConfig;

/// Everything a mosaic run needs besides its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub layout: Layout,
    /// Width in pixels of the strips searched for correspondences.
    pub overlap_width: u32,
    /// Extra radius for weight computation. Unset or zero means
    /// `overlap_width`.
    pub blend_margin: Option<u32>,
    /// No-data value of the output. Unset means the inputs' value.
    pub output_nodata: Option<f32>,
    pub output_type: OutputType,
    /// Requested tile size; grown when smaller than twice the blend margin.
    pub tile_size: (u32, u32),
    /// Tiles rendered at once. Unset means one per rayon thread.
    pub max_concurrent_tiles: Option<usize>,
    /// Image pairs aligned at once. Unset means one per rayon thread.
    pub max_concurrent_pairs: Option<usize>,
    pub weight_scope: WeightScope,
    pub weights: WeightConfig,
    pub ransac: RansacConfig,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            layout: Layout::Horizontal,
            overlap_width: 2000,
            blend_margin: None,
            output_nodata: None,
            output_type: OutputType::Float32,
            tile_size: (256, 256),
            max_concurrent_tiles: None,
            max_concurrent_pairs: None,
            weight_scope: WeightScope::Footprint,
            weights: WeightConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl MosaicConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overlap_width == 0 {
            return Err(ConfigError::ZeroOverlap);
        }
        let (width, height) = self.tile_size;
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroTileSize { width, height });
        }
        self.ransac.validate()
    }

    /// Blend margin in effect: the configured one, or the overlap width.
    pub fn effective_blend_margin(&self) -> u32 {
        match self.blend_margin {
            Some(margin) if margin > 0 => margin,
            _ => self.overlap_width,
        }
    }

    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            layout: self.layout,
            overlap_width: self.overlap_width,
            ransac: self.ransac.clone(),
            max_concurrent_pairs: self.max_concurrent_pairs,
        }
    }

    /// Load and validate a YAML or JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = file_format::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as YAML or JSON, chosen by the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        file_format::save(self, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MosaicConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlap_width, 2000);
        assert_eq!(config.effective_blend_margin(), 2000);
        assert_eq!(config.weight_scope, WeightScope::Footprint);
        assert_eq!(config.ransac.max_iterations, 100);
        assert_eq!(config.ransac.inlier_threshold, 10.0);
        assert_eq!(config.weights.border_fill, -1.0);
    }

    #[test]
    fn test_blend_margin_zero_means_overlap() {
        let config = MosaicConfig {
            overlap_width: 300,
            blend_margin: Some(0),
            ..Default::default()
        };
        assert_eq!(config.effective_blend_margin(), 300);
        let config = MosaicConfig {
            blend_margin: Some(40),
            ..config
        };
        assert_eq!(config.effective_blend_margin(), 40);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = MosaicConfig {
            overlap_width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroOverlap)));
        let config = MosaicConfig {
            tile_size: (0, 64),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroTileSize {
                width: 0,
                height: 64
            })
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "overlap_width: 120\noutput_type: uint16\nweights:\n  hole_fill: 0.5\n";
        let config: MosaicConfig =
            file_format::deserialize(yaml, file_format::SerdeFormat::Yaml).unwrap();
        assert_eq!(config.overlap_width, 120);
        assert_eq!(config.output_type, OutputType::UInt16);
        assert_eq!(config.weights.hole_fill, 0.5);
        assert_eq!(config.weights.border_fill, -1.0);
        assert_eq!(config.layout, Layout::Horizontal);
    }

    #[test]
    fn test_unknown_layout_is_rejected() {
        let yaml = "layout: vertical\n";
        let parsed: Result<MosaicConfig, _> =
            file_format::deserialize(yaml, file_format::SerdeFormat::Yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("mosaic-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = MosaicConfig {
            overlap_width: 64,
            output_nodata: Some(-32768.0),
            output_type: OutputType::Int16,
            weight_scope: WeightScope::Tile,
            ..Default::default()
        };
        for name in ["run.yaml", "run.json"] {
            let path = dir.join(name);
            config.save(&path).unwrap();
            assert_eq!(MosaicConfig::load(&path).unwrap(), config);
        }

        let invalid = MosaicConfig {
            tile_size: (0, 0),
            ..Default::default()
        };
        let path = dir.join("invalid.json");
        invalid.save(&path).unwrap();
        assert!(MosaicConfig::load(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_bad_extension() {
        assert!(matches!(
            MosaicConfig::load("settings.toml"),
            Err(ConfigError::Load(_))
        ));
    }
}
