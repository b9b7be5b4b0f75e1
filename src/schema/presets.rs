//! Preset feature-set configurations.
//!
//! Presets correspond to the two feature layouts of the source dataset:
//! the standard timing set, and the same set extended with Cartesian cell
//! positions for spatially-aware models.

use super::feature_def::{CellSchema, CellSchemaBuilder};
use serde::{Deserialize, Serialize};

/// Named cell feature presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Preset {
    /// Standard timing feature set (9 features):
    /// eta, phi, barrel flag, layer, time, energy, significance,
    /// matched track pt, matched track ΔR.
    #[default]
    Standard,

    /// Standard set preceded by Cartesian cell positions (12 features):
    /// x, y, z + the standard nine.
    WithSpatial,
}

impl Preset {
    /// Build a feature schema from this preset.
    pub fn build_schema(self) -> CellSchema {
        match self {
            Preset::Standard => CellSchemaBuilder::new()
                .with_angular()
                .with_detector_position()
                .with_signal()
                .with_track_match()
                .build(),
            Preset::WithSpatial => CellSchemaBuilder::new()
                .with_spatial()
                .with_angular()
                .with_detector_position()
                .with_signal()
                .with_track_match()
                .build(),
        }
    }

    /// Preset matching a configuration's spatial-features switch.
    pub fn for_spatial(use_spatial_features: bool) -> Self {
        if use_spatial_features {
            Preset::WithSpatial
        } else {
            Preset::Standard
        }
    }

    /// Get the preset summary.
    pub fn config(self) -> PresetConfig {
        match self {
            Preset::Standard => PresetConfig {
                name: "Standard",
                feature_count: 9,
                includes_spatial: false,
            },
            Preset::WithSpatial => PresetConfig {
                name: "WithSpatial",
                feature_count: 12,
                includes_spatial: true,
            },
        }
    }
}

/// Summary of a preset's shape.
#[derive(Debug, Clone, Serialize)]
pub struct PresetConfig {
    pub name: &'static str,
    pub feature_count: usize,
    pub includes_spatial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_counts_match_schema() {
        for preset in [Preset::Standard, Preset::WithSpatial] {
            let schema = preset.build_schema();
            assert_eq!(schema.total_count(), preset.config().feature_count);
        }
    }

    #[test]
    fn test_for_spatial() {
        assert_eq!(Preset::for_spatial(false), Preset::Standard);
        assert_eq!(Preset::for_spatial(true), Preset::WithSpatial);
    }

    #[test]
    fn test_default_is_standard() {
        assert_eq!(Preset::default(), Preset::Standard);
    }
}
