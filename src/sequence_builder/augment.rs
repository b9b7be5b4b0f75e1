//! Detector-parameter augmentation.
//!
//! Optionally appends a fixed per-layer calibration vector to every cell's
//! feature row, widening each row by [`PARAM_WIDTH`]. The vector is selected
//! by the cell's (region, layer) address; addresses outside the configured
//! table map to zeros, never an error.
//!
//! Augmented columns sit *after* the schema features and are excluded from
//! normalization — they are calibration constants, not measurements.

use crate::error::{ExtractError, Result};
use crate::event::{columns, LayerKey};
use crate::schema::CellSchema;
use crate::sequence_builder::builder::CellSequence;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Width of the calibration vector appended per cell.
pub const PARAM_WIDTH: usize = 7;

// ============================================================================
// Configuration
// ============================================================================

/// Calibration vectors per calorimeter layer, [`PARAM_WIDTH`] values each.
/// Layers left unset contribute zero vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParamsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emb1: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emb2: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emb3: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eme1: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eme2: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eme3: Option<Vec<f64>>,
}

impl DetectorParamsConfig {
    fn entries(&self) -> [(&'static str, &Option<Vec<f64>>); 6] {
        [
            ("EMB1", &self.emb1),
            ("EMB2", &self.emb2),
            ("EMB3", &self.emb3),
            ("EME1", &self.eme1),
            ("EME2", &self.eme2),
            ("EME3", &self.eme3),
        ]
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, params) in self.entries() {
            if let Some(values) = params {
                if values.len() != PARAM_WIDTH {
                    return Err(format!(
                        "{name} parameters must have {PARAM_WIDTH} values, got {}",
                        values.len()
                    ));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(format!("{name} parameters contain non-finite values"));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Augmenter
// ============================================================================

/// Appends per-layer calibration vectors to built sequences.
#[derive(Debug, Clone)]
pub struct DetectorAugmenter {
    lookup: AHashMap<LayerKey, [f64; PARAM_WIDTH]>,
    barrel_idx: usize,
    layer_idx: usize,
}

impl DetectorAugmenter {
    /// Build the (region, layer) lookup and resolve the address columns.
    ///
    /// The schema must carry `is_barrel` and `layer` — without them a cell
    /// row cannot be addressed, which is a configuration error caught here,
    /// before any data flows.
    pub fn new(config: &DetectorParamsConfig, schema: &CellSchema) -> Result<Self> {
        config.validate().map_err(ExtractError::Config)?;
        let barrel_idx = schema.index_of(columns::IS_BARREL).ok_or_else(|| {
            ExtractError::config(
                "is_barrel must be a schema feature when detector params are enabled",
            )
        })?;
        let layer_idx = schema.index_of(columns::LAYER).ok_or_else(|| {
            ExtractError::config("layer must be a schema feature when detector params are enabled")
        })?;

        let mut lookup = AHashMap::with_capacity(6);
        for (name, params) in config.entries() {
            if let Some(values) = params {
                let mut fixed = [0.0; PARAM_WIDTH];
                fixed.copy_from_slice(values);
                let key = LayerKey::parse(name)
                    .ok_or_else(|| ExtractError::config(format!("bad layer name {name:?}")))?;
                lookup.insert(key, fixed);
            }
        }
        Ok(Self {
            lookup,
            barrel_idx,
            layer_idx,
        })
    }

    /// Calibration vector for one layer address; zeros when unconfigured.
    pub fn params_for(&self, key: LayerKey) -> [f64; PARAM_WIDTH] {
        self.lookup.get(&key).copied().unwrap_or([0.0; PARAM_WIDTH])
    }

    /// Widen every cell row of a sequence by its layer's calibration vector.
    pub fn augment(&self, sequence: &mut CellSequence) {
        for row in &mut sequence.features {
            let key = LayerKey::from_cell_fields(row[self.barrel_idx], row[self.layer_idx]);
            let params = self.params_for(key);
            let mut widened = Vec::with_capacity(row.len() + PARAM_WIDTH);
            widened.extend_from_slice(row);
            widened.extend_from_slice(&params);
            *row = Arc::new(widened);
        }
    }

    /// Widen every sequence of a split in place.
    pub fn augment_all(&self, sequences: &mut [CellSequence]) {
        for sequence in sequences {
            self.augment(sequence);
        }
    }
}

/// Feature width after optional augmentation.
pub fn enhanced_feature_count(schema: &CellSchema, use_detector_params: bool) -> usize {
    if use_detector_params {
        schema.total_count() + PARAM_WIDTH
    } else {
        schema.total_count()
    }
}
