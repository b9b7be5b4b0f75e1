//! Sequence building for transformer models.
//!
//! Turns one event's filtered cells into a bounded-length, rank-ordered
//! sequence of per-cell feature vectors. Downstream models consume events as
//! sequences of cells rather than unordered sets, so ordering and truncation
//! happen here, under configuration control.
//!
//! # Algorithm
//!
//! 1. Rank cells by a configured selection feature, **descending** (stable:
//!    ties keep their original order).
//! 2. Drop the event entirely when fewer than `min_cells` survive — routine
//!    attrition, reported through [`BuildDiagnostics`], never an error.
//! 3. Truncate to the top `max_cells`.
//! 4. Read each schema feature off each retained cell, in rank order. A
//!    feature name absent from the cell table reads as 0.0 and is reported.
//!
//! # Memory Management
//!
//! Feature vectors are `Arc`-shared ([`FeatureVec`]): sequences, batches and
//! exported splits reference the same allocation instead of deep-copying
//! per-cell rows at every stage.

use crate::event::{CellTable, Event};
use crate::schema::CellSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Type Aliases
// ============================================================================

/// Shared per-cell feature vector.
///
/// Cloning an `Arc` is O(1); the builder, the splitter and the batch packer
/// all hold references to the same row storage.
pub type FeatureVec = Arc<Vec<f64>>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for sequence building.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Maximum cells per sequence (model input length). Events with more
    /// surviving cells are truncated to the top `max_cells` by rank.
    pub max_cells: usize,

    /// Minimum surviving cells for an event to be kept at all.
    pub min_cells: usize,

    /// Cell feature used for descending rank before truncation.
    /// Typical choices: "energy", "significance", "matched_track_pt".
    pub selection_feature: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_cells: 40,
            min_cells: 3,
            selection_feature: "energy".to_string(),
        }
    }
}

impl SequenceConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cells == 0 {
            return Err("max_cells must be positive".to_string());
        }
        if self.min_cells == 0 {
            return Err("min_cells must be positive".to_string());
        }
        if self.min_cells > self.max_cells {
            return Err(format!(
                "min_cells ({}) must be <= max_cells ({})",
                self.min_cells, self.max_cells
            ));
        }
        if self.selection_feature.is_empty() {
            return Err("selection_feature must not be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Output types
// ============================================================================

/// One event rendered as a model-ready sequence.
#[derive(Debug, Clone)]
pub struct CellSequence {
    /// Event identifier from the source dataset.
    pub event_number: i64,

    /// Per-cell feature rows, rank order, `len() <= max_cells`.
    pub features: Vec<FeatureVec>,

    /// Per-event auxiliary vertex features (reco vertex position, or zeros
    /// when spatial features are disabled).
    pub vertex_features: Vec<f64>,

    /// Reconstructed vertex time — the prediction target, carried raw.
    pub vertex_time: f64,
}

impl CellSequence {
    /// Number of cells in the sequence (its true, unpadded length).
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Width of each feature row.
    pub fn feature_count(&self) -> usize {
        self.features.first().map_or(0, |row| row.len())
    }
}

/// Why the builder produced no sequence, or what it had to improvise.
/// Reported alongside results instead of printed from the hot path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildDiagnostics {
    /// Schema features absent from the cell table, read as 0.0.
    pub missing_features: Vec<String>,
    /// Selection feature absent from the table; original order was kept.
    pub missing_selection_feature: bool,
}

impl BuildDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.missing_features.is_empty() && !self.missing_selection_feature
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds [`CellSequence`]s from filtered events against a fixed schema.
#[derive(Debug, Clone)]
pub struct EventSequenceBuilder {
    config: SequenceConfig,
    schema: CellSchema,
    /// Whether vertex features carry real reco coordinates or zeros.
    use_spatial_features: bool,
}

impl EventSequenceBuilder {
    pub fn new(config: SequenceConfig, schema: CellSchema, use_spatial_features: bool) -> Self {
        Self {
            config,
            schema,
            use_spatial_features,
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn schema(&self) -> &CellSchema {
        &self.schema
    }

    /// Rank indices: descending by selection feature, stable on ties.
    fn ranked_indices(&self, cells: &CellTable, diagnostics: &mut BuildDiagnostics) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..cells.len()).collect();
        match cells.column(&self.config.selection_feature) {
            Some(col) => {
                indices.sort_by(|&a, &b| col[b].total_cmp(&col[a]));
            }
            None => {
                // Every rank value reads as 0.0, so the stable sort keeps
                // the incoming order.
                diagnostics.missing_selection_feature = true;
            }
        }
        indices
    }

    /// Build a sequence from already-filtered cells, or `None` when the event
    /// falls below `min_cells`.
    pub fn build(
        &self,
        event: &Event,
        filtered_cells: &CellTable,
    ) -> (Option<CellSequence>, BuildDiagnostics) {
        let mut diagnostics = BuildDiagnostics::default();

        if filtered_cells.len() < self.config.min_cells {
            return (None, diagnostics);
        }

        let mut indices = self.ranked_indices(filtered_cells, &mut diagnostics);
        indices.truncate(self.config.max_cells);

        // Resolve each schema feature to its column once, not per cell.
        let feature_names = self.schema.feature_names();
        let columns: Vec<Option<&[f64]>> = feature_names
            .iter()
            .map(|name| {
                let col = filtered_cells.column(name);
                if col.is_none() {
                    diagnostics.missing_features.push(name.to_string());
                }
                col
            })
            .collect();

        let features: Vec<FeatureVec> = indices
            .iter()
            .map(|&row| {
                let values: Vec<f64> = columns
                    .iter()
                    .map(|col| col.map_or(0.0, |c| c[row]))
                    .collect();
                Arc::new(values)
            })
            .collect();

        let vertex_features = if self.use_spatial_features {
            event.reco_vertex.as_array().to_vec()
        } else {
            vec![0.0; 3]
        };

        let sequence = CellSequence {
            event_number: event.event_number,
            features,
            vertex_features,
            vertex_time: event.vertex_time,
        };
        (Some(sequence), diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{columns, Vertex};
    use crate::schema::Preset;

    fn event_with_cells(cells: CellTable) -> Event {
        Event {
            event_number: 1,
            truth_vertex: Vertex::new(0.0, 0.0, 0.0),
            reco_vertex: Vertex::new(0.5, -0.5, 12.0),
            vertex_time: 3.25,
            cells,
            tracks: Vec::new(),
        }
    }

    fn table_with_energies(energies: &[f64]) -> CellTable {
        let n = energies.len();
        let mut table = CellTable::new();
        table
            .insert_column(columns::ENERGY, energies.to_vec())
            .unwrap();
        table
            .insert_column(columns::ETA, (0..n).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        table.insert_column(columns::PHI, vec![0.0; n]).unwrap();
        table
            .insert_column(columns::IS_BARREL, vec![1.0; n])
            .unwrap();
        table.insert_column(columns::LAYER, vec![2.0; n]).unwrap();
        table.insert_column(columns::TIME, vec![0.1; n]).unwrap();
        table
            .insert_column(columns::SIGNIFICANCE, vec![4.0; n])
            .unwrap();
        table
            .insert_column(columns::MATCHED_TRACK_PT, vec![1.5; n])
            .unwrap();
        table
            .insert_column(columns::MATCHED_TRACK_DELTA_R, vec![0.02; n])
            .unwrap();
        table
    }

    fn builder() -> EventSequenceBuilder {
        EventSequenceBuilder::new(
            SequenceConfig::default(),
            Preset::Standard.build_schema(),
            false,
        )
    }

    #[test]
    fn test_config_validation() {
        assert!(SequenceConfig::default().validate().is_ok());

        let bad = SequenceConfig {
            min_cells: 50,
            max_cells: 40,
            ..SequenceConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = SequenceConfig {
            max_cells: 0,
            ..SequenceConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_ranked_descending_by_energy() {
        let cells = table_with_energies(&[2.0, 9.0, 5.0]);
        let event = event_with_cells(cells.clone());
        let (seq, diagnostics) = builder().build(&event, &cells);
        let seq = seq.unwrap();
        assert!(diagnostics.is_clean());

        let energy_idx = Preset::Standard.build_schema().index_of("energy").unwrap();
        let energies: Vec<f64> = seq.features.iter().map(|row| row[energy_idx]).collect();
        assert_eq!(energies, vec![9.0, 5.0, 2.0]);
    }

    #[test]
    fn test_rank_ties_keep_original_order() {
        let cells = table_with_energies(&[5.0, 5.0, 5.0]);
        let event = event_with_cells(cells.clone());
        let (seq, _) = builder().build(&event, &cells);
        let seq = seq.unwrap();

        let eta_idx = Preset::Standard.build_schema().index_of("eta").unwrap();
        let etas: Vec<f64> = seq.features.iter().map(|row| row[eta_idx]).collect();
        assert_eq!(etas, vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_truncates_to_max_cells() {
        let energies: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let cells = table_with_energies(&energies);
        let event = event_with_cells(cells.clone());
        let (seq, _) = builder().build(&event, &cells);
        let seq = seq.unwrap();
        assert_eq!(seq.len(), 40);

        // Top of the ranking is the highest energy.
        let energy_idx = Preset::Standard.build_schema().index_of("energy").unwrap();
        assert_eq!(seq.features[0][energy_idx], 59.0);
        assert_eq!(seq.features[39][energy_idx], 20.0);
    }

    #[test]
    fn test_min_cells_boundary() {
        // Exactly min_cells is retained.
        let cells = table_with_energies(&[1.0, 2.0, 3.0]);
        let event = event_with_cells(cells.clone());
        let (seq, _) = builder().build(&event, &cells);
        assert!(seq.is_some());

        // min_cells - 1 is dropped, without diagnostics noise.
        let cells = table_with_energies(&[1.0, 2.0]);
        let event = event_with_cells(cells.clone());
        let (seq, diagnostics) = builder().build(&event, &cells);
        assert!(seq.is_none());
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn test_missing_feature_reads_zero() {
        let mut cells = table_with_energies(&[1.0, 2.0, 3.0]);
        // Rebuild without the time column.
        let names: Vec<String> = cells
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut stripped = CellTable::new();
        for name in names {
            if name != columns::TIME {
                stripped
                    .insert_column(name.clone(), cells.column(&name).unwrap().to_vec())
                    .unwrap();
            }
        }
        cells = stripped;

        let event = event_with_cells(cells.clone());
        let (seq, diagnostics) = builder().build(&event, &cells);
        let seq = seq.unwrap();
        assert_eq!(
            diagnostics.missing_features,
            vec![columns::TIME.to_string()]
        );

        let time_idx = Preset::Standard.build_schema().index_of("time").unwrap();
        assert!(seq.features.iter().all(|row| row[time_idx] == 0.0));
    }

    #[test]
    fn test_missing_selection_feature_keeps_order() {
        let config = SequenceConfig {
            selection_feature: "nonexistent".to_string(),
            ..SequenceConfig::default()
        };
        let builder =
            EventSequenceBuilder::new(config, Preset::Standard.build_schema(), false);
        let cells = table_with_energies(&[2.0, 9.0, 5.0]);
        let event = event_with_cells(cells.clone());
        let (seq, diagnostics) = builder.build(&event, &cells);
        let seq = seq.unwrap();
        assert!(diagnostics.missing_selection_feature);

        let energy_idx = Preset::Standard.build_schema().index_of("energy").unwrap();
        let energies: Vec<f64> = seq.features.iter().map(|row| row[energy_idx]).collect();
        assert_eq!(energies, vec![2.0, 9.0, 5.0]);
    }

    #[test]
    fn test_vertex_features_follow_spatial_switch() {
        let cells = table_with_energies(&[1.0, 2.0, 3.0]);
        let event = event_with_cells(cells.clone());

        let (seq, _) = builder().build(&event, &cells);
        assert_eq!(seq.unwrap().vertex_features, vec![0.0, 0.0, 0.0]);

        let spatial = EventSequenceBuilder::new(
            SequenceConfig::default(),
            Preset::WithSpatial.build_schema(),
            true,
        );
        let (seq, _) = spatial.build(&event, &cells);
        assert_eq!(seq.unwrap().vertex_features, vec![0.5, -0.5, 12.0]);
    }

    #[test]
    fn test_vertex_time_carried_raw() {
        let cells = table_with_energies(&[1.0, 2.0, 3.0]);
        let event = event_with_cells(cells.clone());
        let (seq, _) = builder().build(&event, &cells);
        assert_eq!(seq.unwrap().vertex_time, 3.25);
    }
}
