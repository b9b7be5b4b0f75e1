//! Fluent builder for extraction configuration.
//!
//! This module provides a builder pattern for constructing extraction
//! configurations in a clean, readable, and type-safe manner.
//!
//! # Quick Start
//!
//! ```ignore
//! use cell_sequence_extractor::ExtractionBuilder;
//!
//! // Simple usage with defaults
//! let pipeline = ExtractionBuilder::new()
//!     .build()?;
//!
//! // Process one shard
//! let output = pipeline.process_file(Path::new("data/output_000.json"))?;
//! ```
//!
//! # Feature Width Reference
//!
//! The per-cell feature width is automatically computed from configuration:
//!
//! | Configuration | Formula | Width |
//! |--------------|---------|-------|
//! | Standard | 9 | 9 |
//! | + Spatial | + 3 | 12 |
//! | + Detector params | + 7 | 16 (19 with spatial) |
//!
//! Standard features: eta, phi, is_barrel, layer, time, energy, significance,
//! matched_track_pt, matched_track_delta_r
//!
//! # Common Configurations
//!
//! ## Energy-ranked, track-matched cells (default semantics)
//!
//! ```ignore
//! let config = ExtractionBuilder::new()
//!     .data_dir("data")
//!     .num_files(50)
//!     .sequence_window(40, 3)
//!     .build_config()?;
//! ```
//!
//! ## Spatial features with detector-parameter augmentation
//!
//! ```ignore
//! let config = ExtractionBuilder::new()
//!     .with_spatial_features()
//!     .with_detector_params(params)
//!     .selection_feature("significance")
//!     .build_config()?;
//! ```

use crate::config::{ExperimentMetadata, ExtractionConfig};
use crate::error::Result;
use crate::filtering::FieldCondition;
use crate::pipeline::ExtractionPipeline;
use crate::sequence_builder::DetectorParamsConfig;

/// Fluent builder for creating extraction configurations.
///
/// The builder provides a chained API over [`ExtractionConfig`] while
/// ensuring consistency between components.
///
/// # Features
///
/// - **Auto-sync**: Feature width follows the schema selection
/// - **Validation**: Configuration is validated before building
/// - **Defaults**: Sensible defaults for all parameters
///
/// # Example
///
/// ```ignore
/// use cell_sequence_extractor::ExtractionBuilder;
///
/// let pipeline = ExtractionBuilder::new()
///     .data_dir("data")
///     .sequence_window(40, 3)
///     .delta_r_threshold(0.05)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtractionBuilder {
    config: ExtractionConfig,
}

impl ExtractionBuilder {
    /// Create a new builder with default settings.
    ///
    /// Default configuration:
    /// - 9 standard cell features, energy-ranked, 40-cell sequences
    /// - Valid + track-matched cell filtering
    /// - 70/10/20 split at seed 42
    pub fn new() -> Self {
        Self {
            config: ExtractionConfig::default(),
        }
    }

    /// Start from an existing configuration instead of the defaults.
    pub fn from_config(config: ExtractionConfig) -> Self {
        Self { config }
    }

    // =========================================================================
    // Data Source
    // =========================================================================

    /// Set the directory holding event shards.
    pub fn data_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.data.data_dir = dir.into();
        self
    }

    /// Set the number of shard files to process.
    pub fn num_files(mut self, n: usize) -> Self {
        self.config.data.num_files = n;
        self
    }

    /// Include spatial (x, y, z) cell features.
    ///
    /// Widens each cell row from 9 to 12 features.
    pub fn with_spatial_features(mut self) -> Self {
        self.config.data.use_spatial_features = true;
        self
    }

    /// Set the truth↔reconstructed vertex distance window (mm).
    ///
    /// Events whose vertices disagree by more than this are skipped and
    /// counted, not errored. Default: 2.0.
    pub fn vertex_window(mut self, max_distance: f64) -> Self {
        self.config.data.max_vertex_distance = Some(max_distance);
        self
    }

    /// Disable the vertex distance gate entirely.
    pub fn without_vertex_window(mut self) -> Self {
        self.config.data.max_vertex_distance = None;
        self
    }

    /// Enable NaN/Inf and range validation of built sequences.
    pub fn with_sequence_validation(mut self) -> Self {
        self.config.data.validate_sequences = true;
        self
    }

    // =========================================================================
    // Matching & Filtering
    // =========================================================================

    /// Set the maximum ΔR for cell↔track association (radians).
    ///
    /// Default: 0.05.
    pub fn delta_r_threshold(mut self, threshold: f64) -> Self {
        self.config.matching.delta_r_threshold = threshold;
        self
    }

    /// Control the validity-flag filter predicate.
    ///
    /// Default: true (only valid cells survive).
    pub fn require_valid(mut self, required: bool) -> Self {
        self.config.filtering.require_valid = required;
        self
    }

    /// Control the hard-scatter track-match filter predicate.
    ///
    /// Default: true (only matched cells survive).
    pub fn require_track_match(mut self, required: bool) -> Self {
        self.config.filtering.require_track_match = required;
        self
    }

    /// Add an exact-equality filter condition on a cell column.
    ///
    /// Conditions are ANDed with the fixed predicates. Intended for flag
    /// and index columns, e.g. `filter_condition("is_barrel", 1.0)`.
    pub fn filter_condition(mut self, field: impl Into<String>, value: f64) -> Self {
        self.config
            .filtering
            .additional_conditions
            .push(FieldCondition::new(field, value));
        self
    }

    // =========================================================================
    // Sequence Building
    // =========================================================================

    /// Set the sequence cell window: maximum length and minimum survivors.
    ///
    /// - `max_cells`: sequences are truncated to the top `max_cells` by rank
    /// - `min_cells`: events with fewer surviving cells are dropped
    ///
    /// Default: (40, 3).
    pub fn sequence_window(mut self, max_cells: usize, min_cells: usize) -> Self {
        self.config.sequence.max_cells = max_cells;
        self.config.sequence.min_cells = min_cells;
        self
    }

    /// Set the cell feature used for descending rank before truncation.
    ///
    /// Default: "energy".
    pub fn selection_feature(mut self, feature: impl Into<String>) -> Self {
        self.config.sequence.selection_feature = feature.into();
        self
    }

    /// Attach per-layer detector parameters, appended to every cell row.
    ///
    /// Widens each row by the 7-value calibration vector of its layer; rows
    /// in layers without configured parameters get zeros.
    pub fn with_detector_params(mut self, params: DetectorParamsConfig) -> Self {
        self.config.detector_params = Some(params);
        self
    }

    // =========================================================================
    // Splitting & Normalization
    // =========================================================================

    /// Set the split fractions.
    ///
    /// `test_fraction` of all events forms the holdout pool; `val_fraction`
    /// *of that pool* becomes validation. Default: (0.3, 1/3) → 70/10/20.
    pub fn splits(mut self, test_fraction: f64, val_fraction: f64) -> Self {
        self.config.split.test_fraction = test_fraction;
        self.config.split.val_fraction = val_fraction;
        self
    }

    /// Set the split shuffle seed.
    ///
    /// Default: 42.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.split.seed = seed;
        self
    }

    /// Replace the normalization skip-list.
    ///
    /// Skipped features pass through z-scoring unchanged.
    /// Default: time, is_barrel, layer.
    pub fn skip_normalization<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.normalization.skip_normalization =
            features.into_iter().map(Into::into).collect();
        self
    }

    // =========================================================================
    // Packing
    // =========================================================================

    /// Set the number of sequences per packed batch.
    ///
    /// Default: 64.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.packing.batch_size = size;
        self
    }

    /// Sort sequences by length before chunking to reduce padding waste.
    pub fn sort_batches_by_length(mut self) -> Self {
        self.config.packing.sort_by_length = true;
        self
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Set experiment metadata for tracking and reproducibility.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let builder = ExtractionBuilder::new()
    ///     .experiment("ttbar_baseline_v1", "Initial t-tbar extraction");
    /// ```
    pub fn experiment(mut self, name: &str, description: &str) -> Self {
        self.config.metadata = Some(ExperimentMetadata {
            name: name.to_string(),
            description: Some(description.to_string()),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            version: None,
            tags: None,
        });
        self
    }

    /// Set experiment metadata with full control.
    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.config.metadata = Some(metadata);
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Build the extraction configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_config(self) -> std::result::Result<ExtractionConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build and return a ready-to-use pipeline.
    ///
    /// This is the most common entry point: it validates the configuration
    /// and constructs an [`ExtractionPipeline`] in one step.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pipeline = ExtractionBuilder::new()
    ///     .data_dir("data")
    ///     .sequence_window(40, 3)
    ///     .build()?;
    ///
    /// let output = pipeline.process_file(Path::new("data/output_000.json"))?;
    /// ```
    pub fn build(self) -> Result<ExtractionPipeline> {
        ExtractionPipeline::from_config(self.config)
    }

    /// Get the computed feature width for the current configuration.
    ///
    /// Useful for understanding the output dimensionality before building.
    pub fn feature_count(&self) -> usize {
        self.config.feature_count()
    }

    /// Get a summary of the current configuration.
    pub fn summary(&self) -> String {
        let features_desc = match (
            self.config.data.use_spatial_features,
            self.config.use_detector_params(),
        ) {
            (false, false) => "Standard",
            (true, false) => "Standard + Spatial",
            (false, true) => "Standard + Detector params",
            (true, true) => "Standard + Spatial + Detector params",
        };

        let vertex_desc = match self.config.data.max_vertex_distance {
            Some(d) => format!("≤ {d} mm"),
            None => "disabled".to_string(),
        };

        format!(
            "ExtractionBuilder Summary:\n\
             - Data: {} ({} shards)\n\
             - Features: {} ({} total)\n\
             - Sequences: ≤ {} cells by {}, ≥ {} to keep\n\
             - Matching: ΔR ≤ {}\n\
             - Vertex window: {}\n\
             - Splits: {:.0}% holdout, seed {}",
            self.config.data.data_dir,
            self.config.data.num_files,
            features_desc,
            self.feature_count(),
            self.config.sequence.max_cells,
            self.config.sequence.selection_feature,
            self.config.sequence.min_cells,
            self.config.matching.delta_r_threshold,
            vertex_desc,
            self.config.split.test_fraction * 100.0,
            self.config.split.seed,
        )
    }
}
