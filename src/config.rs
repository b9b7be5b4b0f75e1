//! Pipeline configuration management.
//!
//! This module provides unified configuration for the entire extraction and
//! preprocessing pipeline, with serialization support for experiment
//! reproducibility.
//!
//! # Features
//!
//! - **Unified Configuration**: Single struct combining all pipeline stages
//! - **Serialization**: Save/load configurations to TOML or JSON
//! - **Validation**: Fail fast on inconsistent parameters, before any data
//! - **Reproducibility**: Version control friendly configuration files
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::config::ExtractionConfig;
//!
//! // Create configuration
//! let config = ExtractionConfig::default();
//!
//! // Save to file
//! config.save_toml("experiment_config.toml")?;
//!
//! // Load from file
//! let loaded = ExtractionConfig::load_toml("experiment_config.toml")?;
//!
//! // Use with pipeline
//! let pipeline = ExtractionPipeline::from_config(loaded)?;
//! ```

use crate::filtering::FilterConfig;
use crate::matching::MatcherConfig;
use crate::packing::PackerConfig;
use crate::preprocessing::{NormalizationConfig, SplitConfig};
use crate::schema::{CellSchema, Preset};
use crate::sequence_builder::{DetectorParamsConfig, SequenceConfig};
use std::fs;
use std::path::Path;

/// Unified extraction configuration.
///
/// Contains all configuration parameters for the complete pipeline, from
/// shard discovery through batch packing.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Data source and event-gate configuration
    pub data: DataConfig,

    /// Track-to-cell matching configuration
    pub matching: MatcherConfig,

    /// Cell filtering configuration
    pub filtering: FilterConfig,

    /// Sequence building configuration
    pub sequence: SequenceConfig,

    /// Train/val/test splitting configuration
    pub split: SplitConfig,

    /// Normalization configuration
    pub normalization: NormalizationConfig,

    /// Batch packing configuration
    pub packing: PackerConfig,

    /// Per-layer detector parameters (optional; enables augmentation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector_params: Option<DetectorParamsConfig>,

    /// Experiment metadata (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExperimentMetadata>,
}

/// Data source configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding the numbered event shards
    pub data_dir: String,

    /// Number of shard indices to look for (`output_000` .. `output_N-1`)
    pub num_files: usize,

    /// Include Cartesian cell positions and real vertex coordinates
    pub use_spatial_features: bool,

    /// Keep only events whose truth and reco vertices agree within this
    /// distance (mm). `None` disables the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_vertex_distance: Option<f64>,

    /// Run the sequence validator on every built sequence
    pub validate_sequences: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            num_files: 50,
            use_spatial_features: false,
            max_vertex_distance: Some(2.0),
            validate_sequences: false,
        }
    }
}

impl DataConfig {
    /// Validate data configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.is_empty() {
            return Err("data_dir must not be empty".to_string());
        }
        if self.num_files == 0 {
            return Err("num_files must be positive".to_string());
        }
        if let Some(d) = self.max_vertex_distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(format!(
                    "max_vertex_distance must be positive and finite, got {d}"
                ));
            }
        }
        Ok(())
    }
}

/// Experiment metadata for tracking and reproducibility.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExperimentMetadata {
    /// Experiment name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Version or git commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Custom tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ExtractionConfig {
    /// Create a new extraction configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set data configuration.
    pub fn with_data(mut self, config: DataConfig) -> Self {
        self.data = config;
        self
    }

    /// Set matching configuration.
    pub fn with_matching(mut self, config: MatcherConfig) -> Self {
        self.matching = config;
        self
    }

    /// Set filtering configuration.
    pub fn with_filtering(mut self, config: FilterConfig) -> Self {
        self.filtering = config;
        self
    }

    /// Set sequence configuration.
    pub fn with_sequence(mut self, config: SequenceConfig) -> Self {
        self.sequence = config;
        self
    }

    /// Set splitting configuration.
    pub fn with_split(mut self, config: SplitConfig) -> Self {
        self.split = config;
        self
    }

    /// Set packing configuration.
    pub fn with_packing(mut self, config: PackerConfig) -> Self {
        self.packing = config;
        self
    }

    /// Enable detector-parameter augmentation.
    pub fn with_detector_params(mut self, config: DetectorParamsConfig) -> Self {
        self.detector_params = Some(config);
        self
    }

    /// Set experiment metadata.
    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Feature schema implied by this configuration.
    pub fn schema(&self) -> CellSchema {
        Preset::for_spatial(self.data.use_spatial_features).build_schema()
    }

    /// Whether detector-parameter augmentation is enabled.
    pub fn use_detector_params(&self) -> bool {
        self.detector_params.is_some()
    }

    /// Cell-row width after optional augmentation.
    pub fn feature_count(&self) -> usize {
        crate::sequence_builder::enhanced_feature_count(&self.schema(), self.use_detector_params())
    }

    /// Validate the configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise. Runs before any data is
    /// read; inconsistent parameter combinations never reach the pipeline.
    pub fn validate(&self) -> Result<(), String> {
        self.data.validate()?;
        self.matching.validate()?;
        self.filtering.validate()?;
        self.sequence.validate()?;
        self.split.validate()?;
        self.normalization.validate()?;
        self.packing.validate()?;

        if let Some(detector) = &self.detector_params {
            detector.validate()?;
            // Augmentation addresses cells by (region, layer); both columns
            // must be in the schema for any preset this config can produce.
            let schema = self.schema();
            if schema.index_of("is_barrel").is_none() || schema.index_of("layer").is_none() {
                return Err(
                    "detector_params requires is_barrel and layer in the feature schema"
                        .to_string(),
                );
            }
        }

        Ok(())
    }

    /// Save configuration to TOML file.
    ///
    /// # Example
    ///
    /// ```ignore
    /// config.save_toml("configs/experiment1.toml")?;
    /// ```
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load configuration from TOML file.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = ExtractionConfig::load_toml("configs/experiment1.toml")?;
    /// ```
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ExtractionConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load configuration from JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ExtractionConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}
