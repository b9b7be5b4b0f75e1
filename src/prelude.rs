//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits for
//! ergonomic usage of the extraction library.
//!
//! # Usage
//!
//! ```ignore
//! use cell_sequence_extractor::prelude::*;
//!
//! // Now you have access to all common types
//! let config = ExtractionConfig::default();
//! let dataset = Dataset::assemble(&config)?;
//! let result = DatasetExporter::new("output").export(&dataset)?;
//! ```
//!
//! # What's Included
//!
//! ## Core Pipeline
//! - [`ExtractionPipeline`] - Per-shard extraction pipeline
//! - [`ExtractionConfig`] - Top-level configuration
//! - [`ExtractionBuilder`] - Fluent configuration builder
//! - [`ExtractionStats`] - Attrition counters
//!
//! ## Events
//! - [`Event`] - One collision event with cells, tracks, and vertices
//! - [`CellTable`] - Columnar per-cell data
//! - [`Track`] - Reconstructed track with per-layer projections
//! - [`EventStore`] - JSON shard discovery and parsing
//!
//! ## Matching & Filtering
//! - [`TrackMatcher`] - ΔR cell↔track association
//! - [`CellFilterChain`] - AND-predicate cell selection
//!
//! ## Sequence Building
//! - [`EventSequenceBuilder`] - Ranked, truncated per-event sequences
//! - [`CellSequence`] - Output sequence container
//! - [`DetectorAugmenter`] - Per-layer detector parameter augmentation
//!
//! ## Preprocessing
//! - [`DatasetSplits`] - Seeded train/val/test partitioning
//! - [`NormalizationParams`] - Train-only z-score transform
//!
//! ## Batch Processing
//! - [`BatchProcessor`] - Multi-shard processing with progress reporting
//! - [`Dataset`] - Fully assembled, normalized splits
//!
//! ## Export
//! - [`DatasetExporter`] - NumPy + metadata export

// ============================================================================
// Core Pipeline
// ============================================================================

pub use crate::builder::ExtractionBuilder;
pub use crate::config::{DataConfig, ExperimentMetadata, ExtractionConfig};
pub use crate::pipeline::{ExtractionPipeline, ExtractionStats, FileOutput, SequenceLengthSummary};

// ============================================================================
// Events & Store
// ============================================================================

pub use crate::event::{
    columns, CellTable, DetectorRegion, Event, LayerKey, Track, TrackProjection, Vertex,
};
pub use crate::store::{shard_file_name, EventStore};

// ============================================================================
// Geometry
// ============================================================================

pub use crate::geometry::{delta_phi, delta_r, wrap_delta_phi};

// ============================================================================
// Matching & Filtering
// ============================================================================

pub use crate::filtering::{
    CellFilterChain, FieldCondition, FilterConfig, FilterDiagnostics, FilterOutcome,
    FilterStatistics,
};
pub use crate::matching::{MatchResult, MatcherConfig, TrackMatcher, UNMATCHED_DELTA_R};

// ============================================================================
// Schema (Feature Definitions & Presets)
// ============================================================================

pub use crate::schema::{
    CellFeatureDef, CellSchema, CellSchemaBuilder, FeatureCategory, Preset, PresetConfig,
    SCHEMA_VERSION,
};

// ============================================================================
// Sequence Building
// ============================================================================

pub use crate::sequence_builder::{
    enhanced_feature_count, BuildDiagnostics, CellSequence, DetectorAugmenter,
    DetectorParamsConfig, EventSequenceBuilder, FeatureVec, SequenceConfig, PARAM_WIDTH,
};

// ============================================================================
// Preprocessing (Splitting & Normalization)
// ============================================================================

pub use crate::preprocessing::{
    DatasetSplits, NormalizationConfig, NormalizationParams, SplitConfig, StatsAccumulator,
    VERTEX_FEATURE_COUNT,
};

// ============================================================================
// Packing
// ============================================================================

pub use crate::packing::{BatchPacker, PackedBatch, PackerConfig};

// ============================================================================
// Batch Processing
// ============================================================================

pub use crate::batch::{
    process_shards_parallel, process_shards_with_threads, BatchConfig, BatchOutput,
    BatchProcessor, CancellationToken, ConsoleProgress, ErrorMode, FileError, ProgressCallback,
    ProgressInfo, ShardResult,
};

// ============================================================================
// Dataset Assembly & Export
// ============================================================================

pub use crate::dataset::{assembled_column_names, Dataset, PackedSplits};
pub use crate::export::{
    export_dataset, DatasetExporter, DatasetMetadata, ExportResult, SplitManifest,
};

// ============================================================================
// Validation
// ============================================================================

pub use crate::validation::{
    validate_event_numbers, SequenceValidator, ValidationConfig, ValidationLevel, ValidationResult,
};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::error::{ExtractError, Result};

// ============================================================================
// Type Aliases for Convenience
// ============================================================================

/// Feature matrix type (one row per cell)
pub type FeatureMatrix = Vec<Vec<f64>>;
