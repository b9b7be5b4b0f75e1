//! Cell Sequence Extractor
//!
//! High-performance calorimeter cell sequence extraction for deep learning models.
//!
//! # Overview
//!
//! This library provides a modular extraction pipeline that turns raw detector
//! events into ML-ready datasets. Per event it:
//!
//! - **Matches** calorimeter cells to reconstructed tracks by angular distance
//! - **Filters** cells through a configurable AND-predicate chain
//! - **Builds** fixed-maximum-length sequences ranked by a selection feature
//! - **Splits** events into reproducible train/val/test sets
//! - **Normalizes** features with train-only statistics
//! - **Packs** sequences into zero-padded batches
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Cell Sequence Extractor                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  store/            - JSON event shard discovery and parsing    │
//! │  matching/         - ΔR cell↔track association                 │
//! │  filtering/        - AND-predicate cell selection              │
//! │  sequence_builder/ - Ranked sequences + detector params        │
//! │  preprocessing/    - Splitting and normalization               │
//! │  packing/          - Zero-padded batch assembly                │
//! │  export/           - NumPy export for Python/PyTorch           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::{Dataset, ExtractionConfig};
//! use cell_sequence_extractor::export::DatasetExporter;
//!
//! // Extract, split, normalize, in one step
//! let config = ExtractionConfig::load_toml("extraction.toml")?;
//! let dataset = Dataset::assemble(&config)?;
//!
//! // Write .npy arrays + metadata for training
//! DatasetExporter::new("output/run1").export(&dataset)?;
//! ```

pub mod batch;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod event;
pub mod export;
pub mod filtering;
pub mod geometry;
pub mod matching;
pub mod packing;
pub mod pipeline;
pub mod prelude;
pub mod preprocessing;
pub mod schema;
pub mod sequence_builder;
pub mod store;
pub mod validation;

// Re-exports - Error Handling
pub use error::{ExtractError, Result};

// Re-exports - Events
pub use event::{
    CellTable, DetectorRegion, Event, LayerKey, Track, TrackProjection, Vertex,
};

// Re-exports - Schema
pub use schema::{CellFeatureDef, CellSchema, CellSchemaBuilder, FeatureCategory, Preset};

// Re-exports - Config
pub use builder::ExtractionBuilder;
pub use config::{DataConfig, ExperimentMetadata, ExtractionConfig};

// Re-exports - Matching & Filtering
pub use filtering::{CellFilterChain, FieldCondition, FilterConfig, FilterOutcome};
pub use matching::{MatcherConfig, TrackMatcher};

// Re-exports - Sequence Building
pub use sequence_builder::{
    CellSequence, DetectorAugmenter, DetectorParamsConfig, EventSequenceBuilder, FeatureVec,
    SequenceConfig,
};

// Re-exports - Preprocessing
pub use preprocessing::{
    DatasetSplits, NormalizationConfig, NormalizationParams, SplitConfig, StatsAccumulator,
};

// Re-exports - Packing
pub use packing::{BatchPacker, PackedBatch, PackerConfig};

// Re-exports - Pipeline
pub use pipeline::{ExtractionPipeline, ExtractionStats, FileOutput, SequenceLengthSummary};
pub use store::EventStore;

// Re-exports - Batch Processing
pub use batch::{
    BatchConfig, BatchOutput, BatchProcessor, CancellationToken, ConsoleProgress, ErrorMode,
    FileError, ProgressCallback, ProgressInfo, ShardResult,
};

// Re-exports - Dataset Assembly & Export
pub use dataset::{Dataset, PackedSplits};
pub use export::{DatasetExporter, ExportResult};

// Re-exports - Validation
pub use validation::{
    validate_event_numbers, SequenceValidator, ValidationConfig, ValidationLevel, ValidationResult,
};
