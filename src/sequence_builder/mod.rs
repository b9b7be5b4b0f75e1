//! Sequence generation from detector events.
//!
//! This module turns each event's filtered cells into a model-ready sequence:
//! ranked, truncated, rendered through the feature schema, and optionally
//! widened with per-layer detector parameters.
//!
//! # Architecture
//!
//! - **EventSequenceBuilder**: Rank, truncate, and render cells per event
//! - **SequenceConfig**: Ranking feature and length bounds
//! - **CellSequence**: Output structure with features and targets
//! - **DetectorAugmenter**: Optional per-layer calibration augmentation
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::schema::Preset;
//! use cell_sequence_extractor::sequence_builder::{EventSequenceBuilder, SequenceConfig};
//!
//! let builder = EventSequenceBuilder::new(
//!     SequenceConfig::default(),
//!     Preset::Standard.build_schema(),
//!     false,
//! );
//!
//! for event in events {
//!     let (maybe_sequence, diagnostics) = builder.build(&event, &event.cells);
//!     if let Some(seq) = maybe_sequence {
//!         sequences.push(seq);
//!     }
//! }
//! ```

mod augment;
mod builder;

// Re-export all public types
pub use augment::{
    enhanced_feature_count, DetectorAugmenter, DetectorParamsConfig, PARAM_WIDTH,
};
pub use builder::{
    BuildDiagnostics, CellSequence, EventSequenceBuilder, FeatureVec, SequenceConfig,
};
