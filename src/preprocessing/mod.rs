//! Dataset preprocessing: splitting and normalization.
//!
//! Everything that happens between sequence building and batch packing:
//!
//! - **Splitting**: Seeded, reproducible train/val/test partitioning
//!   - Two-stage: holdout pool first, then val/test within the pool
//!   - Deterministic for a fixed (seed, N)
//!
//! - **Normalization**: Leakage-free z-scoring
//!   - Statistics from the training split only
//!   - Skip-list passthrough for categorical-like features
//!   - Independent statistics for auxiliary vertex features
//!   - Detector-parameter columns always raw
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::preprocessing::{
//!     DatasetSplits, NormalizationConfig, NormalizationParams, SplitConfig,
//! };
//!
//! let splits = DatasetSplits::partition(sequences.len(), &SplitConfig::default());
//! let mut train = DatasetSplits::gather(&sequences, &splits.train);
//! let mut val = DatasetSplits::gather(&sequences, &splits.val);
//!
//! let params = NormalizationParams::fit(&train, &schema, &NormalizationConfig::default());
//! params.apply(&mut train);
//! params.apply(&mut val);
//! ```

pub mod normalization;
pub mod splitting;

// Re-export commonly used types for convenience
pub use normalization::{
    NormalizationConfig, NormalizationParams, StatsAccumulator, VERTEX_FEATURE_COUNT,
};
pub use splitting::{DatasetSplits, SplitConfig};
