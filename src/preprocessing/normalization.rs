//! Feature normalization without leakage.
//!
//! Z-scores cell and vertex features using statistics computed from the
//! **training split only**, then applies the same affine transform to all
//! three splits. No statistic is ever derived from validation or test data;
//! that is the central invariant of this module.
//!
//! # Strategy
//!
//! Per cell feature:
//! ```text
//! normalized = (x - mean) / std
//! ```
//! with mean and std taken over every cell of every training sequence
//! (flattened across cells, not per-sequence).
//!
//! - **Zero-guard**: a feature with zero spread gets std = 1, making its
//!   transform shift-only.
//! - **Skip-list**: configured features get (mean, std) = (0, 1)
//!   unconditionally — raw passthrough for angular and categorical-like
//!   fields that z-scoring would distort.
//! - **Vertex features**: normalized independently with their own per-column
//!   statistics, computed the same way over training events.
//! - **Detector-parameter columns**: never normalized. They sit past the
//!   schema width and pass through raw regardless of the skip-list; they are
//!   calibration constants, not measurements.
//!
//! # Invertibility
//!
//! The fitted [`NormalizationParams`] is serializable and invertible
//! (`x = z * std + mean`); consumers persist it alongside trained artifacts
//! to map model-space values back to physical units.
//!
//! # Performance
//!
//! Fitting is a sum/sum-of-squares reduction over the training partition.
//! With the `parallel` feature it runs as a rayon fold+reduce over
//! sequences; the accumulators merge exactly, so the parallel result equals
//! the serial one.

use crate::schema::CellSchema;
use crate::sequence_builder::CellSequence;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// Configuration
// ============================================================================

/// Normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Features excluded from z-scoring (raw passthrough).
    pub skip_normalization: Vec<String>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            skip_normalization: vec![
                "time".to_string(),
                "is_barrel".to_string(),
                "layer".to_string(),
            ],
        }
    }
}

impl NormalizationConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        for name in &self.skip_normalization {
            if name.is_empty() {
                return Err("skip_normalization contains an empty feature name".to_string());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Statistics accumulation
// ============================================================================

/// Sum / sum-of-squares accumulator for one feature.
///
/// Mergeable, so per-sequence partial accumulators can be reduced in any
/// order (serial loop or parallel fold) with identical results.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsAccumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl StatsAccumulator {
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn merge(&mut self, other: &StatsAccumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population standard deviation, floored at zero against rounding.
    pub fn std(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.sum_sq / self.count as f64 - mean * mean;
        var.max(0.0).sqrt()
    }
}

/// Partial accumulators for one training sequence: schema-width cell
/// features plus the vertex columns.
#[derive(Debug, Clone)]
struct PartialStats {
    cells: Vec<StatsAccumulator>,
    vertex: Vec<StatsAccumulator>,
}

impl PartialStats {
    fn new(feature_count: usize, vertex_count: usize) -> Self {
        Self {
            cells: vec![StatsAccumulator::default(); feature_count],
            vertex: vec![StatsAccumulator::default(); vertex_count],
        }
    }

    fn observe(&mut self, sequence: &CellSequence) {
        for row in &sequence.features {
            // Rows may be wider than the schema (detector params); only the
            // schema-width prefix contributes statistics.
            for (acc, &value) in self.cells.iter_mut().zip(row.iter()) {
                acc.update(value);
            }
        }
        for (acc, &value) in self.vertex.iter_mut().zip(&sequence.vertex_features) {
            acc.update(value);
        }
    }

    fn merge(mut self, other: PartialStats) -> PartialStats {
        for (acc, o) in self.cells.iter_mut().zip(&other.cells) {
            acc.merge(o);
        }
        for (acc, o) in self.vertex.iter_mut().zip(&other.vertex) {
            acc.merge(o);
        }
        self
    }
}

// ============================================================================
// Fitted parameters
// ============================================================================

/// Number of auxiliary vertex features per event.
pub const VERTEX_FEATURE_COUNT: usize = 3;

/// The fitted affine transform: serializable, invertible, train-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    /// Schema feature names, index-aligned with `means` / `stds`.
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,

    /// Per-column statistics for the auxiliary vertex features.
    pub vertex_means: Vec<f64>,
    pub vertex_stds: Vec<f64>,

    /// Features that were skip-listed at fit time (passthrough).
    pub skipped_features: Vec<String>,
}

impl NormalizationParams {
    /// Fit parameters from the training split.
    ///
    /// `train` must be the training sequences only; handing this function a
    /// full dataset would leak statistics into evaluation.
    pub fn fit(
        train: &[CellSequence],
        schema: &CellSchema,
        config: &NormalizationConfig,
    ) -> NormalizationParams {
        let feature_count = schema.total_count();
        let totals = accumulate(train, feature_count);

        let (skip_indices, unknown) = schema.resolve_indices(&config.skip_normalization);
        if !unknown.is_empty() {
            log::warn!(
                "skip_normalization names not in schema, ignored: {}",
                unknown.join(", ")
            );
        }

        let mut means = Vec::with_capacity(feature_count);
        let mut stds = Vec::with_capacity(feature_count);
        for (idx, acc) in totals.cells.iter().enumerate() {
            if skip_indices.contains(&idx) {
                means.push(0.0);
                stds.push(1.0);
            } else {
                let std = acc.std();
                means.push(acc.mean());
                stds.push(if std > 0.0 { std } else { 1.0 });
            }
        }

        let vertex_means: Vec<f64> = totals.vertex.iter().map(StatsAccumulator::mean).collect();
        let vertex_stds: Vec<f64> = totals
            .vertex
            .iter()
            .map(|acc| {
                let std = acc.std();
                if std > 0.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        let feature_names: Vec<String> = schema
            .feature_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let skipped_features = skip_indices
            .iter()
            .map(|&idx| feature_names[idx].clone())
            .collect();

        NormalizationParams {
            feature_names,
            means,
            stds,
            vertex_means,
            vertex_stds,
            skipped_features,
        }
    }

    /// Width of the normalized (schema) portion of each cell row.
    pub fn feature_count(&self) -> usize {
        self.means.len()
    }

    /// Forward transform for one cell feature value.
    #[inline]
    pub fn normalize_value(&self, feature_idx: usize, value: f64) -> f64 {
        (value - self.means[feature_idx]) / self.stds[feature_idx]
    }

    /// Inverse transform for one cell feature value.
    #[inline]
    pub fn denormalize_value(&self, feature_idx: usize, value: f64) -> f64 {
        value * self.stds[feature_idx] + self.means[feature_idx]
    }

    /// Apply the transform to a split, in place.
    ///
    /// Columns past `feature_count()` (detector parameters) are untouched.
    pub fn apply(&self, sequences: &mut [CellSequence]) {
        self.transform(sequences, false);
    }

    /// Undo the transform on a split, in place.
    pub fn invert(&self, sequences: &mut [CellSequence]) {
        self.transform(sequences, true);
    }

    fn transform(&self, sequences: &mut [CellSequence], inverse: bool) {
        let width = self.feature_count();
        for sequence in sequences.iter_mut() {
            for row in &mut sequence.features {
                let values = Arc::make_mut(row);
                for idx in 0..width.min(values.len()) {
                    values[idx] = if inverse {
                        self.denormalize_value(idx, values[idx])
                    } else {
                        self.normalize_value(idx, values[idx])
                    };
                }
            }
            for (idx, value) in sequence.vertex_features.iter_mut().enumerate() {
                let (mean, std) = (self.vertex_means[idx], self.vertex_stds[idx]);
                *value = if inverse {
                    *value * std + mean
                } else {
                    (*value - mean) / std
                };
            }
        }
    }
}

/// Reduce training sequences into total accumulators.
#[cfg(feature = "parallel")]
fn accumulate(train: &[CellSequence], feature_count: usize) -> PartialStats {
    train
        .par_iter()
        .fold(
            || PartialStats::new(feature_count, VERTEX_FEATURE_COUNT),
            |mut partial, sequence| {
                partial.observe(sequence);
                partial
            },
        )
        .reduce(
            || PartialStats::new(feature_count, VERTEX_FEATURE_COUNT),
            PartialStats::merge,
        )
}

#[cfg(not(feature = "parallel"))]
fn accumulate(train: &[CellSequence], feature_count: usize) -> PartialStats {
    let mut totals = PartialStats::new(feature_count, VERTEX_FEATURE_COUNT);
    for sequence in train {
        totals.observe(sequence);
    }
    totals
}
