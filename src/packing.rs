//! Batch packing with per-batch padding.
//!
//! Chunks sequences into batches and zero-pads each batch to the **longest
//! sequence in that batch**, not a global maximum — consecutive batches may
//! have different padded widths. Positions past a sequence's true length are
//! all-zero rows; the true lengths ride along so consumers can mask them out
//! (the packer provides the zeros, honoring them is the consumer's contract).
//!
//! Optionally sorts sequences by length before chunking, which groups
//! similar lengths together and minimizes wasted padding.

use crate::error::{ExtractError, Result};
use crate::sequence_builder::CellSequence;
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Batch packing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    /// Sequences per batch (the final batch may be smaller).
    pub batch_size: usize,

    /// Sort by sequence length before chunking to reduce padding waste.
    pub sort_by_length: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            sort_by_length: false,
        }
    }
}

impl PackerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be positive".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Packed output
// ============================================================================

/// One zero-padded batch.
#[derive(Debug, Clone)]
pub struct PackedBatch {
    /// `[batch, padded_len, feature_width]`; rows past a sequence's true
    /// length are all zeros.
    pub features: Array3<f64>,

    /// `[batch, vertex_width]` auxiliary features.
    pub vertex_features: Array2<f64>,

    /// `[batch]` prediction targets.
    pub vertex_times: Array1<f64>,

    /// True (unpadded) sequence lengths, batch order.
    pub lengths: Vec<usize>,

    /// Source event numbers, batch order.
    pub event_numbers: Vec<i64>,
}

impl PackedBatch {
    /// Number of sequences in this batch.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Padded sequence length of this batch.
    pub fn padded_len(&self) -> usize {
        self.features.shape()[1]
    }
}

// ============================================================================
// Packer
// ============================================================================

/// Packs sequences into zero-padded batches.
#[derive(Debug, Clone)]
pub struct BatchPacker {
    config: PackerConfig,
}

impl BatchPacker {
    pub fn new(config: PackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    /// Pack a split into batches.
    ///
    /// All sequences must share one feature width (rows widened by detector
    /// params included); a mismatch is a shape error.
    pub fn pack(&self, sequences: &[CellSequence]) -> Result<Vec<PackedBatch>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let width = sequences[0].feature_count();
        let vertex_width = sequences[0].vertex_features.len();
        for seq in sequences {
            if seq.feature_count() != width {
                return Err(ExtractError::Shape(format!(
                    "event {}: feature width {} differs from {}",
                    seq.event_number,
                    seq.feature_count(),
                    width
                )));
            }
            if seq.vertex_features.len() != vertex_width {
                return Err(ExtractError::Shape(format!(
                    "event {}: vertex width {} differs from {}",
                    seq.event_number,
                    seq.vertex_features.len(),
                    vertex_width
                )));
            }
        }

        let mut order: Vec<usize> = (0..sequences.len()).collect();
        if self.config.sort_by_length {
            // Stable, so equal lengths keep their incoming order.
            order.sort_by_key(|&i| sequences[i].len());
        }

        let batches = order
            .chunks(self.config.batch_size)
            .map(|chunk| pack_one(sequences, chunk, width, vertex_width))
            .collect();
        Ok(batches)
    }
}

fn pack_one(
    sequences: &[CellSequence],
    chunk: &[usize],
    width: usize,
    vertex_width: usize,
) -> PackedBatch {
    let max_len = chunk
        .iter()
        .map(|&i| sequences[i].len())
        .max()
        .unwrap_or(0);

    let mut features = Array3::zeros((chunk.len(), max_len, width));
    let mut vertex_features = Array2::zeros((chunk.len(), vertex_width));
    let mut vertex_times = Array1::zeros(chunk.len());
    let mut lengths = Vec::with_capacity(chunk.len());
    let mut event_numbers = Vec::with_capacity(chunk.len());

    for (row, &idx) in chunk.iter().enumerate() {
        let seq = &sequences[idx];
        for (cell, values) in seq.features.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                features[[row, cell, col]] = value;
            }
        }
        for (col, &value) in seq.vertex_features.iter().enumerate() {
            vertex_features[[row, col]] = value;
        }
        vertex_times[row] = seq.vertex_time;
        lengths.push(seq.len());
        event_numbers.push(seq.event_number);
    }

    PackedBatch {
        features,
        vertex_features,
        vertex_times,
        lengths,
        event_numbers,
    }
}
