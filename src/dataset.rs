//! Dataset assembly: shards → sequences → normalized splits.
//!
//! This module turns extracted sequences into ML-ready training data,
//! chaining the preprocessing stages in their required order:
//!
//! 1. Batch-process every shard in the data directory
//! 2. Augment rows with per-layer detector parameters (when configured)
//! 3. Split into train/val/test with the seeded partitioner
//! 4. Fit normalization statistics on the **training split only**
//! 5. Apply the fitted transform to all three splits
//!
//! Detector parameters are appended before the split so all splits carry
//! them, but the normalizer never touches those columns or learns from
//! them; its statistics cover the schema-width prefix of each row.
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::dataset::Dataset;
//!
//! let dataset = Dataset::assemble(&config)?;
//! println!(
//!     "train/val/test = {}/{}/{}",
//!     dataset.train.len(),
//!     dataset.val.len(),
//!     dataset.test.len()
//! );
//!
//! // Pack for training
//! let packed = dataset.pack()?;
//! ```

use crate::batch::{BatchConfig, BatchProcessor, ErrorMode};
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::packing::{BatchPacker, PackedBatch};
use crate::pipeline::{ExtractionStats, SequenceLengthSummary};
use crate::preprocessing::{DatasetSplits, NormalizationParams};
use crate::schema::Preset;
use crate::sequence_builder::{enhanced_feature_count, CellSequence, DetectorAugmenter};

// ============================================================================
// Dataset
// ============================================================================

/// A fully preprocessed dataset: three normalized splits plus everything a
/// consumer needs to interpret (or undo) the preprocessing.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Training split (normalization was fitted here)
    pub train: Vec<CellSequence>,

    /// Validation split
    pub val: Vec<CellSequence>,

    /// Test split
    pub test: Vec<CellSequence>,

    /// Fitted normalization parameters, reusable at inference time
    pub normalization: NormalizationParams,

    /// Attrition counters from extraction
    pub stats: ExtractionStats,

    /// Schema feature names (detector-parameter columns are unnamed)
    pub feature_names: Vec<String>,

    /// Full row width, including detector parameters when enabled
    pub feature_count: usize,

    /// Batch size and ordering used by [`Dataset::pack`]
    packing: crate::packing::PackerConfig,
}

impl Dataset {
    /// Process every shard in the configured data directory and assemble
    /// the dataset.
    ///
    /// Shard failures are contained: a shard that cannot be read is logged
    /// and skipped, and the assembly fails only when no shard was usable.
    pub fn assemble(config: &ExtractionConfig) -> Result<Dataset> {
        let batch_config = BatchConfig::new().with_error_mode(ErrorMode::CollectErrors);
        let processor = BatchProcessor::new(config.clone(), batch_config)?;
        let output = processor.process_all()?;

        let stats = output.merged_stats();
        log::info!("{stats}");

        let sequences = output.into_sequences();
        if let Some(lengths) = SequenceLengthSummary::from_sequences(&sequences) {
            log::info!("{lengths}");
        }

        Self::from_sequences(sequences, stats, config)
    }

    /// Assemble a dataset from already-extracted sequences.
    ///
    /// Deterministic: the same sequences in the same order with the same
    /// config produce identical splits and statistics.
    pub fn from_sequences(
        mut sequences: Vec<CellSequence>,
        stats: ExtractionStats,
        config: &ExtractionConfig,
    ) -> Result<Dataset> {
        let schema = config.schema();

        if let Some(detector_config) = &config.detector_params {
            let augmenter = DetectorAugmenter::new(detector_config, &schema)?;
            augmenter.augment_all(&mut sequences);
        }

        let splits = DatasetSplits::partition(sequences.len(), &config.split);
        let (mut train, mut val, mut test) = split_sequences(sequences, &splits);

        let normalization = NormalizationParams::fit(&train, &schema, &config.normalization);
        normalization.apply(&mut train);
        normalization.apply(&mut val);
        normalization.apply(&mut test);

        log::debug!(
            "dataset assembled: {}/{}/{} train/val/test sequences",
            train.len(),
            val.len(),
            test.len()
        );

        Ok(Dataset {
            train,
            val,
            test,
            normalization,
            stats,
            feature_names: schema.feature_names().iter().map(|s| s.to_string()).collect(),
            feature_count: enhanced_feature_count(&schema, config.use_detector_params()),
            packing: config.packing.clone(),
        })
    }

    /// Sequences across all splits.
    pub fn total_sequences(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// (train, val, test) sizes.
    pub fn split_sizes(&self) -> (usize, usize, usize) {
        (self.train.len(), self.val.len(), self.test.len())
    }

    /// Length distribution across all splits (padding-free lengths).
    pub fn length_summary(&self) -> Option<SequenceLengthSummary> {
        SequenceLengthSummary::from_lengths(
            self.train
                .iter()
                .chain(&self.val)
                .chain(&self.test)
                .map(|s| s.len()),
        )
    }

    /// Pack each split into padded batches with the configured batch size.
    pub fn pack(&self) -> Result<PackedSplits> {
        let packer = BatchPacker::new(self.packing.clone());
        Ok(PackedSplits {
            train: packer.pack(&self.train)?,
            val: packer.pack(&self.val)?,
            test: packer.pack(&self.test)?,
        })
    }
}

/// Routed sequences, consumed out of the flat extraction order.
fn split_sequences(
    sequences: Vec<CellSequence>,
    splits: &DatasetSplits,
) -> (Vec<CellSequence>, Vec<CellSequence>, Vec<CellSequence>) {
    // gather() clones, so route each sequence to its split by index instead;
    // sequences can be large and belong to exactly one split.
    let mut slots: Vec<Option<CellSequence>> = sequences.into_iter().map(Some).collect();
    let mut take = |indices: &[usize]| -> Vec<CellSequence> {
        indices
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect()
    };
    let train = take(&splits.train);
    let val = take(&splits.val);
    let test = take(&splits.test);
    (train, val, test)
}

/// Padded batches for all three splits.
#[derive(Debug, Clone)]
pub struct PackedSplits {
    pub train: Vec<PackedBatch>,
    pub val: Vec<PackedBatch>,
    pub test: Vec<PackedBatch>,
}

impl PackedSplits {
    /// Total number of batches.
    pub fn batch_count(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

// ============================================================================
// Feature name helper
// ============================================================================

/// Names for every column of an assembled row, detector parameters included.
///
/// Detector-parameter columns get positional names ("det_param_0"..) since
/// the source table has no names for them.
pub fn assembled_column_names(config: &ExtractionConfig) -> Vec<String> {
    let schema = Preset::for_spatial(config.data.use_spatial_features).build_schema();
    let mut names: Vec<String> = schema.feature_names().iter().map(|s| s.to_string()).collect();
    if config.use_detector_params() {
        for i in 0..crate::sequence_builder::PARAM_WIDTH {
            names.push(format!("det_param_{i}"));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence_builder::{DetectorParamsConfig, FeatureVec, PARAM_WIDTH};
    use std::sync::Arc;

    /// Synthetic standard-schema sequence with deterministic values.
    fn sequence(event_number: i64, cells: usize) -> CellSequence {
        let features: Vec<FeatureVec> = (0..cells)
            .map(|i| {
                let base = event_number as f64 + i as f64 * 0.1;
                Arc::new(vec![
                    base * 0.01, // eta
                    base * 0.02, // phi
                    1.0,         // is_barrel
                    2.0,         // layer
                    base * 0.5,  // time
                    base,        // energy
                    4.0,         // significance
                    base * 2.0,  // matched_track_pt
                    0.01,        // matched_track_delta_r
                ])
            })
            .collect();
        CellSequence {
            event_number,
            features,
            vertex_features: vec![0.0, 0.0, 0.0],
            vertex_time: event_number as f64,
        }
    }

    fn sequences(n: usize) -> Vec<CellSequence> {
        (0..n).map(|i| sequence(i as i64, 5)).collect()
    }

    #[test]
    fn test_split_sizes_follow_config() {
        let config = ExtractionConfig::default();
        let dataset =
            Dataset::from_sequences(sequences(100), ExtractionStats::default(), &config).unwrap();

        // 30% holdout, a third of it validation
        assert_eq!(dataset.split_sizes(), (70, 10, 20));
        assert_eq!(dataset.total_sequences(), 100);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let config = ExtractionConfig::default();
        let a = Dataset::from_sequences(sequences(50), ExtractionStats::default(), &config)
            .unwrap();
        let b = Dataset::from_sequences(sequences(50), ExtractionStats::default(), &config)
            .unwrap();

        let ids = |split: &[CellSequence]| -> Vec<i64> {
            split.iter().map(|s| s.event_number).collect()
        };
        assert_eq!(ids(&a.train), ids(&b.train));
        assert_eq!(ids(&a.val), ids(&b.val));
        assert_eq!(ids(&a.test), ids(&b.test));
        assert_eq!(a.normalization, b.normalization);
    }

    #[test]
    fn test_splits_are_disjoint_and_exhaustive() {
        let config = ExtractionConfig::default();
        let dataset =
            Dataset::from_sequences(sequences(40), ExtractionStats::default(), &config).unwrap();

        let mut all: Vec<i64> = dataset
            .train
            .iter()
            .chain(&dataset.val)
            .chain(&dataset.test)
            .map(|s| s.event_number)
            .collect();
        all.sort_unstable();
        let expected: Vec<i64> = (0..40).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_normalized_train_energy_is_standard() {
        let config = ExtractionConfig::default();
        let dataset =
            Dataset::from_sequences(sequences(60), ExtractionStats::default(), &config).unwrap();

        let energy_idx = 5;
        let values: Vec<f64> = dataset
            .train
            .iter()
            .flat_map(|s| s.features.iter().map(move |r| r[energy_idx]))
            .collect();
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        let var: f64 =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var.sqrt() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_detector_params_present_in_all_splits() {
        let config = ExtractionConfig::default().with_detector_params(
            DetectorParamsConfig {
                emb1: Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
                ..DetectorParamsConfig::default()
            },
        );
        let dataset =
            Dataset::from_sequences(sequences(20), ExtractionStats::default(), &config).unwrap();

        assert_eq!(dataset.feature_count, 9 + PARAM_WIDTH);
        for split in [&dataset.train, &dataset.val, &dataset.test] {
            for seq in split.iter() {
                for row in &seq.features {
                    assert_eq!(row.len(), 9 + PARAM_WIDTH);
                }
            }
        }
        // Layer EMB2 has no configured params, so the tail stays zero, and
        // normalization must not have shifted it.
        let row = &dataset.train[0].features[0];
        assert_eq!(&row[9..], &[0.0; PARAM_WIDTH]);
    }

    #[test]
    fn test_pack_produces_batches() {
        let mut config = ExtractionConfig::default();
        config.packing.batch_size = 16;
        let dataset =
            Dataset::from_sequences(sequences(100), ExtractionStats::default(), &config).unwrap();

        let packed = dataset.pack().unwrap();
        // 70 train sequences at batch size 16 -> 5 batches.
        assert_eq!(packed.train.len(), 5);
        assert_eq!(packed.train[0].len(), 16);
        assert!(packed.batch_count() >= 7);
    }

    #[test]
    fn test_empty_input_yields_empty_dataset() {
        let config = ExtractionConfig::default();
        let dataset =
            Dataset::from_sequences(Vec::new(), ExtractionStats::default(), &config).unwrap();
        assert_eq!(dataset.total_sequences(), 0);
        assert!(dataset.length_summary().is_none());
        // Identity transform fitted on nothing.
        assert!(dataset.normalization.stds.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_length_summary_spans_all_splits() {
        let config = ExtractionConfig::default();
        let input: Vec<CellSequence> = (0..12)
            .map(|i| sequence(i as i64, 3 + (i as usize % 4)))
            .collect();
        let dataset =
            Dataset::from_sequences(input, ExtractionStats::default(), &config).unwrap();

        let summary = dataset.length_summary().unwrap();
        assert_eq!(summary.count, 12);
        assert_eq!(summary.min, 3);
        assert_eq!(summary.max, 6);
        assert!((summary.mean - 4.5).abs() < 1e-12);
        assert_eq!(summary.most_common, vec![(3, 3), (4, 3), (5, 3), (6, 3)]);
    }

    #[test]
    fn test_assembled_column_names() {
        let config = ExtractionConfig::default()
            .with_detector_params(DetectorParamsConfig::default());
        let names = assembled_column_names(&config);
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "eta");
        assert_eq!(names[9], "det_param_0");
    }
}
