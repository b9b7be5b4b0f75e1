//! Seeded train/val/test partitioning.
//!
//! Splits event indices into three disjoint, exhaustive sets with a
//! two-stage scheme: first `test_fraction` of all indices is split off as a
//! holdout pool, then `val_fraction` *of that pool* becomes validation and
//! the remainder test. With the defaults (0.3, 1/3) the final proportions
//! are 70% / 10% / 20%.
//!
//! The partition is a pure function of (seed, N): repeated invocations with
//! the same configuration reproduce the same sets exactly, so experiments
//! remain comparable across runs.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Dataset splitting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of all events split off as the val+test holdout pool.
    pub test_fraction: f64,

    /// Fraction *of the holdout pool* used for validation; the rest is test.
    pub val_fraction: f64,

    /// RNG seed for the shuffle.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            val_fraction: 1.0 / 3.0,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            ));
        }
        if !(self.val_fraction > 0.0 && self.val_fraction < 1.0) {
            return Err(format!(
                "val_fraction must be in (0, 1), got {}",
                self.val_fraction
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Splits
// ============================================================================

/// Disjoint, exhaustive index sets over `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl DatasetSplits {
    /// Total number of indices across the three sets.
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Partition `0..n` according to the configuration.
    pub fn partition(n: usize, config: &SplitConfig) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
        indices.shuffle(&mut rng);

        // Stage 1: holdout pool off the front of the shuffle.
        let holdout_len = (n as f64 * config.test_fraction).round() as usize;
        let holdout_len = holdout_len.min(n);
        let (holdout, train) = indices.split_at(holdout_len);

        // Stage 2: validation out of the pool, remainder is test.
        let val_len = (holdout.len() as f64 * config.val_fraction).round() as usize;
        let (val, test) = holdout.split_at(val_len.min(holdout.len()));

        DatasetSplits {
            train: train.to_vec(),
            val: val.to_vec(),
            test: test.to_vec(),
        }
    }

    /// Gather the elements of `items` selected by an index set.
    pub fn gather<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
        indices.iter().map(|&i| items[i].clone()).collect()
    }
}
