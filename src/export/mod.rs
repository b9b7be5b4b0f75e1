//! Data Export Module
//!
//! Export assembled datasets to NumPy files for ML training.
//!
//! # Supported Formats
//!
//! - NumPy (.npy) - For Python/PyTorch integration
//! - JSON - For metadata and normalization parameters
//!
//! # Layout
//!
//! One directory per export, four arrays per split:
//!
//! ```text
//! output/
//! ├── train_cells.npy      [n, padded_len, width]  zero-padded sequences
//! ├── train_vertex.npy     [n, 3]                  auxiliary vertex features
//! ├── train_times.npy      [n]                     regression targets
//! ├── train_lengths.npy    [n]                     true lengths before padding
//! ├── val_*.npy, test_*.npy
//! ├── normalization.json   fitted transform, for inference-time reuse
//! └── metadata.json        shapes, feature names, attrition counters
//! ```
//!
//! Each split is padded to its own longest sequence; consumers mask with
//! `lengths` rather than assuming a shared padded length.
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::export::DatasetExporter;
//!
//! let exporter = DatasetExporter::new("output/run1");
//! let result = exporter.export(&dataset)?;
//! println!("wrote {} files to {}", result.files.len(), result.export_path.display());
//! ```

use crate::dataset::Dataset;
use crate::error::Result;
use crate::pipeline::ExtractionStats;
use crate::preprocessing::{NormalizationParams, VERTEX_FEATURE_COUNT};
use crate::schema::SCHEMA_VERSION;
use crate::sequence_builder::CellSequence;
use crate::ExtractError;
use ndarray::{Array1, Array2, Array3};
use ndarray_npy::WriteNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Shape summary for one exported split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitManifest {
    /// Split name ("train" / "val" / "test")
    pub name: String,

    /// Number of sequences
    pub sequences: usize,

    /// Padded sequence length (longest sequence in this split)
    pub padded_length: usize,
}

/// Metadata about an exported dataset.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Feature schema version
    pub schema_version: String,

    /// Schema feature names, in row order (detector parameters follow unnamed)
    pub feature_names: Vec<String>,

    /// Full row width, detector parameters included
    pub feature_count: usize,

    /// Per-split shapes
    pub splits: Vec<SplitManifest>,

    /// File holding the fitted normalization parameters
    pub normalization_file: String,

    /// Attrition counters from extraction
    pub extraction: ExtractionStats,

    /// Export timestamp
    pub export_timestamp: String,
}

/// Result of a dataset export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Directory everything was written to
    pub export_path: PathBuf,

    /// All files written, in write order
    pub files: Vec<PathBuf>,

    /// (train, val, test) sequence counts
    pub split_sizes: (usize, usize, usize),
}

/// NumPy dataset exporter.
///
/// Writes one assembled [`Dataset`] as the set of arrays a training loop
/// loads directly, plus JSON sidecars carrying everything needed to
/// interpret them or to normalize new data the same way.
pub struct DatasetExporter {
    output_dir: PathBuf,
}

impl DatasetExporter {
    /// Create a new exporter writing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Export all three splits plus metadata and normalization parameters.
    pub fn export(&self, dataset: &Dataset) -> Result<ExportResult> {
        fs::create_dir_all(&self.output_dir)?;

        let mut files = Vec::new();
        let mut splits = Vec::new();

        for (name, sequences) in [
            ("train", &dataset.train),
            ("val", &dataset.val),
            ("test", &dataset.test),
        ] {
            let manifest = self.export_split(name, sequences, dataset.feature_count, &mut files)?;
            splits.push(manifest);
        }

        files.push(self.export_normalization(&dataset.normalization)?);
        files.push(self.export_metadata(dataset, splits)?);

        Ok(ExportResult {
            export_path: self.output_dir.clone(),
            files,
            split_sizes: dataset.split_sizes(),
        })
    }

    /// Export one split as four aligned arrays.
    fn export_split(
        &self,
        name: &str,
        sequences: &[CellSequence],
        width: usize,
        files: &mut Vec<PathBuf>,
    ) -> Result<SplitManifest> {
        let n = sequences.len();
        let padded_length = sequences.iter().map(CellSequence::len).max().unwrap_or(0);

        // Zero-filled, so the padding rows need no separate pass.
        let mut cells = Array3::<f64>::zeros((n, padded_length, width));
        let mut vertex = Array2::<f64>::zeros((n, VERTEX_FEATURE_COUNT));
        let mut times = Array1::<f64>::zeros(n);
        let mut lengths = Array1::<u64>::zeros(n);

        for (i, sequence) in sequences.iter().enumerate() {
            for (j, row) in sequence.features.iter().enumerate() {
                if row.len() != width {
                    return Err(ExtractError::Shape(format!(
                        "{name} split: event {} row {} has width {}, expected {width}",
                        sequence.event_number,
                        j,
                        row.len()
                    )));
                }
                for (k, &value) in row.iter().enumerate() {
                    cells[[i, j, k]] = value;
                }
            }
            for (k, &value) in sequence
                .vertex_features
                .iter()
                .take(VERTEX_FEATURE_COUNT)
                .enumerate()
            {
                vertex[[i, k]] = value;
            }
            times[i] = sequence.vertex_time;
            lengths[i] = sequence.len() as u64;
        }

        files.push(self.write_array(&format!("{name}_cells.npy"), &cells)?);
        files.push(self.write_array(&format!("{name}_vertex.npy"), &vertex)?);
        files.push(self.write_array(&format!("{name}_times.npy"), &times)?);
        files.push(self.write_array(&format!("{name}_lengths.npy"), &lengths)?);

        println!(
            "✅ Exported {name}: {n} sequences [{n} × {padded_length} × {width}]"
        );

        Ok(SplitManifest {
            name: name.to_string(),
            sequences: n,
            padded_length,
        })
    }

    /// Write one array as .npy, returning the path written.
    fn write_array<A: WriteNpyExt>(&self, file_name: &str, array: &A) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let file = File::create(&path)?;
        array
            .write_npy(BufWriter::new(file))
            .map_err(|e| ExtractError::store(&path, e))?;
        Ok(path)
    }

    /// Write the fitted normalization parameters as JSON.
    fn export_normalization(&self, params: &NormalizationParams) -> Result<PathBuf> {
        let path = self.output_dir.join("normalization.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), params)?;
        println!("✅ Exported normalization: {}", path.display());
        Ok(path)
    }

    /// Write dataset metadata as JSON.
    fn export_metadata(&self, dataset: &Dataset, splits: Vec<SplitManifest>) -> Result<PathBuf> {
        let metadata = DatasetMetadata {
            schema_version: SCHEMA_VERSION.to_string(),
            feature_names: dataset.feature_names.clone(),
            feature_count: dataset.feature_count,
            splits,
            normalization_file: "normalization.json".to_string(),
            extraction: dataset.stats.clone(),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let path = self.output_dir.join("metadata.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &metadata)?;
        println!("✅ Exported metadata: {}", path.display());
        Ok(path)
    }
}

/// Convenience function for direct export.
pub fn export_dataset<P: AsRef<Path>>(dataset: &Dataset, output_dir: P) -> Result<ExportResult> {
    let exporter = DatasetExporter::new(output_dir);
    exporter.export(dataset)
}
