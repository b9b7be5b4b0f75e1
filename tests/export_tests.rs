//! Export Integration Tests
//!
//! Shards on disk → assembled dataset → NumPy export → read-back
//! verification of every array and JSON sidecar.

use cell_sequence_extractor::prelude::*;
use ahash::AHashMap;
use ndarray::{Array1, Array2, Array3};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use tempfile::TempDir;

// ============================================================================
// Test Fixtures
// ============================================================================

fn hs_track(pt: f64) -> Track {
    let mut projections = AHashMap::new();
    projections.insert(
        LayerKey::new(DetectorRegion::Barrel, 2),
        TrackProjection { eta: 0.0, phi: 0.0 },
    );
    Track {
        pt,
        valid: true,
        from_hard_scatter: true,
        projections,
    }
}

/// Matched event with a cell count that varies by event number, so the
/// exported splits exercise real padding.
fn matched_event(event_number: i64) -> Event {
    let n = 3 + (event_number as usize % 5);
    let mut cells = CellTable::new();
    let etas: Vec<f64> = (0..n).map(|i| i as f64 * 0.001).collect();
    cells.insert_column(columns::ETA, etas).unwrap();
    cells.insert_column(columns::PHI, vec![0.0; n]).unwrap();
    cells.insert_column(columns::IS_BARREL, vec![1.0; n]).unwrap();
    cells.insert_column(columns::LAYER, vec![2.0; n]).unwrap();
    cells.insert_column(columns::TIME, vec![0.1; n]).unwrap();
    cells
        .insert_column(
            columns::ENERGY,
            (0..n).map(|i| event_number as f64 + i as f64).collect(),
        )
        .unwrap();
    cells
        .insert_column(columns::SIGNIFICANCE, vec![4.0; n])
        .unwrap();
    cells.insert_column(columns::VALID, vec![1.0; n]).unwrap();

    Event {
        event_number,
        truth_vertex: Vertex::new(0.1, -0.2, 10.0),
        reco_vertex: Vertex::new(0.1, -0.2, 10.5),
        vertex_time: event_number as f64 * 0.25,
        cells,
        tracks: vec![hs_track(5.0)],
    }
}

/// Assemble a dataset from `num_shards` shards of 12 events each.
fn assembled_dataset(data_dir: &TempDir, num_shards: usize) -> Dataset {
    for shard in 0..num_shards {
        let events: Vec<Event> = (0..12)
            .map(|i| matched_event((shard * 12 + i) as i64))
            .collect();
        let path = data_dir.path().join(shard_file_name(shard));
        EventStore::write_shard(&path, &events).unwrap();
    }

    let mut config = ExtractionConfig::default();
    config.data.data_dir = data_dir.path().to_string_lossy().to_string();
    config.data.num_files = num_shards;
    Dataset::assemble(&config).unwrap()
}

fn read_cells(dir: &TempDir, name: &str) -> Array3<f64> {
    let file = File::open(dir.path().join(name)).unwrap();
    ReadNpyExt::read_npy(file).unwrap()
}

fn read_lengths(dir: &TempDir, name: &str) -> Array1<u64> {
    let file = File::open(dir.path().join(name)).unwrap();
    ReadNpyExt::read_npy(file).unwrap()
}

// ============================================================================
// Array Round Trips
// ============================================================================

#[test]
fn test_exported_shapes_are_consistent() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 2);

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    for (name, split) in [
        ("train", &dataset.train),
        ("val", &dataset.val),
        ("test", &dataset.test),
    ] {
        let cells = read_cells(&out_dir, &format!("{name}_cells.npy"));
        let lengths = read_lengths(&out_dir, &format!("{name}_lengths.npy"));
        let file = File::open(out_dir.path().join(format!("{name}_vertex.npy"))).unwrap();
        let vertex: Array2<f64> = ReadNpyExt::read_npy(file).unwrap();
        let file = File::open(out_dir.path().join(format!("{name}_times.npy"))).unwrap();
        let times: Array1<f64> = ReadNpyExt::read_npy(file).unwrap();

        let max_len = split.iter().map(CellSequence::len).max().unwrap_or(0);
        assert_eq!(cells.shape(), &[split.len(), max_len, 9]);
        assert_eq!(vertex.shape(), &[split.len(), 3]);
        assert_eq!(times.len(), split.len());
        assert_eq!(lengths.len(), split.len());

        // True lengths account for every cell in the split.
        let total_cells: usize = split.iter().map(CellSequence::len).sum();
        assert_eq!(lengths.iter().sum::<u64>() as usize, total_cells);
    }
}

#[test]
fn test_exported_values_and_padding() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 2);

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    let cells = read_cells(&out_dir, "train_cells.npy");
    let lengths = read_lengths(&out_dir, "train_lengths.npy");
    let max_len = cells.shape()[1];

    for (i, seq) in dataset.train.iter().enumerate() {
        assert_eq!(lengths[i] as usize, seq.len());
        for (j, row) in seq.features.iter().enumerate() {
            for (k, &value) in row.iter().enumerate() {
                assert_eq!(cells[[i, j, k]], value);
            }
        }
        // Beyond the true length, rows are zero padding.
        for j in seq.len()..max_len {
            for k in 0..9 {
                assert_eq!(cells[[i, j, k]], 0.0);
            }
        }
    }
}

#[test]
fn test_exported_targets_match_sequences() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 2);

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    let file = File::open(out_dir.path().join("test_times.npy")).unwrap();
    let times: Array1<f64> = ReadNpyExt::read_npy(file).unwrap();
    let file = File::open(out_dir.path().join("test_vertex.npy")).unwrap();
    let vertex: Array2<f64> = ReadNpyExt::read_npy(file).unwrap();

    for (i, seq) in dataset.test.iter().enumerate() {
        assert_eq!(times[i], seq.vertex_time);
        for (k, &value) in seq.vertex_features.iter().enumerate() {
            assert_eq!(vertex[[i, k]], value);
        }
    }
}

// ============================================================================
// JSON Sidecars
// ============================================================================

#[test]
fn test_metadata_reflects_extraction() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 2);

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    let content = std::fs::read_to_string(out_dir.path().join("metadata.json")).unwrap();
    let metadata: DatasetMetadata = serde_json::from_str(&content).unwrap();

    assert_eq!(metadata.schema_version, SCHEMA_VERSION);
    assert_eq!(metadata.feature_count, 9);
    assert_eq!(metadata.feature_names, dataset.feature_names);
    assert_eq!(metadata.extraction.total_events, 24);
    assert_eq!(metadata.extraction.sequences_built(), 24);

    let (train, val, test) = dataset.split_sizes();
    assert_eq!(metadata.splits[0].sequences, train);
    assert_eq!(metadata.splits[1].sequences, val);
    assert_eq!(metadata.splits[2].sequences, test);
    assert!(!metadata.export_timestamp.is_empty());
}

#[test]
fn test_normalization_sidecar_matches_dataset() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 2);

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    let content = std::fs::read_to_string(out_dir.path().join("normalization.json")).unwrap();
    let params: NormalizationParams = serde_json::from_str(&content).unwrap();
    assert_eq!(params, dataset.normalization);

    // The reloaded transform restores raw values from normalized ones.
    let mut restored = vec![dataset.train[0].clone()];
    params.invert(&mut restored);
    let energy_idx = 5;
    let raw_energy = restored[0].features[0][energy_idx];
    assert!(raw_energy.is_finite());
    // Fixture energies are event_number + cell index, all non-negative.
    assert!(raw_energy >= 0.0);
}

// ============================================================================
// Edge Cases
// ============================================================================

#[test]
fn test_convenience_export_creates_nested_dirs() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let dataset = assembled_dataset(&data_dir, 1);

    let nested = out_dir.path().join("runs").join("v1");
    let result = export_dataset(&dataset, &nested).unwrap();

    assert_eq!(result.export_path, nested);
    assert_eq!(result.files.len(), 14);
    assert!(nested.join("train_cells.npy").exists());
    assert!(nested.join("metadata.json").exists());
}

#[test]
fn test_empty_split_round_trip() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    // 3 events: 2 train / 0 val / 1 test under the default split.
    let events: Vec<Event> = (0..3).map(|i| matched_event(i as i64)).collect();
    let path = data_dir.path().join(shard_file_name(0));
    EventStore::write_shard(&path, &events).unwrap();

    let mut config = ExtractionConfig::default();
    config.data.data_dir = data_dir.path().to_string_lossy().to_string();
    config.data.num_files = 1;
    let dataset = Dataset::assemble(&config).unwrap();
    assert!(dataset.val.is_empty());

    DatasetExporter::new(out_dir.path()).export(&dataset).unwrap();

    let cells = read_cells(&out_dir, "val_cells.npy");
    assert_eq!(cells.shape(), &[0, 0, 9]);

    let content = std::fs::read_to_string(out_dir.path().join("metadata.json")).unwrap();
    let metadata: DatasetMetadata = serde_json::from_str(&content).unwrap();
    assert_eq!(metadata.splits[1].sequences, 0);
    assert_eq!(metadata.splits[1].padded_length, 0);
}
