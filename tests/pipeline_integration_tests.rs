//! Pipeline Integration Tests
//!
//! End-to-end coverage of the extraction pipeline over real shard files:
//!
//! 1. Shards on disk → assembled, normalized dataset
//! 2. Attrition accounting (vertex gate, min-cells, filtering)
//! 3. Ranking, truncation, and match-sentinel semantics
//! 4. Determinism of splits and invertibility of normalization

use cell_sequence_extractor::prelude::*;
use ahash::AHashMap;
use tempfile::TempDir;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Hard-scatter track with one projection on the EMB2 layer.
fn hs_track(pt: f64, eta: f64, phi: f64) -> Track {
    let mut projections = AHashMap::new();
    projections.insert(
        LayerKey::new(DetectorRegion::Barrel, 2),
        TrackProjection { eta, phi },
    );
    Track {
        pt,
        valid: true,
        from_hard_scatter: true,
        projections,
    }
}

/// Event with the given per-cell energies, every cell valid, on EMB2, and
/// within matching range of one hard-scatter track at (0, 0).
fn event_with_energies(event_number: i64, energies: Vec<f64>) -> Event {
    let n = energies.len();
    let mut cells = CellTable::new();
    let etas: Vec<f64> = (0..n).map(|i| i as f64 * 0.001).collect();
    cells.insert_column(columns::ETA, etas).unwrap();
    cells.insert_column(columns::PHI, vec![0.0; n]).unwrap();
    cells.insert_column(columns::IS_BARREL, vec![1.0; n]).unwrap();
    cells.insert_column(columns::LAYER, vec![2.0; n]).unwrap();
    cells.insert_column(columns::TIME, vec![0.1; n]).unwrap();
    cells.insert_column(columns::ENERGY, energies).unwrap();
    cells
        .insert_column(columns::SIGNIFICANCE, vec![4.0; n])
        .unwrap();
    cells.insert_column(columns::VALID, vec![1.0; n]).unwrap();

    Event {
        event_number,
        truth_vertex: Vertex::new(0.0, 0.0, 10.0),
        reco_vertex: Vertex::new(0.0, 0.0, 10.5),
        vertex_time: event_number as f64 * 0.1,
        cells,
        tracks: vec![hs_track(5.0, 0.0, 0.0)],
    }
}

/// Fully matched event with `n` cells of distinct energies.
fn matched_event(event_number: i64, n: usize) -> Event {
    event_with_energies(event_number, (0..n).map(|i| i as f64 + 1.0).collect())
}

/// Write `events_per_shard` events into each of `num_shards` shards.
fn write_shards(dir: &TempDir, num_shards: usize, events_per_shard: usize) {
    for shard in 0..num_shards {
        let events: Vec<Event> = (0..events_per_shard)
            .map(|i| matched_event((shard * events_per_shard + i) as i64, 8))
            .collect();
        let path = dir.path().join(shard_file_name(shard));
        EventStore::write_shard(&path, &events).unwrap();
    }
}

fn config_for(dir: &TempDir, num_files: usize) -> ExtractionConfig {
    let mut config = ExtractionConfig::default();
    config.data.data_dir = dir.path().to_string_lossy().to_string();
    config.data.num_files = num_files;
    config
}

// ============================================================================
// End-to-End Extraction
// ============================================================================

#[test]
fn test_shards_to_dataset() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 3, 10);

    let config = config_for(&dir, 3);
    let dataset = Dataset::assemble(&config).unwrap();

    assert_eq!(dataset.total_sequences(), 30);
    // 30% holdout of 30 = 9, a third of it validation.
    assert_eq!(dataset.split_sizes(), (21, 3, 6));
    assert_eq!(dataset.feature_count, 9);

    assert_eq!(dataset.stats.total_events, 30);
    assert_eq!(dataset.stats.events_with_cells, 30);
    assert_eq!(dataset.stats.events_after_min_cells_filter, 30);
    assert_eq!(dataset.stats.total_cells_before_filtering, 240);
    assert_eq!(dataset.stats.total_cells_after_filtering, 240);
    assert_eq!(dataset.stats.sequences_built(), 30);
}

#[test]
fn test_missing_shards_are_skipped() {
    let dir = TempDir::new().unwrap();
    // Expect 5 shards, deliver only 0 and 3.
    for shard in [0, 3] {
        let events: Vec<Event> = (0..4).map(|i| matched_event(shard * 10 + i, 8)).collect();
        let path = dir.path().join(shard_file_name(shard as usize));
        EventStore::write_shard(&path, &events).unwrap();
    }

    let config = config_for(&dir, 5);
    let dataset = Dataset::assemble(&config).unwrap();

    assert_eq!(dataset.total_sequences(), 8);
    assert_eq!(dataset.stats.total_events, 8);
}

#[test]
fn test_empty_directory_is_error() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, 5);

    let err = Dataset::assemble(&config).unwrap_err();
    assert!(matches!(
        err,
        ExtractError::NoUsableShards { attempted: 5 }
    ));
}

#[test]
fn test_corrupt_shard_is_contained() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 1, 10);
    std::fs::write(dir.path().join(shard_file_name(1)), b"{ not json").unwrap();

    // Assembly collects shard errors; the good shard still produces data.
    let config = config_for(&dir, 2);
    let dataset = Dataset::assemble(&config).unwrap();
    assert_eq!(dataset.total_sequences(), 10);
}

#[test]
fn test_all_shards_corrupt_is_error() {
    let dir = TempDir::new().unwrap();
    for shard in 0..3 {
        std::fs::write(dir.path().join(shard_file_name(shard)), b"garbage").unwrap();
    }

    let config = config_for(&dir, 3);
    let err = Dataset::assemble(&config).unwrap_err();
    assert!(matches!(err, ExtractError::NoUsableShards { .. }));
}

#[test]
fn test_only_passing_events_become_sequences() {
    // One shard, 10 events: half have enough cells, half fall below
    // min_cells. Exactly the passing half comes out as sequences.
    let dir = TempDir::new().unwrap();
    let events: Vec<Event> = (0..10)
        .map(|i| matched_event(i, if i % 2 == 0 { 8 } else { 2 }))
        .collect();
    EventStore::write_shard(&dir.path().join(shard_file_name(0)), &events).unwrap();

    let config = config_for(&dir, 1);
    let dataset = Dataset::assemble(&config).unwrap();

    assert_eq!(dataset.total_sequences(), 5);
    assert_eq!(dataset.stats.total_events, 10);
    assert_eq!(dataset.stats.events_after_min_cells_filter, 5);
    let max_cells = config.sequence.max_cells;
    for seq in dataset
        .train
        .iter()
        .chain(dataset.val.iter())
        .chain(dataset.test.iter())
    {
        assert!(seq.len() <= max_cells);
        assert!(seq.event_number % 2 == 0);
    }
}

// ============================================================================
// Pipeline Semantics
// ============================================================================

#[test]
fn test_sequences_ranked_by_selection_feature() {
    let event = event_with_energies(1, vec![3.0, 9.0, 1.0, 7.0, 5.0]);
    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();

    let output = pipeline.process_events(&[event]).unwrap();
    let energy_idx = 5;
    let energies: Vec<f64> = output.sequences[0]
        .features
        .iter()
        .map(|row| row[energy_idx])
        .collect();
    assert_eq!(energies, vec![9.0, 7.0, 5.0, 3.0, 1.0]);
}

#[test]
fn test_truncation_caps_sequence_length() {
    let event = matched_event(1, 50);
    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();

    let output = pipeline.process_events(&[event]).unwrap();
    let seq = &output.sequences[0];
    assert_eq!(seq.len(), 40);

    // Energies are 1..=50; the truncated sequence keeps the top 40.
    let energy_idx = 5;
    assert_eq!(seq.features[0][energy_idx], 50.0);
    assert_eq!(seq.features[39][energy_idx], 11.0);
}

#[test]
fn test_min_cells_drops_sparse_events() {
    // Default min_cells is 3: two cells is too few, three is enough.
    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();
    let output = pipeline
        .process_events(&[matched_event(1, 2), matched_event(2, 3)])
        .unwrap();

    assert_eq!(output.sequences.len(), 1);
    assert_eq!(output.sequences[0].event_number, 2);
    assert_eq!(output.stats.events_with_cells, 2);
    assert_eq!(output.stats.events_after_min_cells_filter, 1);
}

#[test]
fn test_unmatched_cells_keep_sentinels() {
    // Track projects far from every cell, so nothing matches; disable the
    // match requirement so the unmatched rows survive to the sequence.
    let mut event = matched_event(1, 5);
    event.tracks = vec![hs_track(5.0, 3.0, 3.0)];

    let mut config = ExtractionConfig::default();
    config.filtering.require_track_match = false;
    let pipeline = ExtractionPipeline::from_config(config).unwrap();

    let output = pipeline.process_events(&[event]).unwrap();
    let (pt_idx, dr_idx) = (7, 8);
    for row in &output.sequences[0].features {
        assert_eq!(row[pt_idx], 0.0);
        assert_eq!(row[dr_idx], UNMATCHED_DELTA_R);
    }
}

#[test]
fn test_matched_cells_carry_track_pt() {
    let event = matched_event(1, 5);
    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();

    let output = pipeline.process_events(&[event]).unwrap();
    let pt_idx = 7;
    for row in &output.sequences[0].features {
        assert_eq!(row[pt_idx], 5.0);
    }
}

#[test]
fn test_vertex_gate_boundary_is_inclusive() {
    // Displacement exactly at the configured maximum still passes.
    let mut event = matched_event(1, 8);
    event.truth_vertex = Vertex::new(0.0, 0.0, 0.0);
    event.reco_vertex = Vertex::new(0.0, 0.0, 2.0);

    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();
    let output = pipeline.process_events(&[event]).unwrap();

    assert_eq!(output.sequences.len(), 1);
    assert_eq!(output.stats.events_outside_vertex_window, 0);
}

#[test]
fn test_filter_drops_invalid_cells() {
    let mut event = matched_event(1, 8);
    event
        .cells
        .insert_column(columns::VALID, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0])
        .unwrap();

    let pipeline = ExtractionPipeline::from_config(ExtractionConfig::default()).unwrap();
    let output = pipeline.process_events(&[event]).unwrap();

    assert_eq!(output.stats.total_cells_before_filtering, 8);
    assert_eq!(output.stats.total_cells_after_filtering, 4);
    assert_eq!(output.sequences[0].len(), 4);
}

#[test]
fn test_validation_drops_nonfinite_sequences() {
    let mut event = matched_event(1, 5);
    event
        .cells
        .insert_column(columns::ENERGY, vec![1.0, 2.0, f64::NAN, 4.0, 5.0])
        .unwrap();

    let mut config = ExtractionConfig::default();
    config.data.validate_sequences = true;
    let pipeline = ExtractionPipeline::from_config(config).unwrap();

    let output = pipeline
        .process_events(&[event, matched_event(2, 5)])
        .unwrap();
    assert_eq!(output.sequences.len(), 1);
    assert_eq!(output.sequences[0].event_number, 2);
    assert_eq!(output.stats.events_failing_validation, 1);
    assert_eq!(output.stats.sequences_built(), 1);
}

// ============================================================================
// Determinism & Reproducibility
// ============================================================================

#[test]
fn test_assembly_deterministic_across_runs() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 2, 15);
    let config = config_for(&dir, 2);

    let a = Dataset::assemble(&config).unwrap();
    let b = Dataset::assemble(&config).unwrap();

    let ids = |split: &[CellSequence]| -> Vec<i64> {
        split.iter().map(|s| s.event_number).collect()
    };
    assert_eq!(ids(&a.train), ids(&b.train));
    assert_eq!(ids(&a.val), ids(&b.val));
    assert_eq!(ids(&a.test), ids(&b.test));
    assert_eq!(a.normalization, b.normalization);
}

#[test]
fn test_seed_changes_partition() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 2, 20);

    let config = config_for(&dir, 2);
    let mut reseeded = config_for(&dir, 2);
    reseeded.split.seed = 1234;

    let a = Dataset::assemble(&config).unwrap();
    let b = Dataset::assemble(&reseeded).unwrap();

    let train_a: Vec<i64> = a.train.iter().map(|s| s.event_number).collect();
    let train_b: Vec<i64> = b.train.iter().map(|s| s.event_number).collect();
    assert_ne!(train_a, train_b);
}

#[test]
fn test_normalization_invertible_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 2, 20);
    let config = config_for(&dir, 2);

    // Raw sequences, in the same deterministic order assembly consumes them.
    let processor = BatchProcessor::new(config.clone(), BatchConfig::new()).unwrap();
    let raw = processor.process_all().unwrap().into_sequences();

    let dataset = Dataset::assemble(&config).unwrap();
    let splits = DatasetSplits::partition(raw.len(), &config.split);

    let mut restored = dataset.train.clone();
    dataset.normalization.invert(&mut restored);

    for (seq, &raw_idx) in restored.iter().zip(&splits.train) {
        let original = &raw[raw_idx];
        assert_eq!(seq.event_number, original.event_number);
        for (row, raw_row) in seq.features.iter().zip(&original.features) {
            for (a, b) in row.iter().zip(raw_row.iter()) {
                assert!((a - b).abs() < 1e-9, "expected {b}, restored {a}");
            }
        }
    }
}

#[test]
fn test_skip_listed_features_stay_raw() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 1, 20);
    let config = config_for(&dir, 1);

    let dataset = Dataset::assemble(&config).unwrap();

    // is_barrel (2) and layer (3) are skip-listed by default; the fixture
    // puts every cell on EMB2 so they stay exactly 1.0 and 2.0.
    for seq in dataset.train.iter().chain(&dataset.val).chain(&dataset.test) {
        for row in &seq.features {
            assert_eq!(row[2], 1.0);
            assert_eq!(row[3], 2.0);
        }
    }
}

#[test]
fn test_event_numbers_unique_across_splits() {
    let dir = TempDir::new().unwrap();
    write_shards(&dir, 3, 10);
    let config = config_for(&dir, 3);

    let dataset = Dataset::assemble(&config).unwrap();
    let all: Vec<CellSequence> = dataset
        .train
        .iter()
        .chain(&dataset.val)
        .chain(&dataset.test)
        .cloned()
        .collect();

    let result = validate_event_numbers(&all);
    assert!(result.is_valid(), "{result}");
}
