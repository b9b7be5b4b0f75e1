//! Sharded event store.
//!
//! Input events arrive as numbered JSON shards (`output_000.json`,
//! `output_001.json`, ...) under one data directory. The store resolves the
//! expected shard paths from the configuration, skips missing shards with a
//! warning (collaborators deliver shards incrementally), and validates each
//! event's internal consistency on read.
//!
//! A shard is one scoped acquisition: open, bulk-read, close. Nothing holds
//! a file open across pipeline stages.

use crate::error::{ExtractError, Result};
use crate::event::Event;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Shard filename for a zero-based index: `output_007.json`.
pub fn shard_file_name(index: usize) -> String {
    format!("output_{index:03}.json")
}

/// Resolves and reads event shards from one data directory.
#[derive(Debug, Clone)]
pub struct EventStore {
    data_dir: PathBuf,
    num_files: usize,
}

impl EventStore {
    pub fn new(data_dir: impl Into<PathBuf>, num_files: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            num_files,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Expected shard paths, index order, whether present or not.
    pub fn shard_paths(&self) -> Vec<PathBuf> {
        (0..self.num_files)
            .map(|i| self.data_dir.join(shard_file_name(i)))
            .collect()
    }

    /// Shard paths that exist on disk. Missing shards are skipped with a
    /// warning, never an error.
    pub fn existing_shards(&self) -> Vec<PathBuf> {
        self.shard_paths()
            .into_iter()
            .filter(|path| {
                let present = path.is_file();
                if !present {
                    log::warn!("shard {} not found, skipping", path.display());
                }
                present
            })
            .collect()
    }

    /// Read and validate every event of one shard.
    pub fn read_shard(path: &Path) -> Result<Vec<Event>> {
        let file = File::open(path).map_err(|e| ExtractError::store(path, e))?;
        let events: Vec<Event> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ExtractError::store(path, e))?;
        for event in &events {
            event
                .validate()
                .map_err(|message| ExtractError::store(path, message))?;
        }
        Ok(events)
    }

    /// Write events to one shard, creating parent directories as needed.
    /// Used by tools and test fixtures; the pipeline itself only reads.
    pub fn write_shard(path: &Path, events: &[Event]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| ExtractError::store(path, e))?;
        serde_json::to_writer(BufWriter::new(file), events)
            .map_err(|e| ExtractError::store(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CellTable, Vertex};

    fn minimal_event(event_number: i64) -> Event {
        let mut cells = CellTable::new();
        cells
            .insert_column("energy", vec![1.0, 2.0])
            .unwrap();
        Event {
            event_number,
            truth_vertex: Vertex::default(),
            reco_vertex: Vertex::default(),
            vertex_time: 0.5,
            cells,
            tracks: Vec::new(),
        }
    }

    #[test]
    fn test_shard_file_name_zero_padded() {
        assert_eq!(shard_file_name(0), "output_000.json");
        assert_eq!(shard_file_name(7), "output_007.json");
        assert_eq!(shard_file_name(42), "output_042.json");
        assert_eq!(shard_file_name(123), "output_123.json");
    }

    #[test]
    fn test_shard_paths_index_order() {
        let store = EventStore::new("/data", 3);
        let paths = store.shard_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("output_002.json"));
    }

    #[test]
    fn test_round_trip_and_missing_shards() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), 3);

        // Only shard 1 exists; 0 and 2 are missing.
        let path = dir.path().join(shard_file_name(1));
        let events = vec![minimal_event(10), minimal_event(11)];
        EventStore::write_shard(&path, &events).unwrap();

        let existing = store.existing_shards();
        assert_eq!(existing, vec![path.clone()]);

        let back = EventStore::read_shard(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].event_number, 10);
        assert_eq!(back[1].cells.len(), 2);
    }

    #[test]
    fn test_read_corrupt_shard_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(shard_file_name(0));
        std::fs::write(&path, b"not json").unwrap();

        let err = EventStore::read_shard(&path).unwrap_err();
        assert!(err.to_string().contains("output_000.json"));
    }
}
