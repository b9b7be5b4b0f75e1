//! Unified Pipeline for Cell Sequence Extraction
//!
//! This module provides a simple, composable pipeline that connects all
//! per-event components:
//! - Event loading (via [`EventStore`])
//! - Vertex quality gating
//! - Track-to-cell matching (via [`TrackMatcher`])
//! - Cell filtering (via [`CellFilterChain`])
//! - Sequence building (via [`EventSequenceBuilder`])
//!
//! # Architecture
//!
//! ```text
//! Shard JSON → EventStore → Event ──(vertex gate)──→ TrackMatcher.match_table()
//!                                        ↓                      ↓
//!                                 skipped, counted     CellTable + 3 match columns
//!                                                               ↓
//!                                                    CellFilterChain.apply()
//!                                                               ↓
//!                                                  EventSequenceBuilder.build()
//!                                                               ↓
//!                                                   Accumulated CellSequences
//! ```
//!
//! # Attrition vs Errors
//!
//! Events that fail a *quality* gate (vertex displacement, empty cell table,
//! too few cells after filtering) are normal attrition: they are counted in
//! [`ExtractionStats`] and skipped, never raised as errors. Errors are
//! reserved for malformed inputs — a shard the store cannot parse, or a cell
//! table missing the columns the matcher needs to address cells.
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::prelude::*;
//!
//! let config = ExtractionConfig::default();
//! let pipeline = ExtractionPipeline::from_config(config)?;
//!
//! let mut sequences = Vec::new();
//! let mut stats = ExtractionStats::default();
//! for path in pipeline.store().existing_shards() {
//!     let output = pipeline.process_file(&path)?;
//!     sequences.extend(output.sequences);
//!     stats.merge(&output.stats);
//! }
//! log::info!("{stats}");
//! ```

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::event::Event;
use crate::filtering::CellFilterChain;
use crate::matching::TrackMatcher;
use crate::sequence_builder::{CellSequence, EventSequenceBuilder};
use crate::store::EventStore;
use crate::validation::{SequenceValidator, ValidationConfig};
use crate::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Statistics
// ============================================================================

/// Attrition counters accumulated while processing events.
///
/// Every event lands in exactly one of: outside the vertex window, empty
/// cell table, below the minimum cell count, failed validation, or emitted
/// as a sequence. The cell counters measure what the filter chain removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Events read from shards
    pub total_events: usize,

    /// Events skipped by the truth↔reco vertex distance gate
    pub events_outside_vertex_window: usize,

    /// Events that reached the matcher with a non-empty cell table
    pub events_with_cells: usize,

    /// Events still holding at least `min_cells` cells after filtering
    pub events_after_min_cells_filter: usize,

    /// Events dropped by the optional sequence validator
    pub events_failing_validation: usize,

    /// Events whose sequences were built with at least one schema feature
    /// absent from the cell table (zero-filled)
    pub events_with_missing_features: usize,

    /// Cells entering the filter chain
    pub total_cells_before_filtering: usize,

    /// Cells surviving the filter chain
    pub total_cells_after_filtering: usize,
}

impl ExtractionStats {
    /// Fold another stats block into this one (for cross-file aggregation).
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.total_events += other.total_events;
        self.events_outside_vertex_window += other.events_outside_vertex_window;
        self.events_with_cells += other.events_with_cells;
        self.events_after_min_cells_filter += other.events_after_min_cells_filter;
        self.events_failing_validation += other.events_failing_validation;
        self.events_with_missing_features += other.events_with_missing_features;
        self.total_cells_before_filtering += other.total_cells_before_filtering;
        self.total_cells_after_filtering += other.total_cells_after_filtering;
    }

    /// Sequences emitted (min-cells survivors minus validation drops).
    pub fn sequences_built(&self) -> usize {
        self.events_after_min_cells_filter - self.events_failing_validation
    }

    /// Fraction of read events that became sequences.
    pub fn event_retention(&self) -> f64 {
        if self.total_events == 0 {
            return 0.0;
        }
        self.sequences_built() as f64 / self.total_events as f64
    }

    /// Fraction of cells surviving the filter chain.
    pub fn cell_retention(&self) -> f64 {
        if self.total_cells_before_filtering == 0 {
            return 0.0;
        }
        self.total_cells_after_filtering as f64 / self.total_cells_before_filtering as f64
    }
}

impl fmt::Display for ExtractionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events -> {} sequences ({:.1}% retained), \
             cells {} -> {} ({:.1}% retained), \
             {} outside vertex window, {} below min cells",
            self.total_events,
            self.sequences_built(),
            self.event_retention() * 100.0,
            self.total_cells_before_filtering,
            self.total_cells_after_filtering,
            self.cell_retention() * 100.0,
            self.events_outside_vertex_window,
            self.events_with_cells - self.events_after_min_cells_filter,
        )
    }
}

/// Distribution of built sequence lengths, reported after a run.
///
/// Lengths cluster hard against `max_cells` in practice; the histogram tail
/// is what tells you whether `min_cells` or the filters are doing the
/// truncating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceLengthSummary {
    /// Sequences summarized
    pub count: usize,

    /// Mean length
    pub mean: f64,

    /// Population standard deviation of lengths
    pub std: f64,

    /// Shortest sequence
    pub min: usize,

    /// Longest sequence
    pub max: usize,

    /// Median length (midpoint average for an even count)
    pub median: f64,

    /// Up to five `(length, count)` pairs, most frequent first; equal counts
    /// keep the shorter length first
    pub most_common: Vec<(usize, usize)>,
}

impl SequenceLengthSummary {
    /// Summarize built sequences. `None` when there are none.
    pub fn from_sequences(sequences: &[CellSequence]) -> Option<Self> {
        Self::from_lengths(sequences.iter().map(|s| s.len()))
    }

    /// Summarize raw lengths. `None` when the iterator is empty.
    pub fn from_lengths<I: IntoIterator<Item = usize>>(lengths: I) -> Option<Self> {
        let mut lengths: Vec<usize> = lengths.into_iter().collect();
        if lengths.is_empty() {
            return None;
        }
        lengths.sort_unstable();

        let count = lengths.len();
        let mean = lengths.iter().sum::<usize>() as f64 / count as f64;
        let variance = lengths
            .iter()
            .map(|&len| {
                let d = len as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;
        let median = if count % 2 == 0 {
            (lengths[count / 2 - 1] + lengths[count / 2]) as f64 / 2.0
        } else {
            lengths[count / 2] as f64
        };

        // Run-length encode the sorted lengths, then rank by frequency.
        let mut histogram: Vec<(usize, usize)> = Vec::new();
        for &len in &lengths {
            match histogram.last_mut() {
                Some((l, n)) if *l == len => *n += 1,
                _ => histogram.push((len, 1)),
            }
        }
        histogram.sort_by(|a, b| b.1.cmp(&a.1));
        histogram.truncate(5);

        Some(Self {
            count,
            mean,
            std: variance.sqrt(),
            min: lengths[0],
            max: lengths[count - 1],
            median,
            most_common: histogram,
        })
    }
}

impl fmt::Display for SequenceLengthSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sequences, length mean {:.2}, std {:.2}, min {}, max {}, median {:.2}",
            self.count, self.mean, self.std, self.min, self.max, self.median
        )?;
        if !self.most_common.is_empty() {
            let rendered: Vec<String> = self
                .most_common
                .iter()
                .map(|(len, n)| {
                    format!("{} x{} ({:.1}%)", len, n, *n as f64 / self.count as f64 * 100.0)
                })
                .collect();
            write!(f, ", most common lengths: {}", rendered.join(", "))?;
        }
        Ok(())
    }
}

/// Output from processing one shard (or one in-memory batch of events).
#[derive(Debug, Clone)]
pub struct FileOutput {
    /// Built sequences, in event order
    pub sequences: Vec<CellSequence>,

    /// Attrition counters for this file
    pub stats: ExtractionStats,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Main pipeline — connects matcher, filter chain and sequence builder.
///
/// Stateless across events: the same pipeline can process shards in any
/// order, or concurrently from multiple threads.
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    store: EventStore,
    matcher: TrackMatcher,
    filter_chain: CellFilterChain,
    builder: EventSequenceBuilder,
    validator: Option<SequenceValidator>,
}

impl ExtractionPipeline {
    /// Create a pipeline from configuration.
    ///
    /// Validates the configuration first; an inconsistent config never
    /// produces a half-working pipeline.
    pub fn from_config(config: ExtractionConfig) -> Result<Self> {
        config.validate().map_err(ExtractError::Config)?;

        let schema = config.schema();
        let store = EventStore::new(config.data.data_dir.clone(), config.data.num_files);
        let matcher = TrackMatcher::new(config.matching.clone());
        let filter_chain = CellFilterChain::new(config.filtering.clone());
        let builder = EventSequenceBuilder::new(
            config.sequence.clone(),
            schema.clone(),
            config.data.use_spatial_features,
        );
        let validator = config.data.validate_sequences.then(|| {
            SequenceValidator::new(ValidationConfig::default(), &schema, config.sequence.max_cells)
        });

        Ok(Self {
            config,
            store,
            matcher,
            filter_chain,
            builder,
            validator,
        })
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Event store this pipeline reads from.
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Process a single shard file through the complete pipeline.
    ///
    /// Parse failures and schema errors propagate; callers decide whether a
    /// bad shard aborts the run (see the batch module's error modes).
    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<FileOutput> {
        let events = EventStore::read_shard(path.as_ref())?;
        self.process_events(&events)
    }

    /// Process an in-memory batch of events.
    pub fn process_events(&self, events: &[Event]) -> Result<FileOutput> {
        let mut sequences = Vec::with_capacity(events.len());
        let mut stats = ExtractionStats::default();

        for event in events {
            if let Some(sequence) = self.process_event(event, &mut stats)? {
                sequences.push(sequence);
            }
        }

        Ok(FileOutput { sequences, stats })
    }

    /// Process one event. `None` means attrition, recorded in `stats`.
    fn process_event(
        &self,
        event: &Event,
        stats: &mut ExtractionStats,
    ) -> Result<Option<CellSequence>> {
        stats.total_events += 1;

        if let Some(max_distance) = self.config.data.max_vertex_distance {
            if event.vertex_displacement() > max_distance {
                stats.events_outside_vertex_window += 1;
                return Ok(None);
            }
        }

        if event.cells.is_empty() {
            return Ok(None);
        }
        stats.events_with_cells += 1;
        stats.total_cells_before_filtering += event.cells.len();

        let matched = self.matcher.match_table(&event.cells, &event.tracks)?;
        let outcome = self.filter_chain.apply(&matched);
        stats.total_cells_after_filtering += outcome.cells.len();

        let (built, diagnostics) = self.builder.build(event, &outcome.cells);
        if !diagnostics.is_clean() {
            stats.events_with_missing_features += 1;
            log::debug!(
                "event {}: missing features {:?}",
                event.event_number,
                diagnostics.missing_features
            );
        }

        let Some(sequence) = built else {
            return Ok(None);
        };
        stats.events_after_min_cells_filter += 1;

        if let Some(validator) = &self.validator {
            let result = validator.validate_sequence(&sequence);
            if result.has_errors() {
                stats.events_failing_validation += 1;
                log::warn!("event {} failed validation: {result}", event.event_number);
                return Ok(None);
            }
        }

        Ok(Some(sequence))
    }
}
