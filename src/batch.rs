//! Parallel batch processing for multi-shard datasets.
//!
//! This module provides efficient parallel processing of multiple event
//! shards using Rayon's work-stealing thread pool. The pipeline itself is
//! stateless, so a single instance is shared by every worker; each shard is
//! read, matched, filtered and built independently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BatchProcessor                                │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                   Rayon Thread Pool                          ││
//! │  │                                                              ││
//! │  │  Thread 1          Thread 2          Thread N                ││
//! │  │       │                 │                 │                  ││
//! │  │  output_000.json   output_001.json   output_N.json           ││
//! │  │       │                 │                 │                  ││
//! │  │       ▼                 ▼                 ▼                  ││
//! │  │  ShardResult       ShardResult       ShardResult             ││
//! │  └──────────────────────────┬───────────────────────────────────┘│
//! │                             ▼                                    │
//! │                       BatchOutput                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Configurable parallelism**: Set thread count based on hardware
//! - **Error handling modes**: Fail fast or collect errors and continue
//! - **Progress reporting**: Optional callbacks for monitoring
//! - **Graceful cancellation**: Cancel long-running jobs from any thread
//! - **Deterministic output**: Results keep shard order regardless of which
//!   thread finished first
//!
//! # Error Containment
//!
//! A shard that cannot be read or parsed fails alone: in
//! [`ErrorMode::CollectErrors`] the remaining shards still run and the
//! failure is recorded as a [`FileError`]. The batch as a whole fails only
//! when *no* shard produced output ([`ExtractError::NoUsableShards`]).
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::batch::{BatchProcessor, BatchConfig, ErrorMode};
//!
//! let batch_config = BatchConfig::new()
//!     .with_threads(8)
//!     .with_error_mode(ErrorMode::CollectErrors);
//!
//! let processor = BatchProcessor::new(config, batch_config)?;
//! let output = processor.process_all()?;
//!
//! println!("{} shards in {:?}", output.successful_count(), output.elapsed);
//! println!("{}", output.merged_stats());
//! ```
//!
//! # Cancellation Support
//!
//! Long-running batch jobs can be cancelled gracefully using a
//! [`CancellationToken`]:
//!
//! ```ignore
//! let token = CancellationToken::new();
//! let processor = BatchProcessor::new(config, batch_config)?
//!     .with_cancellation_token(token.clone());
//!
//! let handle = std::thread::spawn(move || processor.process_all());
//! token.cancel();
//!
//! let output = handle.join().unwrap()?;
//! if output.was_cancelled {
//!     println!("cancelled after {} shards", output.successful_count());
//! }
//! ```

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::pipeline::{ExtractionPipeline, ExtractionStats, FileOutput};
use crate::sequence_builder::CellSequence;
use crate::ExtractError;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Configuration
// ============================================================================

/// Error handling mode for batch processing.
///
/// Determines how the processor handles failures on individual shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Stop processing immediately on first error (default).
    ///
    /// Use this when data integrity is critical and you want to
    /// investigate failures before continuing.
    #[default]
    FailFast,

    /// Continue processing remaining shards, collect all errors.
    ///
    /// Use this for batch jobs where you want to process as much
    /// data as possible and handle failures later.
    CollectErrors,
}

// ============================================================================
// Cancellation Support
// ============================================================================

/// Token for cancelling batch processing.
///
/// Thread-safe way to signal cancellation to a running batch job. It can be
/// cloned and shared across threads; workers check it before starting each
/// shard, so in-progress shards complete normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// Signals all workers to stop after their current shard.
    /// Already-completed shards are preserved in the output.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the token (for reuse). Only call when no processing is active.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Configuration for batch processing.
///
/// # Example
///
/// ```ignore
/// use cell_sequence_extractor::batch::{BatchConfig, ErrorMode};
///
/// // For a 16-core machine, leave some cores for the OS
/// let config = BatchConfig::new()
///     .with_threads(12)
///     .with_error_mode(ErrorMode::CollectErrors);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Number of threads to use.
    ///
    /// - `None`: Use Rayon default (typically num_cpus)
    /// - `Some(n)`: Use exactly n threads
    pub num_threads: Option<usize>,

    /// How to handle errors during processing.
    pub error_mode: ErrorMode,

    /// Stack size per thread in bytes (advanced).
    pub stack_size: Option<usize>,
}

impl BatchConfig {
    /// Create a new batch configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of threads to use.
    ///
    /// # Panics
    ///
    /// Panics if threads is 0.
    pub fn with_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Thread count must be > 0");
        self.num_threads = Some(threads);
        self
    }

    /// Set the error handling mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Set custom stack size per thread (advanced).
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Get effective thread count.
    #[cfg(feature = "parallel")]
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Get effective thread count.
    #[cfg(not(feature = "parallel"))]
    pub fn effective_threads(&self) -> usize {
        1
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result from processing a single shard.
#[derive(Debug, Clone)]
pub struct ShardResult {
    /// Shard identifier (file stem, e.g. "output_007").
    pub shard: String,

    /// Full path to the processed file.
    pub file_path: String,

    /// Pipeline output containing sequences and statistics.
    pub output: FileOutput,

    /// Processing time for this shard.
    pub elapsed: Duration,

    /// Thread ID that processed this shard (for debugging).
    pub thread_id: usize,
}

impl ShardResult {
    /// Number of events read from this shard.
    pub fn events(&self) -> usize {
        self.output.stats.total_events
    }

    /// Number of sequences built from this shard.
    pub fn sequences(&self) -> usize {
        self.output.sequences.len()
    }

    /// Processing throughput (events per second).
    pub fn throughput(&self) -> f64 {
        self.events() as f64 / self.elapsed.as_secs_f64()
    }
}

/// Error information for a failed shard.
#[derive(Debug, Clone)]
pub struct FileError {
    /// Shard identifier.
    pub shard: String,

    /// File path that failed.
    pub file_path: String,

    /// Error message.
    pub error: String,
}

/// Aggregated results from batch processing.
#[derive(Debug)]
pub struct BatchOutput {
    /// Successfully processed shards, in shard order.
    pub results: Vec<ShardResult>,

    /// Failed shards (only populated with ErrorMode::CollectErrors).
    pub errors: Vec<FileError>,

    /// Total processing time (wall clock).
    pub elapsed: Duration,

    /// Number of threads used.
    pub threads_used: usize,

    /// Whether processing was cancelled before completion.
    ///
    /// If true, `results` contains only the shards that completed before
    /// cancellation was detected.
    pub was_cancelled: bool,

    /// Number of shards skipped due to cancellation.
    pub skipped_count: usize,
}

impl BatchOutput {
    /// Count of successfully processed shards.
    pub fn successful_count(&self) -> usize {
        self.results.len()
    }

    /// Count of failed shards.
    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// Total events read across all successful shards.
    pub fn total_events(&self) -> usize {
        self.results.iter().map(|r| r.events()).sum()
    }

    /// Total sequences built across all successful shards.
    pub fn total_sequences(&self) -> usize {
        self.results.iter().map(|r| r.sequences()).sum()
    }

    /// Attrition counters folded over all successful shards.
    pub fn merged_stats(&self) -> ExtractionStats {
        let mut stats = ExtractionStats::default();
        for result in &self.results {
            stats.merge(&result.output.stats);
        }
        stats
    }

    /// Overall throughput (events per second).
    pub fn throughput_events_per_sec(&self) -> f64 {
        self.total_events() as f64 / self.elapsed.as_secs_f64()
    }

    /// Speedup factor compared to sequential processing.
    ///
    /// Sum of individual processing times / total wall clock time.
    pub fn speedup_factor(&self) -> f64 {
        let sequential_time: Duration = self.results.iter().map(|r| r.elapsed).sum();
        sequential_time.as_secs_f64() / self.elapsed.as_secs_f64()
    }

    /// Check if all shards were processed successfully.
    pub fn all_successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// Flatten all sequences, preserving shard order then event order.
    ///
    /// This order is stable across runs and thread counts, which keeps the
    /// downstream seeded split deterministic.
    pub fn into_sequences(self) -> Vec<CellSequence> {
        let mut sequences = Vec::with_capacity(self.total_sequences());
        for result in self.results {
            sequences.extend(result.output.sequences);
        }
        sequences
    }

    /// Iterate over successful results.
    pub fn iter(&self) -> impl Iterator<Item = &ShardResult> {
        self.results.iter()
    }

    /// Iterate over errors.
    pub fn iter_errors(&self) -> impl Iterator<Item = &FileError> {
        self.errors.iter()
    }
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress information for callbacks.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Current shard being processed.
    pub current_file: String,

    /// Index of current shard (0-based).
    pub current_index: usize,

    /// Total number of shards to process.
    pub total_files: usize,

    /// Number of shards completed so far.
    pub completed: usize,

    /// Number of shards failed so far.
    pub failed: usize,

    /// Elapsed time since start.
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.total_files == 0 {
            100.0
        } else {
            (self.completed + self.failed) as f64 / self.total_files as f64 * 100.0
        }
    }

    /// Estimate remaining time based on current progress.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let done = self.completed + self.failed;
        if done == 0 {
            return None;
        }
        let remaining = self.total_files - done;
        let avg_time = self.elapsed.as_secs_f64() / done as f64;
        Some(Duration::from_secs_f64(avg_time * remaining as f64))
    }
}

/// Trait for progress reporting callbacks.
///
/// Implement this to receive progress updates during batch processing.
pub trait ProgressCallback: Send + Sync {
    /// Called when starting to process a shard.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when batch processing completes.
    fn on_complete(&self, output: &BatchOutput);
}

/// Simple console progress reporter.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    /// Show one line per shard instead of a single updating line.
    pub verbose: bool,
}

impl ConsoleProgress {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable verbose output.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if self.verbose {
            println!(
                "[{:3}/{:3}] Processing: {} ({:.1}% complete)",
                info.completed + 1,
                info.total_files,
                info.current_file,
                info.percent_complete()
            );
        } else {
            print!(
                "\r[{:3}/{:3}] {:.1}%",
                info.completed + info.failed,
                info.total_files,
                info.percent_complete()
            );
            use std::io::Write;
            std::io::stdout().flush().ok();
        }
    }

    fn on_complete(&self, output: &BatchOutput) {
        let stats = output.merged_stats();
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!("Batch Processing Complete");
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Shards processed: {}", output.successful_count());
        println!("  Shards failed:    {}", output.failed_count());
        println!("  Total events:     {}", stats.total_events);
        println!("  Total sequences:  {}", stats.sequences_built());
        println!("  Total time:       {:?}", output.elapsed);
        println!(
            "  Throughput:       {:.2} events/sec",
            output.throughput_events_per_sec()
        );
        println!("  Speedup:          {:.2}x", output.speedup_factor());
        println!("═══════════════════════════════════════════════════════════════");
    }
}

// ============================================================================
// Batch Processor
// ============================================================================

/// Internal result type so cancellation and containment share one collection pass.
///
/// Success is boxed; it carries the full sequence payload while the other
/// variants are a few strings at most.
enum ProcessResult {
    Success(Box<ShardResult>),
    Error(FileError),
    Skipped,
}

/// Parallel batch processor for multi-shard datasets.
///
/// Processes event shards in parallel using Rayon's work-stealing thread
/// pool. The [`ExtractionPipeline`] is immutable after construction, so one
/// instance serves every worker without locks.
///
/// # Example
///
/// ```ignore
/// use cell_sequence_extractor::batch::{BatchProcessor, BatchConfig};
///
/// let processor = BatchProcessor::new(config, BatchConfig::new().with_threads(8))?;
/// let output = processor.process_all()?;
/// let sequences = output.into_sequences();
/// ```
pub struct BatchProcessor {
    /// Shared, stateless pipeline.
    pipeline: Arc<ExtractionPipeline>,

    /// Batch processing configuration.
    batch_config: BatchConfig,

    /// Optional progress callback.
    progress_callback: Option<Arc<dyn ProgressCallback>>,

    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl BatchProcessor {
    /// Create a new batch processor.
    ///
    /// Builds the pipeline once up front; configuration errors surface here
    /// rather than inside worker threads.
    pub fn new(config: ExtractionConfig, batch_config: BatchConfig) -> Result<Self> {
        let pipeline = ExtractionPipeline::from_config(config)?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            batch_config,
            progress_callback: None,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Create a batch processor with default batch configuration.
    pub fn with_extraction_config(config: ExtractionConfig) -> Result<Self> {
        Self::new(config, BatchConfig::default())
    }

    /// Set a progress callback.
    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(Arc::from(callback));
        self
    }

    /// Set a cancellation token for graceful shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Get a clone of the cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Request cancellation of the current batch processing.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Get the batch configuration.
    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    /// Get the underlying pipeline.
    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    /// Discover shards in the configured data directory and process them all.
    ///
    /// Missing shard indices are skipped with a warning by the store; the
    /// run fails with [`ExtractError::NoUsableShards`] only when nothing at
    /// all can be processed.
    pub fn process_all(&self) -> Result<BatchOutput> {
        let files = self.pipeline.store().existing_shards();
        if files.is_empty() {
            return Err(ExtractError::NoUsableShards {
                attempted: self.pipeline.config().data.num_files,
            });
        }
        self.process_shards(&files)
    }

    /// Process the given shard files in parallel.
    ///
    /// Results keep the input file order, so flattened sequences are
    /// deterministic regardless of thread scheduling.
    pub fn process_shards<P: AsRef<Path> + Sync>(&self, files: &[P]) -> Result<BatchOutput> {
        let start = Instant::now();
        let total_files = files.len();
        let threads_used = self.batch_config.effective_threads();

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let results = self.run_shards(files, total_files, start, &completed, &failed)?;

        let mut successful = Vec::new();
        let mut errors = Vec::new();
        let mut skipped_count = 0usize;

        for result in results {
            match result {
                ProcessResult::Success(shard_result) => successful.push(*shard_result),
                ProcessResult::Error(file_error) => {
                    if self.batch_config.error_mode == ErrorMode::FailFast {
                        return Err(ExtractError::store(
                            PathBuf::from(&file_error.file_path),
                            file_error.error,
                        ));
                    }
                    errors.push(file_error);
                }
                ProcessResult::Skipped => {
                    skipped_count += 1;
                }
            }
        }

        if successful.is_empty() && !errors.is_empty() {
            return Err(ExtractError::NoUsableShards {
                attempted: total_files,
            });
        }

        let output = BatchOutput {
            results: successful,
            errors,
            elapsed: start.elapsed(),
            threads_used,
            was_cancelled: self.cancellation_token.is_cancelled(),
            skipped_count,
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_complete(&output);
        }

        Ok(output)
    }

    /// Run the per-shard map on a local thread pool.
    ///
    /// A local pool is used because `build_global()` only works once per
    /// process; different processors may want different thread counts.
    #[cfg(feature = "parallel")]
    fn run_shards<P: AsRef<Path> + Sync>(
        &self,
        files: &[P],
        total_files: usize,
        start: Instant,
        completed: &AtomicUsize,
        failed: &AtomicUsize,
    ) -> Result<Vec<ProcessResult>> {
        let mut pool_builder =
            rayon::ThreadPoolBuilder::new().num_threads(self.batch_config.effective_threads());
        if let Some(stack_size) = self.batch_config.stack_size {
            pool_builder = pool_builder.stack_size(stack_size);
        }
        let pool = pool_builder
            .build()
            .map_err(|e| ExtractError::Config(format!("failed to create thread pool: {e}")))?;

        Ok(pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .map(|(index, file)| {
                    self.map_one_shard(file.as_ref(), index, total_files, start, completed, failed)
                })
                .collect()
        }))
    }

    /// Serial fallback when the `parallel` feature is disabled.
    #[cfg(not(feature = "parallel"))]
    fn run_shards<P: AsRef<Path> + Sync>(
        &self,
        files: &[P],
        total_files: usize,
        start: Instant,
        completed: &AtomicUsize,
        failed: &AtomicUsize,
    ) -> Result<Vec<ProcessResult>> {
        Ok(files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                self.map_one_shard(file.as_ref(), index, total_files, start, completed, failed)
            })
            .collect())
    }

    /// Per-shard body shared by the parallel and serial paths.
    fn map_one_shard(
        &self,
        file: &Path,
        index: usize,
        total_files: usize,
        start: Instant,
        completed: &AtomicUsize,
        failed: &AtomicUsize,
    ) -> ProcessResult {
        let file_path = file.to_string_lossy().to_string();
        let shard = shard_name(file);

        // Check for cancellation BEFORE starting work.
        if self.cancellation_token.is_cancelled() {
            return ProcessResult::Skipped;
        }

        if let Some(ref callback) = self.progress_callback {
            let info = ProgressInfo {
                current_file: file_path.clone(),
                current_index: index,
                total_files,
                completed: completed.load(Ordering::Relaxed),
                failed: failed.load(Ordering::Relaxed),
                elapsed: start.elapsed(),
            };
            callback.on_progress(&info);
        }

        match self.process_single_shard(file, &shard, &file_path) {
            Ok(shard_result) => {
                completed.fetch_add(1, Ordering::Relaxed);
                ProcessResult::Success(Box::new(shard_result))
            }
            Err(err) => {
                failed.fetch_add(1, Ordering::Relaxed);
                log::error!("shard {} failed: {}", err.shard, err.error);
                ProcessResult::Error(err)
            }
        }
    }

    /// Process a single shard (called from the thread pool).
    fn process_single_shard(
        &self,
        file: &Path,
        shard: &str,
        file_path: &str,
    ) -> std::result::Result<ShardResult, FileError> {
        let start = Instant::now();

        let output = self.pipeline.process_file(file).map_err(|e| FileError {
            shard: shard.to_string(),
            file_path: file_path.to_string(),
            error: e.to_string(),
        })?;

        #[cfg(feature = "parallel")]
        let thread_id = rayon::current_thread_index().unwrap_or(0);
        #[cfg(not(feature = "parallel"))]
        let thread_id = 0;

        Ok(ShardResult {
            shard: shard.to_string(),
            file_path: file_path.to_string(),
            output,
            elapsed: start.elapsed(),
            thread_id,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Shard identifier from a file path: the file stem.
///
/// `/data/output_007.json` → `output_007`
fn shard_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Process the configured data directory with default batch settings.
///
/// # Example
///
/// ```ignore
/// use cell_sequence_extractor::batch::process_shards_parallel;
///
/// let output = process_shards_parallel(&config)?;
/// ```
pub fn process_shards_parallel(config: &ExtractionConfig) -> Result<BatchOutput> {
    let processor = BatchProcessor::with_extraction_config(config.clone())?;
    processor.process_all()
}

/// Process the configured data directory with a specific thread count.
pub fn process_shards_with_threads(
    config: &ExtractionConfig,
    threads: usize,
) -> Result<BatchOutput> {
    let batch_config = BatchConfig::new().with_threads(threads);
    let processor = BatchProcessor::new(config.clone(), batch_config)?;
    processor.process_all()
}

// ============================================================================
// Tests
// ============================================================================
