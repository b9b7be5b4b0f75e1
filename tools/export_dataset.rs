//! Dataset Export Tool
//!
//! Configuration-driven tool for turning event shards into an ML-ready
//! NumPy dataset: extraction, splitting, normalization and export in one
//! pass.
//!
//! ## Output Format
//!
//! - **Cells**: `{split}_cells.npy` - Shape `[N, max_cells, n_features]`, zero padded
//! - **Vertex**: `{split}_vertex.npy` - Shape `[N, 3]` - Auxiliary vertex features
//! - **Times**: `{split}_times.npy` - Shape `[N]` - Regression targets
//! - **Lengths**: `{split}_lengths.npy` - Shape `[N]` - True sequence lengths
//! - **Metadata**: `metadata.json` - Schema, split manifests, attrition counters
//! - **Normalization**: `normalization.json` - Train-split z-score parameters
//!
//! # Usage
//!
//! ```bash
//! # From TOML config
//! cargo run --release --bin export_dataset -- --config configs/timing.toml output/
//!
//! # Generate sample config
//! cargo run --release --bin export_dataset -- --generate-config configs/timing.toml
//! ```
//!
//! # Configuration
//!
//! See `config::ExtractionConfig` for full configuration options.

use cell_sequence_extractor::batch::{BatchConfig, BatchProcessor, ConsoleProgress, ErrorMode};
use cell_sequence_extractor::config::{ExperimentMetadata, ExtractionConfig};
use cell_sequence_extractor::dataset::Dataset;
use cell_sequence_extractor::export::DatasetExporter;
use std::path::Path;

const DEFAULT_OUTPUT_DIR: &str = "exported_dataset";

/// Main entry point for the export tool
fn main() {
    env_logger::init();

    // Simple argument parsing
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a path argument");
                std::process::exit(1);
            }
            let output_dir = args.get(3).map(String::as_str).unwrap_or(DEFAULT_OUTPUT_DIR);
            run_from_config(&args[2], output_dir);
        }
        "--generate-config" => {
            if args.len() < 3 {
                eprintln!("Error: --generate-config requires a path argument");
                std::process::exit(1);
            }
            generate_sample_config(&args[2]);
        }
        "--help" | "-h" => {
            print_usage(&args[0]);
        }
        _ => {
            eprintln!("Unknown argument: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Dataset Export Tool

Usage:
    {program} --config <path.toml> [output_dir]   Export dataset from config file
    {program} --generate-config <path>            Generate sample config file
    {program} --help                              Show this help

Examples:
    # Export the standard 9-feature dataset
    {program} --config configs/timing.toml datasets/timing_v1

    # Generate sample config (name it *spatial* for the 12-feature layout)
    {program} --generate-config configs/timing_spatial.toml

For configuration options, see the generated sample config.
"#
    );
}

/// Generate a sample configuration file
fn generate_sample_config(path: &str) {
    // Config names mentioning "spatial" get the Cartesian feature layout
    let is_spatial = path.contains("spatial");

    let mut sample_config = ExtractionConfig::default();
    sample_config.data.data_dir = "/path/to/event/shards".to_string();
    sample_config.data.num_files = 50;
    sample_config.data.use_spatial_features = is_spatial;
    sample_config.metadata = Some(ExperimentMetadata {
        name: if is_spatial {
            "Spatial Timing Dataset".to_string()
        } else {
            "Standard Timing Dataset".to_string()
        },
        description: Some(if is_spatial {
            "Cartesian positions + timing features (12 per cell)".to_string()
        } else {
            "Standard timing feature set (9 per cell)".to_string()
        }),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        version: Some("1.0.0".to_string()),
        tags: None,
    });

    match sample_config.save_toml(path) {
        Ok(()) => {
            println!("✅ Generated sample config: {}", path);
            println!("\nEdit the following fields before running:");
            println!("  - data.data_dir: Directory holding the numbered event shards");
            println!("  - data.num_files: Number of shard indices to process");
            println!("  - split.seed: Fix this for reproducible splits");
            if is_spatial {
                println!("\nSpatial mode enabled:");
                println!("  - Cell rows carry x, y, z ahead of the standard features");
                println!("  - Vertex auxiliary features hold real reco coordinates");
            }
        }
        Err(e) => {
            eprintln!("Error generating config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run export from configuration file
fn run_from_config(config_path: &str, output_dir: &str) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Dataset Export Tool                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // Load and validate configuration
    let config = match ExtractionConfig::load_toml(config_path) {
        Ok(c) => {
            println!("✅ Loaded configuration: {}", config_path);
            c
        }
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Print configuration summary
    print_config_summary(&config, output_dir);

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("❌ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    println!("✅ Configuration validated");
    println!();

    // Run the export
    if let Err(e) = run_export(&config, Path::new(output_dir)) {
        eprintln!("❌ Export failed: {}", e);
        std::process::exit(1);
    }
}

fn print_config_summary(config: &ExtractionConfig, output_dir: &str) {
    let experiment = config
        .metadata
        .as_ref()
        .map(|m| m.name.as_str())
        .unwrap_or("(unnamed)");

    println!("┌─ Configuration Summary ───────────────────────────────────────┐");
    println!("│ Experiment: {:<49} │", experiment);
    println!("│ Data dir:   {:<49} │", config.data.data_dir);
    println!("│ Shards:     {:<49} │", config.data.num_files);
    println!("│ Features:   {:<49} │", config.feature_count());
    println!("│");
    println!("│ Extraction:");
    println!("│   ΔR threshold:    {} rad", config.matching.delta_r_threshold);
    println!("│   Filters:         {}", config.filtering.describe());
    println!(
        "│   Sequence window: {}..{} cells by {}",
        config.sequence.min_cells, config.sequence.max_cells, config.sequence.selection_feature
    );
    match config.data.max_vertex_distance {
        Some(d) => println!("│   Vertex window:   {} mm", d),
        None => println!("│   Vertex window:   disabled"),
    }
    println!(
        "│   Detector params: {}",
        if config.detector_params.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("│");
    println!("│ Dataset:");
    println!(
        "│   Split:           {:.0}% test, {:.0}% of holdout -> val (seed {})",
        config.split.test_fraction * 100.0,
        config.split.val_fraction * 100.0,
        config.split.seed
    );
    println!(
        "│   Skip normalize:  {}",
        config.normalization.skip_normalization.join(", ")
    );
    println!("│   Batch size:      {}", config.packing.batch_size);
    println!("│");
    println!("│ Output:     {}", output_dir);
    println!("└────────────────────────────────────────────────────────────────┘");
    println!();
}

/// Run the export process
fn run_export(config: &ExtractionConfig, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let batch_config = BatchConfig::new().with_error_mode(ErrorMode::CollectErrors);
    let threads = batch_config.effective_threads();

    println!("🚀 Starting extraction (using {} threads)...", threads);
    println!();

    let processor = BatchProcessor::new(config.clone(), batch_config)?
        .with_progress_callback(Box::new(ConsoleProgress::new().verbose()));
    let output = processor.process_all()?;

    // Surface shard failures; extraction already succeeded on the rest
    if output.failed_count() > 0 {
        eprintln!(
            "⚠️  WARNING: {} of {} shards failed to process:",
            output.failed_count(),
            output.failed_count() + output.successful_count()
        );
        for err in &output.errors {
            eprintln!("    ❌ {}: {}", err.shard, err.error);
        }
    }

    let stats = output.merged_stats();
    let dataset = Dataset::from_sequences(output.into_sequences(), stats, config)?;
    let (train, val, test) = dataset.split_sizes();

    println!();
    println!("📦 Exporting {} sequences...", dataset.total_sequences());
    let result = DatasetExporter::new(output_dir).export(&dataset)?;

    // Save the full config alongside the arrays for reproducibility
    config.save_toml(output_dir.join("extraction_config.toml"))?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                       Export Complete                        ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Events processed:   {:<40} ║",
        dataset.stats.total_events
    );
    println!(
        "║  Sequences built:    {:<40} ║",
        format!(
            "{} ({:.1}% retained)",
            dataset.stats.sequences_built(),
            dataset.stats.event_retention() * 100.0
        )
    );
    println!(
        "║  Splits:             {:<40} ║",
        format!("{} train / {} val / {} test", train, val, test)
    );
    if let Some(lengths) = dataset.length_summary() {
        println!(
            "║  Sequence lengths:   {:<40} ║",
            format!(
                "mean {:.1}, median {:.1}, range {}..{}",
                lengths.mean, lengths.median, lengths.min, lengths.max
            )
        );
    }
    println!(
        "║  Cell features:      {:<40} ║",
        dataset.feature_count
    );
    println!(
        "║  Files written:      {:<40} ║",
        result.files.len() + 1
    );
    println!(
        "║  Output directory:   {:<40} ║",
        result
            .export_path
            .display()
            .to_string()
            .chars()
            .take(40)
            .collect::<String>()
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    Ok(())
}
