//! Feature Schema Module
//!
//! Provides versioned, typed feature definitions for reproducible extraction runs.
//! Every downstream stage (matching, filtering, sequence building, normalization,
//! export) resolves columns through the schema rather than hard-coded indices.
//!
//! # Design Philosophy
//!
//! - **Versioned**: Schema versions enable reproducibility across runs
//! - **Typed**: Feature categories and indices are compile-time checked
//! - **Presets**: Standard and spatial layouts match the source dataset
//!
//! # Example
//!
//! ```ignore
//! use cell_sequence_extractor::schema::{CellSchema, Preset};
//!
//! let schema = CellSchema::from_preset(Preset::Standard);
//! assert_eq!(schema.total_count(), 9);
//!
//! let energy = schema.get_feature("energy").unwrap();
//! assert_eq!(energy.index, 5);
//! ```

mod feature_def;
mod presets;

pub use feature_def::{CellFeatureDef, CellSchema, CellSchemaBuilder, FeatureCategory};
pub use presets::{Preset, PresetConfig};

/// Current schema version
pub const SCHEMA_VERSION: &str = "1.0.0";
