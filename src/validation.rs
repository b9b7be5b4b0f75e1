//! Sequence Validation Module
//!
//! Provides validation utilities for built cell sequences to ensure data
//! quality and detect anomalies before they propagate into training data.
//!
//! # Validation Categories
//!
//! 1. **Shape Consistency**: Row widths match the feature schema, lengths within bounds
//! 2. **Value Ranges**: NaN/Inf detection, angular coordinates within detector coverage
//! 3. **Auxiliary Data**: Vertex features and the regression target are finite
//!
//! # Usage
//!
//! ```ignore
//! use cell_sequence_extractor::validation::{SequenceValidator, ValidationResult};
//!
//! let validator = SequenceValidator::new(ValidationConfig::default(), &schema, 40);
//! let result = validator.validate_sequence(&sequence);
//!
//! if !result.is_valid() {
//!     for warning in result.warnings() {
//!         log::warn!("{warning}");
//!     }
//! }
//! ```

use crate::schema::CellSchema;
use crate::sequence_builder::CellSequence;
use std::fmt;

/// Validation result for a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    /// Data is valid
    Valid,
    /// Data has minor issues (warnings)
    Warning(String),
    /// Data has serious issues (errors)
    Error(String),
}

impl ValidationLevel {
    /// Check if this result indicates valid data.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    /// Check if this result is a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Aggregated validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All validation results
    results: Vec<(String, ValidationLevel)>,
}

impl ValidationResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation result.
    pub fn add(&mut self, check_name: &str, level: ValidationLevel) {
        self.results.push((check_name.to_string(), level));
    }

    /// Check if all validations passed (no errors or warnings).
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// Get all warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Warning(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Error(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Get all results.
    pub fn all_results(&self) -> &[(String, ValidationLevel)] {
        &self.results
    }

    /// Get the number of checks performed.
    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    /// Get the number of passed checks.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.passed_count();
        let total = self.check_count();
        writeln!(f, "Validation: {passed}/{total} checks passed")?;

        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  - {name}: {level}")?;
            }
        }

        Ok(())
    }
}

/// Configuration for sequence validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum allowed |eta| (detector coverage)
    pub max_abs_eta: f64,

    /// Tolerance added to the [-pi, pi] phi window
    pub phi_tolerance: f64,

    /// Check for NaN/Inf values in rows, vertex features and the target
    pub check_nan_inf: bool,

    /// Check angular coordinates against detector coverage
    pub check_angular_ranges: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_abs_eta: 5.0, // EM calorimeter ends at |eta| = 4.9
            phi_tolerance: 1e-6,
            check_nan_inf: true,
            check_angular_ranges: true,
        }
    }
}

/// Validator for built cell sequences.
///
/// Created once per pipeline from the feature schema, so the per-row checks
/// know where eta and phi live without string lookups per cell.
#[derive(Debug, Clone)]
pub struct SequenceValidator {
    config: ValidationConfig,
    expected_width: usize,
    max_cells: usize,
    eta_index: Option<usize>,
    phi_index: Option<usize>,
}

impl SequenceValidator {
    /// Create a validator for sequences built against `schema`.
    pub fn new(config: ValidationConfig, schema: &CellSchema, max_cells: usize) -> Self {
        Self {
            config,
            expected_width: schema.total_count(),
            max_cells,
            eta_index: schema.index_of("eta"),
            phi_index: schema.index_of("phi"),
        }
    }

    /// Validate a single built sequence.
    pub fn validate_sequence(&self, sequence: &CellSequence) -> ValidationResult {
        let mut result = ValidationResult::new();

        self.validate_shape(sequence, &mut result);

        if self.config.check_nan_inf {
            self.validate_finite(sequence, &mut result);
        }

        if self.config.check_angular_ranges {
            self.validate_angles(sequence, &mut result);
        }

        result
    }

    /// Validate length bounds and per-row width.
    fn validate_shape(&self, sequence: &CellSequence, result: &mut ValidationResult) {
        if sequence.is_empty() {
            result.add(
                "sequence_length",
                ValidationLevel::Error("sequence has no cells".to_string()),
            );
        } else if sequence.len() > self.max_cells {
            result.add(
                "sequence_length",
                ValidationLevel::Error(format!(
                    "sequence has {} cells, limit is {}",
                    sequence.len(),
                    self.max_cells
                )),
            );
        } else {
            result.add("sequence_length", ValidationLevel::Valid);
        }

        let bad_width = sequence
            .features
            .iter()
            .position(|row| row.len() != self.expected_width);
        match bad_width {
            Some(i) => result.add(
                "row_width",
                ValidationLevel::Error(format!(
                    "row {} has width {}, schema expects {}",
                    i,
                    sequence.features[i].len(),
                    self.expected_width
                )),
            ),
            None => result.add("row_width", ValidationLevel::Valid),
        }
    }

    /// Check every stored value for NaN/Inf.
    fn validate_finite(&self, sequence: &CellSequence, result: &mut ValidationResult) {
        let mut all_finite = true;

        for (i, row) in sequence.features.iter().enumerate() {
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                result.add(
                    "cell_values",
                    ValidationLevel::Error(format!(
                        "non-finite value {} at cell {i}, feature {j}",
                        row[j]
                    )),
                );
                all_finite = false;
                break;
            }
        }
        if all_finite {
            result.add("cell_values", ValidationLevel::Valid);
        }

        if sequence.vertex_features.iter().any(|v| !v.is_finite()) {
            result.add(
                "vertex_features",
                ValidationLevel::Error("non-finite vertex feature".to_string()),
            );
        } else {
            result.add("vertex_features", ValidationLevel::Valid);
        }

        if !sequence.vertex_time.is_finite() {
            result.add(
                "vertex_time",
                ValidationLevel::Error(format!(
                    "non-finite vertex time {}",
                    sequence.vertex_time
                )),
            );
        } else {
            result.add("vertex_time", ValidationLevel::Valid);
        }
    }

    /// Check eta/phi stay inside detector coverage.
    ///
    /// Only meaningful on un-normalized sequences; run validation before
    /// normalization rescales the angular columns.
    fn validate_angles(&self, sequence: &CellSequence, result: &mut ValidationResult) {
        let phi_limit = std::f64::consts::PI + self.config.phi_tolerance;
        let mut all_in_range = true;

        for (i, row) in sequence.features.iter().enumerate() {
            if let Some(eta_idx) = self.eta_index {
                if let Some(&eta) = row.get(eta_idx) {
                    if eta.abs() > self.config.max_abs_eta {
                        result.add(
                            "eta_range",
                            ValidationLevel::Warning(format!(
                                "cell {i} has |eta| = {:.3}, coverage ends at {}",
                                eta.abs(),
                                self.config.max_abs_eta
                            )),
                        );
                        all_in_range = false;
                        break;
                    }
                }
            }
            if let Some(phi_idx) = self.phi_index {
                if let Some(&phi) = row.get(phi_idx) {
                    if phi.abs() > phi_limit {
                        result.add(
                            "phi_range",
                            ValidationLevel::Warning(format!(
                                "cell {i} has phi = {phi:.3}, outside [-pi, pi]"
                            )),
                        );
                        all_in_range = false;
                        break;
                    }
                }
            }
        }

        if all_in_range {
            result.add("angular_ranges", ValidationLevel::Valid);
        }
    }
}

/// Validate that a batch of sequences carries unique event numbers.
///
/// Duplicates usually mean the same shard was read twice.
pub fn validate_event_numbers(sequences: &[CellSequence]) -> ValidationResult {
    let mut result = ValidationResult::new();

    if sequences.is_empty() {
        result.add(
            "event_numbers",
            ValidationLevel::Warning("no sequences to validate".to_string()),
        );
        return result;
    }

    let mut seen = ahash::AHashSet::with_capacity(sequences.len());
    let mut unique = true;

    for seq in sequences {
        if !seen.insert(seq.event_number) {
            result.add(
                "event_numbers",
                ValidationLevel::Error(format!(
                    "duplicate event number {} in sequence batch",
                    seq.event_number
                )),
            );
            unique = false;
            break;
        }
    }

    if unique {
        result.add("event_numbers", ValidationLevel::Valid);
    }

    result
}
