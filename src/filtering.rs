//! Cell Filter Chain
//!
//! Selects the subset of an event's cells that satisfy every configured
//! predicate. Two fixed predicates (validity flag, hard-scatter track match)
//! plus an open-ended list of field == value conditions, all combined by
//! logical AND.
//!
//! Filtering never fails an event: a condition naming an unknown field is
//! skipped (warned once, at chain construction), and per-application counts
//! come back in a [`FilterDiagnostics`] instead of being printed from the
//! hot path.

use crate::event::{columns, CellTable};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// One additional field == value condition on cell columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    /// Canonical cell column name.
    pub field: String,
    /// Value the column must equal (exact comparison; intended for flag and
    /// index columns, not continuous features).
    pub value: f64,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// Cell filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Keep only cells whose validity flag is set.
    pub require_valid: bool,

    /// Keep only cells matched to a hard-scatter track.
    pub require_track_match: bool,

    /// Additional conditions, ANDed with the fixed predicates.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_conditions: Vec<FieldCondition>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            require_valid: true,
            require_track_match: true,
            additional_conditions: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Validate configuration parameters.
    ///
    /// Unknown field names are not an error here (they degrade to warnings at
    /// chain construction); malformed conditions are.
    pub fn validate(&self) -> Result<(), String> {
        for cond in &self.additional_conditions {
            if cond.field.is_empty() {
                return Err("additional condition with empty field name".to_string());
            }
            if !cond.value.is_finite() {
                return Err(format!(
                    "additional condition on {:?} has non-finite value {}",
                    cond.field, cond.value
                ));
            }
        }
        Ok(())
    }

    /// Conditions whose field is not a canonical cell column.
    pub fn unknown_fields(&self) -> Vec<String> {
        self.additional_conditions
            .iter()
            .filter(|c| !columns::is_canonical(&c.field))
            .map(|c| c.field.clone())
            .collect()
    }

    /// True when no predicate is active and every cell would pass.
    pub fn is_pass_through(&self) -> bool {
        !self.require_valid && !self.require_track_match && self.additional_conditions.is_empty()
    }

    /// Human-readable predicate summary for logs and manifests.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.require_valid {
            parts.push("valid".to_string());
        }
        if self.require_track_match {
            parts.push("track_match".to_string());
        }
        for cond in &self.additional_conditions {
            parts.push(format!("{} == {}", cond.field, cond.value));
        }
        if parts.is_empty() {
            "pass-through".to_string()
        } else {
            parts.join(" & ")
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Per-application counts, reported instead of printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterDiagnostics {
    pub cells_before: usize,
    pub cells_after: usize,
}

impl FilterDiagnostics {
    /// Number of cells removed by the combined predicates.
    pub fn removed(&self) -> usize {
        self.cells_before - self.cells_after
    }
}

/// Filtered cells plus the counts describing what happened.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub cells: CellTable,
    pub diagnostics: FilterDiagnostics,
}

/// Standalone per-predicate counts for monitoring. Each count is the number
/// of cells passing that predicate *alone* (no sequential attribution), plus
/// the combined result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStatistics {
    pub total_cells: usize,
    pub valid_cells: usize,
    pub track_matched_cells: usize,
    pub final_filtered_cells: usize,
}

// ============================================================================
// Filter chain
// ============================================================================

/// Compiled filter: fixed predicates plus schema-checked extra conditions.
#[derive(Debug, Clone)]
pub struct CellFilterChain {
    config: FilterConfig,
    /// Conditions that survived the canonical-column check.
    active_conditions: Vec<FieldCondition>,
    /// Fields dropped by that check, kept for diagnostics.
    unknown_fields: Vec<String>,
}

impl CellFilterChain {
    /// Compile a filter chain, resolving additional conditions against the
    /// canonical column set. Unknown fields are dropped with a single warning
    /// here, never per event; a fully disabled filter also warns once.
    pub fn new(config: FilterConfig) -> Self {
        let unknown_fields = config.unknown_fields();
        if !unknown_fields.is_empty() {
            log::warn!(
                "ignoring filter conditions on unknown fields: {}",
                unknown_fields.join(", ")
            );
        }
        if config.is_pass_through() {
            log::warn!("all cell filters disabled; every cell will pass");
        }
        let active_conditions = config
            .additional_conditions
            .iter()
            .filter(|c| columns::is_canonical(&c.field))
            .cloned()
            .collect();
        Self {
            config,
            active_conditions,
            unknown_fields,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Fields named by the configuration but absent from the schema.
    pub fn unknown_fields(&self) -> &[String] {
        &self.unknown_fields
    }

    /// Boolean keep-mask over the table's rows.
    ///
    /// Missing columns fail their predicate rather than erroring: a table
    /// without a validity column has no valid cells to offer.
    pub fn mask(&self, cells: &CellTable) -> Vec<bool> {
        let n = cells.len();
        let mut mask = vec![true; n];

        if self.config.require_valid {
            apply_flag(&mut mask, cells.column(columns::VALID));
        }
        if self.config.require_track_match {
            apply_flag(&mut mask, cells.column(columns::MATCHED_TRACK_HS));
        }
        for cond in &self.active_conditions {
            match cells.column(&cond.field) {
                Some(col) => {
                    for (keep, &v) in mask.iter_mut().zip(col) {
                        *keep &= v == cond.value;
                    }
                }
                None => mask.fill(false),
            }
        }
        mask
    }

    /// Apply the chain to a cell table.
    pub fn apply(&self, cells: &CellTable) -> FilterOutcome {
        let mask = self.mask(cells);
        let filtered = cells.select(&mask);
        let diagnostics = FilterDiagnostics {
            cells_before: cells.len(),
            cells_after: filtered.len(),
        };
        FilterOutcome {
            cells: filtered,
            diagnostics,
        }
    }

    /// Per-predicate pass counts for one table, for monitoring dashboards.
    pub fn statistics(&self, cells: &CellTable) -> FilterStatistics {
        let count_flag = |name: &str| {
            cells
                .column(name)
                .map(|col| col.iter().filter(|&&v| v >= 0.5).count())
                .unwrap_or(0)
        };
        FilterStatistics {
            total_cells: cells.len(),
            valid_cells: count_flag(columns::VALID),
            track_matched_cells: count_flag(columns::MATCHED_TRACK_HS),
            final_filtered_cells: self.apply(cells).cells.len(),
        }
    }
}

/// AND a 0/1 flag column into the mask; a missing column keeps nothing.
fn apply_flag(mask: &mut [bool], column: Option<&[f64]>) {
    match column {
        Some(col) => {
            for (keep, &v) in mask.iter_mut().zip(col) {
                *keep &= v >= 0.5;
            }
        }
        None => mask.fill(false),
    }
}
