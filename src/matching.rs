//! Track-to-Cell Matching
//!
//! For every calorimeter cell, scans the event's tracks and selects the best
//! match among eligible candidates (valid, hard-scatter origin) whose layer
//! projection lies within a ΔR threshold of the cell.
//!
//! Selection rule: among in-threshold candidates the **highest-pt** track wins,
//! not the angularly closest one. With candidates A(ΔR=0.01, pt=2.0) and
//! B(ΔR=0.04, pt=5.0) the match is B. Ties on pt keep the earlier track.
//!
//! Matching writes three columns onto the cell table (`matched_track_pt`,
//! `matched_track_delta_r`, `matched_track_hs`); unmatched cells carry the
//! sentinels 0.0 / 999.0 / 0.0.

use crate::error::{ExtractError, Result};
use crate::event::{columns, CellTable, LayerKey, Track};
use crate::geometry::delta_r;
use serde::{Deserialize, Serialize};

/// Sentinel ΔR reported for cells with no matched track.
pub const UNMATCHED_DELTA_R: f64 = 999.0;

// ============================================================================
// Configuration
// ============================================================================

/// Track matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum ΔR between a cell and a track projection, in radians.
    pub delta_r_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            delta_r_threshold: 0.05,
        }
    }
}

impl MatcherConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.delta_r_threshold.is_finite() || self.delta_r_threshold <= 0.0 {
            return Err(format!(
                "delta_r_threshold must be positive and finite, got {}",
                self.delta_r_threshold
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Match result
// ============================================================================

/// Outcome of matching one cell against the tracks of its event.
///
/// Ephemeral: consumed immediately to populate the matched-track cell columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Transverse momentum of the selected track, or 0.0 when unmatched.
    pub pt: f64,
    /// ΔR to the selected track, or [`UNMATCHED_DELTA_R`].
    pub delta_r: f64,
    /// Whether a hard-scatter track survived selection.
    pub matched: bool,
}

impl MatchResult {
    /// The no-match result carrying both sentinels.
    pub const fn unmatched() -> Self {
        Self {
            pt: 0.0,
            delta_r: UNMATCHED_DELTA_R,
            matched: false,
        }
    }
}

// ============================================================================
// Matcher
// ============================================================================

/// Matches cells to the highest-pt in-threshold hard-scatter track.
#[derive(Debug, Clone)]
pub struct TrackMatcher {
    config: MatcherConfig,
}

impl TrackMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match a single cell, identified by its layer address and angular
    /// position, against the event's tracks.
    ///
    /// A cell with no tracks, or an event with zero eligible tracks, yields
    /// [`MatchResult::unmatched`] — never an error. Tracks without a
    /// projection for the cell's layer are not candidates.
    pub fn match_cell(
        &self,
        key: LayerKey,
        cell_eta: f64,
        cell_phi: f64,
        tracks: &[Track],
    ) -> MatchResult {
        let mut best = MatchResult::unmatched();

        for track in tracks {
            if !track.is_eligible() {
                continue;
            }
            let Some(proj) = track.projection(key) else {
                continue;
            };
            let dr = delta_r(cell_eta, cell_phi, proj.eta, proj.phi);
            if dr > self.config.delta_r_threshold {
                continue;
            }
            // Highest pt wins; strict comparison keeps the earlier track on ties.
            if track.pt > best.pt {
                best.pt = track.pt;
                best.delta_r = dr;
            }
        }

        best.matched = best.pt > 0.0;
        best
    }

    /// Match every cell in a table and append the three matched-track columns.
    ///
    /// The input table must carry `eta`, `phi`, `is_barrel` and `layer`
    /// columns; their absence is a schema error (the store produced a table
    /// the pipeline cannot address).
    pub fn match_table(&self, cells: &CellTable, tracks: &[Track]) -> Result<CellTable> {
        let eta = required_column(cells, columns::ETA)?;
        let phi = required_column(cells, columns::PHI)?;
        let is_barrel = required_column(cells, columns::IS_BARREL)?;
        let layer = required_column(cells, columns::LAYER)?;

        let n = cells.len();
        let mut pt_col = Vec::with_capacity(n);
        let mut dr_col = Vec::with_capacity(n);
        let mut hs_col = Vec::with_capacity(n);

        for i in 0..n {
            let key = LayerKey::from_cell_fields(is_barrel[i], layer[i]);
            let result = self.match_cell(key, eta[i], phi[i], tracks);
            pt_col.push(result.pt);
            dr_col.push(result.delta_r);
            hs_col.push(if result.matched { 1.0 } else { 0.0 });
        }

        let mut out = cells.clone();
        out.insert_column(columns::MATCHED_TRACK_PT, pt_col)
            .map_err(ExtractError::Schema)?;
        out.insert_column(columns::MATCHED_TRACK_DELTA_R, dr_col)
            .map_err(ExtractError::Schema)?;
        out.insert_column(columns::MATCHED_TRACK_HS, hs_col)
            .map_err(ExtractError::Schema)?;
        Ok(out)
    }
}

fn required_column<'a>(cells: &'a CellTable, name: &str) -> Result<&'a [f64]> {
    cells
        .column(name)
        .ok_or_else(|| ExtractError::schema(format!("cell table is missing column {name:?}")))
}
