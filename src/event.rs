//! Event data model.
//!
//! An [`Event`] is read once from the event store and is immutable inside the
//! pipeline, with one exception: the track matcher appends its three output
//! columns to the cell table (write-once, never mutated again).
//!
//! Cells are stored columnar — a [`CellTable`] maps column names to equal-length
//! `f64` vectors, mirroring the named per-event field tables of the store.
//! Tracks are row records; their angular projections are keyed by
//! [`LayerKey`], and a missing key means the track did not cross that layer
//! (it is *not a candidate* there, which is different from a projection at
//! the origin).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Column names
// ============================================================================

/// Canonical cell-table column names.
///
/// Configuration fields (`cell_selection_feature`, `skip_normalization`,
/// additional filter conditions) refer to columns by these names.
pub mod columns {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const Z: &str = "z";
    pub const ETA: &str = "eta";
    pub const PHI: &str = "phi";
    pub const IS_BARREL: &str = "is_barrel";
    pub const LAYER: &str = "layer";
    pub const TIME: &str = "time";
    pub const ENERGY: &str = "energy";
    pub const SIGNIFICANCE: &str = "significance";
    pub const VALID: &str = "valid";

    /// Written by the track matcher: best-match transverse momentum (0.0 when unmatched).
    pub const MATCHED_TRACK_PT: &str = "matched_track_pt";
    /// Written by the track matcher: best-match ΔR (999.0 when unmatched).
    pub const MATCHED_TRACK_DELTA_R: &str = "matched_track_delta_r";
    /// Written by the track matcher: 1.0 iff matched to a hard-scatter track.
    pub const MATCHED_TRACK_HS: &str = "matched_track_hs";

    /// Every canonical column, store fields and matcher outputs together.
    pub const ALL: [&str; 14] = [
        X,
        Y,
        Z,
        ETA,
        PHI,
        IS_BARREL,
        LAYER,
        TIME,
        ENERGY,
        SIGNIFICANCE,
        VALID,
        MATCHED_TRACK_PT,
        MATCHED_TRACK_DELTA_R,
        MATCHED_TRACK_HS,
    ];

    /// Whether `name` is a canonical column (filter conditions are checked
    /// against this set at configuration-load time).
    pub fn is_canonical(name: &str) -> bool {
        ALL.contains(&name)
    }
}

// ============================================================================
// Detector addressing
// ============================================================================

/// Barrel vs endcap region of the electromagnetic calorimeter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorRegion {
    Barrel,
    Endcap,
}

impl DetectorRegion {
    /// Decode the cell table's `is_barrel` flag column (1.0 = barrel).
    #[inline]
    pub fn from_flag(flag: f64) -> Self {
        if flag >= 0.5 {
            DetectorRegion::Barrel
        } else {
            DetectorRegion::Endcap
        }
    }

    /// Encode back to the flag representation used in cell tables.
    #[inline]
    pub fn as_flag(self) -> f64 {
        match self {
            DetectorRegion::Barrel => 1.0,
            DetectorRegion::Endcap => 0.0,
        }
    }

    /// Detector naming prefix ("EMB" / "EME").
    pub fn prefix(self) -> &'static str {
        match self {
            DetectorRegion::Barrel => "EMB",
            DetectorRegion::Endcap => "EME",
        }
    }
}

/// A (region, layer) address, e.g. EMB2 = barrel sampling layer 2.
///
/// Serialized as its detector name ("EMB1".."EME3") so shard JSON and config
/// files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LayerKey {
    pub region: DetectorRegion,
    /// Sampling layer, 1-based (1..=3 for the EM calorimeter).
    pub layer: u8,
}

impl LayerKey {
    pub const fn new(region: DetectorRegion, layer: u8) -> Self {
        Self { region, layer }
    }

    /// All layer keys with track projections, in detector order.
    pub fn all() -> [LayerKey; 6] {
        [
            LayerKey::new(DetectorRegion::Barrel, 1),
            LayerKey::new(DetectorRegion::Barrel, 2),
            LayerKey::new(DetectorRegion::Barrel, 3),
            LayerKey::new(DetectorRegion::Endcap, 1),
            LayerKey::new(DetectorRegion::Endcap, 2),
            LayerKey::new(DetectorRegion::Endcap, 3),
        ]
    }

    /// Build from the flag/index representation stored in cell tables.
    #[inline]
    pub fn from_cell_fields(is_barrel: f64, layer: f64) -> Self {
        Self {
            region: DetectorRegion::from_flag(is_barrel),
            layer: layer as u8,
        }
    }

    /// Parse a detector name such as "EMB2" or "EME1".
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, layer_str) = name.split_at(name.len().checked_sub(1)?);
        let layer: u8 = layer_str.parse().ok()?;
        let region = match prefix {
            "EMB" => DetectorRegion::Barrel,
            "EME" => DetectorRegion::Endcap,
            _ => return None,
        };
        Some(Self { region, layer })
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.region.prefix(), self.layer)
    }
}

impl From<LayerKey> for String {
    fn from(key: LayerKey) -> String {
        key.to_string()
    }
}

impl TryFrom<String> for LayerKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        LayerKey::parse(&value).ok_or_else(|| format!("unknown layer key: {value:?}"))
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// Angular position of a track extrapolated to one calorimeter layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackProjection {
    pub eta: f64,
    pub phi: f64,
}

/// A reconstructed charged-particle track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Transverse momentum in GeV.
    pub pt: f64,

    /// Reconstruction validity flag.
    pub valid: bool,

    /// True when the track originates from the hard-scatter vertex
    /// (as opposed to pileup).
    pub from_hard_scatter: bool,

    /// Extrapolated (eta, phi) per crossed layer. Layers the track did not
    /// cross are absent.
    #[serde(default)]
    pub projections: AHashMap<LayerKey, TrackProjection>,
}

impl Track {
    /// A track is eligible for matching when both quality flags hold.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.valid && self.from_hard_scatter
    }

    /// Projection at the given layer, if the track crossed it.
    #[inline]
    pub fn projection(&self, key: LayerKey) -> Option<TrackProjection> {
        self.projections.get(&key).copied()
    }
}

// ============================================================================
// Vertices
// ============================================================================

/// A reconstructed or truth interaction point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another vertex, in mm.
    pub fn distance_to(&self, other: &Vertex) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Spatial components in (x, y, z) order, for auxiliary feature vectors.
    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

// ============================================================================
// Cell table
// ============================================================================

/// Columnar cell storage: named columns of equal length, one row per cell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellTable {
    len: usize,
    columns: AHashMap<String, Vec<f64>>,
}

impl CellTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells (rows).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Single value by (column, row).
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.columns.get(name).and_then(|col| col.get(row)).copied()
    }

    /// Column names in sorted order (stable for diagnostics).
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Insert (or replace) a column. The first column fixes the row count;
    /// later columns must match it.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> std::result::Result<(), String> {
        let name = name.into();
        if self.columns.is_empty() {
            self.len = values.len();
        } else if values.len() != self.len {
            return Err(format!(
                "column {:?} has {} rows, table has {}",
                name,
                values.len(),
                self.len
            ));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Row subset selected by a boolean mask (row order preserved).
    ///
    /// Panics if the mask length differs from the row count; callers build the
    /// mask from this table's own columns.
    pub fn select(&self, mask: &[bool]) -> CellTable {
        assert_eq!(mask.len(), self.len, "mask length must equal row count");
        let kept = mask.iter().filter(|&&m| m).count();
        let mut columns = AHashMap::with_capacity(self.columns.len());
        for (name, col) in &self.columns {
            let filtered: Vec<f64> = col
                .iter()
                .zip(mask.iter())
                .filter_map(|(&v, &keep)| keep.then_some(v))
                .collect();
            columns.insert(name.clone(), filtered);
        }
        CellTable { len: kept, columns }
    }

    /// Row subset in the given index order (used for ranked truncation).
    pub fn gather(&self, indices: &[usize]) -> CellTable {
        let mut columns = AHashMap::with_capacity(self.columns.len());
        for (name, col) in &self.columns {
            let gathered: Vec<f64> = indices.iter().map(|&i| col[i]).collect();
            columns.insert(name.clone(), gathered);
        }
        CellTable {
            len: indices.len(),
            columns,
        }
    }

    /// Check the equal-length invariant (useful after deserialization).
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, col) in &self.columns {
            if col.len() != self.len {
                return Err(format!(
                    "column {:?} has {} rows, table claims {}",
                    name,
                    col.len(),
                    self.len
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Events
// ============================================================================

/// One detector event: vertices, cells, tracks, and the prediction target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier from the source dataset.
    pub event_number: i64,

    /// Generator-level hard-scatter vertex position.
    pub truth_vertex: Vertex,

    /// Reconstructed hard-scatter vertex position.
    pub reco_vertex: Vertex,

    /// Reconstructed vertex time — the downstream prediction target.
    pub vertex_time: f64,

    /// Energy-deposit cells, columnar.
    pub cells: CellTable,

    /// Reconstructed tracks.
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Event {
    /// Truth↔reco vertex displacement, used by the event quality gate.
    pub fn vertex_displacement(&self) -> f64 {
        self.truth_vertex.distance_to(&self.reco_vertex)
    }

    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.cells
            .validate()
            .map_err(|e| format!("event {}: {e}", self.event_number))
    }
}
