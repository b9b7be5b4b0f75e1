//! Cell feature definitions and schema types.
//!
//! The schema fixes which cell-table columns become model features and in
//! what order. Downstream components resolve names against it: the sequence
//! builder reads columns in schema order, the normalizer turns the
//! skip-normalization name list into indices, and the augmentation step
//! locates the region/layer features it keys on.

use crate::event::columns;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Category of a cell feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCategory {
    /// Cartesian cell position (x, y, z)
    Spatial,

    /// Angular cell position (eta, phi)
    Angular,

    /// Detector addressing (barrel flag, sampling layer)
    DetectorPosition,

    /// Measured signal quantities (time, energy, significance)
    Signal,

    /// Track-matching outputs written by the matcher
    TrackMatch,
}

impl FeatureCategory {
    /// All categories in standard order.
    pub fn all() -> &'static [FeatureCategory] {
        &[
            FeatureCategory::Spatial,
            FeatureCategory::Angular,
            FeatureCategory::DetectorPosition,
            FeatureCategory::Signal,
            FeatureCategory::TrackMatch,
        ]
    }

    /// Display name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            FeatureCategory::Spatial => "Spatial",
            FeatureCategory::Angular => "Angular",
            FeatureCategory::DetectorPosition => "Detector Position",
            FeatureCategory::Signal => "Signal",
            FeatureCategory::TrackMatch => "Track Match",
        }
    }
}

/// Definition of a single cell feature.
///
/// The feature name doubles as the cell-table column it is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellFeatureDef {
    /// Feature name == source column name (e.g. "energy")
    pub name: String,

    /// Index in the emitted feature vector
    pub index: usize,

    /// Feature category
    pub category: FeatureCategory,

    /// Human-readable description
    pub description: String,
}

impl CellFeatureDef {
    pub fn new(
        name: impl Into<String>,
        index: usize,
        category: FeatureCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            category,
            description: description.into(),
        }
    }
}

/// Ordered, versioned collection of cell feature definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSchema {
    /// Schema version
    pub version: String,

    /// Feature definitions in vector order
    features: Vec<CellFeatureDef>,

    /// Name-to-index lookup
    #[serde(skip)]
    name_index: AHashMap<String, usize>,
}

impl CellSchema {
    /// Create a new empty schema.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            features: Vec::new(),
            name_index: AHashMap::new(),
        }
    }

    /// Create a schema from a preset.
    pub fn from_preset(preset: super::presets::Preset) -> Self {
        preset.build_schema()
    }

    /// Add a feature to the schema.
    pub fn add_feature(&mut self, feature: CellFeatureDef) {
        self.name_index.insert(feature.name.clone(), feature.index);
        self.features.push(feature);
    }

    /// Number of features (the base feature-vector width, before augmentation).
    pub fn total_count(&self) -> usize {
        self.features.len()
    }

    /// Feature definition by name.
    pub fn get_feature(&self, name: &str) -> Option<&CellFeatureDef> {
        self.name_index.get(name).map(|&idx| &self.features[idx])
    }

    /// Feature-vector index for a name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Feature names in vector order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// All feature definitions in vector order.
    pub fn all_features(&self) -> &[CellFeatureDef] {
        &self.features
    }

    /// Features in a category.
    pub fn features_by_category(&self, category: FeatureCategory) -> Vec<&CellFeatureDef> {
        self.features
            .iter()
            .filter(|f| f.category == category)
            .collect()
    }

    /// Resolve a list of names into vector indices; unknown names are
    /// returned separately instead of failing.
    pub fn resolve_indices(&self, names: &[String]) -> (Vec<usize>, Vec<String>) {
        let mut indices = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.index_of(name) {
                Some(idx) => indices.push(idx),
                None => unknown.push(name.clone()),
            }
        }
        (indices, unknown)
    }

    /// Rebuild the name lookup (call after deserialization).
    pub fn rebuild_indices(&mut self) {
        self.name_index.clear();
        for feature in &self.features {
            self.name_index.insert(feature.name.clone(), feature.index);
        }
    }
}

/// Builder for custom cell schemas.
///
/// Groups are appended in call order; the standard layout is spatial (when
/// enabled) → angular → detector position → signal → track match, matching
/// the feature order of the source dataset.
pub struct CellSchemaBuilder {
    schema: CellSchema,
    next_index: usize,
}

impl CellSchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: CellSchema::new(super::SCHEMA_VERSION),
            next_index: 0,
        }
    }

    fn push(&mut self, name: &str, category: FeatureCategory, description: &str) {
        let feature = CellFeatureDef::new(name, self.next_index, category, description);
        self.schema.add_feature(feature);
        self.next_index += 1;
    }

    /// Add Cartesian position features (x, y, z).
    pub fn with_spatial(mut self) -> Self {
        self.push(columns::X, FeatureCategory::Spatial, "Cell x position [mm]");
        self.push(columns::Y, FeatureCategory::Spatial, "Cell y position [mm]");
        self.push(columns::Z, FeatureCategory::Spatial, "Cell z position [mm]");
        self
    }

    /// Add angular position features (eta, phi).
    pub fn with_angular(mut self) -> Self {
        self.push(columns::ETA, FeatureCategory::Angular, "Cell pseudorapidity");
        self.push(columns::PHI, FeatureCategory::Angular, "Cell azimuth [rad]");
        self
    }

    /// Add detector addressing features (barrel flag, layer index).
    pub fn with_detector_position(mut self) -> Self {
        self.push(
            columns::IS_BARREL,
            FeatureCategory::DetectorPosition,
            "1 = barrel, 0 = endcap",
        );
        self.push(
            columns::LAYER,
            FeatureCategory::DetectorPosition,
            "EM sampling layer (1-based)",
        );
        self
    }

    /// Add signal features (time, energy, significance).
    pub fn with_signal(mut self) -> Self {
        self.push(
            columns::TIME,
            FeatureCategory::Signal,
            "TOF-corrected cell time [ps]",
        );
        self.push(columns::ENERGY, FeatureCategory::Signal, "Cell energy [GeV]");
        self.push(
            columns::SIGNIFICANCE,
            FeatureCategory::Signal,
            "Cell energy significance",
        );
        self
    }

    /// Add track-matching output features (matched pt, matched ΔR).
    pub fn with_track_match(mut self) -> Self {
        self.push(
            columns::MATCHED_TRACK_PT,
            FeatureCategory::TrackMatch,
            "Matched track pt [GeV], 0 when unmatched",
        );
        self.push(
            columns::MATCHED_TRACK_DELTA_R,
            FeatureCategory::TrackMatch,
            "Matched track ΔR, 999 when unmatched",
        );
        self
    }

    /// Build the final schema.
    pub fn build(mut self) -> CellSchema {
        self.schema.rebuild_indices();
        self.schema
    }
}

impl Default for CellSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
