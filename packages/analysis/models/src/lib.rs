#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Soil analysis result types.
//!
//! These types describe the output of a study-area analysis: which soil map
//! units intersect the study area, how much area each one covers, and the
//! representative soil properties of each unit. [`AnalysisResult`] converts
//! to a `GeoJSON` `FeatureCollection` for the map front end.

use std::fmt;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Square metres to acres.
pub const ACRES_PER_SQUARE_METER: f64 = 0.000_247_105_381;

/// Intersections at or below this many acres are treated as noise.
pub const MIN_FEATURE_ACRES: f64 = 0.0001;

/// Converts an area in square metres to acres.
#[must_use]
pub fn square_meters_to_acres(square_meters: f64) -> f64 {
    square_meters * ACRES_PER_SQUARE_METER
}

/// Opaque identifier of a soil survey map unit (`mukey`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapUnitKey(String);

impl MapUnitKey {
    /// Wraps a raw key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is safe to interpolate into a tabular query.
    ///
    /// Map unit keys are always non-empty runs of ASCII digits.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for MapUnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MapUnitKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MapUnitKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Representative soil properties for one map unit.
///
/// Taken from the dominant major component of the unit and its shallowest
/// horizon. Every attribute is optional because the survey tables are
/// sparsely populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilProperties {
    /// Map unit key these properties belong to.
    pub mukey: MapUnitKey,
    /// Map unit name (`muname`).
    pub map_unit_name: Option<String>,
    /// Name of the representative component (`compname`).
    pub component_name: Option<String>,
    /// Share of the map unit covered by the component (`comppct_r`).
    pub component_percent: Option<f64>,
    /// Taxonomic order (e.g. "Mollisols").
    pub taxonomic_order: Option<String>,
    /// Taxonomic suborder (e.g. "Udolls").
    pub taxonomic_suborder: Option<String>,
    /// Drainage class (e.g. "Well drained").
    pub drainage_class: Option<String>,
    /// Reaction class (e.g. "nonacid").
    pub reaction_class: Option<String>,
    /// Surface texture description (e.g. "Silt loam").
    pub texture: Option<String>,
    /// pH in 1:1 water.
    pub ph: Option<f64>,
    /// Organic matter, percent by weight.
    pub organic_matter_pct: Option<f64>,
    /// Total sand, percent.
    pub sand_pct: Option<f64>,
    /// Total silt, percent.
    pub silt_pct: Option<f64>,
    /// Total clay, percent.
    pub clay_pct: Option<f64>,
}

/// Which fallback produced an intersection.
///
/// Diagnostic only. The serialized tags are part of the result contract.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntersectionMethod {
    /// General-purpose polygon overlay.
    #[serde(rename = "turf_intersect")]
    #[strum(to_string = "turf_intersect")]
    Overlay,
    /// Coordinate-ring clipping of the first polygon of each operand.
    PolygonClipping,
    /// The soil polygon lies entirely inside the study area.
    SoilWithinStudy,
    /// The study area lies entirely inside the soil polygon.
    StudyWithinSoil,
}

/// The overlap of one soil polygon with the study area.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionFeature {
    /// Owning map unit.
    pub mukey: MapUnitKey,
    /// Overlap geometry (`Polygon` or `MultiPolygon`).
    pub geometry: geo::Geometry<f64>,
    /// Geodesic area of the overlap.
    pub area_square_meters: f64,
    /// Same area in acres.
    pub area_acres: f64,
    /// Fallback that produced the overlap.
    pub method: IntersectionMethod,
}

/// All overlaps belonging to one map unit, merged with its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilUnitResult {
    /// Map unit key.
    pub mukey: MapUnitKey,
    /// Sum of per-polygon acreage. Overlapping soil polygons of the same
    /// unit are not deduplicated.
    pub area_acres: f64,
    /// Sum of per-polygon area in square metres.
    pub area_square_meters: f64,
    /// Representative soil properties.
    pub properties: SoilProperties,
    /// Individual overlaps, in the order they were computed.
    pub features: Vec<IntersectionFeature>,
}

/// Notes that a multi-feature study area was only partially unioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUnion {
    /// Number of features in the input collection.
    pub total_features: usize,
    /// Zero-based indices of features left out of the union.
    pub skipped_features: Vec<usize>,
}

/// Final output of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Map units ordered by descending area; ties keep discovery order.
    pub units: Vec<SoilUnitResult>,
    /// Sum of `units[*].area_acres`.
    pub total_area_acres: f64,
    /// Number of entries in `units`.
    pub mapunit_count: usize,
    /// The caller's input geometry, echoed back unchanged.
    pub study_area: JsonValue,
    /// Present when some features of the input could not be unioned.
    pub partial_union: Option<PartialUnion>,
}

impl AnalysisResult {
    /// A result with no map units.
    #[must_use]
    pub const fn empty(study_area: JsonValue, partial_union: Option<PartialUnion>) -> Self {
        Self {
            units: Vec::new(),
            total_area_acres: 0.0,
            mapunit_count: 0,
            study_area,
            partial_union,
        }
    }

    /// Builds a result from already-sorted units, deriving the totals.
    #[must_use]
    pub fn from_units(
        units: Vec<SoilUnitResult>,
        study_area: JsonValue,
        partial_union: Option<PartialUnion>,
    ) -> Self {
        let total_area_acres = units.iter().map(|u| u.area_acres).sum();
        let mapunit_count = units.len();
        Self {
            units,
            total_area_acres,
            mapunit_count,
            study_area,
            partial_union,
        }
    }

    /// Returns `true` if no map unit intersected the study area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Converts the result to a `GeoJSON` `FeatureCollection`.
    ///
    /// Every [`IntersectionFeature`] becomes one feature whose properties
    /// carry the map unit key, its own area, the intersection method, the
    /// unit's total acreage and the unit's soil properties. Run-level totals
    /// live in a top-level `properties` member.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .units
            .iter()
            .flat_map(|unit| {
                unit.features
                    .iter()
                    .map(move |feature| intersection_to_feature(unit, feature))
            })
            .collect();

        let mut properties = JsonObject::new();
        properties.insert("total_area_acres".into(), self.total_area_acres.into());
        properties.insert("mapunit_count".into(), self.mapunit_count.into());
        properties.insert("study_area".into(), self.study_area.clone());
        if let Some(partial) = &self.partial_union {
            properties.insert(
                "partial_union".into(),
                serde_json::to_value(partial).unwrap_or(JsonValue::Null),
            );
        }

        let mut foreign_members = JsonObject::new();
        foreign_members.insert("properties".into(), JsonValue::Object(properties));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }
}

fn intersection_to_feature(unit: &SoilUnitResult, feature: &IntersectionFeature) -> Feature {
    let mut properties = match serde_json::to_value(&unit.properties) {
        Ok(JsonValue::Object(map)) => map,
        _ => JsonObject::new(),
    };
    properties.insert("mukey".into(), feature.mukey.as_str().into());
    properties.insert("area_acres".into(), feature.area_acres.into());
    properties.insert(
        "area_square_meters".into(),
        feature.area_square_meters.into(),
    );
    properties.insert("mapunit_area_acres".into(), unit.area_acres.into());
    properties.insert(
        "intersection_method".into(),
        feature.method.as_ref().into(),
    );

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &feature.geometry,
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
