//! `GeoJSON` to canonical study area.
//!
//! A `FeatureCollection` with more than one feature is unioned left to
//! right. A feature whose union fails is skipped and the running union is
//! kept; the skipped indices are reported on [`StudyArea::partial_union`]
//! rather than dropped silently.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{BooleanOps as _, Geometry, MultiPolygon};
use serde_json::Value;
use soil_map_analysis_models::PartialUnion;

use crate::{GeometryError, as_multi_polygon, collapse, wkt_codec};

/// A normalized study area: one `Polygon` or `MultiPolygon` in
/// longitude/latitude degrees plus its WKT serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyArea {
    /// Canonical geometry. Always a `Polygon` or `MultiPolygon`.
    pub geometry: Geometry<f64>,
    /// WKT text of [`Self::geometry`].
    pub wkt: String,
    /// Set when some features of a multi-feature input were left out.
    pub partial_union: Option<PartialUnion>,
}

impl StudyArea {
    /// Returns `true` if the geometry under-covers the input because some
    /// features could not be unioned.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial_union.is_some()
    }
}

/// Normalizes a `GeoJSON` payload given as text.
///
/// # Errors
///
/// * [`GeometryError::InvalidGeometry`] if the text is not JSON or the
///   payload is not a supported polygonal shape.
/// * [`GeometryError::GeometryConversion`] if WKT serialization fails.
pub fn normalize_str(text: &str) -> Result<StudyArea, GeometryError> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| GeometryError::invalid(format!("payload is not valid JSON: {e}")))?;
    normalize(&payload)
}

/// Normalizes a `Feature`, `FeatureCollection`, or bare
/// `Polygon`/`MultiPolygon` into a [`StudyArea`].
///
/// # Errors
///
/// * [`GeometryError::InvalidGeometry`] if the payload lacks a `type`,
///   lacks `coordinates`, or is not a polygonal shape.
/// * [`GeometryError::GeometryConversion`] if WKT serialization produces
///   no text.
pub fn normalize(payload: &Value) -> Result<StudyArea, GeometryError> {
    let (geometry, partial_union) = match type_of(payload)? {
        "FeatureCollection" => collection_geometry(payload)?,
        "Feature" => (feature_geometry(payload)?, None),
        _ => (bare_geometry(payload)?, None),
    };

    let wkt = wkt_codec::to_wkt(&geometry)?;
    log::debug!("Normalized study area to {} bytes of WKT", wkt.len());

    Ok(StudyArea {
        geometry,
        wkt,
        partial_union,
    })
}

fn type_of(value: &Value) -> Result<&str, GeometryError> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeometryError::invalid("missing `type`"))
}

fn collection_geometry(
    payload: &Value,
) -> Result<(Geometry<f64>, Option<PartialUnion>), GeometryError> {
    let features = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| GeometryError::invalid("FeatureCollection has no `features` array"))?;

    match features.as_slice() {
        [] => Err(GeometryError::invalid("FeatureCollection is empty")),
        [only] => Ok((feature_geometry(only)?, None)),
        many => union_features(many),
    }
}

fn feature_geometry(feature: &Value) -> Result<Geometry<f64>, GeometryError> {
    match feature.get("geometry") {
        Some(geometry) if geometry.is_object() => bare_geometry(geometry),
        _ => Err(GeometryError::invalid("Feature has no geometry")),
    }
}

fn bare_geometry(value: &Value) -> Result<Geometry<f64>, GeometryError> {
    let kind = type_of(value)?;
    if !matches!(kind, "Polygon" | "MultiPolygon") {
        return Err(GeometryError::invalid(format!(
            "unsupported geometry type `{kind}`; expected Polygon or MultiPolygon"
        )));
    }
    if value.get("coordinates").is_none_or(Value::is_null) {
        return Err(GeometryError::invalid(format!("{kind} is missing `coordinates`")));
    }

    let geojson_geometry = geojson::Geometry::from_json_value(value.clone())
        .map_err(|e| GeometryError::invalid(format!("malformed {kind}: {e}")))?;

    Geometry::<f64>::try_from(geojson_geometry)
        .map_err(|e| GeometryError::invalid(format!("malformed {kind}: {e}")))
}

fn union_features(
    features: &[Value],
) -> Result<(Geometry<f64>, Option<PartialUnion>), GeometryError> {
    let mut running: Option<MultiPolygon<f64>> = None;
    let mut skipped = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        let next = match feature_geometry(feature) {
            Ok(geometry) => as_multi_polygon(&geometry),
            Err(e) => {
                log::warn!("Skipping feature {index} of study area: {e}");
                skipped.push(index);
                continue;
            }
        };
        let Some(next) = next else {
            log::warn!("Skipping non-polygonal feature {index} of study area");
            skipped.push(index);
            continue;
        };

        running = Some(match running {
            None => next,
            Some(acc) => match try_union(&acc, &next) {
                Some(union) => union,
                None => {
                    log::warn!("Union failed for feature {index} of study area, skipping it");
                    skipped.push(index);
                    acc
                }
            },
        });
    }

    let union = running
        .filter(|mp| !mp.0.is_empty())
        .ok_or_else(|| GeometryError::invalid("no feature of the FeatureCollection is usable"))?;

    let partial_union = if skipped.is_empty() {
        None
    } else {
        log::warn!(
            "Study area is a partial union: {} of {} features skipped ({skipped:?})",
            skipped.len(),
            features.len(),
        );
        Some(PartialUnion {
            total_features: features.len(),
            skipped_features: skipped,
        })
    };

    Ok((collapse(union), partial_union))
}

/// Unions two multipolygons, treating a panic inside the overlay engine as
/// a failed union.
fn try_union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    catch_unwind(AssertUnwindSafe(|| a.union(b))).ok()
}
