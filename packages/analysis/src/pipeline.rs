//! The end-to-end analysis of one study area.
//!
//! Steps run strictly in sequence and the per-unit loop is sequential, so
//! the service sees at most one query at a time from a run:
//!
//! 1. Normalize the input geometry.
//! 2. Look up the map units intersecting the study area.
//! 3. Truncate to `max_results`, in lookup order.
//! 4. Fetch representative soil properties for the remaining units.
//! 5. For each unit, fetch its polygons and intersect them with the study
//!    area, accumulating acreage.
//! 6. Rank units by acreage.
//!
//! Failures inside step 5 only remove the affected polygon or unit.
//! Normalization errors, query errors that exhaust their retries, and
//! cancellation end the run.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use soil_map_analysis_models::{
    AnalysisResult, IntersectionFeature, MIN_FEATURE_ACRES, MapUnitKey, SoilProperties,
    SoilUnitResult, square_meters_to_acres,
};
use soil_map_geometry::{StudyArea, normalize, parse_wkt};
use soil_map_query::{ExecuteOptions, QueryError, QueryExecutor, cell_str};

use crate::progress::{ProgressCallback, null_progress};
use crate::properties::fetch_properties;
use crate::{AnalysisError, queries};

/// Progress is reported as a percentage.
const PROGRESS_TOTAL: u64 = 100;
const CONVERTING: u64 = 0;
const FINDING_UNITS: u64 = 20;
const RETRIEVING_PROPERTIES: u64 = 40;
const COMPUTING_INTERSECTIONS: u64 = 60;
const INTERSECTIONS_DONE: u64 = 95;

/// Options for a single run.
#[derive(Clone)]
pub struct RunOptions {
    /// Keep at most this many map units. Zero means no limit.
    pub max_results: usize,
    /// Per-query settings, including the run's cancellation token.
    pub execute: ExecuteOptions,
    /// Receives phase and per-unit progress.
    pub progress: Arc<dyn ProgressCallback>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_results: 0,
            execute: ExecuteOptions::default(),
            progress: null_progress(),
        }
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("max_results", &self.max_results)
            .field("execute", &self.execute)
            .finish_non_exhaustive()
    }
}

impl RunOptions {
    fn report(&self, current: u64, message: &str) {
        self.progress.report(current, PROGRESS_TOTAL, message);
    }

    fn ensure_not_cancelled(&self) -> Result<(), AnalysisError> {
        if self.execute.cancel.is_cancelled() {
            log::info!("Analysis cancelled");
            return Err(QueryError::cancelled().into());
        }
        Ok(())
    }
}

/// Runs the full analysis for `payload`.
///
/// `payload` is a `GeoJSON` `FeatureCollection`, `Feature`, or bare
/// `Polygon`/`MultiPolygon`; it is echoed back on the result.
///
/// # Errors
///
/// * [`AnalysisError::Geometry`] if the payload cannot be normalized.
/// * [`AnalysisError::Query`] if the map unit lookup or the property fetch
///   fails after its retries, or the run is cancelled.
pub async fn run(
    executor: &QueryExecutor,
    payload: &Value,
    options: &RunOptions,
) -> Result<AnalysisResult, AnalysisError> {
    options.report(CONVERTING, "Converting geometry");
    options.ensure_not_cancelled()?;
    let study = normalize(payload)?;

    options.report(FINDING_UNITS, "Finding soil map units");
    options.ensure_not_cancelled()?;
    let mut keys = lookup_mapunit_keys(executor, &study, &options.execute).await?;

    if keys.is_empty() {
        log::info!("No soil map units intersect the study area");
        options.report(PROGRESS_TOTAL, "Complete");
        return Ok(AnalysisResult::empty(payload.clone(), study.partial_union));
    }

    if options.max_results > 0 && keys.len() > options.max_results {
        log::warn!(
            "Found {} map units, keeping the first {} in lookup order",
            keys.len(),
            options.max_results
        );
        keys.truncate(options.max_results);
    }

    options.report(RETRIEVING_PROPERTIES, "Retrieving soil properties");
    options.ensure_not_cancelled()?;
    let mut properties = fetch_properties(executor, &keys, &options.execute).await?;

    options.report(COMPUTING_INTERSECTIONS, "Computing intersections");
    options.ensure_not_cancelled()?;

    let total = keys.len() as u64;
    let mut units = Vec::with_capacity(keys.len());

    for (index, key) in keys.iter().enumerate() {
        options.ensure_not_cancelled()?;

        let features = match unit_intersections(executor, key, &study, &options.execute).await {
            Ok(features) => features,
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                log::warn!("Skipping map unit {key}: polygon query failed: {e}");
                Vec::new()
            }
        };

        if let Some(unit) = aggregate_unit(key, features, properties.remove(key)) {
            units.push(unit);
        }

        let done = index as u64 + 1;
        options.report(
            COMPUTING_INTERSECTIONS
                + (INTERSECTIONS_DONE - COMPUTING_INTERSECTIONS) * done / total,
            &format!("Computing intersections ({done}/{total})"),
        );
    }

    // Stable: equal areas keep lookup order.
    units.sort_by(|a, b| b.area_acres.total_cmp(&a.area_acres));

    let result = AnalysisResult::from_units(units, payload.clone(), study.partial_union);
    log::info!(
        "Analysis complete: {} map units, {:.2} acres",
        result.mapunit_count,
        result.total_area_acres
    );

    options.report(PROGRESS_TOTAL, "Complete");
    Ok(result)
}

/// Distinct map unit keys in the order the service returned them.
async fn lookup_mapunit_keys(
    executor: &QueryExecutor,
    study: &StudyArea,
    options: &ExecuteOptions,
) -> Result<Vec<MapUnitKey>, QueryError> {
    let rows = executor
        .execute(&queries::mapunit_keys_for_wkt(&study.wkt), options)
        .await?;

    let mut seen = HashSet::new();
    let keys: Vec<MapUnitKey> = rows
        .iter()
        .filter_map(|row| cell_str(row, 0))
        .map(MapUnitKey::from)
        .filter(|key| seen.insert(key.clone()))
        .collect();

    log::info!("Found {} soil map units", keys.len());
    Ok(keys)
}

/// Intersects every polygon of one map unit with the study area.
///
/// Polygons that fail to parse or intersect contribute nothing.
async fn unit_intersections(
    executor: &QueryExecutor,
    key: &MapUnitKey,
    study: &StudyArea,
    options: &ExecuteOptions,
) -> Result<Vec<IntersectionFeature>, QueryError> {
    let Some(query) = queries::mapunit_polygons(key) else {
        return Ok(Vec::new());
    };
    let rows = executor.execute(&query, options).await?;

    let mut features = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let Some(wkt) = cell_str(row, 0) else {
            log::debug!("Map unit {key} polygon {index} has no geometry");
            continue;
        };

        let soil = match parse_wkt(&wkt) {
            Ok(geometry) => geometry,
            Err(e) => {
                log::warn!("Map unit {key} polygon {index}: {e}");
                continue;
            }
        };

        let Some(found) = soil_map_intersection::intersect(&soil, &study.geometry) else {
            continue;
        };

        let area_acres = square_meters_to_acres(found.area_square_meters);
        if area_acres <= MIN_FEATURE_ACRES {
            log::trace!("Map unit {key} polygon {index}: {area_acres} acres below noise floor");
            continue;
        }

        features.push(IntersectionFeature {
            mukey: key.clone(),
            geometry: found.geometry,
            area_square_meters: found.area_square_meters,
            area_acres,
            method: found.method,
        });
    }

    Ok(features)
}

fn aggregate_unit(
    key: &MapUnitKey,
    features: Vec<IntersectionFeature>,
    properties: Option<SoilProperties>,
) -> Option<SoilUnitResult> {
    let area_acres: f64 = features.iter().map(|f| f.area_acres).sum();
    let area_square_meters: f64 = features.iter().map(|f| f.area_square_meters).sum();

    if area_acres <= 0.0 {
        log::debug!("Dropping map unit {key}: no intersecting area");
        return None;
    }
    let Some(properties) = properties else {
        log::warn!("Dropping map unit {key}: no soil properties");
        return None;
    };

    Some(SoilUnitResult {
        mukey: key.clone(),
        area_acres,
        area_square_meters,
        properties,
        features,
    })
}
