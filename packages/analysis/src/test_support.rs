//! In-memory stand-in for the soil data service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use soil_map_query::{QueryError, Row, SoilDataTransport, TransportResponse};

/// Answers the three query shapes from canned tables and records every
/// query it receives.
#[derive(Default)]
pub struct FakeSoilService {
    keys: Vec<String>,
    properties: Vec<Row>,
    polygons: BTreeMap<String, Vec<String>>,
    failing_polygons: BTreeSet<String>,
    fail_properties: bool,
    queries: Mutex<Vec<String>>,
}

impl FakeSoilService {
    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_properties(mut self, rows: Vec<Row>) -> Self {
        self.properties = rows;
        self
    }

    pub fn with_polygons(mut self, key: &str, wkts: &[&str]) -> Self {
        self.polygons
            .insert(key.to_string(), wkts.iter().map(ToString::to_string).collect());
        self
    }

    pub fn failing_polygons(mut self, key: &str) -> Self {
        self.failing_polygons.insert(key.to_string());
        self
    }

    pub const fn failing_properties(mut self) -> Self {
        self.fail_properties = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn polygon_queries(&self) -> usize {
        self.queries()
            .iter()
            .filter(|q| q.contains("SDA_Get_MupolygonWktWgs84_from_Mukey"))
            .count()
    }

    pub fn property_queries(&self) -> usize {
        self.queries()
            .iter()
            .filter(|q| q.contains("ROW_NUMBER"))
            .count()
    }

    fn table(rows: &[Row]) -> TransportResponse {
        if rows.is_empty() {
            return TransportResponse::json("{}");
        }
        TransportResponse::json(json!({ "Table": rows }).to_string())
    }

    fn server_error() -> TransportResponse {
        TransportResponse {
            status: 500,
            content_type: Some("text/plain".to_string()),
            body: "Invalid query".to_string(),
        }
    }
}

#[async_trait]
impl SoilDataTransport for FakeSoilService {
    async fn post(&self, query: &str) -> Result<TransportResponse, QueryError> {
        self.queries.lock().unwrap().push(query.to_string());

        if query.contains("SDA_Get_Mukey_from_intersection_with_WktWgs84") {
            let rows: Vec<Row> = self.keys.iter().map(|k| vec![json!(k)]).collect();
            return Ok(Self::table(&rows));
        }

        if query.contains("ROW_NUMBER") {
            if self.fail_properties {
                return Ok(Self::server_error());
            }
            return Ok(Self::table(&self.properties));
        }

        if let Some(start) = query.find("_from_Mukey('") {
            let rest = &query[start + "_from_Mukey('".len()..];
            let key = rest.split('\'').next().unwrap_or_default();
            if self.failing_polygons.contains(key) {
                return Ok(Self::server_error());
            }
            let rows: Vec<Row> = self
                .polygons
                .get(key)
                .map(|wkts| wkts.iter().map(|w| vec![json!(w)]).collect())
                .unwrap_or_default();
            return Ok(Self::table(&rows));
        }

        Ok(Self::server_error())
    }
}

/// A property row for `mukey` in the column order of the property query.
pub fn property_row(mukey: &str) -> Row {
    [
        mukey,
        "Clarion loam, 2 to 5 percent slopes",
        "Clarion",
        "85",
        "Mollisols",
        "Udolls",
        "Moderately well drained",
        "mesic",
        "Loam",
        "6.2",
        "3.5",
        "40.0",
        "38.0",
        "22.0",
    ]
    .iter()
    .map(|cell| Value::String((*cell).to_string()))
    .collect()
}

/// WKT of an axis-aligned rectangle.
pub fn rectangle_wkt(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
    format!("POLYGON (({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))")
}

/// A single-feature `FeatureCollection` holding an axis-aligned rectangle.
pub fn rectangle_collection(x0: f64, y0: f64, x1: f64, y1: f64) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "name": "field" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
            }
        }]
    })
}
