#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Study-area geometry handling.
//!
//! Turns whatever `GeoJSON` the map front end hands over (a `Feature`, a
//! `FeatureCollection`, or a bare `Polygon`/`MultiPolygon`) into one
//! canonical [`StudyArea`] with its WKT text, and fingerprints payloads so
//! callers can skip re-analysing an unchanged drawing.

pub mod fingerprint;
pub mod normalize;
pub mod wkt_codec;

use geo::{Geometry, MultiPolygon};
use thiserror::Error;

pub use fingerprint::{ChangeDetector, GeometryChange, GeometryFingerprint, fingerprint};
pub use normalize::{StudyArea, normalize, normalize_str};
pub use wkt_codec::{parse_wkt, to_wkt};

/// Errors that can occur while normalizing a study area.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Input is malformed or not a supported polygonal shape.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// Geometry was structurally valid but could not be converted to or
    /// from WKT.
    #[error("Geometry conversion error: {message}")]
    GeometryConversion {
        /// Description of the conversion failure.
        message: String,
    },
}

impl GeometryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}

/// Views a polygonal geometry as a [`MultiPolygon`].
///
/// Returns `None` for anything that is not a `Polygon` or `MultiPolygon`.
#[must_use]
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(multi) => Some(multi.clone()),
        _ => None,
    }
}

/// Collapses a single-member [`MultiPolygon`] to a plain `Polygon`.
#[must_use]
pub fn collapse(multi: MultiPolygon<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        let mut polygons = multi.0;
        // len checked above
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(multi)
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn collapse_single_polygon() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let collapsed = collapse(MultiPolygon::new(vec![poly.clone()]));
        assert_eq!(collapsed, Geometry::Polygon(poly));
    }

    #[test]
    fn collapse_keeps_multi() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let b = polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0)];
        let collapsed = collapse(MultiPolygon::new(vec![a, b]));
        assert!(matches!(collapsed, Geometry::MultiPolygon(ref mp) if mp.0.len() == 2));
    }

    #[test]
    fn as_multi_polygon_rejects_points() {
        assert!(as_multi_polygon(&Geometry::Point(geo::Point::new(1.0, 2.0))).is_none());
    }
}
