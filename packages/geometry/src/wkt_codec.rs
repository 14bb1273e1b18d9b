//! WKT conversion for study areas and soil polygons.

use geo::Geometry;
use wkt::{ToWkt as _, TryFromWkt as _};

use crate::GeometryError;

/// Serializes a geometry as WKT.
///
/// # Errors
///
/// Returns [`GeometryError::GeometryConversion`] if the serialization is
/// empty (including `EMPTY` geometries, which no query can use).
pub fn to_wkt(geometry: &Geometry<f64>) -> Result<String, GeometryError> {
    let text = geometry.wkt_string();
    let trimmed = text.trim();

    if trimmed.is_empty() || trimmed.ends_with("EMPTY") {
        return Err(GeometryError::GeometryConversion {
            message: format!("WKT serialization produced no coordinates: {trimmed:?}"),
        });
    }

    Ok(text)
}

/// Parses WKT text into a geometry.
///
/// # Errors
///
/// Returns [`GeometryError::GeometryConversion`] if the text is not valid
/// WKT.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>, GeometryError> {
    Geometry::<f64>::try_from_wkt_str(text.trim()).map_err(|e| {
        GeometryError::GeometryConversion {
            message: format!("invalid WKT: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    #[test]
    fn parses_polygon() {
        let geometry = parse_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert!(matches!(geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn parses_multipolygon_with_surrounding_whitespace() {
        let geometry =
            parse_wkt("  MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))\n")
                .unwrap();
        assert!(matches!(geometry, Geometry::MultiPolygon(ref mp) if mp.0.len() == 2));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_wkt("POLYGON((0 0, 1").unwrap_err();
        assert!(matches!(err, GeometryError::GeometryConversion { .. }));
    }

    #[test]
    fn serializes_polygon() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0)];
        let text = to_wkt(&Geometry::Polygon(poly)).unwrap();
        assert!(text.starts_with("POLYGON"));
    }

    #[test]
    fn empty_geometry_is_a_conversion_error() {
        let err = to_wkt(&Geometry::MultiPolygon(MultiPolygon::new(vec![]))).unwrap_err();
        assert!(matches!(err, GeometryError::GeometryConversion { .. }));
    }
}
