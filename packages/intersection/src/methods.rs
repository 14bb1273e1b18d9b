//! The three intersection methods, in the order they are tried.
//!
//! Each takes the same [`Operands`] and returns `Ok(None)` when it ran
//! cleanly but found no overlap.

use geo::{
    BooleanOps as _, Coord, GeodesicArea as _, LineString, MultiPolygon, Polygon, Relate as _,
};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay as _;
use soil_map_analysis_models::IntersectionMethod;
use soil_map_geometry::collapse;

use crate::{Intersection, IntersectionError, Operands};

/// A ring as raw `[x, y]` points without the closing duplicate.
type Contour = Vec<[f64; 2]>;

/// Exterior first, then holes.
type Shape = Vec<Contour>;

/// Geodesic area of a multipolygon in square metres.
#[must_use]
pub fn area_square_meters(multi: &MultiPolygon<f64>) -> f64 {
    multi.geodesic_area_unsigned()
}

fn found(multi: MultiPolygon<f64>, method: IntersectionMethod) -> Option<Intersection> {
    if multi.0.is_empty() {
        return None;
    }
    let area_square_meters = area_square_meters(&multi);
    Some(Intersection {
        geometry: collapse(multi),
        area_square_meters,
        method,
    })
}

/// Direct polygon overlay of both operands.
///
/// # Errors
///
/// Returns [`IntersectionError::MethodFailed`] if the overlay produced a
/// non-finite area.
pub fn overlay(operands: Operands<'_>) -> Result<Option<Intersection>, IntersectionError> {
    let result = operands.soil.intersection(operands.study);
    match found(result, IntersectionMethod::Overlay) {
        Some(hit) if !hit.area_square_meters.is_finite() => Err(IntersectionError::MethodFailed {
            method: "overlay",
            message: "non-finite area".to_string(),
        }),
        other => Ok(other),
    }
}

/// Clips the raw coordinate rings of the first polygon of each operand.
///
/// Only the first polygon of a `MultiPolygon` takes part. The clip result
/// is rebuilt as a `Polygon` when it has one shape and a `MultiPolygon`
/// otherwise.
///
/// # Errors
///
/// Returns [`IntersectionError::MethodFailed`] if either operand has no
/// usable ring.
pub fn clip_rings(operands: Operands<'_>) -> Result<Option<Intersection>, IntersectionError> {
    let subject = first_shape(operands.soil).ok_or_else(|| no_ring("soil"))?;
    let clip = first_shape(operands.study).ok_or_else(|| no_ring("study area"))?;

    let shapes: Vec<Shape> = subject.overlay(&clip, OverlayRule::Intersect, FillRule::EvenOdd);

    let polygons: Vec<Polygon<f64>> = shapes
        .iter()
        .filter_map(|shape| shape_to_polygon(shape))
        .collect();

    Ok(found(
        MultiPolygon::new(polygons),
        IntersectionMethod::PolygonClipping,
    ))
}

/// Whole-polygon containment in either direction.
///
/// If the soil polygon lies within the study area the soil polygon itself
/// is the overlap; if the study area lies within the soil polygon the
/// study area is.
///
/// # Errors
///
/// Never fails; the signature matches the other methods.
pub fn containment(operands: Operands<'_>) -> Result<Option<Intersection>, IntersectionError> {
    if operands.soil.relate(operands.study).is_within() {
        return Ok(found(
            operands.soil.clone(),
            IntersectionMethod::SoilWithinStudy,
        ));
    }
    if operands.study.relate(operands.soil).is_within() {
        return Ok(found(
            operands.study.clone(),
            IntersectionMethod::StudyWithinSoil,
        ));
    }
    Ok(None)
}

fn no_ring(operand: &str) -> IntersectionError {
    IntersectionError::MethodFailed {
        method: "polygon clipping",
        message: format!("{operand} has no polygon ring"),
    }
}

fn first_shape(multi: &MultiPolygon<f64>) -> Option<Shape> {
    let polygon = multi.0.first()?;
    let exterior = ring_to_contour(polygon.exterior());
    if exterior.len() < 3 {
        return None;
    }

    let mut shape = Vec::with_capacity(1 + polygon.interiors().len());
    shape.push(exterior);
    shape.extend(
        polygon
            .interiors()
            .iter()
            .map(ring_to_contour)
            .filter(|hole| hole.len() >= 3),
    );
    Some(shape)
}

fn ring_to_contour(ring: &LineString<f64>) -> Contour {
    let mut contour: Contour = ring.coords().map(|c| [c.x, c.y]).collect();
    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    contour
}

fn shape_to_polygon(shape: &Shape) -> Option<Polygon<f64>> {
    let (exterior, holes) = shape.split_first()?;
    if exterior.len() < 3 {
        return None;
    }
    Some(Polygon::new(
        contour_to_ring(exterior),
        holes.iter().map(|hole| contour_to_ring(hole)).collect(),
    ))
}

fn contour_to_ring(contour: &Contour) -> LineString<f64> {
    LineString::new(contour.iter().map(|p| Coord { x: p[0], y: p[1] }).collect())
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]])
    }

    #[test]
    fn overlay_finds_overlap() {
        let soil = square(0.0, 0.0, 0.01);
        let study = square(0.005, 0.005, 0.01);
        let hit = overlay(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap()
        .unwrap();
        assert_eq!(hit.method, IntersectionMethod::Overlay);
        assert!(hit.area_square_meters > 0.0);
    }

    #[test]
    fn clip_rings_matches_overlay_for_simple_squares() {
        let soil = square(0.0, 0.0, 0.01);
        let study = square(0.005, 0.005, 0.01);
        let operands = Operands {
            soil: &soil,
            study: &study,
        };

        let clipped = clip_rings(operands).unwrap().unwrap();
        let overlaid = overlay(operands).unwrap().unwrap();

        assert_eq!(clipped.method, IntersectionMethod::PolygonClipping);
        assert!(matches!(clipped.geometry, geo::Geometry::Polygon(_)));
        let rel = (clipped.area_square_meters - overlaid.area_square_meters).abs()
            / overlaid.area_square_meters;
        assert!(rel < 1e-6, "relative difference {rel}");
    }

    #[test]
    fn clip_rings_uses_only_first_polygon() {
        let mut soil = square(0.0, 0.0, 0.01);
        soil.0.extend(square(1.0, 1.0, 0.01).0);
        let study = square(1.0, 1.0, 0.01);

        let result = clip_rings(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn clip_rings_builds_multipolygon_for_split_results() {
        // A U-shaped soil polygon cut by a horizontal band leaves two pieces.
        let soil = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 0.03, y: 0.0),
            (x: 0.03, y: 0.03),
            (x: 0.02, y: 0.03),
            (x: 0.02, y: 0.01),
            (x: 0.01, y: 0.01),
            (x: 0.01, y: 0.03),
            (x: 0.0, y: 0.03),
        ]]);
        let study = square(-0.01, 0.02, 0.05);

        let hit = clip_rings(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap()
        .unwrap();
        assert!(matches!(hit.geometry, geo::Geometry::MultiPolygon(ref mp) if mp.0.len() == 2));
    }

    #[test]
    fn clip_rings_rejects_empty_operand() {
        let soil = MultiPolygon::new(vec![]);
        let study = square(0.0, 0.0, 0.01);
        let err = clip_rings(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap_err();
        assert!(matches!(err, IntersectionError::MethodFailed { .. }));
    }

    #[test]
    fn containment_study_within_soil() {
        let soil = square(0.0, 0.0, 0.1);
        let study = square(0.02, 0.02, 0.001);
        let hit = containment(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap()
        .unwrap();

        assert_eq!(hit.method, IntersectionMethod::StudyWithinSoil);
        let expected = area_square_meters(&study);
        assert!((hit.area_square_meters - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn containment_soil_within_study() {
        let soil = square(0.02, 0.02, 0.001);
        let study = square(0.0, 0.0, 0.1);
        let hit = containment(Operands {
            soil: &soil,
            study: &study,
        })
        .unwrap()
        .unwrap();

        assert_eq!(hit.method, IntersectionMethod::SoilWithinStudy);
        let expected = area_square_meters(&soil);
        assert!((hit.area_square_meters - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn containment_none_for_partial_overlap() {
        let soil = square(0.0, 0.0, 0.01);
        let study = square(0.005, 0.005, 0.01);
        assert!(
            containment(Operands {
                soil: &soil,
                study: &study,
            })
            .unwrap()
            .is_none()
        );
    }
}
