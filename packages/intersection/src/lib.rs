#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Robust intersection of a soil polygon with the study area.
//!
//! Soil survey polygons are frequently degenerate (self-touching rings,
//! slivers, duplicated vertices), so a single overlay call is not enough.
//! [`intersect`] tries three methods in a fixed order and stops at the first
//! one that produces at least [`MIN_INTERSECTION_SQUARE_METERS`]:
//!
//! 1. [`methods::overlay`]: general-purpose polygon overlay.
//! 2. [`methods::clip_rings`]: coordinate-ring clipping of the first polygon
//!    of each operand.
//! 3. [`methods::containment`]: whole-polygon containment in either
//!    direction.
//!
//! No overlap is a normal outcome (`None`), not an error.

pub mod methods;

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{BoundingRect as _, Geometry, MultiPolygon};
use soil_map_analysis_models::IntersectionMethod;
use soil_map_geometry::as_multi_polygon;
use thiserror::Error;

/// Overlaps smaller than this are discarded.
pub const MIN_INTERSECTION_SQUARE_METERS: f64 = 0.1;

/// A successful intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// Overlap geometry (`Polygon` or `MultiPolygon`).
    pub geometry: Geometry<f64>,
    /// Geodesic area of the overlap in square metres.
    pub area_square_meters: f64,
    /// Method that produced the overlap.
    pub method: IntersectionMethod,
}

/// Why a single method or the whole chain failed.
#[derive(Debug, Error)]
pub enum IntersectionError {
    /// An operand is not a `Polygon` or `MultiPolygon`.
    #[error("Unsupported geometry for intersection: {kind}")]
    UnsupportedGeometry {
        /// Geometry type name.
        kind: &'static str,
    },

    /// A method reported a failure.
    #[error("{method} failed: {message}")]
    MethodFailed {
        /// Method name.
        method: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A method panicked inside the geometry engine.
    #[error("{method} panicked")]
    MethodPanicked {
        /// Method name.
        method: &'static str,
    },

    /// Every method failed; none produced a usable answer.
    #[error("All intersection methods failed (last: {last})")]
    AllMethodsFailed {
        /// The last method failure.
        last: Box<Self>,
    },
}

/// Borrowed operands shared by every method.
#[derive(Debug, Clone, Copy)]
pub struct Operands<'a> {
    /// The soil polygon.
    pub soil: &'a MultiPolygon<f64>,
    /// The study area.
    pub study: &'a MultiPolygon<f64>,
}

type Method = fn(Operands<'_>) -> Result<Option<Intersection>, IntersectionError>;

const METHODS: &[(&str, Method)] = &[
    ("overlay", methods::overlay),
    ("polygon clipping", methods::clip_rings),
    ("containment", methods::containment),
];

/// Intersects a soil polygon with the study area.
///
/// Returns `None` when there is no overlap of at least
/// [`MIN_INTERSECTION_SQUARE_METERS`], including when every method failed
/// (the failure is logged).
#[must_use]
pub fn intersect(soil: &Geometry<f64>, study: &Geometry<f64>) -> Option<Intersection> {
    match try_intersect(soil, study) {
        Ok(found) => found,
        Err(e) => {
            log::debug!("No intersection recorded: {e}");
            None
        }
    }
}

/// Like [`intersect`], but reports when no method could run cleanly.
///
/// # Errors
///
/// * [`IntersectionError::UnsupportedGeometry`] if an operand is not
///   polygonal.
/// * [`IntersectionError::AllMethodsFailed`] if every method failed or
///   panicked.
pub fn try_intersect(
    soil: &Geometry<f64>,
    study: &Geometry<f64>,
) -> Result<Option<Intersection>, IntersectionError> {
    let soil = as_multi_polygon(soil).ok_or(IntersectionError::UnsupportedGeometry {
        kind: geometry_kind(soil),
    })?;
    let study = as_multi_polygon(study).ok_or(IntersectionError::UnsupportedGeometry {
        kind: geometry_kind(study),
    })?;

    if bounding_boxes_disjoint(&soil, &study) {
        log::trace!("Bounding boxes are disjoint, skipping intersection methods");
        return Ok(None);
    }

    let operands = Operands {
        soil: &soil,
        study: &study,
    };

    let mut last_error: Option<IntersectionError> = None;
    let mut any_clean = false;

    for (name, method) in METHODS {
        match catch_unwind(AssertUnwindSafe(|| method(operands))) {
            Ok(Ok(Some(found))) if found.area_square_meters >= MIN_INTERSECTION_SQUARE_METERS => {
                log::debug!(
                    "Intersection via {} ({:.3} m²)",
                    found.method,
                    found.area_square_meters
                );
                return Ok(Some(found));
            }
            Ok(Ok(Some(found))) => {
                log::trace!(
                    "{name} produced {:.6} m², below threshold",
                    found.area_square_meters
                );
                any_clean = true;
            }
            Ok(Ok(None)) => any_clean = true,
            Ok(Err(e)) => {
                log::debug!("{name} failed: {e}");
                last_error = Some(e);
            }
            Err(_) => {
                log::debug!("{name} panicked");
                last_error = Some(IntersectionError::MethodPanicked { method: name });
            }
        }
    }

    match last_error {
        Some(last) if !any_clean => Err(IntersectionError::AllMethodsFailed {
            last: Box::new(last),
        }),
        _ => Ok(None),
    }
}

fn bounding_boxes_disjoint(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
    let (Some(a), Some(b)) = (a.bounding_rect(), b.bounding_rect()) else {
        return true;
    };
    a.max().x < b.min().x || b.max().x < a.min().x || a.max().y < b.min().y || b.max().y < a.min().y
}

const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
