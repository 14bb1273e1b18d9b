#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Study-area soil analysis.
//!
//! [`pipeline::run`] turns a `GeoJSON` study area into an
//! [`AnalysisResult`](soil_map_analysis_models::AnalysisResult): it looks up
//! the map units intersecting the area, fetches their representative soil
//! properties, intersects every unit polygon with the study area and ranks
//! the units by covered acreage.
//!
//! [`session::AnalysisSession`] keeps at most one run in flight, drops
//! messages from superseded runs, and skips re-running when the geometry
//! has not changed.

pub mod pipeline;
pub mod progress;
pub mod properties;
pub mod queries;
pub mod session;

#[cfg(test)]
mod test_support;

use soil_map_geometry::GeometryError;
use soil_map_query::QueryError;
use thiserror::Error;

pub use pipeline::{RunOptions, run};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use session::{AnalysisSession, RunContext, RunEvent, RunId, RunMessage, Submission};

/// The single terminal error of an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The study area could not be normalized.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A service query failed after its retry budget, or the run was
    /// cancelled.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AnalysisError {
    /// Returns `true` if the run stopped because it was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        match self {
            Self::Query(e) => e.is_cancelled(),
            Self::Geometry(_) => false,
        }
    }
}
