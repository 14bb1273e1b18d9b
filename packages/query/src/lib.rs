#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query executor for the USDA Soil Data Access (SDA) tabular service.
//!
//! This is the only crate in the workspace that talks to the network. A
//! query is a literal T-SQL string posted as `{"query": ..., "format":
//! "JSON"}`; the service answers with `{"Table": [[...], ...]}`.
//! [`QueryExecutor`] adds a per-attempt timeout, bounded exponential-backoff
//! retry and cooperative cancellation on top of a pluggable
//! [`SoilDataTransport`].

pub mod config;
pub mod executor;
pub mod rows;
pub mod transport;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use config::{ConfigError, SoilDataServiceConfig};
pub use executor::{ExecuteOptions, QueryExecutor, backoff_delay};
pub use rows::{Row, cell_f64, cell_str};
pub use tokio_util::sync::CancellationToken;
pub use transport::{HttpTransport, SoilDataTransport, TransportResponse};

/// Maximum length of the response body preview attached to errors.
pub const SNIPPET_LEN: usize = 500;

/// Errors that can occur while executing a soil data query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The remote call failed or returned something unusable.
    #[error("Query execution failed: {message}")]
    Execution {
        /// Description of what went wrong.
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Leading part of the response body, for diagnostics.
        snippet: Option<String>,
    },

    /// The attempt hit its deadline or the run was cancelled.
    #[error("Query timed out: {cause}")]
    Timeout {
        /// Why the query stopped.
        cause: TimeoutCause,
    },
}

/// Why a query ended in [`QueryError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    /// A single attempt exceeded its deadline.
    Deadline(Duration),
    /// The caller cancelled the run.
    Cancelled,
}

impl fmt::Display for TimeoutCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline(limit) => write!(f, "no response within {limit:?}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl QueryError {
    /// The error surfaced when a cancellation token fires.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::Timeout {
            cause: TimeoutCause::Cancelled,
        }
    }

    /// An execution error with no response attached.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            status: None,
            snippet: None,
        }
    }

    /// Returns `true` if the error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Timeout {
                cause: TimeoutCause::Cancelled
            }
        )
    }

    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Truncates a response body for inclusion in errors and logs.
#[must_use]
pub fn snippet(body: &str) -> String {
    if body.chars().count() <= SNIPPET_LEN {
        body.to_string()
    } else {
        let mut preview: String = body.chars().take(SNIPPET_LEN).collect();
        preview.push_str("...");
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_terminal() {
        let err = QueryError::cancelled();
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Query timed out: cancelled");
    }

    #[test]
    fn deadline_is_retryable() {
        let err = QueryError::Timeout {
            cause: TimeoutCause::Deadline(Duration::from_secs(5)),
        };
        assert!(!err.is_cancelled());
        assert!(err.is_retryable());
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let body = "é".repeat(SNIPPET_LEN + 10);
        let preview = snippet(&body);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), SNIPPET_LEN + 3);
        assert_eq!(snippet("short"), "short");
    }
}
