//! Timeout, retry and cancellation around a [`SoilDataTransport`].
//!
//! Retry is a bounded loop: `max_retries` attempts in total, with
//! [`backoff_delay`] between attempts (never after the last one). Every
//! failure is retried except cancellation. Once the budget is spent the
//! last error is returned as-is.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::rows::Row;
use crate::transport::TransportResponse;
use crate::{QueryError, SoilDataServiceConfig, SoilDataTransport, TimeoutCause, snippet};

/// Delay after the first failed attempt.
pub const BASE_BACKOFF: Duration = Duration::from_millis(1_000);

/// Upper bound on any single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_millis(10_000);

/// Backoff before the attempt following failed attempt number `attempt`
/// (1-based): 1s, 2s, 4s, 8s, then 10s from there on.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    BASE_BACKOFF
        .saturating_mul(1_u32 << exponent)
        .min(MAX_BACKOFF)
}

/// Per-call execution settings.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Total number of attempts. Zero is treated as one.
    pub max_retries: u32,
    /// Run-scoped cancellation signal.
    pub cancel: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            cancel: CancellationToken::new(),
        }
    }
}

impl ExecuteOptions {
    /// Options taken from the service configuration, bound to `cancel`.
    #[must_use]
    pub const fn from_config(config: &SoilDataServiceConfig, cancel: CancellationToken) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            cancel,
        }
    }

    /// Same settings bound to a different cancellation token.
    #[must_use]
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Executes tabular queries against the soil data service.
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn SoilDataTransport>,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor").finish_non_exhaustive()
    }
}

impl QueryExecutor {
    /// Creates an executor over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn SoilDataTransport>) -> Self {
        Self { transport }
    }

    /// Runs `query` and returns its rows.
    ///
    /// Returns an empty list when the response has no `Table` member.
    ///
    /// # Errors
    ///
    /// * [`QueryError::Timeout`] with [`TimeoutCause::Cancelled`] as soon
    ///   as the cancellation token is observed.
    /// * The last [`QueryError`] seen once all attempts have failed.
    pub async fn execute(
        &self,
        query: &str,
        options: &ExecuteOptions,
    ) -> Result<Vec<Row>, QueryError> {
        let attempts = options.attempts();
        let mut last_error: Option<QueryError> = None;

        for attempt in 1..=attempts {
            if options.cancel.is_cancelled() {
                return Err(QueryError::cancelled());
            }

            match self.attempt(query, options).await {
                Ok(rows) => {
                    if attempt > 1 {
                        log::info!("Soil data query succeeded on attempt {attempt}/{attempts}");
                    }
                    return Ok(rows);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        log::warn!(
                            "Soil data query failed (attempt {attempt}/{attempts}), \
                             retrying in {delay:?}: {e}"
                        );
                        last_error = Some(e);

                        tokio::select! {
                            biased;
                            () = options.cancel.cancelled() => return Err(QueryError::cancelled()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        log::error!("Soil data query failed after {attempts} attempts: {e}");
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| QueryError::execution("query failed after all retries")))
    }

    async fn attempt(&self, query: &str, options: &ExecuteOptions) -> Result<Vec<Row>, QueryError> {
        let response = tokio::select! {
            biased;
            () = options.cancel.cancelled() => return Err(QueryError::cancelled()),
            result = tokio::time::timeout(options.timeout, self.transport.post(query)) => {
                match result {
                    Ok(response) => response?,
                    Err(_) => {
                        return Err(QueryError::Timeout {
                            cause: TimeoutCause::Deadline(options.timeout),
                        });
                    }
                }
            }
        };

        parse_response(&response)
    }
}

/// Validates a raw response and extracts its `Table` rows.
///
/// # Errors
///
/// Returns [`QueryError::Execution`] for non-2xx statuses, non-JSON content
/// types, or bodies that are not valid JSON.
pub fn parse_response(response: &TransportResponse) -> Result<Vec<Row>, QueryError> {
    if !(200..300).contains(&response.status) {
        return Err(QueryError::Execution {
            message: format!("HTTP {}", response.status),
            status: Some(response.status),
            snippet: Some(snippet(&response.body)),
        });
    }

    if let Some(content_type) = &response.content_type
        && !content_type.to_ascii_lowercase().contains("json")
    {
        return Err(QueryError::Execution {
            message: format!("unexpected content type {content_type:?}"),
            status: Some(response.status),
            snippet: Some(snippet(&response.body)),
        });
    }

    if response.body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let payload: Value =
        serde_json::from_str(&response.body).map_err(|e| QueryError::Execution {
            message: format!("JSON parse error: {e}"),
            status: Some(response.status),
            snippet: Some(snippet(&response.body)),
        })?;

    let rows = payload
        .get("Table")
        .and_then(Value::as_array)
        .map(|table| {
            table
                .iter()
                .filter_map(|row| row.as_array().cloned())
                .collect()
        })
        .unwrap_or_default();

    Ok(rows)
}
