//! Network seam for the query executor.
//!
//! [`HttpTransport`] posts queries to the real service. Tests swap in their
//! own [`SoilDataTransport`] to script responses.

use async_trait::async_trait;
use serde::Serialize;

use crate::{QueryError, SoilDataServiceConfig};

/// Response format requested from the service: row-major JSON arrays.
pub const RESPONSE_FORMAT: &str = "JSON";

/// Body of a tabular query request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    /// Literal T-SQL text.
    pub query: &'a str,
    /// Always [`RESPONSE_FORMAT`].
    pub format: &'static str,
}

/// A raw response, before status/content-type/JSON validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body text.
    pub body: String,
}

impl TransportResponse {
    /// A 200 response with a JSON body.
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.into(),
        }
    }
}

/// Sends one query to the soil data service.
///
/// Implementations perform exactly one request per call; retry, timeout
/// and cancellation are the executor's job.
#[async_trait]
pub trait SoilDataTransport: Send + Sync {
    /// Posts `query` and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Execution`] if no response could be obtained.
    async fn post(&self, query: &str) -> Result<TransportResponse, QueryError>;
}

/// [`SoilDataTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Builds a transport for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Execution`] if the HTTP client cannot be
    /// built.
    pub fn new(config: &SoilDataServiceConfig) -> Result<Self, QueryError> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder
            .build()
            .map_err(|e| QueryError::execution(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, config.endpoint.clone()))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// The endpoint queries are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SoilDataTransport for HttpTransport {
    async fn post(&self, query: &str) -> Result<TransportResponse, QueryError> {
        let request = QueryRequest {
            query,
            format: RESPONSE_FORMAT,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::execution(format!("HTTP request error: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.text().await.map_err(|e| QueryError::Execution {
            message: format!("Failed to read response body: {e}"),
            status: Some(status),
            snippet: None,
        })?;

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}
