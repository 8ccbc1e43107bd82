//! REST API client for the site-check service.
//!
//! [`JobService`] is the seam between the engine and the network: the
//! controller, poller and background tasks only see the trait, and
//! [`ServiceApi`] implements it with [`reqwest`].

use async_trait::async_trait;
use limefrog_core::job_status::{JobStatusSnapshot, StatusRecord};
use limefrog_core::options::{CheckOptions, JobRequest};
use limefrog_core::stats::{ResourceUsage, SharedStats};
use limefrog_core::types::{JobHandle, SessionIdentity};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Errors from the service API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Service error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response parsed but did not make sense (e.g. unknown job status).
    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl ApiError {
    /// The `error` field of a JSON error body, if the service sent one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            Self::Status { body, .. } => serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.error)
                .filter(|m| !m.is_empty()),
            _ => None,
        }
    }
}

/// Outcome of a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReply {
    Found(JobStatusSnapshot),
    /// The service does not know the job (expired, evicted, never existed).
    NotFound,
}

/// Operations the engine needs from the remote service.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, ApiError>;

    async fn job_status(&self, job: &JobHandle) -> Result<StatusReply, ApiError>;

    /// Ask the service to stop a job. Only an acknowledgement; the state
    /// change is observed through [`job_status`](Self::job_status).
    async fn stop_job(&self, job: &JobHandle) -> Result<(), ApiError>;

    async fn heartbeat(&self, session: &SessionIdentity) -> Result<(), ApiError>;

    async fn stats(&self) -> Result<SharedStats, ApiError>;

    async fn resource_usage(&self) -> Result<ResourceUsage, ApiError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    urls: String,
    options: &'a CheckOptions,
    runtime: RuntimeBody,
}

#[derive(Debug, Serialize)]
struct RuntimeBody {
    concurrency: u32,
    timeout_seconds: u32,
    retries: u32,
}

/// Response of `POST /api/job`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
struct HeartbeatBody<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// ServiceApi
// ---------------------------------------------------------------------------

/// HTTP client for one site-check service.
pub struct ServiceApi {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Service root, e.g. `http://host:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (e.g. one configured with a request timeout).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl JobService for ServiceApi {
    /// `POST /api/job`.
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, ApiError> {
        let body = SubmitBody {
            urls: request.urls.join("\n"),
            options: &request.options,
            runtime: RuntimeBody {
                concurrency: request.runtime.concurrency,
                timeout_seconds: request.runtime.timeout_seconds,
                retries: request.runtime.retries,
            },
        };

        let response = self
            .client
            .post(self.url("/api/job"))
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        if submitted.job_id.is_empty() {
            return Err(ApiError::Protocol("empty job_id in submit response".into()));
        }
        Ok(JobHandle::new(submitted.job_id))
    }

    /// `GET /api/job/{id}`; a 404 maps to [`StatusReply::NotFound`].
    async fn job_status(&self, job: &JobHandle) -> Result<StatusReply, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/job/{job}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(StatusReply::NotFound);
        }

        let record: StatusRecord = Self::parse_response(response).await?;
        let snapshot =
            JobStatusSnapshot::try_from(record).map_err(|e| ApiError::Protocol(e.to_string()))?;
        Ok(StatusReply::Found(snapshot))
    }

    /// `POST /api/job/{id}/stop`.
    async fn stop_job(&self, job: &JobHandle) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/api/job/{job}/stop")))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// `POST /api/heartbeat`.
    async fn heartbeat(&self, session: &SessionIdentity) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/api/heartbeat"))
            .json(&HeartbeatBody {
                session_id: session.as_str(),
            })
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// `GET /api/stats`.
    async fn stats(&self) -> Result<SharedStats, ApiError> {
        let response = self.client.get(self.url("/api/stats")).send().await?;
        Self::parse_response(response).await
    }

    /// `GET /api/resource`.
    async fn resource_usage(&self) -> Result<ResourceUsage, ApiError> {
        let response = self.client.get(self.url("/api/resource")).send().await?;
        Self::parse_response(response).await
    }
}
