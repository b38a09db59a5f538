//! HTTP client for the IHME EPI visualisation API
//!
//! Provides the `EpiSource` trait describing the three endpoints the downloader
//! needs, and `EpiClient`, its reqwest-backed implementation with retry and
//! exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Query, RetryPolicy};

/// Base URL of the EPI visualisation website
pub const DEFAULT_BASE_URL: &str = "https://vizhub.healthdata.org/epi";

/// Default limit for a whole request, from connecting until the body is read
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const METADATA_ENDPOINT: &str = "/api/metadata";
const VERSIONS_ENDPOINT: &str = "/api/model/versions";
const DOWNLOAD_ENDPOINT: &str = "/api/model/results/download";

/// Errors that can occur when fetching data from the service
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A transient failure persisted across every allowed attempt
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },

    /// The response body was not in the expected format
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The service returned no data for the query
    #[error("no data available for the specified parameters")]
    EmptyPayload,

    /// No published dataset version matches the model and measure
    #[error("no dataset version available for model {model} and measure {measure}")]
    NoVersion { model: u32, measure: u32 },
}

impl FetchError {
    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

/// The remote endpoints used by the downloader
///
/// Every method returns the raw response body so that callers can cache it
/// verbatim before parsing.
#[async_trait]
pub trait EpiSource: Send + Sync {
    /// Fetch the metadata document listing valid parameter values
    async fn fetch_metadata(&self) -> Result<String, FetchError>;

    /// Fetch the list of published dataset versions for a model
    async fn fetch_model_versions(&self, model: u32) -> Result<String, FetchError>;

    /// Fetch the CSV dataset for one query at a given dataset version
    async fn fetch_dataset(&self, query: &Query, version: u64) -> Result<String, FetchError>;
}

/// Client for the EPI visualisation API
#[derive(Debug, Clone)]
pub struct EpiClient {
    http_client: Client,
    base_url: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Default for EpiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EpiClient {
    /// Create a new EpiClient with default settings
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new EpiClient pointing at a different server
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-request timeout
    ///
    /// A request that has not completed in time fails as a network error and
    /// is retried like any other transient failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// GET an endpoint and return the body as text, retrying transient failures
    ///
    /// Retries on network errors, 429 and 5xx responses. Any other 4xx
    /// response fails immediately.
    pub async fn get_text(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let attempts = self.retry.max_attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!("GET {} ({} params), attempt {}/{}", url, params.len(), attempt + 1, attempts);

            match self.request_once(&url, params).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!("Transient error on attempt {}/{} for {}: {}", attempt + 1, attempts, url, e);
                    last_error = Some(e);

                    if attempt + 1 < attempts {
                        let backoff = self.retry.backoff(attempt);
                        debug!("Retrying after {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let last = last_error.unwrap_or_else(|| FetchError::Network("no attempts made".to_string()));
        Err(FetchError::RetriesExhausted {
            attempts,
            last: Box::new(last),
        })
    }

    async fn request_once(&self, url: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
        let response = self
            .http_client
            .get(url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.network_error(e))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    fn network_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Network(format!("request timed out after {:?}: {}", self.timeout, e))
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Query string for downloading one dataset
///
/// The five dimension IDs and the version are followed by fixed parameters
/// the download endpoint expects: final results for the global location.
pub fn dataset_params(query: &Query, version: u64) -> Vec<(&'static str, String)> {
    vec![
        ("age", query.age.id.to_string()),
        ("measure", query.measure.id.to_string()),
        ("model", query.model.id.to_string()),
        ("sex", query.sex.id.to_string()),
        ("version", version.to_string()),
        ("year", query.year.id.to_string()),
        ("type", "final".to_string()),
        ("bundle", String::new()),
        ("step", String::new()),
        ("crosswalk", String::new()),
        ("clinical", "false".to_string()),
        ("adjusted", "false".to_string()),
        ("location", "1".to_string()),
        ("population", "1".to_string()),
    ]
}

#[async_trait]
impl EpiSource for EpiClient {
    async fn fetch_metadata(&self) -> Result<String, FetchError> {
        self.get_text(METADATA_ENDPOINT, &[]).await
    }

    async fn fetch_model_versions(&self, model: u32) -> Result<String, FetchError> {
        let params = [("model", model.to_string()), ("step", String::new())];
        self.get_text(VERSIONS_ENDPOINT, &params).await
    }

    async fn fetch_dataset(&self, query: &Query, version: u64) -> Result<String, FetchError> {
        let params = dataset_params(query, version);
        self.get_text(DOWNLOAD_ENDPOINT, &params).await
    }
}
