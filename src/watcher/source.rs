//! Where the watcher gets ETags from

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, ETAG, EXPIRES, PRAGMA};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

use etag_refresh_runtime::FetchOutcome;

/// Fetch errors; all of them are recoverable
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response carried no ETag header")]
    MissingEtag,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// The runtime's view of this failure
    pub fn into_outcome(self) -> FetchOutcome {
        match self {
            FetchError::Network(reason) => FetchOutcome::Network(reason),
            FetchError::Status(status) => FetchOutcome::Status(status),
            FetchError::MissingEtag => FetchOutcome::MissingEtag,
            FetchError::InvalidUrl(reason) => FetchOutcome::Network(reason),
        }
    }
}

/// Convert a fetch result into a runtime outcome
pub fn to_outcome(result: Result<String, FetchError>) -> FetchOutcome {
    match result {
        Ok(etag) => FetchOutcome::Etag(etag),
        Err(e) => e.into_outcome(),
    }
}

/// A source of ETags for a resource
#[async_trait]
pub trait EtagSource: Send + Sync + 'static {
    /// Current ETag of `resource`
    async fn fetch_etag(&self, resource: &str) -> Result<String, FetchError>;
}

/// Resolve a resource against an origin
///
/// Resources starting with `http` are used verbatim; anything else is a
/// path on the origin, with a leading `/` added when missing.
pub fn resolve_url(origin: &Url, resource: &str) -> Result<Url, FetchError> {
    let result = if resource.starts_with("http") {
        Url::parse(resource)
    } else if resource.starts_with('/') {
        origin.join(resource)
    } else {
        origin.join(&format!("/{}", resource))
    };
    result.map_err(|e| FetchError::InvalidUrl(format!("{}: {}", resource, e)))
}

/// HEAD requests over HTTP with every cache bypassed
#[derive(Debug, Clone)]
pub struct HttpEtagSource {
    client: reqwest::Client,
    origin: Url,
}

impl HttpEtagSource {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, FetchError> {
        let origin = Url::parse(origin).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", origin, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

#[async_trait]
impl EtagSource for HttpEtagSource {
    async fn fetch_etag(&self, resource: &str) -> Result<String, FetchError> {
        let url = resolve_url(&self.origin, resource)?;
        tracing::debug!(url = %url, "checking resource");

        let response = self
            .client
            .head(url)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(FetchError::MissingEtag)
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: VecDeque<Result<String, FetchError>>,
    last: Option<Result<String, FetchError>>,
    requests: usize,
}

/// Scripted source for tests
///
/// Responses are served in order and the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
    latency: Duration,
}

impl ScriptedSource {
    pub fn new(responses: impl IntoIterator<Item = Result<String, FetchError>>) -> Self {
        let source = Self::default();
        source.push(responses);
        source
    }

    /// A source answering with these ETags in turn
    pub fn etags<'a>(etags: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(etags.into_iter().map(|e| Ok(e.to_string())))
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, responses: impl IntoIterator<Item = Result<String, FetchError>>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.responses.extend(responses);
    }

    /// Requests served so far
    pub fn requests(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).requests
    }

    fn next(&self) -> Result<String, FetchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.requests += 1;
        if let Some(response) = state.responses.pop_front() {
            state.last = Some(response.clone());
            return response;
        }
        state
            .last
            .clone()
            .unwrap_or_else(|| Err(FetchError::Network("no scripted response".to_string())))
    }
}

#[async_trait]
impl EtagSource for ScriptedSource {
    async fn fetch_etag(&self, _resource: &str) -> Result<String, FetchError> {
        let response = self.next();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        response
    }
}
