//! Dev-server integration
//!
//! [`EtagCaptureLayer`] wraps the server's responses: ETags set on the
//! watched resource are recorded into an [`EtagRecord`], and HTML bodies
//! go through the same transform that [`DevServerIntegration::transform_index_html`]
//! exposes to hosts with their own transform hook.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use url::Url;

use super::ScriptInjector;
use crate::record::EtagRecord;

/// Largest HTML body the layer will buffer for rewriting
const MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

/// Whether a response for `url` should have its ETag recorded
///
/// Dev-server internals (`/@…`, anything under `node_modules`) are never
/// captured. A URL matches when it equals the resource path; the root
/// resource also matches `/index.html`.
pub fn should_capture(resource: &str, url: &str) -> bool {
    if url.starts_with("/@") || url.contains("node_modules") {
        return false;
    }
    let resource = resource_path(resource);
    url == resource || (resource == "/" && (url == "/" || url == "/index.html"))
}

/// Request path a resource is served under
///
/// Absolute URLs contribute their path; relative resources get the leading
/// `/` the client adds before polling.
fn resource_path(resource: &str) -> String {
    if resource.starts_with("http") {
        if let Ok(url) = Url::parse(resource) {
            return url.path().to_string();
        }
    }
    if resource.starts_with('/') {
        resource.to_string()
    } else {
        format!("/{}", resource)
    }
}

/// Dev-server registration
#[derive(Debug, Clone)]
pub struct DevServerIntegration {
    injector: ScriptInjector,
    record: EtagRecord,
    capture: bool,
}

impl DevServerIntegration {
    /// `capture` is false when the host offers no middleware hook
    pub fn new(injector: ScriptInjector, capture: bool) -> Self {
        Self {
            injector,
            record: EtagRecord::new(),
            capture,
        }
    }

    /// Middleware layer for the server
    pub fn layer(&self) -> EtagCaptureLayer {
        if !self.injector.quiet() {
            tracing::info!(resource = self.injector.resource(), "configuring dev server");
        }
        EtagCaptureLayer {
            integration: self.clone(),
        }
    }

    /// Per-request HTML transform
    pub fn transform_index_html(&self, html: &str) -> String {
        let (out, outcome) = self.injector.inject(html);
        if outcome.is_injected() && !self.injector.quiet() {
            tracing::debug!("client script injected into served HTML");
        }
        out
    }

    /// Record an ETag the server set for `url`; returns true if it was kept
    pub fn record_etag(&self, url: &str, etag: &str) -> bool {
        if !self.capture || !should_capture(self.injector.resource(), url) {
            return false;
        }
        let previous = self.record.record(url, etag);
        if !self.injector.quiet() && previous.as_deref() != Some(etag) {
            tracing::info!(url, etag, "recorded resource ETag");
        }
        true
    }

    /// Captured ETags
    pub fn record(&self) -> &EtagRecord {
        &self.record
    }
}

/// Tower layer installing [`EtagCaptureService`]
#[derive(Debug, Clone)]
pub struct EtagCaptureLayer {
    integration: DevServerIntegration,
}

impl<S> Layer<S> for EtagCaptureLayer {
    type Service = EtagCaptureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EtagCaptureService {
            inner,
            integration: self.integration.clone(),
        }
    }
}

/// Records ETags and rewrites HTML responses
#[derive(Debug, Clone)]
pub struct EtagCaptureService<S> {
    inner: S,
    integration: DevServerIntegration,
}

fn is_html(response: &Response<Body>) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false)
}

impl<S> Service<Request<Body>> for EtagCaptureService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let integration = self.integration.clone();
        let mut inner = self.inner.clone();
        let path = req.uri().path().to_string();
        let is_head = req.method() == Method::HEAD;

        Box::pin(async move {
            let response = inner.call(req).await?;

            if let Some(etag) = response
                .headers()
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
            {
                integration.record_etag(&path, etag);
            }

            if is_head || !is_html(&response) {
                return Ok(response);
            }

            let (mut parts, body) = response.into_parts();
            let bytes = match to_bytes(body, MAX_HTML_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to buffer HTML response");
                    parts.status = StatusCode::INTERNAL_SERVER_ERROR;
                    parts.headers.remove(header::CONTENT_LENGTH);
                    return Ok(Response::from_parts(parts, Body::empty()));
                }
            };

            let body = match String::from_utf8(bytes.to_vec()) {
                Ok(html) => Body::from(integration.transform_index_html(&html)),
                Err(e) => Body::from(e.into_bytes()),
            };
            parts.headers.remove(header::CONTENT_LENGTH);
            Ok(Response::from_parts(parts, body))
        })
    }
}
