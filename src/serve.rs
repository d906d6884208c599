//! Static directory server with content ETags
//!
//! Serves files from one root directory. Every response carries a strong
//! ETag derived from the SHA-256 of the file bytes, so a rebuilt file is
//! seen as a new version by the client runtime's HEAD polling.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode, Uri},
    Router,
};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::adapter::DevServerIntegration;

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("root is not a directory: {0}")]
    NotADirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
struct ServeState {
    root: Arc<PathBuf>,
}

/// Build the router for `root`, wrapped by the dev-server layer when given
pub fn router(root: PathBuf, integration: Option<&DevServerIntegration>) -> Router {
    let app = Router::new().fallback(serve_file).with_state(ServeState {
        root: Arc::new(root),
    });
    match integration {
        Some(integration) => app.layer(integration.layer()),
        None => app,
    }
}

/// Serve `root` on `addr` until `shutdown` resolves
pub async fn serve(
    root: PathBuf,
    addr: SocketAddr,
    integration: Option<DevServerIntegration>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServeError> {
    if !root.is_dir() {
        return Err(ServeError::NotADirectory(root.display().to_string()));
    }

    let app = router(root.clone(), integration.as_ref());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(root = %root.display(), "serving on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Strong ETag for a file's bytes
pub fn etag_for(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Map a request path onto a file under `root`
///
/// Returns None for paths that try to leave the root. Directory paths map
/// to their `index.html`.
pub fn resolve_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(uri_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if uri_path.ends_with('/') || path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    response
}

async fn serve_file(
    State(state): State<ServeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response<Body> {
    if method != Method::GET && method != Method::HEAD {
        return status(StatusCode::METHOD_NOT_ALLOWED);
    }

    let Some(path) = resolve_path(&state.root, uri.path()) else {
        tracing::warn!(path = uri.path(), "rejected path outside the root");
        return status(StatusCode::FORBIDDEN);
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return status(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read file");
            return status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let etag = etag_for(&bytes);
    let Ok(etag_value) = HeaderValue::from_str(&etag) else {
        return status(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|tag| tag.trim() == etag))
        .unwrap_or(false);

    let mut response = if not_modified {
        status(StatusCode::NOT_MODIFIED)
    } else {
        Response::new(Body::from(bytes))
    };

    let response_headers = response.headers_mut();
    response_headers.insert(header::ETAG, etag_value);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(&path)),
    );

    tracing::debug!(method = %method, path = uri.path(), etag = %etag, "served");
    response
}
