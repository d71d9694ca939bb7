//! Static file mounts.
//!
//! A mount serves files from a directory under a URL prefix. A miss (no such
//! file) falls through to the rest of the stack instead of answering 404, so
//! several mounts and the router can share a prefix.

use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// One mount point: URL prefix → directory.
#[derive(Debug, Clone)]
pub struct StaticMount {
    prefix: String,
    dir: PathBuf,
    service: ServeDir,
}

impl StaticMount {
    pub fn new(prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            prefix: prefix.into(),
            service: ServeDir::new(&dir),
            dir,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The request URI relative to this mount, or `None` when outside it.
    fn relative_uri(&self, uri: &Uri) -> Option<Uri> {
        let rest = strip_mount(&self.prefix, uri.path())?;
        let relative = match uri.query() {
            Some(query) => format!("{rest}?{query}"),
            None => rest.to_string(),
        };
        relative.parse().ok()
    }
}

/// Strip the mount prefix on a segment boundary.
fn strip_mount<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

pub async fn serve_static(
    State(mount): State<StaticMount>,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }
    let Some(uri) = mount.relative_uri(request.uri()) else {
        return next.run(request).await;
    };

    let mut probe = Request::builder()
        .method(request.method().clone())
        .uri(uri)
        .version(request.version());
    if let Some(headers) = probe.headers_mut() {
        headers.extend(request.headers().clone());
    }
    let Ok(probe) = probe.body(Body::empty()) else {
        return next.run(request).await;
    };

    let response = match mount.service.clone().oneshot(probe).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return next.run(request).await;
    }

    tracing::trace!(
        mount = %mount.prefix,
        path = %request.uri().path(),
        status = %response.status(),
        "Served static file"
    );
    response.map(Body::new)
}
