//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use modulable_web::{AppFacade, EventHub, RouterFacade, WebConfig};

/// App and router facades, both initialized.
pub struct Fixture {
    pub app: AppFacade,
    pub router: RouterFacade,
    pub events: EventHub,
}

impl Fixture {
    pub fn new(config: WebConfig) -> Self {
        let events = EventHub::new();
        let mut app = AppFacade::new(std::sync::Arc::new(config));
        app.init().unwrap();
        let mut router = RouterFacade::new(events.clone());
        router.init(&mut app).unwrap();
        Self { app, router, events }
    }

    pub fn build(&mut self) -> Router {
        self.app.build_router().unwrap()
    }
}

/// Config without compression, so bodies read back as plain text.
pub fn plain_config() -> WebConfig {
    WebConfig {
        compression: false,
        ..WebConfig::default()
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str, content_type: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
