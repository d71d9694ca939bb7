//! The server handle: an ordered middleware stack that becomes an axum
//! `Router` at start.
//!
//! # Responsibilities
//! - Record middleware, static mounts and routers in registration order
//! - Hold settings (stack traces, JSONP, view engine, views directory)
//! - Materialize the stack: routes innermost, middleware wrapping them in
//!   registration order, error classifier around the whole stack
//! - Serve the built router on a listener until shutdown
//!
//! Registration order is processing order: the first middleware registered
//! sees the request first.

use std::any::type_name;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{any, Route},
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::{Layer, Service};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::host::events::EventHub;
use crate::http::compression::compression_layer;
use crate::http::fallback::{self, ErrorHandlerState};
use crate::http::parsers::{self, BodyLimit};
use crate::http::request::MakeRequestUuid;
use crate::http::routes::RouterHandle;
use crate::http::static_files::{serve_static, StaticMount};
use crate::http::jsonp;
use crate::views::{HandlebarsEngine, ViewEngine, ViewSet, Views};

/// What a stack entry is, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackItem {
    Compression,
    Static { mount: String, dir: PathBuf },
    Jsonp,
    CookieParser,
    JsonParser,
    UrlencodedParser,
    /// Middleware added through `use_layer`, by type name.
    Custom(&'static str),
    Router,
    ErrorHandler,
    NotFound,
}

type ApplyLayer = Box<dyn FnOnce(Router) -> Router + Send>;

enum Payload {
    Layer(ApplyLayer),
    Routes(RouterHandle),
    Events(EventHub),
}

struct StackEntry {
    item: StackItem,
    payload: Payload,
}

/// Settings read by the stack at build time.
#[derive(Debug, Clone)]
pub struct Settings {
    pub show_stack_error: bool,
    pub jsonp_callback: bool,
    pub view_engine: String,
    pub views: PathBuf,
    pub body_limit: usize,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_stack_error: false,
            jsonp_callback: false,
            view_engine: "html".to_string(),
            views: PathBuf::from("views"),
            body_limit: 100 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The single long-lived server instance.
pub struct WebServer {
    settings: Settings,
    views: Views,
    stack: Vec<StackEntry>,
}

impl WebServer {
    pub fn new(settings: Settings) -> Self {
        let engine: Arc<dyn ViewEngine> = Arc::new(HandlebarsEngine::new());
        let views = Views::new(ViewSet::new(
            settings.view_engine.clone(),
            engine,
            settings.views.clone(),
        ));
        Self {
            settings,
            views,
            stack: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_show_stack_error(&mut self, enabled: bool) -> &mut Self {
        self.settings.show_stack_error = enabled;
        self
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    /// Stack contents in registration order.
    pub fn stack(&self) -> Vec<StackItem> {
        self.stack.iter().map(|e| e.item.clone()).collect()
    }

    /// Register a tower layer as the next middleware.
    pub fn use_layer<L>(&mut self, layer: L) -> &mut Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.push_layer(StackItem::Custom(type_name::<L>()), layer)
    }

    fn push_layer<L>(&mut self, item: StackItem, layer: L) -> &mut Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        tracing::debug!(middleware = ?item, position = self.stack.len(), "Middleware registered");
        self.stack.push(StackEntry {
            item,
            payload: Payload::Layer(Box::new(move |router: Router| router.layer(layer))),
        });
        self
    }

    /// Compress text-like responses.
    pub fn use_compression(&mut self) -> &mut Self {
        self.push_layer(StackItem::Compression, compression_layer())
    }

    /// Serve files from `dir` under `mount`.
    pub fn serve_static(&mut self, mount: impl Into<String>, dir: impl Into<PathBuf>) -> &mut Self {
        let mount = StaticMount::new(mount, dir);
        let item = StackItem::Static {
            mount: mount.prefix().to_string(),
            dir: mount.dir().to_path_buf(),
        };
        self.push_layer(item, from_fn_with_state(mount, serve_static))
    }

    /// Register a view engine for `ext` and make it the default.
    pub fn register_engine(&mut self, ext: impl Into<String>, engine: Arc<dyn ViewEngine>) -> &mut Self {
        self.settings.view_engine = ext.into();
        self.views.replace(ViewSet::new(
            self.settings.view_engine.clone(),
            engine,
            self.settings.views.clone(),
        ));
        self
    }

    /// Point the default file lookup at `dir`.
    pub fn set_views_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.settings.views = dir.into();
        let current = self.views.current();
        self.views.replace(ViewSet::new(
            self.settings.view_engine.clone(),
            current.engine(),
            self.settings.views.clone(),
        ));
        self
    }

    pub fn enable_jsonp(&mut self) -> &mut Self {
        self.settings.jsonp_callback = true;
        self.push_layer(StackItem::Jsonp, from_fn(jsonp::jsonp))
    }

    pub fn use_cookie_parser(&mut self) -> &mut Self {
        self.push_layer(StackItem::CookieParser, from_fn(parsers::cookie_parser))
    }

    pub fn use_json_parser(&mut self) -> &mut Self {
        let limit = BodyLimit(self.settings.body_limit);
        self.push_layer(StackItem::JsonParser, from_fn_with_state(limit, parsers::json_parser))
    }

    pub fn use_urlencoded_parser(&mut self) -> &mut Self {
        let limit = BodyLimit(self.settings.body_limit);
        self.push_layer(
            StackItem::UrlencodedParser,
            from_fn_with_state(limit, parsers::urlencoded_parser),
        )
    }

    /// Mount the route table; its routes are read when the server is built.
    /// A server holds one table, so a later mount replaces the earlier one.
    pub fn mount_router(&mut self, handle: RouterHandle) -> &mut Self {
        self.stack.push(StackEntry {
            item: StackItem::Router,
            payload: Payload::Routes(handle),
        });
        self
    }

    /// Classify failures into `'404'` / `'500'` events.
    pub fn use_error_handler(&mut self, events: EventHub) -> &mut Self {
        self.stack.push(StackEntry {
            item: StackItem::ErrorHandler,
            payload: Payload::Events(events),
        });
        self
    }

    /// Raise `'404'` when nothing responded.
    pub fn use_not_found(&mut self, events: EventHub) -> &mut Self {
        self.stack.push(StackEntry {
            item: StackItem::NotFound,
            payload: Payload::Events(events),
        });
        self
    }

    /// Materialize the stack into an axum router.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let WebServer {
            settings,
            views,
            stack,
        } = self;

        let mut table = None;
        let mut layers = Vec::new();
        let mut error_events = None;
        let mut not_found_events = None;

        for entry in stack {
            match (entry.item, entry.payload) {
                (_, Payload::Layer(apply)) => layers.push(apply),
                (_, Payload::Routes(handle)) => table = Some(handle),
                (StackItem::ErrorHandler, Payload::Events(events)) => error_events = Some(events),
                (_, Payload::Events(events)) => not_found_events = Some(events),
            }
        }

        let not_found = not_found_events.clone().map(|events| {
            any(move |request: Request| fallback::not_found(events.clone(), request))
        });
        let routes = match (table, not_found) {
            (Some(table), not_found) => table.build(not_found),
            (None, Some(not_found)) => Router::new().fallback_service(not_found),
            (None, None) => Router::new(),
        };

        let mut app = layers.into_iter().rev().fold(routes, |app, apply| apply(app));
        app = app.layer(Extension(views));

        if let Some(events) = error_events {
            let state = ErrorHandlerState {
                events,
                show_stack_error: settings.show_stack_error,
                raise_not_found: not_found_events.is_some(),
            };
            app = app.layer(from_fn_with_state(state, fallback::handle_errors));
        }

        app.layer(TimeoutLayer::new(settings.request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

/// A server accepting connections in the background.
pub struct RunningServer {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server to stop.
    pub async fn wait(self) -> std::io::Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

/// Serve `router` on `listener` until `shutdown` fires.
pub fn serve(
    router: Router,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<RunningServer> {
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "HTTP server starting");

    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;
        tracing::info!("HTTP server stopped");
        Ok(())
    });

    Ok(RunningServer { local_addr, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[test]
    fn test_stack_records_registration_order() {
        let mut server = WebServer::new(Settings::default());
        server
            .use_compression()
            .serve_static("/public", "/srv/public")
            .use_cookie_parser()
            .use_json_parser()
            .use_urlencoded_parser();

        assert_eq!(
            server.stack(),
            vec![
                StackItem::Compression,
                StackItem::Static {
                    mount: "/public".into(),
                    dir: "/srv/public".into()
                },
                StackItem::CookieParser,
                StackItem::JsonParser,
                StackItem::UrlencodedParser,
            ]
        );
    }

    #[test]
    fn test_views_dir_keeps_engine_ext() {
        let mut server = WebServer::new(Settings::default());
        server.register_engine("hbs", Arc::new(HandlebarsEngine::new()));
        server.set_views_dir("/srv/views");
        let current = server.views().current();
        assert_eq!(current.ext(), "hbs");
        assert_eq!(current.views_dir(), std::path::Path::new("/srv/views"));
    }

    #[tokio::test]
    async fn test_without_router_axum_default_404() {
        let app = WebServer::new(Settings::default()).into_router();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
