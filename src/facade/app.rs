//! The application facade: owns the server handle and runs the fixed setup
//! sequence on `init`.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, response::IntoResponse, routing::Route, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{Layer, Service};

use crate::config::WebConfig;
use crate::error::FacadeError;
use crate::http::server::{self, RunningServer, Settings, WebServer};
use crate::views::{HandlebarsEngine, ViewEngine, ViewLocator, ViewSet, Views};

/// Environment variable overriding the configured port.
pub const PORT_ENV: &str = "PORT";

enum AppState {
    Uninitialized,
    Ready(WebServer),
    Started,
}

/// Wraps the web server for the host.
pub struct AppFacade {
    config: Arc<WebConfig>,
    state: AppState,
    views: Option<Views>,
}

impl AppFacade {
    pub fn new(config: Arc<WebConfig>) -> Self {
        Self {
            config,
            state: AppState::Uninitialized,
            views: None,
        }
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, AppState::Uninitialized)
    }

    /// Construct the server and apply the configuration.
    ///
    /// Order: settings and locals, compression, static mounts, view engine
    /// and views directory, JSONP, then cookie, JSON and URL-encoded parsing.
    pub fn init(&mut self) -> Result<&mut Self, FacadeError> {
        if self.is_initialized() {
            return Err(FacadeError::AlreadyInitialized("app"));
        }
        let config = self.config.clone();

        let mut server = WebServer::new(Settings {
            show_stack_error: config.show_stack_error,
            body_limit: config.body_limit,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            ..Settings::default()
        });
        server.views().set_local("pretty", config.pretty_html);

        if config.compression {
            server.use_compression();
        }

        for (mount, dir) in &config.static_dirs {
            let dir = config.resolve_path(dir);
            tracing::debug!(mount = %mount, dir = %dir.display(), "Static mount");
            server.serve_static(mount.as_str(), dir);
        }

        let engine: Arc<dyn ViewEngine> = Arc::new(HandlebarsEngine::new());
        server
            .register_engine(config.view_engine.as_str(), engine)
            .set_views_dir(config.views_dir());

        if config.jsonp {
            server.enable_jsonp();
        }

        server
            .use_cookie_parser()
            .use_json_parser()
            .use_urlencoded_parser();

        tracing::info!(
            compression = config.compression,
            static_mounts = config.static_dirs.len(),
            jsonp = config.jsonp,
            view_engine = %config.view_engine,
            views = %config.views_dir().display(),
            "App initialized"
        );

        self.views = Some(server.views().clone());
        self.state = AppState::Ready(server);
        Ok(self)
    }

    /// Alias of [`init`](Self::init).
    pub fn ready(&mut self) -> Result<&mut Self, FacadeError> {
        self.init()
    }

    /// The server handle, between `init` and `start`.
    pub fn server(&self) -> Result<&WebServer, FacadeError> {
        match &self.state {
            AppState::Ready(server) => Ok(server),
            AppState::Uninitialized => Err(FacadeError::NotInitialized("app")),
            AppState::Started => Err(FacadeError::AlreadyStarted),
        }
    }

    pub fn server_mut(&mut self) -> Result<&mut WebServer, FacadeError> {
        match &mut self.state {
            AppState::Ready(server) => Ok(server),
            AppState::Uninitialized => Err(FacadeError::NotInitialized("app")),
            AppState::Started => Err(FacadeError::AlreadyStarted),
        }
    }

    /// Register middleware on the server, at the next stack position.
    pub fn use_layer<L>(&mut self, layer: L) -> Result<&mut Self, FacadeError>
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.server_mut()?.use_layer(layer);
        Ok(self)
    }

    /// Replace the rendering engine and the view lookup.
    ///
    /// Names are resolved by `locator` first, then under `views_path`. May be
    /// called after `start`.
    pub fn renderer(
        &mut self,
        engine: Arc<dyn ViewEngine>,
        views_path: impl Into<PathBuf>,
        locator: Arc<dyn ViewLocator>,
    ) -> Result<&mut Self, FacadeError> {
        let views = self.views.as_ref().ok_or(FacadeError::NotInitialized("app"))?;
        let ext = views.current().ext().to_string();
        views.replace(ViewSet::with_locator(ext, engine, views_path, locator));
        Ok(self)
    }

    /// Views shared with handlers through `Extension<Views>`.
    pub fn views(&self) -> Option<&Views> {
        self.views.as_ref()
    }

    /// Materialize the server into a router without binding.
    ///
    /// The server is consumed; further registration fails with
    /// `AlreadyStarted`.
    pub fn build_router(&mut self) -> Result<Router, FacadeError> {
        match std::mem::replace(&mut self.state, AppState::Started) {
            AppState::Ready(server) => Ok(server.into_router()),
            AppState::Uninitialized => {
                self.state = AppState::Uninitialized;
                Err(FacadeError::NotInitialized("app"))
            }
            AppState::Started => Err(FacadeError::AlreadyStarted),
        }
    }

    /// Listen on `PORT` when set, the configured port otherwise.
    pub async fn start(&mut self, shutdown: broadcast::Receiver<()>) -> Result<RunningServer, FacadeError> {
        let env_port = std::env::var(PORT_ENV).ok();
        let port = resolve_port(env_port.as_deref(), self.config.port)?;
        self.listen(port, shutdown).await
    }

    /// Listen on an explicit port; `0` picks a free one.
    pub async fn listen(
        &mut self,
        port: u16,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<RunningServer, FacadeError> {
        self.server()?;

        let addr = format!("{}:{}", self.config.host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| FacadeError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let router = self.build_router()?;
        server::serve(router, listener, shutdown).map_err(|source| FacadeError::Bind { addr, source })
    }
}

/// Port to listen on: a non-empty `PORT` value wins over the configured one.
pub fn resolve_port(env_value: Option<&str>, configured: u16) -> Result<u16, FacadeError> {
    match env_value.map(str::trim) {
        None | Some("") => Ok(configured),
        Some(value) => value
            .parse()
            .map_err(|_| FacadeError::InvalidPort(value.to_string())),
    }
}
