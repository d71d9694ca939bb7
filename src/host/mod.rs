//! The modulable host.
//!
//! # Responsibilities
//! - Own the app and router facades, the event hub and the shutdown
//!   coordinator
//! - Emit lifecycle events in order: `init` (alias `ready`), then `start`
//! - Hand each event to the facades first, then to plugins in registration
//!   order
//!
//! # Data Flow
//! ```text
//! Host::run
//!     → emit(Init)   app.init → router.init → plugin.on_init ...
//!     → emit(Start)  plugin.on_start ... → app.start (bind + serve)
//!     → wait for SIGTERM / SIGINT → Shutdown::trigger → drain
//! ```

pub mod events;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::WebConfig;
use crate::error::FacadeError;
use crate::facade::{AppFacade, RouterFacade};
use crate::http::RunningServer;
use crate::lifecycle::{wait_for_signal, Shutdown};

use events::EventHub;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle events emitted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Init,
    /// Same as `Init`.
    Ready,
    Start,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Init => "init",
            Lifecycle::Ready => "ready",
            Lifecycle::Start => "start",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Facade(#[from] FacadeError),

    #[error("plugin {name} failed on {event}: {source}")]
    Plugin {
        name: String,
        event: Lifecycle,
        #[source]
        source: BoxError,
    },

    #[error("server failed: {0}")]
    Server(#[from] std::io::Error),

    #[error("host not started")]
    NotStarted,
}

/// What plugins get access to during lifecycle hooks.
pub struct Core {
    pub app: AppFacade,
    pub router: RouterFacade,
    pub events: EventHub,
}

/// A module plugged into the host.
///
/// `on_init` runs after both facades are initialized, so routes and
/// middleware can be registered. `on_start` runs before the server binds.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn on_init(&mut self, _core: &mut Core) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_start(&mut self, _core: &mut Core) -> Result<(), BoxError> {
        Ok(())
    }
}

pub struct Host {
    core: Core,
    plugins: Vec<Box<dyn Plugin>>,
    shutdown: Shutdown,
    server: Option<RunningServer>,
}

impl Host {
    pub fn new(config: WebConfig) -> Self {
        let events = EventHub::new();
        Self {
            core: Core {
                app: AppFacade::new(Arc::new(config)),
                router: RouterFacade::new(events.clone()),
                events,
            },
            plugins: Vec::new(),
            shutdown: Shutdown::new(),
            server: None,
        }
    }

    /// Add a plugin; plugins receive lifecycle events in the order added.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(plugin);
        self
    }

    pub fn register(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        tracing::debug!(plugin = plugin.name(), "Plugin registered");
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn events(&self) -> &EventHub {
        &self.core.events
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Address of the running server.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(RunningServer::local_addr)
    }

    /// Emit a lifecycle event to the facades, then to every plugin.
    pub async fn emit(&mut self, event: Lifecycle) -> Result<(), HostError> {
        tracing::info!(event = %event, plugins = self.plugins.len(), "Lifecycle event");
        match event {
            Lifecycle::Init | Lifecycle::Ready => {
                let Core { app, router, .. } = &mut self.core;
                app.init()?;
                router.init(app)?;
                self.notify_plugins(event)
            }
            Lifecycle::Start => {
                self.notify_plugins(event)?;
                let server = self.core.app.start(self.shutdown.subscribe()).await?;
                tracing::info!(address = %server.local_addr(), "Listening for connections");
                self.server = Some(server);
                Ok(())
            }
        }
    }

    fn notify_plugins(&mut self, event: Lifecycle) -> Result<(), HostError> {
        for plugin in &mut self.plugins {
            let result = match event {
                Lifecycle::Init | Lifecycle::Ready => plugin.on_init(&mut self.core),
                Lifecycle::Start => plugin.on_start(&mut self.core),
            };
            result.map_err(|source| HostError::Plugin {
                name: plugin.name().to_string(),
                event,
                source,
            })?;
        }
        Ok(())
    }

    /// Emit `init` then `start`.
    pub async fn boot(&mut self) -> Result<SocketAddr, HostError> {
        self.emit(Lifecycle::Init).await?;
        self.emit(Lifecycle::Start).await?;
        self.local_addr().ok_or(HostError::NotStarted)
    }

    /// Boot, serve until SIGTERM / SIGINT, then drain.
    pub async fn run(mut self) -> Result<(), HostError> {
        self.boot().await?;
        wait_for_signal().await;
        self.shutdown();
        self.wait().await
    }

    /// Signal the server to stop accepting connections.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the server to finish draining.
    pub async fn wait(&mut self) -> Result<(), HostError> {
        let server = self.server.take().ok_or(HostError::NotStarted)?;
        server.wait().await?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
