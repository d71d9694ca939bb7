//! Modulable web host.
//!
//! Wires an axum server into a plugin host through two facades:
//! [`AppFacade`] (server setup, middleware, views) and [`RouterFacade`]
//! (routes, `'404'` / `'500'` handling).

pub mod config;
pub mod error;
pub mod facade;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod views;

pub use config::WebConfig;
pub use error::{FacadeError, RouteError};
pub use facade::{AppFacade, RouterFacade};
pub use host::events::{AppEvent, EventContext, EventHub, Notification};
pub use host::{Core, Host, HostError, Lifecycle, Plugin};
pub use lifecycle::Shutdown;
pub use views::Views;
