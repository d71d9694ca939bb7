//! Facades the host drives: the app (server handle) and the router.
//!
//! # Design Decisions
//! - `init` runs once; a second call is an error rather than a re-setup
//! - Registration methods return the facade so calls chain with `?`
//! - After `start` the server is frozen; only the renderer can change

pub mod app;
pub mod router;

pub use app::{resolve_port, AppFacade, PORT_ENV};
pub use router::RouterFacade;
