//! HTTP subsystem: the wrapped server and its middleware.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace span, timeout)
//!     → fallback.rs (error classifier, around the whole stack)
//!     → registered middleware, in registration order
//!         compression.rs, static_files.rs, jsonp.rs, parsers.rs, user layers
//!     → routes.rs (mounted route table)
//!     → fallback.rs (catch-all 404)
//! ```

pub mod compression;
pub mod fallback;
pub mod jsonp;
pub mod parsers;
pub mod request;
pub mod routes;
pub mod server;
pub mod static_files;

pub use parsers::{Cookies, ParsedBody};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use routes::{Registration, RouterHandle, Verb};
pub use server::{serve, RunningServer, Settings, StackItem, WebServer};
