//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Facades, event hub, request pipeline produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (event and registration counters)
//! HTTP spans come from tower-http's TraceLayer in http/server.rs.
//! ```

pub mod logging;
pub mod metrics;
