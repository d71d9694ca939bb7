//! Process lifecycle: shutdown coordination and OS signals.
//!
//! # Data Flow
//! ```text
//! SIGTERM / SIGINT (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → server stops accepting, drains in-flight requests
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
