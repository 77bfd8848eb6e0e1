//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → ServerContext → bind listener → ServerLoop
//!
//! Shutdown (shutdown.rs):
//!     Trigger → accept loop stops between connections → summary
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then credentials, then listener
//! - An in-flight connection always finishes; shutdown is only observed
//!   between accepts

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError};
