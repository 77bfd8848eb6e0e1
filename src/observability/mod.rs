//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Operational logs are separate from the human-readable transcript and
//!   error report (see `diagnostics`)
//! - Connection IDs flow through every per-connection event

pub mod logging;
