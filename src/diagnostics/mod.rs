//! Diagnostic output subsystem.
//!
//! # Data Flow
//! ```text
//! transport call fails
//!     → record.rs (DiagnosticRecord pushed onto the caller's Diagnostics)
//!     → reporter.rs (ErrorReporter drains and writes to stderr)
//!
//! progress and request echo
//!     → transcript.rs (stdout)
//! ```
//!
//! # Design Decisions
//! - No global error queue: each connection and the accept loop own their
//!   accumulator, so records cannot cross connection boundaries
//! - Draining happens at every component boundary, success or failure
//! - Text output is observational only; nothing parses it

pub mod record;
pub mod reporter;
pub mod transcript;

pub use record::{DiagnosticRecord, Diagnostics, Stage};
pub use reporter::ErrorReporter;
pub use transcript::Transcript;
