//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept fails:
//!     → backoff.rs (delay grows with consecutive failures, resets on success)
//!     → accept loop waits (interruptible by shutdown) and retries
//! ```
//!
//! # Design Decisions
//! - Accept failures never end the loop
//! - Jittered backoff keeps a persistent OS error (e.g. fd exhaustion)
//!   from turning into a busy loop

pub mod backoff;

pub use backoff::AcceptBackoff;
