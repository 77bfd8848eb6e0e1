//! Minimal TLS line server library.
//!
//! Accepts one TLS connection at a time, reads request lines until a blank
//! line (or a clean close from the peer), answers with a fixed HTTP/1.0
//! response and closes the session with `close_notify`.

pub mod config;
pub mod diagnostics;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use lifecycle::Shutdown;
pub use server::{ServeSummary, ServerLoop, FIXED_RESPONSE};
