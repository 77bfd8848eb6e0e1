//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port parses, backoff bounds ordered)
//! - Reject missing credential locations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any key material is read or socket bound

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid port {0:?}: expected a number between 0 and 65535")]
    InvalidPort(String),

    #[error("listener host must not be empty")]
    EmptyHost,

    #[error("invalid listener host {0:?}: expected an IPv4 or IPv6 address")]
    InvalidHost(String),

    #[error("private key path must not be empty")]
    MissingPrivateKey,

    #[error("certificate chain path must not be empty")]
    MissingCertChain,

    #[error("accept backoff base ({base_ms} ms) exceeds maximum ({max_ms} ms)")]
    BackoffRange { base_ms: u64, max_ms: u64 },

    #[error("log level must not be empty")]
    EmptyLogLevel,
}

/// Check a fully merged configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listener = &config.listener;

    if listener.port_number().is_none() {
        errors.push(ValidationError::InvalidPort(listener.port.clone()));
    }
    if listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    } else if listener.ip().is_none() {
        errors.push(ValidationError::InvalidHost(listener.host.clone()));
    }
    if listener.private_key_path.as_os_str().is_empty() {
        errors.push(ValidationError::MissingPrivateKey);
    }
    if listener.cert_chain_path.as_os_str().is_empty() {
        errors.push(ValidationError::MissingCertChain);
    }
    if config.accept.backoff_base_ms > config.accept.backoff_max_ms {
        errors.push(ValidationError::BackoffRange {
            base_ms: config.accept.backoff_base_ms,
            max_ms: config.accept.backoff_max_ms,
        });
    }
    if config.logging.level.trim().is_empty() {
        errors.push(ValidationError::EmptyLogLevel);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
