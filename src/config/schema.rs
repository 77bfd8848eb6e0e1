//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the TLS server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind port, credentials).
    pub listener: ListenerConfig,

    /// Secure channel construction policy.
    pub channel: ChannelConfig,

    /// Accept retry settings.
    pub accept: AcceptConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind, as an IP literal (e.g., "0.0.0.0" or "::").
    #[serde(default = "default_host")]
    pub host: String,

    /// Port identifier, kept as given on the command line.
    #[serde(default = "default_port")]
    pub port: String,

    /// Path to the server private key (PEM).
    pub private_key_path: PathBuf,

    /// Path to the server certificate chain, leaf first (PEM).
    pub cert_chain_path: PathBuf,
}

impl ListenerConfig {
    /// Host parsed as an IP address, ignoring surrounding whitespace.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.trim().parse().ok()
    }

    /// Port parsed as a number, ignoring surrounding whitespace.
    pub fn port_number(&self) -> Option<u16> {
        self.port.trim().parse().ok()
    }

    /// Socket address to bind, if both host and port parse.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::new(self.ip()?, self.port_number()?))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> String {
    "4433".to_string()
}

fn default_auto_retry() -> bool {
    true
}

fn default_backoff_base_ms() -> u64 {
    10
}

fn default_backoff_max_ms() -> u64 {
    1000
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            private_key_path: PathBuf::new(),
            cert_chain_path: PathBuf::new(),
        }
    }
}

/// Channel construction policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Keep writing until the whole buffer has been accepted.
    #[serde(default = "default_auto_retry")]
    pub auto_retry: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            auto_retry: default_auto_retry(),
        }
    }
}

/// Backoff applied between consecutive failed accepts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcceptConfig {
    /// Delay after the first failure.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for the delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Pretty,
        }
    }
}
