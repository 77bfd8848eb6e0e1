//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured port once per process
//! - Accept incoming TCP connections one at a time
//! - Surface bind and accept failures as distinct errors

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Configured host/port do not form a socket address.
    InvalidAddress(String),
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl ListenerError {
    /// OS reason code, if the failure came from the socket layer.
    pub fn code(&self) -> Option<i32> {
        match self {
            ListenerError::InvalidAddress(_) => None,
            ListenerError::Bind(e) | ListenerError::Accept(e) => e.raw_os_error(),
        }
    }
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::InvalidAddress(addr) => write!(f, "Invalid listen address: {}", addr),
            ListenerError::Bind(e) => write!(f, "Could not bind and start listening: {}", e),
            ListenerError::Accept(e) => write!(f, "Error when trying to accept connection: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// The process-wide listening socket.
///
/// Bound once at startup and never recreated; only `accept` repeats.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Address actually bound (resolves port 0).
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config
            .socket_addr()
            .ok_or_else(|| ListenerError::InvalidAddress(format!("{}:{}", config.host, config.port)))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            local_addr,
        })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(peer_addr = %addr, "Connection accepted");

        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
