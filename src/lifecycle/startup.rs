//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the TLS server context from the validated configuration
//! - Bind the listener only once the context is known good
//! - Hand back a ready-to-run accept loop
//! - Leave a `Setup` record for whichever step failed
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Credentials are checked before the port is touched

use thiserror::Error;

use crate::config::ServerConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::net::{ChannelPolicy, ContextError, Listener, ListenerError, ServerContext, TlsTransport};
use crate::server::ServerLoop;

/// Fatal startup failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

impl StartupError {
    /// OS reason code, if the failure came from the socket layer.
    pub fn code(&self) -> Option<i32> {
        match self {
            StartupError::Context(_) => None,
            StartupError::Listener(e) => e.code(),
        }
    }
}

/// Build the context, bind, and return the accept loop.
pub async fn start(config: &ServerConfig, diagnostics: &mut Diagnostics) -> Result<ServerLoop<TlsTransport>, StartupError> {
    build(config).await.map_err(|err| {
        diagnostics.record(Stage::Setup, err.code(), err.to_string());
        err
    })
}

async fn build(config: &ServerConfig) -> Result<ServerLoop<TlsTransport>, StartupError> {
    let policy = ChannelPolicy {
        auto_retry: config.channel.auto_retry,
    };
    let context = ServerContext::from_listener(&config.listener, policy)?;
    let listener = Listener::bind(&config.listener).await?;

    tracing::info!(
        address = %listener.local_addr(),
        auto_retry = policy.auto_retry,
        "TLS server ready"
    );

    let port = listener.local_addr().port().to_string();
    Ok(ServerLoop::new(TlsTransport::new(listener, context), port, &config.accept))
}
