//! Connection state machine.
//!
//! # Responsibilities
//! - Drive one accepted connection through
//!   Handshaking → ReadingRequest → WritingResponse → ShuttingDown → Closed
//! - Contain every per-connection failure (→ Failed)
//! - Release the channel on every path and drain its diagnostics
//! - Generate unique connection IDs for tracing

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use thiserror::Error;

use crate::diagnostics::{Diagnostics, ErrorReporter, Stage, Transcript};
use crate::net::buffer::LineBuffer;
use crate::net::channel::{ChannelError, ReadOutcome, SecureChannel, Transport};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Securing the raw stream.
    Handshaking,
    /// Reading lines until the blank-line terminator or a peer close.
    ReadingRequest,
    /// Sending the fixed response.
    WritingResponse,
    /// Protocol-level close in progress.
    ShuttingDown,
    /// Resources released after a successful exchange.
    Closed,
    /// Absorbing failure state.
    Failed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Handshaking, ReadingRequest)
                | (ReadingRequest, WritingResponse)
                | (WritingResponse, ShuttingDown)
                | (ShuttingDown, Closed)
                | (Handshaking | ReadingRequest | WritingResponse, Failed)
        )
    }
}

/// Per-connection failure. Never propagates past the accept loop.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("TLS handshaking error")]
    Handshake(#[source] ChannelError),

    #[error("error while reading data from the client")]
    Read(#[source] ChannelError),

    #[error("could not write response to the client")]
    Write(#[source] ChannelError),

    #[error("could not send all data to the client ({written} of {expected} bytes accepted)")]
    ShortWrite { written: usize, expected: usize },
}

impl ConnectionError {
    pub fn stage(&self) -> Stage {
        match self {
            ConnectionError::Handshake(_) => Stage::Handshake,
            ConnectionError::Read(_) => Stage::Read,
            ConnectionError::Write(_) | ConnectionError::ShortWrite { .. } => Stage::Write,
        }
    }
}

/// What happened to one connection.
#[derive(Debug)]
pub struct ConnectionReport {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    /// `Closed` or `Failed`.
    pub final_state: ConnectionState,
    pub error: Option<ConnectionError>,
    /// Protocol close failed; the exchange itself still succeeded.
    pub shutdown_warning: Option<ChannelError>,
    pub lines_read: usize,
    pub bytes_written: usize,
    /// Diagnostic records drained when the connection finished.
    pub diagnostics_drained: usize,
}

impl ConnectionReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == ConnectionState::Closed
    }
}

/// Running state of one exchange.
struct Session {
    id: ConnectionId,
    state: ConnectionState,
    lines_read: usize,
    bytes_written: usize,
    shutdown_warning: Option<ChannelError>,
}

impl Session {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: ConnectionState::Handshaking,
            lines_read: 0,
            bytes_written: 0,
            shutdown_warning: None,
        }
    }

    fn advance(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

/// Runs the request/response exchange for one connection at a time.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    response: &'static [u8],
}

impl ConnectionHandler {
    pub fn new(response: &'static [u8]) -> Self {
        Self { response }
    }

    /// Handle one accepted stream to completion.
    ///
    /// Always returns a report; failures are written to `reporter`, never
    /// returned. The secured channel is dropped before this returns, on
    /// every path.
    pub async fn handle<T: Transport>(
        &self,
        transport: &T,
        stream: T::Stream,
        peer: SocketAddr,
        transcript: &mut Transcript,
        reporter: &mut ErrorReporter,
    ) -> ConnectionReport {
        let started = Instant::now();
        let mut session = Session::new(ConnectionId::new());
        let mut diagnostics = Diagnostics::new();
        let context = session.id.to_string();

        tracing::debug!(connection_id = %session.id, peer = %peer, "Handling connection");

        let result = self
            .exchange(transport, stream, &mut session, &mut diagnostics, transcript)
            .await;

        let error = match result {
            Ok(()) => {
                session.advance(ConnectionState::Closed);
                None
            }
            Err(err) => {
                session.advance(ConnectionState::Failed);
                reporter.report_error(&context, &err);
                Some(err)
            }
        };
        if let Some(warning) = &session.shutdown_warning {
            reporter.report_warning(&context, &format!("TLS shutdown failed: {}", warning.detail()));
        }
        let diagnostics_drained = reporter.flush_diagnostics(&context, &mut diagnostics);

        tracing::info!(
            connection_id = %session.id,
            peer = %peer,
            state = ?session.state,
            lines_read = session.lines_read,
            bytes_written = session.bytes_written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Connection finished"
        );

        ConnectionReport {
            id: session.id,
            peer,
            final_state: session.state,
            error,
            shutdown_warning: session.shutdown_warning,
            lines_read: session.lines_read,
            bytes_written: session.bytes_written,
            diagnostics_drained,
        }
    }

    /// The channel lives only inside this call, so it is released whether
    /// the exchange returns early or not.
    async fn exchange<T: Transport>(
        &self,
        transport: &T,
        stream: T::Stream,
        session: &mut Session,
        diagnostics: &mut Diagnostics,
        transcript: &mut Transcript,
    ) -> Result<(), ConnectionError> {
        let mut channel = transport
            .handshake(stream, diagnostics)
            .await
            .map_err(ConnectionError::Handshake)?;

        session.advance(ConnectionState::ReadingRequest);
        let mut buf = LineBuffer::new();

        transcript.line("*** Receiving from the client:");
        loop {
            match channel.read_line(&mut buf, diagnostics).await.map_err(ConnectionError::Read)? {
                ReadOutcome::PeerShutdown => break,
                ReadOutcome::Line(_) => {
                    session.lines_read += 1;
                    transcript.echo(buf.as_bytes());
                    if buf.is_terminator() {
                        break;
                    }
                }
            }
        }
        transcript.line("*** Receiving from the client finished");

        session.advance(ConnectionState::WritingResponse);
        transcript.line("*** Sending to the client:");
        transcript.echo(self.response);

        let written = channel
            .write(self.response, diagnostics)
            .await
            .map_err(ConnectionError::Write)?;
        session.bytes_written = written;
        if written != self.response.len() {
            return Err(ConnectionError::ShortWrite {
                written,
                expected: self.response.len(),
            });
        }
        transcript.line("*** Sending to the client finished");

        session.advance(ConnectionState::ShuttingDown);
        if let Err(err) = channel.shutdown(diagnostics).await {
            tracing::warn!(connection_id = %session.id, error = %err.detail(), "TLS shutdown failed");
            session.shutdown_warning = Some(err);
        }

        Ok(())
    }
}
