//! Sequential accept loop.
//!
//! # Responsibilities
//! - Accept connections one at a time and hand each to the
//!   `ConnectionHandler`, waiting for it before the next accept
//! - Report and retry failed accepts (with backoff)
//! - Drain the loop's diagnostics before and after every iteration
//! - Stop between iterations when the shutdown token fires

pub mod response;

use std::net::SocketAddr;

use tokio::sync::{broadcast, mpsc};

use crate::config::AcceptConfig;
use crate::diagnostics::{Diagnostics, ErrorReporter, Transcript};
use crate::net::{ConnectionHandler, ConnectionReport, TlsTransport, Transport};
use crate::resilience::AcceptBackoff;

pub use response::FIXED_RESPONSE;

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub accepted: u64,
    pub completed: u64,
    pub failed: u64,
    pub accept_errors: u64,
    /// Records still pending at top-level cleanup.
    pub residual_diagnostics: usize,
}

/// Owns the listening side and drives connections through the handler.
pub struct ServerLoop<T: Transport> {
    transport: T,
    port: String,
    handler: ConnectionHandler,
    transcript: Transcript,
    reporter: ErrorReporter,
    backoff: AcceptBackoff,
    diagnostics: Diagnostics,
    reports: Option<mpsc::UnboundedSender<ConnectionReport>>,
}

impl<T: Transport> ServerLoop<T> {
    /// Loop serving the fixed response, with stdout/stderr output.
    pub fn new(transport: T, port: impl Into<String>, accept: &AcceptConfig) -> Self {
        Self {
            transport,
            port: port.into(),
            handler: ConnectionHandler::new(FIXED_RESPONSE.as_bytes()),
            transcript: Transcript::stdout(),
            reporter: ErrorReporter::stderr(),
            backoff: AcceptBackoff::new(accept),
            diagnostics: Diagnostics::new(),
            reports: None,
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Forward every finished connection's report to `tx`.
    pub fn with_report_channel(mut self, tx: mpsc::UnboundedSender<ConnectionReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Accept and handle connections until `shutdown` fires.
    ///
    /// Per-connection and accept failures are reported and absorbed; this
    /// only returns once shutdown has been requested.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ServeSummary {
        let mut summary = ServeSummary::default();

        loop {
            // Records left by the previous iteration's accept.
            self.reporter.flush_diagnostics("server", &mut self.diagnostics);

            self.transcript.line("");
            self.transcript.line(&format!("*** Listening on port {}", self.port));
            self.transcript.line("");

            let accepted = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, leaving accept loop");
                    break;
                }
                accepted = self.transport.accept(&mut self.diagnostics) => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    self.backoff.reset();
                    summary.accepted += 1;
                    self.serve_one(stream, peer, &mut summary).await;
                }
                Err(err) => {
                    summary.accept_errors += 1;
                    self.reporter.report_error("accept", &err);

                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %err,
                        consecutive_failures = self.backoff.consecutive_failures(),
                        delay_ms = delay.as_millis() as u64,
                        "Accept failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown requested during accept backoff");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // Non-empty only when shutdown interrupted an accept backoff.
        summary.residual_diagnostics = self.reporter.flush_diagnostics("server", &mut self.diagnostics);
        tracing::info!(
            accepted = summary.accepted,
            completed = summary.completed,
            failed = summary.failed,
            accept_errors = summary.accept_errors,
            "Accept loop stopped"
        );
        summary
    }

    async fn serve_one(&mut self, stream: T::Stream, peer: SocketAddr, summary: &mut ServeSummary) {
        let report = self
            .handler
            .handle(&self.transport, stream, peer, &mut self.transcript, &mut self.reporter)
            .await;

        if report.succeeded() {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }

        if let Some(tx) = &self.reports {
            let _ = tx.send(report);
        }
    }
}

impl ServerLoop<TlsTransport> {
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}
