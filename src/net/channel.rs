//! Secure channel abstraction and its TLS implementation.
//!
//! The connection handler and accept loop only talk to the [`Transport`] and
//! [`SecureChannel`] traits. Every call takes the caller's [`Diagnostics`]
//! accumulator and records low-level failure detail there before returning
//! the error.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use crate::diagnostics::{Diagnostics, Stage};
use crate::net::buffer::LineBuffer;
use crate::net::listener::{Listener, ListenerError};
use crate::net::tls::{ChannelPolicy, ServerContext};

/// Failure of a single channel operation.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transport I/O failed")]
    Io(#[source] io::Error),

    #[error("TLS protocol error")]
    Tls(#[source] rustls::Error),

    #[error("channel already shut down")]
    Closed,
}

impl ChannelError {
    /// OS reason code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            ChannelError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Description including the underlying cause.
    pub fn detail(&self) -> String {
        match self {
            ChannelError::Io(e) => format!("{self}: {e}"),
            ChannelError::Tls(e) => format!("{self}: {e}"),
            ChannelError::Closed => self.to_string(),
        }
    }

    /// Push this error onto an accumulator.
    pub fn record(&self, stage: Stage, diagnostics: &mut Diagnostics) {
        diagnostics.record(stage, self.code(), self.detail());
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        let tls = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .cloned();
        match tls {
            Some(tls) => ChannelError::Tls(tls),
            None => ChannelError::Io(err),
        }
    }
}

/// Result of one line read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes are now in the line buffer.
    Line(usize),
    /// The peer closed its side of the secure channel cleanly.
    PeerShutdown,
}

/// An established, encrypted byte stream.
pub trait SecureChannel {
    /// Read one line (or one buffer-sized chunk of a long line).
    fn read_line(
        &mut self,
        buf: &mut LineBuffer,
        diagnostics: &mut Diagnostics,
    ) -> impl Future<Output = Result<ReadOutcome, ChannelError>> + Send;

    /// Write `bytes`, returning how many were accepted.
    fn write(
        &mut self,
        bytes: &[u8],
        diagnostics: &mut Diagnostics,
    ) -> impl Future<Output = Result<usize, ChannelError>> + Send;

    /// Begin a protocol-level close. Reads and writes fail afterwards.
    fn shutdown(&mut self, diagnostics: &mut Diagnostics) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Source of raw connections and the handshake that secures them.
pub trait Transport {
    type Stream: Send;
    type Channel: SecureChannel + Send;

    fn accept(
        &mut self,
        diagnostics: &mut Diagnostics,
    ) -> impl Future<Output = Result<(Self::Stream, SocketAddr), ListenerError>> + Send;

    fn handshake(
        &self,
        stream: Self::Stream,
        diagnostics: &mut Diagnostics,
    ) -> impl Future<Output = Result<Self::Channel, ChannelError>> + Send;
}

/// A server-side TLS session over any async byte stream.
pub struct TlsChannel<S = TcpStream> {
    stream: BufReader<TlsStream<S>>,
    policy: ChannelPolicy,
    shut_down: bool,
}

impl<S> TlsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: TlsStream<S>, policy: ChannelPolicy) -> Self {
        Self {
            stream: BufReader::new(stream),
            policy,
            shut_down: false,
        }
    }

    fn ensure_open(&self, stage: Stage, diagnostics: &mut Diagnostics) -> Result<(), ChannelError> {
        if self.shut_down {
            let err = ChannelError::Closed;
            err.record(stage, diagnostics);
            return Err(err);
        }
        Ok(())
    }
}

impl<S> SecureChannel for TlsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self, buf: &mut LineBuffer, diagnostics: &mut Diagnostics) -> Result<ReadOutcome, ChannelError> {
        self.ensure_open(Stage::Read, diagnostics)?;
        buf.clear();

        loop {
            let available = match self.stream.fill_buf().await {
                Ok(available) => available,
                Err(e) => {
                    let err = ChannelError::from(e);
                    err.record(Stage::Read, diagnostics);
                    return Err(err);
                }
            };

            // Clean EOF: rustls only reports it after close_notify.
            if available.is_empty() {
                return Ok(if buf.is_empty() {
                    ReadOutcome::PeerShutdown
                } else {
                    ReadOutcome::Line(buf.len())
                });
            }

            let (taken, complete) = buf.fill_from(available);
            self.stream.consume(taken);

            if complete {
                return Ok(ReadOutcome::Line(buf.len()));
            }
            if buf.is_full() {
                tracing::debug!(capacity = buf.capacity(), "Line exceeds buffer; delivering first chunk");
                return Ok(ReadOutcome::Line(buf.len()));
            }
        }
    }

    async fn write(&mut self, bytes: &[u8], diagnostics: &mut Diagnostics) -> Result<usize, ChannelError> {
        self.ensure_open(Stage::Write, diagnostics)?;

        let written = if self.policy.auto_retry {
            self.stream.write_all(bytes).await.map(|()| bytes.len())
        } else {
            self.stream.write(bytes).await
        };
        let result = match written {
            Ok(n) => self.stream.flush().await.map(|()| n),
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            let err = ChannelError::from(e);
            err.record(Stage::Write, diagnostics);
            err
        })
    }

    async fn shutdown(&mut self, diagnostics: &mut Diagnostics) -> Result<(), ChannelError> {
        self.ensure_open(Stage::Shutdown, diagnostics)?;
        self.shut_down = true;

        self.stream.shutdown().await.map_err(|e| {
            let err = ChannelError::from(e);
            err.record(Stage::Shutdown, diagnostics);
            err
        })
    }
}

/// Production transport: the bound listener plus the shared TLS context.
#[derive(Debug)]
pub struct TlsTransport {
    listener: Listener,
    context: ServerContext,
}

impl TlsTransport {
    pub fn new(listener: Listener, context: ServerContext) -> Self {
        Self { listener, context }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }
}

impl Transport for TlsTransport {
    type Stream = TcpStream;
    type Channel = TlsChannel<TcpStream>;

    async fn accept(&mut self, diagnostics: &mut Diagnostics) -> Result<(TcpStream, SocketAddr), ListenerError> {
        self.listener.accept().await.map_err(|err| {
            diagnostics.record(Stage::Accept, err.code(), err.to_string());
            err
        })
    }

    async fn handshake(&self, stream: TcpStream, diagnostics: &mut Diagnostics) -> Result<TlsChannel<TcpStream>, ChannelError> {
        match self.context.acceptor().accept(stream).await {
            Ok(tls) => Ok(TlsChannel::new(tls, self.context.policy())),
            Err(e) => {
                let err = ChannelError::from(e);
                err.record(Stage::Handshake, diagnostics);
                Err(err)
            }
        }
    }
}
