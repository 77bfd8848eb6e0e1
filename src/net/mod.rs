//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind once, accept sequentially)
//!     → tls.rs (ServerContext: validated key material, channel policy)
//!     → channel.rs (TLS handshake, line reads, writes, close_notify)
//!     → connection.rs (per-connection state machine)
//!
//! Connection States:
//!     Handshaking → ReadingRequest → WritingResponse → ShuttingDown → Closed
//!          └──────────────┴──────────────┴──→ Failed
//! ```
//!
//! # Design Decisions
//! - One connection at a time; the next accept waits for the handler
//! - Channel operations go through traits so the state machine can be
//!   exercised without sockets
//! - Lines longer than the buffer arrive in buffer-sized chunks

pub mod buffer;
pub mod channel;
pub mod connection;
pub mod listener;
pub mod tls;

pub use buffer::{LineBuffer, LINE_BUFFER_CAPACITY};
pub use channel::{ChannelError, ReadOutcome, SecureChannel, TlsChannel, TlsTransport, Transport};
pub use connection::{ConnectionError, ConnectionHandler, ConnectionId, ConnectionReport, ConnectionState};
pub use listener::{Listener, ListenerError};
pub use tls::{ChannelPolicy, ContextError, ServerContext};
