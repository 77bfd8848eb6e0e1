//! Diagnostic records and the per-owner accumulator.

use std::fmt;

/// Lifecycle stage that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Setup,
    Accept,
    Handshake,
    Read,
    Write,
    Shutdown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Accept => "accept",
            Stage::Handshake => "handshake",
            Stage::Read => "read",
            Stage::Write => "write",
            Stage::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One low-level error entry left behind by a transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub stage: Stage,
    /// OS reason code, when the failure came from the socket layer.
    pub code: Option<i32>,
    pub message: String,
}

impl DiagnosticRecord {
    pub fn new(stage: Stage, code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] code {}: {}", self.stage, code, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Pending diagnostic records.
///
/// Every collaborator call takes the accumulator explicitly, so records can
/// only ever land in the queue of the connection (or loop) that owns it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<DiagnosticRecord>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, code: Option<i32>, message: impl Into<String>) {
        self.records.push(DiagnosticRecord::new(stage, code, message));
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Take every pending record, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<DiagnosticRecord> {
        std::mem::take(&mut self.records)
    }
}
