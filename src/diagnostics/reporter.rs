//! Pass-through error sink.
//!
//! The reporter formats failures and drained diagnostic records onto a
//! writer (stderr by default) and mirrors them as `tracing` events. It never
//! changes control flow: callers decide what a failure means, the reporter
//! only tells someone about it.

use std::error::Error as StdError;
use std::io::Write;

use crate::diagnostics::record::Diagnostics;

pub struct ErrorReporter {
    sink: Option<Box<dyn Write + Send>>,
}

impl ErrorReporter {
    /// Reporter writing to an arbitrary sink; `None` disables text output.
    pub fn new(sink: Option<Box<dyn Write + Send>>) -> Self {
        Self { sink }
    }

    pub fn stderr() -> Self {
        Self::new(Some(Box::new(std::io::stderr())))
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Write an error and its source chain.
    pub fn report_error(&mut self, context: &str, err: &(dyn StdError + 'static)) {
        let mut line = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            line.push_str(": ");
            line.push_str(&cause.to_string());
            source = cause.source();
        }

        tracing::debug!(context, error = %line, "Error reported");
        self.write_line(&format!("{context}: {line}"));
    }

    /// Write a non-fatal warning.
    pub fn report_warning(&mut self, context: &str, message: &str) {
        tracing::debug!(context, warning = message, "Warning reported");
        self.write_line(&format!("{context}: warning: {message}"));
    }

    /// Emit and clear every pending record. Returns how many were drained.
    ///
    /// The queue is cleared even when the sink is disabled.
    pub fn flush_diagnostics(&mut self, context: &str, diagnostics: &mut Diagnostics) -> usize {
        let records = diagnostics.drain();
        if records.is_empty() {
            return 0;
        }

        for record in &records {
            tracing::debug!(
                context,
                stage = %record.stage,
                code = ?record.code,
                message = %record.message,
                "Diagnostic record"
            );
        }

        if self.sink.is_some() {
            self.write_line(&format!("{context}: errors from the TLS diagnostic queue:"));
            for record in &records {
                self.write_line(&format!("  {record}"));
            }
        }
        records.len()
    }

    fn write_line(&mut self, line: &str) {
        if let Some(sink) = self.sink.as_mut() {
            // A broken error stream must not take the server down with it.
            let _ = writeln!(sink, "{line}");
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::record::Stage;
    use crate::testing::Captured;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn error_chain_is_flattened() {
        let captured = Captured::default();
        let mut reporter = ErrorReporter::new(Some(captured.boxed()));

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner cause"));
        reporter.report_error("conn-7", &err);

        assert_eq!(captured.text(), "conn-7: outer failure: inner cause\n");
    }

    #[test]
    fn flush_writes_records_and_clears_queue() {
        let captured = Captured::default();
        let mut reporter = ErrorReporter::new(Some(captured.boxed()));

        let mut diag = Diagnostics::new();
        diag.record(Stage::Read, Some(104), "connection reset by peer");

        assert_eq!(reporter.flush_diagnostics("conn-1", &mut diag), 1);
        assert!(diag.is_empty());
        let text = captured.text();
        assert!(text.contains("conn-1: errors from the TLS diagnostic queue:"));
        assert!(text.contains("[read] code 104: connection reset by peer"));

        // Nothing pending: nothing written.
        assert_eq!(reporter.flush_diagnostics("conn-1", &mut diag), 0);
        assert_eq!(captured.text(), text);
    }

    #[test]
    fn disabled_sink_still_drains() {
        let mut reporter = ErrorReporter::disabled();
        let mut diag = Diagnostics::new();
        diag.record(Stage::Shutdown, None, "peer went away");

        assert_eq!(reporter.flush_diagnostics("server", &mut diag), 1);
        assert!(diag.is_empty());
    }
}
