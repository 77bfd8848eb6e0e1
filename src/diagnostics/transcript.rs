//! Human-readable progress output.

use std::io::Write;

/// Progress lines and echoed request data, stdout by default.
pub struct Transcript {
    out: Option<Box<dyn Write + Send>>,
}

impl Transcript {
    pub fn new(out: Option<Box<dyn Write + Send>>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Some(Box::new(std::io::stdout())))
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn line(&mut self, text: &str) {
        if let Some(out) = self.out.as_mut() {
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        }
    }

    /// Copy bytes through unchanged.
    pub fn echo(&mut self, bytes: &[u8]) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.write_all(bytes);
            let _ = out.flush();
        }
    }
}
