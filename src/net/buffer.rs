//! Fixed-capacity line buffer.

/// Bytes read per line call.
pub const LINE_BUFFER_CAPACITY: usize = 16 * 1024;

/// Holds at most one line (or one capacity-sized chunk of a longer line).
///
/// Reused across reads within a connection; a new connection gets a new one.
#[derive(Debug)]
pub struct LineBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LINE_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "line buffer capacity must be positive");
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Copy from `input` up to and including the first `\n`, or until full.
    ///
    /// Returns the number of bytes taken and whether a newline ended the line.
    pub fn fill_from(&mut self, input: &[u8]) -> (usize, bool) {
        let room = self.capacity - self.data.len();
        let window = &input[..input.len().min(room)];
        match window.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                self.data.extend_from_slice(&window[..=idx]);
                (idx + 1, true)
            }
            None => {
                self.data.extend_from_slice(window);
                (window.len(), false)
            }
        }
    }

    /// An empty line: bare `\r\n` or bare `\n`.
    pub fn is_terminator(&self) -> bool {
        matches!(self.data.as_slice(), b"\r\n" | b"\n")
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
