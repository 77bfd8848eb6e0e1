//! The fixed reply sent to every client.

/// Status line, headers, blank line, body.
pub const FIXED_RESPONSE: &str = concat!(
    "HTTP/1.0 200 OK\r\n",
    "Content-type: text/plain\r\n",
    "Connection: close\r\n",
    "Server: Example TLS server\r\n",
    "\r\n",
    "Hello from the TLS server!\n",
);
