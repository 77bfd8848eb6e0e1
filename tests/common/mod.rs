//! Shared utilities for integration tests.

use std::fs::File;
use std::io::{BufReader, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use hello_tls_server::diagnostics::{Diagnostics, ErrorReporter, Transcript};
use hello_tls_server::lifecycle::{self, Shutdown};
use hello_tls_server::net::{ConnectionReport, TlsTransport};
use hello_tls_server::{ServerConfig, ServerLoop};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Loopback config on an ephemeral port with the test credentials.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = "0".into();
    config.listener.private_key_path = fixture("server.key");
    config.listener.cert_chain_path = fixture("server-chain.pem");
    config.accept.backoff_base_ms = 0;
    config.accept.backoff_max_ms = 0;
    config
}

/// Cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A bound server whose output is captured.
pub struct TestServer {
    pub server: ServerLoop<TlsTransport>,
    pub addr: SocketAddr,
    pub transcript: Captured,
    pub errors: Captured,
    pub shutdown: Shutdown,
    pub reports: mpsc::UnboundedReceiver<ConnectionReport>,
}

/// Drain every report produced so far.
pub fn drain_reports(reports: &mut mpsc::UnboundedReceiver<ConnectionReport>) -> Vec<ConnectionReport> {
    let mut out = Vec::new();
    while let Ok(report) = reports.try_recv() {
        out.push(report);
    }
    out
}

pub async fn start_server() -> TestServer {
    let transcript = Captured::default();
    let errors = Captured::default();
    let (tx, reports) = mpsc::unbounded_channel();

    let server = lifecycle::start(&test_config(), &mut Diagnostics::new())
        .await
        .expect("test server should start")
        .with_transcript(Transcript::new(Some(Box::new(transcript.clone()))))
        .with_reporter(ErrorReporter::new(Some(Box::new(errors.clone()))))
        .with_report_channel(tx);
    let addr = server.local_addr();

    TestServer {
        server,
        addr,
        transcript,
        errors,
        shutdown: Shutdown::new(),
        reports,
    }
}

/// Connector trusting the test CA.
pub fn connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    let mut reader = BufReader::new(File::open(fixture("ca.pem")).unwrap());
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert.unwrap()).unwrap();
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

pub async fn connect(addr: SocketAddr) -> std::io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(addr).await?;
    let name = ServerName::try_from("localhost").unwrap();
    connector().connect(name, tcp).await
}

/// Send `payload`, then read until the server closes.
pub async fn exchange(addr: SocketAddr, payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut tls = connect(addr).await?;
    tls.write_all(payload).await?;
    tls.flush().await?;

    let mut response = Vec::new();
    tls.read_to_end(&mut response).await?;
    Ok(response)
}
