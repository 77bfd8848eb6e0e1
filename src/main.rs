//! Minimal TLS server.
//!
//! ```text
//!  client ──TCP──▶ listener ──▶ TLS handshake ──▶ read lines until "\r\n"
//!                     ▲                                   │
//!                     │                                   ▼
//!                     └──── close_notify ◀── fixed HTTP/1.0 response
//! ```
//!
//! Usage: `hello-tls-server PORT SERVER_KEYPAIR_FILE SERVER_CERT_CHAIN_FILE`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use hello_tls_server::config::loader::{finalize, parse_config};
use hello_tls_server::config::{ConfigError, LogFormat, ServerConfig};
use hello_tls_server::diagnostics::{Diagnostics, ErrorReporter};
use hello_tls_server::lifecycle::{self, signals, Shutdown};
use hello_tls_server::observability::logging;

#[derive(Parser)]
#[command(name = "hello-tls-server", version)]
#[command(about = "Answer every TLS client with a fixed HTTP/1.0 response", long_about = None)]
struct Cli {
    /// Port to listen on
    port: String,

    /// Server private key (PEM)
    server_keypair_file: PathBuf,

    /// Server certificate chain, leaf first (PEM)
    server_cert_chain_file: PathBuf,

    /// Optional TOML file with listener, channel, accept and logging settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => parse_config(path)?,
            None => ServerConfig::default(),
        };

        config.listener.port = self.port;
        config.listener.private_key_path = self.server_keypair_file;
        config.listener.cert_chain_path = self.server_cert_chain_file;
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        finalize(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hello-tls-server starting");

    let mut diagnostics = Diagnostics::new();
    let server = match lifecycle::start(&config, &mut diagnostics).await {
        Ok(server) => server,
        Err(e) => {
            let mut reporter = ErrorReporter::stderr();
            reporter.report_error("startup", &e);
            reporter.flush_diagnostics("startup", &mut diagnostics);
            eprintln!("TLS communication failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    let summary = server.run(stop).await;

    if summary.residual_diagnostics > 0 {
        eprintln!("TLS communication failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
