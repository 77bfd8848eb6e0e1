//! TLS server context and credential loading.
//!
//! # Responsibilities
//! - Load the private key and certificate chain from PEM files
//! - Verify the key belongs to the leaf certificate
//! - Pin the protocol version and hold the channel policy
//!
//! Nothing here touches the network; a context that fails to build never
//! reaches the bind step.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::ListenerConfig;

/// Errors raised while building a [`ServerContext`].
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("could not load server private key from file {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    #[error("could not load server certificate chain from file {}: {reason}", path.display())]
    CertLoad { path: PathBuf, reason: String },

    #[error("server private key does not match server certificate: {reason}")]
    KeyCertMismatch { reason: String },

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// Policy applied to every channel built from the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Keep writing until the whole buffer is accepted.
    pub auto_retry: bool,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self { auto_retry: true }
    }
}

/// Validated key material and channel policy, shared read-only by every
/// connection for the lifetime of the process.
#[derive(Clone)]
pub struct ServerContext {
    config: Arc<ServerConfig>,
    policy: ChannelPolicy,
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ServerContext {
    /// Build a context from the credential locations in a listener config.
    pub fn from_listener(config: &ListenerConfig, policy: ChannelPolicy) -> Result<Self, ContextError> {
        Self::from_pem_files(&config.private_key_path, &config.cert_chain_path, policy)
    }

    /// Load, cross-check and assemble the server credentials.
    pub fn from_pem_files(key_path: &Path, cert_path: &Path, policy: ChannelPolicy) -> Result<Self, ContextError> {
        let key = load_private_key(key_path)?;
        let certs = load_cert_chain(cert_path)?;

        let provider = Arc::new(ring::default_provider());
        check_key_matches(&provider, &certs, &key, key_path)?;

        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| match e {
                rustls::Error::InconsistentKeys(_) => ContextError::KeyCertMismatch {
                    reason: e.to_string(),
                },
                other => ContextError::Tls(other),
            })?;

        tracing::debug!(
            key = %key_path.display(),
            chain = %cert_path.display(),
            auto_retry = policy.auto_retry,
            "Server context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            policy,
        })
    }

    pub fn policy(&self) -> ChannelPolicy {
        self.policy
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(Arc::clone(&self.config))
    }
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ContextError> {
    let key_error = |reason: String| ContextError::KeyLoad {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| key_error(e.to_string()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| key_error(e.to_string()))?
        .ok_or_else(|| key_error("no PEM private key found".to_string()))
}

fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, ContextError> {
    let cert_error = |reason: String| ContextError::CertLoad {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| cert_error(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| cert_error(e.to_string()))?;

    if certs.is_empty() {
        return Err(cert_error("no PEM certificates found".to_string()));
    }
    Ok(certs)
}

fn check_key_matches(
    provider: &CryptoProvider,
    certs: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
    key_path: &Path,
) -> Result<(), ContextError> {
    // A key the provider cannot parse is a load failure, not a mismatch.
    let signing_key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| ContextError::KeyLoad {
            path: key_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let certified = CertifiedKey::new(certs.to_vec(), signing_key);
    match certified.keys_match() {
        Ok(()) => Ok(()),
        Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {
            tracing::warn!("Signing key does not expose its public half; skipping key/certificate match check");
            Ok(())
        }
        Err(e) => Err(ContextError::KeyCertMismatch { reason: e.to_string() }),
    }
}
