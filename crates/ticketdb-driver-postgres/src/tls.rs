//! TLS connectors for encrypted sessions with the ticket database

use std::fs;
use std::path::Path;

use native_tls::{Certificate, Identity, TlsConnector as NativeTlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use ticketdb_core::{DbError, TlsConfig, TlsMode};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CA certificate format: {0}")]
    InvalidCaCert(String),

    #[error("Failed to load client certificate from {path}: {source}")]
    ClientCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to load client key from {path}: {source}")]
    ClientKeyLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid client identity (cert + key): {0}")]
    InvalidClientIdentity(String),

    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),

    /// `Disable` has no connector; callers use `NoTls`.
    #[error("TLS mode {mode:?} is not supported for this operation")]
    UnsupportedMode { mode: TlsMode },
}

impl From<TlsError> for DbError {
    fn from(err: TlsError) -> Self {
        DbError::Tls(err.to_string())
    }
}

/// Builds `MakeTlsConnector`s for tokio-postgres from a [`TlsConfig`]
#[derive(Debug, Clone)]
pub struct PostgresTlsConnector;

impl PostgresTlsConnector {
    /// Build a connector matching the configured mode and certificates.
    ///
    /// `Prefer` and `Require` encrypt without verifying the server unless a
    /// CA certificate is supplied, in which case the chain is checked.
    /// `VerifyCa` skips only the hostname check.
    pub fn build(config: &TlsConfig) -> Result<MakeTlsConnector, TlsError> {
        config
            .validate()
            .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;

        if config.mode == TlsMode::Disable {
            return Err(TlsError::UnsupportedMode { mode: config.mode });
        }

        debug!(mode = ?config.mode, "building PostgreSQL TLS connector");

        let mut builder = NativeTlsConnector::builder();
        configure_verification(&mut builder, config)?;

        if let Some(ca_cert_path) = &config.ca_cert {
            apply_ca_cert(&mut builder, ca_cert_path)?;
        }

        if let (Some(cert_path), Some(key_path)) = (&config.client_cert, &config.client_key) {
            apply_client_cert(&mut builder, cert_path, key_path)?;
        }

        let connector = builder
            .build()
            .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;

        Ok(MakeTlsConnector::new(connector))
    }
}

fn configure_verification(
    builder: &mut TlsConnectorBuilder,
    config: &TlsConfig,
) -> Result<(), TlsError> {
    match config.mode {
        TlsMode::Disable => return Err(TlsError::UnsupportedMode { mode: config.mode }),
        TlsMode::Prefer | TlsMode::Require => {
            if config.ca_cert.is_none() {
                builder.danger_accept_invalid_certs(true);
            }
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyFull => {}
    }
    Ok(())
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &Path) -> Result<(), TlsError> {
    debug!(path = %path.display(), "loading CA certificate");

    let pem = fs::read(path).map_err(|source| TlsError::CaCertLoadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let cert = Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidCaCert(e.to_string()))?;

    builder.add_root_certificate(cert);
    Ok(())
}

fn apply_client_cert(
    builder: &mut TlsConnectorBuilder,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), TlsError> {
    debug!(
        cert_path = %cert_path.display(),
        key_path = %key_path.display(),
        "loading client certificate and key"
    );

    let cert_pem = fs::read(cert_path).map_err(|source| TlsError::ClientCertLoadFailed {
        path: cert_path.display().to_string(),
        source,
    })?;
    let key_pem = fs::read(key_path).map_err(|source| TlsError::ClientKeyLoadFailed {
        path: key_path.display().to_string(),
        source,
    })?;

    // PEM certificate plus PEM PKCS#8 key
    let identity = Identity::from_pkcs8(&cert_pem, &key_pem)
        .map_err(|e| TlsError::InvalidClientIdentity(e.to_string()))?;

    builder.identity(identity);
    Ok(())
}
