//! TLS material loading for the encrypted connector.
//!
//! Key material is read from PEM files: the keystore holds the certificate
//! chain followed by the private key, the optional truststore holds the
//! client roots used for optional client-certificate verification.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::ServerConfig;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use thiserror::Error;

/// Errors raised while assembling the TLS server configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The encrypted connector was requested without a keystore path.
    #[error("encrypted connector requires a keystore")]
    MissingKeystore,
    /// A PEM file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The keystore contained no certificates.
    #[error("no certificates found in '{path}'")]
    NoCertificates {
        /// Keystore path.
        path: PathBuf,
    },
    /// The keystore contained no private key.
    #[error("no private key found in '{path}'")]
    NoPrivateKey {
        /// Keystore path.
        path: PathBuf,
    },
    /// The truststore contained a certificate rustls would not accept.
    #[error("invalid trusted certificate in '{path}': {source}")]
    TrustAnchor {
        /// Truststore path.
        path: PathBuf,
        /// Underlying rustls error.
        #[source]
        source: rustls::Error,
    },
    /// Building the client verifier failed.
    #[error("failed to build client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
    /// rustls rejected the protocol versions or key material.
    #[error("TLS configuration rejected: {0}")]
    Rejected(#[from] rustls::Error),
}

/// Builds the rustls server configuration from PEM key material.
pub(crate) fn load_server_config(
    keystore: Option<&Path>,
    truststore: Option<&Path>,
) -> Result<Arc<ServerConfig>, TlsError> {
    let keystore = keystore.ok_or(TlsError::MissingKeystore)?;
    let certs = read_certificates(keystore)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: keystore.to_path_buf(),
        });
    }
    let key = read_private_key(keystore)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;
    let config = match truststore {
        Some(path) => {
            let roots = read_trust_anchors(path)?;
            let verifier = client_verifier(roots, provider)?;
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };
    Ok(Arc::new(config))
}

fn client_verifier(
    roots: RootCertStore,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn rustls::server::danger::ClientCertVerifier>, TlsError> {
    Ok(
        WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .allow_unauthenticated()
            .build()?,
    )
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

fn read_trust_anchors(path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in read_certificates(path)? {
        roots
            .add(cert)
            .map_err(|source| TlsError::TrustAnchor {
                path: path.to_path_buf(),
                source,
            })?;
    }
    if roots.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(roots)
}
