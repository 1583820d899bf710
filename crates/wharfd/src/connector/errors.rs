//! Error types for connector provisioning and supervision.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::tls::TlsError;

/// Errors surfaced while binding or running a connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The encrypted connector was requested without usable key material.
    #[error("invalid TLS configuration: {source}")]
    Configuration {
        /// Reason the key material was rejected.
        #[source]
        source: TlsError,
    },
    /// The requested port is held by another listener or not bindable.
    #[error("port unavailable: {addr}: {source}")]
    PortUnavailable {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding failed for a reason other than the port being taken.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bind host could not be resolved.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured bind host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bind host resolved to no usable address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured bind host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// The bound socket could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The connector's async runtime could not be built.
    #[error("failed to build connector runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The connector thread could not be spawned.
    #[error("failed to spawn connector thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("connector server failed: {source}")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The connector thread panicked.
    #[error("connector thread panicked")]
    ThreadPanic,
}

impl ConnectorError {
    /// Classifies a bind failure, separating unavailable ports from other
    /// socket errors.
    pub(crate) fn from_bind(addr: SocketAddr, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::PermissionDenied => Self::PortUnavailable { addr, source },
            _ => Self::Bind { addr, source },
        }
    }
}

impl From<TlsError> for ConnectorError {
    fn from(source: TlsError) -> Self {
        Self::Configuration { source }
    }
}
