//! Error types for lifecycle sequences.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::resource::ResourceError;
use crate::connector::{ConnectorError, TlsError};
use crate::deploy::{DeploymentError, DescriptorError};
use crate::realm::RealmError;

/// Invalid or unreadable configuration material. Never retried
/// automatically.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Defaults(#[from] DescriptorError),
}

/// Failure of a start sequence.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("configuration error: {source}")]
    Configuration {
        #[source]
        source: ConfigurationError,
    },
    /// A connector port could not be bound.
    #[error("port unavailable: {addr}: {source}")]
    PortUnavailable {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to provision connector: {source}")]
    Bind {
        #[source]
        source: ConnectorError,
    },
    #[error("deployment failed: {source}")]
    Deployment {
        #[source]
        source: DeploymentError,
    },
    #[error("failed to load security realm: {source}")]
    Realm {
        #[source]
        source: RealmError,
    },
    #[error("exclusive resource unavailable: {source}")]
    Resource {
        #[source]
        source: ResourceError,
    },
    #[error("failed to start accepting connections: {source}")]
    Accept {
        #[source]
        source: ConnectorError,
    },
    #[error("failed to spawn start sequence: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
}

impl From<ConnectorError> for StartError {
    fn from(error: ConnectorError) -> Self {
        match error {
            ConnectorError::Configuration { source } => Self::Configuration {
                source: ConfigurationError::Tls(source),
            },
            ConnectorError::PortUnavailable { addr, source } => {
                Self::PortUnavailable { addr, source }
            }
            other => Self::Bind { source: other },
        }
    }
}

impl From<DeploymentError> for StartError {
    fn from(source: DeploymentError) -> Self {
        Self::Deployment { source }
    }
}

impl From<DescriptorError> for StartError {
    fn from(source: DescriptorError) -> Self {
        Self::Configuration {
            source: ConfigurationError::Defaults(source),
        }
    }
}

impl From<RealmError> for StartError {
    fn from(source: RealmError) -> Self {
        Self::Realm { source }
    }
}

/// Failure of a stop sequence. The server handle is retained so stop can be
/// retried.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("connector {connector} did not shut down cleanly: {source}")]
    Connector {
        connector: String,
        #[source]
        source: ConnectorError,
    },
    #[error("hot-scan deployer did not shut down cleanly: {source}")]
    HotScan {
        #[source]
        source: DeploymentError,
    },
    /// Failure reported by a server runtime other than the embedded one.
    #[error("server failed to stop: {message}")]
    Server { message: String },
    #[error("failed to spawn stop sequence: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
}
