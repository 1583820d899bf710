//! Builds the connector set for a server instance.

use tracing::info;
use wharf_config::ServerConfig;
use wharf_types::ConnectorMode;

use super::tls::load_server_config;
use super::{CONNECTOR_TARGET, Connector, ConnectorError};

/// Binds one plain connector on `port` and, when requested, an encrypted one
/// on `secure_port`.
///
/// TLS material is validated before any port is bound, so a configuration
/// error never leaves a socket open. Connectors bound before a later failure
/// are dropped (and their sockets closed) when the error propagates.
pub(crate) fn provision_connectors(config: &ServerConfig) -> Result<Vec<Connector>, ConnectorError> {
    let mode = if config.use_async_io {
        ConnectorMode::Pooled
    } else {
        ConnectorMode::SingleThreaded
    };

    let tls = if config.use_encrypted_connector {
        Some(load_server_config(
            config.keystore_path.as_deref(),
            config.truststore_path.as_deref(),
        )?)
    } else {
        None
    };

    let mut connectors = Vec::with_capacity(2);
    let plain = Connector::bind(&config.bind_host, config.port, mode, None)?;
    info!(
        target: CONNECTOR_TARGET,
        connector = %plain.info(),
        "configured connector"
    );
    connectors.push(plain);

    if let Some(tls) = tls {
        let secure = Connector::bind(&config.bind_host, config.secure_port, mode, Some(tls))?;
        info!(
            target: CONNECTOR_TARGET,
            connector = %secure.info(),
            "configured connector"
        );
        connectors.push(secure);
    }

    Ok(connectors)
}
