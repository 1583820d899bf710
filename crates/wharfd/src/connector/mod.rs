//! Network listeners for the embedded server.
//!
//! The connector module binds the plain and encrypted listeners described by
//! a [`wharf_config::ServerConfig`]. Sockets are bound up front with the
//! standard library so an occupied port fails the start sequence before any
//! request is served; once the server is ready, each bound socket is handed to
//! an `axum_server` instance running on the connector's own tokio runtime.

mod errors;
mod listener;
#[cfg(test)]
mod listener_tests;
mod provision;
mod tls;

pub use self::errors::ConnectorError;
pub(crate) use self::listener::{Connector, ConnectorHandle};
pub(crate) use self::provision::provision_connectors;
pub use self::tls::TlsError;

const CONNECTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connector");
