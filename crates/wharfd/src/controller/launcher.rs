//! Seams between the controller and the server runtime it supervises.

use std::sync::Arc;

use wharf_config::ServerConfig;
use wharf_types::ConnectorInfo;

use super::errors::{StartError, StopError};
use crate::handler::ContextRegistry;

/// Runs the start sequence for one cycle.
///
/// Implementations either return a server that is accepting connections or
/// an error after discarding everything they built.
pub trait ServerLauncher: Send + Sync {
    /// Builds and starts a server for `config`.
    fn launch(&self, config: &ServerConfig) -> Result<Box<dyn RunningServer>, StartError>;
}

/// A server instance owned by the controller between a successful start and
/// a completed stop.
pub trait RunningServer: Send {
    /// Listeners attached to the server.
    fn connectors(&self) -> Vec<ConnectorInfo>;

    /// Registry backing the handler chain; shared so status snapshots can
    /// read it while the server is owned by a background sequence.
    fn registry(&self) -> Arc<ContextRegistry>;

    /// Stops the hot-scan deployer, then the connectors, then the contexts.
    ///
    /// Must be safe to call again after a failure; steps that already
    /// completed are skipped.
    fn stop(&mut self) -> Result<(), StopError>;
}
