//! Status snapshots handed to observers.

use wharf_types::{ConnectorInfo, LifecycleState, StatusSnapshot};

use crate::handler::ContextRegistry;

/// Builds a snapshot of a host that owns a server.
///
/// Contexts are read under the registry's read lock, so a snapshot never
/// shows a context half way through a replacement.
pub(crate) fn snapshot(
    state: LifecycleState,
    reason: Option<String>,
    connectors: Vec<ConnectorInfo>,
    registry: &ContextRegistry,
) -> StatusSnapshot {
    StatusSnapshot {
        state,
        reason,
        connectors,
        contexts: registry.infos(),
    }
}
