//! Controller phases and the data each one owns.

use std::sync::Arc;

use wharf_types::{ConnectorInfo, LifecycleState};

use super::launcher::RunningServer;
use super::resource::ResourceLease;
use crate::handler::ContextRegistry;

/// The server together with the lease acquired for its cycle.
pub(super) struct Running {
    pub(super) server: Box<dyn RunningServer>,
    pub(super) lease: ResourceLease,
}

/// Lifecycle state plus owned resources.
///
/// The server handle lives in `Started` and `StopFailed`; during `Starting`
/// and `Stopping` it belongs to the background sequence.
pub(super) enum Phase {
    NotStarted,
    Starting,
    Started(Running),
    StartFailed,
    Stopping,
    Stopped,
    /// The lease has been released; only the server remains.
    StopFailed(Box<dyn RunningServer>),
}

impl Phase {
    pub(super) const fn state(&self) -> LifecycleState {
        match self {
            Self::NotStarted => LifecycleState::NotStarted,
            Self::Starting => LifecycleState::Starting,
            Self::Started(_) => LifecycleState::Started,
            Self::StartFailed => LifecycleState::StartFailed,
            Self::Stopping => LifecycleState::Stopping,
            Self::Stopped => LifecycleState::Stopped,
            Self::StopFailed(_) => LifecycleState::StopFailed,
        }
    }
}

/// What status snapshots read while a server exists.
#[derive(Clone)]
pub(super) struct StatusView {
    pub(super) connectors: Vec<ConnectorInfo>,
    pub(super) registry: Arc<ContextRegistry>,
}

impl StatusView {
    pub(super) fn of(server: &dyn RunningServer) -> Self {
        Self {
            connectors: server.connectors(),
            registry: server.registry(),
        }
    }
}
