use std::fmt;

use serde::{Deserialize, Serialize};

use crate::LifecycleState;

/// URL scheme served by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Plain-text HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
        })
    }
}

/// How a connector schedules the connections it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorMode {
    /// Connections share a fixed pool of worker threads.
    Pooled,
    /// All connections are multiplexed on the connector's own thread.
    SingleThreaded,
}

/// Description of a bound network listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    /// Scheme served by the listener.
    pub scheme: Scheme,
    /// Host the listener bound to.
    pub host: String,
    /// Port the listener bound to; reflects the OS-assigned port when `0` was
    /// requested.
    pub port: u16,
    /// Connection dispatch strategy.
    pub mode: ConnectorMode,
}

impl fmt::Display for ConnectorInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Runtime state of a deployed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// The context serves requests.
    Running,
    /// The context was undeployed or is shutting down.
    Stopped,
    /// The context could not be started.
    Failed,
}

/// Description of a context attached to the handler chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Path prefix the context is bound to.
    pub context_path: String,
    /// Deployer key that produced the context (directory or descriptor name).
    pub origin: String,
    /// Directory the context serves from.
    pub resource_base: String,
    /// Current runtime state.
    pub state: ContextState,
    /// Optional virtual host restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_host: Option<String>,
}

/// Read-only view of the host for observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// Reason attached to the most recent transition, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Listeners attached to the running server.
    pub connectors: Vec<ConnectorInfo>,
    /// Contexts attached to the running server, ordered by context path.
    pub contexts: Vec<ContextInfo>,
}

impl StatusSnapshot {
    /// Snapshot of a host without a server instance.
    #[must_use]
    pub const fn idle(state: LifecycleState, reason: Option<String>) -> Self {
        Self {
            state,
            reason,
            connectors: Vec::new(),
            contexts: Vec::new(),
        }
    }

    /// Looks up a context by its path.
    #[must_use]
    pub fn context(&self, context_path: &str) -> Option<&ContextInfo> {
        self.contexts
            .iter()
            .find(|context| context.context_path == context_path)
    }
}
