//! Embedded HTTP server host.
//!
//! `wharfd` supervises one embedded web server through repeated start and
//! stop cycles. The [`Controller`] owns the lifecycle state machine and the
//! exclusive resource guarding each cycle. A start cycle provisions plain and
//! encrypted connectors, builds the handler chain, deploys the applications
//! found under the host's `webapps/` directory, and keeps `contexts/` in sync
//! through a background hot-scan deployer. An optional security realm guards
//! contexts that require a role.
//!
//! Lifecycle transitions are delivered to a [`LifecycleObserver`]; the host
//! binary combines structured logging with a health file mirroring the latest
//! [`wharf_types::StatusSnapshot`].

mod connector;
mod controller;
mod deploy;
mod handler;
mod health;
mod host;
mod realm;
mod server;
mod status;
mod telemetry;

pub use connector::{ConnectorError, TlsError};
pub use controller::{
    ConfigurationError, Controller, CountingResource, ExclusiveResource, ResourceError,
    RunningServer, ServerLauncher, StartError, StopError,
};
pub use deploy::{
    ActionOutcome, ContextDescriptor, DeploymentError, DeploymentRecord, DescriptorError,
    Fingerprint, HotScanDeployer, HotScanHandle, ScanAction, ScanActionKind, ScanObserver,
    ScanReport, StaticDeployReport, StaticDeployer, WebDefaults,
};
pub use handler::{ContextRegistry, ContextSettings, WebContext};
pub use health::{ChannelObserver, LifecycleObserver, ObserverSet, StructuredHealthReporter};
pub use host::{
    ConfigLoader, HealthFileTask, HealthFileWriter, HostError, LockFileResource, ShutdownError,
    ShutdownSignal, SystemConfigLoader, SystemShutdownSignal, run_host, run_host_with,
};
pub use realm::{AuthOutcome, Credential, LoginService, Principal, RealmError, load_realm};
pub use server::EmbeddedLauncher;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
