//! Foreground host process.
//!
//! The host loads configuration, initialises telemetry, and supervises a
//! single [`Controller`] until a termination signal arrives. The exclusive
//! resource is a lock file in the runtime directory, and the latest status
//! snapshot is mirrored into a health file beside it.

mod errors;
mod health_file;
mod lock;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use tracing::{info, warn};
use wharf_config::Config;
use wharf_types::LifecycleState;

pub use self::errors::HostError;
pub use self::health_file::{HealthFileTask, HealthFileWriter};
pub use self::lock::LockFileResource;
pub use self::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::controller::Controller;
use crate::health::{ChannelObserver, ObserverSet, StructuredHealthReporter};
use crate::telemetry;

pub(crate) const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

const START_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Runs the host with the production collaborators.
pub fn run_host() -> Result<(), HostError> {
    run_host_with(&SystemConfigLoader, &SystemShutdownSignal)
}

/// Runs the host with injected collaborators.
pub fn run_host_with(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), HostError> {
    let config = loader
        .load()
        .map_err(|source| HostError::Configuration { source })?;
    telemetry::initialise(&config)?;
    let layout = config.layout();
    layout.prepare_runtime_dir()?;

    let (channel, events) = ChannelObserver::new();
    let observer = ObserverSet::new()
        .with(Arc::new(StructuredHealthReporter::new()))
        .with(Arc::new(channel));
    let controller = Controller::embedded(
        Arc::new(LockFileResource::new(layout.lock_path())),
        Arc::new(observer),
    );
    let health = HealthFileWriter::new(layout.health_path())
        .spawn(controller.clone(), events)
        .map_err(|source| HostError::HealthWriter { source })?;

    let result = supervise(&controller, &config, shutdown);
    health.finish();
    result
}

fn supervise(
    controller: &Controller,
    config: &Config,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), HostError> {
    controller.start(config.server_config());
    let state = controller.wait_until_settled(START_TIMEOUT);
    if state != LifecycleState::Started {
        let reason = controller
            .status()
            .reason
            .unwrap_or_else(|| format!("start did not complete (state {state})"));
        return Err(HostError::StartFailed { reason });
    }
    let status = controller.status();
    for connector in &status.connectors {
        info!(target: HOST_TARGET, connector = %connector, "listening");
    }

    shutdown.wait()?;

    controller.stop();
    match controller.wait_until_settled(STOP_TIMEOUT) {
        LifecycleState::Stopped => {
            info!(target: HOST_TARGET, "shutdown sequence completed");
            Ok(())
        }
        LifecycleState::StopFailed => {
            let reason = controller.status().reason.unwrap_or_default();
            warn!(
                target: HOST_TARGET,
                reason = %reason,
                "stop failed; forcing teardown"
            );
            controller.force_teardown();
            Err(HostError::StopFailed { reason })
        }
        state => Err(HostError::StopFailed {
            reason: format!("stop did not complete (state {state})"),
        }),
    }
}
