use std::io;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;
use wharf_config::LayoutError;

use super::shutdown::ShutdownError;
use crate::telemetry::TelemetryError;

/// Errors surfaced by the host binary.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to load configuration: {source}")]
    Configuration {
        #[source]
        source: Arc<OrthoError>,
    },
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[from]
        source: TelemetryError,
    },
    #[error("failed to prepare host layout: {source}")]
    Layout {
        #[from]
        source: LayoutError,
    },
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    #[error("failed to spawn health writer: {source}")]
    HealthWriter {
        #[source]
        source: io::Error,
    },
    #[error("server failed to start: {reason}")]
    StartFailed { reason: String },
    #[error("server failed to stop: {reason}")]
    StopFailed { reason: String },
}
