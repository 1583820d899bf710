//! Error types for deployers and descriptors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or validating a deployment descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("descriptor {path} declares invalid context path {context_path:?}")]
    InvalidContextPath { path: PathBuf, context_path: String },
}

/// Failures of a single deployment, or of a deployer as a whole.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The applications directory could not be listed.
    #[error("failed to read applications directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// Another context already occupies the requested path.
    #[error("context path {context_path} requested by {name} is already deployed")]
    Collision { name: String, context_path: String },
    #[error("failed to spawn hot-scan thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("hot-scan thread panicked")]
    ScanThreadPanicked,
}
