//! Deployers reconciling the context registry with the filesystem.
//!
//! The [`StaticDeployer`] scans the applications directory once while the
//! server starts. The [`HotScanDeployer`] keeps the configuration directory in
//! sync for as long as the server runs.

mod descriptor;
mod errors;
mod hot_scan;
mod static_deployer;

pub use self::descriptor::{ContextDescriptor, WebDefaults};
pub use self::errors::{DeploymentError, DescriptorError};
pub use self::hot_scan::{
    ActionOutcome, DeploymentRecord, Fingerprint, HotScanDeployer, HotScanHandle, ScanAction,
    ScanActionKind, ScanObserver, ScanReport,
};
pub use self::static_deployer::{StaticDeployReport, StaticDeployer};

const DEPLOY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::deploy");
