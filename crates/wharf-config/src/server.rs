use std::path::PathBuf;
use std::time::Duration;

use crate::layout::HostLayout;

/// Immutable configuration captured at the beginning of a start cycle.
///
/// The controller clones this value when `start` is accepted; changes made to
/// the owning [`crate::Config`] afterwards never leak into an in-flight cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the connectors bind to.
    pub bind_host: String,
    /// Port of the plain connector.
    pub port: u16,
    /// Port of the encrypted connector.
    pub secure_port: u16,
    /// Whether to provision the encrypted connector.
    pub use_encrypted_connector: bool,
    /// Whether connectors dispatch to a worker pool instead of a thread per
    /// connection.
    pub use_async_io: bool,
    /// PEM file holding the certificate chain and private key.
    pub keystore_path: Option<PathBuf>,
    /// PEM file holding trusted client roots.
    pub truststore_path: Option<PathBuf>,
    /// Credentials file loaded into the security realm when present.
    pub credentials_path: Option<PathBuf>,
    /// Password registered for the `admin` principal.
    pub console_password: Option<String>,
    /// Filesystem layout of the host.
    pub layout: HostLayout,
    /// Delay between hot-scan passes.
    pub scan_interval: Duration,
    /// Whether the static deployer may deploy two applications with the same
    /// derived context path.
    pub allow_duplicates: bool,
}

impl ServerConfig {
    /// Builds a plain-HTTP configuration rooted at `home` with built-in
    /// defaults for everything else.
    #[must_use]
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let layout = HostLayout::new(home);
        Self {
            bind_host: crate::defaults::DEFAULT_BIND_HOST.to_owned(),
            port: crate::defaults::DEFAULT_PORT,
            secure_port: crate::defaults::DEFAULT_SECURE_PORT,
            use_encrypted_connector: false,
            use_async_io: true,
            keystore_path: None,
            truststore_path: None,
            credentials_path: Some(layout.realm_path()),
            console_password: None,
            layout,
            scan_interval: Duration::from_secs(crate::defaults::DEFAULT_SCAN_INTERVAL_SECS),
            allow_duplicates: false,
        }
    }
}
