//! Shared configuration for the wharf host.
//!
//! Configuration is layered through `ortho_config`: built-in defaults, an
//! optional TOML file (`--config-path` or `WHARF_CONFIG_PATH`), `WHARF_*`
//! environment variables, and finally command-line flags. The loaded
//! [`Config`] projects an immutable [`ServerConfig`] for each start cycle and
//! a [`HostLayout`] describing the directories the deployers consume.

mod defaults;
mod layout;
mod logging;
mod server;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BIND_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_SCAN_INTERVAL_SECS,
    DEFAULT_SECURE_PORT, default_home_dir, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use layout::{HostLayout, LayoutError};
pub use logging::{LogFormat, LogFormatParseError};
pub use server::ServerConfig;

/// Resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WHARF")]
pub struct Config {
    /// Root directory holding `webapps/`, `contexts/`, and `etc/`.
    #[serde(default = "defaults::default_home_dir")]
    pub home_dir: Utf8PathBuf,
    /// Address the connectors bind to.
    #[serde(default = "defaults::default_bind_host")]
    pub bind_host: String,
    /// Port of the plain connector.
    #[serde(default = "defaults::default_port")]
    pub port: u16,
    /// Port of the encrypted connector.
    #[serde(default = "defaults::default_secure_port")]
    pub secure_port: u16,
    /// Provision an encrypted connector in addition to the plain one.
    #[serde(default)]
    pub use_encrypted_connector: bool,
    /// Dispatch connections to a worker pool rather than a thread each.
    #[serde(default = "defaults::default_use_async_io")]
    pub use_async_io: bool,
    /// PEM file holding the certificate chain and private key.
    #[serde(default)]
    pub keystore_path: Option<Utf8PathBuf>,
    /// PEM file holding trusted client roots.
    #[serde(default)]
    pub truststore_path: Option<Utf8PathBuf>,
    /// Password registered for the console `admin` principal.
    #[serde(default)]
    pub console_password: Option<String>,
    /// Seconds between hot-scan passes.
    #[serde(default = "defaults::default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Permit static deployments that derive the same context path.
    #[serde(default)]
    pub allow_duplicates: bool,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Logging output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            bind_host: defaults::default_bind_host(),
            port: DEFAULT_PORT,
            secure_port: DEFAULT_SECURE_PORT,
            use_encrypted_connector: false,
            use_async_io: true,
            keystore_path: None,
            truststore_path: None,
            console_password: None,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            allow_duplicates: false,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Logging output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Filesystem layout rooted at the configured home directory.
    #[must_use]
    pub fn layout(&self) -> HostLayout {
        HostLayout::new(self.home_dir.as_std_path())
    }

    /// Interval between hot-scan passes, clamped to at least one second.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    /// Projects the immutable per-cycle server configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let layout = self.layout();
        ServerConfig {
            bind_host: self.bind_host.clone(),
            port: self.port,
            secure_port: self.secure_port,
            use_encrypted_connector: self.use_encrypted_connector,
            use_async_io: self.use_async_io,
            keystore_path: self
                .keystore_path
                .as_ref()
                .map(|path| path.as_std_path().to_path_buf()),
            truststore_path: self
                .truststore_path
                .as_ref()
                .map(|path| path.as_std_path().to_path_buf()),
            credentials_path: Some(layout.realm_path()),
            console_password: self.console_password.clone(),
            scan_interval: self.scan_interval(),
            allow_duplicates: self.allow_duplicates,
            layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_carries_connector_settings() {
        let config = Config {
            home_dir: Utf8PathBuf::from("/srv/wharf"),
            port: 9090,
            use_encrypted_connector: true,
            keystore_path: Some(Utf8PathBuf::from("/srv/wharf/etc/keystore.pem")),
            console_password: Some("secret".to_owned()),
            ..Config::default()
        };

        let server = config.server_config();
        assert_eq!(server.port, 9090);
        assert!(server.use_encrypted_connector);
        assert_eq!(
            server.keystore_path.as_deref(),
            Some(std::path::Path::new("/srv/wharf/etc/keystore.pem"))
        );
        assert_eq!(
            server.credentials_path.as_deref(),
            Some(std::path::Path::new("/srv/wharf/etc/realm.properties"))
        );
        assert_eq!(server.console_password.as_deref(), Some("secret"));
    }

    #[test]
    fn scan_interval_never_drops_below_one_second() {
        let config = Config {
            scan_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.scan_interval(), Duration::from_secs(1));
    }
}
