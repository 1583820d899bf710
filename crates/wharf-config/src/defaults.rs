use camino::Utf8PathBuf;
use std::env;

use crate::logging::LogFormat;

/// Default plain HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default TLS port.
pub const DEFAULT_SECURE_PORT: u16 = 8443;

/// Default address the connectors bind to.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default hot-scan interval in seconds; kept coarse to stay cheap on idle
/// hosts.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_owned()
}

pub(crate) const fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) const fn default_secure_port() -> u16 {
    DEFAULT_SECURE_PORT
}

pub(crate) const fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

pub(crate) const fn default_use_async_io() -> bool {
    true
}

/// Computes the default home directory holding applications and
/// configuration.
///
/// Prefers the platform data directory and falls back to the temporary
/// directory when none is available.
pub fn default_home_dir() -> Utf8PathBuf {
    let base = dirs::data_local_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.join("wharf")
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
