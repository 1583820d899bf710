//! Filesystem layout of a host home directory.
//!
//! The home directory mirrors the classic servlet container layout: a
//! `webapps/` directory of exploded applications deployed once at startup, a
//! `contexts/` directory of descriptors rescanned while the server runs, and
//! an `etc/` directory holding the credentials file and the default
//! descriptor. Runtime artefacts (lock file, health snapshot) live under
//! `run/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const WEBAPPS_DIR: &str = "webapps";
const CONTEXTS_DIR: &str = "contexts";
const ETC_DIR: &str = "etc";
const RUNTIME_DIR: &str = "run";
const REALM_FILE: &str = "realm.properties";
const DEFAULT_DESCRIPTOR_FILE: &str = "webdefault.json";

/// Canonical paths below the host home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    home: PathBuf,
}

impl HostLayout {
    /// Builds the layout rooted at `home`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Root of the layout.
    #[must_use]
    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    /// Directory scanned once at startup for exploded applications.
    #[must_use]
    pub fn webapps_dir(&self) -> PathBuf {
        self.home.join(WEBAPPS_DIR)
    }

    /// Directory rescanned for deployment descriptors.
    #[must_use]
    pub fn contexts_dir(&self) -> PathBuf {
        self.home.join(CONTEXTS_DIR)
    }

    /// Directory holding static configuration files.
    #[must_use]
    pub fn etc_dir(&self) -> PathBuf {
        self.home.join(ETC_DIR)
    }

    /// Location of the optional credentials file.
    #[must_use]
    pub fn realm_path(&self) -> PathBuf {
        self.etc_dir().join(REALM_FILE)
    }

    /// Location of the optional default deployment descriptor.
    #[must_use]
    pub fn default_descriptor_path(&self) -> PathBuf {
        self.etc_dir().join(DEFAULT_DESCRIPTOR_FILE)
    }

    /// Directory holding the lock file and health snapshot.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.home.join(RUNTIME_DIR)
    }

    /// Path to the lock file guarding the exclusive resource.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.runtime_dir().join("wharfd.lock")
    }

    /// Path to the persisted status snapshot.
    #[must_use]
    pub fn health_path(&self) -> PathBuf {
        self.runtime_dir().join("wharfd.health")
    }

    /// Creates the runtime directory.
    pub fn prepare_runtime_dir(&self) -> Result<PathBuf, LayoutError> {
        let dir = self.runtime_dir();
        fs::create_dir_all(&dir).map_err(|source| LayoutError::RuntimeDirectory {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

/// Errors raised while preparing the host layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_hang_off_home() {
        let layout = HostLayout::new("/srv/wharf");
        assert_eq!(layout.webapps_dir(), PathBuf::from("/srv/wharf/webapps"));
        assert_eq!(layout.contexts_dir(), PathBuf::from("/srv/wharf/contexts"));
        assert_eq!(
            layout.realm_path(),
            PathBuf::from("/srv/wharf/etc/realm.properties")
        );
        assert_eq!(
            layout.default_descriptor_path(),
            PathBuf::from("/srv/wharf/etc/webdefault.json")
        );
        assert_eq!(
            layout.lock_path(),
            PathBuf::from("/srv/wharf/run/wharfd.lock")
        );
    }

    #[test]
    fn runtime_dir_is_created_on_demand() {
        let temp = tempfile::tempdir().expect("temp dir");
        let layout = HostLayout::new(temp.path());
        let dir = layout.prepare_runtime_dir().expect("prepare runtime dir");
        assert!(dir.is_dir());
    }
}
