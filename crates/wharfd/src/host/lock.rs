//! Lock-file backed exclusive resource.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use super::HOST_TARGET;
use crate::controller::{ExclusiveResource, ResourceError};

/// Holds a lock file containing the owning process id while a lifecycle
/// cycle is active.
#[derive(Debug)]
pub struct LockFileResource {
    path: PathBuf,
    lock: Mutex<Option<File>>,
}

impl LockFileResource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(&self) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(file)
    }

    fn io_error(&self, source: io::Error) -> ResourceError {
        ResourceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ExclusiveResource for LockFileResource {
    fn acquire(&self) -> Result<(), ResourceError> {
        let mut lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if lock.is_some() {
            return Err(ResourceError::Held {
                holder: format!("this process ({})", std::process::id()),
            });
        }
        let file = match self.create() {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                match read_pid(&self.path) {
                    Some(pid) if process_alive(pid) && pid != std::process::id() => {
                        return Err(ResourceError::Held {
                            holder: format!("process {pid}"),
                        });
                    }
                    _ => {
                        warn!(
                            target: HOST_TARGET,
                            file = %self.path.display(),
                            "removing stale lock file"
                        );
                        fs::remove_file(&self.path).map_err(|source| self.io_error(source))?;
                        self.create().map_err(|source| self.io_error(source))?
                    }
                }
            }
            Err(source) => return Err(self.io_error(source)),
        };
        info!(
            target: HOST_TARGET,
            file = %self.path.display(),
            "acquired host lock"
        );
        *lock = Some(file);
        Ok(())
    }

    fn release(&self) {
        let mut lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if lock.take().is_none() {
            return;
        }
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: HOST_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to remove lock file"
                );
            }
            _ => info!(
                target: HOST_TARGET,
                file = %self.path.display(),
                "released host lock"
            ),
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
