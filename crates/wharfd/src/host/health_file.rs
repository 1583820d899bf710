//! Persists the latest status snapshot for external supervisors.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use wharf_types::{LifecycleEvent, StatusSnapshot};

use super::HOST_TARGET;
use crate::controller::Controller;

const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Writes the controller's status as JSON whenever it changes.
#[derive(Debug, Clone)]
pub struct HealthFileWriter {
    path: PathBuf,
}

impl HealthFileWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, snapshot: &StatusSnapshot) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        serde_json::to_writer(&mut file, snapshot)?;
        file.write_all(b"\n")?;
        file.sync_all()
    }

    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: HOST_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to remove health file"
                );
            }
            _ => {}
        }
    }

    /// Rewrites the file on every lifecycle event and whenever a periodic
    /// refresh observes a different snapshot.
    pub fn spawn(
        self,
        controller: Controller,
        events: Receiver<LifecycleEvent>,
    ) -> io::Result<HealthFileTask> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("wharfd-health".to_owned())
            .spawn(move || self.run(&controller, &events, &stop_flag))?;
        Ok(HealthFileTask { stop, thread })
    }

    fn run(&self, controller: &Controller, events: &Receiver<LifecycleEvent>, stop: &AtomicBool) {
        let mut last = None::<StatusSnapshot>;
        while !stop.load(Ordering::SeqCst) {
            match events.recv_timeout(REFRESH_INTERVAL) {
                Ok(event) => debug!(
                    target: HOST_TARGET,
                    state = %event.state,
                    "refreshing health file"
                ),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            let snapshot = controller.status();
            if last.as_ref() == Some(&snapshot) {
                continue;
            }
            if let Err(error) = self.write(&snapshot) {
                warn!(
                    target: HOST_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to write health file"
                );
            }
            last = Some(snapshot);
        }
        self.remove();
    }
}

/// Handle to the background health writer.
#[derive(Debug)]
pub struct HealthFileTask {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl HealthFileTask {
    /// Stops the writer and removes the health file.
    pub fn finish(self) {
        self.stop.store(true, Ordering::SeqCst);
        if self.thread.join().is_err() {
            warn!(target: HOST_TARGET, "health writer panicked");
        }
    }
}
