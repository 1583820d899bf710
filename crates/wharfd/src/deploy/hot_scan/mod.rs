//! Periodic reconciliation of the configuration directory.
//!
//! Each pass lists the `*.json` descriptors in the configuration directory,
//! fingerprints them by content, diffs the listing against the previous pass,
//! and applies removals, then changes, then additions. Every action is
//! isolated: a failure is logged and recorded in the [`ScanReport`] without
//! aborting the rest of the pass.
//!
//! Passes run on a dedicated thread that only reads its command channel
//! between passes, so shutting the deployer down always lets the current pass
//! finish first.

mod diff;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

pub use self::diff::{ActionOutcome, Fingerprint, ScanAction, ScanActionKind, ScanReport};
use self::diff::plan;
use super::DEPLOY_TARGET;
use super::descriptor::{ContextDescriptor, WebDefaults};
use super::errors::DeploymentError;
use crate::handler::{ContextRegistry, WebContext};

const DESCRIPTOR_EXTENSION: &str = "json";

/// A descriptor whose context is attached to the registry.
#[derive(Debug, Clone)]
pub struct DeploymentRecord {
    pub name: String,
    pub source_path: PathBuf,
    pub content_hash: Fingerprint,
    pub modified: Option<SystemTime>,
    pub context_path: String,
    pub context: Arc<WebContext>,
}

#[derive(Debug)]
enum Tracked {
    Deployed(DeploymentRecord),
    /// Rejected descriptor, retried only once its content changes.
    Rejected(Fingerprint),
}

impl Tracked {
    const fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Deployed(record) => record.content_hash,
            Self::Rejected(fingerprint) => *fingerprint,
        }
    }
}

#[derive(Debug)]
struct DescriptorFile {
    path: PathBuf,
    fingerprint: Fingerprint,
    modified: Option<SystemTime>,
    /// `None` when the file could not be read this pass.
    contents: Option<Vec<u8>>,
}

/// Notified at the end of every background pass, on the deployer thread.
///
/// The pass is not over until the observer returns, so a shutdown requested
/// meanwhile waits for it.
pub trait ScanObserver: Send + Sync {
    fn pass_finished(&self, report: &ScanReport);
}

/// Reconciles descriptors in a directory against a context registry.
pub struct HotScanDeployer {
    contexts_dir: PathBuf,
    home: PathBuf,
    defaults: WebDefaults,
    registry: Arc<ContextRegistry>,
    interval: Duration,
    tracked: BTreeMap<String, Tracked>,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl fmt::Debug for HotScanDeployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotScanDeployer")
            .field("contexts_dir", &self.contexts_dir)
            .field("interval", &self.interval)
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl HotScanDeployer {
    #[must_use]
    pub fn new(
        contexts_dir: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        defaults: WebDefaults,
        registry: Arc<ContextRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            contexts_dir: contexts_dir.into(),
            home: home.into(),
            defaults,
            registry,
            interval,
            tracked: BTreeMap::new(),
            observer: None,
        }
    }

    /// Reports every background pass to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Records for the descriptors currently deployed, ordered by name.
    #[must_use]
    pub fn records(&self) -> Vec<&DeploymentRecord> {
        self.tracked
            .values()
            .filter_map(|tracked| match tracked {
                Tracked::Deployed(record) => Some(record),
                Tracked::Rejected(_) => None,
            })
            .collect()
    }

    /// Runs one reconciliation pass.
    pub fn scan(&mut self) -> ScanReport {
        let Some(mut current) = self.list_descriptors() else {
            return ScanReport::default();
        };
        let previous = self
            .tracked
            .iter()
            .map(|(name, tracked)| (name.clone(), tracked.fingerprint()))
            .collect();
        let listing = current
            .iter()
            .map(|(name, file)| (name.clone(), file.fingerprint))
            .collect();

        let mut report = ScanReport::default();
        for action in plan(&previous, &listing) {
            let result = match action.kind {
                ScanActionKind::Remove => {
                    self.apply_remove(&action.name);
                    Ok(())
                }
                ScanActionKind::Change => match current.remove(&action.name) {
                    Some(file) => self.apply_change(&action.name, file),
                    None => Ok(()),
                },
                ScanActionKind::Add => match current.remove(&action.name) {
                    Some(file) => self.apply_add(&action.name, file),
                    None => Ok(()),
                },
            };
            let outcome = match result {
                Ok(()) => ActionOutcome::Applied,
                Err(error) => {
                    warn!(
                        target: DEPLOY_TARGET,
                        descriptor = %action.name,
                        action = %action.kind,
                        error = %error,
                        "hot deployment action failed"
                    );
                    ActionOutcome::Failed(error.to_string())
                }
            };
            report.actions.push(ScanAction {
                kind: action.kind,
                name: action.name,
                outcome,
            });
        }
        if !report.is_empty() {
            info!(
                target: DEPLOY_TARGET,
                actions = report.actions.len(),
                failures = report.failures().len(),
                "reconciliation pass applied changes"
            );
        }
        report
    }

    /// Detaches every context this deployer attached.
    pub fn undeploy_all(&mut self) -> usize {
        let names = self.tracked.keys().cloned().collect::<Vec<_>>();
        let mut undeployed = 0;
        for name in names {
            if self.undeploy(&name) {
                undeployed += 1;
            }
        }
        undeployed
    }

    /// Runs an initial pass, then continues on a background thread.
    pub fn start(mut self) -> Result<HotScanHandle, DeploymentError> {
        let initial = self.scan();
        let (commands, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("wharfd-hot-scan".to_owned())
            .spawn(move || run_loop(self, &receiver))
            .map_err(|source| DeploymentError::Spawn { source })?;
        Ok(HotScanHandle {
            commands,
            thread: Some(thread),
            initial,
        })
    }

    fn list_descriptors(&self) -> Option<BTreeMap<String, DescriptorFile>> {
        let entries = match fs::read_dir(&self.contexts_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Some(BTreeMap::new());
            }
            Err(error) => {
                warn!(
                    target: DEPLOY_TARGET,
                    directory = %self.contexts_dir.display(),
                    error = %error,
                    "failed to list configuration directory; skipping pass"
                );
                return None;
            }
        };

        let mut listing = BTreeMap::new();
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let Some(name) = descriptor_name(&path) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok();
            match fs::read(&path) {
                Ok(contents) => {
                    listing.insert(name, DescriptorFile {
                        fingerprint: Fingerprint::of(&contents),
                        path,
                        modified,
                        contents: Some(contents),
                    });
                }
                Err(error) => {
                    warn!(
                        target: DEPLOY_TARGET,
                        descriptor = %path.display(),
                        error = %error,
                        "failed to read descriptor; keeping previous state"
                    );
                    if let Some(tracked) = self.tracked.get(&name) {
                        listing.insert(name, DescriptorFile {
                            fingerprint: tracked.fingerprint(),
                            path,
                            modified,
                            contents: None,
                        });
                    }
                }
            }
        }
        Some(listing)
    }

    fn apply_remove(&mut self, name: &str) {
        self.undeploy(name);
    }

    fn apply_change(&mut self, name: &str, file: DescriptorFile) -> Result<(), DeploymentError> {
        let Some(Tracked::Deployed(record)) = self.tracked.remove(name) else {
            return self.apply_add(name, file);
        };
        let fingerprint = file.fingerprint;
        let context = match self.build_context(name, &file) {
            Ok(context) => context,
            Err(error) => {
                self.detach(&record);
                self.tracked
                    .insert(name.to_owned(), Tracked::Rejected(fingerprint));
                return Err(error);
            }
        };
        match self.registry.replace(&record.context_path, Arc::clone(&context)) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    previous.stop();
                }
                debug!(
                    target: DEPLOY_TARGET,
                    descriptor = %name,
                    context = %context.context_path(),
                    "redeployed changed descriptor"
                );
                self.tracked
                    .insert(name.to_owned(), Tracked::Deployed(record_for(name, file, context)));
                Ok(())
            }
            Err(rejected) => {
                rejected.stop();
                self.detach(&record);
                self.tracked
                    .insert(name.to_owned(), Tracked::Rejected(fingerprint));
                Err(DeploymentError::Collision {
                    name: name.to_owned(),
                    context_path: rejected.context_path().to_owned(),
                })
            }
        }
    }

    fn apply_add(&mut self, name: &str, file: DescriptorFile) -> Result<(), DeploymentError> {
        let fingerprint = file.fingerprint;
        let result = self.build_context(name, &file).and_then(|context| {
            self.registry
                .try_insert(Arc::clone(&context))
                .map(|()| context)
                .map_err(|rejected| {
                    rejected.stop();
                    DeploymentError::Collision {
                        name: name.to_owned(),
                        context_path: rejected.context_path().to_owned(),
                    }
                })
        });
        match result {
            Ok(context) => {
                info!(
                    target: DEPLOY_TARGET,
                    descriptor = %name,
                    context = %context.context_path(),
                    state = ?context.state(),
                    "hot deployed descriptor"
                );
                self.tracked
                    .insert(name.to_owned(), Tracked::Deployed(record_for(name, file, context)));
                Ok(())
            }
            Err(error) => {
                self.tracked
                    .insert(name.to_owned(), Tracked::Rejected(fingerprint));
                Err(error)
            }
        }
    }

    /// Parses the descriptor and starts a detached context for it.
    fn build_context(
        &self,
        name: &str,
        file: &DescriptorFile,
    ) -> Result<Arc<WebContext>, DeploymentError> {
        let contents = file.contents.as_deref().unwrap_or_default();
        let descriptor = ContextDescriptor::parse(&file.path, contents)?;
        let context = Arc::new(WebContext::new(descriptor.into_settings(
            name,
            &self.home,
            &self.defaults,
        )));
        context.start();
        Ok(context)
    }

    fn undeploy(&mut self, name: &str) -> bool {
        match self.tracked.remove(name) {
            Some(Tracked::Deployed(record)) => {
                self.detach(&record);
                info!(
                    target: DEPLOY_TARGET,
                    descriptor = %name,
                    context = %record.context_path,
                    "undeployed descriptor"
                );
                true
            }
            Some(Tracked::Rejected(_)) | None => false,
        }
    }

    fn detach(&self, record: &DeploymentRecord) {
        if let Some(current) = self.registry.get(&record.context_path)
            && Arc::ptr_eq(&current, &record.context)
        {
            self.registry.remove(&record.context_path);
        }
        record.context.stop();
    }

    fn guarded_scan(&mut self) -> ScanReport {
        let pass = AssertUnwindSafe(|| {
            let report = self.scan();
            if let Some(observer) = &self.observer {
                observer.pass_finished(&report);
            }
            report
        });
        match panic::catch_unwind(pass) {
            Ok(report) => report,
            Err(_) => {
                error!(
                    target: DEPLOY_TARGET,
                    directory = %self.contexts_dir.display(),
                    "reconciliation pass panicked"
                );
                ScanReport::default()
            }
        }
    }
}

fn record_for(name: &str, file: DescriptorFile, context: Arc<WebContext>) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_owned(),
        source_path: file.path,
        content_hash: file.fingerprint,
        modified: file.modified,
        context_path: context.context_path().to_owned(),
        context,
    }
}

fn descriptor_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let is_descriptor = !name.starts_with('.')
        && path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case(DESCRIPTOR_EXTENSION));
    is_descriptor.then(|| name.to_owned())
}

enum Command {
    ScanNow(Sender<ScanReport>),
    Shutdown,
}

fn run_loop(mut deployer: HotScanDeployer, commands: &Receiver<Command>) -> HotScanDeployer {
    info!(
        target: DEPLOY_TARGET,
        directory = %deployer.contexts_dir.display(),
        interval_ms = deployer.interval.as_millis(),
        "hot-scan deployer running"
    );
    loop {
        match commands.recv_timeout(deployer.interval) {
            Err(RecvTimeoutError::Timeout) => {
                deployer.guarded_scan();
            }
            Ok(Command::ScanNow(reply)) => {
                let report = deployer.guarded_scan();
                if reply.send(report).is_err() {
                    debug!(target: DEPLOY_TARGET, "manual scan requester went away");
                }
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(target: DEPLOY_TARGET, "hot-scan deployer stopped");
    deployer
}

/// Handle to a running hot-scan deployer.
#[derive(Debug)]
pub struct HotScanHandle {
    commands: Sender<Command>,
    thread: Option<JoinHandle<HotScanDeployer>>,
    initial: ScanReport,
}

impl HotScanHandle {
    /// Report of the pass run before the background thread started.
    #[must_use]
    pub fn initial_report(&self) -> &ScanReport {
        &self.initial
    }

    /// Runs a pass on the deployer thread and waits for its report.
    ///
    /// Returns `None` once the deployer has stopped.
    #[must_use]
    pub fn scan_now(&self) -> Option<ScanReport> {
        let (reply, report) = mpsc::channel();
        self.commands.send(Command::ScanNow(reply)).ok()?;
        report.recv().ok()
    }

    /// Stops the deployer after its current pass and hands back its state.
    pub fn shutdown(mut self) -> Result<HotScanDeployer, DeploymentError> {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!(target: DEPLOY_TARGET, "hot-scan deployer already stopped");
        }
        let thread = self
            .thread
            .take()
            .ok_or(DeploymentError::ScanThreadPanicked)?;
        thread
            .join()
            .map_err(|_| DeploymentError::ScanThreadPanicked)
    }
}

impl Drop for HotScanHandle {
    fn drop(&mut self) {
        if self.thread.is_some() && self.commands.send(Command::Shutdown).is_err() {
            debug!(target: DEPLOY_TARGET, "hot-scan deployer already stopped");
        }
    }
}
