//! One-shot deployment of the applications directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::DEPLOY_TARGET;
use super::descriptor::WebDefaults;
use super::errors::DeploymentError;
use crate::handler::{ContextRegistry, ContextSettings, WebContext};

/// Outcome of the startup scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDeployReport {
    /// Context paths deployed, in scan order.
    pub deployed: Vec<String>,
    /// Entries skipped because their context path was already taken.
    pub skipped: Vec<String>,
}

/// Deploys every exploded application below the applications directory.
///
/// The deployer is consumed by [`StaticDeployer::deploy`], so it can only
/// scan once.
#[derive(Debug, Clone)]
pub struct StaticDeployer {
    webapps_dir: PathBuf,
    defaults: WebDefaults,
    allow_duplicates: bool,
}

impl StaticDeployer {
    #[must_use]
    pub fn new(webapps_dir: impl Into<PathBuf>, defaults: WebDefaults, allow_duplicates: bool) -> Self {
        Self {
            webapps_dir: webapps_dir.into(),
            defaults,
            allow_duplicates,
        }
    }

    /// Scans the directory and attaches one context per application.
    ///
    /// A missing directory deploys nothing. An unreadable directory fails the
    /// whole scan; per-entry problems are logged and skipped.
    pub fn deploy(self, registry: &ContextRegistry) -> Result<StaticDeployReport, DeploymentError> {
        let mut report = StaticDeployReport::default();
        for (name, path) in self.list_applications()? {
            let Some(context_path) = derive_context_path(&name) else {
                continue;
            };
            let context = Arc::new(WebContext::new(ContextSettings {
                context_path: context_path.clone(),
                origin: name.clone(),
                resource_base: path,
                welcome_files: self.defaults.welcome_files.clone(),
                directory_listing: self.defaults.directory_listing,
                required_role: None,
                virtual_host: None,
            }));
            context.start();
            if self.allow_duplicates {
                if let Some(previous) = registry.insert(context) {
                    previous.stop();
                    warn!(
                        target: DEPLOY_TARGET,
                        application = %name,
                        context = %context_path,
                        replaced = %previous.settings().origin,
                        "duplicate application replaced earlier deployment"
                    );
                }
            } else if let Err(rejected) = registry.try_insert(context) {
                rejected.stop();
                warn!(
                    target: DEPLOY_TARGET,
                    application = %name,
                    context = %context_path,
                    "skipping duplicate application"
                );
                report.skipped.push(name);
                continue;
            }
            info!(
                target: DEPLOY_TARGET,
                application = %name,
                context = %context_path,
                "deployed application"
            );
            report.deployed.push(context_path);
        }
        Ok(report)
    }

    fn list_applications(&self) -> Result<Vec<(String, PathBuf)>, DeploymentError> {
        let entries = match fs::read_dir(&self.webapps_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!(
                    target: DEPLOY_TARGET,
                    directory = %self.webapps_dir.display(),
                    "applications directory missing; nothing to deploy"
                );
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(DeploymentError::ReadDirectory {
                    path: self.webapps_dir.clone(),
                    source,
                });
            }
        };
        let mut applications = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(
                        target: DEPLOY_TARGET,
                        error = %error,
                        "failed to read applications directory entry"
                    );
                    None
                }
            })
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_owned();
                (!name.starts_with('.')).then(|| (name, entry.path()))
            })
            .collect::<Vec<_>>();
        applications.sort();
        Ok(applications)
    }
}

/// Derives a context path from an application directory name.
///
/// The extension is dropped and `root` (in any case) maps to `/`.
pub(crate) fn derive_context_path(name: &str) -> Option<String> {
    if name.starts_with('.') {
        return None;
    }
    let stem = Path::new(name).file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    if stem.eq_ignore_ascii_case("root") {
        return Some("/".to_owned());
    }
    Some(format!("/{stem}"))
}
