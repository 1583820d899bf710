//! The embedded server runtime.
//!
//! [`EmbeddedLauncher`] runs the start sequence in a fixed order: build the
//! server shell, provision connectors, build the handler chain, run the
//! static deployer, register the hot-scan deployer, load the security realm,
//! and finally start accepting connections. A failure at any step tears down
//! whatever the earlier steps attached before the error is returned.

use std::sync::Arc;

use tracing::{info, warn};
use wharf_config::ServerConfig;
use wharf_types::ConnectorInfo;

use crate::connector::{ConnectorHandle, provision_connectors};
use crate::controller::{CONTROLLER_TARGET, RunningServer, ServerLauncher, StartError, StopError};
use crate::deploy::{HotScanDeployer, HotScanHandle, StaticDeployer, WebDefaults};
use crate::handler::{ContextRegistry, LocalEndpoint, build_handler_chain};
use crate::realm::load_realm;

/// Launches [`EmbeddedServer`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedLauncher;

impl EmbeddedLauncher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ServerLauncher for EmbeddedLauncher {
    fn launch(&self, config: &ServerConfig) -> Result<Box<dyn RunningServer>, StartError> {
        info!(
            target: CONTROLLER_TARGET,
            home = %config.layout.home().display(),
            "building server"
        );
        let mut server = EmbeddedServer::new();
        match server.assemble(config) {
            Ok(()) => Ok(Box::new(server)),
            Err(error) => {
                server.discard();
                Err(error)
            }
        }
    }
}

/// A server built from a [`ServerConfig`].
pub(crate) struct EmbeddedServer {
    registry: Arc<ContextRegistry>,
    connectors: Vec<ConnectorHandle>,
    connector_infos: Vec<ConnectorInfo>,
    hot_scan: Option<HotScanHandle>,
}

impl EmbeddedServer {
    fn new() -> Self {
        Self {
            registry: Arc::new(ContextRegistry::new()),
            connectors: Vec::new(),
            connector_infos: Vec::new(),
            hot_scan: None,
        }
    }

    fn assemble(&mut self, config: &ServerConfig) -> Result<(), StartError> {
        let pending = provision_connectors(config)?;

        let chain = build_handler_chain(&self.registry);

        let defaults = WebDefaults::load(&config.layout.default_descriptor_path())?;
        let report = StaticDeployer::new(
            config.layout.webapps_dir(),
            defaults.clone(),
            config.allow_duplicates,
        )
        .deploy(&self.registry)?;
        info!(
            target: CONTROLLER_TARGET,
            deployed = report.deployed.len(),
            skipped = report.skipped.len(),
            "static deployment complete"
        );

        let hot_scan = HotScanDeployer::new(
            config.layout.contexts_dir(),
            config.layout.home(),
            defaults,
            Arc::clone(&self.registry),
            config.scan_interval,
        )
        .start()?;
        self.hot_scan = Some(hot_scan);

        if let Some(realm) = load_realm(
            config.credentials_path.as_deref(),
            config.console_password.as_deref(),
        )? {
            chain.attach_realm(Arc::new(realm));
        }

        for connector in pending {
            let info = connector.info().clone();
            let app = chain.router(LocalEndpoint {
                scheme: info.scheme,
                port: info.port,
            });
            let handle = connector
                .start(app)
                .map_err(|source| StartError::Accept { source })?;
            self.connectors.push(handle);
            self.connector_infos.push(info);
        }
        info!(
            target: CONTROLLER_TARGET,
            connectors = self.connectors.len(),
            contexts = self.registry.len(),
            "server accepting connections"
        );
        Ok(())
    }

    fn discard(&mut self) {
        if let Err(error) = self.stop() {
            warn!(
                target: CONTROLLER_TARGET,
                error = %error,
                "failed to discard partially built server"
            );
        }
    }
}

impl RunningServer for EmbeddedServer {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        self.connector_infos.clone()
    }

    fn registry(&self) -> Arc<ContextRegistry> {
        Arc::clone(&self.registry)
    }

    fn stop(&mut self) -> Result<(), StopError> {
        let mut failures = Vec::new();

        let mut deployer = None;
        if let Some(hot_scan) = self.hot_scan.take() {
            match hot_scan.shutdown() {
                Ok(stopped) => deployer = Some(stopped),
                Err(source) => failures.push(StopError::HotScan { source }),
            }
        }

        for handle in self.connectors.drain(..) {
            let connector = handle.info().to_string();
            if let Err(source) = handle.join() {
                failures.push(StopError::Connector { connector, source });
            }
        }

        if let Some(mut deployer) = deployer {
            deployer.undeploy_all();
        }
        for context in self.registry.drain() {
            context.stop();
        }
        info!(
            target: CONTROLLER_TARGET,
            failures = failures.len(),
            "server stopped"
        );

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                for other in failures {
                    warn!(
                        target: CONTROLLER_TARGET,
                        error = %other,
                        "additional stop failure"
                    );
                }
                Err(first)
            }
        }
    }
}
