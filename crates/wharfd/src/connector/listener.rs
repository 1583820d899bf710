//! Plain and encrypted connectors served by `axum_server`.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::{self, RustlsConfig};
use rustls::ServerConfig;
use tokio::runtime::{self, Runtime};
use tracing::{info, warn};
use wharf_types::{ConnectorInfo, ConnectorMode, Scheme};

use super::{CONNECTOR_TARGET, ConnectorError};

const POOL_WORKERS: usize = 4;
/// How long open connections may finish their requests once a connector
/// stops accepting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A bound listener that has not started accepting yet.
#[derive(Debug)]
pub(crate) struct Connector {
    info: ConnectorInfo,
    listener: TcpListener,
    tls: Option<Arc<ServerConfig>>,
}

impl Connector {
    pub(crate) fn bind(
        host: &str,
        port: u16,
        mode: ConnectorMode,
        tls: Option<Arc<ServerConfig>>,
    ) -> Result<Self, ConnectorError> {
        let listener = bind_tcp(host, port)?;
        let bound_port = listener.local_addr().map_or(port, |addr| addr.port());
        let scheme = if tls.is_some() {
            Scheme::Https
        } else {
            Scheme::Http
        };
        Ok(Self {
            info: ConnectorInfo {
                scheme,
                host: host.to_owned(),
                port: bound_port,
                mode,
            },
            listener,
            tls,
        })
    }

    pub(crate) const fn info(&self) -> &ConnectorInfo {
        &self.info
    }

    /// Serves `app` on a dedicated thread that owns the connector's runtime.
    pub(crate) fn start(self, app: Router) -> Result<ConnectorHandle, ConnectorError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ConnectorError::NonBlocking { source })?;
        let runtime = build_runtime(&self.info)?;
        let handle = Handle::new();
        let server_handle = handle.clone();
        let info = self.info.clone();
        let thread = thread::Builder::new()
            .name(format!("connector-{}-{}", info.scheme, info.port))
            .spawn(move || self.serve(runtime, app, server_handle))
            .map_err(|source| ConnectorError::Spawn { source })?;
        Ok(ConnectorHandle {
            info,
            handle,
            thread: Some(thread),
        })
    }

    fn serve(self, runtime: Runtime, app: Router, handle: Handle) -> io::Result<()> {
        let Self {
            info,
            listener,
            tls,
        } = self;
        info!(
            target: CONNECTOR_TARGET,
            connector = %info,
            mode = ?info.mode,
            "connector accepting"
        );
        let service = app.into_make_service();
        let result = runtime.block_on(async move {
            match tls {
                Some(config) => {
                    tls_rustls::from_tcp_rustls(listener, RustlsConfig::from_config(config))
                        .handle(handle)
                        .serve(service)
                        .await
                }
                None => {
                    axum_server::from_tcp(listener)
                        .handle(handle)
                        .serve(service)
                        .await
                }
            }
        });
        // Connection tasks still running after the grace period die with the
        // runtime.
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        match &result {
            Ok(()) => info!(
                target: CONNECTOR_TARGET,
                connector = %info,
                "connector stopped"
            ),
            Err(error) => warn!(
                target: CONNECTOR_TARGET,
                connector = %info,
                error = %error,
                "connector stopped with an error"
            ),
        }
        result
    }
}

/// Handle to a running connector.
pub(crate) struct ConnectorHandle {
    info: ConnectorInfo,
    handle: Handle,
    thread: Option<JoinHandle<io::Result<()>>>,
}

impl ConnectorHandle {
    pub(crate) const fn info(&self) -> &ConnectorInfo {
        &self.info
    }

    /// Stops accepting, lets open connections finish within a grace period,
    /// and waits for the connector thread. No connection is served and the
    /// listening socket is closed once this returns.
    pub(crate) fn join(mut self) -> Result<(), ConnectorError> {
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(Ok(()))) | None => Ok(()),
            Some(Ok(Err(source))) => Err(ConnectorError::Serve { source }),
            Some(Err(_)) => Err(ConnectorError::ThreadPanic),
        }
    }
}

impl Drop for ConnectorHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.shutdown();
        }
    }
}

fn build_runtime(info: &ConnectorInfo) -> Result<Runtime, ConnectorError> {
    let mut builder = match info.mode {
        ConnectorMode::Pooled => {
            let mut builder = runtime::Builder::new_multi_thread();
            builder.worker_threads(POOL_WORKERS);
            builder
        }
        ConnectorMode::SingleThreaded => runtime::Builder::new_current_thread(),
    };
    builder
        .thread_name(format!("{}-{}", info.scheme, info.port))
        .enable_all()
        .build()
        .map_err(|source| ConnectorError::Runtime { source })
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ConnectorError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConnectorError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ConnectorError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ConnectorError::from_bind(addr, source))
}
