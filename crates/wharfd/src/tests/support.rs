//! Test doubles shared by the controller unit tests and behaviour suites.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use wharf_config::ServerConfig;
use wharf_types::{ConnectorInfo, ConnectorMode, LifecycleEvent, LifecycleState, Scheme};

use crate::controller::{RunningServer, ServerLauncher, StartError, StopError};
use crate::handler::ContextRegistry;
use crate::health::LifecycleObserver;

pub(crate) const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Records every lifecycle event for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .clone()
    }

    pub(crate) fn states(&self) -> Vec<LifecycleState> {
        self.events().into_iter().map(|event| event.state).collect()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn lifecycle_changed(&self, event: &LifecycleEvent) {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .push(event.clone());
    }
}

/// One-shot gate that blocks waiters until opened.
#[derive(Clone, Default)]
pub(crate) struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Latch {
    pub(crate) fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().expect("latch mutex poisoned") = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().expect("latch mutex poisoned");
        while !*open {
            open = cvar.wait(open).expect("latch mutex poisoned during wait");
        }
    }
}

/// Outcome of one scripted launch.
#[derive(Debug, Clone)]
pub(crate) enum LaunchOutcome {
    Succeed,
    Fail(String),
    Panic,
}

/// Launcher replaying a script of outcomes; launches succeed once the
/// script runs out.
#[derive(Default)]
pub(crate) struct ScriptedLauncher {
    script: Mutex<VecDeque<LaunchOutcome>>,
    launch_hold: Mutex<Option<Latch>>,
    stop_hold: Mutex<Option<Latch>>,
    launches: AtomicUsize,
    pending_stop_failures: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
    live_servers: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, outcome: LaunchOutcome) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(outcome);
    }

    /// Blocks every later launch until `latch` opens.
    pub(crate) fn hold_launches(&self, latch: Latch) {
        *self.launch_hold.lock().expect("hold mutex poisoned") = Some(latch);
    }

    /// Blocks every later stop until `latch` opens.
    pub(crate) fn hold_stops(&self, latch: Latch) {
        *self.stop_hold.lock().expect("hold mutex poisoned") = Some(latch);
    }

    pub(crate) fn fail_next_stops(&self, count: usize) {
        self.pending_stop_failures.store(count, Ordering::SeqCst);
    }

    pub(crate) fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Servers launched and not yet dropped.
    pub(crate) fn live_servers(&self) -> usize {
        self.live_servers.load(Ordering::SeqCst)
    }
}

impl ServerLauncher for ScriptedLauncher {
    fn launch(&self, _config: &ServerConfig) -> Result<Box<dyn RunningServer>, StartError> {
        let hold = self.launch_hold.lock().expect("hold mutex poisoned").clone();
        if let Some(latch) = hold {
            latch.wait();
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or(LaunchOutcome::Succeed);
        match outcome {
            LaunchOutcome::Succeed => {
                self.live_servers.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeServer {
                    registry: Arc::new(ContextRegistry::new()),
                    stop_hold: self.stop_hold.lock().expect("hold mutex poisoned").clone(),
                    pending_stop_failures: Arc::clone(&self.pending_stop_failures),
                    stop_calls: Arc::clone(&self.stop_calls),
                    live_servers: Arc::clone(&self.live_servers),
                }))
            }
            LaunchOutcome::Fail(message) => Err(StartError::Spawn {
                source: io::Error::other(message),
            }),
            LaunchOutcome::Panic => panic!("scripted launch panic"),
        }
    }
}

struct FakeServer {
    registry: Arc<ContextRegistry>,
    stop_hold: Option<Latch>,
    pending_stop_failures: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
    live_servers: Arc<AtomicUsize>,
}

impl RunningServer for FakeServer {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        vec![ConnectorInfo {
            scheme: Scheme::Http,
            host: "127.0.0.1".to_owned(),
            port: 8080,
            mode: ConnectorMode::Pooled,
        }]
    }

    fn registry(&self) -> Arc<ContextRegistry> {
        Arc::clone(&self.registry)
    }

    fn stop(&mut self) -> Result<(), StopError> {
        if let Some(latch) = &self.stop_hold {
            latch.wait();
        }
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .pending_stop_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StopError::Server {
                message: "scripted stop failure".to_owned(),
            });
        }
        Ok(())
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.live_servers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Plain-HTTP configuration on an ephemeral loopback port.
pub(crate) fn loopback_config(home: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::for_home(home);
    config.bind_host = "127.0.0.1".to_owned();
    config.port = 0;
    config.secure_port = 0;
    config.scan_interval = Duration::from_millis(50);
    config
}
