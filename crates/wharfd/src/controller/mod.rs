//! Lifecycle controller.
//!
//! The controller owns the server instance, the exclusive resource, and the
//! start/stop state machine. `start` and `stop` only validate the request and
//! flip the state under the transition gate; the sequences themselves run on
//! background threads and report back through the gate when they finish.
//! Every transition is delivered to the observer while the gate is held, so
//! observers see transitions in the order they happened.

mod errors;
mod launcher;
mod phase;
mod resource;

use std::io;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};
use wharf_config::ServerConfig;
use wharf_types::{LifecycleEvent, LifecycleState, StatusSnapshot};

pub use self::errors::{ConfigurationError, StartError, StopError};
pub use self::launcher::{RunningServer, ServerLauncher};
pub use self::resource::{CountingResource, ExclusiveResource, ResourceError};
use self::phase::{Phase, Running, StatusView};
use self::resource::ResourceLease;
use crate::health::LifecycleObserver;
use crate::server::EmbeddedLauncher;
use crate::status;

pub(crate) const CONTROLLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::controller");

const FORCED_TEARDOWN_REASON: &str = "forced teardown";

/// Supervises one embedded server through repeated start/stop cycles.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

struct Shared {
    gate: Mutex<Gate>,
    settled: Condvar,
    launcher: Arc<dyn ServerLauncher>,
    resource: Arc<dyn ExclusiveResource>,
    observer: Arc<dyn LifecycleObserver>,
}

struct Gate {
    phase: Phase,
    reason: Option<String>,
    view: Option<StatusView>,
}

impl Controller {
    /// Builds a controller around the embedded server runtime.
    #[must_use]
    pub fn embedded(
        resource: Arc<dyn ExclusiveResource>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self::new(Arc::new(EmbeddedLauncher::new()), resource, observer)
    }

    /// Builds a controller with an injected server runtime.
    #[must_use]
    pub fn new(
        launcher: Arc<dyn ServerLauncher>,
        resource: Arc<dyn ExclusiveResource>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gate: Mutex::new(Gate {
                    phase: Phase::NotStarted,
                    reason: None,
                    view: None,
                }),
                settled: Condvar::new(),
                launcher,
                resource,
                observer,
            }),
        }
    }

    /// Requests a start cycle with `config`.
    ///
    /// Ignored unless the state is `NotStarted`, `Stopped`, or `StartFailed`.
    /// Returns without waiting for the start sequence.
    pub fn start(&self, config: ServerConfig) {
        let mut gate = self.shared.lock();
        let current = gate.phase.state();
        if !current.accepts_start() {
            info!(
                target: CONTROLLER_TARGET,
                state = %current,
                "start rejected; lifecycle busy"
            );
            return;
        }

        let lease = match ResourceLease::acquire(&self.shared.resource) {
            Ok(lease) => lease,
            Err(source) => {
                let error = StartError::Resource { source };
                gate.view = None;
                self.shared
                    .transition(&mut gate, Phase::StartFailed, Some(error.to_string()));
                return;
            }
        };

        gate.view = None;
        self.shared.transition(&mut gate, Phase::Starting, None);
        let shared = Arc::clone(&self.shared);
        let spawned = spawn_sequence(
            "wharfd-start",
            (config, lease),
            move |(config, lease): (ServerConfig, ResourceLease)| {
                shared.complete_start(&config, lease);
            },
        );
        if let Err(((_, lease), source)) = spawned {
            drop(lease);
            let error = StartError::Spawn { source };
            self.shared
                .transition(&mut gate, Phase::StartFailed, Some(error.to_string()));
        }
    }

    /// Requests a stop cycle.
    ///
    /// Ignored unless the state is `Started` or `StopFailed`. Returns without
    /// waiting for the stop sequence.
    pub fn stop(&self) {
        let mut gate = self.shared.lock();
        let current = gate.phase.state();
        if !current.accepts_stop() {
            info!(
                target: CONTROLLER_TARGET,
                state = %current,
                "stop rejected; no running server"
            );
            return;
        }
        let (server, lease) = match self.shared.transition(&mut gate, Phase::Stopping, None) {
            Phase::Started(Running { server, lease }) => (server, Some(lease)),
            Phase::StopFailed(server) => (server, None),
            _ => return,
        };

        let shared = Arc::clone(&self.shared);
        let spawned = spawn_sequence(
            "wharfd-stop",
            (server, lease),
            move |(server, lease): (Box<dyn RunningServer>, Option<ResourceLease>)| {
                shared.complete_stop(server, lease);
            },
        );
        if let Err(((server, lease), source)) = spawned {
            drop(lease);
            let error = StopError::Spawn { source };
            self.shared.transition(
                &mut gate,
                Phase::StopFailed(server),
                Some(error.to_string()),
            );
        }
    }

    /// Discards a server whose stop failed and moves to `Stopped`.
    ///
    /// Returns `false`, changing nothing, outside `StopFailed`.
    pub fn force_teardown(&self) -> bool {
        let mut gate = self.shared.lock();
        let current = gate.phase.state();
        if current != LifecycleState::StopFailed {
            info!(
                target: CONTROLLER_TARGET,
                state = %current,
                "forced teardown rejected"
            );
            return false;
        }
        warn!(
            target: CONTROLLER_TARGET,
            "discarding server after failed stop"
        );
        gate.view = None;
        let previous = self.shared.transition(
            &mut gate,
            Phase::Stopped,
            Some(FORCED_TEARDOWN_REASON.to_owned()),
        );
        drop(previous);
        true
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.shared.lock().phase.state()
    }

    /// Snapshot of the state, connectors, and contexts.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let (state, reason, view) = {
            let gate = self.shared.lock();
            (gate.phase.state(), gate.reason.clone(), gate.view.clone())
        };
        match view {
            Some(view) => status::snapshot(state, reason, view.connectors, &view.registry),
            None => StatusSnapshot::idle(state, reason),
        }
    }

    /// Blocks until no sequence is in flight or `timeout` elapses, returning
    /// the state observed last.
    pub fn wait_until_settled(&self, timeout: Duration) -> LifecycleState {
        let gate = self.shared.lock();
        let (gate, _) = self
            .shared
            .settled
            .wait_timeout_while(gate, timeout, |gate| gate.phase.state().is_transitional())
            .unwrap_or_else(PoisonError::into_inner);
        gate.phase.state()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `phase`, reports it, and returns the phase it replaced.
    fn transition(&self, gate: &mut Gate, phase: Phase, reason: Option<String>) -> Phase {
        let previous = mem::replace(&mut gate.phase, phase);
        let from = previous.state();
        gate.reason.clone_from(&reason);
        let state = gate.phase.state();
        info!(
            target: CONTROLLER_TARGET,
            from = %from,
            to = %state,
            reason = reason.as_deref().unwrap_or_default(),
            "lifecycle transition"
        );
        let event = match reason {
            Some(reason) => LifecycleEvent::with_reason(state, reason),
            None => LifecycleEvent::new(state),
        };
        self.observer.lifecycle_changed(&event);
        if !state.is_transitional() {
            self.settled.notify_all();
        }
        previous
    }

    fn complete_start(&self, config: &ServerConfig, lease: ResourceLease) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.launcher.launch(config)));
        let failure = match outcome {
            Ok(Ok(server)) => {
                let mut gate = self.lock();
                gate.view = Some(StatusView::of(server.as_ref()));
                self.transition(&mut gate, Phase::Started(Running { server, lease }), None);
                return;
            }
            Ok(Err(error)) => error.to_string(),
            Err(_) => "start sequence panicked".to_owned(),
        };
        drop(lease);
        let mut gate = self.lock();
        self.transition(&mut gate, Phase::StartFailed, Some(failure));
    }

    fn complete_stop(&self, mut server: Box<dyn RunningServer>, lease: Option<ResourceLease>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| server.stop()));
        drop(lease);
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error.to_string()),
            Err(_) => Some("stop sequence panicked".to_owned()),
        };
        let mut gate = self.lock();
        match failure {
            None => {
                drop(server);
                gate.view = None;
                self.transition(&mut gate, Phase::Stopped, None);
            }
            Some(reason) => {
                self.transition(&mut gate, Phase::StopFailed(server), Some(reason));
            }
        }
    }
}

/// Runs `work(payload)` on a new thread. On spawn failure the payload is
/// handed back so the caller keeps ownership of it.
fn spawn_sequence<T, F>(name: &str, payload: T, work: F) -> Result<(), (T, io::Error)>
where
    T: Send + 'static,
    F: FnOnce(T) + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel::<T>(1);
    let spawned = thread::Builder::new().name(name.to_owned()).spawn(move || {
        if let Ok(payload) = receiver.recv() {
            work(payload);
        }
    });
    match spawned {
        Ok(_) => sender.send(payload).map_err(|mpsc::SendError(payload)| {
            (payload, io::Error::other("sequence thread exited early"))
        }),
        Err(error) => Err((payload, error)),
    }
}

#[cfg(test)]
mod tests;
