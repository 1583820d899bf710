//! Observer channel for lifecycle transitions.
//!
//! The controller reports every transition exactly once, in order, to a
//! single [`LifecycleObserver`]. Observers must not block: they run while the
//! controller holds its transition gate so that delivery order matches
//! transition order.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use wharf_types::{LifecycleEvent, LifecycleState};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Receives lifecycle transitions from the controller.
pub trait LifecycleObserver: Send + Sync {
    /// Invoked once per transition.
    fn lifecycle_changed(&self, event: &LifecycleEvent);
}

impl<T> LifecycleObserver for Arc<T>
where
    T: LifecycleObserver + ?Sized,
{
    fn lifecycle_changed(&self, event: &LifecycleEvent) {
        (**self).lifecycle_changed(event);
    }
}

/// Default observer that records transitions using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleObserver for StructuredHealthReporter {
    fn lifecycle_changed(&self, event: &LifecycleEvent) {
        let reason = event.reason.as_deref().unwrap_or_default();
        match event.state {
            LifecycleState::StartFailed | LifecycleState::StopFailed => {
                tracing::error!(
                    target: HEALTH_TARGET,
                    event = %event.state,
                    reason,
                    "host lifecycle transition failed"
                );
            }
            state => {
                tracing::info!(
                    target: HEALTH_TARGET,
                    event = %state,
                    "host lifecycle transition"
                );
            }
        }
    }
}

/// Observer that forwards events to an `mpsc` receiver.
///
/// Sending never blocks; events sent after the receiver hangs up are dropped.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<LifecycleEvent>,
}

impl ChannelObserver {
    /// Builds an observer together with the receiving end of its stream.
    #[must_use]
    pub fn new() -> (Self, Receiver<LifecycleEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl LifecycleObserver for ChannelObserver {
    fn lifecycle_changed(&self, event: &LifecycleEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(
                target: HEALTH_TARGET,
                event = %event.state,
                "lifecycle receiver dropped; event discarded"
            );
        }
    }
}

/// Fans a transition out to several observers in registration order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl ObserverSet {
    /// Builds an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer to the set.
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl LifecycleObserver for ObserverSet {
    fn lifecycle_changed(&self, event: &LifecycleEvent) {
        for observer in &self.observers {
            observer.lifecycle_changed(event);
        }
    }
}
