use std::fmt;

use serde::{Deserialize, Serialize};

/// States of the host lifecycle state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No start has been requested yet.
    #[default]
    NotStarted,
    /// A start sequence is in flight.
    Starting,
    /// The server is accepting connections.
    Started,
    /// The last start sequence failed.
    StartFailed,
    /// A stop sequence is in flight.
    Stopping,
    /// The last stop sequence completed.
    Stopped,
    /// The last stop sequence failed; the server handle is retained.
    StopFailed,
}

impl LifecycleState {
    /// Returns `true` while a background sequence is running.
    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Returns `true` when a new start sequence may be launched.
    #[must_use]
    pub const fn accepts_start(self) -> bool {
        matches!(self, Self::NotStarted | Self::Stopped | Self::StartFailed)
    }

    /// Returns `true` when a stop sequence may be launched.
    #[must_use]
    pub const fn accepts_stop(self) -> bool {
        matches!(self, Self::Started | Self::StopFailed)
    }

    /// Stable lowercase label used in logs and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::StartFailed => "start_failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::StopFailed => "stop_failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Transition notification delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// State entered by the transition.
    pub state: LifecycleState,
    /// Human-readable reason, present for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LifecycleEvent {
    /// Builds an event without a reason.
    #[must_use]
    pub const fn new(state: LifecycleState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    /// Builds an event carrying a reason.
    #[must_use]
    pub fn with_reason(state: LifecycleState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LifecycleState::NotStarted, true, false)]
    #[case(LifecycleState::Starting, false, false)]
    #[case(LifecycleState::Started, false, true)]
    #[case(LifecycleState::StartFailed, true, false)]
    #[case(LifecycleState::Stopping, false, false)]
    #[case(LifecycleState::Stopped, true, false)]
    #[case(LifecycleState::StopFailed, false, true)]
    fn transition_guards(
        #[case] state: LifecycleState,
        #[case] start: bool,
        #[case] stop: bool,
    ) {
        assert_eq!(state.accepts_start(), start, "start guard for {state}");
        assert_eq!(state.accepts_stop(), stop, "stop guard for {state}");
    }

    #[rstest]
    fn events_omit_missing_reason() {
        let event = LifecycleEvent::new(LifecycleState::Started);
        let json = serde_json::to_string(&event).expect("serialise event");
        assert_eq!(json, r#"{"state":"started"}"#);
    }
}
