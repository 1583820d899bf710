//! Unit tests for the lifecycle controller.

use std::net::TcpListener;
use std::sync::Arc;

use mockall::mock;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use wharf_config::ServerConfig;
use wharf_types::LifecycleState::{
    self, NotStarted, StartFailed, Started, Starting, StopFailed, Stopped, Stopping,
};

use super::*;
use crate::tests::support::{
    LaunchOutcome, Latch, RecordingObserver, SETTLE_TIMEOUT, ScriptedLauncher, loopback_config,
};

mock! {
    Resource {}
    impl ExclusiveResource for Resource {
        fn acquire(&self) -> Result<(), ResourceError>;
        fn release(&self);
    }
}

struct Harness {
    controller: Controller,
    launcher: Arc<ScriptedLauncher>,
    resource: Arc<CountingResource>,
    observer: Arc<RecordingObserver>,
    _home: TempDir,
    config: ServerConfig,
}

impl Harness {
    fn start(&self) {
        self.controller.start(self.config.clone());
    }

    fn start_and_settle(&self) -> LifecycleState {
        self.start();
        self.controller.wait_until_settled(SETTLE_TIMEOUT)
    }

    fn stop_and_settle(&self) -> LifecycleState {
        self.controller.stop();
        self.controller.wait_until_settled(SETTLE_TIMEOUT)
    }

    fn assert_resource_balanced(&self) {
        assert!(!self.resource.is_held(), "resource should be released");
        assert_eq!(
            self.resource.acquire_count(),
            self.resource.release_count(),
            "every acquisition should be matched by a release"
        );
    }
}

#[fixture]
fn harness() -> Harness {
    let home = TempDir::new().expect("temp home");
    let launcher = Arc::new(ScriptedLauncher::new());
    let resource = Arc::new(CountingResource::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = Controller::new(launcher.clone(), resource.clone(), observer.clone());
    let config = loopback_config(home.path());
    Harness {
        controller,
        launcher,
        resource,
        observer,
        _home: home,
        config,
    }
}

#[rstest]
fn start_then_stop_reports_each_transition_in_order(harness: Harness) {
    assert_eq!(harness.start_and_settle(), Started);
    assert!(harness.resource.is_held());
    assert_eq!(harness.stop_and_settle(), Stopped);

    assert_eq!(
        harness.observer.states(),
        vec![Starting, Started, Stopping, Stopped]
    );
    assert_eq!(harness.launcher.live_servers(), 0);
    harness.assert_resource_balanced();
}

#[rstest]
fn started_status_lists_connectors(harness: Harness) {
    harness.start_and_settle();

    let status = harness.controller.status();
    assert_eq!(status.state, Started);
    assert_eq!(status.connectors.len(), 1);
    assert!(status.contexts.is_empty());
    assert_eq!(status.reason, None);
}

#[rstest]
fn start_is_ignored_while_starting(harness: Harness) {
    let latch = Latch::default();
    harness.launcher.hold_launches(latch.clone());

    harness.start();
    harness.start();
    assert_eq!(harness.controller.state(), Starting);
    latch.open();

    assert_eq!(harness.controller.wait_until_settled(SETTLE_TIMEOUT), Started);
    assert_eq!(harness.launcher.launches(), 1);
    assert_eq!(harness.resource.acquire_count(), 1);
    assert_eq!(harness.observer.states(), vec![Starting, Started]);
}

#[rstest]
fn start_is_ignored_while_started(harness: Harness) {
    harness.start_and_settle();
    harness.start();

    assert_eq!(harness.controller.state(), Started);
    assert_eq!(harness.launcher.launches(), 1);
    assert_eq!(harness.observer.states(), vec![Starting, Started]);
}

#[rstest]
fn start_is_ignored_while_stopping(harness: Harness) {
    let latch = Latch::default();
    harness.launcher.hold_stops(latch.clone());
    harness.start_and_settle();

    harness.controller.stop();
    harness.start();
    assert_eq!(harness.controller.state(), Stopping);
    latch.open();

    assert_eq!(harness.controller.wait_until_settled(SETTLE_TIMEOUT), Stopped);
    assert_eq!(harness.launcher.launches(), 1);
    harness.assert_resource_balanced();
}

#[rstest]
#[case::not_started(false)]
#[case::already_stopped(true)]
fn stop_without_running_server_is_ignored(harness: Harness, #[case] cycle_first: bool) {
    if cycle_first {
        harness.start_and_settle();
        harness.stop_and_settle();
    }
    let before = harness.observer.events().len();

    harness.controller.stop();

    let expected = if cycle_first { Stopped } else { NotStarted };
    assert_eq!(harness.controller.state(), expected);
    assert_eq!(harness.observer.events().len(), before);
    assert_eq!(harness.launcher.stop_calls(), usize::from(cycle_first));
}

#[rstest]
fn stop_is_ignored_while_starting(harness: Harness) {
    let latch = Latch::default();
    harness.launcher.hold_launches(latch.clone());
    harness.start();

    harness.controller.stop();
    assert_eq!(harness.controller.state(), Starting);
    latch.open();

    assert_eq!(harness.controller.wait_until_settled(SETTLE_TIMEOUT), Started);
    assert_eq!(harness.launcher.stop_calls(), 0);
}

#[rstest]
fn failed_launch_releases_resource_and_allows_restart(harness: Harness) {
    harness
        .launcher
        .push(LaunchOutcome::Fail("no listener for you".to_owned()));

    assert_eq!(harness.start_and_settle(), StartFailed);
    let status = harness.controller.status();
    let reason = status.reason.expect("failure reason");
    assert!(reason.contains("no listener for you"), "reason: {reason}");
    assert!(status.connectors.is_empty());
    harness.assert_resource_balanced();

    assert_eq!(harness.start_and_settle(), Started);
    assert_eq!(
        harness.observer.states(),
        vec![Starting, StartFailed, Starting, Started]
    );
}

#[rstest]
fn panicking_launch_is_reported_as_start_failure(harness: Harness) {
    harness.launcher.push(LaunchOutcome::Panic);

    assert_eq!(harness.start_and_settle(), StartFailed);
    assert_eq!(
        harness.controller.status().reason.as_deref(),
        Some("start sequence panicked")
    );
    harness.assert_resource_balanced();
}

#[rstest]
fn failed_stop_keeps_server_until_retry_succeeds(harness: Harness) {
    harness.launcher.fail_next_stops(1);
    harness.start_and_settle();

    assert_eq!(harness.stop_and_settle(), StopFailed);
    let status = harness.controller.status();
    assert!(
        status
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("scripted stop failure"))
    );
    assert_eq!(harness.launcher.live_servers(), 1);
    harness.assert_resource_balanced();

    assert_eq!(harness.stop_and_settle(), Stopped);
    assert_eq!(harness.launcher.live_servers(), 0);
    assert_eq!(harness.launcher.stop_calls(), 2);
    assert_eq!(
        harness.observer.states(),
        vec![Starting, Started, Stopping, StopFailed, Stopping, Stopped]
    );
    harness.assert_resource_balanced();
}

#[rstest]
fn start_is_ignored_after_failed_stop(harness: Harness) {
    harness.launcher.fail_next_stops(1);
    harness.start_and_settle();
    harness.stop_and_settle();

    harness.start();

    assert_eq!(harness.controller.state(), StopFailed);
    assert_eq!(harness.launcher.launches(), 1);
}

#[rstest]
fn forced_teardown_discards_server_after_failed_stop(harness: Harness) {
    assert!(!harness.controller.force_teardown());

    harness.launcher.fail_next_stops(1);
    harness.start_and_settle();
    harness.stop_and_settle();

    assert!(harness.controller.force_teardown());
    let status = harness.controller.status();
    assert_eq!(status.state, Stopped);
    assert_eq!(status.reason.as_deref(), Some("forced teardown"));
    assert!(status.connectors.is_empty());
    assert_eq!(harness.launcher.live_servers(), 0);
    assert!(!harness.controller.force_teardown());

    assert_eq!(harness.start_and_settle(), Started);
}

#[rstest]
#[case(1)]
#[case(3)]
fn repeated_cycles_balance_the_resource(harness: Harness, #[case] cycles: usize) {
    for _ in 0..cycles {
        assert_eq!(harness.start_and_settle(), Started);
        assert_eq!(harness.stop_and_settle(), Stopped);
    }

    assert_eq!(harness.resource.acquire_count(), cycles);
    harness.assert_resource_balanced();
    assert_eq!(harness.observer.events().len(), cycles * 4);
}

#[rstest]
fn refused_resource_fails_start_without_launching() {
    let mut resource = MockResource::new();
    resource.expect_acquire().times(1).returning(|| {
        Err(ResourceError::Refused {
            message: "maintenance".to_owned(),
        })
    });
    resource.expect_release().times(0);
    let launcher = Arc::new(ScriptedLauncher::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = Controller::new(launcher.clone(), Arc::new(resource), observer.clone());

    controller.start(ServerConfig::for_home(std::env::temp_dir()));

    assert_eq!(controller.state(), StartFailed);
    assert_eq!(launcher.launches(), 0);
    let events = observer.events();
    assert_eq!(events.len(), 1);
    assert!(
        events[0]
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("maintenance"))
    );
}

#[rstest]
fn clones_share_one_lifecycle(harness: Harness) {
    let other = harness.controller.clone();

    other.start(harness.config.clone());
    assert_eq!(harness.controller.wait_until_settled(SETTLE_TIMEOUT), Started);
    assert_eq!(other.state(), Started);
}

mod embedded {
    use super::*;

    fn embedded_controller() -> (Controller, Arc<CountingResource>, Arc<RecordingObserver>) {
        let resource = Arc::new(CountingResource::new());
        let observer = Arc::new(RecordingObserver::default());
        let controller = Controller::embedded(resource.clone(), observer.clone());
        (controller, resource, observer)
    }

    #[rstest]
    fn empty_home_starts_with_one_connector_and_no_contexts() {
        let home = TempDir::new().expect("temp home");
        let (controller, resource, _) = embedded_controller();

        controller.start(loopback_config(home.path()));
        assert_eq!(controller.wait_until_settled(SETTLE_TIMEOUT), Started);

        let status = controller.status();
        assert_eq!(status.connectors.len(), 1);
        assert_ne!(status.connectors[0].port, 0);
        assert!(status.contexts.is_empty());

        controller.stop();
        assert_eq!(controller.wait_until_settled(SETTLE_TIMEOUT), Stopped);
        assert!(!resource.is_held());
    }

    #[rstest]
    fn occupied_port_fails_start_and_releases_resource() {
        let home = TempDir::new().expect("temp home");
        let occupant = TcpListener::bind("127.0.0.1:0").expect("bind occupant");
        let mut config = loopback_config(home.path());
        config.port = occupant.local_addr().expect("occupant address").port();
        let (controller, resource, observer) = embedded_controller();

        controller.start(config);

        assert_eq!(controller.wait_until_settled(SETTLE_TIMEOUT), StartFailed);
        let reason = controller.status().reason.expect("failure reason");
        assert!(reason.starts_with("port unavailable:"), "reason: {reason}");
        assert!(!resource.is_held());
        assert_eq!(resource.release_count(), 1);
        assert_eq!(observer.states(), vec![Starting, StartFailed]);
    }
}
