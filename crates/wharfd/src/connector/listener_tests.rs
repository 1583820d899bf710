//! Tests for connector binding and serving.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::get;
use rstest::{fixture, rstest};
use wharf_config::ServerConfig;
use wharf_types::{ConnectorMode, Scheme};

use super::{Connector, ConnectorError, provision_connectors};

#[derive(Default)]
struct Hits {
    started: AtomicUsize,
    finished: AtomicBool,
}

fn app(hits: &Arc<Hits>, delay: Duration) -> Router {
    let hits = Arc::clone(hits);
    Router::new().route(
        "/",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                hits.finished.store(true, Ordering::SeqCst);
                "ok"
            }
        }),
    )
}

#[fixture]
fn hits() -> Arc<Hits> {
    Arc::new(Hits::default())
}

#[fixture]
fn local_config() -> ServerConfig {
    let mut config = ServerConfig::for_home(std::env::temp_dir());
    config.bind_host = "127.0.0.1".to_owned();
    config.port = 0;
    config.secure_port = 0;
    config
}

fn send_get(port: u16) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .expect("send request");
    stream
}

fn read_response(mut stream: TcpStream) -> String {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
#[case(ConnectorMode::Pooled)]
#[case(ConnectorMode::SingleThreaded)]
fn connector_serves_requests(#[case] mode: ConnectorMode, hits: Arc<Hits>) {
    let connector = Connector::bind("127.0.0.1", 0, mode, None).expect("bind connector");
    let port = connector.info().port;
    assert_ne!(port, 0, "bound port should be resolved");
    let handle = connector
        .start(app(&hits, Duration::ZERO))
        .expect("start connector");

    for _ in 0..2 {
        let response = read_response(send_get(port));
        assert!(response.starts_with("HTTP/1.1 200"), "unexpected: {response}");
        assert!(response.ends_with("ok"));
    }

    assert_eq!(hits.started.load(Ordering::SeqCst), 2);
    handle.join().expect("join connector");
}

#[rstest]
fn joined_connector_releases_its_port(hits: Arc<Hits>) {
    let connector =
        Connector::bind("127.0.0.1", 0, ConnectorMode::Pooled, None).expect("bind connector");
    let port = connector.info().port;
    connector
        .start(app(&hits, Duration::ZERO))
        .expect("start connector")
        .join()
        .expect("join connector");

    TcpListener::bind(("127.0.0.1", port)).expect("port should be free after join");
}

#[rstest]
fn join_lets_the_request_in_flight_finish(hits: Arc<Hits>) {
    let connector =
        Connector::bind("127.0.0.1", 0, ConnectorMode::Pooled, None).expect("bind connector");
    let port = connector.info().port;
    let handle = connector
        .start(app(&hits, Duration::from_millis(300)))
        .expect("start connector");

    let client = thread::spawn(move || read_response(send_get(port)));
    assert!(wait_until(|| hits.started.load(Ordering::SeqCst) == 1));
    handle.join().expect("join connector");

    assert!(hits.finished.load(Ordering::SeqCst), "join returned mid-request");
    let response = client.join().expect("client thread");
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected: {response}");
}

#[rstest]
#[case(ConnectorMode::Pooled)]
#[case(ConnectorMode::SingleThreaded)]
fn join_closes_connections_that_never_finish(#[case] mode: ConnectorMode, hits: Arc<Hits>) {
    let connector = Connector::bind("127.0.0.1", 0, mode, None).expect("bind connector");
    let port = connector.info().port;
    let handle = connector
        .start(app(&hits, Duration::ZERO))
        .expect("start connector");

    let mut stalled = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stalled
        .write_all(b"GET / HTTP/1.1\r\nHost: loc")
        .expect("send partial request");
    handle.join().expect("join connector");

    stalled
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut rest = Vec::new();
    match stalled.read_to_end(&mut rest) {
        Ok(_) => assert!(!String::from_utf8_lossy(&rest).contains(" 200 ")),
        Err(error) => assert_eq!(
            error.kind(),
            io::ErrorKind::ConnectionReset,
            "connection still open after join"
        ),
    }
    assert_eq!(hits.started.load(Ordering::SeqCst), 0);
}

#[rstest]
fn occupied_port_is_reported_as_unavailable() {
    let occupant = TcpListener::bind(("127.0.0.1", 0)).expect("bind occupant");
    let port = occupant.local_addr().expect("occupant address").port();

    let error = Connector::bind("127.0.0.1", port, ConnectorMode::Pooled, None)
        .expect_err("bind should fail");
    assert!(
        matches!(error, ConnectorError::PortUnavailable { .. }),
        "unexpected error: {error:?}"
    );
}

#[rstest]
fn plain_configuration_provisions_one_connector(local_config: ServerConfig) {
    let connectors = provision_connectors(&local_config).expect("provision connectors");
    assert_eq!(connectors.len(), 1);
    let info = connectors.first().expect("plain connector").info();
    assert_eq!(info.scheme, Scheme::Http);
    assert_eq!(info.mode, ConnectorMode::Pooled);
}

#[rstest]
fn blocking_io_selects_a_single_threaded_connector(mut local_config: ServerConfig) {
    local_config.use_async_io = false;
    let connectors = provision_connectors(&local_config).expect("provision connectors");
    let info = connectors.first().expect("plain connector").info();
    assert_eq!(info.mode, ConnectorMode::SingleThreaded);
}

#[rstest]
fn encrypted_connector_without_keystore_is_a_configuration_error(
    mut local_config: ServerConfig,
) {
    local_config.use_encrypted_connector = true;
    let error = provision_connectors(&local_config).expect_err("keystore required");
    assert!(matches!(error, ConnectorError::Configuration { .. }));
}
