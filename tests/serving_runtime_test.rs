//! Serving runtime lifecycle and HTTP behaviour over real loopback sockets.

use std::net::IpAddr;

use anyhow::Result;
use reqwest::{header::CACHE_CONTROL, StatusCode};
use tokio_test::{assert_err, assert_ok};

use signal_mapper::{
    routes::Site,
    server::{ServerState, ServingRuntime, StartOutcome},
    ServeError,
};

mod common;
use common::{http_client, occupied_port_with_free_successor, unused_port};

fn localhost() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn runtime(root: &std::path::Path, start: u16, end: u16) -> ServingRuntime {
    ServingRuntime::new(localhost(), start, end, Site::new(root, "map.html"))
}

#[tokio::test]
async fn start_twice_keeps_one_listener() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let rt = runtime(dir.path(), 0, 0);

    let first = assert_ok!(rt.start().await);
    let port = match first {
        StartOutcome::Started(port) => port,
        other => panic!("expected Started, got {other:?}"),
    };
    assert_eq!(rt.state(), ServerState::Running { port });

    let second = assert_ok!(rt.start().await);
    assert_eq!(second, StartOutcome::AlreadyRunning(port));
    assert_eq!(rt.local_addr().await.map(|a| a.port()), Some(port));

    assert_eq!(rt.stop().await, Some(port));
    Ok(())
}

#[tokio::test]
async fn stop_while_stopped_is_noop() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), 0, 0);

    assert_eq!(rt.stop().await, None);
    assert_eq!(rt.stop().await, None);
    assert_eq!(rt.state(), ServerState::Stopped);
}

#[tokio::test]
async fn port_is_rebindable_after_stop() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let port = unused_port();
    let rt = runtime(dir.path(), port, port);

    assert_eq!(rt.start().await?, StartOutcome::Started(port));
    assert_eq!(rt.stop().await, Some(port));
    assert_eq!(rt.state(), ServerState::Stopped);

    assert_eq!(rt.start().await?, StartOutcome::Started(port));
    rt.stop().await;
    Ok(())
}

#[tokio::test]
async fn occupied_first_port_falls_through_to_next() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let (_held, port) = occupied_port_with_free_successor();
    let rt = runtime(dir.path(), port, port + 1);

    assert_eq!(rt.start().await?, StartOutcome::Started(port + 1));
    assert_eq!(rt.state(), ServerState::Running { port: port + 1 });
    rt.stop().await;
    Ok(())
}

#[tokio::test]
async fn exhausted_range_reports_no_available_port() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = held.local_addr().unwrap().port();
    let rt = runtime(dir.path(), port, port);

    let err = assert_err!(rt.start().await);
    assert!(
        matches!(err, ServeError::NoAvailablePort { start, end } if start == port && end == port)
    );
    assert_eq!(rt.state(), ServerState::Stopped);
}

#[tokio::test]
async fn serves_artifact_without_caching() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("map.html"), "<p>first</p>")?;
    let rt = runtime(dir.path(), 0, 0);
    rt.start().await?;

    let url = rt.artifact_url().await.expect("running");
    let client = http_client();

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
    assert_eq!(response.text().await?, "<p>first</p>");

    // Regenerated artifact is visible on the next fetch.
    std::fs::write(dir.path().join("map.html"), "<p>second</p>")?;
    let body = client.get(&url).send().await?.text().await?;
    assert_eq!(body, "<p>second</p>");

    rt.stop().await;
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_404_with_no_cache() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let rt = runtime(dir.path(), 0, 0);
    rt.start().await?;
    let addr = rt.local_addr().await.expect("running");

    let response = http_client()
        .get(format!("http://{addr}/does-not-exist.html"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");

    rt.stop().await;
    Ok(())
}

#[tokio::test]
async fn stopped_runtime_refuses_connections() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let rt = runtime(dir.path(), 0, 0);
    rt.start().await?;
    let addr = rt.local_addr().await.expect("running");
    rt.stop().await;

    assert!(rt.local_addr().await.is_none());
    let result = http_client().get(format!("http://{addr}/health")).send().await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn subscribers_observe_transitions() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let rt = runtime(dir.path(), 0, 0);
    let mut states = rt.subscribe();

    let port = rt.start().await?.port();
    assert_eq!(*states.borrow_and_update(), ServerState::Running { port });

    rt.stop().await;
    assert_eq!(*states.borrow_and_update(), ServerState::Stopped);
    Ok(())
}
