mod common;

use std::sync::Arc;

use bridge_poll::config::SessionConfig;
use bridge_poll::server::{self, StatusBody};
use bridge_poll::session::PollSession;
use bridge_poll::sink::ChannelSink;
use bridge_poll::types::{Endpoint, SessionState, StatusLine};
use common::{closed_port, spawn_bridge, wait_until, Mode};
use serde_json::json;
use tokio::net::TcpListener;

async fn spawn_control(ports: Vec<u16>) -> (String, Arc<PollSession>) {
    let cfg = SessionConfig {
        ports,
        poll_interval_ms: 5,
        retry_delay_ms: 5,
        rescan_delay_ms: 20,
        ..SessionConfig::default()
    };
    let session = Arc::new(PollSession::http(cfg, Arc::new(ChannelSink::new(16).0)).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());
    let served = session.clone();
    tokio::spawn(async move {
        server::serve(listener, served).await.unwrap();
    });
    (base, session)
}

#[tokio::test]
async fn start_status_stop_over_http() {
    let bridge = spawn_bridge(
        Mode::Healthy,
        vec![json!({ "events": [{ "text": "hello" }], "last": 2 })],
        true,
    )
    .await;
    let (base, session) = spawn_control(vec![bridge.endpoint.port]).await;
    let client = reqwest::Client::new();

    let status: StatusBody = client
        .get(format!("{base}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.cursor, 0);

    let resp = client.post(format!("{base}/start")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 202);
    wait_until(|| session.cursor() == 2).await;

    let status: StatusBody = client
        .get(format!("{base}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Running);
    assert_eq!(status.endpoint, Some(bridge.endpoint.clone()));
    assert_eq!(status.cursor, 2);

    let status: StatusBody = client
        .post(format!("{base}/stop"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Stopped);

    let log: Vec<StatusLine> = client
        .get(format!("{base}/log"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(log.iter().any(|l| l.message == "stopped"));
}

#[tokio::test]
async fn scan_and_endpoint_override() {
    let bridge = spawn_bridge(Mode::Healthy, Vec::new(), false).await;
    let (base, _session) = spawn_control(vec![closed_port(), bridge.endpoint.port]).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/endpoint")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let found: Endpoint = client
        .post(format!("{base}/scan"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found, bridge.endpoint);

    let resp = client
        .put(format!("{base}/endpoint"))
        .json(&json!({ "port": 17624 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let current: Endpoint = client
        .get(format!("{base}/endpoint"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current, Endpoint::localhost(17624));

    let resp = client
        .put(format!("{base}/endpoint"))
        .json(&json!({ "port": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn scan_without_bridge_is_not_found() {
    let (base, _session) = spawn_control(vec![closed_port()]).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
