// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum_test::TestServer;
use chrono::Utc;
use common::{ScriptedSource, at_ms, base_time, monitor_config, sample, temp_store, wait_until};
use netpulse::daily_store::DailyStore;
use netpulse::hub::{Hub, HubConfig};
use netpulse::models::{HourlyStats, RateSample, TrafficStats};
use netpulse::monitor::Monitor;
use netpulse::routes;
use std::sync::Arc;
use tempfile::TempDir;

struct TestApp {
    _dir: TempDir,
    store: Arc<DailyStore>,
    monitor: Arc<Monitor>,
}

async fn test_app() -> TestApp {
    let (dir, store) = temp_store().await;
    let (hub, _) = Hub::spawn(HubConfig {
        subscriber_buffer: 16,
        queue_capacity: 64,
    });
    let monitor = Arc::new(Monitor::new(
        Arc::new(ScriptedSource::new()),
        store.clone(),
        hub,
        monitor_config(),
    ));
    TestApp {
        _dir: dir,
        store,
        monitor,
    }
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http(app: &TestApp) -> TestServer {
    TestServer::builder()
        .http_transport()
        .build(routes::app(app.monitor.clone()))
}

fn test_server(app: &TestApp) -> TestServer {
    TestServer::new(routes::app(app.monitor.clone()))
}

#[tokio::test]
async fn test_root_endpoint() {
    let app = test_app().await;
    let server = test_server(&app);
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("netpulse: network traffic monitor");
}

#[tokio::test]
async fn test_version_endpoint() {
    let app = test_app().await;
    let server = test_server(&app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("netpulse"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_realtime_endpoint() {
    let app = test_app().await;
    let server = test_server(&app);

    let before: RateSample = server.get("/api/network/realtime").await.json();
    assert_eq!(before, RateSample::default());

    let t = base_time();
    app.monitor.ingest(sample(t, 0, 0)).await;
    app.monitor.ingest(sample(at_ms(t, 1000), 250, 4_000)).await;

    let response = server.get("/api/network/realtime").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["down_bps"], 4000.0);
    assert_eq!(json["up_bps"], 250.0);
    assert_eq!(json["timestamp"], at_ms(t, 1000).timestamp());
}

#[tokio::test]
async fn test_hourly_endpoint() {
    let app = test_app().await;
    let server = test_server(&app);
    let response = server.get("/api/network/hourly").await;
    response.assert_status_ok();
    let stats: HourlyStats = response.json();
    assert_eq!(stats.interval_min, 1);
    assert_eq!(stats.points.len(), 60);
    assert_eq!(stats.points[0].offset_min, -59);
    assert_eq!(stats.points[59].offset_min, 0);
}

#[tokio::test]
async fn test_daily_endpoint() {
    let app = test_app().await;
    let server = test_server(&app);

    let now = Utc::now();
    app.monitor.ingest(sample(now, 10, 100)).await;
    app.monitor.persist_once().await.unwrap();

    let response = server.get("/api/network/daily").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert!(json["daily_7d"].is_array());
    assert_eq!(json["since_boot"]["down_bytes"], 0);

    let stats: TrafficStats = response.json();
    assert_eq!(stats.daily.len(), 1);
}

#[tokio::test]
async fn test_daily_endpoint_reports_store_failure() {
    let app = test_app().await;
    let server = test_server(&app);
    app.store.close().await;

    let response = server.get("/api/network/daily").await;
    response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json();
    assert!(json.get("error").and_then(|v| v.as_str()).is_some());
}

// --- WebSocket message tests (require http_transport + ws feature) ---

#[tokio::test]
async fn test_ws_sends_current_rate_then_broadcasts() {
    let app = test_app().await;
    let t = base_time();
    app.monitor.ingest(sample(t, 0, 0)).await;
    app.monitor.ingest(sample(at_ms(t, 1000), 0, 500)).await;

    let server = test_server_with_http(&app);
    let mut ws = server
        .get_websocket("/ws/network/realtime")
        .await
        .into_websocket()
        .await;

    let first: RateSample = ws.receive_json().await;
    assert_eq!(first.down_bps, 500.0);
    assert!(wait_until(|| app.monitor.hub().subscriber_count() == 1).await);

    app.monitor.ingest(sample(at_ms(t, 2000), 0, 2_000)).await;
    let next: RateSample = ws.receive_json().await;
    assert_eq!(next.timestamp, at_ms(t, 2000).timestamp());
    assert_eq!(next.down_bps, 1000.0);

    ws.close().await;
    assert!(wait_until(|| app.monitor.hub().subscriber_count() == 0).await);
}
