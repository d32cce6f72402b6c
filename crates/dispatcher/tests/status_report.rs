//! Integration tests for the health checker and status aggregator
//! against fake services on localhost.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use vidfactory_core::hardware::{DeviceRole, DeviceRoles};
use vidfactory_dispatcher::aggregator::StatusAggregator;
use vidfactory_dispatcher::collector::{TelemetryConfig, TelemetryReader};
use vidfactory_dispatcher::health::{HealthChecker, ServiceProbe};

fn engine_app() -> Router {
    Router::new()
        .route(
            "/system_stats",
            get(|| async {
                Json(json!({
                    "system": {"os": "posix", "comfyui_version": "0.3.10", "python_version": "3.12.3"},
                    "devices": [{
                        "name": "cuda:0 NVIDIA GeForce RTX 5090 : cudaMallocAsync",
                        "type": "cuda",
                        "index": 0,
                        "vram_total": 34190917632u64,
                        "vram_free": 20401094656u64
                    }]
                }))
            }),
        )
        .route(
            "/queue",
            get(|| async {
                Json(json!({
                    "queue_running": [[12, "a1", {}, {}, []]],
                    "queue_pending": [[13, "b2", {}, {}, []], [14, "c3", {}, {}, []]]
                }))
            }),
        )
}

fn tts_app() -> Router {
    Router::new().route("/health", get(|| async { Json(json!({"status": "ok", "version": "1.2.0"})) }))
}

fn checker() -> HealthChecker {
    HealthChecker::new(Duration::from_secs(2))
}

fn fake_telemetry(script: &str) -> TelemetryReader {
    TelemetryReader::new(TelemetryConfig {
        program: "sh".into(),
        args: vec!["-c".into(), script.into()],
        ..TelemetryConfig::default()
    })
}

fn missing_telemetry() -> TelemetryReader {
    TelemetryReader::new(TelemetryConfig {
        program: "vidfactory-no-such-telemetry-tool".into(),
        ..TelemetryConfig::default()
    })
}

// ---------------------------------------------------------------------------
// Test: individual probes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_probe_reports_version_device_and_queue() {
    let base_url = common::spawn(engine_app()).await;

    let status = checker().check(&ServiceProbe::engine("comfyui", base_url)).await;

    assert!(status.reachable);
    assert_eq!(status.version.as_deref(), Some("0.3.10"));
    assert_eq!(
        status.device_name.as_deref(),
        Some("cuda:0 NVIDIA GeForce RTX 5090 : cudaMallocAsync")
    );
    assert_eq!(status.vram_free_mb, Some(19_456));
    assert_eq!(status.queue_running, Some(1));
    assert_eq!(status.queue_pending, Some(2));
    assert_eq!(status.error, None);
}

#[tokio::test]
async fn engine_without_queue_is_still_reachable() {
    let app = Router::new().route("/system_stats", get(|| async { Json(json!({"devices": []})) }));
    let base_url = common::spawn(app).await;

    let status = checker().check(&ServiceProbe::engine("comfyui", base_url)).await;

    assert!(status.reachable);
    assert_eq!(status.version, None);
    assert_eq!(status.device_name, None);
    assert_eq!(status.queue_running, None);
    assert_eq!(status.queue_pending, None);
}

#[tokio::test]
async fn generic_probe_reads_optional_version() {
    let base_url = common::spawn(tts_app()).await;

    let status = checker()
        .check(&ServiceProbe::generic("tts", base_url, "/health"))
        .await;

    assert!(status.reachable);
    assert_eq!(status.version.as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn error_status_is_unreachable() {
    let app = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "loading"}))) }),
    );
    let base_url = common::spawn(app).await;

    let status = checker()
        .check(&ServiceProbe::generic("tts", base_url, "/health"))
        .await;

    assert!(!status.reachable);
    assert!(status.error.unwrap().contains("503"));
}

#[tokio::test]
async fn non_json_body_is_unreachable() {
    let app = Router::new().route("/health", get(|| async { "OK" }));
    let base_url = common::spawn(app).await;

    let status = checker()
        .check(&ServiceProbe::generic("tts", base_url, "/health"))
        .await;

    assert!(!status.reachable);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let addr = common::unused_addr().await;

    let status = checker()
        .check(&ServiceProbe::engine("comfyui", format!("http://{addr}")))
        .await;

    assert!(!status.reachable);
    assert!(status.error.is_some());
    assert_eq!(status.version, None);
}

// ---------------------------------------------------------------------------
// Test: aggregated report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn report_combines_telemetry_and_services() {
    let engine_url = common::spawn(engine_app()).await;
    let tts_url = common::spawn(tts_app()).await;
    let aggregator = StatusAggregator::new(
        fake_telemetry(r"printf '0, RTX 5090, 20000, 32000, 65\n1, RTX 3090, 1000, 24000, 5\n'"),
        checker(),
        vec![
            ServiceProbe::engine("comfyui", engine_url),
            ServiceProbe::generic("tts", tts_url, "/health"),
        ],
    )
    .with_roles(DeviceRoles::from([
        (0, DeviceRole::new("primary").hosting("comfyui")),
        (5, DeviceRole::new("control")),
    ]));

    let report = aggregator.report().await;

    assert!(report.telemetry_available());
    assert_eq!(report.role(0).unwrap().role, "primary");
    assert!(report.role(1).is_none());
    assert_eq!(report.roles.len(), 2);
    assert_eq!(report.devices.len(), 2);
    assert!(!report.is_device_free(0));
    assert!(report.is_device_free(1));
    assert!(report.service("comfyui").unwrap().reachable);
    assert!(report.service("tts").unwrap().reachable);
}

#[tokio::test]
async fn report_without_telemetry_still_has_services() {
    let engine_url = common::spawn(engine_app()).await;
    let addr = common::unused_addr().await;
    let aggregator = StatusAggregator::new(
        missing_telemetry(),
        checker(),
        vec![
            ServiceProbe::engine("comfyui", engine_url),
            ServiceProbe::generic("tts", format!("http://{addr}"), "/health"),
        ],
    );

    let report = aggregator.report().await;

    assert!(report.devices.is_empty());
    assert!(report
        .telemetry_error
        .as_deref()
        .unwrap()
        .contains("vidfactory-no-such-telemetry-tool"));
    assert_eq!(report.services.len(), 2);
    assert!(report.service("comfyui").unwrap().reachable);
    assert!(!report.service("tts").unwrap().reachable);
}

#[tokio::test]
async fn report_serializes_for_json_output() {
    let aggregator = StatusAggregator::new(fake_telemetry("true"), checker(), Vec::new())
        .with_roles(DeviceRoles::from([(4, DeviceRole::new("worker").hosting("tts"))]));

    let report = aggregator.report().await;
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["devices"], json!([]));
    assert_eq!(value["roles"], json!({"4": {"role": "worker", "service": "tts"}}));
    assert!(value["telemetry_error"].is_null());
    assert_eq!(value["services"], json!({}));
    assert!(value["generated_at"].is_string());
}
