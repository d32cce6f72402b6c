//! Integration tests for the telemetry reader, using `sh` stand-ins for
//! `nvidia-smi`.

use std::time::Duration;

use assert_matches::assert_matches;
use vidfactory_dispatcher::collector::{TelemetryConfig, TelemetryError, TelemetryReader};

fn shell(script: &str) -> TelemetryReader {
    TelemetryReader::new(TelemetryConfig {
        program: "sh".into(),
        args: vec!["-c".into(), script.into()],
        ..TelemetryConfig::default()
    })
}

// ---------------------------------------------------------------------------
// Test: well-formed output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rows_are_parsed_and_ordered_by_index() {
    let reader = shell(r"printf '1, RTX 3090, 1000, 24000, 5\n0, RTX 5090, 20000, 32000, 65\n'");

    let devices = reader.read_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].index, 0);
    assert_eq!(devices[0].name, "RTX 5090");
    assert!(devices[0].busy);
    assert_eq!(devices[1].index, 1);
    assert!(!devices[1].busy);
}

#[tokio::test]
async fn empty_output_is_an_empty_list() {
    let devices = shell("true").read_devices().await.unwrap();
    assert!(devices.is_empty());
}

// ---------------------------------------------------------------------------
// Test: partial and malformed output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_numeric_row_is_dropped_and_others_kept() {
    let reader = shell(
        r"printf '0, RTX 5090, [N/A], 32000, 65\n1, RTX 3090, 1000, 24000, 5\n2, RTX 3090\n'",
    );

    let devices = reader.read_devices().await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].index, 1);
}

#[tokio::test]
async fn output_with_no_parseable_rows_is_unparseable() {
    let reader = shell(r"printf 'No devices were found\n\nsomething else\n'");

    let err = reader.read_devices().await.unwrap_err();

    assert_matches!(err, TelemetryError::Unparseable { rejected: 2, .. });
}

// ---------------------------------------------------------------------------
// Test: tool failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_tool_is_spawn_error() {
    let reader = TelemetryReader::new(TelemetryConfig {
        program: "vidfactory-no-such-telemetry-tool".into(),
        ..TelemetryConfig::default()
    });

    let err = reader.read_devices().await.unwrap_err();

    assert_matches!(err, TelemetryError::Spawn { .. });
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let reader = shell("echo 'NVIDIA-SMI has failed' >&2; exit 3");

    let err = reader.read_devices().await.unwrap_err();

    assert_matches!(err, TelemetryError::ExitStatus { status, stderr, .. } => {
        assert_eq!(status.code(), Some(3));
        assert_eq!(stderr, "NVIDIA-SMI has failed");
    });
}

#[tokio::test]
async fn slow_tool_times_out() {
    let reader = TelemetryReader::new(TelemetryConfig {
        program: "sh".into(),
        args: vec!["-c".into(), "sleep 5".into()],
        timeout: Duration::from_millis(100),
        ..TelemetryConfig::default()
    });

    let err = reader.read_devices().await.unwrap_err();

    assert_matches!(err, TelemetryError::Timeout { .. });
}
