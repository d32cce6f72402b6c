//! Reachability probes for the engine and auxiliary services.
//!
//! Every failure mode (connection refused, timeout, non-2xx status,
//! malformed body) collapses into `reachable = false` with the reason in
//! [`ServiceStatus::error`]. [`HealthChecker::check`] never fails.

use std::time::Duration;

use serde::Serialize;
use vidfactory_comfyui::api::{EngineClient, EngineConfig};

/// How a service is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    /// ComfyUI-style engine: `/system_stats` for version and device, then
    /// `/queue` for load.
    Engine,
    /// Any HTTP service answering JSON on `health_path`.
    Generic { health_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProbe {
    /// Key of this service in the status report.
    pub name: String,
    pub base_url: String,
    pub kind: ProbeKind,
}

impl ServiceProbe {
    pub fn engine(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind: ProbeKind::Engine,
        }
    }

    pub fn generic(
        name: impl Into<String>,
        base_url: impl Into<String>,
        health_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind: ProbeKind::Generic {
                health_path: health_path.into(),
            },
        }
    }
}

/// Normalized reachability and capacity of one service.
///
/// Optional fields are `None` when the service did not report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub reachable: bool,
    pub version: Option<String>,
    pub device_name: Option<String>,
    pub vram_free_mb: Option<u64>,
    pub queue_running: Option<usize>,
    pub queue_pending: Option<usize>,
    /// Why the service counts as unreachable.
    pub error: Option<String>,
}

impl ServiceStatus {
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            reachable: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Issues one short-timeout probe per service.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn check(&self, probe: &ServiceProbe) -> ServiceStatus {
        let status = match &probe.kind {
            ProbeKind::Engine => self.check_engine(probe).await,
            ProbeKind::Generic { health_path } => self.check_generic(probe, health_path).await,
        };

        match &status.error {
            Some(reason) if !status.reachable => {
                tracing::warn!(service = %probe.name, url = %probe.base_url, error = %reason, "Service unreachable");
            }
            _ => tracing::debug!(service = %probe.name, version = ?status.version, "Service reachable"),
        }
        status
    }

    async fn check_engine(&self, probe: &ServiceProbe) -> ServiceStatus {
        let engine = EngineClient::with_client(
            self.client.clone(),
            EngineConfig {
                request_timeout: self.timeout,
                ..EngineConfig::new(probe.base_url.as_str(), "")
            },
        );

        let stats = match engine.system_stats().await {
            Ok(stats) => stats,
            Err(e) => return ServiceStatus::unreachable(e.to_string()),
        };
        let queue = match engine.queue().await {
            Ok(queue) => Some(queue),
            Err(e) => {
                tracing::debug!(service = %probe.name, error = %e, "Queue query failed");
                None
            }
        };

        let device = stats.first_device();
        ServiceStatus {
            reachable: true,
            version: stats.system.comfyui_version.clone(),
            device_name: device.map(|d| d.name.clone()).filter(|n| !n.is_empty()),
            vram_free_mb: device.and_then(|d| d.vram_free_mb()),
            queue_running: queue.as_ref().map(|q| q.running_count()),
            queue_pending: queue.as_ref().map(|q| q.pending_count()),
            error: None,
        }
    }

    async fn check_generic(&self, probe: &ServiceProbe, health_path: &str) -> ServiceStatus {
        let url = join_url(&probe.base_url, health_path);
        match self.get_json(&url).await {
            Ok(body) => ServiceStatus {
                reachable: true,
                version: body
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned),
                ..ServiceStatus::default()
            },
            Err(reason) => ServiceStatus::unreachable(reason),
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        let text = response.text().await.map_err(|e| e.to_string())?;
        serde_json::from_str(&text).map_err(|e| format!("Malformed response body: {e}"))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
