//! Point-in-time view of GPU and service availability.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use vidfactory_core::config::FactoryConfig;
use vidfactory_core::hardware::{DeviceRole, DeviceRoles, DeviceStatus};
use vidfactory_core::types::Timestamp;

use crate::collector::{TelemetryConfig, TelemetryReader};
use crate::health::{HealthChecker, ServiceProbe, ServiceStatus};

/// Service name of the inference engine in reports.
pub const ENGINE_SERVICE: &str = "comfyui";
/// Service name of the TTS server in reports.
pub const TTS_SERVICE: &str = "tts";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub generated_at: Timestamp,
    /// Ordered by GPU index. Empty when telemetry is unavailable.
    pub devices: Vec<DeviceStatus>,
    pub telemetry_error: Option<String>,
    pub services: BTreeMap<String, ServiceStatus>,
    /// Configured roles by GPU index, independent of what telemetry saw.
    pub roles: DeviceRoles,
}

impl StatusReport {
    pub fn telemetry_available(&self) -> bool {
        self.telemetry_error.is_none()
    }

    pub fn free_devices(&self) -> impl Iterator<Item = &DeviceStatus> {
        self.devices.iter().filter(|d| !d.busy)
    }

    /// `false` for an index not present in the report.
    pub fn is_device_free(&self, index: u32) -> bool {
        self.devices.iter().any(|d| d.index == index && !d.busy)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceStatus> {
        self.services.get(name)
    }

    pub fn role(&self, index: u32) -> Option<&DeviceRole> {
        self.roles.get(&index)
    }
}

/// Combines telemetry and health probes into one [`StatusReport`].
pub struct StatusAggregator {
    telemetry: TelemetryReader,
    health: HealthChecker,
    probes: Vec<ServiceProbe>,
    roles: DeviceRoles,
}

impl StatusAggregator {
    pub fn new(telemetry: TelemetryReader, health: HealthChecker, probes: Vec<ServiceProbe>) -> Self {
        Self {
            telemetry,
            health,
            probes,
            roles: DeviceRoles::new(),
        }
    }

    /// Attach operator-assigned roles to every report.
    pub fn with_roles(mut self, roles: DeviceRoles) -> Self {
        self.roles = roles;
        self
    }

    /// The engine and the TTS service from `config`.
    pub fn from_config(config: &FactoryConfig) -> Self {
        Self::new(
            TelemetryReader::new(TelemetryConfig::from_factory(config)),
            HealthChecker::new(config.probe_timeout),
            vec![
                ServiceProbe::engine(ENGINE_SERVICE, config.engine_url.as_str()),
                ServiceProbe::generic(
                    TTS_SERVICE,
                    config.tts_url.as_str(),
                    config.tts_health_path.as_str(),
                ),
            ],
        )
        .with_roles(config.device_roles.clone())
    }

    pub fn probes(&self) -> &[ServiceProbe] {
        &self.probes
    }

    /// Read telemetry and probe every service concurrently.
    ///
    /// Never fails: a telemetry failure leaves `devices` empty and sets
    /// `telemetry_error`; unreachable services are reported as such.
    pub async fn report(&self) -> StatusReport {
        let probes = self.probes.iter().map(|probe| async move {
            (probe.name.clone(), self.health.check(probe).await)
        });

        let (telemetry, services) = tokio::join!(self.telemetry.read_devices(), join_all(probes));

        let (devices, telemetry_error) = match telemetry {
            Ok(devices) => (devices, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        let report = StatusReport {
            generated_at: chrono::Utc::now(),
            devices,
            telemetry_error,
            services: services.into_iter().collect(),
            roles: self.roles.clone(),
        };

        tracing::info!(
            gpu_count = report.devices.len(),
            free_gpus = report.free_devices().count(),
            services_up = report.services.values().filter(|s| s.reachable).count(),
            services_total = report.services.len(),
            "Status report generated",
        );
        report
    }
}
