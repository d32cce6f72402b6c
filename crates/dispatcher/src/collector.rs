//! GPU telemetry collection via `nvidia-smi`.
//!
//! [`TelemetryReader`] runs the query tool as a subprocess and hands its
//! CSV output to [`vidfactory_core::hardware::parse_devices`]. A host
//! without the tool (e.g. a developer laptop) yields
//! [`TelemetryError::Spawn`] rather than a panic.

use std::time::Duration;

use tokio::process::Command;
use vidfactory_core::config::FactoryConfig;
use vidfactory_core::hardware::{parse_devices, BusyThresholds, DeviceStatus};

/// Arguments selecting the five columns the parser expects, in order.
pub const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--query-gpu=index,name,memory.used,memory.total,utilization.gpu",
    "--format=csv,noheader,nounits",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub program: String,
    pub args: Vec<String>,
    /// The subprocess is killed when this elapses.
    pub timeout: Duration,
    pub thresholds: BusyThresholds,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            program: "nvidia-smi".to_string(),
            args: NVIDIA_SMI_ARGS.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_secs(10),
            thresholds: BusyThresholds::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_factory(config: &FactoryConfig) -> Self {
        Self {
            program: config.telemetry_command.clone(),
            timeout: config.telemetry_timeout,
            thresholds: config.busy,
            ..Self::default()
        }
    }
}

/// Why no device list could be produced.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} failed ({status}): {stderr}")]
    ExitStatus {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} output had {rejected} rows and none were parseable")]
    Unparseable { program: String, rejected: usize },
}

pub struct TelemetryReader {
    config: TelemetryConfig,
}

impl TelemetryReader {
    pub fn new(config: TelemetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Query every GPU once, ordered by index.
    ///
    /// Individual malformed rows are dropped (and logged); the call only
    /// fails when the tool cannot run or none of its rows parse. Empty
    /// output is an empty list.
    pub async fn read_devices(&self) -> Result<Vec<DeviceStatus>, TelemetryError> {
        let output = self.run().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_devices(&stdout, &self.config.thresholds);

        if parsed.devices.is_empty() && parsed.rejected > 0 {
            return Err(TelemetryError::Unparseable {
                program: self.config.program.clone(),
                rejected: parsed.rejected,
            });
        }

        let mut devices = parsed.devices;
        devices.sort_by_key(|d| d.index);

        tracing::debug!(
            gpu_count = devices.len(),
            rejected = parsed.rejected,
            "Telemetry collected",
        );
        Ok(devices)
    }

    async fn run(&self) -> Result<std::process::Output, TelemetryError> {
        let program = &self.config.program;
        let mut command = Command::new(program);
        command.args(&self.config.args).kill_on_drop(true);

        match tokio::time::timeout(self.config.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(output),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                tracing::warn!(program = %program, status = %output.status, stderr = %stderr, "Telemetry command failed");
                Err(TelemetryError::ExitStatus {
                    program: program.clone(),
                    status: output.status,
                    stderr,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(program = %program, error = %e, "Telemetry command unavailable");
                Err(TelemetryError::Spawn {
                    program: program.clone(),
                    source: e,
                })
            }
            Err(_) => {
                tracing::warn!(program = %program, timeout_secs = self.config.timeout.as_secs(), "Telemetry command timed out");
                Err(TelemetryError::Timeout {
                    program: program.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queries_nvidia_smi_columns_in_parser_order() {
        let config = TelemetryConfig::default();
        assert_eq!(config.program, "nvidia-smi");
        assert_eq!(
            config.args[0],
            "--query-gpu=index,name,memory.used,memory.total,utilization.gpu"
        );
        assert_eq!(config.args[1], "--format=csv,noheader,nounits");
    }

    #[test]
    fn from_factory_carries_command_and_thresholds() {
        let factory = FactoryConfig {
            telemetry_command: "/opt/bin/nvidia-smi".into(),
            telemetry_timeout: Duration::from_secs(3),
            busy: BusyThresholds {
                utilization_percent: 70,
                memory_percent: 90,
            },
            ..FactoryConfig::default()
        };
        let config = TelemetryConfig::from_factory(&factory);
        assert_eq!(config.program, "/opt/bin/nvidia-smi");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.thresholds.utilization_percent, 70);
        assert_eq!(config.args.len(), 2);
    }
}
