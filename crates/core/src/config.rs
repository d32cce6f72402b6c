use std::time::Duration;

use crate::hardware::{parse_roles, BusyThresholds, DeviceRoles, RoleError};

/// Factory configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single workstation running
/// ComfyUI and a TTS server locally. Components receive the pieces they
/// need at construction; nothing reads this globally.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryConfig {
    /// Inference engine base URL, without trailing slash.
    pub engine_url: String,
    /// TTS service base URL, without trailing slash.
    pub tts_url: String,
    /// Health endpoint path on the TTS service.
    pub tts_health_path: String,
    /// Client id sent with each submission.
    pub client_id: String,
    /// Delay between completion polls.
    pub poll_interval: Duration,
    /// Number of polls before a job is reported as timed out.
    pub poll_max_attempts: u32,
    /// Timeout for the submission request.
    pub submit_timeout: Duration,
    /// Timeout for each health probe.
    pub probe_timeout: Duration,
    /// GPU query tool executable.
    pub telemetry_command: String,
    /// Timeout for one telemetry query.
    pub telemetry_timeout: Duration,
    /// Busy heuristic thresholds.
    pub busy: BusyThresholds,
    /// Operator-assigned GPU roles, keyed by index. Empty when unset.
    pub device_roles: DeviceRoles,
}

/// Errors from loading [`FactoryConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} {reason}")]
    OutOfRange { key: &'static str, reason: &'static str },

    #[error("GPU_ROLES: {0}")]
    InvalidRoles(#[from] RoleError),
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://localhost:8188".into(),
            tts_url: "http://localhost:8880".into(),
            tts_health_path: "/health".into(),
            client_id: "dispatcher".into(),
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 120,
            submit_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            telemetry_command: "nvidia-smi".into(),
            telemetry_timeout: Duration::from_secs(10),
            busy: BusyThresholds::default(),
            device_roles: DeviceRoles::new(),
        }
    }
}

impl FactoryConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `COMFYUI_URL`              | `http://localhost:8188` |
    /// | `TTS_URL`                  | `http://localhost:8880` |
    /// | `TTS_HEALTH_PATH`          | `/health`               |
    /// | `CLIENT_ID`                | `dispatcher`            |
    /// | `POLL_INTERVAL_SECS`       | `5`                     |
    /// | `POLL_MAX_ATTEMPTS`        | `120`                   |
    /// | `SUBMIT_TIMEOUT_SECS`      | `30`                    |
    /// | `PROBE_TIMEOUT_SECS`       | `5`                     |
    /// | `TELEMETRY_COMMAND`        | `nvidia-smi`            |
    /// | `TELEMETRY_TIMEOUT_SECS`   | `10`                    |
    /// | `BUSY_UTILIZATION_PERCENT` | `50`                    |
    /// | `BUSY_MEMORY_PERCENT`      | `80`                    |
    /// | `GPU_ROLES`                | (none)                  |
    ///
    /// Intervals, attempts and timeouts must be at least 1. `GPU_ROLES` is
    /// a comma-separated `index:role[:service]` list, e.g.
    /// `0:primary:comfyui,4:worker:tts`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary
    /// key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    key,
                    value: raw,
                }),
                None => Ok(default),
            }
        };

        let seconds = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match number(key, default.as_secs())? {
                0 => Err(ConfigError::OutOfRange {
                    key,
                    reason: "must be at least 1",
                }),
                secs => Ok(Duration::from_secs(secs)),
            }
        };

        let poll_max_attempts = number("POLL_MAX_ATTEMPTS", u64::from(defaults.poll_max_attempts))?;
        let poll_max_attempts = u32::try_from(poll_max_attempts)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::OutOfRange {
                key: "POLL_MAX_ATTEMPTS",
                reason: "must be between 1 and 4294967295",
            })?;

        let busy = BusyThresholds {
            utilization_percent: percent(number(
                "BUSY_UTILIZATION_PERCENT",
                u64::from(defaults.busy.utilization_percent),
            )?, "BUSY_UTILIZATION_PERCENT")?,
            memory_percent: percent(number(
                "BUSY_MEMORY_PERCENT",
                u64::from(defaults.busy.memory_percent),
            )?, "BUSY_MEMORY_PERCENT")?,
        };

        Ok(Self {
            engine_url: trim_url(text("COMFYUI_URL", defaults.engine_url)),
            tts_url: trim_url(text("TTS_URL", defaults.tts_url)),
            tts_health_path: text("TTS_HEALTH_PATH", defaults.tts_health_path),
            client_id: text("CLIENT_ID", defaults.client_id),
            poll_interval: seconds("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            poll_max_attempts,
            submit_timeout: seconds("SUBMIT_TIMEOUT_SECS", defaults.submit_timeout)?,
            probe_timeout: seconds("PROBE_TIMEOUT_SECS", defaults.probe_timeout)?,
            telemetry_command: text("TELEMETRY_COMMAND", defaults.telemetry_command),
            telemetry_timeout: seconds("TELEMETRY_TIMEOUT_SECS", defaults.telemetry_timeout)?,
            busy,
            device_roles: match lookup("GPU_ROLES") {
                Some(raw) => parse_roles(&raw)?,
                None => defaults.device_roles,
            },
        })
    }

    /// Wall-clock budget of one completion wait, saturating at
    /// `Duration::MAX`.
    pub fn poll_deadline(&self) -> Duration {
        self.poll_interval.saturating_mul(self.poll_max_attempts)
    }
}

fn percent(value: u64, key: &'static str) -> Result<u32, ConfigError> {
    if value > 100 {
        return Err(ConfigError::OutOfRange {
            key,
            reason: "must be between 0 and 100",
        });
    }
    Ok(value as u32)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<FactoryConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FactoryConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, FactoryConfig::default());
        assert_eq!(config.poll_deadline(), Duration::from_secs(600));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("COMFYUI_URL", "http://gpu-box:8188/"),
            ("POLL_INTERVAL_SECS", "2"),
            ("POLL_MAX_ATTEMPTS", "10"),
            ("BUSY_UTILIZATION_PERCENT", "70"),
        ])
        .unwrap();
        assert_eq!(config.engine_url, "http://gpu-box:8188");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_max_attempts, 10);
        assert_eq!(config.busy.utilization_percent, 70);
        assert_eq!(config.busy.memory_percent, 80);
    }

    #[test]
    fn invalid_number_is_reported() {
        assert_eq!(
            load(&[("POLL_INTERVAL_SECS", "soon")]),
            Err(ConfigError::InvalidNumber {
                key: "POLL_INTERVAL_SECS",
                value: "soon".into()
            })
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            load(&[("POLL_INTERVAL_SECS", "0")]),
            Err(ConfigError::OutOfRange { key: "POLL_INTERVAL_SECS", .. })
        ));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(matches!(
            load(&[("POLL_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::OutOfRange { key: "POLL_MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for key in ["SUBMIT_TIMEOUT_SECS", "PROBE_TIMEOUT_SECS", "TELEMETRY_TIMEOUT_SECS"] {
            assert_eq!(
                load(&[(key, "0")]),
                Err(ConfigError::OutOfRange {
                    key,
                    reason: "must be at least 1"
                })
            );
        }
    }

    #[test]
    fn huge_interval_saturates_deadline() {
        let max = u64::MAX.to_string();
        let config = load(&[("POLL_INTERVAL_SECS", max.as_str())]).unwrap();
        assert_eq!(config.poll_deadline(), Duration::MAX);
    }

    #[test]
    fn gpu_roles_are_loaded() {
        let config = load(&[("GPU_ROLES", "0:primary:comfyui,4:worker:tts")]).unwrap();
        assert_eq!(config.device_roles.len(), 2);
        assert_eq!(config.device_roles[&0].role, "primary");
        assert_eq!(config.device_roles[&4].service.as_deref(), Some("tts"));
    }

    #[test]
    fn malformed_gpu_roles_are_rejected() {
        assert!(matches!(
            load(&[("GPU_ROLES", "primary:0")]),
            Err(ConfigError::InvalidRoles(_))
        ));
    }

    #[test]
    fn percentage_above_100_is_rejected() {
        assert!(matches!(
            load(&[("BUSY_MEMORY_PERCENT", "120")]),
            Err(ConfigError::OutOfRange { key: "BUSY_MEMORY_PERCENT", .. })
        ));
    }
}
