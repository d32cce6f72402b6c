//! Parsing of `nvidia-smi --format=csv,noheader,nounits` output.
//!
//! Expected column order: `index, name, memory_used_mb, memory_total_mb,
//! utilization_percent`. Rows that do not fit are dropped individually so
//! one bad line never zeroes the whole result.

use serde::{Deserialize, Serialize};

use super::thresholds::BusyThresholds;

/// Number of columns requested from the telemetry tool.
pub const EXPECTED_COLUMNS: usize = 5;

/// Point-in-time state of one physical GPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub index: u32,
    pub name: String,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub utilization_percent: u32,
    /// Derived from [`BusyThresholds`] at parse time.
    pub busy: bool,
}

impl DeviceStatus {
    /// Memory use as a whole percentage of total (0 when total is unknown).
    pub fn memory_percent(&self) -> u32 {
        if self.memory_total_mb == 0 {
            return 0;
        }
        ((self.memory_used_mb * 100) / self.memory_total_mb) as u32
    }
}

/// Why a single telemetry row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("expected 5 columns, found {0}")]
    TooFewColumns(usize),

    #[error("column {column} is not an integer: {value:?}")]
    NotNumeric { column: &'static str, value: String },
}

/// Result of parsing a whole telemetry dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTelemetry {
    /// Successfully parsed devices, in output order.
    pub devices: Vec<DeviceStatus>,
    /// Number of non-blank rows that were dropped.
    pub rejected: usize,
}

fn numeric<T: std::str::FromStr>(column: &'static str, value: &str) -> Result<T, RowError> {
    value.parse().map_err(|_| RowError::NotNumeric {
        column,
        value: value.to_string(),
    })
}

/// Parse one comma-separated row. Extra trailing columns are ignored.
pub fn parse_device_line(line: &str, thresholds: &BusyThresholds) -> Result<DeviceStatus, RowError> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < EXPECTED_COLUMNS {
        return Err(RowError::TooFewColumns(parts.len()));
    }

    let index = numeric("index", parts[0])?;
    let memory_used_mb = numeric("memory_used_mb", parts[2])?;
    let memory_total_mb = numeric("memory_total_mb", parts[3])?;
    let utilization_percent = numeric("utilization_percent", parts[4])?;

    Ok(DeviceStatus {
        index,
        name: parts[1].to_string(),
        memory_used_mb,
        memory_total_mb,
        utilization_percent,
        busy: thresholds.is_busy(memory_used_mb, memory_total_mb, utilization_percent),
    })
}

/// Parse every non-blank line of `output`, dropping rows that do not fit.
pub fn parse_devices(output: &str, thresholds: &BusyThresholds) -> ParsedTelemetry {
    let mut parsed = ParsedTelemetry::default();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        match parse_device_line(line, thresholds) {
            Ok(device) => parsed.devices.push(device),
            Err(e) => {
                tracing::warn!(error = %e, row = %line, "Dropping unparseable telemetry row");
                parsed.rejected += 1;
            }
        }
    }

    parsed
}
