//! GPU status domain logic.
//!
//! Contains the busy heuristic, the parser for `nvidia-smi` CSV rows,
//! and operator-assigned device roles.
//! All logic in this module is pure (no process execution); the
//! subprocess side lives in the dispatcher crate's collector.

pub mod roles;
pub mod telemetry;
pub mod thresholds;

pub use roles::{parse_roles, DeviceRole, DeviceRoles, RoleError};
pub use telemetry::{parse_device_line, parse_devices, DeviceStatus, ParsedTelemetry, RowError};
pub use thresholds::BusyThresholds;
