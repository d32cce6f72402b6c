//! GPU telemetry, service health probing, and the consolidated status
//! report used to decide where new work can be routed. Also loads
//! exported workflow files for submission.

pub mod aggregator;
pub mod collector;
pub mod display;
pub mod health;
pub mod workflow_file;
