//! Pure domain logic for the video factory: job graphs, graph templates,
//! GPU status heuristics, and configuration.
//!
//! Nothing in this crate performs network or process I/O; the engine
//! client lives in `vidfactory-comfyui` and the telemetry/health
//! plumbing in `vidfactory-dispatcher`.

pub mod config;
pub mod error;
pub mod graph;
pub mod hardware;
pub mod types;
pub mod workflow_import;
pub mod workflows;
