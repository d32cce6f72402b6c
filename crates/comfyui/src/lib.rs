//! ComfyUI REST client library.
//!
//! Provides job submission, history and queue inspection, a polling
//! state machine that turns the engine's asynchronous queue into a
//! bounded synchronous wait, and a [`JobRunner`](runner::JobRunner)
//! facade that does both.

pub mod api;
pub mod error;
pub mod history;
pub mod job;
pub mod messages;
pub mod poller;
pub mod queue;
pub mod runner;
