use std::time::Duration;

use vidfactory_core::graph::GraphError;

use crate::job::JobHandle;

/// Errors surfaced by job submission and completion polling.
///
/// Nothing in this crate retries; every variant reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The graph failed client-side validation. No request was sent.
    #[error("Malformed job graph: {0}")]
    MalformedGraph(#[from] GraphError),

    /// The HTTP request itself failed (connection refused, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine did not accept the submission.
    #[error("Engine rejected job ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body, usually the engine's node-level diagnostics.
        body: String,
    },

    /// A status or history query returned a non-2xx status.
    #[error("Engine returned {status} for {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The engine answered with a body we could not interpret.
    #[error("Malformed engine response: {0}")]
    InvalidResponse(String),

    /// The engine ran the graph and reported an execution error.
    #[error("Job failed: {diagnostic}")]
    JobFailed { diagnostic: String },

    /// The deadline passed without a terminal state. The job may still
    /// finish on the engine; polling the same handle again is valid.
    #[error("Job {handle} did not finish within {elapsed:?}")]
    JobTimedOut { handle: JobHandle, elapsed: Duration },
}

impl JobError {
    /// Whether repeating the same call could plausibly succeed.
    ///
    /// Advisory only: retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Transport(_) | JobError::JobTimedOut { .. })
    }
}
