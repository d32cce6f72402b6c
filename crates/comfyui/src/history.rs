//! History store model.
//!
//! `GET /history/{prompt_id}` answers `{}` until the job reaches a
//! terminal state, then `{"<prompt_id>": {"status": {..}, "outputs": {..}}}`.
//! The history is the only source the poller trusts for terminal states.

use std::collections::HashMap;

use serde::Deserialize;

use crate::job::{JobHandle, JobOutputs};
use crate::messages::{failure_diagnostic, lenient_messages, StatusMessage};

/// `status_str` of a successful job.
pub const STATUS_SUCCESS: &str = "success";
/// `status_str` of a failed job.
pub const STATUS_ERROR: &str = "error";

/// Raw `/history/{id}` response body.
pub type HistoryResponse = HashMap<String, HistoryEntry>;

/// One job's record in the history store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    #[serde(default)]
    pub outputs: JobOutputs,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient_messages")]
    pub messages: Vec<StatusMessage>,
}

/// What a history entry says about the job.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Succeeded(JobOutputs),
    Failed { diagnostic: String },
    /// Present in history but with an intermediate status.
    InProgress,
}

impl HistoryEntry {
    pub fn status_str(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.status_str.as_deref())
    }

    /// Classify by `status_str`; anything other than `success`/`error`
    /// is still in progress.
    pub fn outcome(self) -> HistoryOutcome {
        let HistoryEntry { status, outputs } = self;
        let status = status.unwrap_or_default();
        match status.status_str.as_deref() {
            Some(STATUS_SUCCESS) => HistoryOutcome::Succeeded(outputs),
            Some(STATUS_ERROR) => HistoryOutcome::Failed {
                diagnostic: failure_diagnostic(&status.messages),
            },
            _ => HistoryOutcome::InProgress,
        }
    }
}

/// Pick the entry for `handle` out of a history response body.
///
/// A `null` body is treated like `{}`.
pub fn entry_for(body: Option<HistoryResponse>, handle: &JobHandle) -> Option<HistoryEntry> {
    body.and_then(|mut map| map.remove(handle.as_str()))
}
