//! Live execution queue.
//!
//! `GET /queue` answers `{"queue_running": [..], "queue_pending": [..]}`
//! where each item is `[number, prompt_id, prompt, extra_data,
//! outputs_to_execute]`. The queue is only used for progress reporting
//! and for telling `Pending`, `Running`, and `Unknown` apart; it never
//! decides a terminal state.

use serde::Deserialize;

use crate::job::{JobHandle, JobState};

/// One queued or running job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<serde_json::Value>")]
pub struct QueueItem {
    /// Engine-assigned ordering number; lower runs first.
    pub number: i64,
    pub handle: JobHandle,
}

impl TryFrom<Vec<serde_json::Value>> for QueueItem {
    type Error = String;

    fn try_from(fields: Vec<serde_json::Value>) -> Result<Self, Self::Error> {
        let number = fields
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "queue item has no numeric priority".to_string())?;
        let handle = fields
            .get(1)
            .and_then(|v| v.as_str())
            .ok_or_else(|| "queue item has no prompt id".to_string())?;
        Ok(Self {
            number,
            handle: JobHandle::from(handle),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub queue_running: Vec<QueueItem>,
    #[serde(default)]
    pub queue_pending: Vec<QueueItem>,
}

impl QueueSnapshot {
    pub fn running_count(&self) -> usize {
        self.queue_running.len()
    }

    pub fn pending_count(&self) -> usize {
        self.queue_pending.len()
    }

    pub fn is_running(&self, handle: &JobHandle) -> bool {
        self.queue_running.iter().any(|item| &item.handle == handle)
    }

    /// Zero-based position of `handle` among pending jobs, ordered by
    /// engine number.
    pub fn pending_position(&self, handle: &JobHandle) -> Option<usize> {
        let mut numbers: Vec<(i64, &JobHandle)> = self
            .queue_pending
            .iter()
            .map(|item| (item.number, &item.handle))
            .collect();
        numbers.sort_by_key(|(number, _)| *number);
        numbers.iter().position(|(_, h)| *h == handle)
    }

    /// `Running`, `Pending`, or `Unknown` for a handle not yet in history.
    pub fn state_of(&self, handle: &JobHandle) -> JobState {
        if self.is_running(handle) {
            JobState::Running
        } else if self.pending_position(handle).is_some() {
            JobState::Pending
        } else {
            JobState::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> QueueSnapshot {
        serde_json::from_str(
            r#"{
                "queue_running": [[3, "run-1", {}, {}, ["9"]]],
                "queue_pending": [[7, "late", {}, {}, []], [5, "early", {}, {}, []]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn counts() {
        let q = snapshot();
        assert_eq!(q.running_count(), 1);
        assert_eq!(q.pending_count(), 2);
    }

    #[test]
    fn pending_position_follows_number_order() {
        let q = snapshot();
        assert_eq!(q.pending_position(&JobHandle::from("early")), Some(0));
        assert_eq!(q.pending_position(&JobHandle::from("late")), Some(1));
        assert_eq!(q.pending_position(&JobHandle::from("run-1")), None);
    }

    #[test]
    fn state_disambiguation() {
        let q = snapshot();
        assert_eq!(q.state_of(&JobHandle::from("run-1")), JobState::Running);
        assert_eq!(q.state_of(&JobHandle::from("late")), JobState::Pending);
        assert_eq!(q.state_of(&JobHandle::from("gone")), JobState::Unknown);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let q: QueueSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(q, QueueSnapshot::default());
    }

    #[test]
    fn malformed_item_is_rejected() {
        assert!(serde_json::from_str::<QueueSnapshot>(r#"{"queue_running": [["x"]]}"#).is_err());
    }
}
