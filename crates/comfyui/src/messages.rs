//! Execution status events recorded in a job's history entry.
//!
//! ComfyUI stores the lifecycle events of a prompt in
//! `status.messages` as `[tag, payload]` pairs, e.g.
//! `["execution_error", {"exception_message": "..."}]`. This module
//! deserializes them into a strongly-typed [`ExecutionEvent`] enum and
//! extracts the failure diagnostic the poller reports.

use serde::{Deserialize, Deserializer};

/// Tag of the event carrying an execution failure.
pub const EXECUTION_ERROR: &str = "execution_error";

/// Diagnostic used when an `execution_error` event has no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Diagnostic used when a failed job recorded no `execution_error` event.
pub const WORKFLOW_FAILED: &str = "Workflow failed";

/// One raw `[tag, payload]` entry from `status.messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, serde_json::Value)")]
pub struct StatusMessage {
    pub tag: String,
    pub payload: serde_json::Value,
}

impl From<(String, serde_json::Value)> for StatusMessage {
    fn from((tag, payload): (String, serde_json::Value)) -> Self {
        Self { tag, payload }
    }
}

impl StatusMessage {
    /// Read one entry, tolerating extra elements and a missing payload.
    ///
    /// Returns `None` unless the entry is an array whose first element is
    /// a string tag.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        let serde_json::Value::Array(items) = value else {
            return None;
        };
        let mut items = items.into_iter();
        let tag = match items.next()? {
            serde_json::Value::String(tag) => tag,
            _ => return None,
        };
        Some(Self {
            tag,
            payload: items.next().unwrap_or_default(),
        })
    }

    /// Interpret this entry as a typed event.
    ///
    /// Returns `Err` for unknown tags or payloads of the wrong shape.
    /// Callers should log and continue.
    pub fn parse(&self) -> Result<ExecutionEvent, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "type": self.tag,
            "data": self.payload,
        }))
    }
}

/// All known history status events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionEvent {
    /// The prompt started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(EventMeta),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(CachedData),

    /// Every node finished.
    #[serde(rename = "execution_success")]
    ExecutionSuccess(EventMeta),

    /// The prompt was interrupted before finishing.
    #[serde(rename = "execution_interrupted")]
    ExecutionInterrupted(InterruptedData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

/// Payload shared by start/success events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventMeta {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Payload for `execution_cached` events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CachedData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Node IDs whose outputs were served from cache.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `execution_interrupted` events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InterruptedData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
}

/// Payload for `execution_error` events.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub exception_message: Option<String>,
    #[serde(default)]
    pub exception_type: Option<String>,
}

/// Deserialize `status.messages`, skipping entries that are not
/// `[tag, ...]` arrays. A `null` list is empty.
pub fn lenient_messages<'de, D>(deserializer: D) -> Result<Vec<StatusMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let messages: Vec<StatusMessage> = raw.into_iter().filter_map(StatusMessage::from_value).collect();
    if messages.len() < total {
        tracing::debug!(skipped = total - messages.len(), "Skipped malformed status messages");
    }
    Ok(messages)
}

/// Diagnostic for a failed job: the message of the first
/// `execution_error` event, [`UNKNOWN_ERROR`] if that event has none, or
/// [`WORKFLOW_FAILED`] if there is no such event.
pub fn failure_diagnostic(messages: &[StatusMessage]) -> String {
    let Some(entry) = messages.iter().find(|m| m.tag == EXECUTION_ERROR) else {
        return WORKFLOW_FAILED.to_string();
    };

    match entry.parse() {
        Ok(ExecutionEvent::ExecutionError(ErrorData {
            exception_message: Some(message),
            ..
        })) => message,
        Ok(_) => UNKNOWN_ERROR.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable execution_error payload");
            UNKNOWN_ERROR.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(json: &str) -> Vec<StatusMessage> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_execution_error_message() {
        let msgs = messages(
            r#"[["execution_error", {"prompt_id": "abc", "node_id": "5", "node_type": "KSampler", "exception_message": "out of memory", "exception_type": "RuntimeError"}]]"#,
        );
        match msgs[0].parse().unwrap() {
            ExecutionEvent::ExecutionError(data) => {
                assert_eq!(data.prompt_id.as_deref(), Some("abc"));
                assert_eq!(data.node_id.as_deref(), Some("5"));
                assert_eq!(data.exception_message.as_deref(), Some("out of memory"));
                assert_eq!(data.exception_type.as_deref(), Some("RuntimeError"));
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_cached_without_nodes() {
        let msgs = messages(r#"[["execution_cached", {"prompt_id": "abc"}]]"#);
        match msgs[0].parse().unwrap() {
            ExecutionEvent::ExecutionCached(data) => assert!(data.nodes.is_empty()),
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn parse_start_and_success() {
        let msgs = messages(
            r#"[["execution_start", {"prompt_id": "xyz", "timestamp": 1700000000000}],
                ["execution_success", {"prompt_id": "xyz", "timestamp": 1700000005000}]]"#,
        );
        assert!(matches!(msgs[0].parse(), Ok(ExecutionEvent::ExecutionStart(_))));
        assert!(matches!(msgs[1].parse(), Ok(ExecutionEvent::ExecutionSuccess(_))));
    }

    #[test]
    fn parse_unknown_tag_returns_error() {
        let msgs = messages(r#"[["unknown_thing", {}]]"#);
        assert!(msgs[0].parse().is_err());
    }

    #[test]
    fn diagnostic_is_exception_message_verbatim() {
        let msgs = messages(
            r#"[["execution_start", {"prompt_id": "xyz"}],
                ["execution_error", {"exception_message": "CUDA OOM"}],
                ["execution_error", {"exception_message": "second"}]]"#,
        );
        assert_eq!(failure_diagnostic(&msgs), "CUDA OOM");
    }

    #[test]
    fn diagnostic_without_message_is_unknown_error() {
        let msgs = messages(r#"[["execution_error", {"node_id": "3"}]]"#);
        assert_eq!(failure_diagnostic(&msgs), UNKNOWN_ERROR);
    }

    #[test]
    fn diagnostic_without_error_event_is_generic() {
        let msgs = messages(r#"[["execution_start", {"prompt_id": "xyz"}]]"#);
        assert_eq!(failure_diagnostic(&msgs), WORKFLOW_FAILED);
        assert_eq!(failure_diagnostic(&[]), WORKFLOW_FAILED);
    }
}
