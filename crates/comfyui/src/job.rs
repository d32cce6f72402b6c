//! Job identity, lifecycle state, and produced artifacts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque job identifier assigned by the engine at submission
/// (ComfyUI's `prompt_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job as seen from the client.
///
/// ```text
///   submit() ──→ Pending ──→ Running ──→ Succeeded
///                                  └───→ Failed
/// ```
///
/// `Unknown` means the handle is in neither the queue nor the history
/// (the engine restarted, or the two stores have not caught up yet).
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded { outputs: JobOutputs },
    Failed { diagnostic: String },
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded { .. } => write!(f, "succeeded"),
            JobState::Failed { diagnostic } => write!(f, "failed: {diagnostic}"),
            JobState::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Per-node outputs of a finished job, exactly as the engine reported
/// them. Use [`artifacts`](Self::artifacts) for a flat, typed view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobOutputs(BTreeMap<String, serde_json::Value>);

impl JobOutputs {
    pub fn new(outputs: BTreeMap<String, serde_json::Value>) -> Self {
        Self(outputs)
    }

    pub fn get(&self, node_id: &str) -> Option<&serde_json::Value> {
        self.0.get(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> BTreeMap<String, serde_json::Value> {
        self.0
    }

    /// Every file descriptor (`{"filename": .., "subfolder": .., "type": ..}`)
    /// found in any node's output lists, in node order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        let mut artifacts = Vec::new();
        for (node_id, output) in &self.0 {
            let Some(groups) = output.as_object() else {
                continue;
            };
            for (key, items) in groups {
                let Some(items) = items.as_array() else {
                    continue;
                };
                for item in items {
                    let Some(filename) = item.get("filename").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let text = |field: &str| {
                        item.get(field)
                            .and_then(|v| v.as_str())
                            .filter(|s| !s.is_empty())
                            .map(str::to_owned)
                    };
                    artifacts.push(Artifact {
                        node_id: node_id.clone(),
                        filename: filename.to_string(),
                        subfolder: text("subfolder"),
                        storage: text("type"),
                        kind: ArtifactKind::from_output_key(key),
                    });
                }
            }
        }
        artifacts
    }
}

/// Broad media category of an artifact, derived from the output key the
/// engine filed it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
    Audio,
    Other(String),
}

impl ArtifactKind {
    pub fn from_output_key(key: &str) -> Self {
        match key {
            "images" => ArtifactKind::Image,
            "gifs" | "videos" | "video" => ArtifactKind::Video,
            "audio" => ArtifactKind::Audio,
            other => ArtifactKind::Other(other.to_string()),
        }
    }
}

/// One file produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub node_id: String,
    pub filename: String,
    pub subfolder: Option<String>,
    /// Engine storage area (`output`, `temp`).
    pub storage: Option<String>,
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Path relative to the engine's storage area.
    pub fn relative_path(&self) -> String {
        match &self.subfolder {
            Some(dir) => format!("{dir}/{}", self.filename),
            None => self.filename.clone(),
        }
    }
}
