//! REST client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval, queue inspection, and
//! the system stats probe using [`reqwest`]. The client holds no job
//! state; one instance can serve any number of concurrent jobs.

use std::time::Duration;

use serde::Deserialize;
use vidfactory_core::config::FactoryConfig;
use vidfactory_core::graph::JobGraph;

use crate::error::JobError;
use crate::history::{entry_for, HistoryEntry, HistoryOutcome, HistoryResponse};
use crate::job::{JobHandle, JobState};
use crate::poller::JobSource;
use crate::queue::QueueSnapshot;

/// Connection settings for one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base HTTP URL, e.g. `http://host:8188`, without trailing slash.
    pub base_url: String,
    /// Sent as `client_id` with every submission.
    pub client_id: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_factory(config: &FactoryConfig) -> Self {
        Self {
            request_timeout: config.submit_timeout,
            ..Self::new(config.engine_url.clone(), config.client_id.clone())
        }
    }
}

/// Response returned by `/prompt` after queuing a workflow.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    prompt_id: Option<String>,
    #[serde(default)]
    number: Option<i64>,
}

/// `/system_stats` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub devices: Vec<EngineDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub comfyui_version: Option<String>,
    #[serde(default)]
    pub python_version: Option<String>,
}

/// A compute device as the engine sees it. Memory figures are bytes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineDevice {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub vram_total: Option<u64>,
    #[serde(default)]
    pub vram_free: Option<u64>,
}

impl SystemStats {
    pub fn first_device(&self) -> Option<&EngineDevice> {
        self.devices.first()
    }
}

impl EngineDevice {
    pub fn vram_free_mb(&self) -> Option<u64> {
        self.vram_free.map(|bytes| bytes / (1024 * 1024))
    }
}

/// HTTP client for a single engine instance.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: reqwest::Client,
    config: EngineConfig,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling across
    /// several engines).
    pub fn with_client(client: reqwest::Client, config: EngineConfig) -> Self {
        Self { client, config }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit a graph for execution.
    ///
    /// The graph is validated first; a malformed graph never reaches the
    /// engine. Sends one `POST /prompt` and returns the engine's
    /// `prompt_id`. Nothing is retried.
    pub async fn submit(&self, graph: &JobGraph) -> Result<JobHandle, JobError> {
        graph.validate()?;

        let body = serde_json::json!({
            "prompt": graph,
            "client_id": self.config.client_id,
        });

        let response = self
            .client
            .post(self.url("/prompt"))
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            tracing::warn!(status = status.as_u16(), "Engine rejected submission");
            return Err(JobError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: SubmitResponse = parse_json("/prompt", &text)?;
        let handle = parsed
            .prompt_id
            .filter(|id| !id.is_empty())
            .map(JobHandle::from)
            .ok_or_else(|| {
                JobError::InvalidResponse(format!("/prompt response has no prompt_id: {text}"))
            })?;

        tracing::info!(
            handle = %handle,
            queue_number = ?parsed.number,
            nodes = graph.len(),
            "Job submitted",
        );
        Ok(handle)
    }

    /// Fetch the raw history record for a job, `None` while the job has
    /// not reached a terminal state.
    pub async fn history(&self, handle: &JobHandle) -> Result<Option<HistoryEntry>, JobError> {
        let endpoint = format!("/history/{handle}");
        let text = self.get_text(&endpoint).await?;
        let body: Option<HistoryResponse> = parse_json(&endpoint, &text)?;
        Ok(entry_for(body, handle))
    }

    pub async fn queue(&self) -> Result<QueueSnapshot, JobError> {
        let text = self.get_text("/queue").await?;
        parse_json("/queue", &text)
    }

    pub async fn system_stats(&self) -> Result<SystemStats, JobError> {
        let text = self.get_text("/system_stats").await?;
        parse_json("/system_stats", &text)
    }

    /// Current state of a job: history decides terminal states, the queue
    /// tells `Pending`, `Running`, and `Unknown` apart.
    pub async fn job_state(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        if let Some(entry) = self.history(handle).await? {
            return Ok(match entry.outcome() {
                HistoryOutcome::Succeeded(outputs) => JobState::Succeeded { outputs },
                HistoryOutcome::Failed { diagnostic } => JobState::Failed { diagnostic },
                HistoryOutcome::InProgress => JobState::Running,
            });
        }
        Ok(self.queue().await?.state_of(handle))
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn get_text(&self, endpoint: &str) -> Result<String, JobError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = ensure_success(endpoint, response).await?;
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl JobSource for EngineClient {
    async fn history(&self, handle: &JobHandle) -> Result<Option<HistoryEntry>, JobError> {
        EngineClient::history(self, handle).await
    }

    async fn queue(&self) -> Result<QueueSnapshot, JobError> {
        EngineClient::queue(self).await
    }
}

/// Return the response unchanged on a 2xx status, otherwise
/// [`JobError::UnexpectedStatus`] carrying the body text.
async fn ensure_success(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, JobError> {
    let status = response.status();
    if !status.is_success() {
        return Err(JobError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: read_body(response).await,
        });
    }
    Ok(response)
}

async fn read_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

fn parse_json<T: serde::de::DeserializeOwned>(endpoint: &str, text: &str) -> Result<T, JobError> {
    serde_json::from_str(text)
        .map_err(|e| JobError::InvalidResponse(format!("{endpoint}: {e}")))
}
