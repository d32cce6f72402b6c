//! Completion polling.
//!
//! Turns the engine's asynchronous queue into a bounded wait. Each tick
//! sleeps for the configured interval, then asks the history store about
//! the job. History alone decides terminal states; the queue is consulted
//! only to enrich progress events.
//!
//! ```text
//!   tick ──→ history absent ──→ Waiting (queue: Pending | Running | Unknown)
//!        ├─→ status "success" ──→ Succeeded   (end)
//!        ├─→ status "error" ────→ Failed      (end)
//!        └─→ other status ──────→ Waiting (Running)
//!   max_attempts ticks without a terminal state ──→ TimedOut (end)
//! ```

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::time::Instant;
use vidfactory_core::config::FactoryConfig;

use crate::error::JobError;
use crate::history::{HistoryEntry, HistoryOutcome};
use crate::job::{JobHandle, JobOutputs, JobState};
use crate::queue::QueueSnapshot;

/// Where the poller reads job progress from.
///
/// Implemented by [`EngineClient`](crate::api::EngineClient); tests use
/// scripted in-memory sources.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    /// The job's history entry, `None` while it has none.
    async fn history(&self, handle: &JobHandle) -> Result<Option<HistoryEntry>, JobError>;

    async fn queue(&self) -> Result<QueueSnapshot, JobError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay before each history query.
    pub interval: Duration,
    /// Number of ticks before giving up.
    pub max_attempts: u32,
    /// Consult the queue while the job has no history entry.
    pub track_queue: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
            track_queue: true,
        }
    }
}

impl PollerConfig {
    pub fn from_factory(config: &FactoryConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.poll_max_attempts,
            ..Self::default()
        }
    }

    /// Total wait budget, saturating at `Duration::MAX`.
    pub fn deadline(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// One observation of a job's progress.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// No terminal state yet.
    Waiting {
        /// 1-based tick number.
        attempt: u32,
        elapsed: Duration,
        /// `None` when the queue was not consulted or could not be read.
        state: Option<JobState>,
        /// Zero-based position among pending jobs.
        queue_position: Option<usize>,
    },
    Succeeded {
        outputs: JobOutputs,
        elapsed: Duration,
    },
    Failed {
        diagnostic: String,
        elapsed: Duration,
    },
    TimedOut {
        handle: JobHandle,
        elapsed: Duration,
    },
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Waiting { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollEvent::Waiting { elapsed, .. }
            | PollEvent::Succeeded { elapsed, .. }
            | PollEvent::Failed { elapsed, .. }
            | PollEvent::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Polls one source for job completion.
///
/// A poller holds no per-job state, so a single instance can wait on
/// several jobs from several tasks.
pub struct Poller<S> {
    source: S,
    config: PollerConfig,
}

impl<S: JobSource> Poller<S> {
    pub fn new(source: S, config: PollerConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Progress events for `handle`, ending after the first terminal event
    /// or the first error.
    ///
    /// Dropping the stream stops polling at the next tick boundary. The
    /// job itself keeps running on the engine.
    pub fn events<'a>(
        &'a self,
        handle: &'a JobHandle,
    ) -> impl Stream<Item = Result<PollEvent, JobError>> + Send + 'a {
        let started = Instant::now();
        stream::unfold(Some(0u32), move |attempt| async move {
            let attempt = attempt?;
            if attempt >= self.config.max_attempts {
                let elapsed = started.elapsed();
                tracing::warn!(
                    handle = %handle,
                    attempts = attempt,
                    elapsed_secs = elapsed.as_secs(),
                    "Job did not finish before the deadline",
                );
                let event = PollEvent::TimedOut {
                    handle: handle.clone(),
                    elapsed,
                };
                return Some((Ok(event), None));
            }

            tokio::time::sleep(self.config.interval).await;
            let attempt = attempt + 1;

            match self.tick(handle, attempt, started).await {
                Ok(event) => {
                    let next = (!event.is_terminal()).then_some(attempt);
                    Some((Ok(event), next))
                }
                Err(e) => {
                    tracing::error!(handle = %handle, attempt, error = %e, "History query failed");
                    Some((Err(e), None))
                }
            }
        })
    }

    /// Wait for `handle` to finish.
    pub async fn wait(&self, handle: &JobHandle) -> Result<JobOutputs, JobError> {
        self.wait_with(handle, |_| {}).await
    }

    /// Like [`wait`](Self::wait), handing every event to `observer` first.
    pub async fn wait_with<F>(&self, handle: &JobHandle, mut observer: F) -> Result<JobOutputs, JobError>
    where
        F: FnMut(&PollEvent),
    {
        let mut events = std::pin::pin!(self.events(handle));
        while let Some(event) = events.next().await {
            let event = event?;
            observer(&event);
            match event {
                PollEvent::Waiting { .. } => {}
                PollEvent::Succeeded { outputs, .. } => return Ok(outputs),
                PollEvent::Failed { diagnostic, .. } => {
                    return Err(JobError::JobFailed { diagnostic })
                }
                PollEvent::TimedOut { handle, elapsed } => {
                    return Err(JobError::JobTimedOut { handle, elapsed })
                }
            }
        }
        Err(JobError::InvalidResponse(format!(
            "polling {handle} ended without a terminal state"
        )))
    }

    // ---- private helpers ----

    async fn tick(
        &self,
        handle: &JobHandle,
        attempt: u32,
        started: Instant,
    ) -> Result<PollEvent, JobError> {
        let entry = self.source.history(handle).await?;
        let elapsed = started.elapsed();

        let Some(entry) = entry else {
            let (state, queue_position) = self.queue_state(handle).await;
            tracing::debug!(
                handle = %handle,
                attempt,
                state = ?state,
                queue_position = ?queue_position,
                "Job not finished",
            );
            return Ok(PollEvent::Waiting {
                attempt,
                elapsed,
                state,
                queue_position,
            });
        };

        Ok(match entry.outcome() {
            HistoryOutcome::Succeeded(outputs) => {
                tracing::info!(
                    handle = %handle,
                    attempt,
                    elapsed_secs = elapsed.as_secs(),
                    outputs = outputs.len(),
                    "Job succeeded",
                );
                PollEvent::Succeeded { outputs, elapsed }
            }
            HistoryOutcome::Failed { diagnostic } => {
                tracing::info!(handle = %handle, attempt, diagnostic = %diagnostic, "Job failed");
                PollEvent::Failed {
                    diagnostic,
                    elapsed,
                }
            }
            HistoryOutcome::InProgress => {
                tracing::debug!(handle = %handle, attempt, "Job in history without a final status");
                PollEvent::Waiting {
                    attempt,
                    elapsed,
                    state: Some(JobState::Running),
                    queue_position: None,
                }
            }
        })
    }

    async fn queue_state(&self, handle: &JobHandle) -> (Option<JobState>, Option<usize>) {
        if !self.config.track_queue {
            return (None, None);
        }
        match self.source.queue().await {
            Ok(queue) => (Some(queue.state_of(handle)), queue.pending_position(handle)),
            Err(e) => {
                tracing::debug!(handle = %handle, error = %e, "Queue query failed");
                (None, None)
            }
        }
    }
}
