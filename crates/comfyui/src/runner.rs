//! Submit-and-wait facade.

use vidfactory_core::config::FactoryConfig;
use vidfactory_core::graph::JobGraph;

use crate::api::{EngineClient, EngineConfig};
use crate::error::JobError;
use crate::job::{JobHandle, JobOutputs};
use crate::poller::{PollEvent, Poller, PollerConfig};

/// Runs graphs on one engine: validate, submit, then wait.
///
/// Cheap to share behind an `Arc`; every call is independent.
pub struct JobRunner {
    poller: Poller<EngineClient>,
}

impl JobRunner {
    pub fn new(client: EngineClient, config: PollerConfig) -> Self {
        Self {
            poller: Poller::new(client, config),
        }
    }

    pub fn from_config(config: &FactoryConfig) -> Self {
        Self::new(
            EngineClient::new(EngineConfig::from_factory(config)),
            PollerConfig::from_factory(config),
        )
    }

    pub fn client(&self) -> &EngineClient {
        self.poller.source()
    }

    pub fn poller(&self) -> &Poller<EngineClient> {
        &self.poller
    }

    pub async fn submit(&self, graph: &JobGraph) -> Result<JobHandle, JobError> {
        self.client().submit(graph).await
    }

    pub async fn run(&self, graph: &JobGraph) -> Result<(JobHandle, JobOutputs), JobError> {
        self.run_with(graph, |_, _| {}).await
    }

    /// [`run`](Self::run), reporting the handle and every poll event to
    /// `observer`.
    pub async fn run_with<F>(
        &self,
        graph: &JobGraph,
        mut observer: F,
    ) -> Result<(JobHandle, JobOutputs), JobError>
    where
        F: FnMut(&JobHandle, &PollEvent),
    {
        let handle = self.submit(graph).await?;
        let outputs = self
            .poller
            .wait_with(&handle, |event| observer(&handle, event))
            .await?;
        Ok((handle, outputs))
    }
}
