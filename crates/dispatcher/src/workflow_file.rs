//! Loading exported workflow files from disk.

use std::path::{Path, PathBuf};

use vidfactory_core::error::CoreError;
use vidfactory_core::graph::JobGraph;
use vidfactory_core::workflow_import::{import_workflow, Replacements};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowFileError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: CoreError,
    },
}

/// Read the workflow at `path`, fill its placeholders and parse it.
pub async fn load_workflow(path: &Path, replacements: &Replacements) -> Result<JobGraph, WorkflowFileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorkflowFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let graph = import_workflow(&text, replacements).map_err(|source| WorkflowFileError::Import {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), nodes = graph.len(), "Workflow loaded");
    Ok(graph)
}
