use crate::graph::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid job graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Workflow file is not a job graph: {0}")]
    InvalidWorkflow(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
