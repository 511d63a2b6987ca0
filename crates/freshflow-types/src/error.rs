use thiserror::Error;

/// Errors from state store operations (used by trait definitions in freshflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("module {module_id} not found in workflow {workflow_id}")]
    ModuleNotFound {
        workflow_id: String,
        module_id: String,
    },
}
