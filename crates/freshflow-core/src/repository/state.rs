//! Workflow run state store trait definition.
//!
//! The observer layer records module and run status transitions through this
//! trait; status queries read them back. Persistence format is up to the
//! implementation (freshflow-infra ships an in-memory store).

use freshflow_types::error::RepositoryError;
use freshflow_types::state::{ErrorPayload, ModuleStatus, WorkflowRunStatus, WorkflowState};
use serde_json::Value;

/// Storage interface for workflow run state.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait StateStore: Send + Sync {
    /// Create the record for a new run: `PENDING`, with every module
    /// `WAITING`. Re-initializing an existing run replaces it.
    fn initialize_workflow(
        &self,
        workflow_id: &str,
        module_ids: &[String],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Set the run status. Terminal statuses also set the end time.
    fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowRunStatus,
        error: Option<ErrorPayload>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Set a module's status with optional brief and detailed payloads.
    ///
    /// `IN_PROGRESS` sets the start time; `COMPLETED` and `FAILED` set the end
    /// time and bump the run summary counters.
    fn update_module_status(
        &self,
        workflow_id: &str,
        module_id: &str,
        status: ModuleStatus,
        brief_output: Option<Value>,
        detailed_output: Option<Value>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Current state of a run, or `None` if unknown.
    fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowState>, RepositoryError>> + Send;
}
