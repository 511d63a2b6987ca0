//! In-memory implementation of [`StateStore`].
//!
//! Run records live in a `DashMap` keyed by workflow ID, so concurrent runs
//! update their own entries without contending on a global lock. Nothing
//! survives the process.

use chrono::Utc;
use dashmap::DashMap;
use freshflow_core::repository::StateStore;
use freshflow_types::error::RepositoryError;
use freshflow_types::state::{ErrorPayload, ModuleStatus, WorkflowRunStatus, WorkflowState};
use serde_json::Value;

/// Process-local state store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    runs: DashMap<String, WorkflowState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs recorded.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Forget a run. Returns the last recorded state, if any.
    pub fn remove(&self, workflow_id: &str) -> Option<WorkflowState> {
        self.runs.remove(workflow_id).map(|(_, state)| state)
    }
}

impl StateStore for InMemoryStateStore {
    async fn initialize_workflow(
        &self,
        workflow_id: &str,
        module_ids: &[String],
    ) -> Result<(), RepositoryError> {
        let state = WorkflowState::new(workflow_id, module_ids.iter().cloned());
        if self.runs.insert(workflow_id.to_string(), state).is_some() {
            tracing::warn!(workflow_id, "re-initialized existing workflow state");
        }
        tracing::debug!(workflow_id, modules = module_ids.len(), "workflow state initialized");
        Ok(())
    }

    async fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowRunStatus,
        error: Option<ErrorPayload>,
    ) -> Result<(), RepositoryError> {
        let mut state = self
            .runs
            .get_mut(workflow_id)
            .ok_or_else(|| RepositoryError::WorkflowNotFound(workflow_id.to_string()))?;

        state.status = status;
        if error.is_some() {
            state.error = error;
        }
        if status.is_terminal() {
            state.end_time = Some(Utc::now());
        }
        tracing::debug!(workflow_id, %status, "workflow status updated");
        Ok(())
    }

    async fn update_module_status(
        &self,
        workflow_id: &str,
        module_id: &str,
        status: ModuleStatus,
        brief_output: Option<Value>,
        detailed_output: Option<Value>,
    ) -> Result<(), RepositoryError> {
        let mut entry = self
            .runs
            .get_mut(workflow_id)
            .ok_or_else(|| RepositoryError::WorkflowNotFound(workflow_id.to_string()))?;
        let state = &mut *entry;

        let module = state
            .modules
            .get_mut(module_id)
            .ok_or_else(|| RepositoryError::ModuleNotFound {
                workflow_id: workflow_id.to_string(),
                module_id: module_id.to_string(),
            })?;

        module.status = status;
        if brief_output.is_some() {
            module.brief_output = brief_output;
        }
        if detailed_output.is_some() {
            module.detailed_output = detailed_output;
        }

        match status {
            ModuleStatus::InProgress => module.start_time = Some(Utc::now()),
            ModuleStatus::Completed => {
                module.end_time = Some(Utc::now());
                state.summary.completed_modules += 1;
            }
            ModuleStatus::Failed => {
                module.end_time = Some(Utc::now());
                state.summary.failed_modules += 1;
            }
            ModuleStatus::Waiting => {}
        }

        tracing::debug!(workflow_id, module_id, %status, "module status updated");
        Ok(())
    }

    async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowState>, RepositoryError> {
        Ok(self.runs.get(workflow_id).map(|s| s.clone()))
    }
}
