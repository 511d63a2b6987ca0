//! Test doubles shared by the core unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use freshflow_types::error::RepositoryError;
use freshflow_types::state::{ErrorPayload, ModuleStatus, WorkflowRunStatus, WorkflowState};
use serde_json::Value;

use crate::repository::StateStore;

/// State store keeping runs in a map and logging every module update.
#[derive(Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<String, WorkflowState>>,
    pub module_updates: Mutex<Vec<(String, ModuleStatus, Option<Value>)>>,
}

impl StateStore for MemoryStore {
    async fn initialize_workflow(
        &self,
        workflow_id: &str,
        module_ids: &[String],
    ) -> Result<(), RepositoryError> {
        self.states.lock().unwrap().insert(
            workflow_id.to_string(),
            WorkflowState::new(workflow_id, module_ids.iter().cloned()),
        );
        Ok(())
    }

    async fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowRunStatus,
        error: Option<ErrorPayload>,
    ) -> Result<(), RepositoryError> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .get_mut(workflow_id)
            .ok_or_else(|| RepositoryError::WorkflowNotFound(workflow_id.to_string()))?;
        state.status = status;
        state.error = error;
        Ok(())
    }

    async fn update_module_status(
        &self,
        workflow_id: &str,
        module_id: &str,
        status: ModuleStatus,
        _brief_output: Option<Value>,
        detailed_output: Option<Value>,
    ) -> Result<(), RepositoryError> {
        if let Some(state) = self.states.lock().unwrap().get_mut(workflow_id) {
            match status {
                ModuleStatus::Completed => state.summary.completed_modules += 1,
                ModuleStatus::Failed => state.summary.failed_modules += 1,
                _ => {}
            }
        }
        self.module_updates
            .lock()
            .unwrap()
            .push((module_id.to_string(), status, detailed_output));
        Ok(())
    }

    async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowState>, RepositoryError> {
        Ok(self.states.lock().unwrap().get(workflow_id).cloned())
    }
}
