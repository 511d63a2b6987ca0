//! Run and module state records.
//!
//! `WorkflowState` is what the state store keeps per workflow run: the
//! overall status, per-module status history, and summary counters.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle of one workflow run: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowRunStatus::Pending => "PENDING",
            WorkflowRunStatus::Running => "RUNNING",
            WorkflowRunStatus::Completed => "COMPLETED",
            WorkflowRunStatus::Failed => "FAILED",
        }
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowRunStatus::Completed | WorkflowRunStatus::Failed)
    }
}

impl fmt::Display for WorkflowRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one module within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    Waiting,
    InProgress,
    Completed,
    Failed,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Waiting => "WAITING",
            ModuleStatus::InProgress => "IN_PROGRESS",
            ModuleStatus::Completed => "COMPLETED",
            ModuleStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error payload
// ---------------------------------------------------------------------------

/// Where a reported error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModuleError,
    WorkflowError,
}

/// Structured `{message, type}` error surfaced to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ErrorPayload {
    pub fn workflow(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::WorkflowError,
        }
    }

    pub fn module(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::ModuleError,
        }
    }
}

// ---------------------------------------------------------------------------
// State records
// ---------------------------------------------------------------------------

/// Per-run module counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_modules: usize,
    pub completed_modules: usize,
    pub failed_modules: usize,
}

/// Status history of one module within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    pub status: ModuleStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub brief_output: Option<Value>,
    pub detailed_output: Option<Value>,
}

impl ModuleState {
    pub fn waiting() -> Self {
        Self {
            status: ModuleStatus::Waiting,
            start_time: None,
            end_time: None,
            brief_output: None,
            detailed_output: None,
        }
    }
}

/// Everything the state store records about one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub status: WorkflowRunStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Module states in configuration order.
    pub modules: IndexMap<String, ModuleState>,
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl WorkflowState {
    /// Fresh state for a run: `Pending`, every module `Waiting`.
    pub fn new<I, S>(workflow_id: impl Into<String>, module_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules: IndexMap<String, ModuleState> = module_ids
            .into_iter()
            .map(|id| (id.into(), ModuleState::waiting()))
            .collect();
        Self {
            workflow_id: workflow_id.into(),
            status: WorkflowRunStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            summary: RunSummary {
                total_modules: modules.len(),
                ..Default::default()
            },
            modules,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_marks_modules_waiting() {
        let state = WorkflowState::new("wf-1", ["a", "b"]);
        assert_eq!(state.status, WorkflowRunStatus::Pending);
        assert_eq!(state.summary.total_modules, 2);
        assert_eq!(state.summary.completed_modules, 0);
        assert!(state
            .modules
            .values()
            .all(|m| m.status == ModuleStatus::Waiting));
    }

    #[test]
    fn status_wire_forms() {
        assert_eq!(
            serde_json::to_string(&ModuleStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowRunStatus::Running).unwrap(),
            "\"RUNNING\""
        );
        assert_eq!(ModuleStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!WorkflowRunStatus::Pending.is_terminal());
        assert!(!WorkflowRunStatus::Running.is_terminal());
        assert!(WorkflowRunStatus::Completed.is_terminal());
        assert!(WorkflowRunStatus::Failed.is_terminal());
    }

    #[test]
    fn error_payload_serializes_type_field() {
        let value = serde_json::to_value(ErrorPayload::workflow("boom")).unwrap();
        assert_eq!(value["message"], "boom");
        assert_eq!(value["type"], "workflow_error");
    }
}
