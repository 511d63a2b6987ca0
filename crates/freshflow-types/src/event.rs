//! Lifecycle events streamed to live listeners.
//!
//! A `WorkflowEvent` is created by an observer callback, published once on the
//! event bus, and delivered best-effort to every live mailbox for its
//! workflow ID. Events are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{ErrorPayload, ModuleStatus, RunSummary, WorkflowRunStatus};

/// Which entity an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ModuleUpdate,
    WorkflowUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ModuleUpdate => "module_update",
            EventType::WorkflowUpdate => "workflow_update",
        }
    }
}

/// A module or workflow status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Module status for `module_update`, run status for `workflow_update`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    /// Stamped by the event bus at publish time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WorkflowEvent {
    /// A `module_update` event.
    pub fn module_update(
        workflow_id: impl Into<String>,
        module_id: impl Into<String>,
        status: ModuleStatus,
        brief_output: Option<Value>,
    ) -> Self {
        Self {
            event_type: EventType::ModuleUpdate,
            workflow_id: workflow_id.into(),
            module_id: Some(module_id.into()),
            status: status.as_str().to_string(),
            brief_output,
            summary: None,
            error: None,
            timestamp: None,
        }
    }

    /// A `workflow_update` event.
    pub fn workflow_update(
        workflow_id: impl Into<String>,
        status: WorkflowRunStatus,
        summary: Option<RunSummary>,
        error: Option<ErrorPayload>,
    ) -> Self {
        Self {
            event_type: EventType::WorkflowUpdate,
            workflow_id: workflow_id.into(),
            module_id: None,
            status: status.as_str().to_string(),
            brief_output: None,
            summary,
            error,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn module_update_serializes_wire_shape() {
        let event = WorkflowEvent::module_update(
            "wf-1",
            "chunker",
            ModuleStatus::InProgress,
            Some(json!({"message": "Starting module chunker"})),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "module_update");
        assert_eq!(value["module_id"], "chunker");
        assert_eq!(value["status"], "IN_PROGRESS");
        assert!(value.get("summary").is_none());
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn workflow_update_carries_error() {
        let event = WorkflowEvent::workflow_update(
            "wf-1",
            WorkflowRunStatus::Failed,
            None,
            Some(ErrorPayload::workflow("boom")),
        );
        assert_eq!(event.event_type.as_str(), "workflow_update");
        assert_eq!(event.status, "FAILED");
        assert!(event.module_id.is_none());
        assert_eq!(event.error.unwrap().message, "boom");
    }
}
