//! Workflow definition types.
//!
//! `WorkflowDefinition` is the executable form of a workflow: an ordered task
//! list plus declared outputs. The graph builder produces it from a
//! [`WorkflowConfig`](crate::module::WorkflowConfig); hand-authored
//! definitions deserialize from the same camelCase wire format.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task type assigned to every builder-produced task.
pub const SIMPLE_TASK_TYPE: &str = "SIMPLE";

/// Suffix appended to a module identifier to form its task name.
pub const TASK_NAME_SUFFIX: &str = "_task";

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// An ordered, executable workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,
    /// Definition version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Tasks in declared execution order.
    pub tasks: Vec<Task>,
    /// Named outputs, each a deferred reference resolved after the last task.
    #[serde(rename = "outputParameters", alias = "output_parameters", default)]
    pub outputs: Map<String, Value>,
    /// Reserved name of a workflow to run on failure. Never executed.
    #[serde(
        rename = "failureWorkflow",
        alias = "failure_workflow",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_workflow: Option<String>,
    /// Wire schema version.
    #[serde(
        rename = "schemaVersion",
        alias = "schema_version",
        default = "default_schema_version"
    )]
    pub schema_version: u32,
}

fn default_version() -> u32 {
    1
}

fn default_schema_version() -> u32 {
    2
}

impl WorkflowDefinition {
    /// Look up a task by its reference name.
    pub fn get_task(&self, reference_name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.reference_name == reference_name)
    }

    /// Reference names in declared order.
    pub fn task_refs(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.reference_name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A single executable unit, addressed by `reference_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task name, `<identifier>_task` for builder-produced tasks.
    pub name: String,
    /// Unique address of this task within its workflow.
    #[serde(rename = "taskReferenceName", alias = "reference_name")]
    pub reference_name: String,
    /// Task type (always "SIMPLE" today).
    #[serde(rename = "type", default = "default_task_type")]
    pub task_type: String,
    /// Raw (unresolved) handler inputs.
    #[serde(rename = "inputParameters", alias = "input_parameters", default)]
    pub input_parameters: TaskInput,
}

fn default_task_type() -> String {
    SIMPLE_TASK_TYPE.to_string()
}

/// Handler inputs for one task.
///
/// Before execution `user_config` may hold deferred references; the resolver
/// produces a copy with every reference substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub user_config: Map<String, Value>,
    /// Any other top-level parameters.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskInput {
    /// Look up a `user_config` entry.
    pub fn config(&self, key: &str) -> Option<&Value> {
        self.user_config.get(key)
    }

    /// Look up a string `user_config` entry.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.user_config.get(key).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Task result status
// ---------------------------------------------------------------------------

/// Status reported by a handler in its result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    /// Parse the wire form. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
