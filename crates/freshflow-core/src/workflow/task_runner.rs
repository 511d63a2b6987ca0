//! Task runner: handler lookup, invocation, and result-contract enforcement.
//!
//! Handler resolution tries, in order:
//! 1. the task name without its `_task` suffix
//! 2. that name with every `_` removed
//! 3. the `identifier` carried by the resolved inputs
//!
//! The runner never retries. A `FAILED` result, a contract violation, or a
//! handler error all surface as a [`TaskError`].

use std::sync::Arc;

use freshflow_types::workflow::{TASK_NAME_SUFFIX, Task, TaskInput, TaskStatus};
use thiserror::Error;

use super::handler::{BoxTaskHandler, ContractViolation, HandlerRegistry, HandlerResult};
use super::resolver::ResolveError;

/// Message used when a `FAILED` result carries no `error`.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Errors from running a single task. All of these render as task execution
/// errors.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No handler matched any fallback name.
    #[error("task execution error: no handler found for task type: {task_name}")]
    HandlerNotFound { task_name: String },

    /// The handler's result does not follow the `{status, output}` contract.
    #[error("task execution error: task '{task_ref}' returned an invalid result: {source}")]
    ContractViolation {
        task_ref: String,
        source: ContractViolation,
    },

    /// The handler reported `FAILED`.
    #[error("task execution error: task '{task_ref}' failed: {message}")]
    Failed { task_ref: String, message: String },

    /// The handler returned an error instead of a result.
    #[error("task execution error: task '{task_ref}' handler error: {message}")]
    Handler { task_ref: String, message: String },

    /// The task's inputs could not be resolved.
    #[error("task execution error: could not resolve inputs of task '{task_ref}': {source}")]
    Resolve {
        task_ref: String,
        source: ResolveError,
    },
}

/// Dispatches tasks to handlers from a shared, frozen registry.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    registry: Arc<HandlerRegistry>,
}

impl TaskRunner {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Find a handler for `task_name`, returning it with the identifier that
    /// matched.
    pub fn resolve_handler(
        &self,
        task_name: &str,
        inputs: &TaskInput,
    ) -> Result<(String, BoxTaskHandler), TaskError> {
        let mut candidates = name_candidates(task_name);
        if let Some(identifier) = inputs.identifier.as_deref() {
            candidates.push(identifier.to_string());
        }

        for candidate in candidates {
            if let Ok(handler) = self.registry.get(&candidate) {
                return Ok((candidate, handler));
            }
        }

        Err(TaskError::HandlerNotFound {
            task_name: task_name.to_string(),
        })
    }

    /// Whether a handler exists for `task_name` by name alone.
    pub fn validate_handler_exists(&self, task_name: &str) -> bool {
        name_candidates(task_name)
            .iter()
            .any(|candidate| self.registry.contains(candidate))
    }

    /// Run `task` with already-resolved `inputs` and enforce the result
    /// contract.
    ///
    /// Returns the `COMPLETED` result; every other outcome is an error.
    pub async fn execute_task(
        &self,
        task: &Task,
        inputs: &TaskInput,
    ) -> Result<HandlerResult, TaskError> {
        let task_ref = task.reference_name.as_str();
        let (handler_name, handler) = self.resolve_handler(&task.name, inputs)?;

        tracing::info!(task_ref, handler = %handler_name, "executing task");

        let raw = handler
            .execute(inputs)
            .await
            .map_err(|e| TaskError::Handler {
                task_ref: task_ref.to_string(),
                message: format!("{e:#}"),
            })?;

        let result = HandlerResult::from_value(raw).map_err(|source| {
            TaskError::ContractViolation {
                task_ref: task_ref.to_string(),
                source,
            }
        })?;

        match result.status {
            TaskStatus::Completed => {
                tracing::info!(task_ref, "task completed");
                Ok(result)
            }
            TaskStatus::Failed => {
                let message = result
                    .error_message()
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                tracing::warn!(task_ref, error = %message, "task reported failure");
                Err(TaskError::Failed {
                    task_ref: task_ref.to_string(),
                    message,
                })
            }
        }
    }
}

/// Name-derived handler identifiers for a task name.
fn name_candidates(task_name: &str) -> Vec<String> {
    let base = task_name.strip_suffix(TASK_NAME_SUFFIX).unwrap_or(task_name);
    let compact = base.replace('_', "");
    if compact == base {
        vec![base.to_string()]
    } else {
        vec![base.to_string(), compact]
    }
}
