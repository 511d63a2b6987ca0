//! Workflow engine: drives one run of a workflow definition.
//!
//! Tasks run strictly one at a time in the definition's declared order. Each
//! run owns a fresh [`ExecutionState`]; observers supplied for the run are
//! notified around every task and dropped when the run ends. The first task
//! failure aborts the run.

use std::sync::Arc;

use freshflow_types::state::WorkflowRunStatus;
use freshflow_types::workflow::WorkflowDefinition;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use super::handler::HandlerRegistry;
use super::resolver::{ExecutionState, ResolveError};
use super::task_runner::{TaskError, TaskRunner};

// ---------------------------------------------------------------------------
// Observer contract
// ---------------------------------------------------------------------------

/// Receives lifecycle callbacks for a run.
///
/// The engine calls the module callbacks; whoever owns the run (usually the
/// [`WorkflowManager`](super::manager::WorkflowManager)) calls the workflow
/// callbacks once the run's outcome is known. Implementations must not fail:
/// errors are theirs to log.
pub trait RunObserver: Send + Sync {
    fn on_module_start<'a>(&'a self, workflow_id: &'a str, module_id: &'a str) -> BoxFuture<'a, ()>;

    /// `result` is the task's `{status, output}` document.
    fn on_module_complete<'a>(
        &'a self,
        workflow_id: &'a str,
        module_id: &'a str,
        result: &'a Value,
    ) -> BoxFuture<'a, ()>;

    fn on_module_error<'a>(
        &'a self,
        workflow_id: &'a str,
        module_id: &'a str,
        error: &'a str,
    ) -> BoxFuture<'a, ()>;

    fn on_workflow_complete<'a>(
        &'a self,
        workflow_id: &'a str,
        outputs: &'a Map<String, Value>,
    ) -> BoxFuture<'a, ()>;

    fn on_workflow_error<'a>(&'a self, workflow_id: &'a str, error: &'a str) -> BoxFuture<'a, ()>;
}

// ---------------------------------------------------------------------------
// Result and error types
// ---------------------------------------------------------------------------

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: String,
    pub status: WorkflowRunStatus,
    /// Resolved declared outputs.
    pub outputs: Map<String, Value>,
    /// Every task's `{status, output}` document, in completion order.
    pub task_outputs: IndexMap<String, Value>,
    pub completed_tasks: Vec<String>,
}

/// Run-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A task failed; the run stopped there.
    #[error("task {task_ref} failed: {source}")]
    Task { task_ref: String, source: TaskError },

    /// Every task succeeded but a declared output could not be resolved.
    #[error("workflow execution error: failed to resolve output '{output}': {source}")]
    Output { output: String, source: ResolveError },
}

impl EngineError {
    /// The task that failed, if the run failed inside a task.
    pub fn task_ref(&self) -> Option<&str> {
        match self {
            EngineError::Task { task_ref, .. } => Some(task_ref),
            EngineError::Output { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Sequential workflow executor. Cheap to clone and shareable across runs;
/// all per-run state lives inside [`WorkflowEngine::execute`].
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    runner: TaskRunner,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            runner: TaskRunner::new(registry),
        }
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Run `definition` once to completion or first failure.
    #[tracing::instrument(
        name = "workflow.execute",
        skip(self, definition, observers),
        fields(workflow = %definition.name, tasks = definition.tasks.len())
    )]
    pub async fn execute(
        &self,
        workflow_id: &str,
        definition: &WorkflowDefinition,
        observers: Vec<Arc<dyn RunObserver>>,
    ) -> Result<ExecutionResult, EngineError> {
        let mut state = ExecutionState::new();
        let mut completed_tasks = Vec::with_capacity(definition.tasks.len());

        tracing::info!(status = %WorkflowRunStatus::Running, "workflow run started");

        for task in &definition.tasks {
            let task_ref = task.reference_name.as_str();

            for observer in &observers {
                observer.on_module_start(workflow_id, task_ref).await;
            }

            let outcome = match state.resolve_inputs(&task.input_parameters) {
                Ok(inputs) => self.runner.execute_task(task, &inputs).await,
                Err(source) => Err(TaskError::Resolve {
                    task_ref: task_ref.to_string(),
                    source,
                }),
            };

            match outcome {
                Ok(result) => {
                    state.set_task_output(task_ref, result.to_value());
                    completed_tasks.push(task_ref.to_string());
                    // Observers see the document as recorded.
                    if let Some(document) = state.get_task_output(task_ref) {
                        for observer in &observers {
                            observer
                                .on_module_complete(workflow_id, task_ref, document)
                                .await;
                        }
                    }
                }
                Err(source) => {
                    tracing::error!(task_ref, error = %source, "task failed, aborting run");
                    state.set_task_error(task_ref, source.to_string());
                    let message = state.get_task_error(task_ref).unwrap_or_default();
                    for observer in &observers {
                        observer.on_module_error(workflow_id, task_ref, message).await;
                    }
                    return Err(EngineError::Task {
                        task_ref: task_ref.to_string(),
                        source,
                    });
                }
            }
        }

        let mut outputs = Map::with_capacity(definition.outputs.len());
        for (name, declared) in &definition.outputs {
            let value = state
                .resolve_value(declared)
                .map_err(|source| EngineError::Output {
                    output: name.clone(),
                    source,
                })?;
            outputs.insert(name.clone(), value);
        }

        tracing::info!(
            status = %WorkflowRunStatus::Completed,
            completed = completed_tasks.len(),
            "workflow run finished"
        );

        Ok(ExecutionResult {
            run_id: workflow_id.to_string(),
            status: WorkflowRunStatus::Completed,
            outputs,
            task_outputs: state.into_outputs(),
            completed_tasks,
        })
    }
}
