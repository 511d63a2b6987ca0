//! Run observer that records status in a state store and publishes events.
//!
//! One `StateObserver` serves any number of runs: every callback carries the
//! workflow ID. Store failures are logged and never interrupt the run; the
//! matching event is published regardless.

use std::sync::Arc;

use freshflow_types::event::WorkflowEvent;
use freshflow_types::state::{ErrorKind, ErrorPayload, ModuleStatus, WorkflowRunStatus};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value, json};

use super::engine::RunObserver;
use crate::event::EventBus;
use crate::repository::StateStore;

/// Bridges engine callbacks to a [`StateStore`] and an [`EventBus`].
pub struct StateObserver<S> {
    store: Arc<S>,
    bus: Arc<EventBus>,
}

impl<S: StateStore> StateObserver<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    async fn record_module(
        &self,
        workflow_id: &str,
        module_id: &str,
        status: ModuleStatus,
        brief: Value,
        detailed: Option<Value>,
    ) {
        if let Err(e) = self
            .store
            .update_module_status(workflow_id, module_id, status, Some(brief.clone()), detailed)
            .await
        {
            tracing::error!(workflow_id, module_id, error = %e, "failed to record module status");
        }
        self.bus.publish(
            workflow_id,
            WorkflowEvent::module_update(workflow_id, module_id, status, Some(brief)),
        );
    }
}

impl<S: StateStore + 'static> RunObserver for StateObserver<S> {
    fn on_module_start<'a>(&'a self, workflow_id: &'a str, module_id: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let brief = json!({"message": format!("Starting module {module_id}")});
            self.record_module(workflow_id, module_id, ModuleStatus::InProgress, brief, None)
                .await;
            tracing::info!(workflow_id, module_id, "module started");
        })
    }

    fn on_module_complete<'a>(
        &'a self,
        workflow_id: &'a str,
        module_id: &'a str,
        result: &'a Value,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let brief = brief_output(module_id, result);
            self.record_module(
                workflow_id,
                module_id,
                ModuleStatus::Completed,
                brief,
                Some(result.clone()),
            )
            .await;
            tracing::info!(workflow_id, module_id, "module completed");
        })
    }

    fn on_module_error<'a>(
        &'a self,
        workflow_id: &'a str,
        module_id: &'a str,
        error: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let brief = json!({"message": "Module execution failed", "error": error});
            let detailed = json!({"error": error, "type": ErrorKind::ModuleError});
            self.record_module(
                workflow_id,
                module_id,
                ModuleStatus::Failed,
                brief,
                Some(detailed),
            )
            .await;
            tracing::error!(workflow_id, module_id, error, "module failed");
        })
    }

    fn on_workflow_complete<'a>(
        &'a self,
        workflow_id: &'a str,
        _outputs: &'a Map<String, Value>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(e) = self
                .store
                .update_workflow_status(workflow_id, WorkflowRunStatus::Completed, None)
                .await
            {
                tracing::error!(workflow_id, error = %e, "failed to record workflow completion");
            }

            let summary = match self.store.get_workflow_status(workflow_id).await {
                Ok(state) => state.map(|s| s.summary),
                Err(e) => {
                    tracing::error!(workflow_id, error = %e, "failed to read workflow summary");
                    None
                }
            };

            self.bus.publish(
                workflow_id,
                WorkflowEvent::workflow_update(workflow_id, WorkflowRunStatus::Completed, summary, None),
            );
            tracing::info!(workflow_id, "workflow completed");
        })
    }

    fn on_workflow_error<'a>(&'a self, workflow_id: &'a str, error: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let payload = ErrorPayload::workflow(error);
            if let Err(e) = self
                .store
                .update_workflow_status(workflow_id, WorkflowRunStatus::Failed, Some(payload.clone()))
                .await
            {
                tracing::error!(workflow_id, error = %e, "failed to record workflow failure");
            }

            self.bus.publish(
                workflow_id,
                WorkflowEvent::workflow_update(workflow_id, WorkflowRunStatus::Failed, None, Some(payload)),
            );
            tracing::error!(workflow_id, error, "workflow failed");
        })
    }
}

/// Short summary of a completed module for status views and events.
///
/// Surfaces well-known metrics from the task's `output` mapping: `size`
/// (`content_length`), `chunks` (`total_chunks`), `tokens` (`total_tokens`),
/// and `embeddings_count` (length of `embeddings`).
pub fn brief_output(module_id: &str, result: &Value) -> Value {
    let mut brief = Map::new();
    brief.insert(
        "message".to_string(),
        Value::String(format!("Module {module_id} completed successfully")),
    );

    let output = result.get("output").filter(|o| o.is_object()).unwrap_or(result);
    for (source, target) in [
        ("content_length", "size"),
        ("total_chunks", "chunks"),
        ("total_tokens", "tokens"),
    ] {
        if let Some(v) = output.get(source) {
            brief.insert(target.to_string(), v.clone());
        }
    }
    if let Some(embeddings) = output.get("embeddings") {
        let count = match embeddings {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::String(s) => s.chars().count(),
            _ => 0,
        };
        brief.insert("embeddings_count".to_string(), json!(count));
    }

    Value::Object(brief)
}
