//! Per-run execution state and deferred-reference resolution.
//!
//! `ExecutionState` accumulates each finished task's result document
//! (`{"status": .., "output": {..}}`) and error message. Consumers' inputs are
//! resolved against it just before they run. One instance exists per run and
//! is dropped when the run ends.

use freshflow_types::workflow::TaskInput;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use super::reference::DeferredRef;

/// A deferred reference that cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The producer has not recorded any output in this run.
    #[error("unresolved dependency: no output found for task '{task_ref}'")]
    UnresolvedDependency { task_ref: String },

    /// The producer's result lacks an `output` mapping, or the mapping lacks
    /// the referenced key.
    #[error("missing output key '{key}' in result of task '{task_ref}'")]
    MissingOutputKey { task_ref: String, key: String },
}

/// Run-scoped task outputs and errors.
#[derive(Debug, Default)]
pub struct ExecutionState {
    outputs: IndexMap<String, Value>,
    errors: IndexMap<String, String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task's result document.
    pub fn set_task_output(&mut self, task_ref: impl Into<String>, result: Value) {
        let task_ref = task_ref.into();
        tracing::debug!(task_ref = %task_ref, "recorded task output");
        self.outputs.insert(task_ref, result);
    }

    /// Record a task's error message.
    pub fn set_task_error(&mut self, task_ref: impl Into<String>, error: impl Into<String>) {
        let task_ref = task_ref.into();
        let error = error.into();
        tracing::debug!(task_ref = %task_ref, error = %error, "recorded task error");
        self.errors.insert(task_ref, error);
    }

    pub fn get_task_output(&self, task_ref: &str) -> Option<&Value> {
        self.outputs.get(task_ref)
    }

    pub fn get_task_error(&self, task_ref: &str) -> Option<&str> {
        self.errors.get(task_ref).map(String::as_str)
    }

    /// All recorded outputs, in completion order.
    pub fn outputs(&self) -> &IndexMap<String, Value> {
        &self.outputs
    }

    /// All recorded errors.
    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    /// Consume the state, yielding the recorded outputs.
    pub fn into_outputs(self) -> IndexMap<String, Value> {
        self.outputs
    }

    /// Resolve a single value.
    ///
    /// Non-reference values come back unchanged. The referenced value is
    /// returned exactly as stored; it is not itself resolved further.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ResolveError> {
        let Some(r) = DeferredRef::from_value(value) else {
            return Ok(value.clone());
        };

        let result = self
            .outputs
            .get(r.task_ref)
            .ok_or_else(|| ResolveError::UnresolvedDependency {
                task_ref: r.task_ref.to_string(),
            })?;

        let missing = |key: &str| ResolveError::MissingOutputKey {
            task_ref: r.task_ref.to_string(),
            key: key.to_string(),
        };

        let output = result
            .get("output")
            .filter(|o| o.is_object())
            .ok_or_else(|| missing("output"))?;

        match r.output_key {
            None => Ok(output.clone()),
            Some(key) => output.get(key).cloned().ok_or_else(|| missing(key)),
        }
    }

    /// Resolve a task's raw inputs into the snapshot handed to its handler.
    ///
    /// `module_id` and `identifier` are copied through. Each `user_config`
    /// entry is resolved, descending one level into mapping and list values.
    /// Other top-level parameters are resolved as scalars.
    pub fn resolve_inputs(&self, raw: &TaskInput) -> Result<TaskInput, ResolveError> {
        let mut user_config = Map::with_capacity(raw.user_config.len());
        for (key, value) in &raw.user_config {
            let resolved = match value {
                Value::Object(map) => {
                    let mut nested = Map::with_capacity(map.len());
                    for (k, v) in map {
                        nested.insert(k.clone(), self.resolve_value(v)?);
                    }
                    Value::Object(nested)
                }
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| self.resolve_value(item))
                        .collect::<Result<_, _>>()?,
                ),
                other => self.resolve_value(other)?,
            };
            user_config.insert(key.clone(), resolved);
        }

        let mut extra = Map::with_capacity(raw.extra.len());
        for (key, value) in &raw.extra {
            extra.insert(key.clone(), self.resolve_value(value)?);
        }

        Ok(TaskInput {
            module_id: raw.module_id.clone(),
            identifier: raw.identifier.clone(),
            user_config,
            extra,
        })
    }
}
