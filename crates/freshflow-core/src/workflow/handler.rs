//! Task handler contract and the handler registry.
//!
//! Handlers are the pluggable units that do a task's actual work. They are
//! registered by identifier on a [`HandlerRegistryBuilder`] during startup;
//! the frozen [`HandlerRegistry`] is then shared read-only by every run.
//!
//! `TaskHandler` uses RPITIT and is not object-safe, so the registry stores
//! handlers through the object-safe `TaskHandlerDyn` blanket impl, wrapped
//! in [`BoxTaskHandler`].

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use freshflow_types::workflow::{TaskInput, TaskStatus};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Handler contract
// ---------------------------------------------------------------------------

/// A unit of work dispatched by the task runner.
///
/// `execute` receives the fully resolved inputs and returns a result document
/// `{"status": "COMPLETED" | "FAILED", "output": {..}}`. On failure the output
/// should carry an `error` message. Returning `Err` is treated the same as a
/// `FAILED` result.
pub trait TaskHandler: Send + Sync {
    fn execute(&self, inputs: &TaskInput) -> impl Future<Output = anyhow::Result<Value>> + Send;
}

/// Object-safe version of [`TaskHandler`] with a boxed future.
pub trait TaskHandlerDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a TaskInput,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;
}

impl<T: TaskHandler> TaskHandlerDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a TaskInput,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>> {
        Box::pin(self.execute(inputs))
    }
}

/// Type-erased handler instance.
pub struct BoxTaskHandler {
    inner: Box<dyn TaskHandlerDyn>,
}

impl BoxTaskHandler {
    pub fn new<T: TaskHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub async fn execute(&self, inputs: &TaskInput) -> anyhow::Result<Value> {
        self.inner.execute_boxed(inputs).await
    }
}

// ---------------------------------------------------------------------------
// Result document
// ---------------------------------------------------------------------------

/// A handler result that does not follow the `{status, output}` contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler result violates contract: {0}")]
pub struct ContractViolation(pub String);

/// Typed view over a handler's result document.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    pub status: TaskStatus,
    pub output: Option<Value>,
}

impl HandlerResult {
    /// A `COMPLETED` result carrying `output`.
    pub fn completed(output: Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            output: Some(output),
        }
    }

    /// A `FAILED` result with `{"error": message}` as output.
    pub fn failed(message: impl Into<String>) -> Self {
        let mut output = Map::new();
        output.insert("error".to_string(), Value::String(message.into()));
        Self {
            status: TaskStatus::Failed,
            output: Some(Value::Object(output)),
        }
    }

    /// Check a raw result document against the handler contract.
    pub fn from_value(value: Value) -> Result<Self, ContractViolation> {
        let mut doc = match value {
            Value::Object(doc) => doc,
            other => {
                return Err(ContractViolation(format!(
                    "expected a mapping, got {}",
                    json_type_name(&other)
                )));
            }
        };

        let status = match doc.get("status") {
            None => {
                return Err(ContractViolation(
                    "result is missing required 'status' field".to_string(),
                ));
            }
            Some(Value::String(s)) => TaskStatus::parse(s).ok_or_else(|| {
                ContractViolation(format!("unknown status '{s}'"))
            })?,
            Some(other) => {
                return Err(ContractViolation(format!(
                    "'status' must be a string, got {}",
                    json_type_name(other)
                )));
            }
        };

        Ok(Self {
            status,
            output: doc.remove("output"),
        })
    }

    /// The error message of a `FAILED` result, when one was provided.
    pub fn error_message(&self) -> Option<String> {
        let error = self.output.as_ref()?.get("error")?;
        Some(match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// The result document recorded in execution state.
    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(
            "status".to_string(),
            Value::String(self.status.as_str().to_string()),
        );
        if let Some(output) = &self.output {
            doc.insert("output".to_string(), output.clone());
        }
        Value::Object(doc)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup of an unregistered handler identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no handler registered for identifier: {0}")]
    HandlerNotFound(String),
}

type HandlerFactory = Arc<dyn Fn() -> BoxTaskHandler + Send + Sync>;

/// Collects handler registrations before the registry is frozen.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory producing a fresh handler per task execution.
    ///
    /// Registering an identifier twice replaces the earlier factory.
    pub fn register<H, F>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        H: TaskHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        tracing::debug!(identifier = %identifier, "registered task handler");
        self.factories
            .insert(identifier, Arc::new(move || BoxTaskHandler::new(factory())));
        self
    }

    /// Register a handler type constructed with `Default`.
    pub fn register_default<H>(self, identifier: impl Into<String>) -> Self
    where
        H: TaskHandler + Default + 'static,
    {
        self.register(identifier, H::default)
    }

    pub fn build(self) -> HandlerRegistry {
        tracing::info!(handlers = self.factories.len(), "handler registry ready");
        HandlerRegistry {
            factories: self.factories,
        }
    }
}

/// Frozen, read-only mapping from identifier to handler factory.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// Construct a handler for `identifier`.
    pub fn get(&self, identifier: &str) -> Result<BoxTaskHandler, RegistryError> {
        self.factories
            .get(identifier)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::HandlerNotFound(identifier.to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
