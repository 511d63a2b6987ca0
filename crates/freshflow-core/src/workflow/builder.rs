//! Graph builder: declarative module map to ordered workflow definition.
//!
//! Each module becomes one task addressed by its module ID. References in a
//! module's `user_config` (`{"module_id": .., "output_key": ..}`) are rewritten
//! to deferred-reference strings, and the resulting tasks are ordered so every
//! producer runs before its consumers.

use freshflow_types::module::{ModuleConfig, ModuleReference, WorkflowConfig};
use indexmap::IndexSet;
use freshflow_types::workflow::{
    SIMPLE_TASK_TYPE, TASK_NAME_SUFFIX, Task, TaskInput, WorkflowDefinition,
};
use serde_json::{Map, Value};

use super::dag::{self, DependencyMap};
use super::definition::WorkflowError;
use super::reference;

/// Reserved failure-workflow name attached to every built definition.
pub const FAILURE_WORKFLOW_NAME: &str = "cleanup_workflow";

/// Name of the single declared output of a built definition.
pub const WORKFLOW_OUTPUT_KEY: &str = "workflow_output";

const DEFINITION_VERSION: u32 = 1;
const SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Raw config parsing
// ---------------------------------------------------------------------------

/// Parse an untyped configuration document into a `WorkflowConfig`.
///
/// Structural problems with a module (not a mapping, missing `identifier` or
/// `user_config`) are reported as `ConfigValidation` naming the module rather
/// than as a generic deserialization error.
pub fn parse_workflow_config(value: Value) -> Result<WorkflowConfig, WorkflowError> {
    let root = value.as_object().ok_or_else(|| {
        WorkflowError::ConfigValidation("workflow config must be a mapping".to_string())
    })?;

    if let Some(modules) = root.get("modules") {
        let modules = modules.as_object().ok_or_else(|| {
            WorkflowError::ConfigValidation("'modules' must be a mapping".to_string())
        })?;
        for (module_id, module) in modules {
            let module = module.as_object().ok_or_else(|| {
                WorkflowError::ConfigValidation(format!(
                    "module '{module_id}' must be a mapping"
                ))
            })?;
            if !module.get("identifier").is_some_and(Value::is_string) {
                return Err(WorkflowError::ConfigValidation(format!(
                    "module '{module_id}' is missing 'identifier'"
                )));
            }
            if !module.get("user_config").is_some_and(Value::is_object) {
                return Err(WorkflowError::ConfigValidation(format!(
                    "module '{module_id}' is missing 'user_config'"
                )));
            }
        }
    }

    serde_json::from_value(value).map_err(|e| WorkflowError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Graph builder
// ---------------------------------------------------------------------------

/// Ordered tasks plus the dependency edges they were ordered by.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
    /// `task_ref -> task refs it depends on`, in module authoring order.
    pub dependencies: DependencyMap,
}

impl TaskGraph {
    /// Reference names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.reference_name.as_str()).collect()
    }
}

/// Turns a [`WorkflowConfig`] into a validated, ordered task graph.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    config: WorkflowConfig,
}

impl GraphBuilder {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Build from an untyped document via [`parse_workflow_config`].
    pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
        parse_workflow_config(value).map(Self::new)
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Check that the configuration can be built.
    ///
    /// - At least one module exists
    /// - Every reference names an existing module
    /// - Every reference carries `output_key`
    /// - Module IDs and output keys survive the deferred-reference syntax
    ///   (no `.` or `}` in a module ID, no `}` in an output key)
    pub fn validate_config(&self) -> Result<(), WorkflowError> {
        if self.config.modules.is_empty() {
            return Err(WorkflowError::ConfigValidation(
                "workflow must define at least one module".to_string(),
            ));
        }

        for module_id in self.config.modules.keys() {
            if !reference::round_trips(module_id, None) {
                return Err(WorkflowError::ConfigValidation(format!(
                    "module id '{module_id}' cannot be used in a deferred reference (it must be non-empty and contain no '.' or '}}')"
                )));
            }
        }

        for (module_id, module) in &self.config.modules {
            for (param, r) in module.references() {
                if !self.config.modules.contains_key(&r.module_id) {
                    return Err(WorkflowError::ConfigValidation(format!(
                        "module '{module_id}' parameter '{param}' references unknown module '{}'",
                        r.module_id
                    )));
                }
                let Some(key) = r.output_key.as_deref() else {
                    return Err(WorkflowError::ConfigValidation(format!(
                        "module '{module_id}' parameter '{param}' reference to '{}' is missing 'output_key'",
                        r.module_id
                    )));
                };
                if !reference::round_trips(&r.module_id, Some(key)) {
                    return Err(WorkflowError::ConfigValidation(format!(
                        "module '{module_id}' parameter '{param}' output_key '{key}' cannot be used in a deferred reference (it must be non-empty and contain no '}}')"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate, assemble one task per module, and order the tasks.
    pub fn build(&self) -> Result<TaskGraph, WorkflowError> {
        self.validate_config()?;

        let mut tasks: Vec<Task> = Vec::with_capacity(self.config.modules.len());
        for (module_id, module) in &self.config.modules {
            tasks.push(create_task(module_id, module)?);
        }

        let dependencies: DependencyMap = self
            .config
            .modules
            .iter()
            .zip(&tasks)
            .map(|((module_id, module), task)| {
                let mut deps: IndexSet<String> =
                    module.references().map(|(_, r)| r.module_id).collect();
                // Deferred strings written directly in user_config resolve at run time too.
                deps.extend(reference::task_dependencies(&task.input_parameters));
                (module_id.clone(), deps)
            })
            .collect();

        let order = dag::execution_order(&dependencies)?;

        // Tasks were created in module order, which is the key order of
        // `dependencies`.
        let mut slots: Vec<Option<Task>> = tasks.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        for task_ref in &order {
            if let Some(idx) = dependencies.get_index_of(task_ref) {
                if let Some(task) = slots[idx].take() {
                    ordered.push(task);
                }
            }
        }

        tracing::debug!(
            workflow = %self.config.workflow_name,
            order = ?order,
            "computed task execution order"
        );

        Ok(TaskGraph {
            tasks: ordered,
            dependencies,
        })
    }

    /// Build the executable definition.
    ///
    /// The single declared output, `workflow_output`, is the whole output of
    /// the last task in execution order.
    pub fn create_workflow_definition(&self) -> Result<WorkflowDefinition, WorkflowError> {
        let graph = self.build()?;
        let last = graph
            .tasks
            .last()
            .ok_or_else(|| WorkflowError::Validation("workflow has no tasks".to_string()))?;

        let mut outputs = Map::new();
        outputs.insert(
            WORKFLOW_OUTPUT_KEY.to_string(),
            Value::String(reference::whole_output_ref(&last.reference_name)),
        );

        tracing::info!(
            workflow = %self.config.workflow_name,
            tasks = graph.tasks.len(),
            "built workflow definition"
        );

        Ok(WorkflowDefinition {
            name: self.config.workflow_name.clone(),
            version: DEFINITION_VERSION,
            tasks: graph.tasks,
            outputs,
            failure_workflow: Some(FAILURE_WORKFLOW_NAME.to_string()),
            schema_version: SCHEMA_VERSION,
        })
    }
}

/// Task for one module with references rewritten to deferred strings.
fn create_task(module_id: &str, module: &ModuleConfig) -> Result<Task, WorkflowError> {
    let mut user_config = Map::with_capacity(module.user_config.len());
    for (param, value) in &module.user_config {
        let value = match ModuleReference::from_value(value) {
            Some(r) => {
                let key = r.output_key.as_deref().ok_or_else(|| {
                    WorkflowError::ConfigValidation(format!(
                        "module '{module_id}' parameter '{param}' reference is missing 'output_key'"
                    ))
                })?;
                Value::String(reference::output_ref(&r.module_id, key))
            }
            None => value.clone(),
        };
        user_config.insert(param.clone(), value);
    }

    Ok(Task {
        name: format!("{}{TASK_NAME_SUFFIX}", module.identifier),
        reference_name: module_id.to_string(),
        task_type: SIMPLE_TASK_TYPE.to_string(),
        input_parameters: TaskInput {
            module_id: Some(module_id.to_string()),
            identifier: Some(module.identifier.clone()),
            user_config,
            extra: Map::new(),
        },
    })
}
