//! Workflow definition parsing, lookup, and validation.
//!
//! A `WorkflowDefinition` may come from the graph builder or be authored by
//! hand (JSON or YAML). Either way its dependency structure is re-derived from
//! the deferred references in each task's inputs, so a hand-authored
//! definition gets the same cycle and dangling-reference checks as a built
//! one.

use std::collections::HashSet;

use freshflow_types::workflow::{Task, WorkflowDefinition};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use super::dag::{self, DependencyMap};
use super::reference;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while building, parsing, or validating workflows.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed module configuration (missing fields, dangling reference,
    /// reference without `output_key`).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// The dependency graph contains a cycle; lists every node that could not
    /// be ordered.
    #[error("circular dependency detected among: {}", unprocessed.join(", "))]
    CircularDependency { unprocessed: Vec<String> },

    /// A task references a task that does not exist.
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    /// Two tasks share a reference name.
    #[error("duplicate task reference name: '{0}'")]
    DuplicateTask(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON/YAML parse failure.
    #[error("parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a JSON document into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a YAML document into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Serialize a definition to pretty-printed JSON in the wire format.
pub fn serialize_workflow_json(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_json::to_string_pretty(def).map_err(|e| WorkflowError::Parse(e.to_string()))
}

/// Serialize a definition to YAML.
pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(def).map_err(|e| WorkflowError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Lookup and dependencies
// ---------------------------------------------------------------------------

/// Index tasks by reference name, in declared order.
///
/// Fails on the first duplicated reference name.
pub fn task_lookup(def: &WorkflowDefinition) -> Result<IndexMap<&str, &Task>, WorkflowError> {
    let mut lookup = IndexMap::with_capacity(def.tasks.len());
    for task in &def.tasks {
        if lookup.insert(task.reference_name.as_str(), task).is_some() {
            return Err(WorkflowError::DuplicateTask(task.reference_name.clone()));
        }
    }
    Ok(lookup)
}

/// Reference names of the tasks `task` depends on.
pub fn extract_dependencies(task: &Task) -> IndexSet<String> {
    reference::task_dependencies(&task.input_parameters)
}

/// Dependency map for every task, keyed in declared order.
pub fn dependency_map(def: &WorkflowDefinition) -> Result<DependencyMap, WorkflowError> {
    let lookup = task_lookup(def)?;
    Ok(lookup
        .into_iter()
        .map(|(name, task)| (name.to_string(), extract_dependencies(task)))
        .collect())
}

/// Compute a dependency-respecting execution order from re-derived
/// dependencies.
///
/// The engine still runs tasks in declared order; this order is used for
/// validation and planning.
pub fn get_execution_order(def: &WorkflowDefinition) -> Result<Vec<String>, WorkflowError> {
    dag::execution_order(&dependency_map(def)?)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty
/// - At least one task exists
/// - Reference names are unique
/// - Every deferred reference names an existing task
/// - Execution order is computable (no cycles)
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.name.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "workflow name must not be empty".to_string(),
        ));
    }
    if def.tasks.is_empty() {
        return Err(WorkflowError::Validation(
            "workflow must have at least one task".to_string(),
        ));
    }

    let deps = dependency_map(def)?;
    // Rejects dangling task references before looking for cycles.
    dag::execution_order(&deps)?;

    let known: HashSet<&str> = deps.keys().map(String::as_str).collect();
    for (name, value) in &def.outputs {
        if let Some(r) = reference::DeferredRef::from_value(value) {
            if !known.contains(r.task_ref) {
                return Err(WorkflowError::UnknownDependency {
                    task: format!("output '{name}'"),
                    dependency: r.task_ref.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::builder::GraphBuilder;
    use freshflow_types::module::WorkflowConfig;
    use serde_json::json;

    fn definition(tasks: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(json!({"name": "wf", "tasks": tasks})).unwrap()
    }

    fn task(reference: &str, user_config: serde_json::Value) -> serde_json::Value {
        json!({
            "name": "stub_task",
            "taskReferenceName": reference,
            "inputParameters": {"identifier": "stub", "user_config": user_config}
        })
    }

    #[test]
    fn test_lookup_rejects_duplicates() {
        let def = definition(json!([task("a", json!({})), task("a", json!({}))]));
        let err = task_lookup(&def).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateTask(ref name) if name == "a"));
    }

    #[test]
    fn test_extract_dependencies_from_deferred_strings() {
        let def = definition(json!([
            task("a", json!({})),
            task("b", json!({"x": "${a.output.x}", "lit": "a.output.x"})),
        ]));
        let deps = extract_dependencies(def.get_task("b").unwrap());
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_execution_order_ignores_declared_order() {
        let def = definition(json!([
            task("b", json!({"x": "${a.output.x}"})),
            task("a", json!({})),
        ]));
        assert_eq!(get_execution_order(&def).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let def = definition(json!([]));
        assert!(matches!(
            validate_definition(&def),
            Err(WorkflowError::Validation(_))
        ));

        let mut def = definition(json!([task("a", json!({}))]));
        def.name = "  ".to_string();
        assert!(matches!(
            validate_definition(&def),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        let def = definition(json!([task("a", json!({"x": "${ghost.output.x}"}))]));
        let err = validate_definition(&def).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { ref dependency, .. } if dependency == "ghost"));
    }

    #[test]
    fn test_validate_rejects_dangling_output() {
        let mut def = definition(json!([task("a", json!({}))]));
        def.outputs
            .insert("workflow_output".to_string(), json!("${ghost.output}"));
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let def = definition(json!([
            task("a", json!({"x": "${b.output.x}"})),
            task("b", json!({"x": "${a.output.x}"})),
        ]));
        assert!(matches!(
            validate_definition(&def),
            Err(WorkflowError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json_def = r#"{
            "name": "wf",
            "tasks": [{
                "name": "input_task",
                "taskReferenceName": "a",
                "inputParameters": {"identifier": "input", "user_config": {"query": "hi"}}
            }],
            "outputParameters": {"workflow_output": "${a.output}"}
        }"#;
        let def = parse_workflow_json(json_def).unwrap();
        assert_eq!(def.task_refs(), vec!["a"]);

        let yaml = serialize_workflow_yaml(&def).unwrap();
        let reparsed = parse_workflow_yaml(&yaml).unwrap();
        assert_eq!(reparsed, def);

        assert!(matches!(
            parse_workflow_json("{not json"),
            Err(WorkflowError::Parse(_))
        ));
    }

    #[test]
    fn test_builder_output_round_trips() {
        let config: WorkflowConfig = serde_json::from_value(json!({
            "canvas_name": "rag",
            "modules": {
                "answer": {"identifier": "llm", "user_config": {
                    "query": {"module_id": "question", "output_key": "query"},
                    "context": {"module_id": "search", "output_key": "chunks"}
                }},
                "search": {"identifier": "vector_search", "user_config": {
                    "query": {"module_id": "question", "output_key": "query"},
                    "top_k": 3
                }},
                "question": {"identifier": "input", "user_config": {"query": "why"}}
            }
        }))
        .unwrap();

        let def = GraphBuilder::new(config.clone())
            .create_workflow_definition()
            .unwrap();
        let json = serialize_workflow_json(&def).unwrap();
        let parsed = parse_workflow_json(&json).unwrap();

        assert_eq!(parsed.tasks.len(), config.modules.len());
        assert_eq!(parsed.task_refs(), vec!["question", "search", "answer"]);
        for (module_id, module) in &config.modules {
            let expected: IndexSet<String> = module
                .references()
                .map(|(_, r)| r.module_id)
                .collect();
            let task = parsed.get_task(module_id).unwrap();
            let mut actual: Vec<String> = extract_dependencies(task).into_iter().collect();
            let mut expected: Vec<String> = expected.into_iter().collect();
            actual.sort();
            expected.sort();
            assert_eq!(actual, expected, "dependencies of {module_id}");
        }
    }
}
