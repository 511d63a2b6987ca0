//! Declarative module configuration.
//!
//! A workflow is authored as a map of modules keyed by `module_id`. Each module
//! names the handler type that runs it (`identifier`) and carries a free-form
//! `user_config`. A `user_config` value that is itself a mapping containing
//! `module_id` is a [`ModuleReference`] to another module's future output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Workflow name used when the configuration omits `canvas_name`.
pub const DEFAULT_WORKFLOW_NAME: &str = "default_workflow";

/// Top-level declarative workflow configuration (the graph builder's input).
///
/// Module order is preserved as authored; it is the tie-break order for
/// topological sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name. Accepts `canvas_name` (wire name) or `workflow_name`.
    #[serde(
        rename = "canvas_name",
        alias = "workflow_name",
        default = "default_workflow_name"
    )]
    pub workflow_name: String,
    /// Modules keyed by module ID, in authoring order.
    #[serde(default)]
    pub modules: IndexMap<String, ModuleConfig>,
}

fn default_workflow_name() -> String {
    DEFAULT_WORKFLOW_NAME.to_string()
}

/// Configuration of a single module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Handler type name (e.g. "s3_downloader").
    pub identifier: String,
    /// Handler parameters; may contain references to other modules.
    pub user_config: Map<String, Value>,
}

impl ModuleConfig {
    pub fn new(identifier: impl Into<String>, user_config: Map<String, Value>) -> Self {
        Self {
            identifier: identifier.into(),
            user_config,
        }
    }

    /// Iterate over `(param_name, reference)` for every reference-shaped
    /// `user_config` value.
    pub fn references(&self) -> impl Iterator<Item = (&str, ModuleReference)> + '_ {
        self.user_config
            .iter()
            .filter_map(|(name, value)| ModuleReference::from_value(value).map(|r| (name.as_str(), r)))
    }
}

/// A pointer from one module's config value to another module's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReference {
    /// The module whose output is referenced.
    pub module_id: String,
    /// The key inside the producer's `output` mapping. Required by validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl ModuleReference {
    /// Interpret a config value as a reference.
    ///
    /// A value is a reference exactly when it is a mapping containing a
    /// string `module_id`. Extra keys are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let module_id = obj.get("module_id")?.as_str()?;
        Some(Self {
            module_id: module_id.to_string(),
            output_key: obj
                .get("output_key")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}
