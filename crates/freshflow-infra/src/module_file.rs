//! Loading workflow documents from disk.
//!
//! Two kinds of document are supported, each as JSON or YAML (picked by file
//! extension):
//! - module configurations (`{canvas_name, modules}`), the graph builder's input
//! - built workflow definitions, as produced by `freshflow plan`

use std::path::{Path, PathBuf};

use freshflow_core::workflow::builder::parse_workflow_config;
use freshflow_core::workflow::definition::{WorkflowError, parse_workflow_json, parse_workflow_yaml};
use freshflow_types::module::WorkflowConfig;
use freshflow_types::workflow::WorkflowDefinition;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleFileError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported file extension for {} (expected .json, .yaml or .yml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Serialization format of a workflow document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Infer the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Parse a module configuration document held in memory.
pub fn parse_config_str(content: &str, format: FileFormat) -> Result<WorkflowConfig, WorkflowError> {
    let value: Value = match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| WorkflowError::Parse(e.to_string()))?,
        FileFormat::Yaml => serde_yaml_ng::from_str(content).map_err(|e| WorkflowError::Parse(e.to_string()))?,
    };
    parse_workflow_config(value)
}

/// Read and parse a module configuration file.
pub async fn load_workflow_config(path: &Path) -> Result<WorkflowConfig, ModuleFileError> {
    let (content, format) = read(path).await?;
    let config = parse_config_str(&content, format).map_err(|e| match e {
        WorkflowError::Parse(message) => ModuleFileError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => ModuleFileError::Workflow(other),
    })?;
    tracing::debug!(path = %path.display(), modules = config.modules.len(), "loaded module config");
    Ok(config)
}

/// Read, parse, and validate a workflow definition file.
pub async fn load_workflow_definition(path: &Path) -> Result<WorkflowDefinition, ModuleFileError> {
    let (content, format) = read(path).await?;
    let definition = match format {
        FileFormat::Json => parse_workflow_json(&content)?,
        FileFormat::Yaml => parse_workflow_yaml(&content)?,
    };
    tracing::debug!(path = %path.display(), tasks = definition.tasks.len(), "loaded workflow definition");
    Ok(definition)
}

async fn read(path: &Path) -> Result<(String, FileFormat), ModuleFileError> {
    let format = FileFormat::from_path(path).ok_or_else(|| ModuleFileError::UnsupportedFormat(path.to_path_buf()))?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ModuleFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((content, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshflow_core::workflow::builder::GraphBuilder;
    use freshflow_core::workflow::definition::serialize_workflow_yaml;
    use tempfile::TempDir;

    const SCENARIO_YAML: &str = r#"
canvas_name: demo
modules:
  a:
    identifier: input
    user_config:
      query: hi
  b:
    identifier: llm
    user_config:
      input_query:
        module_id: a
        output_key: query
"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("x.json")), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_path(Path::new("x.YML")), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_path(Path::new("x.yaml")), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_path(Path::new("x.toml")), None);
        assert_eq!(FileFormat::from_path(Path::new("x")), None);
    }

    #[test]
    fn test_yaml_and_json_configs_agree() {
        let from_yaml = parse_config_str(SCENARIO_YAML, FileFormat::Yaml).unwrap();
        let json = r#"{"canvas_name": "demo", "modules": {
            "a": {"identifier": "input", "user_config": {"query": "hi"}},
            "b": {"identifier": "llm", "user_config": {"input_query": {"module_id": "a", "output_key": "query"}}}
        }}"#;
        let from_json = parse_config_str(json, FileFormat::Json).unwrap();

        assert_eq!(from_yaml.workflow_name, "demo");
        assert_eq!(from_yaml.modules, from_json.modules);
        assert_eq!(from_yaml.modules.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_load_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow.yaml");
        tokio::fs::write(&path, SCENARIO_YAML).await.unwrap();

        let config = load_workflow_config(&path).await.unwrap();
        let graph = GraphBuilder::new(config).build().unwrap();
        assert_eq!(graph.order(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_load_config_errors() {
        let tmp = TempDir::new().unwrap();

        let missing = tmp.path().join("missing.json");
        assert!(matches!(
            load_workflow_config(&missing).await.unwrap_err(),
            ModuleFileError::Io { .. }
        ));

        let txt = tmp.path().join("workflow.txt");
        tokio::fs::write(&txt, "{}").await.unwrap();
        assert!(matches!(
            load_workflow_config(&txt).await.unwrap_err(),
            ModuleFileError::UnsupportedFormat(_)
        ));

        let broken = tmp.path().join("broken.json");
        tokio::fs::write(&broken, "{not json").await.unwrap();
        let err = load_workflow_config(&broken).await.unwrap_err();
        assert!(matches!(err, ModuleFileError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));

        let no_identifier = tmp.path().join("bad.json");
        tokio::fs::write(&no_identifier, r#"{"modules": {"a": {"user_config": {}}}}"#)
            .await
            .unwrap();
        assert!(matches!(
            load_workflow_config(&no_identifier).await.unwrap_err(),
            ModuleFileError::Workflow(WorkflowError::ConfigValidation(_))
        ));
    }

    #[tokio::test]
    async fn test_load_definition_file() {
        let config = parse_config_str(SCENARIO_YAML, FileFormat::Yaml).unwrap();
        let definition = GraphBuilder::new(config).create_workflow_definition().unwrap();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plan.yml");
        tokio::fs::write(&path, serialize_workflow_yaml(&definition).unwrap())
            .await
            .unwrap();

        let loaded = load_workflow_definition(&path).await.unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.task_refs(), ["a", "b"]);
    }
}
