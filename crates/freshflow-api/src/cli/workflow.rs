//! CLI workflow subcommands: validate, plan, and order.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use freshflow_core::workflow::builder::{GraphBuilder, TaskGraph};
use freshflow_core::workflow::definition::{
    WorkflowError, serialize_workflow_json, serialize_workflow_yaml, validate_definition,
};
use freshflow_infra::module_file::{ModuleFileError, load_workflow_config, load_workflow_definition};
use freshflow_types::module::WorkflowConfig;

use super::PlanFormat;

/// Read a module configuration, mapping load failures to user-facing messages.
async fn load_config(file: &Path) -> Result<WorkflowConfig> {
    load_workflow_config(file).await.map_err(|e| match e {
        ModuleFileError::Workflow(WorkflowError::ConfigValidation(msg)) => {
            anyhow!("Invalid module configuration: {msg}")
        }
        other => anyhow!("Failed to load {}: {other}", file.display()),
    })
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub async fn handle_validate(file: &Path, definition: bool, json: bool, quiet: bool) -> Result<()> {
    let (name, tasks) = if definition {
        let def = load_workflow_definition(file)
            .await
            .map_err(|e| anyhow!("Workflow definition is invalid: {e}"))?;
        validate_definition(&def).map_err(|e| anyhow!("Workflow definition is invalid: {e}"))?;
        (def.name, def.tasks.len())
    } else {
        let config = load_config(file).await?;
        let name = config.workflow_name.clone();
        let graph = GraphBuilder::new(config)
            .build()
            .map_err(|e| anyhow!("Workflow validation failed: {e}"))?;
        (name, graph.tasks.len())
    };

    if json {
        let out = serde_json::json!({
            "valid": true,
            "workflow": name,
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        println!();
        println!(
            "  {} Workflow '{}' is valid ({tasks} task{})",
            style("*").green().bold(),
            style(&name).cyan(),
            if tasks == 1 { "" } else { "s" }
        );
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Build and serialize the definition for a module configuration.
pub fn render_plan(config: WorkflowConfig, format: PlanFormat) -> Result<String> {
    let def = GraphBuilder::new(config)
        .create_workflow_definition()
        .map_err(|e| anyhow!("Failed to build workflow: {e}"))?;
    let rendered = match format {
        PlanFormat::Json => serialize_workflow_json(&def)?,
        PlanFormat::Yaml => serialize_workflow_yaml(&def)?,
    };
    Ok(rendered)
}

pub async fn handle_plan(
    file: &Path,
    format: PlanFormat,
    output: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let config = load_config(file).await?;
    let format = if json { PlanFormat::Json } else { format };
    let rendered = render_plan(config, format)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet && !json {
                println!(
                    "  {} Wrote workflow definition to {}",
                    style("*").green().bold(),
                    style(path.display()).cyan()
                );
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One line of `freshflow order`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub position: usize,
    pub task: String,
    pub identifier: String,
    pub depends_on: Vec<String>,
}

pub fn order_rows(graph: &TaskGraph) -> Vec<OrderRow> {
    graph
        .tasks
        .iter()
        .enumerate()
        .map(|(i, task)| OrderRow {
            position: i + 1,
            task: task.reference_name.clone(),
            identifier: task.input_parameters.identifier.clone().unwrap_or_default(),
            depends_on: graph
                .dependencies
                .get(&task.reference_name)
                .map(|deps| deps.iter().cloned().collect())
                .unwrap_or_default(),
        })
        .collect()
}

pub async fn handle_order(file: &Path, json: bool) -> Result<()> {
    let config = load_config(file).await?;
    let name = config.workflow_name.clone();
    let graph = GraphBuilder::new(config)
        .build()
        .map_err(|e| anyhow!("Failed to order workflow: {e}"))?;
    let rows = order_rows(&graph);

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "position": r.position,
                    "task": r.task,
                    "identifier": r.identifier,
                    "depends_on": r.depends_on,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Task").fg(Color::Cyan),
            Cell::new("Identifier"),
            Cell::new("Depends on"),
        ]);

    for r in &rows {
        let deps = if r.depends_on.is_empty() {
            "-".to_string()
        } else {
            r.depends_on.join(", ")
        };
        table.add_row(vec![
            Cell::new(r.position),
            Cell::new(&r.task),
            Cell::new(&r.identifier),
            Cell::new(deps),
        ]);
    }

    println!();
    println!("  Execution order for {}", style(&name).cyan());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshflow_core::workflow::builder::parse_workflow_config;
    use serde_json::json;
    use tempfile::TempDir;

    fn config() -> WorkflowConfig {
        parse_workflow_config(json!({
            "canvas_name": "rag",
            "modules": {
                "answer": {"identifier": "llm", "user_config": {
                    "context": {"module_id": "chunks", "output_key": "chunks"},
                    "query": {"module_id": "input", "output_key": "query"}
                }},
                "chunks": {"identifier": "chunker", "user_config": {
                    "text": {"module_id": "input", "output_key": "text"}
                }},
                "input": {"identifier": "input", "user_config": {"query": "hi"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_order_rows_follow_dependencies() {
        let graph = GraphBuilder::new(config()).build().unwrap();
        let rows = order_rows(&graph);

        let tasks: Vec<&str> = rows.iter().map(|r| r.task.as_str()).collect();
        assert_eq!(tasks, ["input", "chunks", "answer"]);
        assert_eq!(rows[0].position, 1);
        assert!(rows[0].depends_on.is_empty());
        assert_eq!(rows[1].identifier, "chunker");
        assert_eq!(rows[2].depends_on, ["chunks", "input"]);
    }

    #[test]
    fn test_render_plan_formats() {
        let as_json = render_plan(config(), PlanFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&as_json).unwrap();
        assert_eq!(value["name"], "rag");
        assert_eq!(value["outputParameters"]["workflow_output"], "${answer.output}");

        let as_yaml = render_plan(config(), PlanFormat::Yaml).unwrap();
        assert!(as_yaml.contains("name: rag"));
    }

    #[tokio::test]
    async fn test_plan_output_validates_as_definition() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("rag.json");
        tokio::fs::write(&config_path, serde_json::to_string(&json!({
            "canvas_name": "rag",
            "modules": {"input": {"identifier": "input", "user_config": {}}}
        })).unwrap())
        .await
        .unwrap();

        let plan_path = tmp.path().join("plan.yaml");
        handle_plan(&config_path, PlanFormat::Yaml, Some(&plan_path), false, true)
            .await
            .unwrap();
        handle_validate(&plan_path, true, false, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_reports_cycle() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cycle.json");
        tokio::fs::write(&path, r#"{"modules": {
            "a": {"identifier": "x", "user_config": {"v": {"module_id": "b", "output_key": "o"}}},
            "b": {"identifier": "x", "user_config": {"v": {"module_id": "a", "output_key": "o"}}}
        }}"#)
        .await
        .unwrap();

        let err = handle_validate(&path, false, false, true).await.unwrap_err();
        assert!(err.to_string().contains("circular dependency"));
    }
}
