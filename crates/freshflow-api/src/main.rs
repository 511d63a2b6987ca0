//! Freshflow CLI entry point.
//!
//! Binary name: `freshflow`
//!
//! Parses CLI arguments, reads `freshflow.toml`, installs tracing, reports
//! any config problem through it, then dispatches to the command handler.

mod cli;

use clap::Parser;
use clap_complete::generate;
use freshflow_infra::config::{settle_engine_config, try_load_engine_config};
use freshflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or tracing
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "freshflow", &mut std::io::stdout());
        return Ok(());
    }

    let loaded = try_load_engine_config(&cli.config_dir).await;
    let (json_logs, otel_enabled) = loaded
        .as_ref()
        .map(|c| (c.json_logs, c.otel_enabled))
        .unwrap_or_default();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,freshflow=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        default_filter: filter.to_string(),
        json: json_logs,
        otel: otel_enabled,
        with_target: false,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let config = settle_engine_config(loaded);

    tracing::debug!(config_dir = %cli.config_dir.display(), ?config, "engine config loaded");

    let result = match cli.command {
        Commands::Validate { file, definition } => {
            cli::workflow::handle_validate(&file, definition, cli.json, cli.quiet).await
        }
        Commands::Plan {
            file,
            format,
            output,
        } => cli::workflow::handle_plan(&file, format, output.as_deref(), cli.json, cli.quiet).await,
        Commands::Order { file } => cli::workflow::handle_order(&file, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}
