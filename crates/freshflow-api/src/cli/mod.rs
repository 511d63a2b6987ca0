//! CLI command definitions for the `freshflow` binary.
//!
//! Uses clap derive macros for argument parsing. Every command works offline
//! on a module configuration or workflow definition file.

pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Build, validate, and inspect declarative workflows.
#[derive(Parser)]
#[command(name = "freshflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding `freshflow.toml`.
    #[arg(long, global = true, env = "FRESHFLOW_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a module configuration (or, with --definition, a built workflow definition).
    Validate {
        /// Path to a .json, .yaml or .yml file.
        file: PathBuf,

        /// Treat the file as a workflow definition instead of a module configuration.
        #[arg(long)]
        definition: bool,
    },

    /// Build the workflow definition for a module configuration and print it.
    Plan {
        /// Path to the module configuration.
        file: PathBuf,

        /// Serialization format of the printed definition.
        #[arg(long, value_enum, default_value_t = PlanFormat::Json)]
        format: PlanFormat,

        /// Write the definition to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the task execution order for a module configuration.
    Order {
        /// Path to the module configuration.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Output format for `freshflow plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    Json,
    Yaml,
}
