//! Infrastructure layer for Freshflow.
//!
//! Implements the repository traits defined in `freshflow-core` (an in-memory
//! state store) and loads configuration from disk: the engine's
//! `freshflow.toml` and declarative module files in JSON or YAML.

pub mod config;
pub mod module_file;
pub mod state;
