//! Shared domain types for Freshflow.
//!
//! This crate contains the types used across the Freshflow workspace: the
//! declarative module configuration, tasks and workflow definitions, run and
//! module state records, lifecycle events, and engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, indexmap, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod module;
pub mod state;
pub mod workflow;
