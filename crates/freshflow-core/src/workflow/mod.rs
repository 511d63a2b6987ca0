//! Workflow engine core: graph building, reference resolution, and execution.
//!
//! - `reference` -- deferred-reference syntax and dependency extraction
//! - `dag` -- Kahn ordering shared by the builder and definition validation
//! - `builder` -- module map to ordered `WorkflowDefinition`
//! - `definition` -- definition parsing, lookup, and validation
//! - `resolver` -- per-run output store and input resolution
//! - `handler` -- handler contract and registry
//! - `task_runner` -- handler lookup, invocation, contract enforcement
//! - `engine` -- sequential run orchestration with observers
//! - `observer` -- observer that drives the state store and event bus
//! - `manager` -- bounded background run pool with run handles

pub mod builder;
pub mod dag;
pub mod definition;
pub mod engine;
pub mod handler;
pub mod manager;
pub mod observer;
pub mod reference;
pub mod resolver;
pub mod task_runner;
