//! Workflow engine core for Freshflow.
//!
//! Builds ordered task graphs from declarative module maps, resolves deferred
//! references between tasks, dispatches tasks to registered handlers, and
//! fans run lifecycle events out to live listeners. Persistence is reached
//! only through the `repository` traits; `freshflow-infra` implements them.

pub mod event;
pub mod repository;
pub mod workflow;

#[cfg(test)]
mod testing;
