//! Deferred-reference syntax and dependency extraction.
//!
//! A deferred reference is a string of the form `${<task_ref>.output.<key>}`
//! (one value from the producer's output) or `${<task_ref>.output}` (the whole
//! output mapping). Any other value is a literal.
//!
//! [`task_dependencies`] re-derives a task's dependencies from these strings.
//! Definition validation relies on it alone; the graph builder starts from the
//! structured module references and adds any deferred strings authored
//! directly in `user_config`.

use std::sync::LazyLock;

use freshflow_types::workflow::TaskInput;
use indexmap::IndexSet;
use regex::Regex;
use serde_json::Value;

static DEFERRED_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{([^.}]+)\.output(?:\.([^}]+))?\}$").expect("deferred reference pattern is valid")
});

/// A parsed deferred reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRef<'a> {
    /// Reference name of the producing task.
    pub task_ref: &'a str,
    /// Key inside the producer's `output`; `None` addresses the whole mapping.
    pub output_key: Option<&'a str>,
}

impl<'a> DeferredRef<'a> {
    /// Parse a string that is exactly a deferred reference.
    pub fn parse(s: &'a str) -> Option<Self> {
        let caps = DEFERRED_REF.captures(s)?;
        let task_ref = caps.get(1)?.as_str();
        let output_key = caps.get(2).map(|m| m.as_str());
        Some(Self {
            task_ref,
            output_key,
        })
    }

    /// Parse a JSON value; non-strings are never references.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }
}

/// Format `${<task_ref>.output.<output_key>}`.
pub fn output_ref(task_ref: &str, output_key: &str) -> String {
    format!("${{{task_ref}.output.{output_key}}}")
}

/// Format `${<task_ref>.output}`.
pub fn whole_output_ref(task_ref: &str) -> String {
    format!("${{{task_ref}.output}}")
}

/// Whether `task_ref` (and `output_key`) parse back unchanged once formatted
/// as a deferred reference.
pub fn round_trips(task_ref: &str, output_key: Option<&str>) -> bool {
    let formatted = match output_key {
        Some(key) => output_ref(task_ref, key),
        None => whole_output_ref(task_ref),
    };
    DeferredRef::parse(&formatted)
        == Some(DeferredRef {
            task_ref,
            output_key,
        })
}

/// Task references named by a single value, looking `depth` levels into
/// mappings and lists.
fn collect_refs(value: &Value, depth: usize, out: &mut IndexSet<String>) {
    match value {
        Value::String(_) => {
            if let Some(r) = DeferredRef::from_value(value) {
                out.insert(r.task_ref.to_string());
            }
        }
        Value::Object(map) if depth > 0 => {
            for v in map.values() {
                collect_refs(v, depth - 1, out);
            }
        }
        Value::Array(items) if depth > 0 => {
            for v in items {
                collect_refs(v, depth - 1, out);
            }
        }
        _ => {}
    }
}

/// Dependencies of a task, derived from the deferred references in its inputs.
///
/// Scans exactly the positions the resolver substitutes: every `user_config`
/// value plus one nested level inside mapping and list values, and every
/// other top-level parameter as a scalar. `module_id` and `identifier` are
/// never references.
pub fn task_dependencies(input: &TaskInput) -> IndexSet<String> {
    let mut deps = IndexSet::new();
    for value in input.user_config.values() {
        collect_refs(value, 1, &mut deps);
    }
    for value in input.extra.values() {
        collect_refs(value, 0, &mut deps);
    }
    deps
}
