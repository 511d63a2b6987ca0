//! Topological ordering of task graphs.
//!
//! Implements Kahn's algorithm over an insertion-ordered dependency map, so
//! ties are broken by map order and the result is deterministic. Both the
//! graph builder and definition validation order tasks through
//! [`execution_order`].

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use super::definition::WorkflowError;

/// Dependency map: node -> nodes it depends on. Iteration order is the
/// tie-break order.
pub type DependencyMap = IndexMap<String, IndexSet<String>>;

/// Order nodes so that every node comes after everything it depends on.
///
/// 1. Reject dependencies on nodes that are not in the map.
/// 2. Seed the ready queue with nodes that have no dependencies. If there
///    are none, the whole graph is cyclic.
/// 3. Pop a node, append it, and drop it from the remaining dependency set of
///    every other node (in map order). A node whose set becomes empty joins
///    the queue.
/// 4. Nodes never reached form (or hang off) a cycle and are reported.
pub fn execution_order(deps: &DependencyMap) -> Result<Vec<String>, WorkflowError> {
    for (node, node_deps) in deps {
        if let Some(missing) = node_deps.iter().find(|d| !deps.contains_key(d.as_str())) {
            return Err(WorkflowError::UnknownDependency {
                task: node.clone(),
                dependency: missing.clone(),
            });
        }
    }

    let mut remaining: IndexMap<&str, IndexSet<&str>> = deps
        .iter()
        .map(|(node, node_deps)| {
            (
                node.as_str(),
                node_deps.iter().map(String::as_str).collect(),
            )
        })
        .collect();

    let mut queue: VecDeque<&str> = remaining
        .iter()
        .filter(|(_, d)| d.is_empty())
        .map(|(node, _)| *node)
        .collect();

    if queue.is_empty() && !deps.is_empty() {
        return Err(WorkflowError::CircularDependency {
            unprocessed: deps.keys().cloned().collect(),
        });
    }

    let mut order: Vec<String> = Vec::with_capacity(deps.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());
        tracing::trace!(node = current, "ordered node");

        for (node, node_deps) in remaining.iter_mut() {
            if node_deps.shift_remove(current) && node_deps.is_empty() {
                queue.push_back(node);
            }
        }
    }

    if order.len() != deps.len() {
        let unprocessed: Vec<String> = deps
            .keys()
            .filter(|node| !order.contains(node))
            .cloned()
            .collect();
        return Err(WorkflowError::CircularDependency { unprocessed });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyMap {
        edges
            .iter()
            .map(|(node, deps)| {
                (
                    node.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_graph() {
        assert!(execution_order(&DependencyMap::new()).unwrap().is_empty());
    }

    #[test]
    fn test_independent_nodes_keep_map_order() {
        let order = execution_order(&graph(&[("c", &[]), ("a", &[]), ("b", &[])])).unwrap();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dependency_declared_later_runs_first() {
        // b is listed first but depends on a
        let order = execution_order(&graph(&[("b", &["a"]), ("a", &[])])).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_diamond() {
        //   a
        //  / \
        // b   c
        //  \ /
        //   d
        let order = execution_order(&graph(&[
            ("d", &["b", "c"]),
            ("c", &["a"]),
            ("b", &["a"]),
            ("a", &[]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_every_node_after_its_dependencies() {
        let deps = graph(&[
            ("f", &["d", "e"]),
            ("e", &["c"]),
            ("d", &["b"]),
            ("c", &["a"]),
            ("b", &["a"]),
            ("a", &[]),
        ]);
        let order = execution_order(&deps).unwrap();
        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        for (node, node_deps) in &deps {
            for dep in node_deps {
                assert!(pos(dep) < pos(node), "{dep} must precede {node}");
            }
        }
    }

    #[test]
    fn test_full_cycle_has_no_start_node() {
        let err = execution_order(&graph(&[("a", &["b"]), ("b", &["a"])])).unwrap_err();
        match err {
            WorkflowError::CircularDependency { unprocessed } => {
                assert_eq!(unprocessed, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_cycle_names_unprocessed_nodes() {
        let err = execution_order(&graph(&[
            ("root", &[]),
            ("x", &["root", "z"]),
            ("y", &["x"]),
            ("z", &["y"]),
        ]))
        .unwrap_err();
        match err {
            WorkflowError::CircularDependency { unprocessed } => {
                assert_eq!(unprocessed, vec!["x", "y", "z"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = execution_order(&graph(&[("a", &[]), ("b", &["b"])])).unwrap_err();
        assert!(err.to_string().contains("circular dependency"));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = execution_order(&graph(&[("a", &["missing"])])).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { .. }));
        assert!(err.to_string().contains("missing"));
    }
}
