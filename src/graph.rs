//! Reference graph over named definitions and its build order.
//!
//! Dependencies are found by walking each definition for `$ref`s that point at
//! another local definition. Self-references are dropped here; they are the
//! building set's business, not the ordering's.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

const LOCAL_PREFIXES: [&str; 2] = ["#/$defs/", "#/definitions/"];

pub type DependencyGraph = IndexMap<String, IndexSet<String>>;

/// Name of the local definition a `$ref` points at, if any.
///
/// `#/$defs/Node` and `#/definitions/Node` both yield `Node`. Pointers into a
/// definition's interior or outside the document yield `None`.
pub fn local_definition_name(reference: &str) -> Option<String> {
    let rest = LOCAL_PREFIXES
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest.replace("~1", "/").replace("~0", "~"))
}

/// Named definitions of a document in insertion order, `$defs` first.
pub fn definitions(root: &Map<String, Value>) -> IndexMap<String, &Value> {
    let mut out = IndexMap::new();
    for container in ["$defs", "definitions"] {
        if let Some(Value::Object(defs)) = root.get(container) {
            for (name, schema) in defs {
                out.entry(name.clone()).or_insert(schema);
            }
        }
    }
    out
}

/// Collect every local definition referenced anywhere below `node`.
pub fn find_refs(node: &Value, refs: &mut IndexSet<String>) {
    match node {
        Value::Object(map) => {
            if let Some(name) = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(local_definition_name)
            {
                refs.insert(name);
            }
            for value in map.values() {
                find_refs(value, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                find_refs(item, refs);
            }
        }
        _ => {}
    }
}

/// Dependency set per definition, excluding self-references. Dangling names
/// are kept; the orderer ignores them.
pub fn dependency_graph(defs: &IndexMap<String, &Value>) -> DependencyGraph {
    defs.iter()
        .map(|(name, schema)| {
            let mut deps = IndexSet::new();
            find_refs(schema, &mut deps);
            deps.shift_remove(name);
            (name.clone(), deps)
        })
        .collect()
}

/// Kahn's algorithm. Ties follow the graph's insertion order.
///
/// Definitions caught in a cycle of two or more never reach in-degree zero
/// and are left out of the result.
pub fn build_order(graph: &DependencyGraph) -> Vec<String> {
    let mut in_degree: IndexMap<&str, usize> = graph
        .iter()
        .map(|(name, deps)| {
            let known = deps.iter().filter(|d| graph.contains_key(*d)).count();
            (name.as_str(), known)
        })
        .collect();

    // reverse edges, dependents listed in insertion order
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for (name, deps) in graph {
        for dep in deps {
            if graph.contains_key(dep) {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = queue.pop_front() {
        order.push(node.to_owned());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if order.len() < graph.len() {
        let stuck: Vec<&str> = graph
            .keys()
            .map(String::as_str)
            .filter(|name| !order.iter().any(|o| o == name))
            .collect();
        tracing::warn!(?stuck, "reference cycle between definitions; they will not be built");
    }
    order
}
