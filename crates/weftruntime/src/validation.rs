use petgraph::graph::DiGraph;
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use weftcore::{Graph, NodeTypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding from a pre-flight graph check.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.message),
            Severity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// Check a graph before registration: start-node arity, resolvable node
/// types, reachability from the start node, and joins that cannot
/// actually synchronize anything.
///
/// Errors make the graph unrunnable; warnings flag likely authoring
/// mistakes that the interpreter would tolerate.
pub fn validate_graph(graph: &Graph, registry: &NodeTypeRegistry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let starts = graph.start_nodes();
    match starts.len() {
        0 => issues.push(ValidationIssue::error(
            "graph has no start node (name 'start' at depth 0)",
        )),
        1 => {}
        count => issues.push(ValidationIssue::error(format!(
            "graph has {} start nodes, expected exactly one",
            count
        ))),
    }

    for node in graph.nodes() {
        if !registry.contains(&node.node_type) {
            issues.push(ValidationIssue::error(format!(
                "node '{}' ({}) declares unregistered type '{}'",
                node.name, node.id, node.node_type
            )));
        }
    }

    if let Some(start) = starts.first() {
        let mut digraph = DiGraph::<(), ()>::new();
        let mut indices = HashMap::new();
        for node in graph.nodes() {
            indices.insert(node.id, digraph.add_node(()));
        }
        for arc in graph.arcs() {
            digraph.add_edge(indices[&arc.start_node], indices[&arc.end_node], ());
        }

        let mut reached = HashSet::new();
        let mut dfs = Dfs::new(&digraph, indices[&start.id]);
        while let Some(ix) = dfs.next(&digraph) {
            reached.insert(ix);
        }
        for node in graph.nodes() {
            if !reached.contains(&indices[&node.id]) {
                issues.push(ValidationIssue::warning(format!(
                    "node '{}' ({}) is unreachable from the start node",
                    node.name, node.id
                )));
            }
        }
    }

    for node in graph.nodes().filter(|n| n.is_join) {
        let mut per_label: HashMap<&str, usize> = HashMap::new();
        for arc in graph.input_arcs(node.id) {
            *per_label.entry(arc.label.as_str()).or_default() += 1;
        }
        for (label, count) in per_label {
            if count < 2 {
                issues.push(ValidationIssue::warning(format!(
                    "join node '{}' ({}) has a single input arc labeled '{}'",
                    node.name, node.id, label
                )));
            }
        }
    }

    issues
}
