use crate::error::GraphError;
use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type GraphId = Uuid;

/// Name a node must carry (at nesting depth 0) to act as the entry point
/// of its graph.
pub const START_NODE_NAME: &str = "start";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ArcId(pub u64);

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin descriptor for a node: which workflow definition it came from
/// and how deeply it is nested. Depth 0 marks top-level nodes; the start
/// predicate only matches at depth 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSource {
    pub workflow: String,
    pub version: u32,
    pub instance: String,
    pub depth: u32,
}

impl NodeSource {
    pub fn top_level(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            version: 1,
            instance: String::new(),
            depth: 0,
        }
    }

    pub fn nested(workflow: impl Into<String>, instance: impl Into<String>, depth: u32) -> Self {
        Self {
            workflow: workflow.into(),
            version: 1,
            instance: instance.into(),
            depth,
        }
    }
}

impl Default for NodeSource {
    fn default() -> Self {
        Self::top_level("")
    }
}

/// A node in a workflow graph. Immutable once the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub source: NodeSource,
    #[serde(default)]
    pub is_join: bool,
    /// Opaque per-node configuration, decoded by the node's behavior.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl Node {
    pub fn is_start(&self) -> bool {
        self.name == START_NODE_NAME && self.source.depth == 0
    }
}

/// A directed, labeled arc. Several arcs out of one node may share a
/// label; completing along that label fans out over all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphArc {
    pub id: ArcId,
    #[serde(default)]
    pub label: String,
    pub start_node: NodeId,
    pub end_node: NodeId,
}

/// Node description inside a [`GraphSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub source: NodeSource,
    #[serde(default)]
    pub is_join: bool,
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl NodeSpec {
    pub fn new(id: u64, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            node_type: node_type.into(),
            name: name.into(),
            source: NodeSource::default(),
            is_join: false,
            extra: HashMap::new(),
        }
    }

    pub fn join(mut self) -> Self {
        self.is_join = true;
        self
    }

    pub fn with_source(mut self, source: NodeSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Arc description inside a [`GraphSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcSpec {
    pub id: ArcId,
    #[serde(default)]
    pub label: String,
    pub from: NodeId,
    pub to: NodeId,
}

impl ArcSpec {
    pub fn new(id: u64, from: u64, to: u64, label: impl Into<String>) -> Self {
        Self {
            id: ArcId(id),
            label: label.into(),
            from: NodeId(from),
            to: NodeId(to),
        }
    }
}

/// Serializable description of a workflow graph, as produced by an editor
/// or written by hand. Turned into an indexed [`Graph`] via
/// [`Graph::from_spec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub id: GraphId,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub arcs: Vec<ArcSpec>,
}

impl GraphSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            arcs: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_arc(mut self, arc: ArcSpec) -> Self {
        self.arcs.push(arc);
        self
    }
}

/// An immutable workflow graph with per-node input/output arc indices.
///
/// Arc iteration order inside each index follows the order of the arc
/// list the graph was built from; the interpreter relies on that order
/// when fanning out.
#[derive(Debug, Clone)]
pub struct Graph {
    id: GraphId,
    name: String,
    nodes: HashMap<NodeId, Node>,
    node_order: Vec<NodeId>,
    arcs: HashMap<ArcId, GraphArc>,
    arc_order: Vec<ArcId>,
    inputs: HashMap<NodeId, Vec<ArcId>>,
    outputs: HashMap<NodeId, Vec<ArcId>>,
}

impl Graph {
    /// Index a node and arc list into a graph.
    ///
    /// Fails on duplicate node or arc ids and on arcs whose endpoints are
    /// not in the node list.
    pub fn build(
        id: GraphId,
        name: impl Into<String>,
        nodes: Vec<Node>,
        arcs: Vec<GraphArc>,
    ) -> Result<Self, GraphError> {
        let mut node_map = HashMap::with_capacity(nodes.len());
        let mut node_order = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node_map.contains_key(&node.id) {
                return Err(GraphError::DuplicateNodeId(node.id));
            }
            node_order.push(node.id);
            node_map.insert(node.id, node);
        }

        let mut arc_map = HashMap::with_capacity(arcs.len());
        let mut arc_order = Vec::with_capacity(arcs.len());
        let mut inputs: HashMap<NodeId, Vec<ArcId>> = HashMap::new();
        let mut outputs: HashMap<NodeId, Vec<ArcId>> = HashMap::new();
        for arc in arcs {
            if arc_map.contains_key(&arc.id) {
                return Err(GraphError::DuplicateArcId(arc.id));
            }
            for endpoint in [arc.start_node, arc.end_node] {
                if !node_map.contains_key(&endpoint) {
                    return Err(GraphError::UnknownEndpoint {
                        arc: arc.id,
                        node: endpoint,
                    });
                }
            }
            outputs.entry(arc.start_node).or_default().push(arc.id);
            inputs.entry(arc.end_node).or_default().push(arc.id);
            arc_order.push(arc.id);
            arc_map.insert(arc.id, arc);
        }

        Ok(Self {
            id,
            name: name.into(),
            nodes: node_map,
            node_order,
            arcs: arc_map,
            arc_order,
            inputs,
            outputs,
        })
    }

    pub fn from_spec(spec: GraphSpec) -> Result<Self, GraphError> {
        let nodes = spec
            .nodes
            .into_iter()
            .map(|n| Node {
                id: n.id,
                node_type: n.node_type,
                name: n.name,
                source: n.source,
                is_join: n.is_join,
                extra: n.extra,
            })
            .collect();
        let arcs = spec
            .arcs
            .into_iter()
            .map(|a| GraphArc {
                id: a.id,
                label: a.label,
                start_node: a.from,
                end_node: a.to,
            })
            .collect();
        Self::build(spec.id, spec.name, nodes, arcs)
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn arc(&self, id: ArcId) -> Option<&GraphArc> {
        self.arcs.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn arcs(&self) -> impl Iterator<Item = &GraphArc> {
        self.arc_order.iter().filter_map(|id| self.arcs.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Arcs whose end node is `node`, in construction order.
    pub fn input_arcs(&self, node: NodeId) -> impl Iterator<Item = &GraphArc> {
        self.inputs
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.arcs.get(id))
    }

    /// Arcs whose start node is `node`, in construction order.
    pub fn output_arcs(&self, node: NodeId) -> impl Iterator<Item = &GraphArc> {
        self.outputs
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.arcs.get(id))
    }

    /// Nodes satisfying the start predicate. A well-formed graph has
    /// exactly one; the interpreter enforces that at process start.
    pub fn start_nodes(&self) -> Vec<&Node> {
        self.nodes().filter(|n| n.is_start()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> GraphSpec {
        GraphSpec::new("diamond")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "default", "left"))
            .with_node(NodeSpec::new(3, "default", "right"))
            .with_node(NodeSpec::new(4, "default", "merge").join())
            .with_arc(ArcSpec::new(1, 1, 2, ""))
            .with_arc(ArcSpec::new(2, 1, 3, ""))
            .with_arc(ArcSpec::new(3, 2, 4, ""))
            .with_arc(ArcSpec::new(4, 3, 4, ""))
    }

    #[test]
    fn build_indexes_inputs_and_outputs() {
        let graph = Graph::from_spec(diamond()).unwrap();

        let out: Vec<ArcId> = graph.output_arcs(NodeId(1)).map(|a| a.id).collect();
        assert_eq!(out, vec![ArcId(1), ArcId(2)]);

        let inp: Vec<ArcId> = graph.input_arcs(NodeId(4)).map(|a| a.id).collect();
        assert_eq!(inp, vec![ArcId(3), ArcId(4)]);

        assert!(graph.output_arcs(NodeId(4)).next().is_none());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.arc_count(), 4);
    }

    #[test]
    fn build_rejects_duplicate_node_id() {
        let spec = GraphSpec::new("dup")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(1, "default", "again"));

        assert_eq!(
            Graph::from_spec(spec).unwrap_err(),
            GraphError::DuplicateNodeId(NodeId(1))
        );
    }

    #[test]
    fn build_rejects_dangling_arc() {
        let spec = GraphSpec::new("dangling")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_arc(ArcSpec::new(1, 1, 9, ""));

        assert_eq!(
            Graph::from_spec(spec).unwrap_err(),
            GraphError::UnknownEndpoint {
                arc: ArcId(1),
                node: NodeId(9)
            }
        );
    }

    #[test]
    fn start_predicate_requires_name_and_depth() {
        let spec = GraphSpec::new("starts")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(
                NodeSpec::new(2, "default", "start")
                    .with_source(NodeSource::nested("sub", "sub-1", 1)),
            );
        let graph = Graph::from_spec(spec).unwrap();

        let starts = graph.start_nodes();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].id, NodeId(1));
    }

    #[test]
    fn spec_roundtrips_through_json() {
        let json = serde_json::to_string(&diamond()).unwrap();
        let spec: GraphSpec = serde_json::from_str(&json).unwrap();
        let graph = Graph::from_spec(spec).unwrap();
        assert_eq!(graph.name(), "diamond");
        assert!(graph.node(NodeId(4)).unwrap().is_join);
    }
}
