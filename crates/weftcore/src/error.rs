use crate::graph::{ArcId, GraphId, NodeId};
use crate::process::ProcessId;
use crate::token::TokenId;
use thiserror::Error;

/// Errors raised while assembling a [`crate::Graph`] from its parts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id {0} in graph definition")]
    DuplicateNodeId(NodeId),

    #[error("duplicate arc id {0} in graph definition")]
    DuplicateArcId(ArcId),

    #[error("arc {arc} references node {node}, which is not in the graph")]
    UnknownEndpoint { arc: ArcId, node: NodeId },
}

/// Errors surfaced by the interpreter and engine backends.
///
/// Only the start preconditions (`NoStartNode`, `MultipleStartNodes`) are
/// recoverable; the lookup variants indicate a violated invariant and the
/// interpreter makes no attempt to continue past them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("graph {0} has no start node")]
    NoStartNode(GraphId),

    #[error("graph {graph} has {count} start nodes, expected exactly one")]
    MultipleStartNodes { graph: GraphId, count: usize },

    #[error("graph {0} is not registered")]
    UnknownGraph(GraphId),

    #[error("process {0} is not live")]
    UnknownProcess(ProcessId),

    #[error("node {0} is not in the process graph")]
    UnknownNode(NodeId),

    #[error("arc {0} is not in the process graph")]
    UnknownArc(ArcId),

    #[error("no live node token with id {0}")]
    UnknownToken(TokenId),

    #[error("node type '{0}' is not registered")]
    UnknownNodeType(String),

    #[error("no attribute set for token {0}")]
    MissingAttributeSet(TokenId),

    /// Domain-specific failure raised by a guard or accept action.
    /// Propagated unchanged to the caller.
    #[error("node behavior failed: {0}")]
    Behavior(String),

    /// Failure reported by an engine backend. The backend owns rollback
    /// semantics at its next transaction boundary.
    #[error("engine backend failed: {0}")]
    Backend(String),
}

/// Result alias for interpreter and backend operations.
pub type Result<T> = std::result::Result<T, EngineError>;
