use crate::graph::{ArcId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node- or arc-token. Allocated by the engine backend,
/// unique within one process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token parked at a node: either executing or awaiting external input.
///
/// Two node-tokens are the same token iff their ids are equal; the node
/// field is descriptive state, not identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeToken {
    pub id: TokenId,
    pub node: NodeId,
}

impl NodeToken {
    pub fn new(id: TokenId, node: NodeId) -> Self {
        Self { id, node }
    }
}

/// A token in transit along an arc, waiting to be consumed by the arc's
/// end node. Carries a back-reference to the node-token that produced it
/// so attribute propagation can reach the parent's attribute set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcToken {
    pub id: TokenId,
    pub arc: ArcId,
    pub parent: TokenId,
}

impl ArcToken {
    pub fn new(id: TokenId, arc: ArcId, parent: TokenId) -> Self {
        Self { id, arc, parent }
    }
}

/// One attribute entry of a node-token's attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAttr {
    pub key: String,
    pub value: String,
}

impl TokenAttr {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
