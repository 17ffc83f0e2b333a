use crate::behavior::NodeTypeRegistry;
use crate::error::Result;
use crate::graph::{Graph, GraphArc, NodeId};
use crate::process::Process;
use crate::token::{ArcToken, NodeToken};
use crate::Value;
use std::sync::Arc;

/// Capability set every engine backend implements.
///
/// All persistent state transitions flow through this trait so a backend
/// can record them; the interpreter never mutates persistent state
/// directly. Token identities are allocated here and must stay unique for
/// the lifetime of a process. Backends update the in-memory [`Process`]
/// through its backend-facing mutators so the interpreter always sees a
/// current view.
pub trait Engine: Send {
    /// Materialize a fresh process over a graph and registry.
    fn create_process(
        &mut self,
        graph: Arc<Graph>,
        registry: Arc<NodeTypeRegistry>,
        payload: Value,
    ) -> Result<Process>;

    /// Allocate a node-token at `node`, installing its attribute set.
    /// `incoming` carries the arc-tokens being consumed; how their
    /// parents' attributes propagate into the new set is backend policy.
    fn create_node_token(
        &mut self,
        process: &mut Process,
        node: NodeId,
        incoming: &[ArcToken],
    ) -> Result<NodeToken>;

    /// Allocate an arc-token on `arc`, produced by `parent`.
    fn create_arc_token(
        &mut self,
        process: &mut Process,
        arc: &GraphArc,
        parent: &NodeToken,
    ) -> Result<ArcToken>;

    /// Mark a node-token completed in persistence. The interpreter owns
    /// the live-list removal.
    fn complete_node_token(&mut self, process: &mut Process, token: &NodeToken) -> Result<()>;

    /// Mark an arc-token completed in persistence.
    fn complete_arc_token(&mut self, process: &mut Process, token: &ArcToken) -> Result<()>;

    /// Flush pending work and commit. Called by node-type accept actions
    /// when they want to bound atomicity; the interpreter itself never
    /// calls it.
    fn transaction_boundary(&mut self) -> Result<()>;

    /// Set one attribute on a node-token, replacing any prior value for
    /// the key.
    fn set_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Remove one attribute from a node-token.
    fn remove_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
    ) -> Result<()>;
}
