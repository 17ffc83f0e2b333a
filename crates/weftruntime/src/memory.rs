use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::{
    ArcToken, Engine, Graph, GraphArc, NodeId, NodeToken, NodeTypeRegistry, Process, Result,
    TokenId, Value,
};

/// Non-durable engine backend.
///
/// Token ids come from a monotonically increasing counter, completion
/// and transaction boundaries are no-ops, and attribute propagation
/// copies each incoming parent's attribute set into the new token,
/// earlier incoming tokens winning on key conflicts.
pub struct MemoryEngine {
    next_token: u64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self { next_token: 0 }
    }

    fn next_token_id(&mut self) -> TokenId {
        self.next_token += 1;
        TokenId(self.next_token)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn create_process(
        &mut self,
        graph: Arc<Graph>,
        registry: Arc<NodeTypeRegistry>,
        payload: Value,
    ) -> Result<Process> {
        Ok(Process::new(Uuid::new_v4(), graph, registry, payload))
    }

    fn create_node_token(
        &mut self,
        process: &mut Process,
        node: NodeId,
        incoming: &[ArcToken],
    ) -> Result<NodeToken> {
        let token = NodeToken::new(self.next_token_id(), node);

        let mut attrs: HashMap<String, String> = HashMap::new();
        for arc_token in incoming {
            if let Some(parent_attrs) = process.token_attrs(arc_token.parent) {
                for (key, value) in parent_attrs {
                    attrs
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
        process.install_attr_set(token.id, attrs);
        Ok(token)
    }

    fn create_arc_token(
        &mut self,
        _process: &mut Process,
        arc: &GraphArc,
        parent: &NodeToken,
    ) -> Result<ArcToken> {
        Ok(ArcToken::new(self.next_token_id(), arc.id, parent.id))
    }

    fn complete_node_token(&mut self, process: &mut Process, token: &NodeToken) -> Result<()> {
        tracing::trace!("process {}: node token {} completed", process.id(), token.id);
        Ok(())
    }

    fn complete_arc_token(&mut self, process: &mut Process, token: &ArcToken) -> Result<()> {
        tracing::trace!("process {}: arc token {} completed", process.id(), token.id);
        Ok(())
    }

    fn transaction_boundary(&mut self) -> Result<()> {
        // Nothing pending to flush in memory.
        Ok(())
    }

    fn set_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
        value: &str,
    ) -> Result<()> {
        process.set_attr(token.id, key, value)
    }

    fn remove_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
    ) -> Result<()> {
        process.remove_attr(token.id, key)
    }
}
