use crate::behavior::NodeTypeRegistry;
use crate::error::{EngineError, Result};
use crate::graph::{Graph, GraphArc, Node};
use crate::token::{ArcToken, NodeToken, TokenAttr, TokenId};
use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub type ProcessId = Uuid;

/// Mutable state of one running workflow instance.
///
/// The graph and registry are shared, read-only references; the token
/// lists, attribute map, and payload are exclusively owned. All
/// persistent mutation flows through an [`crate::Engine`] backend, which
/// uses the mutators here to keep the in-memory view current.
#[derive(Debug, Clone)]
pub struct Process {
    id: ProcessId,
    graph: Arc<Graph>,
    registry: Arc<NodeTypeRegistry>,
    node_tokens: Vec<NodeToken>,
    arc_tokens: Vec<ArcToken>,
    attrs: HashMap<TokenId, HashMap<String, String>>,
    payload: Value,
}

impl Process {
    pub fn new(
        id: ProcessId,
        graph: Arc<Graph>,
        registry: Arc<NodeTypeRegistry>,
        payload: Value,
    ) -> Self {
        Self {
            id,
            graph,
            registry,
            node_tokens: Vec::new(),
            arc_tokens: Vec::new(),
            attrs: HashMap::new(),
            payload,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }

    /// A process is complete iff no node-token and no arc-token is live.
    /// A parked node-token (idle human task) keeps the process open.
    pub fn is_complete(&self) -> bool {
        self.node_tokens.is_empty() && self.arc_tokens.is_empty()
    }

    // ---- live token lists -------------------------------------------------

    pub fn node_tokens(&self) -> &[NodeToken] {
        &self.node_tokens
    }

    pub fn arc_tokens(&self) -> &[ArcToken] {
        &self.arc_tokens
    }

    /// Prepend a node-token to the live list.
    pub fn push_node_token(&mut self, token: NodeToken) {
        self.node_tokens.insert(0, token);
    }

    /// Remove the first live node-token with the given token's id.
    pub fn remove_node_token(&mut self, token: &NodeToken) {
        if let Some(pos) = self.node_tokens.iter().position(|t| t.id == token.id) {
            self.node_tokens.remove(pos);
        }
    }

    /// Prepend an arc-token to the live list.
    pub fn push_arc_token(&mut self, token: ArcToken) {
        self.arc_tokens.insert(0, token);
    }

    /// Remove the first live arc-token with the given token's id.
    pub fn remove_arc_token(&mut self, token: &ArcToken) {
        if let Some(pos) = self.arc_tokens.iter().position(|t| t.id == token.id) {
            self.arc_tokens.remove(pos);
        }
    }

    /// Look up a live node-token by id.
    pub fn node_token(&self, id: TokenId) -> Option<&NodeToken> {
        self.node_tokens.iter().find(|t| t.id == id)
    }

    // ---- graph lookups ----------------------------------------------------

    /// Resolve the node a token sits at. A miss is an invariant violation.
    pub fn node_for_token(&self, token: &NodeToken) -> Result<&Node> {
        self.graph
            .node(token.node)
            .ok_or(EngineError::UnknownNode(token.node))
    }

    /// Resolve the arc a token travels along. A miss is an invariant
    /// violation.
    pub fn arc_for_token(&self, token: &ArcToken) -> Result<&GraphArc> {
        self.graph
            .arc(token.arc)
            .ok_or(EngineError::UnknownArc(token.arc))
    }

    // ---- attribute map ----------------------------------------------------
    //
    // Attribute sets are installed by the engine backend when it creates a
    // node-token and stay readable for the process lifetime: a join reads
    // the sets of parents that completed long before it fires.

    /// Install (or replace) the attribute set for a token. Backend-facing.
    pub fn install_attr_set(&mut self, token: TokenId, attrs: HashMap<String, String>) {
        self.attrs.insert(token, attrs);
    }

    /// The attribute set of a token, if one was installed.
    pub fn token_attrs(&self, token: TokenId) -> Option<&HashMap<String, String>> {
        self.attrs.get(&token)
    }

    /// Value of one attribute on a node-token. Keys are unique per token;
    /// setting a key replaces its prior value.
    pub fn attr_value(&self, token: &NodeToken, key: &str) -> Option<&str> {
        self.attrs
            .get(&token.id)
            .and_then(|set| set.get(key))
            .map(String::as_str)
    }

    /// Set one attribute. Backend-facing; fails if the token has no
    /// attribute set installed.
    pub fn set_attr(&mut self, token: TokenId, key: &str, value: &str) -> Result<()> {
        let set = self
            .attrs
            .get_mut(&token)
            .ok_or(EngineError::MissingAttributeSet(token))?;
        set.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove one attribute. Backend-facing; fails if the token has no
    /// attribute set installed.
    pub fn remove_attr(&mut self, token: TokenId, key: &str) -> Result<()> {
        let set = self
            .attrs
            .get_mut(&token)
            .ok_or(EngineError::MissingAttributeSet(token))?;
        set.remove(key);
        Ok(())
    }

    /// Replace a token's whole attribute set with the given entries.
    /// Later entries win on duplicate keys.
    pub fn replace_token_attrs(&mut self, token: TokenId, attrs: Vec<TokenAttr>) {
        let set = attrs
            .into_iter()
            .map(|a| (a.key, a.value))
            .collect::<HashMap<_, _>>();
        self.attrs.insert(token, set);
    }
}
