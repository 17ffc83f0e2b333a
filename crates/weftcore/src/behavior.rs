use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::process::Process;
use crate::token::NodeToken;
use std::collections::HashMap;
use std::sync::Arc;

/// Type name every registry resolves; nodes with no specific behavior
/// declare it directly.
pub const DEFAULT_TYPE: &str = "default";

/// Verdict of a node's guard, evaluated when a node-token is ready to
/// fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResponse {
    /// Run the node's accept action.
    Accept,
    /// Complete the token without firing or fanning out.
    Discard,
    /// Complete the token along the named output label without running
    /// the accept action.
    Skip(String),
}

/// What an accept action decided to do with its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Finish the node and fan out along output arcs with this label.
    Complete(String),
    /// Leave the token parked; an external call resumes it later.
    Park,
}

impl AcceptOutcome {
    /// Complete along the empty label.
    pub fn complete_default() -> Self {
        AcceptOutcome::Complete(String::new())
    }
}

/// The pair of behaviors a node type contributes: a guard and an accept
/// action.
///
/// Guards must be pure with respect to process state. Accept actions may
/// interact with the engine backend (attributes, transaction boundaries)
/// and report how the token should proceed via [`AcceptOutcome`].
pub trait NodeBehavior: Send + Sync {
    /// Registry key, e.g. `"task.manual"`.
    fn type_name(&self) -> &str;

    fn guard(&self, _token: &NodeToken, _process: &Process) -> Result<GuardResponse> {
        Ok(GuardResponse::Accept)
    }

    fn accept(
        &self,
        engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome>;
}

/// Pass-through behavior: guard accepts, accept completes along the
/// empty label.
pub struct DefaultBehavior;

impl NodeBehavior for DefaultBehavior {
    fn type_name(&self) -> &str {
        DEFAULT_TYPE
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        _token: &NodeToken,
        _process: &mut Process,
    ) -> Result<AcceptOutcome> {
        Ok(AcceptOutcome::complete_default())
    }
}

/// Read-only (after construction) map from node type name to behavior.
pub struct NodeTypeRegistry {
    behaviors: HashMap<String, Arc<dyn NodeBehavior>>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
        }
    }

    /// A registry with the `default` behavior pre-registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DefaultBehavior));
        registry
    }

    pub fn register(&mut self, behavior: Arc<dyn NodeBehavior>) {
        let type_name = behavior.type_name().to_string();
        tracing::info!("Registering node type: {}", type_name);
        self.behaviors.insert(type_name, behavior);
    }

    /// Resolve a node's declared type. A missing entry is a fatal lookup
    /// failure for the interpreter.
    pub fn behavior_for(&self, type_name: &str) -> Result<Arc<dyn NodeBehavior>> {
        self.behaviors
            .get(type_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.behaviors.contains_key(type_name)
    }

    pub fn list_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.behaviors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeRegistry")
            .field("types", &self.list_type_names())
            .finish()
    }
}
