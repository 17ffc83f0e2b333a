//! Core abstractions for the weft workflow engine.
//!
//! This crate provides the graph, token, and process model that every
//! other component depends on, plus the two seams the system is built
//! around: the [`NodeBehavior`] trait (guard + accept action per node
//! type) and the [`Engine`] backend trait (all persistent state
//! transitions).

mod behavior;
mod engine;
mod error;
mod events;
mod graph;
mod process;
mod token;
mod value;

pub use behavior::{
    AcceptOutcome, DefaultBehavior, GuardResponse, NodeBehavior, NodeTypeRegistry, DEFAULT_TYPE,
};
pub use engine::Engine;
pub use error::{EngineError, GraphError, Result};
pub use events::{EventBus, ProcessEvent};
pub use graph::{
    ArcId, ArcSpec, Graph, GraphArc, GraphId, GraphSpec, Node, NodeId, NodeSource, NodeSpec,
    START_NODE_NAME,
};
pub use process::{Process, ProcessId};
pub use token::{ArcToken, NodeToken, TokenAttr, TokenId};
pub use value::Value;
