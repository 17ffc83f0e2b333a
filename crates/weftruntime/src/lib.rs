//! Workflow execution runtime for weft.
//!
//! This crate holds the token interpreter (the state-machine loop that
//! moves tokens through a graph), the in-memory engine backend, graph
//! validation, and the [`WorkflowRuntime`] facade that binaries build
//! on.

mod interpreter;
mod memory;
mod runtime;
mod validation;

pub use interpreter::Interpreter;
pub use memory::MemoryEngine;
pub use runtime::{
    ArcTokenView, NodeTokenView, ProcessView, RuntimeConfig, WorkflowRuntime,
};
pub use validation::{has_errors, validate_graph, Severity, ValidationIssue};
