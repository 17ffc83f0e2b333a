use crate::interpreter::Interpreter;
use crate::memory::MemoryEngine;
use crate::validation::{self, ValidationIssue};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use weftcore::{
    ArcId, EngineError, EventBus, Graph, GraphId, NodeId, NodeTypeRegistry, Process, ProcessEvent,
    ProcessId, TokenId, Value,
};

/// Serializable snapshot of one process, for CLIs and APIs.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessView {
    pub id: ProcessId,
    pub graph_id: GraphId,
    pub graph_name: String,
    pub complete: bool,
    pub node_tokens: Vec<NodeTokenView>,
    pub arc_tokens: Vec<ArcTokenView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeTokenView {
    pub token_id: TokenId,
    pub node_id: NodeId,
    pub node_name: String,
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcTokenView {
    pub token_id: TokenId,
    pub arc_id: ArcId,
    pub label: String,
}

impl ProcessView {
    fn snapshot(process: &Process) -> Self {
        let graph = process.graph();
        Self {
            id: process.id(),
            graph_id: graph.id(),
            graph_name: graph.name().to_string(),
            complete: process.is_complete(),
            node_tokens: process
                .node_tokens()
                .iter()
                .map(|t| {
                    let (node_name, node_type) = graph
                        .node(t.node)
                        .map(|n| (n.name.clone(), n.node_type.clone()))
                        .unwrap_or_default();
                    NodeTokenView {
                        token_id: t.id,
                        node_id: t.node,
                        node_name,
                        node_type,
                    }
                })
                .collect(),
            arc_tokens: process
                .arc_tokens()
                .iter()
                .map(|t| ArcTokenView {
                    token_id: t.id,
                    arc_id: t.arc,
                    label: graph
                        .arc(t.arc)
                        .map(|a| a.label.clone())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Reject graph registration when validation reports errors.
    pub validate_on_register: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1024,
            validate_on_register: true,
        }
    }
}

struct EngineState {
    engine: MemoryEngine,
    processes: HashMap<ProcessId, Process>,
}

/// Facade over the interpreter: keeps the registry, event bus, engine
/// backend, registered graphs, and live processes together, and
/// serializes all interpretation behind one lock.
pub struct WorkflowRuntime {
    registry: Arc<NodeTypeRegistry>,
    event_bus: Arc<EventBus>,
    interpreter: Interpreter,
    config: RuntimeConfig,
    graphs: RwLock<HashMap<GraphId, Arc<Graph>>>,
    state: Mutex<EngineState>,
}

impl WorkflowRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeTypeRegistry::standard()), config)
    }

    pub fn with_registry(registry: Arc<NodeTypeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            interpreter: Interpreter::new(event_bus.clone()),
            event_bus,
            config,
            graphs: RwLock::new(HashMap::new()),
            state: Mutex::new(EngineState {
                engine: MemoryEngine::new(),
                processes: HashMap::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ProcessEvent> {
        self.event_bus.subscribe()
    }

    /// Register a graph for later starts. With `validate_on_register`
    /// set, validation errors reject the graph; the issues are returned
    /// either way when they block registration.
    pub async fn register_graph(&self, graph: Graph) -> Result<GraphId, Vec<ValidationIssue>> {
        if self.config.validate_on_register {
            let issues = validation::validate_graph(&graph, &self.registry);
            if validation::has_errors(&issues) {
                return Err(issues);
            }
        }
        let id = graph.id();
        tracing::info!("Registered graph '{}' ({})", graph.name(), id);
        self.graphs.write().await.insert(id, Arc::new(graph));
        Ok(id)
    }

    pub async fn graph(&self, id: GraphId) -> Option<Arc<Graph>> {
        self.graphs.read().await.get(&id).cloned()
    }

    pub async fn list_graphs(&self) -> Vec<Arc<Graph>> {
        self.graphs.read().await.values().cloned().collect()
    }

    pub async fn remove_graph(&self, id: GraphId) -> bool {
        self.graphs.write().await.remove(&id).is_some()
    }

    /// Start a process on a registered graph and run it to quiescence.
    pub async fn start_process(
        &self,
        graph_id: GraphId,
        payload: Value,
    ) -> Result<ProcessView, EngineError> {
        let graph = self
            .graph(graph_id)
            .await
            .ok_or(EngineError::UnknownGraph(graph_id))?;

        let mut state = self.state.lock().await;
        let process =
            self.interpreter
                .start(&mut state.engine, graph, self.registry.clone(), payload)?;
        let view = ProcessView::snapshot(&process);
        state.processes.insert(process.id(), process);
        Ok(view)
    }

    pub async fn process_view(&self, id: ProcessId) -> Option<ProcessView> {
        self.state.lock().await.processes.get(&id).map(ProcessView::snapshot)
    }

    pub async fn list_processes(&self) -> Vec<ProcessView> {
        self.state
            .lock()
            .await
            .processes
            .values()
            .map(ProcessView::snapshot)
            .collect()
    }

    /// Finish a parked node-token along `label`, continuing the
    /// traversal it was holding up.
    pub async fn complete_task(
        &self,
        process_id: ProcessId,
        token_id: TokenId,
        label: &str,
    ) -> Result<ProcessView, EngineError> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let process = state
            .processes
            .get_mut(&process_id)
            .ok_or(EngineError::UnknownProcess(process_id))?;
        let token = *process
            .node_token(token_id)
            .ok_or(EngineError::UnknownToken(token_id))?;

        self.interpreter
            .complete_execution(&mut state.engine, &token, label, process)?;
        self.interpreter.emit_completed_if_done(process);
        Ok(ProcessView::snapshot(process))
    }

    /// Re-enter the guard of a parked node-token (external signal).
    pub async fn resume_token(
        &self,
        process_id: ProcessId,
        token_id: TokenId,
    ) -> Result<ProcessView, EngineError> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let process = state
            .processes
            .get_mut(&process_id)
            .ok_or(EngineError::UnknownProcess(process_id))?;
        let token = *process
            .node_token(token_id)
            .ok_or(EngineError::UnknownToken(token_id))?;

        self.interpreter
            .accept_with_guard(&mut state.engine, token, process)?;
        self.interpreter.emit_completed_if_done(process);
        Ok(ProcessView::snapshot(process))
    }

    /// Drop a finished process from the live table.
    pub async fn forget_process(&self, id: ProcessId) -> bool {
        self.state.lock().await.processes.remove(&id).is_some()
    }
}

impl Default for WorkflowRuntime {
    fn default() -> Self {
        Self::new()
    }
}
