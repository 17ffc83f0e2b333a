use chrono::Utc;
use std::sync::Arc;
use weftcore::{
    AcceptOutcome, ArcToken, Engine, EngineError, EventBus, Graph, GraphArc, GuardResponse,
    NodeId, NodeToken, NodeTypeRegistry, Process, ProcessEvent, Result, Value,
};

/// The graph-interpretation loop: moves tokens across nodes and arcs,
/// firing node behaviors when their activation conditions hold.
///
/// Interpretation is single-threaded and synchronous with respect to one
/// process: each entry point runs depth-first to a quiescent state (no
/// arc-token left that can fire, every remaining node-token parked)
/// before returning. Concurrent access to one process must be serialized
/// by the caller.
pub struct Interpreter {
    events: Arc<EventBus>,
}

impl Interpreter {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }

    /// Create a process over `graph` and run it from its start node.
    ///
    /// The start node is the unique node named `start` at nesting depth
    /// 0; zero or several such nodes fail before any state is created.
    pub fn start(
        &self,
        engine: &mut dyn Engine,
        graph: Arc<Graph>,
        registry: Arc<NodeTypeRegistry>,
        payload: Value,
    ) -> Result<Process> {
        let start_node = {
            let starts = graph.start_nodes();
            match starts.len() {
                0 => return Err(EngineError::NoStartNode(graph.id())),
                1 => starts[0].id,
                count => {
                    return Err(EngineError::MultipleStartNodes {
                        graph: graph.id(),
                        count,
                    })
                }
            }
        };

        let mut process = engine.create_process(graph.clone(), registry, payload)?;
        tracing::info!(
            "Starting process {} on graph '{}'",
            process.id(),
            graph.name()
        );
        self.events.emit(ProcessEvent::ProcessStarted {
            process_id: process.id(),
            graph_id: graph.id(),
            graph_name: graph.name().to_string(),
            timestamp: Utc::now(),
        });

        let token = engine.create_node_token(&mut process, start_node, &[])?;
        process.push_node_token(token);
        self.emit_node_token_created(&process, &token);

        self.accept_with_guard(engine, token, &mut process)?;
        self.emit_completed_if_done(&process);
        Ok(process)
    }

    /// Fire the node a live token sits at, mediated by its guard.
    ///
    /// Also the re-entry point for resuming a parked node-token on
    /// external signal.
    pub fn accept_with_guard(
        &self,
        engine: &mut dyn Engine,
        token: NodeToken,
        process: &mut Process,
    ) -> Result<()> {
        let node = process.node_for_token(&token)?.clone();
        let behavior = process.registry().behavior_for(&node.node_type)?;

        match behavior.guard(&token, process)? {
            GuardResponse::Accept => {
                tracing::debug!(
                    "Token {} accepted at node '{}' ({})",
                    token.id,
                    node.name,
                    node.node_type
                );
                match behavior.accept(engine, &token, process)? {
                    AcceptOutcome::Complete(label) => {
                        self.complete_execution(engine, &token, &label, process)
                    }
                    AcceptOutcome::Park => {
                        tracing::debug!("Token {} parked at node '{}'", token.id, node.name);
                        self.events.emit(ProcessEvent::NodeParked {
                            process_id: process.id(),
                            token_id: token.id,
                            node_id: token.node,
                            node_name: node.name,
                            timestamp: Utc::now(),
                        });
                        Ok(())
                    }
                }
            }
            GuardResponse::Discard => {
                tracing::debug!("Token {} discarded at node '{}'", token.id, node.name);
                engine.complete_node_token(process, &token)?;
                process.remove_node_token(&token);
                self.events.emit(ProcessEvent::NodeDiscarded {
                    process_id: process.id(),
                    token_id: token.id,
                    node_id: token.node,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            GuardResponse::Skip(label) => {
                tracing::debug!(
                    "Token {} skipped at node '{}' along '{}'",
                    token.id,
                    node.name,
                    label
                );
                self.events.emit(ProcessEvent::NodeSkipped {
                    process_id: process.id(),
                    token_id: token.id,
                    node_id: token.node,
                    label: label.clone(),
                    timestamp: Utc::now(),
                });
                self.complete_execution(engine, &token, &label, process)
            }
        }
    }

    /// Finish a node-token and fan out along every output arc of its
    /// node whose label equals `label`.
    ///
    /// Arcs are traversed in graph order, strictly depth-first: each
    /// arc-token is fully processed, including any joins and node fires
    /// it transitively causes, before the next output arc is started.
    /// The empty label is legal and matches arcs labeled with the empty
    /// string.
    pub fn complete_execution(
        &self,
        engine: &mut dyn Engine,
        token: &NodeToken,
        label: &str,
        process: &mut Process,
    ) -> Result<()> {
        engine.complete_node_token(process, token)?;
        process.remove_node_token(token);
        self.events.emit(ProcessEvent::NodeTokenCompleted {
            process_id: process.id(),
            token_id: token.id,
            node_id: token.node,
            label: label.to_string(),
            timestamp: Utc::now(),
        });

        let graph = process.graph().clone();
        let matching: Vec<GraphArc> = graph
            .output_arcs(token.node)
            .filter(|arc| arc.label == label)
            .cloned()
            .collect();

        for arc in &matching {
            let arc_token = engine.create_arc_token(process, arc, token)?;
            self.events.emit(ProcessEvent::ArcTokenCreated {
                process_id: process.id(),
                token_id: arc_token.id,
                arc_id: arc.id,
                label: arc.label.clone(),
                timestamp: Utc::now(),
            });
            self.accept_token(engine, arc_token, process)?;
        }
        Ok(())
    }

    /// [`Interpreter::complete_execution`] along the empty label.
    pub fn complete_default_execution(
        &self,
        engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<()> {
        self.complete_execution(engine, token, "", process)
    }

    /// Deliver an arc-token at its target node: non-join nodes fire
    /// immediately, join nodes wait for their cohort.
    fn accept_token(
        &self,
        engine: &mut dyn Engine,
        arc_token: ArcToken,
        process: &mut Process,
    ) -> Result<()> {
        let graph = process.graph().clone();
        let arc = graph
            .arc(arc_token.arc)
            .ok_or(EngineError::UnknownArc(arc_token.arc))?;
        let target = graph
            .node(arc.end_node)
            .ok_or(EngineError::UnknownNode(arc.end_node))?;

        if target.is_join {
            self.accept_join(engine, arc_token, process)
        } else {
            self.accept_single(engine, arc_token, target.id, process)
        }
    }

    fn accept_single(
        &self,
        engine: &mut dyn Engine,
        arc_token: ArcToken,
        target: NodeId,
        process: &mut Process,
    ) -> Result<()> {
        let token = engine.create_node_token(process, target, std::slice::from_ref(&arc_token))?;
        engine.complete_arc_token(process, &arc_token)?;
        self.emit_arc_token_completed(process, &arc_token);

        process.push_node_token(token);
        self.emit_node_token_created(process, &token);
        self.accept_with_guard(engine, token, process)
    }

    /// The join-completion predicate.
    ///
    /// A join fires when, for every input arc of the target sharing the
    /// arriving token's label, at least one live arc-token is pending.
    /// Arcs with other labels into the same node form independent
    /// cohorts. When several tokens wait on one arc the first in list
    /// order is consumed; the surplus stays live for later firings.
    fn accept_join(
        &self,
        engine: &mut dyn Engine,
        arc_token: ArcToken,
        process: &mut Process,
    ) -> Result<()> {
        process.push_arc_token(arc_token);

        let graph = process.graph().clone();
        let arc = graph
            .arc(arc_token.arc)
            .ok_or(EngineError::UnknownArc(arc_token.arc))?;
        let target = arc.end_node;

        let cohort_arcs: Vec<_> = graph
            .input_arcs(target)
            .filter(|input| input.label == arc.label)
            .map(|input| input.id)
            .collect();

        let mut input_tokens = Vec::with_capacity(cohort_arcs.len());
        for arc_id in &cohort_arcs {
            match process.arc_tokens().iter().find(|t| t.arc == *arc_id) {
                Some(waiting) => input_tokens.push(*waiting),
                // Cohort incomplete; the arriving token stays parked.
                None => return Ok(()),
            }
        }

        tracing::debug!(
            "Join at node {} fires on label '{}' with {} inputs",
            target,
            arc.label,
            input_tokens.len()
        );

        let token = engine.create_node_token(process, target, &input_tokens)?;
        for input in &input_tokens {
            process.remove_arc_token(input);
        }
        for input in &input_tokens {
            engine.complete_arc_token(process, input)?;
            self.emit_arc_token_completed(process, input);
        }

        process.push_node_token(token);
        self.emit_node_token_created(process, &token);
        self.accept_with_guard(engine, token, process)
    }

    /// True iff both live token lists are empty. A parked node-token
    /// keeps the process open.
    pub fn is_complete(process: &Process) -> bool {
        process.is_complete()
    }

    /// Emit `ProcessCompleted` when a top-level call drove the process
    /// to completion.
    pub fn emit_completed_if_done(&self, process: &Process) {
        if process.is_complete() {
            tracing::info!("Process {} completed", process.id());
            self.events.emit(ProcessEvent::ProcessCompleted {
                process_id: process.id(),
                timestamp: Utc::now(),
            });
        }
    }

    fn emit_node_token_created(&self, process: &Process, token: &NodeToken) {
        let (name, node_type) = process
            .graph()
            .node(token.node)
            .map(|n| (n.name.clone(), n.node_type.clone()))
            .unwrap_or_default();
        self.events.emit(ProcessEvent::NodeTokenCreated {
            process_id: process.id(),
            token_id: token.id,
            node_id: token.node,
            node_name: name,
            node_type,
            timestamp: Utc::now(),
        });
    }

    fn emit_arc_token_completed(&self, process: &Process, token: &ArcToken) {
        self.events.emit(ProcessEvent::ArcTokenCompleted {
            process_id: process.id(),
            token_id: token.id,
            arc_id: token.arc,
            timestamp: Utc::now(),
        });
    }
}
