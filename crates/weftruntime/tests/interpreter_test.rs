use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use weftcore::{
    AcceptOutcome, ArcId, ArcSpec, ArcToken, Engine, EngineError, EventBus, Graph, GraphArc,
    GraphSpec, GuardResponse, NodeBehavior, NodeId, NodeSpec, NodeToken, NodeTypeRegistry,
    Process, Result, TokenId, Value,
};
use weftruntime::{Interpreter, MemoryEngine};

/// Engine decorator that records every backend call, so scenarios can
/// assert call counts and creation order.
struct RecordingEngine {
    inner: MemoryEngine,
    created_node_tokens: Vec<NodeId>,
    completed_node_tokens: usize,
    created_arc_tokens: Vec<ArcId>,
    completed_arc_tokens: usize,
}

impl RecordingEngine {
    fn new() -> Self {
        Self {
            inner: MemoryEngine::new(),
            created_node_tokens: Vec::new(),
            completed_node_tokens: 0,
            created_arc_tokens: Vec::new(),
            completed_arc_tokens: 0,
        }
    }

    fn node_token_count(&self, node: NodeId) -> usize {
        self.created_node_tokens
            .iter()
            .filter(|n| **n == node)
            .count()
    }
}

impl Engine for RecordingEngine {
    fn create_process(
        &mut self,
        graph: Arc<Graph>,
        registry: Arc<NodeTypeRegistry>,
        payload: Value,
    ) -> Result<Process> {
        self.inner.create_process(graph, registry, payload)
    }

    fn create_node_token(
        &mut self,
        process: &mut Process,
        node: NodeId,
        incoming: &[ArcToken],
    ) -> Result<NodeToken> {
        self.created_node_tokens.push(node);
        self.inner.create_node_token(process, node, incoming)
    }

    fn create_arc_token(
        &mut self,
        process: &mut Process,
        arc: &GraphArc,
        parent: &NodeToken,
    ) -> Result<ArcToken> {
        self.created_arc_tokens.push(arc.id);
        self.inner.create_arc_token(process, arc, parent)
    }

    fn complete_node_token(&mut self, process: &mut Process, token: &NodeToken) -> Result<()> {
        self.completed_node_tokens += 1;
        self.inner.complete_node_token(process, token)
    }

    fn complete_arc_token(&mut self, process: &mut Process, token: &ArcToken) -> Result<()> {
        self.completed_arc_tokens += 1;
        self.inner.complete_arc_token(process, token)
    }

    fn transaction_boundary(&mut self) -> Result<()> {
        self.inner.transaction_boundary()
    }

    fn set_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.inner.set_token_attr(process, token, key, value)
    }

    fn remove_token_attr(
        &mut self,
        process: &mut Process,
        token: &NodeToken,
        key: &str,
    ) -> Result<()> {
        self.inner.remove_token_attr(process, token, key)
    }
}

/// Completes along a fixed label.
struct EmitLabel {
    type_name: &'static str,
    label: &'static str,
}

impl NodeBehavior for EmitLabel {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        _token: &NodeToken,
        _process: &mut Process,
    ) -> Result<AcceptOutcome> {
        Ok(AcceptOutcome::Complete(self.label.to_string()))
    }
}

/// Parks its token until an external completion.
struct ParkBehavior;

impl NodeBehavior for ParkBehavior {
    fn type_name(&self) -> &str {
        "park"
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        _token: &NodeToken,
        _process: &mut Process,
    ) -> Result<AcceptOutcome> {
        Ok(AcceptOutcome::Park)
    }
}

/// Guard discards; accept must never run.
struct DiscardGuard {
    accept_ran: Arc<AtomicBool>,
}

impl NodeBehavior for DiscardGuard {
    fn type_name(&self) -> &str {
        "discard.guard"
    }

    fn guard(&self, _token: &NodeToken, _process: &Process) -> Result<GuardResponse> {
        Ok(GuardResponse::Discard)
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        _token: &NodeToken,
        _process: &mut Process,
    ) -> Result<AcceptOutcome> {
        self.accept_ran.store(true, Ordering::SeqCst);
        Ok(AcceptOutcome::complete_default())
    }
}

/// Guard skips along a fixed label; accept must never run.
struct SkipGuard {
    label: &'static str,
}

impl NodeBehavior for SkipGuard {
    fn type_name(&self) -> &str {
        "skip.guard"
    }

    fn guard(&self, _token: &NodeToken, _process: &Process) -> Result<GuardResponse> {
        Ok(GuardResponse::Skip(self.label.to_string()))
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        _token: &NodeToken,
        _process: &mut Process,
    ) -> Result<AcceptOutcome> {
        panic!("accept ran on a skipped node");
    }
}

/// Sets an attribute on its own token, then completes.
struct SeedAttr;

impl NodeBehavior for SeedAttr {
    fn type_name(&self) -> &str {
        "attr.seed"
    }

    fn accept(
        &self,
        engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome> {
        engine.set_token_attr(process, token, "color", "green")?;
        Ok(AcceptOutcome::complete_default())
    }
}

/// Guard that always fails with a domain error.
struct FailingGuard;

impl NodeBehavior for FailingGuard {
    fn type_name(&self) -> &str {
        "guard.fails"
    }

    fn guard(&self, _token: &NodeToken, _process: &Process) -> Result<GuardResponse> {
        Err(EngineError::Behavior("ledger unavailable".to_string()))
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

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

fn interpreter() -> Interpreter {
    Interpreter::new(Arc::new(EventBus::new(256)))
}

fn registry_with(behaviors: Vec<Arc<dyn NodeBehavior>>) -> Arc<NodeTypeRegistry> {
    let mut registry = NodeTypeRegistry::standard();
    for behavior in behaviors {
        registry.register(behavior);
    }
    Arc::new(registry)
}

fn graph(spec: GraphSpec) -> Arc<Graph> {
    Arc::new(Graph::from_spec(spec).unwrap())
}

#[test]
fn linear_start_to_end_runs_to_completion() {
    init_tracing();
    let graph = graph(
        GraphSpec::new("linear")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "default", "end"))
            .with_arc(ArcSpec::new(1, 1, 2, "")),
    );
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry_with(vec![]), Value::Null)
        .unwrap();

    assert!(process.is_complete());
    assert_eq!(engine.created_node_tokens, vec![NodeId(1), NodeId(2)]);
    assert_eq!(engine.completed_node_tokens, 2);
    assert_eq!(engine.created_arc_tokens, vec![ArcId(1)]);
    assert_eq!(engine.completed_arc_tokens, 1);
}

#[test]
fn fan_out_follows_only_the_completed_label() {
    let graph = graph(
        GraphSpec::new("fan-out")
            .with_node(NodeSpec::new(1, "emit.a", "start"))
            .with_node(NodeSpec::new(2, "default", "on-a"))
            .with_node(NodeSpec::new(3, "default", "on-b"))
            .with_arc(ArcSpec::new(1, 1, 2, "a"))
            .with_arc(ArcSpec::new(2, 1, 3, "b")),
    );
    let registry = registry_with(vec![Arc::new(EmitLabel {
        type_name: "emit.a",
        label: "a",
    })]);
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    assert!(process.is_complete());
    assert_eq!(engine.node_token_count(NodeId(2)), 1);
    assert_eq!(engine.node_token_count(NodeId(3)), 0);
    assert_eq!(engine.created_arc_tokens, vec![ArcId(1)]);
}

fn split_join_spec(right_type: &str) -> GraphSpec {
    GraphSpec::new("split-join")
        .with_node(NodeSpec::new(1, "default", "start"))
        .with_node(NodeSpec::new(2, "default", "left"))
        .with_node(NodeSpec::new(3, right_type, "right"))
        .with_node(NodeSpec::new(4, "default", "merge").join())
        .with_arc(ArcSpec::new(1, 1, 2, ""))
        .with_arc(ArcSpec::new(2, 1, 3, ""))
        .with_arc(ArcSpec::new(3, 2, 4, ""))
        .with_arc(ArcSpec::new(4, 3, 4, ""))
}

#[test]
fn parallel_split_joins_once_depth_first() {
    let graph = graph(split_join_spec("default"));
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry_with(vec![]), Value::Null)
        .unwrap();

    assert!(process.is_complete());
    // Left subtree runs to its join wait before the right branch starts.
    assert_eq!(
        engine.created_node_tokens,
        vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
    );
    assert_eq!(engine.node_token_count(NodeId(4)), 1);
    assert_eq!(engine.completed_arc_tokens, 4);
}

#[test]
fn partial_join_waits_for_the_parked_branch() {
    init_tracing();
    let graph = graph(split_join_spec("park"));
    let registry = registry_with(vec![Arc::new(ParkBehavior)]);
    let interp = interpreter();
    let mut engine = RecordingEngine::new();

    let mut process = interp
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    assert!(!process.is_complete());
    assert_eq!(engine.node_token_count(NodeId(4)), 0);

    let parked: Vec<NodeToken> = process
        .node_tokens()
        .iter()
        .copied()
        .filter(|t| t.node == NodeId(3))
        .collect();
    assert_eq!(parked.len(), 1);
    assert_eq!(process.arc_tokens().len(), 1);
    assert_eq!(process.arc_tokens()[0].arc, ArcId(3));

    // Token ids stay pairwise distinct across both live lists.
    let mut ids: Vec<TokenId> = process.node_tokens().iter().map(|t| t.id).collect();
    ids.extend(process.arc_tokens().iter().map(|t| t.id));
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);

    // External completion of the parked task releases the join.
    interp
        .complete_default_execution(&mut engine, &parked[0], &mut process)
        .unwrap();
    assert!(process.is_complete());
    assert_eq!(engine.node_token_count(NodeId(4)), 1);
}

#[test]
fn discard_guard_completes_without_running_accept() {
    let accept_ran = Arc::new(AtomicBool::new(false));
    let graph = graph(
        GraphSpec::new("discard")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "discard.guard", "vetoed"))
            .with_arc(ArcSpec::new(1, 1, 2, "")),
    );
    let registry = registry_with(vec![Arc::new(DiscardGuard {
        accept_ran: accept_ran.clone(),
    })]);
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    assert!(process.is_complete());
    assert!(!accept_ran.load(Ordering::SeqCst));
    assert_eq!(engine.completed_node_tokens, 2);
}

#[test]
fn join_cohorts_are_partitioned_by_label() {
    let graph = graph(
        GraphSpec::new("labeled-join")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "emit.x", "left"))
            .with_node(NodeSpec::new(3, "emit.x", "right"))
            .with_node(NodeSpec::new(4, "default", "merge").join())
            .with_node(NodeSpec::new(5, "default", "other"))
            .with_arc(ArcSpec::new(1, 1, 2, ""))
            .with_arc(ArcSpec::new(2, 1, 3, ""))
            .with_arc(ArcSpec::new(3, 2, 4, "x"))
            .with_arc(ArcSpec::new(4, 3, 4, "x"))
            .with_arc(ArcSpec::new(5, 5, 4, "y")),
    );
    let registry = registry_with(vec![Arc::new(EmitLabel {
        type_name: "emit.x",
        label: "x",
    })]);
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    // The "x" cohort fires without any token on the "y" arc.
    assert!(process.is_complete());
    assert_eq!(engine.node_token_count(NodeId(4)), 1);
}

#[test]
fn surplus_tokens_on_one_arc_stay_live_after_a_join_fires() {
    // Two arcs from start to "left" put two tokens on the left→merge arc
    // while the right branch is parked.
    let graph = graph(
        GraphSpec::new("surplus")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "default", "left"))
            .with_node(NodeSpec::new(3, "park", "right"))
            .with_node(NodeSpec::new(4, "default", "merge").join())
            .with_arc(ArcSpec::new(1, 1, 2, ""))
            .with_arc(ArcSpec::new(2, 1, 2, ""))
            .with_arc(ArcSpec::new(3, 1, 3, ""))
            .with_arc(ArcSpec::new(4, 2, 4, ""))
            .with_arc(ArcSpec::new(5, 3, 4, "")),
    );
    let registry = registry_with(vec![Arc::new(ParkBehavior)]);
    let interp = interpreter();
    let mut engine = RecordingEngine::new();

    let mut process = interp
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    assert_eq!(process.arc_tokens().len(), 2);
    assert!(process.arc_tokens().iter().all(|t| t.arc == ArcId(4)));
    let older = process.arc_tokens().iter().map(|t| t.id).min().unwrap();

    let parked = *process
        .node_tokens()
        .iter()
        .find(|t| t.node == NodeId(3))
        .unwrap();
    interp
        .complete_default_execution(&mut engine, &parked, &mut process)
        .unwrap();

    // The join consumed the first token in list order (the most recently
    // arrived one); the older surplus token remains for a later firing.
    assert!(!process.is_complete());
    assert_eq!(process.arc_tokens().len(), 1);
    assert_eq!(process.arc_tokens()[0].arc, ArcId(4));
    assert_eq!(process.arc_tokens()[0].id, older);
    assert_eq!(engine.node_token_count(NodeId(4)), 1);
}

#[test]
fn skip_is_equivalent_to_accepting_and_completing_along_the_label() {
    let shape = |mid_type: &str| {
        GraphSpec::new("skip-law")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, mid_type, "mid"))
            .with_node(NodeSpec::new(3, "default", "end"))
            .with_arc(ArcSpec::new(1, 1, 2, ""))
            .with_arc(ArcSpec::new(2, 2, 3, "b"))
    };
    let registry = registry_with(vec![
        Arc::new(SkipGuard { label: "b" }),
        Arc::new(EmitLabel {
            type_name: "emit.b",
            label: "b",
        }),
    ]);

    let mut skipped = RecordingEngine::new();
    let skipped_process = interpreter()
        .start(
            &mut skipped,
            graph(shape("skip.guard")),
            registry.clone(),
            Value::Null,
        )
        .unwrap();

    let mut accepted = RecordingEngine::new();
    let accepted_process = interpreter()
        .start(
            &mut accepted,
            graph(shape("emit.b")),
            registry,
            Value::Null,
        )
        .unwrap();

    assert!(skipped_process.is_complete());
    assert!(accepted_process.is_complete());
    assert_eq!(skipped.created_node_tokens, accepted.created_node_tokens);
    assert_eq!(skipped.created_arc_tokens, accepted.created_arc_tokens);
    assert_eq!(
        skipped.completed_node_tokens,
        accepted.completed_node_tokens
    );
}

#[test]
fn default_execution_is_completion_along_the_empty_label() {
    let spec = || {
        GraphSpec::new("default-law")
            .with_node(NodeSpec::new(1, "park", "start"))
            .with_node(NodeSpec::new(2, "default", "end"))
            .with_arc(ArcSpec::new(1, 1, 2, ""))
    };
    let registry = registry_with(vec![Arc::new(ParkBehavior)]);
    let interp = interpreter();

    let mut engine_a = RecordingEngine::new();
    let mut via_default = interp
        .start(&mut engine_a, graph(spec()), registry.clone(), Value::Null)
        .unwrap();
    let token_a = via_default.node_tokens()[0];
    interp
        .complete_default_execution(&mut engine_a, &token_a, &mut via_default)
        .unwrap();

    let mut engine_b = RecordingEngine::new();
    let mut via_empty = interp
        .start(&mut engine_b, graph(spec()), registry, Value::Null)
        .unwrap();
    let token_b = via_empty.node_tokens()[0];
    interp
        .complete_execution(&mut engine_b, &token_b, "", &mut via_empty)
        .unwrap();

    assert!(via_default.is_complete());
    assert!(via_empty.is_complete());
    assert_eq!(engine_a.created_node_tokens, engine_b.created_node_tokens);
    assert_eq!(engine_a.created_arc_tokens, engine_b.created_arc_tokens);
}

#[test]
fn attributes_propagate_to_downstream_tokens() {
    let graph = graph(
        GraphSpec::new("attr-flow")
            .with_node(NodeSpec::new(1, "attr.seed", "start"))
            .with_node(NodeSpec::new(2, "park", "hold"))
            .with_arc(ArcSpec::new(1, 1, 2, "")),
    );
    let registry = registry_with(vec![Arc::new(SeedAttr), Arc::new(ParkBehavior)]);
    let mut engine = RecordingEngine::new();

    let process = interpreter()
        .start(&mut engine, graph, registry, Value::Null)
        .unwrap();

    let parked = process.node_tokens()[0];
    assert_eq!(parked.node, NodeId(2));
    assert_eq!(process.attr_value(&parked, "color"), Some("green"));
}

#[test]
fn start_requires_exactly_one_start_node() {
    let none = graph(GraphSpec::new("none").with_node(NodeSpec::new(1, "default", "first")));
    let err = interpreter()
        .start(
            &mut MemoryEngine::new(),
            none,
            registry_with(vec![]),
            Value::Null,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::NoStartNode(_)));

    let two = graph(
        GraphSpec::new("two")
            .with_node(NodeSpec::new(1, "default", "start"))
            .with_node(NodeSpec::new(2, "default", "start")),
    );
    let err = interpreter()
        .start(
            &mut MemoryEngine::new(),
            two,
            registry_with(vec![]),
            Value::Null,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::MultipleStartNodes { count: 2, .. }
    ));
}

#[test]
fn unknown_node_type_fails_interpretation() {
    let graph = graph(GraphSpec::new("ghost").with_node(NodeSpec::new(1, "ghost.type", "start")));
    let err = interpreter()
        .start(
            &mut MemoryEngine::new(),
            graph,
            registry_with(vec![]),
            Value::Null,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownNodeType(name) if name == "ghost.type"));
}

#[test]
fn guard_errors_propagate_unchanged() {
    let graph = graph(GraphSpec::new("failing").with_node(NodeSpec::new(1, "guard.fails", "start")));
    let err = interpreter()
        .start(
            &mut MemoryEngine::new(),
            graph,
            registry_with(vec![Arc::new(FailingGuard)]),
            Value::Null,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Behavior(msg) if msg == "ledger unavailable"));
}
