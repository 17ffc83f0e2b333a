use weftcore::{AcceptOutcome, Engine, NodeBehavior, NodeToken, Process, Result};

/// Human-task behavior: parks the token until someone finishes it
/// externally, typically through the runtime's task-completion call,
/// choosing the output label ("approved", "rejected", ...).
pub struct ManualTaskBehavior;

impl NodeBehavior for ManualTaskBehavior {
    fn type_name(&self) -> &str {
        "task.manual"
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome> {
        let node = process.node_for_token(token)?;
        tracing::info!(
            "Task '{}' waiting on external completion (token {})",
            node.name,
            token.id
        );
        Ok(AcceptOutcome::Park)
    }
}
