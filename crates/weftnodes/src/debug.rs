use weftcore::{AcceptOutcome, Engine, NodeBehavior, NodeToken, Process, Result};

/// Simple debug behavior that logs the token and its attributes before
/// passing through.
pub struct LogBehavior;

impl NodeBehavior for LogBehavior {
    fn type_name(&self) -> &str {
        "debug.log"
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome> {
        let node = process.node_for_token(token)?;
        tracing::info!("DEBUG: token {} at node '{}'", token.id, node.name);

        if let Some(attrs) = process.token_attrs(token.id) {
            for (key, value) in attrs {
                tracing::info!("  {}: {}", key, value);
            }
        }

        Ok(AcceptOutcome::complete_default())
    }
}
