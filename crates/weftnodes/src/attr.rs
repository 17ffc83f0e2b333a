use weftcore::{AcceptOutcome, Engine, NodeBehavior, NodeToken, Process, Result, Value};

/// Writes attributes onto the passing token from node configuration.
///
/// Node extra keys:
/// - `set`: object of key → scalar; each entry becomes a token attribute
/// - `label`: output label to complete along (defaults to `""`)
///
/// Non-scalar values under `set` are skipped with a warning.
pub struct SetAttrBehavior;

impl NodeBehavior for SetAttrBehavior {
    fn type_name(&self) -> &str {
        "attr.set"
    }

    fn accept(
        &self,
        engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome> {
        let node = process.node_for_token(token)?;
        let label = node
            .extra
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut entries: Vec<(String, Option<String>)> = node
            .extra
            .get("set")
            .and_then(Value::as_object)
            .map(|set| {
                set.iter()
                    .map(|(key, value)| (key.clone(), value.to_attr_string()))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, value) in entries {
            match value {
                Some(value) => engine.set_token_attr(process, token, &key, &value)?,
                None => tracing::warn!("attr.set: skipping non-scalar value for key '{}'", key),
            }
        }

        Ok(AcceptOutcome::Complete(label))
    }
}
