use weftcore::{
    AcceptOutcome, Engine, GuardResponse, NodeBehavior, NodeToken, Process, Result, Value,
};

/// Attribute-driven branch point.
///
/// Node extra keys:
/// - `require`: attribute key the arriving token must carry to pass
/// - `otherwise`: `"discard"` or a label to skip along when the
///   attribute is absent (defaults to discard)
/// - `label`: output label to complete along when the token passes
///   (defaults to `""`)
///
/// Without a `require` key the gate is a pass-through.
pub struct AttrGateBehavior;

impl AttrGateBehavior {
    fn extra_str<'a>(process: &'a Process, token: &NodeToken, key: &str) -> Result<Option<&'a str>> {
        Ok(process
            .node_for_token(token)?
            .extra
            .get(key)
            .and_then(Value::as_str))
    }
}

impl NodeBehavior for AttrGateBehavior {
    fn type_name(&self) -> &str {
        "gate.attr"
    }

    fn guard(&self, token: &NodeToken, process: &Process) -> Result<GuardResponse> {
        let Some(required) = Self::extra_str(process, token, "require")? else {
            return Ok(GuardResponse::Accept);
        };
        if process.attr_value(token, required).is_some() {
            return Ok(GuardResponse::Accept);
        }

        match Self::extra_str(process, token, "otherwise")? {
            None | Some("discard") => Ok(GuardResponse::Discard),
            Some(label) => Ok(GuardResponse::Skip(label.to_string())),
        }
    }

    fn accept(
        &self,
        _engine: &mut dyn Engine,
        token: &NodeToken,
        process: &mut Process,
    ) -> Result<AcceptOutcome> {
        let label = Self::extra_str(process, token, "label")?
            .unwrap_or_default()
            .to_string();
        Ok(AcceptOutcome::Complete(label))
    }
}
