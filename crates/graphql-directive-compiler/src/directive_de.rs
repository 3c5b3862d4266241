use async_graphql_parser::{types::ConstDirective, Positioned};
use serde::de::DeserializeOwned;

use crate::rules::visitor::RuleError;

/// Deserializes the arguments of a directive into `T`.
pub(crate) fn parse_directive<T: DeserializeOwned>(directive: &Positioned<ConstDirective>) -> Result<T, RuleError> {
    let name = &directive.node.name.node;

    let arguments = directive
        .node
        .arguments
        .iter()
        .map(|(argument, value)| {
            let value = value.node.clone().into_json().map_err(|error| {
                RuleError::new(
                    vec![value.pos],
                    format!("Argument '{}' of @{name} is not valid: {error}", argument.node),
                )
            })?;

            Ok((argument.node.to_string(), value))
        })
        .collect::<Result<serde_json::Map<_, _>, RuleError>>()?;

    serde_json::from_value(serde_json::Value::Object(arguments))
        .map_err(|error| RuleError::new(vec![directive.pos], format!("Unable to parse @{name}: {error}")))
}
