//! Directive parsing
//!
//! Both provenances of a tool call end up as the same [`ToolCallDescriptor`]:
//! structured `tool_use` stream events and inline text directives.

use super::literal::parse_literal;
use crate::error::TurnError;
use serde_json::{Map, Value};

/// Name used when an inline directive carries only the arguments mapping
pub const DEFAULT_TOOL_NAME: &str = "generate_image";

/// Argument field names, in lookup order
const ARGUMENT_KEYS: &[&str] = &["arguments", "parameters", "input"];

/// A parsed tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDescriptor {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallDescriptor {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// String argument, if present and a string
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Parse the text captured between inline delimiters.
///
/// The payload is either a full call (`{'name': ..., 'arguments': {...}}`) or
/// just the arguments mapping, in which case the name defaults to
/// [`DEFAULT_TOOL_NAME`].
///
/// # Errors
/// A parse error if the text is not a literal mapping; a protocol error if it
/// names a tool but carries no arguments.
pub fn parse_inline(payload: &str) -> Result<ToolCallDescriptor, TurnError> {
    let value = parse_literal(payload)
        .map_err(|e| TurnError::parse(format!("malformed directive: {e}")))?;

    let Value::Object(mut fields) = value else {
        return Err(TurnError::parse("malformed directive: expected a mapping"));
    };

    let name = fields.get("name").and_then(Value::as_str).map(str::to_string);
    match name {
        Some(name) => {
            fields.remove("name");
            let arguments = take_arguments(&mut fields)?;
            Ok(ToolCallDescriptor::new(name, arguments))
        }
        None => Ok(ToolCallDescriptor::new(DEFAULT_TOOL_NAME, fields)),
    }
}

/// Normalize a structured `tool_use` event.
///
/// # Errors
/// A protocol error if the event has no usable arguments field.
pub fn parse_structured(
    name: &str,
    mut fields: Map<String, Value>,
) -> Result<ToolCallDescriptor, TurnError> {
    let arguments = take_arguments(&mut fields)?;
    Ok(ToolCallDescriptor::new(name, arguments))
}

fn take_arguments(fields: &mut Map<String, Value>) -> Result<Map<String, Value>, TurnError> {
    let value = ARGUMENT_KEYS
        .iter()
        .find_map(|key| fields.remove(*key))
        .ok_or_else(|| TurnError::protocol("invalid descriptor: missing arguments"))?;

    match value {
        Value::Object(map) => Ok(map),
        // Some providers send the arguments as an encoded string
        Value::String(encoded) => match parse_literal(&encoded) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(TurnError::protocol(
                "invalid descriptor: arguments are not a mapping",
            )),
        },
        Value::Null => Err(TurnError::protocol("invalid descriptor: missing arguments")),
        _ => Err(TurnError::protocol(
            "invalid descriptor: arguments are not a mapping",
        )),
    }
}
