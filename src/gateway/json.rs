//! JSON mapping shared by the HTTP and WebSocket gateways.

use crate::commands::{Command, CommandError, Reply};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

/// Body members that carry positional arguments, in argument order.
const POSITIONAL: [&str; 7] = [
    "key",
    "keys",
    "field",
    "fields",
    "value",
    "values",
    "key_values",
];

/// The envelope every HTTP response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub data: Value,
}

impl ApiResponse {
    pub fn success(data: Value) -> Self {
        Self {
            status: "success",
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            data: Value::String(message.into()),
        }
    }
}

/// Renders a reply as JSON. Errors become their message string.
pub fn reply_to_json(reply: &Reply) -> Value {
    match reply {
        Reply::Status(s) => Value::String(s.clone()),
        Reply::Integer(n) => Value::from(*n),
        Reply::Bulk(data) => Value::String(String::from_utf8_lossy(data).into_owned()),
        Reply::Nil => Value::Null,
        Reply::Array(items) => Value::Array(items.iter().map(reply_to_json).collect()),
        Reply::Error(err) => Value::String(err.to_string()),
    }
}

/// Builds a command from a verb and a JSON object body.
///
/// Positional arguments are taken from `key`, `keys`, `field`, `fields`,
/// `value`, `values` and `key_values`, in that order. Every other member is
/// a named option. `null` members are skipped.
pub fn command_from_body(name: &str, body: &Map<String, Value>) -> Result<Command, CommandError> {
    let mut command = Command::new(name);

    for member in POSITIONAL {
        let Some(value) = body.get(member) else {
            continue;
        };
        command = match (member, value) {
            (_, Value::Null) => command,
            ("keys" | "fields" | "values", Value::Array(items)) => {
                let args = items
                    .iter()
                    .map(|item| scalar(member, item))
                    .collect::<Result<Vec<_>, _>>()?;
                command.with_args(args)
            }
            ("key_values", Value::Object(pairs)) => {
                let mut command = command;
                for (field, value) in pairs {
                    command = command
                        .with_arg(Bytes::from(field.clone()))
                        .with_arg(scalar(member, value)?);
                }
                command
            }
            ("key_values", _) => {
                return Err(CommandError::invalid("'key_values' must be an object"));
            }
            (_, value) => command.with_arg(scalar(member, value)?),
        };
    }

    for (option, value) in body {
        if POSITIONAL.contains(&option.as_str()) || value.is_null() {
            continue;
        }
        command = command.with_option(option, scalar(option, value)?);
    }

    Ok(command)
}

/// A JSON scalar as argument bytes: strings verbatim, numbers and booleans
/// by their text.
fn scalar(member: &str, value: &Value) -> Result<Bytes, CommandError> {
    match value {
        Value::String(s) => Ok(Bytes::from(s.clone())),
        Value::Number(n) => Ok(Bytes::from(n.to_string())),
        Value::Bool(b) => Ok(Bytes::from(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(CommandError::invalid(format!(
            "'{}' must be a string, number or boolean",
            member
        ))),
    }
}
