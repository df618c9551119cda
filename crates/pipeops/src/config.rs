use pipecore::{OperatorError, Value};
use std::collections::HashMap;

/// Optional string config entry; present with another type is an error.
pub(crate) fn optional_str<'a>(
    config: &'a HashMap<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, OperatorError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(type_mismatch(key, "string", other)),
    }
}

pub(crate) fn require_str<'a>(
    config: &'a HashMap<String, Value>,
    key: &str,
) -> Result<&'a str, OperatorError> {
    optional_str(config, key)?
        .ok_or_else(|| OperatorError::Configuration(format!("Missing config: {}", key)))
}

pub(crate) fn optional_u64(
    config: &HashMap<String, Value>,
    key: &str,
) -> Result<Option<u64>, OperatorError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Ok(Some(*n as u64)),
        Some(other) => Err(type_mismatch(key, "non-negative integer", other)),
    }
}

pub(crate) fn string_list(
    config: &HashMap<String, Value>,
    key: &str,
) -> Result<Vec<String>, OperatorError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_mismatch(key, "list of strings", item))
            })
            .collect(),
        Some(other) => Err(type_mismatch(key, "list of strings", other)),
    }
}

fn type_mismatch(key: &str, expected: &str, actual: &Value) -> OperatorError {
    OperatorError::Configuration(format!(
        "'{}' must be a {}, got {}",
        key,
        expected,
        actual.kind()
    ))
}
