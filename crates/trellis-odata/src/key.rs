//! Entity key encoding.
//!
//! Keys are encoded into the resource path the way the downstream service
//! addresses entities: a single-key entity as a bare literal
//! (`Customers(42)`), a composite key as `Name=Value` pairs in declared key
//! order (`OrderItems(OrderId=7,Line=2)`).
//!
//! Literal quoting is decided per value: values that read as integers,
//! decimals, or booleans are emitted unquoted; GUID-shaped values and
//! everything else string-like are single-quoted; a value that already
//! starts with a quote is passed through untouched. The same rule applies
//! to every operation that addresses an entity by key.

use crate::error::ServiceError;
use serde_json::Value;

/// Encode the key for an entity addressed by `arguments`.
///
/// `key_names` lists the key properties in declared order. All of them must
/// be present in `arguments`; missing names are collected into a single
/// validation error.
pub fn encode_key(
    key_names: &[String],
    arguments: &serde_json::Map<String, Value>,
) -> Result<String, ServiceError> {
    if key_names.is_empty() {
        return Err(ServiceError::Validation(
            "entity type declares no key properties".to_string(),
        ));
    }

    let missing: Vec<&str> = key_names
        .iter()
        .filter(|name| !arguments.contains_key(name.as_str()))
        .map(|name| name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "missing key propert{} {}",
            if missing.len() == 1 { "y" } else { "ies" },
            missing.join(", ")
        )));
    }

    if key_names.len() == 1 {
        let value = &arguments[&key_names[0]];
        return key_literal(&key_names[0], value);
    }

    let mut parts = Vec::with_capacity(key_names.len());
    for name in key_names {
        let literal = key_literal(name, &arguments[name])?;
        parts.push(format!("{name}={literal}"));
    }
    Ok(parts.join(","))
}

/// Render one key value as a path literal.
fn key_literal(name: &str, value: &Value) -> Result<String, ServiceError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::String(s) => Ok(string_key_literal(s)),
        _ => Err(ServiceError::Validation(format!(
            "key property '{name}' must be a string, number, or boolean"
        ))),
    }
}

/// Apply the quoting rule to a string-typed key value.
fn string_key_literal(value: &str) -> String {
    // Caller already quoted it; pass through.
    if value.starts_with('\'') {
        return value.to_string();
    }
    // GUIDs are quoted even though they look machine-readable.
    if uuid::Uuid::parse_str(value).is_ok() {
        return format!("'{value}'");
    }
    if is_numeric_or_boolean(value) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether a string value reads as an integer, decimal, or boolean literal.
fn is_numeric_or_boolean(value: &str) -> bool {
    value.parse::<i64>().is_ok()
        || value.parse::<u64>().is_ok()
        || is_plain_decimal(value)
        || value.parse::<bool>().is_ok()
}

/// A decimal/floating-point literal made only of digits, sign, separator
/// and exponent. Rules out `inf`/`NaN`, which `f64::from_str` accepts.
fn is_plain_decimal(value: &str) -> bool {
    if value.parse::<f64>().is_err() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
}
