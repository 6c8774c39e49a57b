//! Coercion of arbitrary front matter values into the shape of a field type.
//!
//! Coercion never fails: anything that cannot be converted is replaced by the
//! field's default. Select membership is not checked here, see
//! [`SchemaField::coerce`](super::SchemaField::coerce).

use serde_json::{Number, Value};

use super::FieldType;
use crate::markdown::front_matter::parse_number;
use crate::path;

/// Extension stripped from relation values.
const RECORD_SUFFIX: &str = ".md";

/// Converts `value` into the shape of `field_type`, falling back to `default`.
///
/// An absent value (`None`) always yields the default.
pub fn coerce(value: Option<&Value>, field_type: FieldType, default: &Value) -> Value {
    let Some(value) = value else {
        return default.clone();
    };

    let coerced = match field_type {
        FieldType::Text | FieldType::SelectText => to_text(value).map(Value::String),
        FieldType::Number | FieldType::SelectNumber => to_number(value).map(Value::Number),
        FieldType::Boolean => to_bool(value).map(Value::Bool),
        FieldType::MultiText | FieldType::MultiSelectText => to_list(value).map(|items| {
            items
                .iter()
                .map(|item| Value::String(to_text(item).unwrap_or_default()))
                .collect()
        }),
        FieldType::MultiNumber | FieldType::MultiSelectNumber => to_list(value).map(|items| {
            items
                .iter()
                .map(|item| Value::Number(to_number(item).unwrap_or_else(|| Number::from(0))))
                .collect()
        }),
        FieldType::MultiBoolean => to_list(value).map(|items| {
            items
                .iter()
                .map(|item| Value::Bool(to_bool(item).unwrap_or(false)))
                .collect()
        }),
        FieldType::Relation => relation_id(value).map(Value::String),
        FieldType::MultiRelation => to_list(value)
            .map(|items| items.iter().filter_map(relation_id).map(Value::String).collect()),
    };

    coerced.unwrap_or_else(|| default.clone())
}

/// Whether `value` already has the shape `field_type` produces.
pub fn has_shape(value: &Value, field_type: FieldType) -> bool {
    let all = |check: fn(&Value) -> bool| match value {
        Value::Array(items) => items.iter().all(check),
        _ => false,
    };
    match field_type {
        FieldType::Text | FieldType::SelectText => value.is_string(),
        FieldType::Number | FieldType::SelectNumber => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::MultiText | FieldType::MultiSelectText | FieldType::MultiRelation => {
            all(Value::is_string)
        }
        FieldType::MultiNumber | FieldType::MultiSelectNumber => all(Value::is_number),
        FieldType::MultiBoolean => all(Value::is_boolean),
        FieldType::Relation => value.is_string() || value.is_null(),
    }
}

/// Reduces a path-like reference (`notes/a.md`) to a bare record id (`a`).
pub fn bare_id(reference: &str) -> &str {
    let name = path::basename(reference.trim());
    name.strip_suffix(RECORD_SUFFIX).unwrap_or(name)
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => parse_number(s.trim()),
        Value::Bool(b) => Some(Number::from(u8::from(*b))),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

/// Arrays pass through; strings split on commas.
fn to_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn relation_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => bare_id(s).to_string(),
        // Ids that look like numbers come back from the front matter as numbers.
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id) }
}
