//! Collection schemas and the closed set of field types.
//!
//! A schema is declared by a collection's index document as a single-line JSON
//! object under the `schema` front matter key:
//!
//! ```text
//! schema: {"status":{"type":"select-text","options":["open","done"],"default":"open"}}
//! ```
//!
//! Every field carries a `type` tag naming one of the twelve [`FieldType`]s,
//! plus optional `required`, `title`, `description` and a `default` typed to
//! match the field. Relation fields name their target collection in `path`;
//! select fields list their allowed values in `options`.

pub mod coerce;

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::markdown::FrontMatter;

/// Front matter key holding the schema in an index document.
pub const SCHEMA_KEY: &str = "schema";

/// The type tag of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    MultiText,
    MultiNumber,
    MultiBoolean,
    Relation,
    MultiRelation,
    SelectText,
    SelectNumber,
    MultiSelectText,
    MultiSelectNumber,
}

impl FieldType {
    pub const ALL: [FieldType; 12] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::MultiText,
        FieldType::MultiNumber,
        FieldType::MultiBoolean,
        FieldType::Relation,
        FieldType::MultiRelation,
        FieldType::SelectText,
        FieldType::SelectNumber,
        FieldType::MultiSelectText,
        FieldType::MultiSelectNumber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::MultiText => "multi-text",
            FieldType::MultiNumber => "multi-number",
            FieldType::MultiBoolean => "multi-boolean",
            FieldType::Relation => "relation",
            FieldType::MultiRelation => "multi-relation",
            FieldType::SelectText => "select-text",
            FieldType::SelectNumber => "select-number",
            FieldType::MultiSelectText => "multi-select-text",
            FieldType::MultiSelectNumber => "multi-select-number",
        }
    }

    /// Looks up a type tag. `array` is accepted as an older name for `multi-text`.
    pub fn from_name(name: &str) -> Option<FieldType> {
        if name == "array" {
            return Some(FieldType::MultiText);
        }
        FieldType::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// The value a field of this type takes when nothing else is known.
    pub fn default_value(self) -> Value {
        match self {
            FieldType::Text | FieldType::SelectText => Value::String(String::new()),
            FieldType::Number | FieldType::SelectNumber => Value::Number(Number::from(0)),
            FieldType::Boolean => Value::Bool(false),
            FieldType::MultiText
            | FieldType::MultiNumber
            | FieldType::MultiBoolean
            | FieldType::MultiRelation
            | FieldType::MultiSelectText
            | FieldType::MultiSelectNumber => Value::Array(Vec::new()),
            FieldType::Relation => Value::Null,
        }
    }

    pub fn is_relation(self) -> bool {
        matches!(self, FieldType::Relation | FieldType::MultiRelation)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific part of a field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Number>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<bool>,
    },
    #[serde(alias = "array")]
    MultiText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<String>>,
    },
    MultiNumber {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<Number>>,
    },
    MultiBoolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<bool>>,
    },
    Relation {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    MultiRelation {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<String>>,
    },
    SelectText {
        #[serde(default)]
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    SelectNumber {
        #[serde(default)]
        options: Vec<Number>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Number>,
    },
    MultiSelectText {
        #[serde(default)]
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<String>>,
    },
    MultiSelectNumber {
        #[serde(default)]
        options: Vec<Number>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Vec<Number>>,
    },
}

/// A single field of a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    pub fn new(kind: FieldKind) -> Self {
        SchemaField { kind, required: false, title: None, description: None }
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Text { .. } => FieldType::Text,
            FieldKind::Number { .. } => FieldType::Number,
            FieldKind::Boolean { .. } => FieldType::Boolean,
            FieldKind::MultiText { .. } => FieldType::MultiText,
            FieldKind::MultiNumber { .. } => FieldType::MultiNumber,
            FieldKind::MultiBoolean { .. } => FieldType::MultiBoolean,
            FieldKind::Relation { .. } => FieldType::Relation,
            FieldKind::MultiRelation { .. } => FieldType::MultiRelation,
            FieldKind::SelectText { .. } => FieldType::SelectText,
            FieldKind::SelectNumber { .. } => FieldType::SelectNumber,
            FieldKind::MultiSelectText { .. } => FieldType::MultiSelectText,
            FieldKind::MultiSelectNumber { .. } => FieldType::MultiSelectNumber,
        }
    }

    /// The declared default, or the type's default when none is declared.
    pub fn default_value(&self) -> Value {
        let declared = match &self.kind {
            FieldKind::Text { default } | FieldKind::SelectText { default, .. } => {
                default.clone().map(Value::String)
            }
            FieldKind::Number { default } | FieldKind::SelectNumber { default, .. } => {
                default.clone().map(Value::Number)
            }
            FieldKind::Boolean { default } => default.map(Value::Bool),
            FieldKind::MultiText { default }
            | FieldKind::MultiRelation { default, .. }
            | FieldKind::MultiSelectText { default, .. } => default
                .as_ref()
                .map(|items| items.iter().cloned().map(Value::String).collect()),
            FieldKind::MultiNumber { default } | FieldKind::MultiSelectNumber { default, .. } => {
                default
                    .as_ref()
                    .map(|items| items.iter().cloned().map(Value::Number).collect())
            }
            FieldKind::MultiBoolean { default } => default
                .as_ref()
                .map(|items| items.iter().copied().map(Value::Bool).collect()),
            FieldKind::Relation { default, .. } => default.clone().map(Value::String),
        };
        declared.unwrap_or_else(|| self.field_type().default_value())
    }

    /// Target collection of a relation field.
    pub fn relation_path(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { path, .. } | FieldKind::MultiRelation { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Allowed values of a select field. Other fields, and select fields with
    /// an empty option list, are unconstrained.
    pub fn options(&self) -> Option<Vec<Value>> {
        let options: Vec<Value> = match &self.kind {
            FieldKind::SelectText { options, .. } | FieldKind::MultiSelectText { options, .. } => {
                options.iter().cloned().map(Value::String).collect()
            }
            FieldKind::SelectNumber { options, .. }
            | FieldKind::MultiSelectNumber { options, .. } => {
                options.iter().cloned().map(Value::Number).collect()
            }
            _ => return None,
        };
        if options.is_empty() { None } else { Some(options) }
    }

    /// Whether `value` is an allowed option of this field.
    pub fn allows(&self, value: &Value) -> bool {
        match self.options() {
            Some(options) => options.iter().any(|option| same_value(option, value)),
            None => true,
        }
    }

    /// Coerces `value` into this field's shape and applies the select policy:
    /// a single select outside its options falls back to the default, a multi
    /// select drops the elements outside its options.
    pub fn coerce(&self, value: Option<&Value>) -> Value {
        let default = self.default_value();
        let coerced = coerce::coerce(value, self.field_type(), &default);
        if self.options().is_none() {
            return coerced;
        }
        match coerced {
            Value::Array(items) => {
                Value::Array(items.into_iter().filter(|item| self.allows(item)).collect())
            }
            single if self.allows(&single) => single,
            _ => default,
        }
    }
}

/// Numbers compare by value so that `1` and `1.0` are the same option.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// A problem found by [`Schema::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldIssue {
    /// A required field is absent or empty.
    MissingRequired { field: String },
    /// The stored value does not have the field's shape.
    TypeMismatch { field: String, expected: FieldType, found: Value },
    /// A select value outside the declared options.
    NotAnOption { field: String, value: Value },
    /// A relation id with no matching record in the target collection.
    DanglingRelation { field: String, value: String, path: String },
}

/// Ordered mapping of field names to field definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, SchemaField)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Parses a schema, failing on the first invalid field.
    pub fn from_json(text: &str) -> Result<Schema> {
        let map = parse_object(text)?;
        let fields = map
            .into_iter()
            .map(|(name, definition)| parse_field(&name, definition).map(|field| (name, field)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { fields })
    }

    /// Parses a schema, skipping invalid fields with a warning.
    ///
    /// A value that is not a JSON object yields an empty schema.
    pub fn from_json_lenient(text: &str) -> Schema {
        let map = match parse_object(text) {
            Ok(map) => map,
            Err(e) => {
                warn!("Ignoring unreadable schema: {}", e);
                return Schema::new();
            }
        };
        let fields = map
            .into_iter()
            .filter_map(|(name, definition)| match parse_field(&name, definition) {
                Ok(field) => Some((name, field)),
                Err(e) => {
                    warn!("Skipping schema field '{}': {}", name, e);
                    None
                }
            })
            .collect();
        Schema { fields }
    }

    /// Reads the schema declared by an index document's front matter.
    pub fn from_front_matter(front_matter: &FrontMatter) -> Schema {
        match front_matter.get(SCHEMA_KEY) {
            Some(Value::String(text)) if !text.trim().is_empty() => Schema::from_json_lenient(text),
            Some(Value::String(_)) | None => Schema::new(),
            Some(other) => {
                warn!("Ignoring schema that is not a JSON string: {}", other);
                Schema::new()
            }
        }
    }

    /// Single-line JSON form, as stored in front matter.
    pub fn to_json(&self) -> String {
        // Serializing plain data into a string cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Adds or replaces a field, keeping the position of a replaced field.
    pub fn insert(&mut self, name: impl Into<String>, field: SchemaField) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Fields of type `relation` or `multi-relation`.
    pub fn relation_fields(&self) -> impl Iterator<Item = (&str, &SchemaField)> {
        self.fields().filter(|(_, f)| f.field_type().is_relation())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Brings front matter in line with the schema.
    ///
    /// Each declared field is coerced; a field is rewritten only when the
    /// coerced value differs from the stored one. Undeclared keys are left
    /// alone. Returns the updated front matter and whether anything changed.
    pub fn normalize(&self, front_matter: &FrontMatter) -> (FrontMatter, bool) {
        let mut updated = front_matter.clone();
        let mut changed = false;
        for (name, field) in &self.fields {
            let current = front_matter.get(name);
            let coerced = field.coerce(current);
            if current != Some(&coerced) {
                updated.insert(name.clone(), coerced);
                changed = true;
            }
        }
        (updated, changed)
    }

    /// Reports problems without changing anything.
    ///
    /// Relation targets are not checked here; see
    /// [`Library::validate_record`](crate::storage::Library::validate_record).
    pub fn validate(&self, front_matter: &FrontMatter) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        for (name, field) in &self.fields {
            let field_type = field.field_type();
            let current = front_matter.get(name);

            if let Some(value) = current {
                if !coerce::has_shape(value, field_type) {
                    issues.push(FieldIssue::TypeMismatch {
                        field: name.clone(),
                        expected: field_type,
                        found: value.clone(),
                    });
                } else {
                    let values: Vec<&Value> = match value {
                        Value::Array(items) => items.iter().collect(),
                        single => vec![single],
                    };
                    for v in values.into_iter().filter(|v| !field.allows(v)) {
                        issues.push(FieldIssue::NotAnOption {
                            field: name.clone(),
                            value: v.clone(),
                        });
                    }
                }
            }

            if field.required && current.is_none_or(is_empty_value) {
                issues.push(FieldIssue::MissingRequired { field: name.clone() });
            }
        }
        issues
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, field) in &self.fields {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::InvalidSchema("schema must be a JSON object".to_string())),
        Err(e) => Err(Error::InvalidSchema(e.to_string())),
    }
}

fn parse_field(name: &str, definition: Value) -> Result<SchemaField> {
    let type_name = definition
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidSchema(format!("field '{name}' has no type")))?;
    if FieldType::from_name(type_name).is_none() {
        return Err(Error::UnknownFieldType {
            field: name.to_string(),
            type_name: type_name.to_string(),
        });
    }
    serde_json::from_value(definition)
        .map_err(|e| Error::InvalidSchema(format!("field '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn front_matter(value: Value) -> FrontMatter {
        match value {
            Value::Object(map) => FrontMatter::from(map),
            _ => panic!("test helper expects an object"),
        }
    }

    #[test]
    fn parses_all_field_types() {
        let schema = Schema::from_json(
            r#"{
                "a": {"type": "text"},
                "b": {"type": "number", "default": 3},
                "c": {"type": "boolean", "required": true},
                "d": {"type": "multi-text"},
                "e": {"type": "multi-number"},
                "f": {"type": "multi-boolean"},
                "g": {"type": "relation", "path": "people"},
                "h": {"type": "multi-relation", "path": "tags"},
                "i": {"type": "select-text", "options": ["x", "y"]},
                "j": {"type": "select-number", "options": [1, 2]},
                "k": {"type": "multi-select-text", "options": ["x"]},
                "l": {"type": "multi-select-number", "options": [1]},
                "m": {"type": "array"}
            }"#,
        )
        .unwrap();

        let types: Vec<FieldType> = schema.fields().map(|(_, f)| f.field_type()).collect();
        let mut expected = FieldType::ALL.to_vec();
        expected.push(FieldType::MultiText);
        assert_eq!(types, expected);
        assert_eq!(schema.get("g").unwrap().relation_path(), Some("people"));
        assert!(schema.get("c").unwrap().required);
        assert_eq!(schema.get("b").unwrap().default_value(), json!(3));
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = Schema::from_json(r#"{"when": {"type": "date"}}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownFieldType { field, type_name } if field == "when" && type_name == "date"
        ));
    }

    #[test]
    fn lenient_parse_skips_bad_fields() {
        let schema = Schema::from_json_lenient(
            r#"{"when": {"type": "date"}, "ok": {"type": "text"}, "bad": {"type": "number", "default": "x"}}"#,
        );
        assert_eq!(schema.len(), 1);
        assert!(schema.get("ok").is_some());
        assert!(Schema::from_json_lenient("not json").is_empty());
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let text =
            r#"{"z":{"type":"text","default":"hi"},"a":{"type":"relation","path":"p","required":true}}"#;
        let schema = Schema::from_json(text).unwrap();
        let again = Schema::from_json(&schema.to_json()).unwrap();
        assert_eq!(schema, again);
        let names: Vec<&str> = again.fields().map(|(n, _)| n).collect();
        assert_eq!(names, ["z", "a"]);
    }

    #[test]
    fn normalize_defaults_mismatched_values() {
        let schema = Schema::from_json(r#"{"count": {"type": "number", "default": 0}}"#).unwrap();
        let (updated, changed) = schema.normalize(&front_matter(json!({"count": "abc"})));
        assert!(changed);
        assert_eq!(updated.get("count"), Some(&json!(0)));
    }

    #[test]
    fn normalize_adds_missing_fields_and_keeps_extra_ones() {
        let schema = Schema::from_json(
            r#"{"tags": {"type": "multi-text"}, "owner": {"type": "relation", "path": "people"}}"#,
        )
        .unwrap();
        let (updated, changed) = schema.normalize(&front_matter(json!({"extra": "kept"})));
        assert!(changed);
        assert_eq!(
            updated,
            front_matter(json!({"extra": "kept", "tags": [], "owner": null}))
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let schema = Schema::from_json(
            r#"{
                "status": {"type": "select-text", "options": ["open", "done"], "default": "open"},
                "labels": {"type": "multi-select-text", "options": ["a", "b"]},
                "size": {"type": "select-number", "options": [1, 2]},
                "count": {"type": "number"},
                "refs": {"type": "multi-relation", "path": "x"}
            }"#,
        )
        .unwrap();
        let original = front_matter(json!({
            "status": "weird",
            "labels": "a, c, b",
            "size": "2",
            "count": "7",
            "refs": "x/one.md, two"
        }));
        let (once, changed) = schema.normalize(&original);
        assert!(changed);
        assert_eq!(
            once,
            front_matter(json!({
                "status": "open",
                "labels": ["a", "b"],
                "size": 2,
                "count": 7,
                "refs": ["one", "two"]
            }))
        );
        let (twice, changed_again) = schema.normalize(&once);
        assert!(!changed_again);
        assert_eq!(twice, once);
    }

    #[test]
    fn validate_reports_issues() {
        let schema = Schema::from_json(
            r#"{
                "title": {"type": "text", "required": true},
                "count": {"type": "number"},
                "status": {"type": "select-text", "options": ["open"]}
            }"#,
        )
        .unwrap();
        let issues = schema.validate(&front_matter(json!({"count": "x", "status": "closed"})));
        assert_eq!(
            issues,
            vec![
                FieldIssue::MissingRequired { field: "title".into() },
                FieldIssue::TypeMismatch {
                    field: "count".into(),
                    expected: FieldType::Number,
                    found: json!("x"),
                },
                FieldIssue::NotAnOption { field: "status".into(), value: json!("closed") },
            ]
        );
    }

    #[test]
    fn schema_from_front_matter() {
        let fm = front_matter(json!({"schema": r#"{"n":{"type":"number"}}"#}));
        assert_eq!(Schema::from_front_matter(&fm).len(), 1);
        assert!(Schema::from_front_matter(&FrontMatter::new()).is_empty());
    }
}
