//! Reading and writing the front matter block at the top of a document.
//!
//! The block is delimited by two `---` lines and holds a restricted notation:
//! one `key: value` pair per line, or a `key:` line followed by `- item` lines
//! for a flat sequence. Anything more elaborate (nested maps, inline lists,
//! multi-line strings) is not supported.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Line that opens and closes the front matter block.
pub const DELIMITER: &str = "---";

/// Keys written first, in this order, when present.
const PREFERRED_ORDER: [&str; 4] = ["icon", "title", "description", "schema"];

/// Ordered mapping of front matter keys to values.
///
/// Values are scalars (string, number, boolean, null) or flat sequences of
/// scalars. Keys keep the order in which they were first inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontMatter(Map<String, Value>);

impl FrontMatter {
    pub fn new() -> Self {
        FrontMatter(Map::new())
    }

    /// Parses the text between the delimiters (delimiters excluded).
    ///
    /// The scanner has two states. In the scalar state a `key: value` line sets
    /// `key`; an empty value starts a sequence and switches to the array state,
    /// where `- item` lines are appended to that key. A new `key: value` line
    /// leaves the array state. Blank lines and lines without a colon are
    /// skipped.
    pub fn parse(block: &str) -> Self {
        let mut map = Map::new();
        let mut sequence_key: Option<String> = None;

        for line in block.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(key) = &sequence_key {
                if let Some(item) = trimmed.strip_prefix('-') {
                    if let Some(Value::Array(items)) = map.get_mut(key) {
                        items.push(parse_scalar(item.trim()));
                    }
                    continue;
                }
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }

            let value = value.trim();
            if value.is_empty() {
                map.insert(key.to_string(), Value::Array(Vec::new()));
                sequence_key = Some(key.to_string());
            } else {
                map.insert(key.to_string(), parse_scalar(value));
                sequence_key = None;
            }
        }

        FrontMatter(map)
    }

    /// Renders the block content (without delimiters), one entry per line.
    ///
    /// `icon`, `title`, `description` and `schema` come first; every other key
    /// follows in insertion order.
    pub fn render(&self) -> String {
        let preferred = PREFERRED_ORDER
            .iter()
            .filter_map(|key| self.0.get(*key).map(|value| (*key, value)));
        let remaining = self
            .0
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .filter(|(key, _)| !PREFERRED_ORDER.contains(key));

        let mut out = String::new();
        for (key, value) in preferred.chain(remaining) {
            match value {
                Value::Array(items) => {
                    out.push_str(key);
                    out.push_str(":\n");
                    for item in items {
                        out.push_str("  - ");
                        out.push_str(&render_scalar(item));
                        out.push('\n');
                    }
                }
                scalar => {
                    out.push_str(key);
                    out.push_str(": ");
                    out.push_str(&render_scalar(scalar));
                    out.push('\n');
                }
            }
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value of `key` if it is a non-empty string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Whether `key` reads back unchanged from a rendered block: non-empty,
    /// without surrounding whitespace, line breaks or colons, and not taken
    /// for a sequence item.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key.trim() == key
            && !key.starts_with('-')
            && !key.contains([':', '\n', '\r'])
    }

    /// Fails on the first key that [`FrontMatter::is_valid_key`] rejects.
    pub fn check_keys(&self) -> Result<()> {
        match self.0.keys().find(|key| !Self::is_valid_key(key)) {
            Some(key) => Err(Error::InvalidKey(key.clone())),
            None => Ok(()),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays every entry of `other` on top of this mapping.
    pub fn merge(&mut self, other: FrontMatter) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for FrontMatter {
    fn from(map: Map<String, Value>) -> Self {
        FrontMatter(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FrontMatter {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        FrontMatter(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A document split into its optional front matter and its body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front_matter: Option<FrontMatter>,
    pub body: String,
}

impl Document {
    pub fn new(front_matter: Option<FrontMatter>, body: impl Into<String>) -> Self {
        Document { front_matter, body: body.into() }
    }

    /// Splits `text` into front matter and body.
    ///
    /// The first line must be the delimiter and a second delimiter line must
    /// follow; otherwise the whole text is body. One blank line directly after
    /// the closing delimiter belongs to the block.
    pub fn parse(text: &str) -> Self {
        match split_block(text) {
            Some((block, body)) => {
                let body = body
                    .strip_prefix("\r\n")
                    .or_else(|| body.strip_prefix('\n'))
                    .unwrap_or(body);
                Document {
                    front_matter: Some(FrontMatter::parse(block)),
                    body: body.to_string(),
                }
            }
            None => Document { front_matter: None, body: text.to_string() },
        }
    }

    /// Renders the document. An empty or absent front matter writes no block.
    pub fn render(&self) -> String {
        match &self.front_matter {
            Some(fm) if !fm.is_empty() => {
                let mut out = format!("{DELIMITER}\n{}{DELIMITER}\n", fm.render());
                if !self.body.is_empty() {
                    out.push('\n');
                    out.push_str(&self.body);
                }
                out
            }
            _ => self.body.clone(),
        }
    }

    /// Front matter for operations that cannot proceed without one.
    ///
    /// `origin` names the document in the error.
    pub fn front_matter_required(&self, origin: &str) -> Result<&FrontMatter> {
        self.front_matter
            .as_ref()
            .ok_or_else(|| Error::MissingFrontMatter(origin.to_string()))
    }

    /// Front matter, or an empty mapping if the document has none.
    pub fn front_matter_or_default(&self) -> FrontMatter {
        self.front_matter.clone().unwrap_or_default()
    }
}

/// Returns `(block, rest)` where `rest` starts after the closing delimiter line.
fn split_block(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_end = text.find('\n')?;
    if text[..first_end].trim_end_matches('\r') != DELIMITER {
        return None;
    }
    let rest = &text[first_end + 1..];

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Types a raw scalar: booleans, null, numbers and quoted strings are
/// recognised, anything else stays a plain string.
fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        if let Ok(s) = serde_json::from_str::<String>(raw) {
            return Value::String(s);
        }
    }
    if let Some(n) = parse_number(raw) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

pub(crate) fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Number::from(i));
    }
    let numeric = raw.chars().any(|c| c.is_ascii_digit())
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    if !numeric {
        return None;
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quotes(s) => Value::String(s.clone()).to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A string needs quoting when writing it bare would not read back as the
/// same string.
fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s || s.contains(['\n', '\r']) {
        return true;
    }
    !matches!(parse_scalar(s), Value::String(ref parsed) if parsed == s)
}
