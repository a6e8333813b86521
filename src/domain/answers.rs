//! Raw questionnaire answer shapes and their lenient parse boundary.
//!
//! Answers arrive either embedded in an audit record as a JSON array of
//! `{question, options}` entries, or as one row per selected option. Both
//! shapes are loosely typed on the wire; `from_value` coerces whatever is
//! there instead of rejecting it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Developer,
    Organization,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Developer => "developer",
            Audience::Organization => "organization",
        }
    }

    /// Exact, case-insensitive audience label; anything else is no audience.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "developer" => Some(Audience::Developer),
            "organization" => Some(Audience::Organization),
            _ => None,
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One embedded questionnaire entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedQa {
    pub question: String,
    pub options: Vec<String>,
}

impl EmbeddedQa {
    /// Coerce an arbitrary JSON value into an entry.
    ///
    /// Non-objects yield `None`. A missing question becomes `""`; falsy
    /// options (`null`, `false`, `0`, `""`) are dropped and the rest are
    /// stringified. No trimming or dedup happens here.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let question = entry.get("question").map(coerce_text).unwrap_or_default();
        let options = entry
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter(|option| is_truthy(option))
                    .map(coerce_text)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self { question, options })
    }

    /// Coerce a possibly-null JSON array of entries. Anything that is not an
    /// array yields an empty list.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|entries| entries.iter().filter_map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

/// One selected option for one question, as stored row-wise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAnswerRow {
    pub question: String,
    pub option_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
}

impl NormalizedAnswerRow {
    /// Coerce an arbitrary JSON value into a row. Non-objects yield `None`;
    /// missing fields become `""`, unknown audiences become `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let row = value.as_object()?;
        Some(Self {
            question: row.get("question").map(coerce_text).unwrap_or_default(),
            option_value: row.get("option_value").map(coerce_text).unwrap_or_default(),
            audience: row
                .get("audience")
                .and_then(Value::as_str)
                .and_then(Audience::parse),
        })
    }

    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|rows| rows.iter().filter_map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

/// Stringify a JSON scalar; `null` is the empty string and containers use
/// their compact JSON text.
pub(crate) fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
