//! Typed tool arguments
//!
//! Operator input arrives as plain text; the tool schema says what each
//! property should be. [`coerce`] turns one line of text into an [`ArgValue`]
//! according to the declared [`PropertyKind`]. Coercion never fails: malformed
//! numbers become NaN and malformed objects fall back to the raw text.

use std::fmt;

use serde_json::{Map, Value};
use toolpilot_client::ToolInputSchema;

/// Declared JSON schema type of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// `"string"`
    String,
    /// `"number"`
    Number,
    /// `"boolean"`
    Boolean,
    /// `"object"`
    Object,
    /// Any other declared type, or none at all (empty string)
    Other(String),
}

impl PropertyKind {
    /// Read the `type` keyword of a property schema
    pub fn from_schema(property: &Value) -> Self {
        match property.get("type") {
            Some(Value::String(kind)) => Self::from(kind.as_str()),
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }
}

impl From<&str> for PropertyKind {
    fn from(kind: &str) -> Self {
        match kind {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Object => f.write_str("object"),
            Self::Other(kind) if kind.is_empty() => f.write_str("any"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaProperty {
    /// Property name
    pub name: String,
    /// Declared type
    pub kind: PropertyKind,
    /// Whether the schema lists it as required
    pub required: bool,
    /// Schema description, if any
    pub description: Option<String>,
}

/// Properties of `schema` in declaration order
pub fn schema_properties(schema: &ToolInputSchema) -> Vec<SchemaProperty> {
    let Some(properties) = schema.properties.as_ref() else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, property)| SchemaProperty {
            name: name.clone(),
            kind: PropertyKind::from_schema(property),
            required: schema.is_required(name),
            description: property
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

/// A coerced argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Declared string, kept verbatim
    Text(String),
    /// Declared number; NaN when the input did not parse
    Number(f64),
    /// Declared boolean
    Boolean(bool),
    /// Declared object whose input parsed as JSON
    Structured(Value),
    /// Input kept as-is: object text that failed to parse, or an undeclared type
    Raw(String),
}

impl ArgValue {
    /// JSON representation sent to the server
    ///
    /// Integral numbers become JSON integers; NaN and infinities have no JSON
    /// form and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) | Self::Raw(s) => Value::String(s.clone()),
            Self::Number(n) => number_to_json(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Structured(v) => v.clone(),
        }
    }
}

impl From<ArgValue> for Value {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Text(s) | ArgValue::Raw(s) => Value::String(s),
            ArgValue::Structured(v) => v,
            other => other.to_json(),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Whether an answer gets recorded: non-empty input, or a required property
pub fn should_record(input: &str, required: bool) -> bool {
    !input.is_empty() || required
}

/// Coerce operator input to the declared kind
pub fn coerce(kind: &PropertyKind, input: &str) -> ArgValue {
    match kind {
        PropertyKind::Number => ArgValue::Number(coerce_number(input)),
        PropertyKind::Boolean => ArgValue::Boolean(coerce_boolean(input)),
        PropertyKind::Object => coerce_object(input),
        PropertyKind::String => ArgValue::Text(input.to_string()),
        PropertyKind::Other(_) => ArgValue::Raw(input.to_string()),
    }
}

/// Decimal number parse; blank input is 0 and anything unparseable is NaN
pub fn coerce_number(input: &str) -> f64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// True only for `true` in any letter case, ignoring surrounding whitespace
pub fn coerce_boolean(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("true")
}

/// Parse JSON text, falling back to the raw string
pub fn coerce_object(input: &str) -> ArgValue {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => ArgValue::Structured(value),
        Err(_) => ArgValue::Raw(input.to_string()),
    }
}

/// Arguments collected for one tool call, in prompt order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSet {
    entries: Vec<(String, ArgValue)>,
}

impl ArgumentSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing an earlier one with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Value recorded for `name`
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether `name` was recorded
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of recorded values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names and values in prompt order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// JSON object for `tools/call`
    pub fn into_arguments(self) -> Map<String, Value> {
        self.entries
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()
    }
}
