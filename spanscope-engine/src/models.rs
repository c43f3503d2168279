use std::borrow::Cow;
use std::fmt::{Display, Error as FmtError, Formatter};

use serde::{Deserialize, Serialize};

/// This is the external type used to identify a span. It is opaque to the
/// engine and only required to be unique within a trace.
pub type SpanId = String;

/// Durations are always compared in microseconds.
pub type Micros = f64;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(alias = "spanID")]
    pub id: SpanId,
    pub operation_name: String,
    #[serde(alias = "duration")]
    pub duration_micros: Micros,
    pub process: Process,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    #[serde(default)]
    pub logs: Option<Vec<Log>>,
}

impl Span {
    /// Log events attached to this span. Missing logs are an empty list.
    pub fn logs(&self) -> &[Log] {
        self.logs.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub service_name: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> KeyValue {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Log {
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub fields: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Null,
}

impl Value {
    /// The text that tag comparisons and free-text searches are evaluated
    /// against.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Str(value) => Cow::Borrowed(value),
            other => Cow::Owned(other.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::I64(value) => write!(f, "{value}"),
            Value::U64(value) => write!(f, "{value}"),
            Value::F64(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueOperator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ValueOperator {
    pub fn compare<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            ValueOperator::Gt => lhs > rhs,
            ValueOperator::Gte => lhs >= rhs,
            ValueOperator::Lt => lhs < rhs,
            ValueOperator::Lte => lhs <= rhs,
        }
    }
}

/// Comparison used by name and tag predicates.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringOperator {
    #[default]
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "=~")]
    Matches,
    #[serde(rename = "!~")]
    NotMatches,
}

impl StringOperator {
    pub fn is_negated(&self) -> bool {
        matches!(self, StringOperator::NotEquals | StringOperator::NotMatches)
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, StringOperator::Matches | StringOperator::NotMatches)
    }
}

/// Lower duration bound. Exclusive unless asked otherwise.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FromOperator {
    #[default]
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl From<FromOperator> for ValueOperator {
    fn from(op: FromOperator) -> Self {
        match op {
            FromOperator::GreaterThan => ValueOperator::Gt,
            FromOperator::GreaterOrEqual => ValueOperator::Gte,
        }
    }
}

/// Upper duration bound. Exclusive unless asked otherwise.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToOperator {
    #[default]
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl From<ToOperator> for ValueOperator {
    fn from(op: ToOperator) -> Self {
        match op {
            ToOperator::LessThan => ValueOperator::Lt,
            ToOperator::LessOrEqual => ValueOperator::Lte,
        }
    }
}
