//! The value flowing through the pipeline
//!
//! A [`Record`] is created fresh for every log call, threaded through the
//! global format chain, cloned once per admitted transport and finally handed
//! to each transport's write entry point with its `output` slot filled.

use serde::Serialize;
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::fmt;

/// Keys that never live in metadata.
pub const RESERVED_KEYS: &[&str] = &["level", "message"];

/// An Error-like value.
///
/// `properties` are the fields merged into record metadata; `stack` stays
/// private to the error until a formatting stage copies it out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ErrorInfo {
    /// Create an error with a captured stack trace.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = format!("Error: {}\n{}", message, Backtrace::force_capture());
        Self {
            name: "Error".to_string(),
            message,
            stack: Some(stack),
            properties: Map::new(),
        }
    }

    /// Describe any `std::error::Error`, including its source chain.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let name = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error")
            .to_string();
        let message = err.to_string();

        let mut stack = format!("{}: {}", name, message);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\nCaused by: {}", cause));
            source = cause.source();
        }
        stack.push('\n');
        stack.push_str(&Backtrace::force_capture().to_string());

        Self {
            name,
            message,
            stack: Some(stack),
            properties: Map::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    #[must_use]
    pub fn without_stack(mut self) -> Self {
        self.stack = None;
        self
    }

    /// JSON view of the enumerable part (properties only).
    pub fn properties_value(&self) -> Value {
        Value::Object(self.properties.clone())
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// A positional argument following the message.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Error(ErrorInfo),
}

impl Arg {
    pub fn error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Arg::Error(ErrorInfo::from_error(err))
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<Map<String, Value>> for Arg {
    fn from(m: Map<String, Value>) -> Self {
        Arg::Value(Value::Object(m))
    }
}

impl From<ErrorInfo> for Arg {
    fn from(e: ErrorInfo) -> Self {
        Arg::Error(e)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Value(Value::String(s))
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Value(n.into())
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Value(n.into())
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Arg::Value(n.into())
    }
}

impl From<u64> for Arg {
    fn from(n: u64) -> Self {
        Arg::Value(n.into())
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Value(n.into())
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Value(b.into())
    }
}

/// One log event in flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Raw level name, used for filtering.
    pub level: String,
    pub message: String,
    pub metadata: Map<String, Value>,
    /// Final rendering handed to the transport.
    pub output: Option<String>,
    /// Level as renderers should print it (e.g. colorized).
    pub level_display: Option<String>,
    /// Interpolation arguments not consumed yet.
    pub splat: Vec<Arg>,
    /// Error this record was built from, if any.
    pub error: Option<ErrorInfo>,
}

impl Record {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_meta(key, value);
        self
    }

    #[must_use]
    pub fn with_splat(mut self, args: Vec<Arg>) -> Self {
        self.splat = args;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Insert a metadata entry; reserved keys are ignored.
    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.metadata.insert(key, value.into());
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn display_level(&self) -> &str {
        self.level_display.as_deref().unwrap_or(&self.level)
    }

    pub fn is_exception(&self) -> bool {
        self.metadata.get("exception") == Some(&Value::Bool(true))
    }

    pub fn is_rejection(&self) -> bool {
        self.metadata.get("rejection") == Some(&Value::Bool(true))
    }

    /// `{level, message, ...metadata}` as a JSON object.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert(
            "level".to_string(),
            Value::String(self.display_level().to_string()),
        );
        object.insert("message".to_string(), Value::String(self.message.clone()));
        for (key, value) in &self.metadata {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                object.insert(key.clone(), value.clone());
            }
        }
        object
    }
}

/// The call shapes a logger accepts.
#[derive(Debug, Clone)]
pub enum LogInput {
    /// `(level, message, ...args)`
    Message {
        level: String,
        message: String,
        args: Vec<Arg>,
    },
    /// `{level, message, ...meta}`
    Object(Map<String, Value>),
    /// A bare Error-like value at a level.
    Error { level: String, error: ErrorInfo },
    /// An already built record.
    Record(Record),
}

impl From<Record> for LogInput {
    fn from(record: Record) -> Self {
        LogInput::Record(record)
    }
}

impl From<Map<String, Value>> for LogInput {
    fn from(object: Map<String, Value>) -> Self {
        LogInput::Object(object)
    }
}

impl From<(&str, &str)> for LogInput {
    fn from((level, message): (&str, &str)) -> Self {
        LogInput::Message {
            level: level.to_string(),
            message: message.to_string(),
            args: Vec::new(),
        }
    }
}
