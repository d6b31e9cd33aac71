use crate::context::Context;
use crate::converter::ConverterRegistry;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Function name reported when a call site cannot be resolved.
pub const UNKNOWN_FUNCTION: &str = "UNKNOWN";

/// Severity attached to a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            _ => Level::Error,
        }
    }
}

/// Where a record was logged from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceLocation {
    pub file_path: String,
    pub line_number: u32,
    pub function_name: String,
}

impl SourceLocation {
    pub fn new(
        file_path: impl Into<String>,
        line_number: u32,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            function_name: function_name.into(),
        }
    }
}

/// A value that can be attached to a [`LogRecord`].
///
/// Implemented for every `Serialize + Debug + 'static` type, so callers
/// normally just pass `&value`. The trait is object safe which lets a single
/// call carry values of different types.
pub trait Loggable: fmt::Debug {
    /// Marshal the value to JSON.
    fn marshal(&self) -> serde_json::Result<Value>;

    /// Compiler-provided name of the concrete type.
    fn type_name(&self) -> &'static str;

    /// The raw value, handed to converters for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Loggable for T
where
    T: Serialize + fmt::Debug + Any,
{
    fn marshal(&self) -> serde_json::Result<Value> {
        crate::marshal::to_value(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loggable wrapper for anything implementing [`std::error::Error`].
///
/// Errors rarely implement `Serialize`; wrapping one marshals it as its
/// display string, prints it with the original `Debug` output and reports
/// the wrapped error's type name.
pub struct ErrorValue {
    type_name: &'static str,
    message: String,
    debug: String,
}

impl ErrorValue {
    pub fn new<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self {
            type_name: std::any::type_name::<E>(),
            message: error.to_string(),
            debug: format!("{:?}", error),
        }
    }

    /// Type name of the wrapped error.
    pub fn error_type(&self) -> &'static str {
        self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::error::Error> From<E> for ErrorValue {
    fn from(error: E) -> Self {
        ErrorValue::new(&error)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Loggable for ErrorValue {
    fn marshal(&self) -> serde_json::Result<Value> {
        Ok(Value::String(self.message.clone()))
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Structured description of one logged value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataItem {
    #[serde(rename = "Type")]
    pub type_name: String,
    pub marshaled: Value,
    pub printed: String,
    pub converted: BTreeMap<String, Value>,
}

impl DataItem {
    pub fn new(value: &dyn Loggable, converters: &ConverterRegistry) -> Self {
        let marshaled = value.marshal().unwrap_or_else(|e| {
            serde_json::json!({ "SerializationError": format!("serialization error: {}", e) })
        });

        DataItem {
            type_name: display_type_name(value.type_name()),
            marshaled,
            printed: format!("{:?}", value),
            converted: converters.apply_all(value.as_any()),
        }
    }
}

/// Normalize a `std::any::type_name` for display: references are stripped
/// and both string types are reported as `string`.
pub(crate) fn display_type_name(raw: &str) -> String {
    let mut name = raw;
    loop {
        if let Some(rest) = name.strip_prefix("&mut ") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('&') {
            name = rest;
        } else {
            break;
        }
    }

    match name {
        "str" | "alloc::string::String" => "string".to_string(),
        other => other.to_string(),
    }
}

/// One structured log line. Built fresh per log call and dropped after it
/// has been written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord {
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,
    pub level: Level,
    #[serde(rename = "RequestID")]
    pub request_id: String,
    pub message: String,
    pub source: SourceLocation,
    pub data: Vec<DataItem>,
}

impl LogRecord {
    /// Assemble a record for `value` followed by `extra`, in argument order.
    pub fn build(
        level: Level,
        ctx: &Context,
        source: SourceLocation,
        value: &dyn Loggable,
        extra: &[&dyn Loggable],
        converters: &ConverterRegistry,
    ) -> Self {
        let mut data = Vec::with_capacity(extra.len() + 1);
        data.push(DataItem::new(value, converters));
        for item in extra {
            data.push(DataItem::new(*item, converters));
        }

        let message = match &data[0].marshaled {
            Value::String(s) => s.clone(),
            _ => format!("{:?}", value),
        };

        LogRecord {
            time: Utc::now(),
            level,
            request_id: ctx.request_id().to_string(),
            message,
            source,
            data,
        }
    }
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Nanos, true))
}
