use crate::context::Context;
use crate::logger::Logger;
use crate::record::{Level, Loggable, SourceLocation, UNKNOWN_FUNCTION};
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Event field promoted to the record's `RequestID`.
pub const REQUEST_ID_FIELD: &str = "request_id";

/// `tracing_subscriber` layer that turns every `tracing` event into a
/// [`LogRecord`](crate::record::LogRecord) written through a [`Logger`].
///
/// The `message` field becomes the record message, a `request_id` field
/// becomes the correlation id, and any remaining fields are attached as one
/// extra data item. The call site comes from the event's metadata.
pub struct RecordLayer {
    logger: Logger,
}

impl RecordLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let ctx = match fields.remove(REQUEST_ID_FIELD) {
            Some(serde_json::Value::String(id)) => Context::background().with_request_id(id),
            Some(other) => Context::background().with_request_id(other.to_string()),
            None => Context::background(),
        };

        let meta = event.metadata();
        let source = SourceLocation::new(
            meta.file().unwrap_or(UNKNOWN_FUNCTION),
            meta.line().unwrap_or(0),
            meta.module_path().unwrap_or_else(|| meta.target()),
        );

        let message = message.unwrap_or_default();
        let extra: Vec<&dyn Loggable> = if fields.is_empty() {
            Vec::new()
        } else {
            vec![&fields as &dyn Loggable]
        };

        self.logger
            .log_at(Level::from(*meta.level()), &ctx, source, &message, &extra);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            *self.message = Some(rendered);
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(rendered));
        }
    }
}
