//! Terminal stages that fill the record's `output` slot

use super::Format;
use crate::core::record::Record;
use serde_json::{Map, Value};

/// Renders `{level, message, ...metadata}` as JSON.
///
/// `level` is the display level, rendered once; the raw registry name the
/// dispatcher filters on is not repeated.
///
/// Metadata is an owned tree, so the rendering is always finite; a record
/// embedding a copy of its own metadata just renders that copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json {
    pretty: bool,
}

impl Json {
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Format for Json {
    fn transform(&self, mut record: Record) -> Option<Record> {
        record.output = Some(render_json(&Value::Object(record.to_object()), self.pretty));
        Some(record)
    }

    fn name(&self) -> &str {
        "json"
    }
}

pub(crate) fn render_json(value: &Value, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|e| format!("{{\"message\":\"unrenderable record: {}\"}}", e))
}

/// `level: message {metadata}`, the metadata part omitted when empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simple;

impl Format for Simple {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let base = format!("{}: {}", record.display_level(), record.message);
        let output = if record.metadata.is_empty() {
            base
        } else {
            format!(
                "{} {}",
                base,
                render_json(&Value::Object(record.metadata.clone()), false)
            )
        };
        record.output = Some(output);
        Some(record)
    }

    fn name(&self) -> &str {
        "simple"
    }
}

/// User template producing the final string.
pub struct Printf<F> {
    template: F,
}

impl<F> Printf<F>
where
    F: Fn(&Record) -> String + Send + Sync,
{
    pub fn new(template: F) -> Self {
        Self { template }
    }
}

impl<F> Format for Printf<F>
where
    F: Fn(&Record) -> String + Send + Sync,
{
    fn transform(&self, mut record: Record) -> Option<Record> {
        record.output = Some((self.template)(&record));
        Some(record)
    }

    fn name(&self) -> &str {
        "printf"
    }
}

/// Indented JSON for human reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyPrint;

impl Format for PrettyPrint {
    fn transform(&self, mut record: Record) -> Option<Record> {
        record.output = Some(render_json(&Value::Object(record.to_object()), true));
        Some(record)
    }

    fn name(&self) -> &str {
        "pretty_print"
    }
}

/// Logstash event layout: `@message`, `@timestamp`, `@fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logstash;

impl Format for Logstash {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let mut fields = record.to_object();
        fields.remove("message");

        let mut event = Map::new();
        event.insert("@message".to_string(), Value::String(record.message.clone()));
        if let Some(timestamp) = fields.remove("timestamp") {
            event.insert("@timestamp".to_string(), timestamp);
        }
        event.insert("@fields".to_string(), Value::Object(fields));

        record.output = Some(render_json(&Value::Object(event), false));
        Some(record)
    }

    fn name(&self) -> &str {
        "logstash"
    }
}
