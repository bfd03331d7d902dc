//! Stages that add or reshape fields without rendering output

use super::Format;
use crate::core::record::Record;
use crate::core::timestamp::TimestampFormat;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::time::Instant;

/// Adds the current time under `timestamp` (and optionally an alias).
#[derive(Debug, Clone, Default)]
pub struct Timestamp {
    format: TimestampFormat,
    alias: Option<String>,
}

impl Timestamp {
    #[must_use]
    pub fn with_format(mut self, format: TimestampFormat) -> Self {
        self.format = format;
        self
    }

    /// strftime pattern evaluated in UTC
    #[must_use]
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.format = TimestampFormat::Custom(pattern.to_string());
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl Format for Timestamp {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let value = self.format.to_value(&Utc::now());
        if let Some(alias) = &self.alias {
            record.insert_meta(alias.clone(), value.clone());
        }
        record.insert_meta("timestamp", value);
        Some(record)
    }

    fn name(&self) -> &str {
        "timestamp"
    }
}

/// Adds a fixed label, either as metadata or as a `[label]` message prefix.
#[derive(Debug, Clone)]
pub struct Label {
    label: String,
    in_message: bool,
}

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            in_message: false,
        }
    }

    #[must_use]
    pub fn in_message(mut self, in_message: bool) -> Self {
        self.in_message = in_message;
        self
    }
}

impl Format for Label {
    fn transform(&self, mut record: Record) -> Option<Record> {
        if self.in_message {
            record.message = format!("[{}] {}", self.label, record.message);
        } else {
            record.insert_meta("label", self.label.clone());
        }
        Some(record)
    }

    fn name(&self) -> &str {
        "label"
    }
}

/// Prefixes the message with a tab.
#[derive(Debug, Clone, Copy, Default)]
pub struct Align;

impl Format for Align {
    fn transform(&self, mut record: Record) -> Option<Record> {
        record.message = format!("\t{}", record.message);
        Some(record)
    }

    fn name(&self) -> &str {
        "align"
    }
}

/// Adds `ms: "+Nms"`, the time elapsed since the previous record seen by
/// this stage instance.
#[derive(Debug, Default)]
pub struct Ms {
    previous: Mutex<Option<Instant>>,
}

impl Format for Ms {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let now = Instant::now();
        let elapsed = {
            let mut previous = self.previous.lock();
            let elapsed = previous.map(|p| now.duration_since(p).as_millis()).unwrap_or(0);
            *previous = Some(now);
            elapsed
        };
        record.insert_meta("ms", format!("+{}ms", elapsed));
        Some(record)
    }

    fn name(&self) -> &str {
        "ms"
    }
}

/// Nests metadata under a single key.
///
/// By default every metadata key moves; `fill_with` restricts the move to
/// the listed keys and `fill_except` keeps the listed keys at top level.
#[derive(Debug, Clone)]
pub struct Metadata {
    key: String,
    fill_except: Vec<String>,
    fill_with: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            key: "metadata".to_string(),
            fill_except: Vec::new(),
            fill_with: Vec::new(),
        }
    }
}

impl Metadata {
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn fill_except<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fill_except = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn fill_with<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fill_with = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl Format for Metadata {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let moves = |key: &String| {
            if self.fill_with.is_empty() {
                !self.fill_except.contains(key)
            } else {
                self.fill_with.contains(key)
            }
        };

        let mut nested = Map::new();
        let mut kept = Map::new();
        for (key, value) in std::mem::take(&mut record.metadata) {
            if moves(&key) {
                nested.insert(key, value);
            } else {
                kept.insert(key, value);
            }
        }
        kept.insert(self.key.clone(), Value::Object(nested));
        record.metadata = kept;
        Some(record)
    }

    fn name(&self) -> &str {
        "metadata"
    }
}
