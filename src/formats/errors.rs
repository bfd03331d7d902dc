//! Promote Error-like values into the record

use super::Format;
use crate::core::record::{Record, RESERVED_KEYS};

/// Folds the record's error into its message and, on request, copies the
/// error's stack trace into metadata under `stack`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Errors {
    stack: bool,
}

impl Errors {
    #[must_use]
    pub fn with_stack(mut self, stack: bool) -> Self {
        self.stack = stack;
        self
    }
}

impl Format for Errors {
    fn transform(&self, mut record: Record) -> Option<Record> {
        let Some(error) = record.error.take() else {
            return Some(record);
        };

        if record.message.is_empty() {
            record.message = error.message.clone();
        } else if !record.message.contains(&error.message) {
            record.message = format!("{} {}", record.message, error.message);
        }

        for (key, value) in &error.properties {
            if !RESERVED_KEYS.contains(&key.as_str()) && !record.metadata.contains_key(key) {
                record.metadata.insert(key.clone(), value.clone());
            }
        }

        if self.stack {
            if let Some(stack) = &error.stack {
                record.insert_meta("stack", stack.clone());
            }
        }

        record.error = Some(error);
        Some(record)
    }

    fn name(&self) -> &str {
        "errors"
    }
}
