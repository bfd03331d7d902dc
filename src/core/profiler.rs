//! Timing helpers that log a `durationMs` field

use super::error::Result;
use super::logger::Logger;
use super::record::Record;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// A running timer returned by `Logger::start_timer`.
#[derive(Debug)]
pub struct Profiler {
    logger: Logger,
    start: Instant,
}

impl Profiler {
    pub(crate) fn new(logger: Logger) -> Self {
        Self {
            logger,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log `message` at `info` (or the logger's level when the scale has
    /// no `info`) with the elapsed time.
    pub fn done(self, message: impl Into<String>) -> Result<()> {
        self.done_with(None, message, Map::new())
    }

    pub fn done_with(
        self,
        level: Option<&str>,
        message: impl Into<String>,
        meta: Map<String, Value>,
    ) -> Result<()> {
        let record = timed_record(&self.logger, level, message.into(), self.elapsed(), meta);
        self.logger.write(record)
    }
}

pub(crate) fn timed_record(
    logger: &Logger,
    level: Option<&str>,
    message: String,
    elapsed: Duration,
    meta: Map<String, Value>,
) -> Record {
    let level = match level {
        Some(level) => level.to_string(),
        None if logger.levels().contains("info") => "info".to_string(),
        None => logger.level(),
    };
    let mut record = Record::new(level, message);
    record.metadata = meta;
    record.insert_meta("durationMs", elapsed.as_millis() as u64);
    record
}
