//! Console transport

use super::{line_of, DEFAULT_EOL};
use crate::core::error::Result;
use crate::core::record::Record;
use crate::core::transport::{Completion, Transport, TransportBase, TransportOptions};
use std::collections::HashSet;
use std::io::{self, Write};

/// Writes to stdout, or to stderr for the levels listed in
/// [`stderr_levels`](Self::stderr_levels).
pub struct ConsoleTransport {
    base: TransportBase,
    stderr_levels: HashSet<String>,
    eol: String,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            base: TransportBase::new("console", TransportOptions::default()),
            stderr_levels: HashSet::new(),
            eol: DEFAULT_EOL.to_string(),
        }
    }

    /// Replace the common options.
    ///
    /// ```
    /// use rust_log_pipeline::transports::ConsoleTransport;
    /// use rust_log_pipeline::core::TransportOptions;
    /// use rust_log_pipeline::formats::{cli, IntoFormat};
    ///
    /// let console = ConsoleTransport::new()
    ///     .with_options(TransportOptions::new().level("debug").format(cli().into_format()))
    ///     .stderr_levels(["error", "warn"]);
    /// ```
    #[must_use]
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.base = TransportBase::new(self.base.name().to_string(), options);
        self
    }

    #[must_use]
    pub fn stderr_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stderr_levels = levels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = eol.into();
        self
    }

    fn uses_stderr(&self, level: &str) -> bool {
        self.stderr_levels.contains(level)
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConsoleTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn write(&mut self, record: &Record, done: Completion) {
        let line = line_of(record, &self.eol);
        let result = if self.uses_stderr(&record.level) {
            io::stderr().lock().write_all(line.as_bytes())
        } else {
            io::stdout().lock().write_all(line.as_bytes())
        };
        done.finish(result.map_err(Into::into));
    }

    fn flush(&mut self) -> Result<()> {
        // both streams may have been written
        io::stdout().flush()?;
        io::stderr().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_routing() {
        let console = ConsoleTransport::new().stderr_levels(["error"]);
        assert!(console.uses_stderr("error"));
        assert!(!console.uses_stderr("info"));
        assert_eq!(console.name(), "console");
    }
}
