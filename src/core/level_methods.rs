//! Per-level convenience methods
//!
//! The table is derived from the level registry and rebuilt wholesale
//! whenever the registry changes, so a level removed by `configure` leaves
//! no callable entry behind.

use super::error::{LoggerError, Result};
use super::levels::LevelRegistry;
use super::logger::Logger;
use super::record::{Arg, ErrorInfo};

/// Names with a generated method, most severe first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMethods {
    names: Vec<String>,
    generation: u64,
}

impl LevelMethods {
    pub(crate) fn build(levels: &LevelRegistry, generation: u64) -> Self {
        Self {
            names: levels.names(),
            generation,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Incremented on every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A logging function bound to one level.
///
/// ```
/// use rust_log_pipeline::Logger;
///
/// let logger = Logger::new();
/// let warn = logger.method("warn").unwrap();
/// assert_eq!(warn.level(), "warn");
/// assert!(logger.method("trace").is_none());
/// ```
#[derive(Clone)]
pub struct LevelMethod {
    level: String,
    logger: Logger,
}

impl LevelMethod {
    pub(crate) fn new(level: String, logger: Logger) -> Self {
        Self { level, logger }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn log(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(message, Vec::new())
    }

    pub fn log_with(&self, message: impl Into<String>, args: Vec<Arg>) -> Result<()> {
        self.ensure_current()?;
        self.logger.log_with(&self.level, message, args)
    }

    pub fn error(&self, error: ErrorInfo) -> Result<()> {
        self.ensure_current()?;
        self.logger.log_error(&self.level, error)
    }

    /// A method obtained before a reconfiguration that removed its level
    /// refuses to log.
    fn ensure_current(&self) -> Result<()> {
        if self.logger.methods().contains(&self.level) {
            Ok(())
        } else {
            Err(LoggerError::unknown_level(self.level.clone()))
        }
    }
}

impl std::fmt::Debug for LevelMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelMethod").field("level", &self.level).finish()
    }
}
