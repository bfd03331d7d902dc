//! Logger configuration
//!
//! [`LoggerOptions`] is the programmatic form accepted by
//! `Logger::configure`: every field is optional and only the fields given
//! are replaced. [`LoggerSettings`] is the declarative subset that can be
//! loaded from JSON.

use super::capture::ExitOnError;
use super::error::Result;
use super::levels::LevelRegistry;
use super::transport::Transport;
use crate::formats::{FormatRef, IntoFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for `Logger::configure`. `None` keeps the current value.
#[derive(Default)]
pub struct LoggerOptions {
    pub levels: Option<LevelRegistry>,
    pub level: Option<String>,
    pub format: Option<FormatRef>,
    /// Replaces every attached transport.
    pub transports: Option<Vec<Box<dyn Transport>>>,
    /// Attached with `handle_exceptions` set, then capture is installed.
    pub exception_handlers: Option<Vec<Box<dyn Transport>>>,
    /// Attached with `handle_rejections` set, then capture is installed.
    pub rejection_handlers: Option<Vec<Box<dyn Transport>>>,
    pub silent: Option<bool>,
    pub exit_on_error: Option<ExitOnError>,
    pub default_meta: Option<Map<String, Value>>,
}

impl LoggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn levels(mut self, levels: LevelRegistry) -> Self {
        self.levels = Some(levels);
        self
    }

    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl IntoFormat) -> Self {
        self.format = Some(format.into_format());
        self
    }

    /// Add a transport to the replacement set.
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transports
            .get_or_insert_with(Vec::new)
            .push(Box::new(transport));
        self
    }

    /// Replace the transport set with `transports` (possibly empty).
    #[must_use]
    pub fn transports(mut self, transports: Vec<Box<dyn Transport>>) -> Self {
        self.transports = Some(transports);
        self
    }

    #[must_use]
    pub fn exception_handler<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.exception_handlers
            .get_or_insert_with(Vec::new)
            .push(Box::new(transport));
        self
    }

    #[must_use]
    pub fn rejection_handler<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.rejection_handlers
            .get_or_insert_with(Vec::new)
            .push(Box::new(transport));
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    #[must_use]
    pub fn exit_on_error(mut self, exit: impl Into<ExitOnError>) -> Self {
        self.exit_on_error = Some(exit.into());
        self
    }

    #[must_use]
    pub fn default_meta(mut self, meta: Map<String, Value>) -> Self {
        self.default_meta = Some(meta);
        self
    }
}

/// Declarative configuration.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::LoggerSettings;
///
/// let settings = LoggerSettings::from_json(r#"{
///     "levels": { "levels": { "fatal": 0, "error": 1, "info": 2 } },
///     "level": "error",
///     "exit_on_error": false,
///     "default_meta": { "service": "billing" }
/// }"#).unwrap();
///
/// let logger = settings.into_builder().build().unwrap();
/// assert_eq!(logger.level(), "error");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    pub levels: Option<LevelRegistry>,
    pub level: Option<String>,
    pub silent: Option<bool>,
    pub exit_on_error: Option<bool>,
    pub default_meta: Option<Map<String, Value>>,
    /// Queue capacity per transport; enables asynchronous dispatch.
    pub buffer_size: Option<usize>,
}

impl LoggerSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn into_builder(self) -> super::logger::LoggerBuilder {
        super::logger::LoggerBuilder::new().settings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;

    #[test]
    fn test_settings_defaults() {
        let settings = LoggerSettings::from_json("{}").unwrap();
        assert_eq!(settings, LoggerSettings::default());
    }

    #[test]
    fn test_settings_roundtrip_with_levels() {
        let settings = LoggerSettings {
            levels: Some(LevelRegistry::syslog()),
            level: Some("notice".to_string()),
            buffer_size: Some(128),
            ..Default::default()
        };
        let json = settings.to_json().unwrap();
        assert_eq!(LoggerSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_settings_reject_bad_levels() {
        let result = LoggerSettings::from_json(r#"{"levels": {"levels": {"a": 0, "b": 0}}}"#);
        assert!(matches!(result, Err(LoggerError::JsonError(_))));
    }

    #[test]
    fn test_options_accumulate_transports() {
        let options = LoggerOptions::new().level("debug").silent(true);
        assert_eq!(options.level.as_deref(), Some("debug"));
        assert_eq!(options.silent, Some(true));
        assert!(options.transports.is_none());
    }
}
