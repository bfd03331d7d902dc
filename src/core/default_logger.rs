//! Process-wide default logger

use super::error::{LoggerError, Result};
use super::logger::Logger;
use once_cell::sync::OnceCell;

static DEFAULT_LOGGER: OnceCell<Logger> = OnceCell::new();

/// Install `logger` as the default. Fails if a default already exists,
/// including one created implicitly by [`default_logger`].
pub fn init_default_logger(logger: Logger) -> Result<()> {
    DEFAULT_LOGGER
        .set(logger)
        .map_err(|_| LoggerError::config("default logger", "already initialized"))
}

/// The default logger, created with [`Logger::new`] on first use.
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER.get_or_init(Logger::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let first = default_logger();
        assert_eq!(first.level(), "info");
        assert!(init_default_logger(Logger::new()).is_err());
    }
}
