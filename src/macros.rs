//! Logging macros for ergonomic log message formatting.
//!
//! These macros format their arguments with `format!` and log the result,
//! returning the `Result` of the call. The named macros use the default
//! npm level names.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::{Logger, info};
//! use rust_log_pipeline::transports::StreamTransport;
//!
//! let sink = StreamTransport::buffer("memory");
//! let buffer = sink.contents();
//! let logger = Logger::builder().transport(sink).build().unwrap();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port).unwrap();
//! assert!(buffer.text().contains("8080"));
//! ```

/// Log a formatted message at any level name.
///
/// ```
/// # use rust_log_pipeline::Logger;
/// use rust_log_pipeline::log;
/// let logger = Logger::new();
/// log!(logger, "info", "Error code: {}", 500).unwrap();
/// assert!(log!(logger, "loud", "unknown level").is_err());
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "error", $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "warn", $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "info", $($arg)+)
    };
}

#[macro_export]
macro_rules! http {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "http", $($arg)+)
    };
}

#[macro_export]
macro_rules! verbose {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "verbose", $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "debug", $($arg)+)
    };
}

#[macro_export]
macro_rules! silly {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, "silly", $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Logger, LoggerOptions};
    use crate::formats::simple;
    use crate::transports::{SharedBuffer, StreamTransport};

    fn logger_at(level: &str) -> (Logger, SharedBuffer) {
        let sink = StreamTransport::buffer("memory");
        let buffer = sink.contents();
        let logger = Logger::builder()
            .level(level)
            .format(simple())
            .transport(sink)
            .build()
            .unwrap();
        (logger, buffer)
    }

    #[test]
    fn test_log_macro() {
        let (logger, buffer) = logger_at("info");
        log!(logger, "info", "Formatted: {}", 42).unwrap();
        assert_eq!(buffer.text(), "info: Formatted: 42\n");
    }

    #[test]
    fn test_level_macros() {
        let (logger, buffer) = logger_at("silly");
        error!(logger, "Code: {}", 500).unwrap();
        warn!(logger, "Retry {} of {}", 1, 3).unwrap();
        info!(logger, "Items: {}", 100).unwrap();
        http!(logger, "GET /").unwrap();
        verbose!(logger, "verbose").unwrap();
        debug!(logger, "Count: {}", 5).unwrap();
        silly!(logger, "silly").unwrap();
        assert_eq!(buffer.lines().len(), 7);
        assert_eq!(buffer.lines()[1], "warn: Retry 1 of 3");
    }

    #[test]
    fn test_macro_respects_threshold() {
        let (logger, buffer) = logger_at("warn");
        debug!(logger, "hidden").unwrap();
        logger.configure(LoggerOptions::new().level("debug")).unwrap();
        debug!(logger, "shown").unwrap();
        assert_eq!(buffer.lines(), vec!["debug: shown".to_string()]);
    }
}
