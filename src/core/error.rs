//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Level name is not part of the registry
    #[error("Unknown log level: '{level}'")]
    UnknownLevel { level: String },

    /// Log call carried no usable level
    #[error("Invalid log level: {reason}")]
    InvalidLevel { reason: String },

    /// Transport rejected its own configuration
    #[error("Cannot construct transport '{transport}': {message}")]
    TransportConstruction { transport: String, message: String },

    /// Sink failed to persist a record
    #[error("Transport '{transport}' failed to write: {message}")]
    TransportWrite { transport: String, message: String },

    /// Exception or rejection handler has no owning logger
    #[error("Cannot install capture handler: {0}")]
    CaptureInstall(String),

    /// Transport queue full with buffer details
    #[error("Queue full for transport '{transport}': {current}/{max} records buffered")]
    QueueFull {
        transport: String,
        current: usize,
        max: usize,
    },

    /// Logger already ended
    #[error("Logger already ended")]
    LoggerStopped,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Format stage failure
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn unknown_level(level: impl Into<String>) -> Self {
        LoggerError::UnknownLevel {
            level: level.into(),
        }
    }

    pub fn invalid_level(reason: impl Into<String>) -> Self {
        LoggerError::InvalidLevel {
            reason: reason.into(),
        }
    }

    /// Create a transport construction error
    pub fn transport_construction(
        transport: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LoggerError::TransportConstruction {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create a transport write error
    pub fn transport_write(transport: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::TransportWrite {
            transport: transport.into(),
            message: message.into(),
        }
    }

    pub fn capture_install(message: impl Into<String>) -> Self {
        LoggerError::CaptureInstall(message.into())
    }

    /// Create a queue full error with buffer details
    pub fn queue_full(transport: impl Into<String>, current: usize, max: usize) -> Self {
        LoggerError::QueueFull {
            transport: transport.into(),
            current,
            max,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::queue_full("console", 100, 1000);
        assert!(matches!(err, LoggerError::QueueFull { .. }));

        let err = LoggerError::config("LevelRegistry", "duplicate rank");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::transport_construction("file", "missing filename");
        assert!(matches!(err, LoggerError::TransportConstruction { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::queue_full("file", 100, 1000);
        assert_eq!(
            err.to_string(),
            "Queue full for transport 'file': 100/1000 records buffered"
        );

        let err = LoggerError::unknown_level("loud");
        assert_eq!(err.to_string(), "Unknown log level: 'loud'");

        let err = LoggerError::transport_write("http", "connection reset");
        assert_eq!(
            err.to_string(),
            "Transport 'http' failed to write: connection reset"
        );

        let err = LoggerError::formatter("printf", "template panicked");
        assert_eq!(err.to_string(), "Formatter error (printf): template panicked");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("opening log file", "cannot append", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("opening log file"));
        assert!(err.to_string().contains("cannot append"));
    }
}
