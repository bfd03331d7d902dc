//! # Rust Log Pipeline
//!
//! A structured logging core: records carry a level, a message and ordered
//! metadata, pass through composable format chains and fan out to any
//! number of transports, each with its own threshold and format.
//!
//! ## Features
//!
//! - **Level registries**: npm, cli and syslog presets or custom scales
//! - **Format chains**: ordered, composable record transformations
//! - **Multi-transport dispatch**: per-transport thresholds and formats,
//!   synchronous or queued with explicit overflow policies
//! - **Failure capture**: uncaught panics and reported rejections become
//!   structured log records
//!
//! ```
//! use rust_log_pipeline::{combine, Logger};
//! use rust_log_pipeline::formats::{label, simple};
//! use rust_log_pipeline::transports::StreamTransport;
//!
//! let sink = StreamTransport::buffer("memory");
//! let buffer = sink.contents();
//! let logger = Logger::builder()
//!     .format(combine!(label("billing"), simple()))
//!     .transport(sink)
//!     .build()
//!     .unwrap();
//!
//! logger.log_with("info", "charged %d cents", vec![250.into()]).unwrap();
//! assert_eq!(buffer.text(), "info: charged 250 cents {\"label\":\"billing\"}\n");
//! ```

pub mod core;
pub mod formats;
pub mod macros;
pub mod transports;

pub mod prelude {
    pub use crate::core::{
        default_logger, init_default_logger, Arg, Completion, ErrorInfo, ExitOnError,
        LevelRegistry, LogEvent, LogInput, Logger, LoggerBuilder, LoggerError, LoggerMetrics,
        LoggerOptions, LoggerSettings, OverflowPolicy, Record, Result, TimestampFormat, Transport,
        TransportBase, TransportOptions, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::formats::{Format, FormatRef, IntoFormat};
    pub use crate::transports::StreamTransport;
    #[cfg(feature = "console")]
    pub use crate::transports::ConsoleTransport;
    #[cfg(feature = "file")]
    pub use crate::transports::FileTransport;
}

pub use self::core::{
    default_logger, init_default_logger, report_rejection, Arg, CaptureHandler, CaptureKind,
    Completion, ErrorInfo, ExitOnError, LevelRegistry, LogEvent, LogInput, Logger, LoggerBuilder,
    LoggerError, LoggerMetrics, LoggerOptions, LoggerSettings, OverflowPolicy, Record, Result,
    TimestampFormat, Transport, TransportBase, TransportOptions, DEFAULT_SHUTDOWN_TIMEOUT,
};
