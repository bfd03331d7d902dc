//! Core logger types and traits

pub mod capture;
pub mod config;
pub mod default_logger;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod failure_info;
pub mod interpolate;
pub mod level_methods;
pub mod levels;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod process_hooks;
pub mod profiler;
pub mod record;
pub mod timestamp;
pub mod transport;

pub use capture::{CaptureHandler, ExitOnError, CAPTURE_FLUSH_TIMEOUT};
pub use config::{LoggerOptions, LoggerSettings};
pub use default_logger::{default_logger, init_default_logger};
pub use dispatch::{DispatchMode, TransportHandle, DEFAULT_QUEUE_CAPACITY};
pub use error::{LoggerError, Result};
pub use events::{ListenerId, LogEvent};
pub use level_methods::{LevelMethod, LevelMethods};
pub use levels::LevelRegistry;
pub use logger::{Logger, LoggerBuilder, WeakLogger, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::LoggerMetrics;
pub use overflow_policy::OverflowPolicy;
pub use process_hooks::{report_rejection, report_rejection_info, CaptureKind, Failure};
pub use profiler::Profiler;
pub use record::{Arg, ErrorInfo, LogInput, Record};
pub use timestamp::TimestampFormat;
pub use transport::{Completion, Transport, TransportBase, TransportOptions, TransportSettings};
