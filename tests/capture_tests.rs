//! Exception and rejection capture
//!
//! The observer registry and the panic hook are process-wide, so every
//! test here holds `SERIAL` for its whole body.

use parking_lot::Mutex;
use rust_log_pipeline::core::process_hooks::observer_count;
use rust_log_pipeline::core::{LogEvent, LoggerOptions, TransportOptions};
use rust_log_pipeline::formats::simple;
use rust_log_pipeline::transports::{SharedBuffer, StreamTransport};
use rust_log_pipeline::{
    report_rejection, CaptureKind, ExitOnError, LevelRegistry, Logger, Record, Transport,
};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::thread;

static SERIAL: Mutex<()> = Mutex::new(());

fn sink(name: &str) -> (StreamTransport<SharedBuffer>, SharedBuffer) {
    let sink = StreamTransport::buffer(name);
    let contents = sink.contents();
    (sink, contents)
}

fn lost_connection() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "lost connection")
}

#[test]
fn test_handle_is_idempotent() {
    let _serial = SERIAL.lock();
    let before = observer_count(CaptureKind::Rejection);

    let logger = Logger::builder().exit_on_error(false).build().unwrap();
    let handler = logger.rejections().unwrap();
    let (first, _) = sink("first");
    let (second, _) = sink("second");

    handler.handle(vec![Box::new(first) as Box<dyn Transport>]).unwrap();
    handler.handle(vec![Box::new(second) as Box<dyn Transport>]).unwrap();

    assert!(handler.is_installed());
    assert_eq!(observer_count(CaptureKind::Rejection), before + 1);
    assert_eq!(logger.transports().len(), 2);

    handler.unhandle();
    assert!(!handler.is_installed());
    assert_eq!(observer_count(CaptureKind::Rejection), before);
}

#[test]
fn test_rejection_reaches_only_opted_in_transports() {
    let _serial = SERIAL.lock();
    let (regular, regular_out) = sink("regular");
    let (handler, handler_out) = sink("rejections");

    let logger = Logger::builder()
        .transport(regular)
        .rejection_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();

    let captured = Arc::new(Mutex::new(Vec::new()));
    {
        let captured = Arc::clone(&captured);
        logger.on(move |event| {
            if let LogEvent::Captured { kind, record } = event {
                captured.lock().push((*kind, record.message.clone()));
            }
        });
    }

    assert!(report_rejection(&lost_connection()));

    assert!(regular_out.is_empty());
    let line: Value = serde_json::from_str(&handler_out.lines()[0]).unwrap();
    assert_eq!(line["level"], "error");
    assert_eq!(line["message"], "unhandled rejection: lost connection");
    assert_eq!(line["rejection"], true);
    assert_eq!(line["error"]["name"], "UnhandledRejection");
    assert!(line["process"]["pid"].is_u64());
    assert!(line["os"]["loadavg"].is_array());
    assert!(line["trace"].is_array());
    assert!(line["date"].is_string());

    assert_eq!(
        *captured.lock(),
        vec![(
            CaptureKind::Rejection,
            "unhandled rejection: lost connection".to_string()
        )]
    );
}

#[test]
fn test_flagged_records_skip_regular_transports() {
    let _serial = SERIAL.lock();
    let (regular, regular_out) = sink("regular");
    let (handler, handler_out) = sink("exceptions");

    let logger = Logger::builder()
        .format(simple())
        .transport(regular)
        .exception_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();

    logger
        .write(Record::new("error", "manual").with_meta("exception", true))
        .unwrap();
    logger.log("error", "ordinary").unwrap();

    assert_eq!(regular_out.lines(), vec!["error: ordinary"]);
    assert_eq!(handler_out.lines(), vec!["error: manual {\"exception\":true}"]);
}

#[test]
fn test_exit_hook_runs_after_logging() {
    let _serial = SERIAL.lock();
    let (handler, handler_out) = sink("rejections");
    let codes = Arc::new(Mutex::new(Vec::new()));
    let exits = Arc::clone(&codes);

    let logger = Logger::builder()
        .rejection_handler(handler)
        .exit_hook(move |code| exits.lock().push((code, handler_out.lines().len())))
        .build()
        .unwrap();
    let captured = Arc::new(Mutex::new(0usize));
    {
        let captured = Arc::clone(&captured);
        logger.on(move |event| {
            if matches!(event, LogEvent::Captured { .. }) {
                *captured.lock() += 1;
            }
        });
    }

    report_rejection(&lost_connection());

    // the record was written before the hook ran
    assert_eq!(*codes.lock(), vec![(1, 1)]);
    assert_eq!(*captured.lock(), 0);
}

#[test]
fn test_exit_predicate_decides_per_failure() {
    let _serial = SERIAL.lock();
    let (handler, _) = sink("rejections");
    let codes = Arc::new(Mutex::new(Vec::new()));
    let exits = Arc::clone(&codes);

    let _logger = Logger::builder()
        .rejection_handler(handler)
        .exit_on_error(ExitOnError::decide(|error| error.message.contains("fatal")))
        .exit_hook(move |code| exits.lock().push(code))
        .build()
        .unwrap();

    report_rejection(&lost_connection());
    assert!(codes.lock().is_empty());

    report_rejection(&io::Error::new(io::ErrorKind::Other, "fatal corruption"));
    assert_eq!(*codes.lock(), vec![1]);
}

#[test]
fn test_unhandle_stops_capture() {
    let _serial = SERIAL.lock();
    let (handler, handler_out) = sink("rejections");
    let logger = Logger::builder()
        .rejection_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();

    logger.rejections().unwrap().unhandle();
    assert!(!report_rejection(&lost_connection()));
    assert!(handler_out.is_empty());
}

#[test]
fn test_dropping_logger_removes_observer() {
    let _serial = SERIAL.lock();
    let before = observer_count(CaptureKind::Rejection);
    {
        let (handler, _) = sink("rejections");
        let _logger = Logger::builder()
            .rejection_handler(handler)
            .exit_on_error(false)
            .build()
            .unwrap();
        assert_eq!(observer_count(CaptureKind::Rejection), before + 1);
    }
    assert_eq!(observer_count(CaptureKind::Rejection), before);
}

#[test]
fn test_panic_in_thread_is_captured() {
    let _serial = SERIAL.lock();
    let (handler, handler_out) = sink("exceptions");
    let logger = Logger::builder()
        .exception_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();
    assert!(observer_count(CaptureKind::Exception) >= 1);

    let result = thread::Builder::new()
        .name("worker-7".to_string())
        .spawn(|| panic!("worker exploded"))
        .unwrap()
        .join();
    assert!(result.is_err());

    let line: Value = serde_json::from_str(&handler_out.lines()[0]).unwrap();
    assert_eq!(line["message"], "uncaught panic: worker exploded");
    assert_eq!(line["exception"], true);
    assert_eq!(line["thread"], "worker-7");
    assert!(line["location"].as_str().unwrap().contains("capture_tests.rs"));
    assert!(line["stack"].as_str().unwrap().starts_with("panic: worker exploded"));

    drop(logger);
}

#[test]
fn test_capture_bypasses_threshold_and_uses_handler_level() {
    let _serial = SERIAL.lock();
    let handler = StreamTransport::buffer("rejections")
        .with_options(TransportOptions::new().level("emerg"));
    let out = handler.contents();

    let logger = Logger::builder()
        .levels(LevelRegistry::syslog())
        .rejection_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();
    logger.rejections().unwrap().set_level("warning");

    report_rejection(&lost_connection());

    let line: Value = serde_json::from_str(&out.lines()[0]).unwrap();
    assert_eq!(line["level"], "warning");
}

#[test]
fn test_scale_without_error_uses_most_severe() {
    let _serial = SERIAL.lock();
    let (handler, out) = sink("rejections");
    let levels = LevelRegistry::new([("fatal", 0), ("notice", 1), ("trace", 2)]).unwrap();

    let _logger = Logger::builder()
        .levels(levels)
        .rejection_handler(handler)
        .exit_on_error(false)
        .build()
        .unwrap();

    report_rejection(&lost_connection());

    let line: Value = serde_json::from_str(&out.lines()[0]).unwrap();
    assert_eq!(line["level"], "fatal");
}

#[test]
fn test_configure_attaches_handlers_in_one_step() {
    let _serial = SERIAL.lock();
    let before = observer_count(CaptureKind::Rejection);
    let logger = Logger::builder().exit_on_error(false).build().unwrap();

    let bad = StreamTransport::buffer("rejections")
        .with_options(TransportOptions::new().level("trace"));
    let result = logger.configure(LoggerOptions::new().level("warn").rejection_handler(bad));
    assert!(result.is_err());
    assert_eq!(logger.level(), "info");
    assert!(logger.transports().is_empty());
    assert_eq!(observer_count(CaptureKind::Rejection), before);

    let (handler, out) = sink("rejections");
    logger
        .configure(LoggerOptions::new().level("warn").rejection_handler(handler))
        .unwrap();
    assert_eq!(logger.level(), "warn");
    assert_eq!(logger.transports().len(), 1);
    assert!(logger.transports()[0].is_capture_only());
    assert!(logger.rejections().unwrap().is_installed());
    assert_eq!(observer_count(CaptureKind::Rejection), before + 1);

    logger.log("error", "ordinary").unwrap();
    report_rejection(&lost_connection());
    assert_eq!(out.lines().len(), 1);

    logger.end();
    assert!(matches!(
        logger.configure(LoggerOptions::new().level("info")),
        Err(rust_log_pipeline::LoggerError::LoggerStopped)
    ));
    assert_eq!(logger.level(), "warn");
}
