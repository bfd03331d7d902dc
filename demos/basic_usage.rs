//! Basic logger usage example
//!
//! Demonstrates per-transport thresholds and formats, metadata, per-level
//! methods, events and failure capture.
//!
//! Run with: cargo run --example basic_usage

use rust_log_pipeline::combine;
use rust_log_pipeline::core::LogEvent;
use rust_log_pipeline::formats::{cli, errors, json, timestamp, IntoFormat};
use rust_log_pipeline::prelude::*;
use serde_json::json;
use std::io;

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Basic Usage Example ===\n");

    let console = ConsoleTransport::new()
        .with_options(
            TransportOptions::new()
                .level("debug")
                .format(cli().into_format()),
        )
        .stderr_levels(["error"]);

    let log_path = std::env::temp_dir().join("rust_log_pipeline_demo.log");
    let file = FileTransport::new(&log_path)?
        .with_options(TransportOptions::new().level("warn"));

    let logger = Logger::builder()
        .format(combine!(errors(), timestamp(), json()))
        .meta("service", "demo")
        .transport(console)
        .transport(file)
        .rejection_handler(StreamTransport::new("rejections", io::stderr()))
        .exit_on_error(false)
        .build()?;

    logger.on(|event| {
        if let LogEvent::Error { transport, error } = event {
            eprintln!("transport {:?} failed: {}", transport, error);
        }
    });

    println!("1. Logging at different levels:");
    logger.log("error", "This is an error message")?;
    logger.log("warn", "This is a warning message")?;
    logger.log("info", "This is an info message")?;
    logger.log("debug", "This is a debug message")?;
    logger.log("silly", "This one is below every threshold")?;

    println!("\n2. Interpolation and metadata:");
    logger.log_with(
        "info",
        "%s handled %d requests",
        vec!["worker-1".into(), 42.into(), json!({"region": "eu"}).into()],
    )?;

    println!("\n3. Per-level methods and child loggers:");
    if let Some(warn) = logger.method("warn") {
        warn.log("Disk usage above 80%")?;
    }
    let request = match json!({"request_id": "abc123"}) {
        serde_json::Value::Object(meta) => logger.child(meta),
        _ => logger.clone(),
    };
    request.log("info", "Request finished")?;

    println!("\n4. Reported rejection:");
    let lost = io::Error::new(io::ErrorKind::ConnectionReset, "background task lost its peer");
    rust_log_pipeline::report_rejection(&lost);

    logger.close()?;
    println!("\nWarnings and errors were also written to {}", log_path.display());
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
