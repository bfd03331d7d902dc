//! Context gathered when a process failure is captured

use serde::Serialize;
use std::env;

/// Identity and resource usage of the current process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    pub cwd: Option<String>,
    #[serde(rename = "execPath")]
    pub exec_path: Option<String>,
    /// Version of the logging library.
    pub version: String,
    pub argv: Vec<String>,
    #[serde(rename = "memoryUsage")]
    pub memory_usage: MemoryUsage,
}

/// Resident and virtual memory in bytes; zero where unavailable.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_size: u64,
    pub peak_rss: u64,
}

impl ProcessInfo {
    pub fn collect() -> Self {
        let (uid, gid) = ids();
        Self {
            pid: std::process::id(),
            uid,
            gid,
            cwd: env::current_dir()
                .ok()
                .map(|p| p.display().to_string()),
            exec_path: env::current_exe()
                .ok()
                .map(|p| p.display().to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            argv: env::args().collect(),
            memory_usage: MemoryUsage::collect(),
        }
    }
}

#[cfg(unix)]
fn ids() -> (Option<u32>, Option<u32>) {
    // SAFETY: getuid/getgid have no preconditions and cannot fail
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    (Some(uid), Some(gid))
}

#[cfg(not(unix))]
fn ids() -> (Option<u32>, Option<u32>) {
    (None, None)
}

impl MemoryUsage {
    #[cfg(target_os = "linux")]
    pub fn collect() -> Self {
        std::fs::read_to_string("/proc/self/status")
            .map(|status| Self::parse_status(&status))
            .unwrap_or_default()
    }

    #[cfg(not(target_os = "linux"))]
    pub fn collect() -> Self {
        Self::default()
    }

    /// Parse the `VmRSS`/`VmSize`/`VmHWM` lines of `/proc/<pid>/status`.
    pub fn parse_status(status: &str) -> Self {
        let mut usage = Self::default();
        for line in status.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let kib = value
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse::<u64>()
                .unwrap_or(0);
            match key {
                "VmRSS" => usage.rss = kib * 1024,
                "VmSize" => usage.virtual_size = kib * 1024,
                "VmHWM" => usage.peak_rss = kib * 1024,
                _ => {}
            }
        }
        usage
    }
}

/// Host load and uptime.
#[derive(Debug, Clone, Serialize)]
pub struct OsInfo {
    pub loadavg: [f64; 3],
    /// Seconds since boot.
    pub uptime: f64,
}

impl OsInfo {
    #[cfg(target_os = "linux")]
    pub fn collect() -> Self {
        let loadavg = std::fs::read_to_string("/proc/loadavg")
            .map(|s| parse_loadavg(&s))
            .unwrap_or([0.0; 3]);
        let uptime = std::fs::read_to_string("/proc/uptime")
            .ok()
            .and_then(|s| s.split_whitespace().next().and_then(|v| v.parse().ok()))
            .unwrap_or(0.0);
        Self { loadavg, uptime }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn collect() -> Self {
        Self {
            loadavg: [0.0; 3],
            uptime: 0.0,
        }
    }
}

fn parse_loadavg(text: &str) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(text.split_whitespace()) {
        *slot = value.parse().unwrap_or(0.0);
    }
    out
}

/// One parsed stack frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Frame belongs to the standard library or the runtime.
    pub native: bool,
}

/// Parse a rendered `std::backtrace::Backtrace` into frames.
///
/// Lines that are neither a frame header (`  3: path::to::fn`) nor a
/// location (`at src/main.rs:10:5`) are ignored.
pub fn parse_trace(trace: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in trace.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    let (file, line_no, column) = split_location(location);
                    frame.native = frame.native || is_native_path(&file);
                    frame.file = Some(file);
                    frame.line = line_no;
                    frame.column = column;
                }
            }
            continue;
        }

        let Some((index, function)) = line.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let function = function.trim().to_string();
        frames.push(Frame {
            native: is_native_function(&function),
            function: Some(function),
            file: None,
            line: None,
            column: None,
        });
    }

    frames
}

fn split_location(location: &str) -> (String, Option<u32>, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (rest, middle, last) {
        (Some(file), Some(line), Some(column)) => match (line.parse(), column.parse()) {
            (Ok(line), Ok(column)) => (file.to_string(), Some(line), Some(column)),
            _ => (location.to_string(), None, None),
        },
        (None, Some(file), Some(line)) => match line.parse() {
            Ok(line) => (file.to_string(), Some(line), None),
            Err(_) => (location.to_string(), None, None),
        },
        _ => (location.to_string(), None, None),
    }
}

fn is_native_function(function: &str) -> bool {
    ["std::", "core::", "alloc::", "__rust", "<unknown>"]
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

fn is_native_path(file: &str) -> bool {
    file.starts_with("/rustc/") || file.contains("/library/std/") || file.contains("/library/core/")
}
