//! File transport

use super::{line_of, DEFAULT_EOL};
use crate::core::error::{LoggerError, Result};
use crate::core::record::Record;
use crate::core::transport::{Completion, Transport, TransportBase, TransportOptions};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends records to a file, creating it and its parent directories.
pub struct FileTransport {
    base: TransportBase,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    eol: String,
}

impl FileTransport {
    /// Open `path` for appending.
    ///
    /// ```no_run
    /// use rust_log_pipeline::transports::FileTransport;
    ///
    /// let file = FileTransport::new("/var/log/app/combined.log").unwrap();
    /// assert!(FileTransport::new("").is_err());
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(LoggerError::transport_construction(
                "file",
                "a file path is required",
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    parent.display().to_string(),
                    e,
                )
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation("opening log file", path.display().to_string(), e)
            })?;

        Ok(Self {
            base: TransportBase::new("file", TransportOptions::default()),
            path,
            writer: Some(BufWriter::new(file)),
            eol: DEFAULT_EOL.to_string(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.base = TransportBase::new(self.base.name().to_string(), options);
        self
    }

    /// Rename the transport, e.g. to tell two files apart in events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let options = self.base.settings().snapshot();
        self.base = TransportBase::new(name, options);
        self
    }

    #[must_use]
    pub fn with_eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = eol.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for FileTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn write(&mut self, record: &Record, done: Completion) {
        let Some(writer) = self.writer.as_mut() else {
            done.fail(LoggerError::transport_write(
                self.base.name(),
                format!("{} is closed", self.path.display()),
            ));
            return;
        };
        let line = line_of(record, &self.eol);
        match writer.write_all(line.as_bytes()) {
            Ok(()) => done.succeed(),
            Err(e) => done.fail(LoggerError::io_operation(
                "writing log file",
                self.path.display().to_string(),
                e,
            )),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|e| {
                LoggerError::io_operation("flushing log file", self.path.display().to_string(), e)
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let result = self.flush();
        self.writer = None;
        result
    }
}

impl Drop for FileTransport {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_path_is_construction_error() {
        assert!(matches!(
            FileTransport::new(""),
            Err(LoggerError::TransportConstruction { .. })
        ));
    }

    #[test]
    fn test_appends_and_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("app.log");

        let mut file = FileTransport::new(&path).unwrap();
        let mut record = Record::new("info", "first");
        record.output = Some("line one".to_string());
        file.write(&record, Completion::ignore());
        file.close().unwrap();

        let mut again = FileTransport::new(&path).unwrap();
        again.write(&Record::new("info", "line two"), Completion::ignore());
        again.flush().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("line one{eol}line two{eol}", eol = DEFAULT_EOL)
        );
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let mut file = FileTransport::new(dir.path().join("a.log")).unwrap();
        file.close().unwrap();

        let failed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&failed);
        file.write(
            &Record::new("info", "late"),
            Completion::new(move |r| flag.store(r.is_err(), std::sync::atomic::Ordering::SeqCst)),
        );
        assert!(failed.load(std::sync::atomic::Ordering::SeqCst));
    }
}
