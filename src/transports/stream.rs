//! Transport over any `io::Write`

use super::{line_of, DEFAULT_EOL};
use crate::core::error::{LoggerError, Result};
use crate::core::record::Record;
use crate::core::transport::{Completion, Transport, TransportBase, TransportOptions};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Writes each record to a caller-supplied writer.
///
/// ```
/// use rust_log_pipeline::{Logger, transports::StreamTransport};
///
/// let sink = StreamTransport::buffer("capture");
/// let buffer = sink.contents();
/// let logger = Logger::builder().transport(sink).build().unwrap();
///
/// logger.log("warn", "disk almost full").unwrap();
/// assert_eq!(buffer.lines().len(), 1);
/// ```
pub struct StreamTransport<W: Write + Send> {
    base: TransportBase,
    writer: W,
    eol: String,
}

impl<W: Write + Send> StreamTransport<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            base: TransportBase::new(name, TransportOptions::default()),
            writer,
            eol: DEFAULT_EOL.to_string(),
        }
    }

    /// Replace the common options. Call before attaching.
    #[must_use]
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.base = TransportBase::new(self.base.name().to_string(), options);
        self
    }

    #[must_use]
    pub fn with_eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = eol.into();
        self
    }
}

impl StreamTransport<SharedBuffer> {
    /// Stream into an in-memory buffer, readable through [`contents`](Self::contents).
    pub fn buffer(name: impl Into<String>) -> Self {
        Self::new(name, SharedBuffer::default())
    }

    /// Handle onto the buffer that stays valid after the transport moves
    /// into a logger.
    pub fn contents(&self) -> SharedBuffer {
        self.writer.clone()
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn write(&mut self, record: &Record, done: Completion) {
        let line = line_of(record, &self.eol);
        match self.writer.write_all(line.as_bytes()) {
            Ok(()) => done.succeed(),
            Err(e) => done.fail(LoggerError::io_operation(
                format!("writing to '{}'", self.base.name()),
                "stream write failed",
                e,
            )),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| {
            LoggerError::io_operation(
                format!("flushing '{}'", self.base.name()),
                "stream flush failed",
                e,
            )
        })
    }
}

/// Cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_output_with_eol() {
        let mut sink = StreamTransport::buffer("mem").with_eol("|");
        let buffer = sink.contents();
        let mut record = Record::new("info", "raw");
        record.output = Some("rendered".to_string());

        sink.write(&record, Completion::ignore());
        sink.write(&Record::new("info", "fallback"), Completion::ignore());
        assert_eq!(buffer.text(), "rendered|fallback|");
    }

    #[test]
    fn test_write_error_fails_completion() {
        let mut sink = StreamTransport::new("broken", Broken);
        let result = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&result);
        sink.write(
            &Record::new("info", "x"),
            Completion::new(move |r| *seen.lock() = Some(r.is_err())),
        );
        assert_eq!(*result.lock(), Some(true));
    }
}
