//! The sink contract
//!
//! A transport is anything with a write entry point. Shared behavior
//! (name, threshold, format, silent switch, capture opt-ins, listeners)
//! lives in a [`TransportBase`] that each concrete sink embeds by value.

use super::error::{LoggerError, Result};
use super::events::Observers;
use super::record::Record;
use crate::formats::FormatRef;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A destination for finished records.
///
/// `write` receives the record after every format chain ran, so
/// `record.output` is set. It must resolve `done` exactly once, either
/// inline or later from another thread; a `done` dropped unresolved counts
/// as a failed write.
pub trait Transport: Send {
    fn base(&self) -> &TransportBase;

    fn write(&mut self, record: &Record, done: Completion);

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release underlying resources. No write follows a close.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str {
        self.base().name()
    }
}

/// Options recognized by every transport.
#[derive(Clone, Default)]
pub struct TransportOptions {
    /// Threshold; `None` inherits the logger's level.
    pub level: Option<String>,
    /// Chain run after the logger's; `None` inherits the logger's output.
    pub format: Option<FormatRef>,
    pub silent: bool,
    pub handle_exceptions: bool,
    pub handle_rejections: bool,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: FormatRef) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn handle_exceptions(mut self, handle: bool) -> Self {
        self.handle_exceptions = handle;
        self
    }

    #[must_use]
    pub fn handle_rejections(mut self, handle: bool) -> Self {
        self.handle_rejections = handle;
        self
    }
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOptions")
            .field("level", &self.level)
            .field("format", &self.format.as_ref().map(|fmt| fmt.name().to_string()))
            .field("silent", &self.silent)
            .field("handle_exceptions", &self.handle_exceptions)
            .field("handle_rejections", &self.handle_rejections)
            .finish()
    }
}

/// Live view of a transport's options.
///
/// Clones share state with the transport, so a change made through any
/// clone applies to the next record dispatched.
#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    inner: Arc<RwLock<TransportOptions>>,
}

impl TransportSettings {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(options)),
        }
    }

    pub fn snapshot(&self) -> TransportOptions {
        self.inner.read().clone()
    }

    pub fn level(&self) -> Option<String> {
        self.inner.read().level.clone()
    }

    pub fn set_level(&self, level: Option<String>) {
        self.inner.write().level = level;
    }

    pub fn format(&self) -> Option<FormatRef> {
        self.inner.read().format.clone()
    }

    pub fn set_format(&self, format: Option<FormatRef>) {
        self.inner.write().format = format;
    }

    pub fn is_silent(&self) -> bool {
        self.inner.read().silent
    }

    pub fn set_silent(&self, silent: bool) {
        self.inner.write().silent = silent;
    }

    pub fn handles_exceptions(&self) -> bool {
        self.inner.read().handle_exceptions
    }

    pub fn set_handle_exceptions(&self, handle: bool) {
        self.inner.write().handle_exceptions = handle;
    }

    pub fn handles_rejections(&self) -> bool {
        self.inner.read().handle_rejections
    }

    pub fn set_handle_rejections(&self, handle: bool) {
        self.inner.write().handle_rejections = handle;
    }
}

/// State every transport carries.
#[derive(Debug, Clone)]
pub struct TransportBase {
    name: String,
    settings: TransportSettings,
    observers: Observers,
}

impl TransportBase {
    pub fn new(name: impl Into<String>, options: TransportOptions) -> Self {
        Self {
            name: name.into(),
            settings: TransportSettings::new(options),
            observers: Observers::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Listeners for this transport's `Logged` and `Error` notifications.
    pub fn observers(&self) -> &Observers {
        &self.observers
    }
}

pub(crate) enum WriteOutcome {
    Done(Result<()>),
    Cancelled,
}

type Callback = Box<dyn FnOnce(WriteOutcome) + Send>;

/// One-shot completion signal for a single write.
///
/// Resolve it with [`succeed`](Self::succeed), [`fail`](Self::fail) or
/// [`finish`](Self::finish). It is `Send`, so a transport may resolve it
/// from its own I/O thread.
pub struct Completion {
    transport: String,
    callback: Option<Callback>,
}

impl Completion {
    /// Completion that hands the write result to `callback`.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        Self::with_outcome("transport", move |outcome| {
            if let WriteOutcome::Done(result) = outcome {
                callback(result);
            }
        })
    }

    /// Completion nobody waits for.
    pub fn ignore() -> Self {
        Self {
            transport: String::new(),
            callback: None,
        }
    }

    pub(crate) fn with_outcome<F>(transport: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(WriteOutcome) + Send + 'static,
    {
        Self {
            transport: transport.into(),
            callback: Some(Box::new(callback)),
        }
    }

    pub fn succeed(self) {
        self.finish(Ok(()));
    }

    pub fn fail(self, error: LoggerError) {
        self.finish(Err(error));
    }

    pub fn finish(mut self, result: Result<()>) {
        if let Some(callback) = self.callback.take() {
            callback(WriteOutcome::Done(result));
        }
    }

    /// Resolve without a write having happened (transport detached or
    /// queue refused the record).
    pub(crate) fn cancel(mut self) {
        if let Some(callback) = self.callback.take() {
            callback(WriteOutcome::Cancelled);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(WriteOutcome::Done(Err(LoggerError::transport_write(
                self.transport.clone(),
                "write finished without resolving its completion",
            ))));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("transport", &self.transport)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<Result<()>>>>, Completion) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        let done = Completion::new(move |result| sink.lock().push(result));
        (results, done)
    }

    #[test]
    fn test_completion_succeed() {
        let (results, done) = recorder();
        done.succeed();
        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn test_completion_fail() {
        let (results, done) = recorder();
        done.fail(LoggerError::transport_write("t", "disk full"));
        assert!(matches!(
            results.lock()[0],
            Err(LoggerError::TransportWrite { .. })
        ));
    }

    #[test]
    fn test_dropped_completion_reports_failure() {
        let (results, done) = recorder();
        drop(done);
        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_cancel_is_silent_for_user_callbacks() {
        let (results, done) = recorder();
        done.cancel();
        assert!(results.lock().is_empty());
    }

    #[test]
    fn test_settings_are_shared() {
        let base = TransportBase::new("mem", TransportOptions::new().level("warn"));
        let settings = base.settings().clone();
        settings.set_level(Some("debug".to_string()));
        settings.set_silent(true);
        assert_eq!(base.settings().level().as_deref(), Some("debug"));
        assert!(base.settings().is_silent());
    }
}
