//! Exception and rejection capture
//!
//! A [`CaptureHandler`] turns uncaught failures of one [`CaptureKind`] into
//! log records delivered to the transports opted in to that kind.
//!
//! ```text
//! UNINSTALLED --handle()--> INSTALLED --failure--> HANDLING
//!      ^                        ^                      |
//!      +------unhandle()--------+----exit == false-----+
//!                                    exit == true -> process exits
//! ```

use super::error::{LoggerError, Result};
use super::logger::{Logger, WeakLogger};
use super::process_hooks::{self, CaptureKind, Failure, ObserverId};
use super::record::ErrorInfo;
use super::transport::Transport;
use crate::core::dispatch::TransportHandle;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long a captured failure waits for its records to be written.
pub const CAPTURE_FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

/// Whether the process exits after a captured failure has been logged.
#[derive(Clone)]
pub enum ExitOnError {
    Flag(bool),
    /// Decide per failure.
    Decide(Arc<dyn Fn(&ErrorInfo) -> bool + Send + Sync>),
}

impl ExitOnError {
    pub fn decide<F>(predicate: F) -> Self
    where
        F: Fn(&ErrorInfo) -> bool + Send + Sync + 'static,
    {
        ExitOnError::Decide(Arc::new(predicate))
    }

    pub fn should_exit(&self, error: &ErrorInfo) -> bool {
        match self {
            ExitOnError::Flag(flag) => *flag,
            ExitOnError::Decide(predicate) => predicate(error),
        }
    }
}

impl Default for ExitOnError {
    fn default() -> Self {
        ExitOnError::Flag(true)
    }
}

impl From<bool> for ExitOnError {
    fn from(flag: bool) -> Self {
        ExitOnError::Flag(flag)
    }
}

impl fmt::Debug for ExitOnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOnError::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            ExitOnError::Decide(_) => f.write_str("Decide(..)"),
        }
    }
}

/// Routes one kind of uncaught failure into a logger.
pub struct CaptureHandler {
    kind: CaptureKind,
    logger: WeakLogger,
    level: Arc<Mutex<Option<String>>>,
    observer: Mutex<Option<ObserverId>>,
}

impl CaptureHandler {
    /// Fails with `CaptureInstall` if the logger no longer exists.
    pub fn new(kind: CaptureKind, logger: &WeakLogger) -> Result<Self> {
        if logger.upgrade().is_none() {
            return Err(LoggerError::capture_install(format!(
                "{} handler needs a live logger",
                kind
            )));
        }
        Ok(Self {
            kind,
            logger: logger.clone(),
            level: Arc::new(Mutex::new(None)),
            observer: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// Level of captured records. Defaults to `error`, or the most severe
    /// level when the scale has no `error`.
    #[must_use]
    pub fn with_level(self, level: impl Into<String>) -> Self {
        *self.level.lock() = Some(level.into());
        self
    }

    pub fn set_level(&self, level: impl Into<String>) {
        *self.level.lock() = Some(level.into());
    }

    /// Attach `transports` as sinks for this kind and install the process
    /// observer if any attached transport handles this kind.
    ///
    /// Transports attached here receive only captured records; a transport
    /// added to the logger directly with the opt-in flag set receives both.
    ///
    /// Calling it again never registers a second observer.
    pub fn handle<I>(&self, transports: I) -> Result<Vec<Arc<TransportHandle>>>
    where
        I: IntoIterator<Item = Box<dyn Transport>>,
    {
        let logger = self.logger.upgrade().ok_or_else(|| {
            LoggerError::capture_install(format!("{} handler outlived its logger", self.kind))
        })?;

        let mut added = Vec::new();
        for transport in transports {
            opt_in(self.kind, transport.as_ref());
            added.push(logger.attach(transport, true)?);
        }
        self.install(&logger);
        Ok(added)
    }

    /// Register the process observer once some attached transport handles
    /// this kind. Never registers a second observer.
    pub(crate) fn install(&self, logger: &Logger) {
        let has_sink = logger
            .transports()
            .iter()
            .any(|handle| handles_kind(handle, self.kind));
        if !has_sink {
            eprintln!(
                "[LOGGER WARNING] No transport handles {}s; capture not installed.",
                self.kind
            );
            return;
        }

        let mut observer = self.observer.lock();
        if observer.is_none() {
            let weak = self.logger.clone();
            let kind = self.kind;
            let level = Arc::clone(&self.level);
            *observer = Some(process_hooks::register(
                kind,
                Arc::new(move |failure: &Failure| {
                    if let Some(logger) = weak.upgrade() {
                        let level = level.lock().clone();
                        logger.handle_failure(kind, level.as_deref(), failure);
                    }
                }),
            ));
        }
    }

    /// Remove the process observer. Failures after this call are not
    /// intercepted by this handler.
    pub fn unhandle(&self) {
        if let Some(id) = self.observer.lock().take() {
            process_hooks::unregister(id);
        }
    }

    pub fn is_installed(&self) -> bool {
        self.observer.lock().is_some()
    }
}

impl Drop for CaptureHandler {
    fn drop(&mut self) {
        self.unhandle();
    }
}

impl fmt::Debug for CaptureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandler")
            .field("kind", &self.kind)
            .field("installed", &self.is_installed())
            .finish()
    }
}

/// Set the opt-in flag for `kind` on `transport`.
pub(crate) fn opt_in(kind: CaptureKind, transport: &dyn Transport) {
    let settings = transport.base().settings();
    match kind {
        CaptureKind::Exception => settings.set_handle_exceptions(true),
        CaptureKind::Rejection => settings.set_handle_rejections(true),
    }
}

pub(crate) fn handles_kind(handle: &TransportHandle, kind: CaptureKind) -> bool {
    match kind {
        CaptureKind::Exception => handle.settings().handles_exceptions(),
        CaptureKind::Rejection => handle.settings().handles_rejections(),
    }
}
