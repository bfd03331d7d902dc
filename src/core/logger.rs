//! The dispatcher
//!
//! A [`Logger`] owns the level registry, the global format chain and the
//! attached transports. Its state is an immutable snapshot replaced as a
//! whole under one reconfiguration lock, so a concurrent `log` call sees
//! either the old configuration or the new one, never a mix.

use super::capture::{handles_kind, opt_in, CaptureHandler, ExitOnError, CAPTURE_FLUSH_TIMEOUT};
use super::config::{LoggerOptions, LoggerSettings};
use super::dispatch::{run_chain, DispatchMode, InFlight, TransportHandle, WriteContext, DEFAULT_QUEUE_CAPACITY};
use super::error::{LoggerError, Result};
use super::events::{ListenerId, LogEvent, Observers};
use super::failure_info::{parse_trace, OsInfo, ProcessInfo};
use super::interpolate::normalize;
use super::level_methods::{LevelMethod, LevelMethods};
use super::levels::LevelRegistry;
use super::metrics::LoggerMetrics;
use super::overflow_policy::OverflowPolicy;
use super::process_hooks::{CaptureKind, Failure};
use super::profiler::{timed_record, Profiler};
use super::record::{Arg, ErrorInfo, LogInput, Record};
use super::transport::Transport;
use crate::formats::render::render_json;
use crate::formats::{json, FormatRef, IntoFormat};
use chrono::Utc;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Default time `end` waits for queued writes.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

#[derive(Clone)]
struct LoggerState {
    levels: Arc<LevelRegistry>,
    level: String,
    format: FormatRef,
    transports: Vec<Arc<TransportHandle>>,
    silent: bool,
    default_meta: Map<String, Value>,
    exit_on_error: ExitOnError,
    methods: LevelMethods,
}

impl LoggerState {
    fn initial(levels: LevelRegistry, level: String) -> Self {
        let methods = LevelMethods::build(&levels, 0);
        Self {
            levels: Arc::new(levels),
            level,
            format: json().into_format(),
            transports: Vec::new(),
            silent: false,
            default_meta: Map::new(),
            exit_on_error: ExitOnError::default(),
            methods,
        }
    }
}

struct LoggerInner {
    state: RwLock<Arc<LoggerState>>,
    reconfigure: Mutex<()>,
    mode: DispatchMode,
    ctx: WriteContext,
    ended: AtomicBool,
    finished: Arc<AtomicBool>,
    generation: AtomicU64,
    exceptions: OnceCell<Arc<CaptureHandler>>,
    rejections: OnceCell<Arc<CaptureHandler>>,
    exit_hook: ExitHook,
    profilers: Mutex<HashMap<String, Instant>>,
}

impl LoggerInner {
    fn snapshot(&self) -> Arc<LoggerState> {
        Arc::clone(&self.state.read())
    }
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            let state = self.snapshot();
            for handle in &state.transports {
                handle.drain(DEFAULT_SHUTDOWN_TIMEOUT);
                if let Err(e) = handle.flush() {
                    eprintln!("[LOGGER ERROR] Failed to flush '{}' during drop: {}", handle.name(), e);
                }
            }
        }

        let dropped = self.ctx.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} refused records",
                dropped
            );
        }
    }
}

/// Handle to a dispatcher. Clones share everything.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{Logger, transports::StreamTransport, formats::simple};
///
/// let sink = StreamTransport::buffer("memory");
/// let output = sink.contents();
///
/// let logger = Logger::builder()
///     .format(simple())
///     .transport(sink)
///     .build()
///     .unwrap();
///
/// logger.log("info", "service started").unwrap();
/// logger.log("debug", "not shown at the default level").unwrap();
/// logger.end();
///
/// assert_eq!(output.text(), "info: service started\n");
/// ```
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
    child_meta: Option<Arc<Map<String, Value>>>,
}

/// Non-owning reference to a [`Logger`].
#[derive(Clone)]
pub struct WeakLogger {
    inner: Weak<LoggerInner>,
    child_meta: Option<Arc<Map<String, Value>>>,
}

impl WeakLogger {
    pub fn upgrade(&self) -> Option<Logger> {
        self.inner.upgrade().map(|inner| Logger {
            inner,
            child_meta: self.child_meta.clone(),
        })
    }
}

impl std::fmt::Debug for WeakLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakLogger")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Logger {
    /// npm levels at `info`, JSON output, no transports.
    pub fn new() -> Self {
        let levels = LevelRegistry::npm();
        let level = levels.default_level(None);
        Self::assemble(
            LoggerState::initial(levels, level),
            DispatchMode::Sync,
            default_exit_hook(),
        )
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    fn assemble(state: LoggerState, mode: DispatchMode, exit_hook: ExitHook) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                state: RwLock::new(Arc::new(state)),
                reconfigure: Mutex::new(()),
                mode,
                ctx: WriteContext {
                    in_flight: Arc::new(InFlight::default()),
                    metrics: Arc::new(LoggerMetrics::new()),
                    logger_observers: Observers::new(),
                },
                ended: AtomicBool::new(false),
                finished: Arc::new(AtomicBool::new(false)),
                generation: AtomicU64::new(0),
                exceptions: OnceCell::new(),
                rejections: OnceCell::new(),
                exit_hook,
                profilers: Mutex::new(HashMap::new()),
            }),
            child_meta: None,
        }
    }

    pub fn downgrade(&self) -> WeakLogger {
        WeakLogger {
            inner: Arc::downgrade(&self.inner),
            child_meta: self.child_meta.clone(),
        }
    }

    pub fn levels(&self) -> Arc<LevelRegistry> {
        Arc::clone(&self.inner.snapshot().levels)
    }

    /// Logger-wide threshold.
    pub fn level(&self) -> String {
        self.inner.snapshot().level.clone()
    }

    pub fn set_level(&self, level: impl Into<String>) -> Result<()> {
        self.configure(LoggerOptions::new().level(level))
    }

    pub fn is_silent(&self) -> bool {
        self.inner.snapshot().silent
    }

    pub fn set_silent(&self, silent: bool) -> Result<()> {
        self.configure(LoggerOptions::new().silent(silent))
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.inner.ctx.metrics
    }

    /// Writes offered to transports and not yet resolved.
    pub fn pending_writes(&self) -> usize {
        self.inner.ctx.in_flight.current()
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    // ---- logging ----

    /// Log any accepted call shape.
    ///
    /// Fails with `InvalidLevel` when the level is missing or unknown, with
    /// `LoggerStopped` after [`end`](Self::end), and with `QueueFull` when a
    /// non-blocking overflow policy refused the record for some transport.
    /// Transport write failures are reported through events instead.
    pub fn write(&self, input: impl Into<LogInput>) -> Result<()> {
        if self.is_ended() {
            return Err(LoggerError::LoggerStopped);
        }
        let state = self.inner.snapshot();
        let mut record = normalize(input.into(), &state.levels)?;
        self.apply_meta(&state, &mut record);
        if state.silent {
            return Ok(());
        }
        self.dispatch(&state, record)
    }

    pub fn log(&self, level: &str, message: impl Into<String>) -> Result<()> {
        self.log_with(level, message, Vec::new())
    }

    /// `(level, message, ...args)`: placeholders in `message` consume `args`
    /// in order and leftovers merge into the record.
    pub fn log_with(&self, level: &str, message: impl Into<String>, args: Vec<Arg>) -> Result<()> {
        self.write(LogInput::Message {
            level: level.to_string(),
            message: message.into(),
            args,
        })
    }

    pub fn log_error(&self, level: &str, error: ErrorInfo) -> Result<()> {
        self.write(LogInput::Error {
            level: level.to_string(),
            error,
        })
    }

    /// Convenience method for `name`, if the registry has that level.
    pub fn method(&self, name: &str) -> Option<LevelMethod> {
        self.methods()
            .contains(name)
            .then(|| LevelMethod::new(name.to_string(), self.clone()))
    }

    pub fn methods(&self) -> LevelMethods {
        self.inner.snapshot().methods.clone()
    }

    /// Whether a record at `level` would reach at least one transport (or
    /// pass the logger threshold when none is attached).
    pub fn is_level_enabled(&self, level: &str) -> bool {
        let state = self.inner.snapshot();
        if !state.levels.contains(level) {
            return false;
        }
        if state.transports.is_empty() {
            return state.levels.admits(level, &state.level);
        }
        state.transports.iter().any(|handle| {
            let threshold = handle.settings().level();
            state
                .levels
                .admits(level, threshold.as_deref().unwrap_or(&state.level))
        })
    }

    /// A logger sharing everything with this one but adding `meta` to
    /// every record. Keys given at the call site win.
    pub fn child(&self, meta: Map<String, Value>) -> Logger {
        let mut merged = self
            .child_meta
            .as_deref()
            .cloned()
            .unwrap_or_default();
        merged.extend(meta);
        Logger {
            inner: Arc::clone(&self.inner),
            child_meta: Some(Arc::new(merged)),
        }
    }

    /// First call starts a timer named `id`; the second logs its duration.
    pub fn profile(&self, id: &str) -> Result<()> {
        let started = self.inner.profilers.lock().remove(id);
        match started {
            Some(start) => {
                let record = timed_record(self, None, id.to_string(), start.elapsed(), Map::new());
                self.write(record)
            }
            None => {
                self.inner.profilers.lock().insert(id.to_string(), Instant::now());
                Ok(())
            }
        }
    }

    pub fn start_timer(&self) -> Profiler {
        Profiler::new(self.clone())
    }

    fn apply_meta(&self, state: &LoggerState, record: &mut Record) {
        if state.default_meta.is_empty() && self.child_meta.is_none() {
            return;
        }
        let mut merged = state.default_meta.clone();
        if let Some(child) = &self.child_meta {
            for (key, value) in child.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in std::mem::take(&mut record.metadata) {
            merged.insert(key, value);
        }
        merged.remove("level");
        merged.remove("message");
        record.metadata = merged;
    }

    fn dispatch(&self, state: &LoggerState, record: Record) -> Result<()> {
        let Some(record) = self.run_global(state, record) else {
            return Ok(());
        };
        self.inner.ctx.metrics.record_logged();

        if state.transports.is_empty() {
            eprintln!(
                "[LOGGER WARNING] Attempt to write logs with no transports: {}",
                render_json(&Value::Object(record.to_object()), false)
            );
            return Ok(());
        }

        let mut first_error = None;
        for handle in &state.transports {
            let options = handle.settings().snapshot();
            if options.silent {
                continue;
            }
            if (record.is_exception() && !options.handle_exceptions)
                || (record.is_rejection() && !options.handle_rejections)
            {
                continue;
            }
            if handle.is_capture_only() && !record.is_exception() && !record.is_rejection() {
                continue;
            }
            let threshold = options.level.as_deref().unwrap_or(&state.level);
            if !state.levels.admits(&record.level, threshold) {
                continue;
            }
            if let Err(e) = self.deliver(handle, options.format.as_ref(), record.clone()) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn run_global(&self, state: &LoggerState, record: Record) -> Option<Record> {
        match run_chain(state.format.as_ref(), record) {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                self.inner.ctx.metrics.record_suppressed();
                None
            }
            Err(e) => {
                self.inner.ctx.metrics.record_suppressed();
                self.report(None, e);
                None
            }
        }
    }

    fn deliver(&self, handle: &TransportHandle, format: Option<&FormatRef>, record: Record) -> Result<()> {
        let mut record = match format {
            Some(chain) => match run_chain(chain.as_ref(), record) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.inner.ctx.metrics.record_suppressed();
                    return Ok(());
                }
                Err(e) => {
                    self.inner.ctx.metrics.record_suppressed();
                    self.report(Some(handle.name()), e);
                    return Ok(());
                }
            },
            None => record,
        };
        if record.output.is_none() {
            record.output = Some(render_json(&Value::Object(record.to_object()), false));
        }

        let done = handle.completion(&record, &self.inner.ctx);
        handle.offer(record, done, &self.inner.ctx.metrics)
    }

    fn report(&self, transport: Option<&str>, error: LoggerError) {
        match transport {
            Some(name) => eprintln!("[LOGGER ERROR] Transport '{}': {}", name, error),
            None => eprintln!("[LOGGER ERROR] {}", error),
        }
        self.inner.ctx.logger_observers.emit(&LogEvent::Error {
            transport: transport.map(str::to_string),
            error,
        });
    }

    // ---- transports ----

    pub fn add<T: Transport + 'static>(&self, transport: T) -> Result<Arc<TransportHandle>> {
        self.add_boxed(Box::new(transport))
    }

    /// Attach a transport. Its level, if set, must exist in the registry.
    pub fn add_boxed(&self, transport: Box<dyn Transport>) -> Result<Arc<TransportHandle>> {
        self.attach(transport, false)
    }

    pub(crate) fn attach(
        &self,
        transport: Box<dyn Transport>,
        capture_only: bool,
    ) -> Result<Arc<TransportHandle>> {
        let _guard = self.inner.reconfigure.lock();
        if self.is_ended() {
            return Err(LoggerError::LoggerStopped);
        }
        let current = self.inner.snapshot();
        if let Some(level) = transport.base().settings().level() {
            current.levels.validate(&level)?;
        }

        let handle = TransportHandle::new(transport, self.inner.mode);
        if capture_only {
            handle.mark_capture_only();
        }
        let mut next = (*current).clone();
        next.transports.push(Arc::clone(&handle));
        *self.inner.state.write() = Arc::new(next);
        Ok(handle)
    }

    /// Detach `handle`. No record logged after this returns reaches it;
    /// records still queued for it are discarded.
    pub fn remove(&self, handle: &TransportHandle) -> bool {
        let removed = {
            let _guard = self.inner.reconfigure.lock();
            let current = self.inner.snapshot();
            if !current.transports.iter().any(|h| h.id() == handle.id()) {
                return false;
            }
            let mut next = (*current).clone();
            next.transports.retain(|h| h.id() != handle.id());
            *self.inner.state.write() = Arc::new(next);
            true
        };
        handle.detach();
        handle.drain(DEFAULT_SHUTDOWN_TIMEOUT);
        removed
    }

    /// Detach every transport called `name`. Returns how many went.
    pub fn remove_by_name(&self, name: &str) -> usize {
        let matching: Vec<Arc<TransportHandle>> = self
            .transports()
            .into_iter()
            .filter(|h| h.name() == name)
            .collect();
        matching.iter().filter(|h| self.remove(h)).count()
    }

    /// Detach every transport.
    pub fn clear(&self) {
        for handle in self.transports() {
            self.remove(&handle);
        }
    }

    pub fn transports(&self) -> Vec<Arc<TransportHandle>> {
        self.inner.snapshot().transports.clone()
    }

    // ---- configuration ----

    /// Replace the given parts of the configuration in one step.
    ///
    /// Everything is validated before anything changes, and the new
    /// state (capture handler transports included) is swapped in as one
    /// step. A new level
    /// registry regenerates the per-level method table; when no level is
    /// given with it, the current level is kept if it still exists.
    pub fn configure(&self, options: LoggerOptions) -> Result<()> {
        let LoggerOptions {
            levels,
            level,
            format,
            transports,
            exception_handlers,
            rejection_handlers,
            silent,
            exit_on_error,
            default_meta,
        } = options;

        let exception_handler = exception_handlers.as_ref().map(|_| self.exceptions()).transpose()?;
        let rejection_handler = rejection_handlers.as_ref().map(|_| self.rejections()).transpose()?;

        let replaced = {
            let _guard = self.inner.reconfigure.lock();
            if self.is_ended() {
                return Err(LoggerError::LoggerStopped);
            }
            let current = self.inner.snapshot();

            let levels_changed = levels.is_some();
            let levels = levels.map(Arc::new).unwrap_or_else(|| Arc::clone(&current.levels));
            let level = match level {
                Some(level) => {
                    levels.validate(&level)?;
                    level
                }
                None if levels_changed => levels.default_level(Some(current.level.as_str())),
                None => current.level.clone(),
            };

            let incoming = transports
                .iter()
                .flatten()
                .chain(exception_handlers.iter().flatten())
                .chain(rejection_handlers.iter().flatten());
            for transport in incoming {
                if let Some(level) = transport.base().settings().level() {
                    levels.validate(&level).map_err(|_| {
                        LoggerError::config(
                            format!("transport '{}'", transport.name()),
                            format!("level '{}' is not in the registry", level),
                        )
                    })?;
                }
            }

            let mut next = (*current).clone();
            if levels_changed {
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                next.methods = LevelMethods::build(&levels, generation);
                if transports.is_none() {
                    warn_orphaned_thresholds(&levels, &current.transports);
                }
            }
            next.levels = levels;
            next.level = level;
            if let Some(format) = format {
                next.format = format;
            }
            if let Some(silent) = silent {
                next.silent = silent;
            }
            if let Some(exit) = exit_on_error {
                next.exit_on_error = exit;
            }
            if let Some(meta) = default_meta {
                next.default_meta = meta;
            }

            let replaced = match transports {
                Some(list) => {
                    let fresh = list
                        .into_iter()
                        .map(|t| TransportHandle::new(t, self.inner.mode))
                        .collect();
                    std::mem::replace(&mut next.transports, fresh)
                }
                None => Vec::new(),
            };

            let handlers = exception_handlers
                .into_iter()
                .flatten()
                .map(|t| (CaptureKind::Exception, t))
                .chain(
                    rejection_handlers
                        .into_iter()
                        .flatten()
                        .map(|t| (CaptureKind::Rejection, t)),
                );
            for (kind, transport) in handlers {
                opt_in(kind, transport.as_ref());
                let handle = TransportHandle::new(transport, self.inner.mode);
                handle.mark_capture_only();
                next.transports.push(handle);
            }

            *self.inner.state.write() = Arc::new(next);
            replaced
        };

        for handle in replaced {
            handle.detach();
            handle.drain(DEFAULT_SHUTDOWN_TIMEOUT);
            if let Err(e) = handle.close() {
                self.report(Some(handle.name()), e);
            }
        }

        for handler in exception_handler.iter().chain(rejection_handler.iter()) {
            handler.install(self);
        }
        Ok(())
    }

    // ---- events ----

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        self.inner.ctx.logger_observers.on(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.ctx.logger_observers.off(id)
    }

    // ---- end of stream ----

    /// Signal that nothing more will be logged and wait (up to
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`]) for outstanding writes.
    pub fn end(&self) -> bool {
        self.end_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Returns `true` when every write finished within `timeout`.
    ///
    /// `Finish` is emitted exactly once, after the last outstanding write
    /// resolved; if that takes longer than `timeout` it is emitted later
    /// from a background thread.
    pub fn end_timeout(&self, timeout: Duration) -> bool {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return self.inner.finished.load(Ordering::SeqCst);
        }
        // wait for a configure or add already in progress
        drop(self.inner.reconfigure.lock());

        let state = self.inner.snapshot();
        let start = Instant::now();
        let remaining = || timeout.saturating_sub(start.elapsed());

        let mut clean = true;
        for handle in &state.transports {
            clean &= handle.drain(remaining());
        }
        let idle = self.inner.ctx.in_flight.wait_idle(remaining());
        for handle in &state.transports {
            if let Err(e) = handle.flush() {
                self.report(Some(handle.name()), e);
                clean = false;
            }
        }

        if idle {
            self.finish();
        } else {
            eprintln!(
                "[LOGGER WARNING] {} writes still pending after {:?}; finish deferred.",
                self.pending_writes(),
                timeout
            );
            self.finish_when_idle();
        }
        clean && idle
    }

    /// End the stream, then close every transport.
    pub fn close(&self) -> Result<()> {
        self.end();
        let mut failed = Vec::new();
        for handle in self.transports() {
            handle.detach();
            if let Err(e) = handle.close() {
                failed.push(handle.name().to_string());
                self.report(Some(handle.name()), e);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::transport_write(failed.join(", "), "close failed"))
        }
    }

    fn finish(&self) {
        if !self.inner.finished.swap(true, Ordering::SeqCst) {
            self.inner.ctx.logger_observers.emit(&LogEvent::Finish);
        }
    }

    fn finish_when_idle(&self) {
        let in_flight = Arc::clone(&self.inner.ctx.in_flight);
        let observers = self.inner.ctx.logger_observers.clone();
        let finished = Arc::clone(&self.inner.finished);
        let spawned = thread::Builder::new()
            .name("log-finish".to_string())
            .spawn(move || {
                while !in_flight.wait_idle(Duration::from_secs(1)) {}
                if !finished.swap(true, Ordering::SeqCst) {
                    observers.emit(&LogEvent::Finish);
                }
            });
        if let Err(e) = spawned {
            eprintln!("[LOGGER ERROR] Could not wait for pending writes: {}", e);
        }
    }

    // ---- capture ----

    /// Handler for uncaught panics, created on first use.
    pub fn exceptions(&self) -> Result<Arc<CaptureHandler>> {
        self.inner
            .exceptions
            .get_or_try_init(|| {
                CaptureHandler::new(CaptureKind::Exception, &self.downgrade()).map(Arc::new)
            })
            .cloned()
    }

    /// Handler for reported rejections, created on first use.
    pub fn rejections(&self) -> Result<Arc<CaptureHandler>> {
        self.inner
            .rejections
            .get_or_try_init(|| {
                CaptureHandler::new(CaptureKind::Rejection, &self.downgrade()).map(Arc::new)
            })
            .cloned()
    }

    /// Log a captured failure to the transports opted in to `kind`, wait
    /// for those writes, then exit or keep running.
    pub(crate) fn handle_failure(&self, kind: CaptureKind, level: Option<&str>, failure: &Failure) {
        let state = self.inner.snapshot();
        let level = match level.filter(|l| state.levels.contains(l)) {
            Some(level) => level.to_string(),
            None if state.levels.contains("error") => "error".to_string(),
            None => state.levels.most_severe().to_string(),
        };

        let original = failure_record(kind, &level, failure);
        let formatted = self.run_global(&state, original.clone());

        if let Some(record) = &formatted {
            self.inner.ctx.metrics.record_logged();
            for handle in &state.transports {
                let options = handle.settings().snapshot();
                if options.silent || !handles_kind(handle, kind) {
                    continue;
                }
                if let Err(e) = self.deliver(handle, options.format.as_ref(), record.clone()) {
                    self.report(Some(handle.name()), e);
                }
            }
            if !self.inner.ctx.in_flight.wait_idle(CAPTURE_FLUSH_TIMEOUT) {
                eprintln!(
                    "[LOGGER WARNING] Captured {} not fully written within {:?}",
                    kind, CAPTURE_FLUSH_TIMEOUT
                );
            }
            for handle in state.transports.iter().filter(|h| handles_kind(h, kind)) {
                if let Err(e) = handle.flush() {
                    self.report(Some(handle.name()), e);
                }
            }
        }

        if state.exit_on_error.should_exit(&failure.error) {
            (self.inner.exit_hook)(1);
            return;
        }
        self.inner.ctx.logger_observers.emit(&LogEvent::Captured {
            kind,
            record: formatted.unwrap_or(original),
        });
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.snapshot();
        f.debug_struct("Logger")
            .field("level", &state.level)
            .field("transports", &state.transports.len())
            .field("silent", &state.silent)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

fn default_exit_hook() -> ExitHook {
    Arc::new(|code| std::process::exit(code))
}

fn warn_orphaned_thresholds(levels: &LevelRegistry, transports: &[Arc<TransportHandle>]) {
    for handle in transports {
        if let Some(level) = handle.settings().level() {
            if !levels.contains(&level) {
                eprintln!(
                    "[LOGGER WARNING] Transport '{}' threshold '{}' is not in the new level set; \
                     it will receive nothing until its level is updated.",
                    handle.name(),
                    level
                );
            }
        }
    }
}

fn failure_record(kind: CaptureKind, level: &str, failure: &Failure) -> Record {
    let error = &failure.error;
    let description = if error.message.is_empty() {
        "(no error message)"
    } else {
        error.message.as_str()
    };
    let stack = error.stack.clone().unwrap_or_default();

    let mut record = Record::new(level, format!("{}: {}", kind.description(), description));
    record.insert_meta("error", serde_json::to_value(error).unwrap_or(Value::Null));
    record.insert_meta("stack", stack.clone());
    record.insert_meta(
        "process",
        serde_json::to_value(ProcessInfo::collect()).unwrap_or(Value::Null),
    );
    record.insert_meta("os", serde_json::to_value(OsInfo::collect()).unwrap_or(Value::Null));
    record.insert_meta(
        "trace",
        serde_json::to_value(parse_trace(&stack)).unwrap_or(Value::Null),
    );
    if let Some(location) = &failure.location {
        record.insert_meta("location", location.clone());
    }
    if let Some(thread) = &failure.thread {
        record.insert_meta("thread", thread.clone());
    }
    record.insert_meta("date", Utc::now().to_rfc3339());
    record.insert_meta(kind.flag(), true);
    record.error = Some(error.clone());
    record
}

/// Fluent construction of a [`Logger`].
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{LoggerBuilder, OverflowPolicy, LevelRegistry};
/// use rust_log_pipeline::formats::{combine, timestamp, json, IntoFormat};
///
/// let logger = LoggerBuilder::new()
///     .levels(LevelRegistry::syslog())
///     .level("notice")
///     .format(combine([timestamp().into_format(), json().into_format()]))
///     .async_mode(1024)
///     .overflow_policy(OverflowPolicy::Block)
///     .build()
///     .unwrap();
///
/// assert!(logger.is_level_enabled("error"));
/// assert!(!logger.is_level_enabled("debug"));
/// ```
pub struct LoggerBuilder {
    options: LoggerOptions,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    exit_hook: Option<ExitHook>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            options: LoggerOptions::new(),
            capacity: None,
            policy: OverflowPolicy::default(),
            exit_hook: None,
        }
    }

    pub fn levels(mut self, levels: LevelRegistry) -> Self {
        self.options.levels = Some(levels);
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.options.level = Some(level.into());
        self
    }

    pub fn format(mut self, format: impl IntoFormat) -> Self {
        self.options.format = Some(format.into_format());
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.options = self.options.transport(transport);
        self
    }

    pub fn exception_handler<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.options = self.options.exception_handler(transport);
        self
    }

    pub fn rejection_handler<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.options = self.options.rejection_handler(transport);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.options.silent = Some(silent);
        self
    }

    pub fn exit_on_error(mut self, exit: impl Into<ExitOnError>) -> Self {
        self.options.exit_on_error = Some(exit.into());
        self
    }

    pub fn default_meta(mut self, meta: Map<String, Value>) -> Self {
        self.options.default_meta = Some(meta);
        self
    }

    /// Add one default metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options
            .default_meta
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Give every transport its own bounded queue and worker thread.
    pub fn async_mode(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// What a full queue does. Only used in async mode.
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace `std::process::exit`, called when a captured failure should
    /// end the process.
    pub fn exit_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.exit_hook = Some(Arc::new(hook));
        self
    }

    /// Apply declarative settings on top of what was set so far.
    pub fn settings(mut self, settings: LoggerSettings) -> Self {
        if let Some(levels) = settings.levels {
            self.options.levels = Some(levels);
        }
        if let Some(level) = settings.level {
            self.options.level = Some(level);
        }
        if let Some(silent) = settings.silent {
            self.options.silent = Some(silent);
        }
        if let Some(exit) = settings.exit_on_error {
            self.options.exit_on_error = Some(exit.into());
        }
        if let Some(meta) = settings.default_meta {
            self.options.default_meta = Some(meta);
        }
        if let Some(capacity) = settings.buffer_size {
            self.capacity = Some(capacity);
        }
        self
    }

    pub fn build(self) -> Result<Logger> {
        let LoggerBuilder {
            mut options,
            capacity,
            policy,
            exit_hook,
        } = self;

        let levels = options.levels.take().unwrap_or_default();
        let level = match options.level.take() {
            Some(level) => {
                levels.validate(&level)?;
                level
            }
            None => levels.default_level(None),
        };

        let mode = match capacity {
            Some(capacity) => DispatchMode::Async {
                capacity: if capacity == 0 { DEFAULT_QUEUE_CAPACITY } else { capacity },
                policy,
            },
            None => DispatchMode::Sync,
        };

        let logger = Logger::assemble(
            LoggerState::initial(levels, level),
            mode,
            exit_hook.unwrap_or_else(default_exit_hook),
        );
        logger.configure(options)?;
        Ok(logger)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{from_fn, simple};
    use crate::transports::StreamTransport;
    use serde_json::json;

    fn memory_logger() -> (Logger, crate::transports::SharedBuffer) {
        let sink = StreamTransport::buffer("memory");
        let buffer = sink.contents();
        let logger = Logger::builder()
            .format(simple())
            .transport(sink)
            .build()
            .unwrap();
        (logger, buffer)
    }

    #[test]
    fn test_builder_defaults() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.level(), "info");
        assert!(logger.transports().is_empty());
        assert_eq!(logger.methods().len(), 7);
    }

    #[test]
    fn test_builder_rejects_unknown_level() {
        let result = Logger::builder().level("loud").build();
        assert!(matches!(result, Err(LoggerError::UnknownLevel { .. })));
    }

    #[test]
    fn test_threshold_filters() {
        let (logger, buffer) = memory_logger();
        logger.log("error", "kept").unwrap();
        logger.log("debug", "filtered").unwrap();
        assert_eq!(buffer.text(), "error: kept\n");
    }

    #[test]
    fn test_default_and_child_meta() {
        let sink = StreamTransport::buffer("memory");
        let buffer = sink.contents();
        let logger = Logger::builder()
            .format(simple())
            .meta("service", "api")
            .transport(sink)
            .build()
            .unwrap();

        let Value::Object(meta) = json!({"request": 7}) else { unreachable!() };
        let child = logger.child(meta);
        child
            .log_with("info", "handled", vec![json!({"service": "override"}).into()])
            .unwrap();

        assert_eq!(
            buffer.text(),
            "info: handled {\"service\":\"override\",\"request\":7}\n"
        );
    }

    #[test]
    fn test_global_drop_suppresses() {
        let (logger, buffer) = memory_logger();
        logger
            .configure(LoggerOptions::new().format(from_fn(|_r: Record| None)))
            .unwrap();
        logger.log("error", "gone").unwrap();
        assert!(buffer.text().is_empty());
        assert_eq!(logger.metrics().suppressed(), 1);
    }

    #[test]
    fn test_write_after_end_fails() {
        let (logger, _buffer) = memory_logger();
        assert!(logger.end());
        assert!(matches!(
            logger.log("info", "late"),
            Err(LoggerError::LoggerStopped)
        ));
    }

    #[test]
    fn test_profile_logs_duration() {
        let sink = StreamTransport::buffer("memory");
        let buffer = sink.contents();
        let logger = Logger::builder().transport(sink).build().unwrap();

        logger.profile("load").unwrap();
        assert!(buffer.text().is_empty());
        logger.profile("load").unwrap();

        let line: Value = serde_json::from_str(buffer.text().trim()).unwrap();
        assert_eq!(line["message"], "load");
        assert!(line["durationMs"].is_u64());
    }

    #[test]
    fn test_is_level_enabled_uses_transport_levels() {
        let sink = StreamTransport::buffer("memory")
            .with_options(crate::core::transport::TransportOptions::new().level("debug"));
        let logger = Logger::builder().transport(sink).build().unwrap();
        assert!(logger.is_level_enabled("debug"));
        assert!(!logger.is_level_enabled("silly"));
        assert!(!logger.is_level_enabled("nope"));
    }
}
