//! Process-wide failure observers
//!
//! There are two kinds of uncaught failure. An *exception* is a Rust panic
//! nobody catches; it is observed through a single chained panic hook
//! installed the first time an exception observer registers. A *rejection*
//! is an error whose owner went away without handling it (a dropped task
//! result, a detached worker); whatever runtime notices it reports it
//! through [`report_rejection`].
//!
//! Panics raised inside the dispatcher's own isolation boundaries (a
//! transport write, a format stage, an event listener) are not uncaught
//! and never reach the observers.

use super::record::ErrorInfo;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Once};

/// Which uncaught failure an observer is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Exception,
    Rejection,
}

impl CaptureKind {
    /// Metadata key flagging records of this kind.
    pub fn flag(&self) -> &'static str {
        match self {
            CaptureKind::Exception => "exception",
            CaptureKind::Rejection => "rejection",
        }
    }

    pub(crate) fn description(&self) -> &'static str {
        match self {
            CaptureKind::Exception => "uncaught panic",
            CaptureKind::Rejection => "unhandled rejection",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// An uncaught failure as handed to observers.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: CaptureKind,
    pub error: ErrorInfo,
    /// `file:line:column` of the panic, when known.
    pub location: Option<String>,
    pub thread: Option<String>,
}

impl Failure {
    pub fn rejection(error: ErrorInfo) -> Self {
        Self {
            kind: CaptureKind::Rejection,
            error,
            location: None,
            thread: std::thread::current().name().map(str::to_string),
        }
    }
}

pub type FailureObserver = Arc<dyn Fn(&Failure) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    exceptions: Vec<(ObserverId, FailureObserver)>,
    rejections: Vec<(ObserverId, FailureObserver)>,
}

impl Registry {
    fn list(&mut self, kind: CaptureKind) -> &mut Vec<(ObserverId, FailureObserver)> {
        match kind {
            CaptureKind::Exception => &mut self.exceptions,
            CaptureKind::Rejection => &mut self.rejections,
        }
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));
static PANIC_HOOK: Once = Once::new();

thread_local! {
    static ISOLATION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Register an observer for `kind`.
pub fn register(kind: CaptureKind, observer: FailureObserver) -> ObserverId {
    if kind == CaptureKind::Exception {
        install_panic_hook();
    }
    let mut registry = REGISTRY.lock();
    let id = ObserverId(registry.next_id);
    registry.next_id += 1;
    registry.list(kind).push((id, observer));
    id
}

/// Returns `false` if `id` was not registered.
pub fn unregister(id: ObserverId) -> bool {
    let mut registry = REGISTRY.lock();
    let before = registry.exceptions.len() + registry.rejections.len();
    registry.exceptions.retain(|(existing, _)| *existing != id);
    registry.rejections.retain(|(existing, _)| *existing != id);
    registry.exceptions.len() + registry.rejections.len() != before
}

/// Number of observers currently registered for `kind`.
pub fn observer_count(kind: CaptureKind) -> usize {
    REGISTRY.lock().list(kind).len()
}

/// Report an error nobody handled.
///
/// Returns `true` if at least one observer saw it; otherwise the error is
/// written to stderr.
pub fn report_rejection(error: &(dyn std::error::Error + 'static)) -> bool {
    report_rejection_info(ErrorInfo::from_error(error).with_name("UnhandledRejection"))
}

/// Like [`report_rejection`], for an error already described as [`ErrorInfo`].
pub fn report_rejection_info(error: ErrorInfo) -> bool {
    let failure = Failure::rejection(error);
    if notify(&failure) {
        return true;
    }
    eprintln!(
        "[LOGGER WARNING] Unhandled rejection with no observer: {}",
        failure.error
    );
    false
}

/// Run `f`, catching a panic without treating it as uncaught.
pub(crate) fn catch_isolated<F, R>(f: F) -> std::thread::Result<R>
where
    F: FnOnce() -> R,
{
    ISOLATION_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = catch_unwind(AssertUnwindSafe(f));
    ISOLATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    result
}

fn in_isolation() -> bool {
    ISOLATION_DEPTH.with(|depth| depth.get() > 0)
}

fn notify(failure: &Failure) -> bool {
    let observers: Vec<FailureObserver> = {
        let mut registry = REGISTRY.lock();
        registry
            .list(failure.kind)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    };
    for observer in &observers {
        observer(failure);
    }
    !observers.is_empty()
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if in_isolation() {
                previous(info);
                return;
            }

            let payload = info.payload();
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "Box<dyn Any>".to_string()
            };
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
            let thread = std::thread::current().name().map(str::to_string);

            let stack = format!("panic: {}\n{}", message, Backtrace::force_capture());
            let mut error = ErrorInfo {
                name: "panic".to_string(),
                message,
                stack: Some(stack),
                properties: Default::default(),
            };
            if let Some(location) = &location {
                error = error.with_property("location", location.clone());
            }

            let failure = Failure {
                kind: CaptureKind::Exception,
                error,
                location,
                thread,
            };
            if !notify(&failure) {
                previous(info);
            }
        }));
    });
}
