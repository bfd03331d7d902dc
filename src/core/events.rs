//! Observer lists for logger and transport notifications

use super::error::LoggerError;
use super::process_hooks::{catch_isolated, CaptureKind};
use super::record::Record;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A notification delivered to listeners.
#[derive(Debug)]
pub enum LogEvent {
    /// A transport accepted and wrote a record.
    Logged { transport: String, record: Record },

    /// Something failed: a transport write, a format stage, a flush.
    /// `transport` is `None` for dispatcher-level failures.
    Error {
        transport: Option<String>,
        error: LoggerError,
    },

    /// A process failure was captured, logged, and the process kept running.
    Captured { kind: CaptureKind, record: Record },

    /// End of stream: every outstanding write has finished. Fires once.
    Finish,
}

impl LogEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, LogEvent::Error { .. })
    }
}

pub type Listener = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Handle returned by [`Observers::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A shared, clonable list of listeners.
///
/// Clones observe the same list. Listeners run on whichever thread emits,
/// outside the list lock, so a listener may subscribe or unsubscribe.
#[derive(Clone, Default)]
pub struct Observers {
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every listener. A panicking listener is reported
    /// and does not stop delivery to the rest.
    pub fn emit(&self, event: &LogEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if let Err(panic) = catch_isolated(|| listener(event)) {
                eprintln!(
                    "[LOGGER CRITICAL] Event listener panicked: {}. Other listeners continue.",
                    panic_message(&*panic)
                );
            }
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("listeners", &self.len()).finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
