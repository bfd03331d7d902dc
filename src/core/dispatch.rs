//! Per-transport delivery
//!
//! Each attached transport is wrapped in a [`TransportHandle`]. In
//! synchronous mode a write runs on the caller's thread; in asynchronous
//! mode every transport gets its own bounded queue and worker, so a slow
//! sink never blocks delivery to the others and records reach each sink in
//! `log` order.

use super::error::{LoggerError, Result};
use super::events::{panic_message, LogEvent, Observers};
use super::metrics::LoggerMetrics;
use super::overflow_policy::{OverflowPolicy, ALERT_EVERY};
use super::process_hooks::catch_isolated;
use super::record::Record;
use super::transport::{Completion, Transport, TransportSettings, WriteOutcome};
use crate::formats::Format;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default queue capacity per transport in asynchronous mode.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// How writes are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// On the thread that called `log`.
    #[default]
    Sync,
    /// Through a bounded queue drained by one worker per transport.
    Async {
        capacity: usize,
        policy: OverflowPolicy,
    },
}

/// Count of writes offered but not yet resolved.
#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    pub fn begin(&self) {
        *self.count.lock() += 1;
    }

    pub fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub fn current(&self) -> usize {
        *self.count.lock()
    }

    /// Wait until nothing is in flight. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Everything a completion needs to account for one write.
#[derive(Clone)]
pub(crate) struct WriteContext {
    pub in_flight: Arc<InFlight>,
    pub metrics: Arc<LoggerMetrics>,
    pub logger_observers: Observers,
}

struct Job {
    record: Record,
    done: Completion,
}

/// An attached transport.
///
/// Returned by `Logger::add`; pass it to `Logger::remove` to detach.
pub struct TransportHandle {
    id: u64,
    name: String,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    settings: TransportSettings,
    observers: Observers,
    attached: Arc<AtomicBool>,
    closed: AtomicBool,
    capture_only: AtomicBool,
    queue: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    policy: OverflowPolicy,
}

impl TransportHandle {
    pub(crate) fn new(transport: Box<dyn Transport>, mode: DispatchMode) -> Arc<Self> {
        let name = transport.name().to_string();
        let settings = transport.base().settings().clone();
        let observers = transport.base().observers().clone();
        let transport = Arc::new(Mutex::new(transport));
        let attached = Arc::new(AtomicBool::new(true));
        let id = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);

        let (queue, worker, policy) = match mode {
            DispatchMode::Sync => (None, None, OverflowPolicy::Block),
            DispatchMode::Async { capacity, policy } => {
                let (sender, receiver) = bounded(capacity.max(1));
                let worker = spawn_worker(
                    id,
                    name.clone(),
                    receiver,
                    Arc::clone(&transport),
                    Arc::clone(&attached),
                );
                (Some(sender), worker, policy)
            }
        };

        Arc::new(Self {
            id,
            name,
            transport,
            settings,
            observers,
            attached,
            closed: AtomicBool::new(false),
            capture_only: AtomicBool::new(false),
            queue: Mutex::new(queue),
            worker: Mutex::new(worker),
            policy,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live settings shared with the transport.
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn is_async(&self) -> bool {
        self.queue.lock().is_some()
    }

    /// Attached through a capture handler: receives only records flagged
    /// `exception` or `rejection`.
    pub fn is_capture_only(&self) -> bool {
        self.capture_only.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_capture_only(&self) {
        self.capture_only.store(true, Ordering::SeqCst);
    }

    /// Stop every future write. A write already running finishes first.
    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
        // barrier: wait out a write that passed the attached check
        drop(self.transport.lock());
    }

    /// Build the completion for one write of `record` to this transport.
    pub(crate) fn completion(&self, record: &Record, ctx: &WriteContext) -> Completion {
        ctx.in_flight.begin();
        let ctx = ctx.clone();
        let name = self.name.clone();
        let observers = self.observers.clone();
        let record = record.clone();

        Completion::with_outcome(self.name.clone(), move |outcome| {
            notify_or_defer(Box::new(move || settle(outcome, name, record, observers, ctx)));
        })
    }

    /// Hand a finished record to the transport.
    ///
    /// `done` is always resolved, even when this returns an error.
    pub(crate) fn offer(&self, record: Record, done: Completion, metrics: &LoggerMetrics) -> Result<()> {
        if !self.is_attached() || self.closed.load(Ordering::SeqCst) {
            done.cancel();
            return Ok(());
        }

        let queue = self.queue.lock().clone();
        match queue {
            None => {
                with_deferred_notifications(|| {
                    let mut transport = self.transport.lock();
                    if self.is_attached() {
                        write_isolated(&self.name, transport.as_mut(), &record, done);
                    } else {
                        done.cancel();
                    }
                });
                Ok(())
            }
            Some(sender) => self.enqueue(&sender, Job { record, done }, metrics),
        }
    }

    fn enqueue(&self, sender: &Sender<Job>, job: Job, metrics: &LoggerMetrics) -> Result<()> {
        let job = match sender.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(job)) => {
                job.done.cancel();
                return Err(LoggerError::LoggerStopped);
            }
            Err(TrySendError::Full(job)) => job,
        };

        metrics.record_queue_full();
        let capacity = sender.capacity().unwrap_or(0);

        // the worker cannot wait on its own queue
        if on_own_worker(self.id) {
            metrics.record_dropped();
            eprintln!(
                "[LOGGER WARNING] Transport '{}' refused a record logged from its own worker: queue full",
                self.name
            );
            job.done.cancel();
            return Err(LoggerError::queue_full(&self.name, sender.len(), capacity));
        }

        match self.policy {
            OverflowPolicy::Block => {
                metrics.record_block();
                sender.send(job).map_err(|err| {
                    err.into_inner().done.cancel();
                    LoggerError::LoggerStopped
                })
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                metrics.record_block();
                match sender.send_timeout(job, timeout) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(job)) => {
                        metrics.record_dropped();
                        job.done.cancel();
                        Err(LoggerError::queue_full(&self.name, sender.len(), capacity))
                    }
                    Err(SendTimeoutError::Disconnected(job)) => {
                        job.done.cancel();
                        Err(LoggerError::LoggerStopped)
                    }
                }
            }
            OverflowPolicy::AlertAndDrop => {
                let previous = metrics.record_dropped();
                if previous % ALERT_EVERY == 0 {
                    eprintln!(
                        "[LOGGER WARNING] Queue for transport '{}' full, {} records refused. \
                         Consider a larger buffer or a blocking overflow policy.",
                        self.name,
                        previous + 1
                    );
                }
                job.done.cancel();
                Err(LoggerError::queue_full(&self.name, sender.len(), capacity))
            }
        }
    }

    /// Close the queue and wait for the worker to drain it.
    ///
    /// Returns `false` if the worker did not finish within `timeout`.
    pub(crate) fn drain(&self, timeout: Duration) -> bool {
        drop(self.queue.lock().take());

        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOGGER ERROR] Worker for transport '{}' panicked: {}",
                        self.name,
                        panic_message(&*e)
                    );
                    return false;
                }
                return true;
            }
            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Worker for transport '{}' did not finish within {:?}. \
                     Queued records may be lost.",
                    self.name, timeout
                );
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let mut transport = self.transport.lock();
        match catch_isolated(|| transport.flush()) {
            Ok(result) => result,
            Err(panic) => Err(LoggerError::transport_write(
                self.name.clone(),
                format!("panicked during flush: {}", panic_message(&*panic)),
            )),
        }
    }

    /// Flush and release the transport. Idempotent.
    pub(crate) fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut transport = self.transport.lock();
        match catch_isolated(|| transport.close()) {
            Ok(result) => result,
            Err(panic) => Err(LoggerError::transport_write(
                self.name.clone(),
                format!("panicked during close: {}", panic_message(&*panic)),
            )),
        }
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("attached", &self.is_attached())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Account for one resolved write and tell the listeners.
fn settle(outcome: WriteOutcome, name: String, record: Record, observers: Observers, ctx: WriteContext) {
    match outcome {
        WriteOutcome::Done(Ok(())) => {
            ctx.metrics.record_write_completed();
            let event = LogEvent::Logged {
                transport: name,
                record,
            };
            observers.emit(&event);
            ctx.logger_observers.emit(&event);
        }
        WriteOutcome::Done(Err(error)) => {
            ctx.metrics.record_write_failure();
            eprintln!("[LOGGER ERROR] Transport '{}' failed: {}", name, error);
            let event = LogEvent::Error {
                transport: Some(name),
                error,
            };
            observers.emit(&event);
            ctx.logger_observers.emit(&event);
        }
        WriteOutcome::Cancelled => {}
    }
    ctx.in_flight.end();
}

type Notification = Box<dyn FnOnce()>;

thread_local! {
    /// Notifications raised on this thread while it holds a transport lock.
    static DEFERRED: RefCell<Option<Vec<Notification>>> = const { RefCell::new(None) };
    /// Id of the transport whose worker runs on this thread, 0 elsewhere.
    static WORKER_OF: Cell<u64> = const { Cell::new(0) };
}

/// Run `write`, holding back completion notifications it raises until
/// `write` returned and released its locks. A listener may then log to the
/// same logger without re-entering a held transport lock.
fn with_deferred_notifications<R>(write: impl FnOnce() -> R) -> R {
    let outermost = DEFERRED.with(|deferred| {
        let mut deferred = deferred.borrow_mut();
        if deferred.is_some() {
            return false;
        }
        *deferred = Some(Vec::new());
        true
    });

    let result = write();

    if outermost {
        let pending = DEFERRED
            .with(|deferred| deferred.borrow_mut().take())
            .unwrap_or_default();
        for notify in pending {
            notify();
        }
    }
    result
}

fn notify_or_defer(notify: Notification) {
    let notify = DEFERRED.with(|deferred| match deferred.borrow_mut().as_mut() {
        Some(pending) => {
            pending.push(notify);
            None
        }
        None => Some(notify),
    });
    if let Some(notify) = notify {
        notify();
    }
}

fn on_own_worker(id: u64) -> bool {
    WORKER_OF.with(|worker| worker.get() == id)
}

/// Call `transport.write`, turning a panic into a failed completion.
fn write_isolated(name: &str, transport: &mut dyn Transport, record: &Record, done: Completion) {
    let result = catch_isolated(|| transport.write(record, done));
    if let Err(panic) = result {
        // the unwind dropped `done`, which already reported the failure
        eprintln!(
            "[LOGGER CRITICAL] Transport '{}' panicked: {}. Other transports continue to function.",
            name,
            panic_message(&*panic)
        );
    }
}

fn spawn_worker(
    id: u64,
    name: String,
    receiver: Receiver<Job>,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    attached: Arc<AtomicBool>,
) -> Option<JoinHandle<()>> {
    let label = name.clone();
    let spawned = thread::Builder::new()
        .name(format!("log-transport-{}", name))
        .spawn(move || {
            WORKER_OF.with(|worker| worker.set(id));
            for Job { record, done } in receiver.iter() {
                with_deferred_notifications(|| {
                    let mut transport = transport.lock();
                    if attached.load(Ordering::SeqCst) {
                        write_isolated(&name, transport.as_mut(), &record, done);
                    } else {
                        done.cancel();
                    }
                });

                if receiver.is_empty() {
                    flush_quietly(&name, &transport);
                }
            }
            flush_quietly(&name, &transport);
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!(
                "[LOGGER ERROR] Could not start worker for transport '{}': {}",
                label, e
            );
            None
        }
    }
}

fn flush_quietly(name: &str, transport: &Mutex<Box<dyn Transport>>) {
    let mut transport = transport.lock();
    match catch_isolated(|| transport.flush()) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => eprintln!("[LOGGER ERROR] Transport '{}' flush failed: {}", name, e),
        Err(panic) => eprintln!(
            "[LOGGER CRITICAL] Transport '{}' panicked during flush: {}",
            name,
            panic_message(&*panic)
        ),
    }
}

/// Run a chain on a record, isolating panics.
///
/// `Ok(None)` means a stage dropped the record.
pub(crate) fn run_chain(chain: &dyn Format, record: Record) -> Result<Option<Record>> {
    catch_isolated(|| chain.transform(record)).map_err(|panic| {
        LoggerError::formatter(
            chain.name().to_string(),
            format!("stage panicked: {}", panic_message(&*panic)),
        )
    })
}
