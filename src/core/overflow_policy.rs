//! What a transport queue does when it is full
//!
//! Only meaningful in asynchronous dispatch mode. No policy drops a record
//! without telling anyone: the non-blocking policies hand a `QueueFull`
//! error back to the caller of `log`.

use std::fmt;
use std::time::Duration;

/// Stderr alert cadence for [`OverflowPolicy::AlertAndDrop`]: the first
/// drop and then every Nth.
pub const ALERT_EVERY: u64 = 1000;

/// Policy for a full per-transport queue.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::OverflowPolicy;
/// use std::time::Duration;
///
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
/// let bounded = OverflowPolicy::BlockWithTimeout(Duration::from_millis(50));
/// assert_eq!(bounded.to_string(), "BlockWithTimeout(50ms)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait until the worker frees a slot. Keeps order and loses nothing.
    #[default]
    Block,

    /// Wait up to the timeout, then refuse with `QueueFull`.
    BlockWithTimeout(Duration),

    /// Refuse immediately with `QueueFull` and alert on stderr.
    AlertAndDrop,
}

impl OverflowPolicy {
    /// Whether callers may be made to wait.
    pub fn blocks(&self) -> bool {
        !matches!(self, OverflowPolicy::AlertAndDrop)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}
