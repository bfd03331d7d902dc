//! Format chains
//!
//! A format is a pure stage `Record -> Option<Record>`; returning `None`
//! drops the record and stops the chain. Stages capture their options at
//! construction, and [`combine`] (or the [`combine!`](crate::combine) macro)
//! runs them strictly in order.
//!
//! ```
//! use rust_log_pipeline::combine;
//! use rust_log_pipeline::formats::{label, simple};
//! use rust_log_pipeline::Record;
//!
//! let chain = combine!(label("api"), simple());
//! let record = chain.transform(Record::new("info", "ready")).unwrap();
//! assert_eq!(record.output.as_deref(), Some(r#"info: ready {"label":"api"}"#));
//! ```

pub mod color;
pub mod enrich;
pub mod errors;
pub mod render;
pub mod splat;

use crate::core::record::Record;
use std::sync::Arc;

pub use color::{Cli, Colorize, PadLevels, Uncolorize};
pub use enrich::{Align, Label, Metadata, Ms, Timestamp};
pub use errors::Errors;
pub use render::{Json, Logstash, PrettyPrint, Printf, Simple};
pub use splat::Splat;

/// A single transformation stage.
pub trait Format: Send + Sync {
    /// Transform `record`, or return `None` to suppress it.
    fn transform(&self, record: Record) -> Option<Record>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Shared handle to a stage or chain.
pub type FormatRef = Arc<dyn Format>;

/// Conversion into a [`FormatRef`].
pub trait IntoFormat {
    fn into_format(self) -> FormatRef;
}

impl<T: Format + 'static> IntoFormat for T {
    fn into_format(self) -> FormatRef {
        Arc::new(self)
    }
}

impl IntoFormat for FormatRef {
    fn into_format(self) -> FormatRef {
        self
    }
}

/// Ordered chain of stages.
pub struct Combine {
    stages: Vec<FormatRef>,
}

impl Combine {
    pub fn stages(&self) -> &[FormatRef] {
        &self.stages
    }
}

impl Format for Combine {
    fn transform(&self, record: Record) -> Option<Record> {
        self.stages
            .iter()
            .try_fold(record, |record, stage| stage.transform(record))
    }

    fn name(&self) -> &str {
        "combine"
    }
}

/// Build a chain that runs `stages` in order.
pub fn combine<I>(stages: I) -> FormatRef
where
    I: IntoIterator<Item = FormatRef>,
{
    Arc::new(Combine {
        stages: stages.into_iter().collect(),
    })
}

/// Stage backed by a closure.
pub struct FnFormat<F> {
    func: F,
}

impl<F> Format for FnFormat<F>
where
    F: Fn(Record) -> Option<Record> + Send + Sync,
{
    fn transform(&self, record: Record) -> Option<Record> {
        (self.func)(record)
    }
}

/// Wrap a closure as a stage.
pub fn from_fn<F>(func: F) -> FnFormat<F>
where
    F: Fn(Record) -> Option<Record> + Send + Sync,
{
    FnFormat { func }
}

pub fn timestamp() -> Timestamp {
    Timestamp::default()
}

pub fn label(label: impl Into<String>) -> Label {
    Label::new(label)
}

pub fn splat() -> Splat {
    Splat
}

pub fn errors() -> Errors {
    Errors::default()
}

pub fn json() -> Json {
    Json::default()
}

pub fn simple() -> Simple {
    Simple
}

pub fn printf<F>(template: F) -> Printf<F>
where
    F: Fn(&Record) -> String + Send + Sync,
{
    Printf::new(template)
}

pub fn colorize() -> Colorize {
    Colorize::default()
}

pub fn uncolorize() -> Uncolorize {
    Uncolorize::default()
}

pub fn pretty_print() -> PrettyPrint {
    PrettyPrint
}

pub fn align() -> Align {
    Align
}

pub fn ms() -> Ms {
    Ms::default()
}

pub fn metadata() -> Metadata {
    Metadata::default()
}

pub fn pad_levels() -> PadLevels {
    PadLevels::default()
}

pub fn logstash() -> Logstash {
    Logstash
}

pub fn cli() -> Cli {
    Cli::default()
}

/// Build a chain from heterogeneous stages.
///
/// ```
/// use rust_log_pipeline::combine;
/// use rust_log_pipeline::formats::{json, timestamp};
///
/// let chain = combine!(timestamp(), json());
/// ```
#[macro_export]
macro_rules! combine {
    ($($stage:expr),* $(,)?) => {
        $crate::formats::combine(vec![$($crate::formats::IntoFormat::into_format($stage)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_x() -> FnFormat<impl Fn(Record) -> Option<Record> + Send + Sync> {
        from_fn(|mut record: Record| {
            record.insert_meta("x", 1);
            Some(record)
        })
    }

    fn double_x() -> FnFormat<impl Fn(Record) -> Option<Record> + Send + Sync> {
        from_fn(|mut record: Record| {
            if let Some(x) = record.meta("x").and_then(|v| v.as_i64()) {
                record.insert_meta("x", x * 2);
            }
            Some(record)
        })
    }

    #[test]
    fn test_chain_order_is_significant() {
        let ab = combine!(set_x(), double_x());
        let ba = combine!(double_x(), set_x());

        let via_ab = ab.transform(Record::new("info", "m")).unwrap();
        let via_ba = ba.transform(Record::new("info", "m")).unwrap();

        assert_eq!(via_ab.meta("x"), Some(&json!(2)));
        assert_eq!(via_ba.meta("x"), Some(&json!(1)));
    }

    #[test]
    fn test_drop_stops_chain() {
        let reached = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = reached.clone();
        let chain = combine!(
            from_fn(|_record: Record| None),
            from_fn(move |record: Record| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Some(record)
            })
        );

        assert!(chain.transform(Record::new("info", "m")).is_none());
        assert!(!reached.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_nested_chains() {
        let inner = combine!(set_x(), double_x());
        let outer = combine!(inner, double_x());
        let record = outer.transform(Record::new("info", "m")).unwrap();
        assert_eq!(record.meta("x"), Some(&json!(4)));
    }

    #[test]
    fn test_chain_is_reusable() {
        let chain = combine!(set_x(), double_x(), json());
        for i in 0..3 {
            let record = chain.transform(Record::new("info", format!("m{}", i))).unwrap();
            assert!(record.output.unwrap().contains(&format!("m{}", i)));
        }
    }
}
