//! Late printf interpolation

use super::Format;
use crate::core::interpolate::{interpolate, merge_leftovers, Interpolated};
use crate::core::record::Record;

/// Interpolates arguments still parked in `record.splat` into the message.
///
/// Records produced by the logger's own normalization already have their
/// arguments consumed; this stage serves records built by hand with
/// [`Record::with_splat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Splat;

impl Format for Splat {
    fn transform(&self, mut record: Record) -> Option<Record> {
        if record.splat.is_empty() {
            return Some(record);
        }
        let args = std::mem::take(&mut record.splat);
        let Interpolated { message, leftovers } = interpolate(&record.message, args);
        record.message = message;
        merge_leftovers(&mut record, leftovers);
        Some(record)
    }

    fn name(&self) -> &str {
        "splat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_splat_consumes_args() {
        let record = Record::new("info", "%s scored %d")
            .with_splat(vec!["ann".into(), 42.into(), json!({"game": "chess"}).into()]);
        let record = Splat.transform(record).unwrap();

        assert_eq!(record.message, "ann scored 42");
        assert_eq!(record.meta("game"), Some(&json!("chess")));
        assert!(record.splat.is_empty());
    }

    #[test]
    fn test_no_args_leaves_placeholders() {
        let record = Splat.transform(Record::new("info", "100%% %s")).unwrap();
        assert_eq!(record.message, "100%% %s");
    }
}
