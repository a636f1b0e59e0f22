use std::collections::BTreeMap;

use crate::error::ExportError;
use crate::threshold::ThresholdOutcome;

/// Destination for threshold sets, one per output label.
pub trait ExportSink {
    /// Persist `outcome` under `label`. A `NoData` outcome must stay
    /// distinguishable from real zero-valued thresholds.
    fn write_stats(&mut self, outcome: &ThresholdOutcome, label: &str) -> Result<(), ExportError>;
}

impl<T: ExportSink + ?Sized> ExportSink for &mut T {
    fn write_stats(&mut self, outcome: &ThresholdOutcome, label: &str) -> Result<(), ExportError> {
        (**self).write_stats(outcome, label)
    }
}

/// Keeps outcomes in memory, keyed by label. Used for dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: BTreeMap<String, ThresholdOutcome>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&ThresholdOutcome> {
        self.written.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.written.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

impl ExportSink for MemorySink {
    fn write_stats(&mut self, outcome: &ThresholdOutcome, label: &str) -> Result<(), ExportError> {
        self.written.insert(label.to_string(), *outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    #[test]
    fn test_memory_sink_keeps_no_data_distinct() {
        let mut sink = MemorySink::new();
        let none = ThresholdOutcome::NoData {
            direction: Direction::HighIsBad,
        };
        sink.write_stats(&none, "_STAT_X.csv").unwrap();

        assert_eq!(sink.len(), 1);
        assert!(sink.get("_STAT_X.csv").unwrap().is_no_data());
        assert!(sink.get("_STAT_Y.csv").is_none());
        assert_eq!(sink.labels().collect::<Vec<_>>(), vec!["_STAT_X.csv"]);
    }
}
