use std::cell::Cell;

use tracing::trace;

use crate::distribution::{DistributionQuery, DistributionSource, PercentileRow};
use crate::error::QueryError;
use crate::model::CodeModel;
use crate::stats::{percentile_cont, sort_values};

/// In-memory graph store answering percentile queries over a `CodeModel`.
///
/// Every query runs inside a read session that is closed when the query
/// returns, whether it succeeded, found no data or failed.
pub struct ModelStore<'a> {
    model: &'a CodeModel,
    open_sessions: Cell<usize>,
}

/// Read session guard. Dropping it closes the session.
pub struct ReadSession<'s> {
    counter: &'s Cell<usize>,
}

impl Drop for ReadSession<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

impl<'a> ModelStore<'a> {
    pub fn new(model: &'a CodeModel) -> Self {
        Self {
            model,
            open_sessions: Cell::new(0),
        }
    }

    pub fn model(&self) -> &'a CodeModel {
        self.model
    }

    pub fn begin_read(&self) -> ReadSession<'_> {
        self.open_sessions.set(self.open_sessions.get() + 1);
        ReadSession {
            counter: &self.open_sessions,
        }
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.get()
    }

    /// Values of `query.property` over the entities the query selects, sorted.
    pub fn sample(&self, query: &DistributionQuery) -> Result<Vec<f64>, QueryError> {
        let _session = self.begin_read();
        self.sample_in_session(query)
    }

    fn sample_in_session(&self, query: &DistributionQuery) -> Result<Vec<f64>, QueryError> {
        if !is_identifier(&query.property) {
            return Err(QueryError::Failed {
                analysis: query.analysis.clone(),
                message: format!("invalid property name '{}'", query.property),
            });
        }

        let mut values: Vec<f64> = self
            .model
            .entities(query.variant)
            .filter(|(_, entity)| query.predicate.matches(entity))
            .filter_map(|(_, entity)| entity.metric_value(&query.property))
            .collect();
        sort_values(&mut values);
        Ok(values)
    }
}

impl DistributionSource for ModelStore<'_> {
    fn percentile_rows(&self, query: &DistributionQuery) -> Result<Vec<PercentileRow>, QueryError> {
        let _session = self.begin_read();
        let values = self.sample_in_session(query)?;
        trace!(analysis = %query.analysis, n = values.len(), "sampled distribution");

        let row = match (
            percentile_cont(&values, 0.25),
            percentile_cont(&values, 0.5),
            percentile_cont(&values, 0.75),
        ) {
            (Some(q1), Some(median), Some(q3)) => PercentileRow::new(q1, median, q3),
            _ => PercentileRow::null(),
        };
        Ok(vec![row])
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
