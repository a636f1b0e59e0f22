//! Contract between the threshold engine and whatever computes percentiles.
//!
//! A `DistributionSource` answers one aggregate query with raw rows, the way
//! a graph store would. `percentile_distribution` turns those rows into a
//! typed `Distribution`: exactly one row of three numbers, or no data.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QueryError;
use crate::predicate::Predicate;
use crate::types::EntityVariant;

/// One percentile query: a property of one entity variant, filtered.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionQuery {
    /// Name used in errors and logs.
    pub analysis: String,
    pub variant: EntityVariant,
    pub property: String,
    pub predicate: Predicate,
}

impl DistributionQuery {
    pub fn new(variant: EntityVariant, property: &str, predicate: Predicate) -> Self {
        Self {
            analysis: format!("{variant}.{property}"),
            variant,
            property: property.to_string(),
            predicate,
        }
    }

    pub fn named(mut self, analysis: &str) -> Self {
        self.analysis = analysis.to_string();
        self
    }
}

/// A raw cell as returned by a store. Stores may hand back integers or
/// floats for the same logical value, or numbers rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SampleValue {
    /// The cell as a finite `f64`. `None` for null, non-numeric text and
    /// non-finite numbers.
    fn coerce(&self) -> Option<f64> {
        let value = match self {
            SampleValue::Null => return None,
            SampleValue::Integer(i) => *i as f64,
            SampleValue::Float(f) => *f,
            SampleValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Null => f.write_str("null"),
            SampleValue::Integer(i) => write!(f, "{i}"),
            SampleValue::Float(v) => write!(f, "{v}"),
            SampleValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Float(value)
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        SampleValue::Integer(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

/// One aggregate result row: the 25th, 50th and 75th percentiles.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileRow {
    pub q1: SampleValue,
    pub median: SampleValue,
    pub q3: SampleValue,
}

impl PercentileRow {
    pub fn new(
        q1: impl Into<SampleValue>,
        median: impl Into<SampleValue>,
        q3: impl Into<SampleValue>,
    ) -> Self {
        Self {
            q1: q1.into(),
            median: median.into(),
            q3: q3.into(),
        }
    }

    /// The row an aggregate returns over zero matching entities.
    pub fn null() -> Self {
        Self {
            q1: SampleValue::Null,
            median: SampleValue::Null,
            q3: SampleValue::Null,
        }
    }
}

/// Capability to compute continuous percentiles over filtered entities.
pub trait DistributionSource {
    /// Run the aggregate query and return its raw rows.
    fn percentile_rows(&self, query: &DistributionQuery) -> Result<Vec<PercentileRow>, QueryError>;
}

impl<T: DistributionSource + ?Sized> DistributionSource for &T {
    fn percentile_rows(&self, query: &DistributionQuery) -> Result<Vec<PercentileRow>, QueryError> {
        (**self).percentile_rows(query)
    }
}

/// First, second and third quartile of a distribution, in double precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl Quartiles {
    pub fn new(q1: f64, median: f64, q3: f64) -> Self {
        Self { q1, median, q3 }
    }

    /// Interquartile range, Q3 - Q1.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Normalized answer of a distribution query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// No entity matched the filter or carried the property.
    NoData,
    Quartiles(Quartiles),
}

/// Query `source` and normalize its answer.
///
/// Zero rows, or a single all-null row, is `NoData`. More than one row is a
/// contract violation. Integer, float and numeric-text cells are all
/// coerced to `f64`; anything else fails with `MalformedValue`.
pub fn percentile_distribution<S: DistributionSource + ?Sized>(
    source: &S,
    query: &DistributionQuery,
) -> Result<Distribution, QueryError> {
    debug!(
        analysis = %query.analysis,
        variant = %query.variant,
        property = %query.property,
        filter = %query.predicate,
        "querying percentile distribution"
    );
    let rows = source.percentile_rows(query)?;
    normalize_rows(query, rows)
}

fn normalize_rows(
    query: &DistributionQuery,
    mut rows: Vec<PercentileRow>,
) -> Result<Distribution, QueryError> {
    let row = match rows.len() {
        0 => return Ok(Distribution::NoData),
        1 => rows.remove(0),
        n => {
            return Err(QueryError::UnexpectedRows {
                analysis: query.analysis.clone(),
                rows: n,
            })
        }
    };

    let cells = [("Q1", &row.q1), ("MED", &row.median), ("Q3", &row.q3)];
    if cells.iter().all(|(_, v)| **v == SampleValue::Null) {
        return Ok(Distribution::NoData);
    }

    let mut values = [0.0f64; 3];
    for (slot, (column, cell)) in values.iter_mut().zip(cells) {
        match cell.coerce() {
            Some(v) => *slot = v,
            None => {
                return Err(QueryError::MalformedValue {
                    analysis: query.analysis.clone(),
                    property: query.property.clone(),
                    column,
                    value: cell.to_string(),
                })
            }
        }
    }

    let [q1, median, q3] = values;
    if !(q1 <= median && median <= q3) {
        return Err(QueryError::InconsistentQuartiles {
            analysis: query.analysis.clone(),
            q1,
            median,
            q3,
        });
    }

    Ok(Distribution::Quartiles(Quartiles::new(q1, median, q3)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_cells() {
        assert_eq!(SampleValue::Integer(7).coerce(), Some(7.0));
        assert_eq!(SampleValue::Float(2.5).coerce(), Some(2.5));
        assert_eq!(SampleValue::from(" 4.25 ").coerce(), Some(4.25));
        assert_eq!(SampleValue::Null.coerce(), None);
        assert_eq!(SampleValue::from("n/a").coerce(), None);
        assert_eq!(SampleValue::from("NaN").coerce(), None);
        assert_eq!(SampleValue::Float(f64::INFINITY).coerce(), None);
    }

    struct Scripted(Result<Vec<PercentileRow>, QueryError>);

    impl DistributionSource for Scripted {
        fn percentile_rows(
            &self,
            _query: &DistributionQuery,
        ) -> Result<Vec<PercentileRow>, QueryError> {
            self.0.clone()
        }
    }

    fn query() -> DistributionQuery {
        DistributionQuery::new(EntityVariant::Class, "number_of_methods", Predicate::Always)
            .named("class_methods")
    }

    fn run(rows: Vec<PercentileRow>) -> Result<Distribution, QueryError> {
        percentile_distribution(&Scripted(Ok(rows)), &query())
    }

    #[test]
    fn test_single_row_normalizes() {
        let d = run(vec![PercentileRow::new(2.0, 3.5, 5.0)]).unwrap();
        assert_eq!(d, Distribution::Quartiles(Quartiles::new(2.0, 3.5, 5.0)));
    }

    #[test]
    fn test_integer_and_float_cells_equal() {
        let ints = run(vec![PercentileRow::new(2i64, 3i64, 5i64)]).unwrap();
        let floats = run(vec![PercentileRow::new(2.0, 3.0, 5.0)]).unwrap();
        let mixed = run(vec![PercentileRow::new(2i64, 3.0, "5")]).unwrap();
        assert_eq!(ints, floats);
        assert_eq!(ints, mixed);
    }

    #[test]
    fn test_zero_rows_is_no_data() {
        assert_eq!(run(vec![]).unwrap(), Distribution::NoData);
    }

    #[test]
    fn test_null_row_is_no_data() {
        assert_eq!(run(vec![PercentileRow::null()]).unwrap(), Distribution::NoData);
    }

    #[test]
    fn test_multiple_rows_is_contract_violation() {
        let err = run(vec![
            PercentileRow::new(1.0, 2.0, 3.0),
            PercentileRow::new(1.0, 2.0, 3.0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnexpectedRows {
                analysis: "class_methods".to_string(),
                rows: 2
            }
        );
    }

    #[test]
    fn test_non_numeric_text_fails_fast() {
        let err = run(vec![PercentileRow::new(1.0, "lots", 3.0)]).unwrap_err();
        match err {
            QueryError::MalformedValue {
                analysis,
                property,
                column,
                value,
            } => {
                assert_eq!(analysis, "class_methods");
                assert_eq!(property, "number_of_methods");
                assert_eq!(column, "MED");
                assert_eq!(value, "\"lots\"");
            }
            other => panic!("expected MalformedValue, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_null_is_malformed() {
        let row = PercentileRow {
            q1: SampleValue::Float(1.0),
            median: SampleValue::Float(2.0),
            q3: SampleValue::Null,
        };
        let err = run(vec![row]).unwrap_err();
        assert!(matches!(err, QueryError::MalformedValue { column: "Q3", .. }));
    }

    #[test]
    fn test_non_finite_is_malformed() {
        let err = run(vec![PercentileRow::new(f64::NAN, 2.0, 3.0)]).unwrap_err();
        assert!(matches!(err, QueryError::MalformedValue { column: "Q1", .. }));
        let err = run(vec![PercentileRow::new(1.0, 2.0, "inf")]).unwrap_err();
        assert!(matches!(err, QueryError::MalformedValue { column: "Q3", .. }));
    }

    #[test]
    fn test_unordered_quartiles_rejected() {
        let err = run(vec![PercentileRow::new(5.0, 2.0, 3.0)]).unwrap_err();
        assert!(matches!(err, QueryError::InconsistentQuartiles { .. }));
    }

    #[test]
    fn test_source_failure_propagates() {
        let failure = QueryError::Failed {
            analysis: "class_methods".to_string(),
            message: "store unavailable".to_string(),
        };
        let err = percentile_distribution(&Scripted(Err(failure.clone())), &query()).unwrap_err();
        assert_eq!(err, failure);
    }

    #[test]
    fn test_default_query_name() {
        let q = DistributionQuery::new(EntityVariant::Function, "number_of_lines", Predicate::Always);
        assert_eq!(q.analysis, "function.number_of_lines");
    }
}
