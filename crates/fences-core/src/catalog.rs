//! Declarative table of threshold analyses and the batch runner.
//!
//! Each entry names an entity variant, a property, a filter, a direction and
//! an output label. Adding an analysis means adding a row; the engine never
//! changes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::distribution::{percentile_distribution, DistributionQuery, DistributionSource};
use crate::error::{CatalogError, EntryError, QueryError};
use crate::export::ExportSink;
use crate::metric::names;
use crate::predicate::Predicate;
use crate::threshold::{compute_thresholds, ThresholdOutcome};
use crate::types::{Direction, EntityVariant};

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub name: String,
    pub variant: EntityVariant,
    pub property: String,
    #[serde(default)]
    pub filter: Predicate,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Output label, e.g. `_STAT_CLASS_COMPLEXITY.csv`.
    pub output: String,
}

fn default_direction() -> Direction {
    Direction::HighIsBad
}

impl AnalysisEntry {
    pub fn query(&self) -> DistributionQuery {
        DistributionQuery::new(self.variant, &self.property, self.filter.clone()).named(&self.name)
    }
}

/// What to do with the rest of a batch after an entry fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Run every entry regardless of earlier failures.
    #[default]
    Continue,
    /// Skip all entries after the first failure.
    Abort,
}

/// Outcome of one catalog entry in a batch.
#[derive(Debug)]
pub enum EntryOutcome {
    Exported(ThresholdOutcome),
    Failed(EntryError),
    Skipped,
}

#[derive(Debug)]
pub struct EntryReport {
    pub name: String,
    pub output: String,
    pub direction: Direction,
    pub outcome: EntryOutcome,
}

/// Per-entry results of running a catalog.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<EntryReport>,
}

impl BatchReport {
    pub fn exported_count(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Exported(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed(_)))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.skipped_count() == 0
    }

    pub fn get(&self, name: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// An immutable, validated set of analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCatalog {
    entries: Vec<AnalysisEntry>,
}

/// name, variant, property, filter, direction, output
type BuiltinRow = (
    &'static str,
    EntityVariant,
    &'static str,
    &'static str,
    Direction,
    &'static str,
);

const BUILTIN: &[BuiltinRow] = &[
    (
        "class_complexity",
        EntityVariant::Class,
        names::CLASS_COMPLEXITY,
        "not has(is_interface) and class_complexity <> 0",
        Direction::HighIsBad,
        "_STAT_CLASS_COMPLEXITY.csv",
    ),
    (
        "cyclomatic_complexity",
        EntityVariant::Function,
        names::CYCLOMATIC_COMPLEXITY,
        "not has(is_getter) and not has(is_setter) and cyclomatic_complexity > 0 and number_of_lines > 0",
        Direction::HighIsBad,
        "_STAT_CYCLOMATIC_COMPLEXITY.csv",
    ),
    (
        "method_lines",
        EntityVariant::Function,
        names::NUMBER_OF_LINES,
        "not has(is_getter) and not has(is_setter) and number_of_lines > 0",
        Direction::HighIsBad,
        "_STAT_NB_METHOD_LINES.csv",
    ),
    (
        "class_lines",
        EntityVariant::Class,
        names::NUMBER_OF_LINES,
        "not has(is_interface) and number_of_lines > 10 and number_of_methods <> 0",
        Direction::HighIsBad,
        "_STAT_NB_CLASS_LINES.csv",
    ),
    (
        "view_controller_lines",
        EntityVariant::Class,
        names::NUMBER_OF_LINES,
        "not has(is_interface) and number_of_lines > 0 and number_of_methods <> 0 and is_view_controller",
        Direction::HighIsBad,
        "_STAT_NB_VC_LINES.csv",
    ),
    (
        "implemented_interfaces",
        EntityVariant::Class,
        names::NUMBER_OF_IMPLEMENTED_INTERFACES,
        "number_of_implemented_interfaces > 1",
        Direction::HighIsBad,
        "_STAT_NB_INTERFACES.csv",
    ),
    (
        "interface_methods",
        EntityVariant::Class,
        names::NUMBER_OF_METHODS,
        "has(is_interface)",
        Direction::HighIsBad,
        "_STAT_NB_METHODS_INTERFACE.csv",
    ),
    (
        "cohesion_among_methods",
        EntityVariant::Class,
        names::COHESION_AMONG_METHODS_OF_CLASS,
        // 1 is what the metric reports when there is nothing to measure.
        "not has(is_interface) and cohesion_among_methods_of_class <> 1",
        Direction::LowIsBad,
        "_STAT_CAMC.csv",
    ),
    (
        "class_methods",
        EntityVariant::Class,
        names::NUMBER_OF_METHODS,
        "not has(is_interface)",
        Direction::HighIsBad,
        "_STAT_NB_METHODS.csv",
    ),
    (
        "class_attributes",
        EntityVariant::Class,
        names::NUMBER_OF_ATTRIBUTES,
        "not has(is_interface)",
        Direction::HighIsBad,
        "_STAT_NB_ATTRIBUTES.csv",
    ),
];

impl ReportCatalog {
    /// Build a catalog, rejecting duplicate names and duplicate output labels.
    pub fn new(entries: Vec<AnalysisEntry>) -> Result<Self, CatalogError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut outputs: HashMap<&str, &str> = HashMap::new();
        for entry in &entries {
            if !seen.insert(&entry.name) {
                return Err(CatalogError::DuplicateName(entry.name.clone()));
            }
            if let Some(first) = outputs.insert(&entry.output, &entry.name) {
                return Err(CatalogError::DuplicateLabel {
                    label: entry.output.clone(),
                    first: first.to_string(),
                    second: entry.name.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The ten analyses shipped with the tool.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(name, variant, property, filter, direction, output)| AnalysisEntry {
                name: name.to_string(),
                variant,
                property: property.to_string(),
                filter: Predicate::parse(filter).expect("built-in filters are valid"),
                direction,
                output: output.to_string(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[AnalysisEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&AnalysisEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the named entries, in catalog order.
    pub fn only(&self, names: &[String]) -> Result<Self, CatalogError> {
        self.check_known(names)?;
        Ok(Self {
            entries: self
                .entries
                .iter()
                .filter(|e| names.contains(&e.name))
                .cloned()
                .collect(),
        })
    }

    /// Drop the named entries.
    pub fn without(&self, names: &[String]) -> Result<Self, CatalogError> {
        self.check_known(names)?;
        Ok(Self {
            entries: self
                .entries
                .iter()
                .filter(|e| !names.contains(&e.name))
                .cloned()
                .collect(),
        })
    }

    /// Append entries, validating the combined table.
    pub fn extended(&self, extra: Vec<AnalysisEntry>) -> Result<Self, CatalogError> {
        let mut entries = self.entries.clone();
        entries.extend(extra);
        Self::new(entries)
    }

    fn check_known(&self, names: &[String]) -> Result<(), CatalogError> {
        match names.iter().find(|n| self.get(n).is_none()) {
            Some(unknown) => Err(CatalogError::UnknownAnalysis(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Run every entry: query, compute fences, export.
    pub fn run<S, K>(&self, source: &S, sink: &mut K, policy: BatchPolicy) -> BatchReport
    where
        S: DistributionSource + ?Sized,
        K: ExportSink + ?Sized,
    {
        let mut report = BatchReport::default();
        let mut aborted = false;

        for entry in &self.entries {
            let outcome = if aborted {
                EntryOutcome::Skipped
            } else {
                match run_entry(entry, source, sink) {
                    Ok(outcome) => {
                        info!(
                            analysis = %entry.name,
                            output = %entry.output,
                            no_data = outcome.is_no_data(),
                            "exported thresholds"
                        );
                        EntryOutcome::Exported(outcome)
                    }
                    Err(e) => {
                        warn!(analysis = %entry.name, error = %e, "analysis failed");
                        if policy == BatchPolicy::Abort {
                            aborted = true;
                        }
                        EntryOutcome::Failed(e)
                    }
                }
            };
            report.entries.push(EntryReport {
                name: entry.name.clone(),
                output: entry.output.clone(),
                direction: entry.direction,
                outcome,
            });
        }

        report
    }
}

/// Compute thresholds for one query without exporting them.
pub fn evaluate<S: DistributionSource + ?Sized>(
    source: &S,
    query: &DistributionQuery,
    direction: Direction,
) -> Result<ThresholdOutcome, QueryError> {
    let distribution = percentile_distribution(source, query)?;
    Ok(compute_thresholds(&distribution, direction))
}

/// Run one catalog entry: query, compute fences, hand off to the sink.
pub fn run_entry<S, K>(
    entry: &AnalysisEntry,
    source: &S,
    sink: &mut K,
) -> Result<ThresholdOutcome, EntryError>
where
    S: DistributionSource + ?Sized,
    K: ExportSink + ?Sized,
{
    let outcome = evaluate(source, &entry.query(), entry.direction)?;
    sink.write_stats(&outcome, &entry.output)?;
    Ok(outcome)
}
