use chrono::Utc;
use serde::Serialize;

use fences_core::catalog::{BatchReport, EntryOutcome};
use fences_core::threshold::ThresholdOutcome;
use fences_core::types::Direction;

#[derive(Debug, Serialize)]
pub struct BatchOutput<'a> {
    pub generated_at: String,
    pub exported: usize,
    pub failed: usize,
    pub skipped: usize,
    pub entries: Vec<EntryOutput<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Exported,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct EntryOutput<'a> {
    pub name: &'a str,
    pub output: &'a str,
    pub direction: Direction,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<&'a ThresholdOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> BatchOutput<'a> {
    pub fn new(report: &'a BatchReport) -> Self {
        let entries = report
            .entries
            .iter()
            .map(|entry| {
                let (status, thresholds, error) = match &entry.outcome {
                    EntryOutcome::Exported(outcome) => (EntryStatus::Exported, Some(outcome), None),
                    EntryOutcome::Failed(e) => (EntryStatus::Failed, None, Some(e.to_string())),
                    EntryOutcome::Skipped => (EntryStatus::Skipped, None, None),
                };
                EntryOutput {
                    name: &entry.name,
                    output: &entry.output,
                    direction: entry.direction,
                    status,
                    thresholds,
                    error,
                }
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            exported: report.exported_count(),
            failed: report.failed_count(),
            skipped: report.skipped_count(),
            entries,
        }
    }
}

/// Format a batch summary as JSON.
pub fn format_batch(report: &BatchReport, compact: bool) -> serde_json::Result<String> {
    let output = BatchOutput::new(report);
    if compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    }
}

#[derive(Debug, Serialize)]
struct OutcomeOutput<'a> {
    analysis: &'a str,
    #[serde(flatten)]
    outcome: &'a ThresholdOutcome,
}

/// Format one ad-hoc threshold computation as JSON.
pub fn format_outcome(analysis: &str, outcome: &ThresholdOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&OutcomeOutput { analysis, outcome })
}
