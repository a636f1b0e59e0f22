use colored::Colorize;

use fences_core::catalog::{BatchReport, EntryOutcome};
use fences_core::threshold::ThresholdOutcome;

use crate::format_value;

/// Format a batch summary for terminal output.
pub fn format_batch(report: &BatchReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "Fences - Outlier Thresholds".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    for entry in &report.entries {
        let (status, detail) = match &entry.outcome {
            EntryOutcome::Exported(outcome) if outcome.is_no_data() => {
                ("NODATA".yellow().bold().to_string(), String::new())
            }
            EntryOutcome::Exported(outcome) => {
                ("OK".green().bold().to_string(), format_columns(outcome))
            }
            EntryOutcome::Failed(e) => ("FAIL".red().bold().to_string(), e.to_string()),
            EntryOutcome::Skipped => ("SKIP".dimmed().to_string(), String::new()),
        };
        out.push_str(&format!("  [{status}] {} -> {}\n", entry.name, entry.output));
        if !detail.is_empty() {
            out.push_str(&format!("         {detail}\n"));
        }
    }

    out.push_str(&format!(
        "\n{}: {} exported, {} failed, {} skipped\n",
        "Summary".bold(),
        report.exported_count(),
        report.failed_count(),
        report.skipped_count(),
    ));
    out
}

/// Format one ad-hoc threshold computation.
pub fn format_outcome(analysis: &str, outcome: &ThresholdOutcome) -> String {
    let body = match outcome {
        ThresholdOutcome::NoData { .. } => "no data".yellow().to_string(),
        ThresholdOutcome::Computed(_) => format_columns(outcome),
    };
    format!("{} ({}): {body}\n", analysis.bold(), outcome.direction())
}

fn format_columns(outcome: &ThresholdOutcome) -> String {
    match outcome.thresholds() {
        Some(set) => set
            .columns()
            .iter()
            .map(|(key, value)| format!("{key}={}", format_value(*value)))
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fences_core::catalog::EntryReport;
    use fences_core::distribution::{Distribution, Quartiles};
    use fences_core::error::{EntryError, QueryError};
    use fences_core::threshold::compute_thresholds;
    use fences_core::types::Direction;

    fn report() -> BatchReport {
        let computed = compute_thresholds(
            &Distribution::Quartiles(Quartiles::new(3.0, 5.0, 7.0)),
            Direction::HighIsBad,
        );
        BatchReport {
            entries: vec![
                EntryReport {
                    name: "class_methods".to_string(),
                    output: "_STAT_NB_METHODS.csv".to_string(),
                    direction: Direction::HighIsBad,
                    outcome: EntryOutcome::Exported(computed),
                },
                EntryReport {
                    name: "class_lines".to_string(),
                    output: "_STAT_NB_CLASS_LINES.csv".to_string(),
                    direction: Direction::HighIsBad,
                    outcome: EntryOutcome::Failed(EntryError::Query(QueryError::UnexpectedRows {
                        analysis: "class_lines".to_string(),
                        rows: 2,
                    })),
                },
                EntryReport {
                    name: "camc".to_string(),
                    output: "_STAT_CAMC.csv".to_string(),
                    direction: Direction::LowIsBad,
                    outcome: EntryOutcome::Skipped,
                },
            ],
        }
    }

    #[test]
    fn test_format_batch() {
        colored::control::set_override(false);
        let out = format_batch(&report());
        assert!(out.contains("[OK] class_methods -> _STAT_NB_METHODS.csv"));
        assert!(out.contains("Q1=3.0 MED=5.0 Q3=7.0 HIGH=13.0 VERY_HIGH=19.0"));
        assert!(out.contains("[FAIL] class_lines"));
        assert!(out.contains("returned 2 rows"));
        assert!(out.contains("[SKIP] camc"));
        assert!(out.contains("1 exported, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_format_no_data_outcome() {
        colored::control::set_override(false);
        let outcome = compute_thresholds(&Distribution::NoData, Direction::LowIsBad);
        assert_eq!(
            format_outcome("class.camc", &outcome),
            "class.camc (low-is-bad): no data\n"
        );
    }
}
