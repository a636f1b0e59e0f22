use fences_core::catalog::{BatchReport, EntryOutcome};

use crate::format_value;

/// Format a batch summary as a Markdown table.
pub fn format_batch(report: &BatchReport) -> String {
    let mut out = String::new();

    out.push_str("# Fences - Outlier Thresholds\n\n");
    out.push_str("| Analysis | Output | Status | Q1 | MED | Q3 | Fence | Extreme |\n");
    out.push_str("|----------|--------|--------|----|-----|----|-------|---------|\n");

    for entry in &report.entries {
        let (status, cells) = match &entry.outcome {
            EntryOutcome::Exported(outcome) => match outcome.thresholds() {
                Some(set) => (
                    "exported".to_string(),
                    set.columns()
                        .iter()
                        .map(|(key, value)| match *key {
                            "HIGH" | "VERY_HIGH" | "LOW" | "VERY_LOW" => {
                                format!("{key} {}", format_value(*value))
                            }
                            _ => format_value(*value),
                        })
                        .collect::<Vec<_>>(),
                ),
                None => ("no data".to_string(), vec!["-".to_string(); 5]),
            },
            EntryOutcome::Failed(e) => (
                format!("failed: {}", e.to_string().replace('|', "\\|")),
                vec!["-".to_string(); 5],
            ),
            EntryOutcome::Skipped => ("skipped".to_string(), vec!["-".to_string(); 5]),
        };
        out.push_str(&format!(
            "| {} | `{}` | {status} | {} |\n",
            entry.name,
            entry.output,
            cells.join(" | ")
        ));
    }

    out.push_str(&format!(
        "\n**Exported:** {} · **Failed:** {} · **Skipped:** {}\n",
        report.exported_count(),
        report.failed_count(),
        report.skipped_count(),
    ));
    out
}
