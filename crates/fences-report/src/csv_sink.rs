use std::fs;
use std::path::{Path, PathBuf};

use fences_core::error::ExportError;
use fences_core::export::ExportSink;
use fences_core::threshold::ThresholdOutcome;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::format_value;

/// Marker written in every value cell when a distribution had no data.
pub const NO_DATA: &str = "NODATA";

/// Writes one CSV stat file per label: a header row of column keys and a
/// single value row. Each file is staged in the output directory and renamed
/// into place, so a failed write leaves no partial stat file behind.
#[derive(Debug)]
pub struct CsvSink {
    directory: PathBuf,
    prefix: String,
    written: Vec<PathBuf>,
}

impl CsvSink {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            written: Vec::new(),
        }
    }

    /// `<directory>/<prefix><label>`
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.directory.join(format!("{}{label}", self.prefix))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Files written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ExportSink for CsvSink {
    fn write_stats(&mut self, outcome: &ThresholdOutcome, label: &str) -> Result<(), ExportError> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            ExportError::with_source(
                label,
                format!("cannot create directory '{}'", self.directory.display()),
                e,
            )
        })?;

        let path = self.path_for(label);
        let mut staged = NamedTempFile::new_in(&self.directory).map_err(|e| {
            ExportError::with_source(
                label,
                format!("cannot create a staging file in '{}'", self.directory.display()),
                e,
            )
        })?;

        // Rows go to the staging file; the stat file only appears once complete.
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(true)
                .from_writer(staged.as_file_mut());

            let csv_err =
                |e: csv::Error| ExportError::with_source(label, "failed to write CSV row", e);
            writer
                .write_record(outcome.direction().columns())
                .map_err(csv_err)?;
            match outcome.thresholds() {
                Some(set) => writer
                    .write_record(set.columns().iter().map(|(_, v)| format_value(*v)))
                    .map_err(csv_err)?,
                None => writer.write_record([NO_DATA; 5]).map_err(csv_err)?,
            }
            writer.flush().map_err(|e| {
                ExportError::with_source(label, format!("failed to flush '{}'", path.display()), e)
            })?;
        }

        staged.persist(&path).map_err(|e| {
            ExportError::with_source(label, format!("cannot create '{}'", path.display()), e.error)
        })?;

        debug!(path = %path.display(), "wrote stat file");
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fences_core::distribution::{Distribution, Quartiles};
    use fences_core::threshold::compute_thresholds;
    use fences_core::types::Direction;

    #[test]
    fn test_writes_header_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), "app");
        let outcome = compute_thresholds(
            &Distribution::Quartiles(Quartiles::new(3.0, 5.0, 7.0)),
            Direction::HighIsBad,
        );
        sink.write_stats(&outcome, "_STAT_NB_METHODS.csv").unwrap();

        let path = dir.path().join("app_STAT_NB_METHODS.csv");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Q1,MED,Q3,HIGH,VERY_HIGH\n3.0,5.0,7.0,13.0,19.0\n");
        assert_eq!(sink.written(), &[path]);
    }

    #[test]
    fn test_low_is_bad_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), "");
        let outcome = compute_thresholds(
            &Distribution::Quartiles(Quartiles::new(2.0, 2.5, 3.0)),
            Direction::LowIsBad,
        );
        sink.write_stats(&outcome, "_STAT_CAMC.csv").unwrap();

        let content = std::fs::read_to_string(dir.path().join("_STAT_CAMC.csv")).unwrap();
        assert_eq!(content, "Q1,MED,Q3,LOW,VERY_LOW\n2.0,2.5,3.0,0.5,0.0\n");
    }

    #[test]
    fn test_no_data_is_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path().join("nested"), "x");
        let outcome = compute_thresholds(&Distribution::NoData, Direction::HighIsBad);
        sink.write_stats(&outcome, "_STAT_EMPTY.csv").unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("nested").join("x_STAT_EMPTY.csv")).unwrap();
        assert_eq!(
            content,
            "Q1,MED,Q3,HIGH,VERY_HIGH\nNODATA,NODATA,NODATA,NODATA,NODATA\n"
        );
    }

    #[test]
    fn test_unwritable_directory_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut sink = CsvSink::new(&blocker, "");
        let outcome = compute_thresholds(&Distribution::NoData, Direction::HighIsBad);
        let err = sink.write_stats(&outcome, "_STAT_X.csv").unwrap_err();
        assert_eq!(err.label, "_STAT_X.csv");
        assert!(sink.written().is_empty());
    }

    fn entries_of(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_no_staging_file_left_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), "app");
        let outcome = compute_thresholds(
            &Distribution::Quartiles(Quartiles::new(1.0, 2.0, 3.0)),
            Direction::HighIsBad,
        );
        sink.write_stats(&outcome, "_STAT_A.csv").unwrap();
        sink.write_stats(&outcome, "_STAT_A.csv").unwrap();

        assert_eq!(entries_of(dir.path()), vec!["app_STAT_A.csv"]);
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory where the stat file should go
        let target = dir.path().join("app_STAT_B.csv");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "").unwrap();

        let mut sink = CsvSink::new(dir.path(), "app");
        let outcome = compute_thresholds(&Distribution::NoData, Direction::HighIsBad);
        let err = sink.write_stats(&outcome, "_STAT_B.csv").unwrap_err();

        assert_eq!(err.label, "_STAT_B.csv");
        assert!(sink.written().is_empty());
        assert_eq!(entries_of(dir.path()), vec!["app_STAT_B.csv"]);
        assert!(target.is_dir());
    }
}
