//! Result types for PDF export.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A PDF that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfOutput {
    /// The HTML file that was rendered.
    pub source: PathBuf,
    /// The PDF written beside it.
    pub target: PathBuf,
    /// Size of the PDF in bytes.
    pub bytes: usize,
    /// Wall-clock time from session lease to finished write.
    pub duration_ms: u64,
}

/// What happened to one record of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Exported(PdfOutput),
    /// Null record, passed through.
    Skipped { source: PathBuf },
    Failed { source: PathBuf, error: String },
}

impl FileOutcome {
    pub fn source(&self) -> &std::path::Path {
        match self {
            FileOutcome::Exported(out) => &out.source,
            FileOutcome::Skipped { source } | FileOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_exported(&self) -> bool {
        matches!(self, FileOutcome::Exported(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Batch-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    /// Records fed to the adapter.
    pub total_files: usize,
    pub exported: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Browser sessions launched during the batch.
    pub sessions_launched: usize,
    pub total_duration_ms: u64,
}

/// Everything a batch export produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub files: Vec<FileOutcome>,
    pub stats: ExportStats,
}

impl ExportReport {
    pub(crate) fn new(files: Vec<FileOutcome>, sessions_launched: usize, total_duration_ms: u64) -> Self {
        let stats = ExportStats {
            total_files: files.len(),
            exported: files.iter().filter(|f| f.is_exported()).count(),
            failed: files.iter().filter(|f| f.is_failed()).count(),
            skipped: files
                .iter()
                .filter(|f| matches!(f, FileOutcome::Skipped { .. }))
                .count(),
            sessions_launched,
            total_duration_ms,
        };
        Self { files, stats }
    }

    /// Turn any failed file into an error.
    pub fn into_result(self) -> Result<Self, ExportError> {
        if self.stats.failed > 0 {
            return Err(ExportError::PartialFailure {
                exported: self.stats.exported,
                failed: self.stats.failed,
                total: self.stats.total_files,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exported(name: &str) -> FileOutcome {
        FileOutcome::Exported(PdfOutput {
            source: PathBuf::from(format!("{name}.html")),
            target: PathBuf::from(format!("{name}.pdf")),
            bytes: 1024,
            duration_ms: 5,
        })
    }

    #[test]
    fn stats_count_each_outcome() {
        let report = ExportReport::new(
            vec![
                exported("a"),
                exported("b"),
                FileOutcome::Skipped {
                    source: PathBuf::from("c"),
                },
                FileOutcome::Failed {
                    source: PathBuf::from("d.html"),
                    error: "navigation failed".into(),
                },
            ],
            2,
            100,
        );
        assert_eq!(report.stats.total_files, 4);
        assert_eq!(report.stats.exported, 2);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.failed, 1);
        assert!(matches!(
            report.into_result(),
            Err(ExportError::PartialFailure { failed: 1, total: 4, .. })
        ));
    }

    #[test]
    fn clean_report_passes_into_result() {
        let report = ExportReport::new(vec![exported("a")], 1, 10);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_value(exported("a")).unwrap();
        assert_eq!(json["status"], "exported");
        assert_eq!(json["target"], "a.pdf");

        let failed = FileOutcome::Failed {
            source: PathBuf::from("b.html"),
            error: "boom".into(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(failed.source(), std::path::Path::new("b.html"));
    }
}
