//! Batch entry points.
//!
//! These drive the adapter over a whole set of inputs and wait for every
//! PDF, including ones forwarded as pending, before returning an
//! [`ExportReport`]. Use [`crate::stream::PdfExport`] directly to plug the
//! adapter into a larger record stream.

use crate::browser::{BrowserLauncher, ChromeLauncher, ChromeSettings};
use crate::config::ExportConfig;
use crate::error::{ExportError, RenderError};
use crate::output::{ExportReport, FileOutcome, PdfOutput};
use crate::pipeline::input;
use crate::record::FileRecord;
use crate::stream::{ExportedRecord, PdfExport, PdfHandle, PdfStatus};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Export every HTML file named by `inputs` with headless Chrome.
///
/// Directories are searched recursively for `.html` files; files are taken
/// as given.
///
/// # Returns
/// `Ok(ExportReport)` even if some files failed (check
/// `report.stats.failed`, or call [`ExportReport::into_result`]).
///
/// # Errors
/// - An input does not exist or cannot be read
/// - Under fail-fast, the first stream-backed record or failed conversion
pub async fn export_paths<P: AsRef<Path>>(
    inputs: &[P],
    config: &ExportConfig,
) -> Result<ExportReport, ExportError> {
    let launcher = Arc::new(ChromeLauncher::new(ChromeSettings::default()));
    export_paths_with(inputs, config, launcher).await
}

/// [`export_paths`] with a caller-supplied browser.
pub async fn export_paths_with<P: AsRef<Path>>(
    inputs: &[P],
    config: &ExportConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<ExportReport, ExportError> {
    let records = input::collect_records(inputs).await?;
    info!("Exporting {} files", records.len());
    export_records(records, config, launcher).await
}

/// Run the adapter over ready-made records and collect every outcome.
pub async fn export_records(
    records: Vec<FileRecord>,
    config: &ExportConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<ExportReport, ExportError> {
    let start = Instant::now();
    let total = records.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let export = PdfExport::new(config.clone(), launcher);
    let result = collect(&export, records, config.is_fail_fast()).await;
    export.shutdown().await;
    let files = result?;

    let report = ExportReport::new(
        files,
        export.sessions_launched(),
        start.elapsed().as_millis() as u64,
    );
    info!(
        "Export complete: {}/{} PDFs written, {} skipped, {} failed, {}ms",
        report.stats.exported,
        total,
        report.stats.skipped,
        report.stats.failed,
        report.stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.stats.exported);
    }
    Ok(report)
}

/// Export a single HTML file with headless Chrome.
pub async fn export_file(
    path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<PdfOutput, ExportError> {
    let launcher = Arc::new(ChromeLauncher::new(ChromeSettings::default()));
    export_file_with(path, config, launcher).await
}

/// [`export_file`] with a caller-supplied browser.
pub async fn export_file_with(
    path: impl AsRef<Path>,
    config: &ExportConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<PdfOutput, ExportError> {
    let path = path.as_ref();
    let record = FileRecord::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExportError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ExportError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let export = PdfExport::new(config.clone(), launcher);
    let outcome = match export.process(record).await {
        Ok(forwarded) => forwarded.pdf.outcome().await,
        Err(e) => {
            export.shutdown().await;
            return Err(e);
        }
    };
    export.shutdown().await;

    match outcome {
        Some(result) => result.map_err(ExportError::from),
        None => Err(ExportError::Internal(format!(
            "no conversion was started for '{}'",
            path.display()
        ))),
    }
}

/// Synchronous wrapper around [`export_paths`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync<P: AsRef<Path>>(
    inputs: &[P],
    config: &ExportConfig,
) -> Result<ExportReport, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_paths(inputs, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn collect(
    export: &PdfExport,
    records: Vec<FileRecord>,
    fail_fast: bool,
) -> Result<Vec<FileOutcome>, ExportError> {
    let mut files = Vec::with_capacity(records.len());
    let mut pending: Vec<PdfHandle> = Vec::new();
    let mut forwarded = export.transform(stream::iter(records));

    while let Some(item) = forwarded.next().await {
        match item {
            Ok(ExportedRecord { record, pdf }) => match pdf {
                PdfStatus::Skipped => files.push(FileOutcome::Skipped {
                    source: record.path,
                }),
                PdfStatus::Finished(result) => files.push(outcome(record.path, result)),
                PdfStatus::Pending(handle) => pending.push(handle),
            },
            Err(e) if !fail_fast => files.push(FileOutcome::Failed {
                source: e.path().map(Path::to_path_buf).unwrap_or_default(),
                error: e.to_string(),
            }),
            Err(e) => return Err(e),
        }
    }

    for handle in pending {
        let source = handle.source().to_path_buf();
        files.push(outcome(source, handle.outcome().await));
    }
    Ok(files)
}

fn outcome(source: PathBuf, result: Result<PdfOutput, RenderError>) -> FileOutcome {
    match result {
        Ok(out) => FileOutcome::Exported(out),
        Err(e) => FileOutcome::Failed {
            source,
            error: e.to_string(),
        },
    }
}
