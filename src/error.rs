//! Error types for the sitepdf library.
//!
//! Three error types reflect three layers of failure:
//!
//! * [`ExportError`] - **Stream / batch level**: the record cannot be handled
//!   at all (stream-backed input, missing input directory, bad configuration),
//!   or a conversion failure surfaced under the fail-fast policy.
//!
//! * [`RenderError`] - **Per record**: one HTML file failed to become a PDF
//!   (browser crash, navigation timeout, disk write failure). Attached to the
//!   forwarded record's outcome so other records are never affected.
//!
//! * [`BrowserError`] - **Browser seam**: what a [`crate::browser`]
//!   implementation reports. It knows nothing about which record it was
//!   serving; [`RenderError::Browser`] adds the path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal errors returned by the adapter stream and the batch entry points.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The record carries a byte stream instead of a materialised file.
    #[error("Streaming not supported: '{path}'\nOnly records backed by a file on disk can be exported.")]
    UnsupportedInput { path: PathBuf },

    /// An input file or directory handed to the batch API does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// An input could not be read while building records.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// A record failed to convert and the fail-fast policy is active.
    #[error(transparent)]
    Conversion(#[from] RenderError),

    /// Some files exported but at least one failed.
    ///
    /// Returned by [`crate::output::ExportReport::into_result`] when the
    /// caller wants any failure to be an error.
    #[error("{failed}/{total} files failed to export")]
    PartialFailure {
        exported: usize,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or options validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// The path the error is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ExportError::UnsupportedInput { path }
            | ExportError::SourceNotFound { path }
            | ExportError::ReadFailed { path, .. } => Some(path),
            ExportError::Conversion(e) => Some(e.path()),
            _ => None,
        }
    }
}

/// A non-fatal error for a single record.
///
/// Every variant carries the source path so callers can log or retry without
/// keeping their own bookkeeping.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum RenderError {
    /// The record path does not point at a regular file.
    #[error("'{path}': source file is missing or not a regular file")]
    SourceMissing { path: PathBuf },

    /// The browser failed at one of its steps.
    #[error("'{path}': {source}")]
    Browser {
        path: PathBuf,
        #[source]
        source: BrowserError,
    },

    /// The page did not reach its readiness condition in time.
    #[error("'{path}': page did not become ready within {secs}s")]
    NavigationTimeout { path: PathBuf, secs: u64 },

    /// The PDF bytes could not be written next to the source.
    #[error("'{path}': failed to write PDF: {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// The conversion task panicked or was cancelled.
    #[error("'{path}': conversion aborted: {detail}")]
    Aborted { path: PathBuf, detail: String },
}

impl RenderError {
    /// The source path of the record that failed.
    pub fn path(&self) -> &Path {
        match self {
            RenderError::SourceMissing { path }
            | RenderError::Browser { path, .. }
            | RenderError::NavigationTimeout { path, .. }
            | RenderError::WriteFailed { path, .. }
            | RenderError::Aborted { path, .. } => path,
        }
    }

    /// Whether the browser session that produced this error should be retired
    /// rather than returned to the pool.
    pub(crate) fn poisons_session(&self) -> bool {
        matches!(
            self,
            RenderError::Browser { .. } | RenderError::NavigationTimeout { .. }
        )
    }
}

/// Errors reported by a browser implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BrowserError {
    /// The browser process could not be started or connected to.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// A new page could not be opened.
    #[error("could not open page: {0}")]
    Page(String),

    /// Navigation failed (bad URL, net error, event stream closed).
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The print-to-PDF command failed.
    #[error("PDF export failed: {0}")]
    Print(String),

    /// Closing a page or the browser failed.
    #[error("teardown failed: {0}")]
    Close(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_input_display() {
        let e = ExportError::UnsupportedInput {
            path: PathBuf::from("site/index.html"),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Streaming not supported"), "got: {msg}");
        assert!(msg.contains("site/index.html"));
    }

    #[test]
    fn export_error_path() {
        let e = ExportError::from(RenderError::SourceMissing {
            path: PathBuf::from("x.html"),
        });
        assert_eq!(e.path(), Some(Path::new("x.html")));
        assert_eq!(ExportError::InvalidConfig("bad".into()).path(), None);
    }

    #[test]
    fn partial_failure_display() {
        let e = ExportError::PartialFailure {
            exported: 9,
            failed: 1,
            total: 10,
        };
        assert!(e.to_string().contains("1/10"), "got: {e}");
    }

    #[test]
    fn conversion_is_transparent() {
        let e = ExportError::from(RenderError::NavigationTimeout {
            path: PathBuf::from("a.html"),
            secs: 30,
        });
        assert_eq!(e.to_string(), "'a.html': page did not become ready within 30s");
    }

    #[test]
    fn browser_error_carries_path_and_cause() {
        let e = RenderError::Browser {
            path: PathBuf::from("docs/page.html"),
            source: BrowserError::Launch("no chrome executable found".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("docs/page.html"));
        assert!(msg.contains("no chrome executable found"));
        assert_eq!(e.path(), Path::new("docs/page.html"));
    }

    #[test]
    fn write_failures_do_not_poison_sessions() {
        let write = RenderError::WriteFailed {
            path: PathBuf::from("a.html"),
            detail: "read-only file system".into(),
        };
        assert!(!write.poisons_session());

        let timeout = RenderError::NavigationTimeout {
            path: PathBuf::from("a.html"),
            secs: 1,
        };
        assert!(timeout.poisons_session());
    }

    #[test]
    fn render_error_serialises() {
        let e = RenderError::SourceMissing {
            path: PathBuf::from("gone.html"),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("SourceMissing"));
        assert!(json.contains("gone.html"));
    }
}
