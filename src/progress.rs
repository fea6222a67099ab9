//! Progress-callback trait for per-file export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as each HTML file is converted.
//!
//! Conversions run concurrently, so events for different files interleave
//! and arrive from different tokio worker threads.
//!
//! # Example
//!
//! ```rust
//! use sitepdf::{ExportConfig, ExportOptions, ExportProgressCallback, Length, Margin, PaperFormat};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, source: &Path, target: &Path, bytes: usize) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} → {} ({} bytes)", source.display(), target.display(), bytes);
//!     }
//! }
//!
//! let options = ExportOptions::new(PaperFormat::A4, Margin::uniform(Length::mm(10.0)));
//! let config = ExportConfig::builder(options)
//!     .progress_callback(Arc::new(CountingCallback { written: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the export pipeline as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once by the batch entry points before any file is converted.
    ///
    /// # Arguments
    /// * `total_files` - number of records that will be fed to the adapter
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called once a browser session has been obtained for a file.
    fn on_file_start(&self, source: &Path) {
        let _ = source;
    }

    /// Called when a PDF has been written.
    ///
    /// # Arguments
    /// * `source` - the HTML file
    /// * `target` - the PDF written beside it
    /// * `bytes`  - size of the PDF
    fn on_file_complete(&self, source: &Path, target: &Path, bytes: usize) {
        let _ = (source, target, bytes);
    }

    /// Called when a file fails to convert.
    fn on_file_error(&self, source: &Path, error: &str) {
        let _ = (source, error);
    }

    /// Called once by the batch entry points after every outcome is known.
    ///
    /// # Arguments
    /// * `total_files`   - records fed to the adapter
    /// * `success_count` - PDFs written
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
