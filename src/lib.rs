//! # sitepdf
//!
//! Export the HTML pages of a static site build to PDF with headless Chrome.
//!
//! ## What it does
//!
//! A site build pushes its generated pages through a chain of transforms.
//! This crate is one such transform: every HTML file that passes through
//! is rendered by a real browser engine and printed to a paginated PDF
//! beside it (`about/index.html` → `about/index.pdf`). The records
//! themselves are forwarded unchanged, so the adapter can sit anywhere in
//! the chain.
//!
//! ## Pipeline Overview
//!
//! ```text
//! FileRecord stream
//!  │
//!  ├─ 1. Classify  null → pass through, stream-backed → reject
//!  ├─ 2. Lease     browser session from the pool (or a fresh one per file)
//!  ├─ 3. Load      file://<absolute path>, wait for network-almost-idle
//!  ├─ 4. Print     paper format + margins → PDF bytes
//!  ├─ 5. Write     <path>.pdf via temp file + rename
//!  └─ 6. Forward   the record, with a pending or finished PDF outcome
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitepdf::{export_paths, ExportConfig, ExportOptions, Length, Margin, PaperFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)));
//!     let config = ExportConfig::builder(options).build()?;
//!     let report = export_paths(&["dist"], &config).await?;
//!     eprintln!("{} PDFs written, {} failed", report.stats.exported, report.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sitepdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sitepdf = { version = "0.3", default-features = false }
//! ```
//!
//! ## Browser Sessions
//!
//! | Strategy | Sessions | Notes |
//! |----------|----------|-------|
//! | `Pooled` (default) | up to `max_sessions`, reused | one Chrome start-up per slot |
//! | `PerFile` | one per record | isolated, slow; combine with `max_sessions(None)` for the classic behaviour |
//!
//! Chrome or Chromium must be installed. Set [`ChromeSettings::executable`]
//! when it is not on the usual paths.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::{BrowserLauncher, BrowserSession, ChromeLauncher, ChromeSettings, RenderPage};
pub use config::{
    ExportConfig, ExportConfigBuilder, FailurePolicy, ForwardMode, LoadCondition, SessionStrategy,
};
pub use error::{BrowserError, ExportError, RenderError};
pub use export::{
    export_file, export_file_with, export_paths, export_paths_with, export_records, export_sync,
};
pub use options::{ExportOptions, Length, LengthUnit, Margin, PaperFormat, PrintLayout};
pub use output::{ExportReport, ExportStats, FileOutcome, PdfOutput};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ByteStream, Contents, FileRecord};
pub use stream::{ExportStream, ExportedRecord, PdfExport, PdfHandle, PdfStatus};
