//! Pipeline stages for HTML-to-PDF export.
//!
//! Each submodule implements one step of turning a file record into a PDF
//! beside it. The stream adapter in [`crate::stream`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pool ──▶ render ──▶ write
//! (records) (session) (load+print) (atomic .pdf)
//! ```
//!
//! 1. [`input`]  - turn files and directories into [`crate::FileRecord`]s
//! 2. [`pool`]   - lease a browser session, bounded by a semaphore
//! 3. [`render`] - open a page, wait for readiness, print, tear down
//! 4. [`write`]  - derive the `.pdf` path and write it atomically

pub mod input;
pub mod pool;
pub mod render;
pub mod write;
