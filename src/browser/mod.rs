//! Browser automation seam.
//!
//! The export pipeline only needs five things from a browser: start a
//! session, open a page, load a URL until it is ready, print the page to
//! PDF, and close things again. These traits capture exactly that so the
//! pipeline can run against headless Chrome in production ([`chrome`]) and
//! against an in-process fake in tests.
//!
//! ```text
//! BrowserLauncher ──launch──▶ BrowserSession ──new_page──▶ RenderPage
//!                                  │                        ├─ load(url, wait_until)
//!                                  └─ close                 ├─ print_pdf(layout)
//!                                                           └─ close
//! ```
//!
//! A session is used by one conversion at a time. Pages are never reused.

pub mod chrome;

use crate::config::LoadCondition;
use crate::error::BrowserError;
use crate::options::PrintLayout;
use async_trait::async_trait;
use url::Url;

pub use chrome::{ChromeLauncher, ChromeSettings};

/// Starts new browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start an isolated browser session.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// A running browser.
#[async_trait]
pub trait BrowserSession: Send {
    /// Open a fresh page/document context.
    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, BrowserError>;

    /// Terminate the browser and release its resources.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// One page inside a session.
#[async_trait]
pub trait RenderPage: Send {
    /// Navigate to `url` and return once `wait_until` is reached.
    ///
    /// No timeout is applied here; the caller bounds the whole call.
    async fn load(&mut self, url: &Url, wait_until: LoadCondition) -> Result<(), BrowserError>;

    /// Print the current document as a paginated PDF.
    async fn print_pdf(&mut self, layout: &PrintLayout) -> Result<Vec<u8>, BrowserError>;

    /// Close the page.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
