//! In-process stand-in for a browser, shared by the integration tests.
//!
//! Records how many sessions and pages were opened and closed, can be told
//! to fail printing for particular files, and can hold every page load
//! behind a gate until the test opens it.

#![allow(dead_code)]

use async_trait::async_trait;
use sitepdf::{
    BrowserError, BrowserLauncher, BrowserSession, ExportConfig, ExportOptions, Length,
    LoadCondition, Margin, PaperFormat, PrintLayout, RenderPage,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

#[derive(Default)]
pub struct MockState {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub live: AtomicUsize,
    pub peak: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    fail_on: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    load_delay: Duration,
}

/// A fake browser. Clones share state.
#[derive(Clone, Default)]
pub struct MockBrowser {
    pub state: Arc<MockState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Printing fails for files with any of these names.
    pub fn failing_on(names: &[&str]) -> Self {
        let browser = Self::new();
        if let Ok(mut fail_on) = browser.state.fail_on.lock() {
            fail_on.extend(names.iter().map(|n| n.to_string()));
        }
        browser
    }

    /// Every page load waits until [`open_gate`] is called.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let browser = Self {
            state: Arc::new(MockState {
                gate: Some(Arc::clone(&gate)),
                ..MockState::default()
            }),
        };
        (browser, gate)
    }

    /// Every page load takes `ms` milliseconds.
    pub fn slow(ms: u64) -> Self {
        Self {
            state: Arc::new(MockState {
                load_delay: Duration::from_millis(ms),
                ..MockState::default()
            }),
        }
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(self.clone())
    }

    pub fn launched(&self) -> usize {
        self.state.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.state.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.state.pages_closed.load(Ordering::SeqCst)
    }
}

pub fn open_gate(gate: &Semaphore) {
    gate.add_permits(1024);
}

/// The bytes the mock prints for `url`.
pub fn mock_pdf(url: &Url) -> Vec<u8> {
    format!("%PDF-1.4\n% {url}\n%%EOF\n").into_bytes()
}

#[async_trait]
impl BrowserLauncher for MockBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.state.launched.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, BrowserError> {
        self.state.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage {
            state: Arc::clone(&self.state),
            url: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPage {
    state: Arc<MockState>,
    url: Option<Url>,
}

#[async_trait]
impl RenderPage for MockPage {
    async fn load(&mut self, url: &Url, _wait_until: LoadCondition) -> Result<(), BrowserError> {
        if let Some(ref gate) = self.state.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        }
        if !self.state.load_delay.is_zero() {
            tokio::time::sleep(self.state.load_delay).await;
        }
        self.url = Some(url.clone());
        Ok(())
    }

    async fn print_pdf(&mut self, _layout: &PrintLayout) -> Result<Vec<u8>, BrowserError> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| BrowserError::Print("nothing loaded".into()))?;
        let name = url
            .to_file_path()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let failing = self
            .state
            .fail_on
            .lock()
            .map(|f| f.contains(&name))
            .unwrap_or(false);
        if failing {
            return Err(BrowserError::Print(format!("renderer crashed on {name}")));
        }
        Ok(mock_pdf(url))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Show library logs in test output (`RUST_LOG=sitepdf=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn letter_1cm() -> ExportOptions {
    ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)))
}

pub fn config() -> sitepdf::ExportConfigBuilder {
    ExportConfig::builder(letter_1cm())
}

/// Write an HTML file and return its path.
pub fn write_html(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, format!("<!doctype html><html><body>{body}</body></html>")).unwrap();
    path
}
