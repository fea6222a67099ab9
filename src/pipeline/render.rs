//! Per-record conversion: one HTML file in, one PDF beside it.
//!
//! ```text
//! source.html ─▶ lease session ─▶ new page ─▶ load file:// ─▶ print ─▶ close page
//!                     │                                                     │
//!                     └────────────── release (park or close) ◀─────────────┘
//!                                                                           │
//!                                                      write source.pdf ◀───┘
//! ```
//!
//! Every step after the lease is fallible, and every failure still returns
//! the lease to the pool. A session that failed in the browser (or timed
//! out) is closed instead of parked.

use crate::browser::RenderPage;
use crate::config::ExportConfig;
use crate::error::{BrowserError, RenderError};
use crate::output::PdfOutput;
use crate::pipeline::pool::{Lease, SessionPool};
use crate::pipeline::write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Convert `source` to a PDF at [`write::pdf_path`]`(source)`.
///
/// Reports start, completion and failure to the configured progress
/// callback and logs failures at `warn`.
pub async fn export_record(
    pool: &SessionPool,
    source: &Path,
    config: &ExportConfig,
) -> Result<PdfOutput, RenderError> {
    let start = Instant::now();
    let result = convert(pool, source, config, start).await;

    match &result {
        Ok(out) => {
            info!(
                "Exported {} → {} ({} bytes, {}ms)",
                out.source.display(),
                out.target.display(),
                out.bytes,
                out.duration_ms
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_complete(&out.source, &out.target, out.bytes);
            }
        }
        Err(e) => {
            warn!("PDF export failed: {}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_error(source, &e.to_string());
            }
        }
    }

    result
}

async fn convert(
    pool: &SessionPool,
    source: &Path,
    config: &ExportConfig,
    start: Instant,
) -> Result<PdfOutput, RenderError> {
    let missing = || RenderError::SourceMissing {
        path: source.to_path_buf(),
    };

    // ── Step 1: Resolve source and target ────────────────────────────────
    let meta = tokio::fs::metadata(source).await.map_err(|_| missing())?;
    if !meta.is_file() {
        return Err(missing());
    }
    let absolute = tokio::fs::canonicalize(source)
        .await
        .map_err(|_| missing())?;
    let url = write::file_url(&absolute).ok_or_else(missing)?;
    let target = write::pdf_path(source);
    debug!("Rendering {} as {}", source.display(), url);

    // ── Step 2: Lease a session ──────────────────────────────────────────
    let mut lease = pool.acquire().await.map_err(browser_failure(source))?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(source);
    }

    // ── Steps 3-5: Page, load, print ─────────────────────────────────────
    let printed = print(pool, &mut lease, &url, source, config).await;

    // ── Step 6: Teardown, always ─────────────────────────────────────────
    let healthy = printed.as_ref().map_or_else(|e| !e.poisons_session(), |_| true);
    pool.release(lease, healthy).await;
    let pdf = printed?;

    // ── Step 7: Write beside the source ──────────────────────────────────
    write::write_atomic(&target, &pdf)
        .await
        .map_err(|e| RenderError::WriteFailed {
            path: source.to_path_buf(),
            detail: format!("{}: {}", target.display(), e),
        })?;

    Ok(PdfOutput {
        source: source.to_path_buf(),
        target,
        bytes: pdf.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Open a page, print it, close it.
///
/// A reused session that cannot open a page is assumed dead: it is swapped
/// for a fresh one and the page is opened again, once.
async fn print(
    pool: &SessionPool,
    lease: &mut Lease,
    url: &Url,
    source: &Path,
    config: &ExportConfig,
) -> Result<Vec<u8>, RenderError> {
    let mut page = match lease.session().new_page().await {
        Ok(page) => page,
        Err(e) if lease.is_reused() => {
            debug!("Reused browser session is unusable ({}); relaunching", e);
            pool.relaunch(lease).await.map_err(browser_failure(source))?;
            lease
                .session()
                .new_page()
                .await
                .map_err(browser_failure(source))?
        }
        Err(e) => return Err(browser_failure(source)(e)),
    };

    let result = load_and_print(page.as_mut(), url, source, config).await;

    if let Err(e) = page.close().await {
        debug!("Page for {} did not close cleanly: {}", source.display(), e);
    }
    result
}

async fn load_and_print(
    page: &mut dyn RenderPage,
    url: &Url,
    source: &Path,
    config: &ExportConfig,
) -> Result<Vec<u8>, RenderError> {
    match tokio::time::timeout(config.navigation_timeout(), page.load(url, config.wait_until)).await
    {
        Err(_) => {
            return Err(RenderError::NavigationTimeout {
                path: source.to_path_buf(),
                secs: config.navigation_timeout_secs,
            })
        }
        Ok(loaded) => loaded.map_err(browser_failure(source))?,
    }

    page.print_pdf(&config.options.layout())
        .await
        .map_err(browser_failure(source))
}

fn browser_failure(source: &Path) -> impl Fn(BrowserError) -> RenderError + '_ {
    move |e| RenderError::Browser {
        path: source.to_path_buf(),
        source: e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserLauncher, BrowserSession};
    use crate::config::{LoadCondition, SessionStrategy};
    use crate::options::{ExportOptions, Length, Margin, PaperFormat, PrintLayout};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// How the fake page behaves.
    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        Hang,
        PrintFails,
        /// The first session's second `new_page` fails.
        DiesAfterOnePage,
    }

    struct Fake {
        mode: Mode,
        launched: AtomicUsize,
        closed: AtomicUsize,
        pages_closed: AtomicUsize,
    }

    struct FakeLauncher(Arc<Fake>);
    struct FakeSession {
        fake: Arc<Fake>,
        id: usize,
        pages: usize,
    }
    struct FakePage(Arc<Fake>);

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            let id = self.0.launched.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                fake: Arc::clone(&self.0),
                id,
                pages: 0,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, BrowserError> {
            self.pages += 1;
            if matches!(self.fake.mode, Mode::DiesAfterOnePage) && self.id == 0 && self.pages > 1 {
                return Err(BrowserError::Page("target closed".into()));
            }
            Ok(Box::new(FakePage(Arc::clone(&self.fake))))
        }

        async fn close(self: Box<Self>) -> Result<(), BrowserError> {
            self.fake.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl RenderPage for FakePage {
        async fn load(&mut self, _url: &Url, _wait: LoadCondition) -> Result<(), BrowserError> {
            if matches!(self.0.mode, Mode::Hang) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(())
        }

        async fn print_pdf(&mut self, _layout: &PrintLayout) -> Result<Vec<u8>, BrowserError> {
            match self.0.mode {
                Mode::PrintFails => Err(BrowserError::Print("printing failed".into())),
                _ => Ok(b"%PDF-1.4 fake".to_vec()),
            }
        }

        async fn close(self: Box<Self>) -> Result<(), BrowserError> {
            self.0.pages_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup(mode: Mode, strategy: SessionStrategy) -> (SessionPool, Arc<Fake>, ExportConfig) {
        let fake = Arc::new(Fake {
            mode,
            launched: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            pages_closed: AtomicUsize::new(0),
        });
        let pool = SessionPool::new(Arc::new(FakeLauncher(Arc::clone(&fake))), strategy, Some(1));
        let config = ExportConfig::builder(ExportOptions::new(
            PaperFormat::Letter,
            Margin::uniform(Length::cm(1.0)),
        ))
        .session_strategy(strategy)
        .navigation_timeout_secs(1)
        .build()
        .unwrap();
        (pool, fake, config)
    }

    fn html(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, "<p>Hello</p>").unwrap();
        path
    }

    #[tokio::test]
    async fn writes_pdf_beside_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = html(&dir, "page.html");
        let (pool, fake, config) = setup(Mode::Ok, SessionStrategy::PerFile);

        let out = export_record(&pool, &source, &config).await.unwrap();

        assert_eq!(out.target, dir.path().join("page.pdf"));
        assert_eq!(std::fs::read(&out.target).unwrap(), b"%PDF-1.4 fake");
        assert_eq!(fake.launched.load(Ordering::SeqCst), 1);
        assert_eq!(fake.closed.load(Ordering::SeqCst), 1);
        assert_eq!(fake.pages_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_source_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, fake, config) = setup(Mode::Ok, SessionStrategy::PerFile);

        let err = export_record(&pool, &dir.path().join("gone.html"), &config)
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::SourceMissing { .. }));
        assert_eq!(fake.launched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn print_failure_still_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let source = html(&dir, "page.html");
        let (pool, fake, config) = setup(Mode::PrintFails, SessionStrategy::Pooled);

        let err = export_record(&pool, &source, &config).await.unwrap_err();

        assert!(matches!(
            err,
            RenderError::Browser {
                source: BrowserError::Print(_),
                ..
            }
        ));
        assert!(!dir.path().join("page.pdf").exists());
        assert_eq!(fake.pages_closed.load(Ordering::SeqCst), 1);
        // Poisoned session is closed, not parked.
        assert_eq!(fake.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn hung_navigation_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let source = html(&dir, "slow.html");
        let (pool, fake, config) = setup(Mode::Hang, SessionStrategy::PerFile);

        let err = export_record(&pool, &source, &config).await.unwrap_err();

        assert!(matches!(err, RenderError::NavigationTimeout { secs: 1, .. }));
        assert_eq!(fake.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_pooled_session_is_replaced_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = html(&dir, "a.html");
        let second = html(&dir, "b.html");
        let (pool, fake, config) = setup(Mode::DiesAfterOnePage, SessionStrategy::Pooled);

        export_record(&pool, &first, &config).await.unwrap();
        assert_eq!(pool.idle_count(), 1);

        export_record(&pool, &second, &config).await.unwrap();
        assert_eq!(fake.launched.load(Ordering::SeqCst), 2);
        assert_eq!(fake.closed.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("b.pdf").exists());
    }
}
