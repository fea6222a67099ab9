//! Headless Chrome/Chromium over the DevTools protocol.
//!
//! ## Readiness
//!
//! Chrome reports page lifecycle events (`load`, `networkAlmostIdle`,
//! `networkIdle`, …) per frame and per loader. We subscribe before issuing
//! `Page.navigate`, then wait for the event named by the configured
//! [`LoadCondition`] on the main frame's new loader. Subscribing first
//! means an event that fires while the navigate command is still in flight
//! is buffered rather than lost.
//!
//! ## Profiles
//!
//! Every session gets its own throwaway user-data directory. Two Chrome
//! processes sharing a profile fight over its lock file, which would make
//! concurrent sessions fail at random.

use super::{BrowserLauncher, BrowserSession, RenderPage};
use crate::config::LoadCondition;
use crate::error::BrowserError;
use crate::options::PrintLayout;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// How to start Chrome.
#[derive(Debug, Clone)]
pub struct ChromeSettings {
    /// Chrome/Chromium binary. `None` lets chromiumoxide search the usual
    /// install locations and `CHROME`.
    pub executable: Option<PathBuf>,
    /// Run with the Chrome sandbox. Default: true. Containers running as root
    /// usually need this off.
    pub sandbox: bool,
    /// Extra command-line switches passed verbatim.
    pub args: Vec<String>,
    /// How long to wait for the DevTools endpoint after spawning. Default: 20.
    pub launch_timeout_secs: u64,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: true,
            args: Vec::new(),
            launch_timeout_secs: 20,
        }
    }
}

/// Launches one headless Chrome process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    settings: ChromeSettings,
}

impl ChromeLauncher {
    pub fn new(settings: ChromeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ChromeSettings {
        &self.settings
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .launch_timeout(Duration::from_secs(self.settings.launch_timeout_secs));
        if let Some(ref exe) = self.settings.executable {
            builder = builder.chrome_executable(exe);
        }
        if !self.settings.sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &self.settings.args {
            builder = builder.arg(arg.clone());
        }
        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let profile = tempfile::Builder::new()
            .prefix("sitepdf-profile-")
            .tempdir()
            .map_err(|e| BrowserError::Launch(format!("cannot create profile dir: {e}")))?;
        let config = self.browser_config(profile.path())?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The handler drives the DevTools websocket; nothing happens unless
        // it is polled.
        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools connection ended: {}", e);
                    break;
                }
            }
        });

        debug!("Launched Chrome (profile {})", profile.path().display());
        Ok(Box::new(ChromeSession {
            browser,
            driver,
            _profile: profile,
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    driver: JoinHandle<()>,
    // Removed on drop, after the browser is gone.
    _profile: TempDir,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let mut session = *self;
        let closed = session
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Close(e.to_string()));
        // Without a clean Browser.close, `wait` could block on a live process.
        if closed.is_err() {
            if let Some(Err(e)) = session.browser.kill().await {
                warn!("Failed to kill Chrome: {}", e);
            }
        }
        if let Err(e) = session.browser.wait().await {
            warn!("Chrome did not exit cleanly: {}", e);
        }
        session.driver.abort();
        closed
    }
}

struct ChromePage {
    page: Page,
}

fn navigation(e: CdpError) -> BrowserError {
    BrowserError::Navigation(e.to_string())
}

#[async_trait]
impl RenderPage for ChromePage {
    async fn load(&mut self, url: &Url, wait_until: LoadCondition) -> Result<(), BrowserError> {
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(navigation)?;
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(navigation)?;

        let navigated = self
            .page
            .execute(NavigateParams::new(url.as_str()))
            .await
            .map_err(navigation)?;
        if let Some(ref text) = navigated.result.error_text {
            return Err(BrowserError::Navigation(format!("{url}: {text}")));
        }
        let frame = navigated.result.frame_id.clone();
        let loader = navigated.result.loader_id.clone();
        let wanted = wait_until.lifecycle_event();

        while let Some(event) = events.next().await {
            if event.frame_id != frame {
                continue;
            }
            // Same-document navigations have no loader id of their own.
            if let Some(ref id) = loader {
                if event.loader_id != *id {
                    continue;
                }
            }
            if event.name == wanted {
                debug!("{} reached {}", url, wanted);
                return Ok(());
            }
        }

        Err(BrowserError::Navigation(format!(
            "{url}: page closed before reaching {wanted}"
        )))
    }

    async fn print_pdf(&mut self, layout: &PrintLayout) -> Result<Vec<u8>, BrowserError> {
        self.page
            .pdf(print_params(layout))
            .await
            .map_err(|e| BrowserError::Print(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromePage { page } = *self;
        page.close()
            .await
            .map_err(|e| BrowserError::Close(e.to_string()))
    }
}

/// Map a resolved layout onto `Page.printToPDF` parameters.
pub(crate) fn print_params(layout: &PrintLayout) -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(layout.landscape),
        print_background: Some(layout.print_background),
        scale: Some(layout.scale),
        paper_width: Some(layout.paper_width),
        paper_height: Some(layout.paper_height),
        margin_top: Some(layout.margin_top),
        margin_bottom: Some(layout.margin_bottom),
        margin_left: Some(layout.margin_left),
        margin_right: Some(layout.margin_right),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}
