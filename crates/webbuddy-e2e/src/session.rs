//! The live session every check borrows.
//!
//! One [`ExtensionSession`] exists per run. It owns the browser, the probe
//! server and the shared probe tab, and is torn down exactly once by
//! [`Session::teardown`], which consumes it.

use crate::artifacts::ArtifactStore;
use crate::config::HarnessConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use webbuddy_browser::{
    ConsoleCapture, ExtensionBrowser, LogForwarder, Page, ProbeServer, WaitConfig,
    fallback_page_url,
};

/// What the sequencer needs from a session beyond what checks use.
#[async_trait]
pub trait Session: Send + Sync {
    /// Best-effort evidence capture after a check errored.
    async fn capture_error_artifacts(&self) {}

    /// Releases every resource. Must not fail; problems are logged.
    async fn teardown(self)
    where
        Self: Sized;
}

pub struct ExtensionSession {
    browser: ExtensionBrowser,
    probe: Option<ProbeServer>,
    probe_page: Mutex<Option<Arc<Page>>>,
    console: ConsoleCapture,
    artifacts: ArtifactStore,
    config: HarnessConfig,
}

impl ExtensionSession {
    /// Launches the browser and starts the probe server.
    ///
    /// A probe server that fails to start is not fatal: pages fall back to an
    /// inline document.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Setup` if the manifest is missing or invalid, or
    /// the browser does not launch.
    pub async fn setup(config: HarnessConfig) -> Result<Self> {
        let browser = ExtensionBrowser::launch(config.launch_config()).await?;

        let probe = match ProbeServer::start().await {
            Ok(server) => {
                info!(url = %server.url(), "probe server started");
                Some(server)
            }
            Err(e) => {
                warn!("failed to start local test server; falling back to data URL: {e}");
                None
            }
        };

        debug!(delay = ?config.settle(), "waiting for extension contexts to register");
        tokio::time::sleep(config.settle()).await;

        Ok(Self {
            browser,
            probe,
            probe_page: Mutex::new(None),
            console: ConsoleCapture::new(),
            artifacts: ArtifactStore::new(config.artifacts_dir.clone()),
            config,
        })
    }

    pub fn browser(&self) -> &ExtensionBrowser {
        &self.browser
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Console messages and page errors seen by every tab of this session.
    pub fn console(&self) -> &ConsoleCapture {
        &self.console
    }

    /// URL of the probe page: the server when running, else an inline copy.
    pub fn probe_url(&self) -> String {
        self.probe
            .as_ref()
            .map_or_else(fallback_page_url, ProbeServer::url)
    }

    /// Opens a tab whose console output and page errors are logged under
    /// `label` and captured for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab cannot be created.
    pub async fn open_page(&self, label: &str) -> webbuddy_browser::Result<Page> {
        let page = self.browser.new_page().await?;
        page.subscribe(Arc::new(LogForwarder::new(label))).await?;
        page.subscribe(Arc::new(self.console.clone())).await?;
        Ok(page)
    }

    /// Opens a fresh tab on the probe page, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab cannot be created or navigation fails.
    pub async fn fresh_probe_page(&self) -> webbuddy_browser::Result<Arc<Page>> {
        let page = self.open_page("probe").await?;
        page.navigate(&self.probe_url()).await?;

        let page = Arc::new(page);
        let previous = self.probe_page.lock().await.replace(page.clone());
        if let Some(previous) = previous {
            close_shared(previous).await;
        }
        Ok(page)
    }

    /// The current probe tab, opening one if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a new tab has to be opened and that fails.
    pub async fn probe_page(&self) -> webbuddy_browser::Result<Arc<Page>> {
        if let Some(page) = self.probe_page.lock().await.as_ref() {
            return Ok(page.clone());
        }
        self.fresh_probe_page().await
    }

    /// Saves a screenshot of `page` as an artifact. Never fails.
    pub async fn save_screenshot(&self, page: &Page, label: &str) {
        let png = match page.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!(%label, "screenshot capture failed: {e}");
                return;
            }
        };
        if let Err(e) = self.artifacts.write(label, &png).await {
            warn!(%label, "could not write screenshot artifact: {e}");
        }
    }

    /// Config timeout for navigations made by diagnostic probes.
    pub fn probe_wait(&self) -> WaitConfig {
        WaitConfig::with_timeout(self.config.probe_timeout())
    }
}

#[async_trait]
impl Session for ExtensionSession {
    async fn capture_error_artifacts(&self) {
        let shots = match self.browser.screenshot_all_pages().await {
            Ok(shots) => shots,
            Err(e) => {
                warn!("could not enumerate pages for error screenshots: {e}");
                return;
            }
        };
        for (i, png) in shots.iter().enumerate() {
            if let Err(e) = self.artifacts.write(&format!("error-page-{i}.png"), png).await {
                warn!("could not write error screenshot {i}: {e}");
            }
        }
    }

    async fn teardown(self) {
        let verbose = self.config.signals.debug;
        let step = |msg: &str| {
            if verbose {
                info!("finally: {msg}");
            } else {
                debug!("finally: {msg}");
            }
        };

        if let Some(page) = self.probe_page.lock().await.take() {
            close_shared(page).await;
        }

        step("closing browser context...");
        match self.browser.close().await {
            Ok(()) => step("context closed"),
            Err(e) if verbose => error!("finally: error closing context: {e}"),
            Err(e) => debug!("ignoring browser close error: {e}"),
        }

        if let Some(probe) = self.probe {
            step("closing local test server...");
            probe.stop().await;
            step("server closed");
        }
    }
}

async fn close_shared(page: Arc<Page>) {
    match Arc::try_unwrap(page) {
        Ok(page) => {
            if let Err(e) = page.close().await {
                debug!("ignoring page close error: {e}");
            }
        }
        Err(_still_shared) => debug!("probe page still borrowed; browser close will reap it"),
    }
}
