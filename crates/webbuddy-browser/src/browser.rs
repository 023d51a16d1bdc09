//! Browser lifecycle with one unpacked extension loaded.
//!
//! `ExtensionBrowser` launches Chromium against a persistent profile with the
//! extension root passed via `--load-extension`, exposes the extension's
//! background/service-worker contexts, and closes exactly once.
//!
//! # Resource Safety
//!
//! Dropping an unclosed `ExtensionBrowser` lets chromiumoxide kill the
//! process. Explicit [`ExtensionBrowser::close`] is preferred so shutdown
//! problems get logged.

use crate::error::{BrowserError, Result};
use crate::identity::ExecutionContexts;
use crate::manifest::ExtensionManifest;
use crate::page::Page;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::GetTargetsParams;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Kind of execution context reported by `Target.getTargets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Persistent (MV2) background page
    BackgroundPage,
    /// Service worker (MV3 background)
    ServiceWorker,
    /// Regular tab
    Page,
    /// Anything else (iframes, shared workers, browser target)
    Other,
}

impl From<&str> for ContextKind {
    fn from(kind: &str) -> Self {
        match kind {
            "background_page" => ContextKind::BackgroundPage,
            "service_worker" => ContextKind::ServiceWorker,
            "page" => ContextKind::Page,
            _ => ContextKind::Other,
        }
    }
}

/// A live execution context known to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Context kind
    pub kind: ContextKind,
    /// Document or script URL of the context
    pub url: String,
}

/// Launch options for a browser with one extension loaded.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Extension root; must contain `manifest.json`.
    pub extension_dir: PathBuf,

    /// Persistent profile directory, created if missing.
    pub profile_dir: PathBuf,

    /// Run without a visible window (default: true).
    pub headless: bool,

    /// Browser window size (default: 1280x800).
    pub window_size: (u32, u32),

    /// Chromium executable (None = auto-detect).
    pub chrome_path: Option<PathBuf>,

    /// Additional Chromium arguments.
    pub args: Vec<String>,
}

impl LaunchConfig {
    /// Headless defaults for the extension at `extension_dir`.
    pub fn new(extension_dir: impl Into<PathBuf>) -> Self {
        Self {
            extension_dir: extension_dir.into(),
            profile_dir: PathBuf::from(".e2e-profile"),
            headless: true,
            window_size: (1280, 800),
            chrome_path: None,
            args: Vec::new(),
        }
    }

    /// Uses `dir` as the persistent profile.
    #[must_use]
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = dir.into();
        self
    }

    /// Selects headless or headed mode.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Uses a specific Chromium executable.
    #[must_use]
    pub fn with_chrome_path(mut self, path: Option<PathBuf>) -> Self {
        self.chrome_path = path;
        self
    }

    /// Sets a custom window size.
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Arguments passed to Chromium in place of the driver's defaults.
    ///
    /// The driver's default list carries `--disable-extensions`, which would
    /// block the unpacked extension, so it is replaced wholesale.
    #[must_use]
    pub fn launch_args(&self, extension_dir: &Path) -> Vec<String> {
        let ext = extension_dir.display();
        let mut args = vec![
            format!("--disable-extensions-except={ext}"),
            format!("--load-extension={ext}"),
            // Containers rarely provide user namespaces or a GPU
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        args.extend(self.args.iter().cloned());
        args
    }

    #[allow(clippy::result_large_err)]
    fn to_browser_config(&self, extension_dir: &Path) -> Result<BrowserConfig> {
        let mut config = BrowserConfig::builder()
            .disable_default_args()
            .user_data_dir(&self.profile_dir)
            .window_size(self.window_size.0, self.window_size.1)
            .args(self.launch_args(extension_dir));

        // Only the new headless mode loads extensions
        config = if self.headless {
            config.new_headless_mode()
        } else {
            config.with_head()
        };

        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path);
        }

        config.build().map_err(|e| BrowserError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

/// A browser with the extension under test loaded.
pub struct ExtensionBrowser {
    inner: Arc<Mutex<Option<Browser>>>,
    handler: JoinHandle<()>,
    manifest: ExtensionManifest,
    extension_dir: PathBuf,
}

impl std::fmt::Debug for ExtensionBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionBrowser")
            .field("extension_dir", &self.extension_dir)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl ExtensionBrowser {
    /// Validates the extension root and launches the browser.
    ///
    /// The manifest is checked before anything is spawned, so a broken
    /// extension root never produces a half-started session.
    ///
    /// # Errors
    ///
    /// Returns `ManifestMissing`/`ManifestInvalid` for a bad extension root
    /// and `LaunchFailed` if Chromium does not start.
    pub async fn launch(config: LaunchConfig) -> Result<Self> {
        let manifest = ExtensionManifest::load(&config.extension_dir)?;

        // Chromium resolves --load-extension against its own cwd
        let extension_dir = std::fs::canonicalize(&config.extension_dir)?;
        tokio::fs::create_dir_all(&config.profile_dir).await?;

        info!(
            extension = %extension_dir.display(),
            name = manifest.name.as_deref().unwrap_or("<unnamed>"),
            manifest_version = manifest.manifest_version.unwrap_or_default(),
            headless = config.headless,
            "launching browser with unpacked extension"
        );

        let browser_config = config.to_browser_config(&extension_dir)?;
        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| BrowserError::LaunchFailed {
                    reason: "failed to launch Chromium process".to_string(),
                    source: Some(Box::new(e)),
                })?;

        // chromiumoxide only processes CDP traffic while the handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {e}");
                }
            }
        });

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(browser))),
            handler,
            manifest,
            extension_dir,
        })
    }

    /// The parsed manifest of the loaded extension.
    #[must_use]
    pub fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    /// Canonical path of the loaded extension root.
    #[must_use]
    pub fn extension_dir(&self) -> &Path {
        &self.extension_dir
    }

    /// Lists every live target the browser knows about.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` after [`ExtensionBrowser::close`], or a
    /// connection error if the command fails.
    pub async fn contexts(&self) -> Result<Vec<ExecutionContext>> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let response = browser
            .execute(GetTargetsParams::default())
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(response
            .result
            .target_infos
            .iter()
            .map(|target| ExecutionContext {
                kind: ContextKind::from(target.r#type.as_str()),
                url: target.url.clone(),
            })
            .collect())
    }

    async fn urls_of(&self, kind: ContextKind) -> Result<Vec<String>> {
        Ok(self
            .contexts()
            .await?
            .into_iter()
            .filter(|ctx| ctx.kind == kind)
            .map(|ctx| ctx.url)
            .collect())
    }

    /// Opens a new blank tab.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` if the browser has been closed.
    pub async fn new_page(&self) -> Result<Page> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(Page::new(page))
    }

    /// Screenshots every open tab, in tab order.
    ///
    /// Tabs that fail to capture are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab list cannot be fetched.
    pub async fn screenshot_all_pages(&self) -> Result<Vec<Vec<u8>>> {
        let pages = {
            let guard = self.inner.lock().await;
            let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;
            browser.pages().await?
        };

        let mut shots = Vec::with_capacity(pages.len());
        for page in pages {
            match page
                .screenshot(chromiumoxide::page::ScreenshotParams::default())
                .await
            {
                Ok(png) => shots.push(png),
                Err(e) => debug!("skipping tab screenshot: {e}"),
            }
        }
        Ok(shots)
    }

    /// Closes the browser and waits for the process to exit.
    ///
    /// Safe to call on a browser that already went away; the second call is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser refuses to close gracefully.
    pub async fn close(&self) -> Result<()> {
        let taken = self.inner.lock().await.take();

        let result = if let Some(mut browser) = taken {
            debug!("closing browser");
            let closed = browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()));
            if let Err(e) = browser.wait().await {
                warn!("browser process did not exit cleanly: {e}");
            }
            closed
        } else {
            Ok(())
        };

        self.handler.abort();
        result
    }

    /// Returns true if the browser has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

#[async_trait]
impl ExecutionContexts for ExtensionBrowser {
    async fn background_page_urls(&self) -> Result<Vec<String>> {
        self.urls_of(ContextKind::BackgroundPage).await
    }

    async fn service_worker_urls(&self) -> Result<Vec<String>> {
        self.urls_of(ContextKind::ServiceWorker).await
    }
}

impl Drop for ExtensionBrowser {
    fn drop(&mut self) {
        // chromiumoxide's Browser drop kills the process if close() never ran
        if let Ok(guard) = self.inner.try_lock() {
            if guard.is_some() {
                warn!("ExtensionBrowser dropped without close(); killing browser process");
            }
        }
        self.handler.abort();
    }
}
