//! Page-level browser operations.
//!
//! `Page` wraps a chromiumoxide tab with navigation, reload, script
//! evaluation, screenshots and page-scoped event subscriptions. Subscriptions
//! end when the page is closed.

use crate::console::{PageObserver, parse_console_event, parse_exception_event};
use crate::error::{BrowserError, Result};
use crate::wait::{WaitConfig, poll_until};
use chromiumoxide::cdp::js_protocol::runtime::{
    EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::{Page as ChromePage, ScreenshotParams};
use futures::StreamExt;
use futures::stream;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum PageEvent {
    Console(crate::console::ConsoleMessage),
    Error(crate::console::PageError),
}

/// Event tasks of one page; aborted when the page goes away.
#[derive(Debug, Default)]
struct Subscriptions(Mutex<Vec<JoinHandle<()>>>);

impl Subscriptions {
    fn push(&self, task: JoinHandle<()>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(task);
    }

    fn cancel_all(&self) {
        for task in self.0.lock().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// A browser tab.
#[derive(Debug)]
pub struct Page {
    inner: Arc<ChromePage>,
    subscriptions: Subscriptions,
}

impl Page {
    pub(crate) fn new(page: ChromePage) -> Self {
        Self {
            inner: Arc::new(page),
            subscriptions: Subscriptions::default(),
        }
    }

    /// Delivers this page's console messages and uncaught exceptions to
    /// `observer` until the page is closed.
    ///
    /// Listeners are registered before this returns, so events raised by a
    /// subsequent navigation are not missed.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol listeners cannot be registered.
    pub async fn subscribe(&self, observer: Arc<dyn PageObserver>) -> Result<()> {
        let consoles = self
            .inner
            .event_listener::<EventConsoleApiCalled>()
            .await?
            .map(|event| PageEvent::Console(parse_console_event(&event)));
        let exceptions = self
            .inner
            .event_listener::<EventExceptionThrown>()
            .await?
            .map(|event| PageEvent::Error(parse_exception_event(&event)));

        let mut events = Box::pin(stream::select(consoles, exceptions));
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    PageEvent::Console(message) => observer.on_console(&message),
                    PageEvent::Error(error) => observer.on_page_error(&error),
                }
            }
        });

        self.subscriptions.push(task);
        Ok(())
    }

    /// Navigates to an absolute URL and waits for `document.readyState` to be
    /// `complete`.
    ///
    /// # Errors
    ///
    /// Returns `NavigationFailed` if the page fails to load, or `WaitTimeout`
    /// if it never finishes loading.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.navigate_with_timeout(url, WaitConfig::default()).await
    }

    /// Like [`Page::navigate`], bounding both the navigation and the load
    /// wait by `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns `NavigationFailed` on navigation errors or when the navigation
    /// itself exceeds the timeout.
    pub async fn navigate_with_timeout(&self, url: &str, config: WaitConfig) -> Result<()> {
        let navigation = tokio::time::timeout(config.timeout, self.inner.goto(url)).await;
        match navigation {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(BrowserError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(BrowserError::NavigationFailed {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", config.timeout),
                });
            }
        }

        self.wait_for_load(config).await
    }

    /// Reloads the current document and waits for it to load again.
    ///
    /// # Errors
    ///
    /// Returns an error if the reload command fails or the load wait times out.
    pub async fn reload(&self) -> Result<()> {
        self.inner.reload().await?;
        self.wait_for_load(WaitConfig::default()).await
    }

    /// Waits until `document.readyState` is `complete`.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the document does not finish loading in time.
    pub async fn wait_for_load(&self, config: WaitConfig) -> Result<()> {
        poll_until(
            || {
                let page = self.inner.clone();
                async move {
                    let result = page
                        .evaluate("document.readyState")
                        .await
                        .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

                    Ok(result
                        .value()
                        .and_then(serde_json::Value::as_str)
                        .is_some_and(|state| state == "complete"))
                }
            },
            config,
            "document ready",
        )
        .await
    }

    /// Evaluates an expression in the page's main world and deserializes the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns `ScriptExecutionFailed` if evaluation throws or the result does
    /// not deserialize into `T`.
    pub async fn evaluate<T>(&self, script: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Evaluates an expression, awaiting it if it yields a promise, and
    /// returns the raw JSON value. `undefined` comes back as `None`.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the promise does not settle within `timeout`,
    /// and `ScriptExecutionFailed` if evaluation throws.
    pub async fn evaluate_async(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<Option<serde_json::Value>> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::ScriptExecutionFailed)?;

        let result = tokio::time::timeout(timeout, self.inner.evaluate_expression(params))
            .await
            .map_err(|_| BrowserError::WaitTimeout {
                condition: "script promise to settle".to_string(),
                timeout,
            })?
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        Ok(result.value().cloned())
    }

    /// Returns true if `selector` currently matches an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be evaluated.
    pub async fn has_selector(&self, selector: &str) -> Result<bool> {
        // JSON string literals are valid JavaScript string literals
        let escaped = serde_json::to_string(selector)
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        self.evaluate(&format!("document.querySelector({escaped}) !== null"))
            .await
    }

    /// Returns the current page URL.
    ///
    /// # Errors
    ///
    /// Returns an error if script execution fails.
    pub async fn url(&self) -> Result<String> {
        self.evaluate("window.location.href").await
    }

    /// Captures a full-page PNG screenshot.
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.inner
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Captures a screenshot and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if capture or the file write fails.
    pub async fn save_screenshot(&self, path: &Path) -> Result<()> {
        let png = self.screenshot().await?;
        tokio::fs::write(path, png).await?;
        debug!(path = %path.display(), "screenshot saved");
        Ok(())
    }

    /// Ends all subscriptions and closes the tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the close command fails.
    pub async fn close(self) -> Result<()> {
        self.subscriptions.cancel_all();

        match Arc::try_unwrap(self.inner) {
            Ok(page) => {
                page.close().await?;
                Ok(())
            }
            Err(_shared) => {
                warn!("page still shared at close; leaving it to browser shutdown");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn selector_escaping_produces_js_string_literal() {
        for (input, expected) in [
            ("#record", r##""#record""##),
            ("a[data-x='1']", r#""a[data-x='1']""#),
            ("\"); alert(1); (\"", r#""\"); alert(1); (\"""#),
        ] {
            assert_eq!(serde_json::to_string(input).unwrap(), expected);
        }
    }
}
