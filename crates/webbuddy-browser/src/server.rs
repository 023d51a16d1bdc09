//! Loopback HTTP responder for the synthetic probe page.
//!
//! Content scripts are not injected into `data:` documents, so the injection
//! check needs a real network origin. `ProbeServer` binds `127.0.0.1` on an
//! OS-assigned port and answers every request with [`PROBE_PAGE_HTML`].

use crate::error::{BrowserError, Result};
use axum::Router;
use axum::response::Html;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The fixed probe document: one heading and one button with stable ids.
pub const PROBE_PAGE_HTML: &str = r#"<html><body><h1 id="hello">Hello E2E</h1><button id="btn">Click</button></body></html>"#;

const STOP_GRACE: Duration = Duration::from_secs(2);

/// A running probe server.
///
/// Shared read-only by every page load during a run. Stop it explicitly with
/// [`ProbeServer::stop`]; dropping it aborts the serving task.
#[derive(Debug)]
pub struct ProbeServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ProbeServer {
    /// Binds an ephemeral loopback port and starts serving.
    ///
    /// # Errors
    ///
    /// Returns `ServerStartFailed` if the listener cannot be bound.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(BrowserError::ServerStartFailed)?;
        let addr = listener
            .local_addr()
            .map_err(BrowserError::ServerStartFailed)?;

        let app = Router::new().fallback(probe_page);
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        debug!(%addr, "probe server listening");

        Ok(Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Socket address the server is bound to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL of the probe page.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Stops the server and waits briefly for the serving task to finish.
    ///
    /// Never fails: problems are logged and swallowed.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let Some(task) = self.task.take() else {
            return;
        };

        match tokio::time::timeout(STOP_GRACE, task).await {
            Ok(Ok(Ok(()))) => debug!(addr = %self.addr, "probe server stopped"),
            Ok(Ok(Err(e))) => warn!("probe server exited with error: {e}"),
            Ok(Err(e)) => warn!("probe server task failed: {e}"),
            Err(_) => warn!("probe server did not stop within {STOP_GRACE:?}"),
        }
    }
}

impl Drop for ProbeServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn probe_page() -> Html<&'static str> {
    Html(PROBE_PAGE_HTML)
}

/// Inline `data:` URL carrying the probe page, used when the server is down.
#[must_use]
pub fn fallback_page_url() -> String {
    format!("data:text/html,{}", urlencoding::encode(PROBE_PAGE_HTML))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_url_is_percent_encoded() {
        let url = fallback_page_url();
        assert!(url.starts_with("data:text/html,"));
        assert!(!url.contains('<'));
        assert!(url.contains("Hello%20E2E"));
    }

    #[test]
    fn probe_page_has_stable_ids() {
        assert!(PROBE_PAGE_HTML.contains(r#"<h1 id="hello">"#));
        assert!(PROBE_PAGE_HTML.contains(r#"<button id="btn">"#));
    }

    #[tokio::test]
    async fn binds_loopback_on_ephemeral_port() {
        let first = ProbeServer::start().await.unwrap();
        let second = ProbeServer::start().await.unwrap();

        assert!(first.addr().ip().is_loopback());
        assert_ne!(first.addr().port(), 0);
        assert_ne!(first.addr().port(), second.addr().port());
        assert_eq!(first.url(), format!("http://127.0.0.1:{}/", first.addr().port()));

        first.stop().await;
        second.stop().await;
    }

    #[tokio::test]
    async fn serves_probe_page_on_any_path() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let server = ProbeServer::start().await.unwrap();
        let mut stream = tokio::net::TcpStream::connect(server.addr()).await.unwrap();
        stream
            .write_all(b"GET /some/deep/path HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.to_ascii_lowercase().contains("content-type: text/html"));
        assert!(response.ends_with(PROBE_PAGE_HTML));

        server.stop().await;
    }
}
