//! Extension identifier discovery.
//!
//! Depending on the browser version and manifest version, the extension's
//! resident context shows up either as a persistent background page or as a
//! service worker. Resolution tries background pages first, then service
//! workers, and reports `None` when neither yields an extension URL.

use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// URL scheme of extension-scoped documents.
pub const EXTENSION_SCHEME: &str = "chrome-extension://";

/// Source of live extension execution context URLs.
#[async_trait]
pub trait ExecutionContexts: Send + Sync {
    /// URLs of live background pages.
    async fn background_page_urls(&self) -> Result<Vec<String>>;

    /// URLs of live service workers.
    async fn service_worker_urls(&self) -> Result<Vec<String>>;
}

/// Extracts the identifier from `chrome-extension://<id>/<path>`.
///
/// The identifier is one or more ASCII letters, digits, `_` or `-`, and must
/// be followed by a `/`.
#[must_use]
pub fn parse_identifier_from_url(url: &str) -> Option<String> {
    let rest = url.strip_prefix(EXTENSION_SCHEME)?;
    let (id, _path) = rest.split_once('/')?;

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    valid.then(|| id.to_string())
}

/// Builds an extension-scoped URL for a file inside the extension.
#[must_use]
pub fn extension_url(id: &str, path: &str) -> String {
    format!("{EXTENSION_SCHEME}{id}/{}", path.trim_start_matches('/'))
}

/// Resolves the running extension's identifier, or `None` if it cannot be
/// located.
///
/// Enumeration errors are treated like an empty source.
pub async fn resolve_extension_id(contexts: &dyn ExecutionContexts) -> Option<String> {
    let backgrounds = contexts.background_page_urls().await.unwrap_or_else(|e| {
        debug!("background page enumeration failed: {e}");
        Vec::new()
    });
    if let Some(url) = backgrounds.first() {
        if let Some(id) = parse_identifier_from_url(url) {
            info!(%id, source = "background_page", "resolved extension id");
            return Some(id);
        }
    }

    let workers = contexts.service_worker_urls().await.unwrap_or_else(|e| {
        debug!("service worker enumeration failed: {e}");
        Vec::new()
    });
    if let Some(url) = workers.first() {
        if let Some(id) = parse_identifier_from_url(url) {
            info!(%id, source = "service_worker", "resolved extension id");
            return Some(id);
        }
    }

    info!("could not resolve extension id from any execution context");
    None
}
