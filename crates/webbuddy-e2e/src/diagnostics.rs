//! Diagnostic probes.
//!
//! Probes only log. Every error they hit is logged and discarded, and
//! nothing here can change a check outcome.

use crate::session::ExtensionSession;
use tracing::{info, warn};
use webbuddy_browser::{
    ExecutionContexts, Page, extension_url, parse_identifier_from_url,
};

const SNIPPET_CHARS: usize = 500;

const BODY_TEXT: &str =
    "(document.documentElement && document.documentElement.innerText || '').slice(0, 2000)";

/// Logs the extension's contexts and, when its id can be inferred, fetches
/// the manifest and content script through the extension origin.
pub async fn probe_extension(session: &ExtensionSession) {
    let browser = session.browser();

    match browser.background_page_urls().await {
        Ok(urls) => {
            info!("diagnostic: backgroundPages count after wait {}", urls.len());
            for (i, url) in urls.iter().enumerate() {
                info!("diagnostic: bgpage {i} {url}");
            }
        }
        Err(e) => warn!("diagnostic: backgroundPages error: {e}"),
    }

    let workers = match browser.service_worker_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("diagnostic: serviceWorkers error: {e}");
            return;
        }
    };
    info!("diagnostic: serviceWorkers count after wait {}", workers.len());
    for (i, url) in workers.iter().enumerate() {
        info!("diagnostic: serviceWorker {i} {url}");
    }

    let Some(id) = workers.first().and_then(|url| parse_identifier_from_url(url)) else {
        return;
    };
    info!("diagnostic: inferred extension id {id}");

    let page = match session.open_page("diagnostic").await {
        Ok(page) => page,
        Err(e) => {
            warn!("diagnostic: debug fetch page failed: {e}");
            return;
        }
    };

    fetch_snippet(session, &page, &extension_url(&id, "manifest.json")).await;
    if let Some(script) = browser.manifest().first_content_script() {
        fetch_snippet(session, &page, &extension_url(&id, script)).await;
    }

    if let Err(e) = page.close().await {
        warn!("diagnostic: closing debug page failed: {e}");
    }
}

async fn fetch_snippet(session: &ExtensionSession, page: &Page, url: &str) {
    info!("diagnostic: trying to open {url}");
    if let Err(e) = page.navigate_with_timeout(url, session.probe_wait()).await {
        warn!("diagnostic: fetch of {url} failed: {e}");
    }

    match page.evaluate::<String>(BODY_TEXT).await {
        Ok(body) => info!("diagnostic: {url} snippet {}", snippet(&body)),
        Err(e) => warn!("diagnostic: reading {url} failed: {e}"),
    }
}

/// Logs the probe page's URL, user agent, `chrome` global and the initial
/// injection marker state.
pub async fn probe_page(page: &Page, attribute: &str) {
    match page.url().await {
        Ok(url) => info!("diagnostic: navigated to {url}"),
        Err(e) => warn!("diagnostic: page url error: {e}"),
    }
    match page.evaluate::<String>("navigator.userAgent").await {
        Ok(ua) => info!("diagnostic: page userAgent {ua}"),
        Err(e) => warn!("diagnostic: page eval error: {e}"),
    }
    match page.evaluate::<bool>("typeof chrome !== 'undefined'").await {
        Ok(has_chrome) => info!("diagnostic: page has chrome global? {has_chrome}"),
        Err(e) => warn!("diagnostic: page eval error: {e}"),
    }
    let marker = crate::checks::marker_script(attribute);
    match page.evaluate::<bool>(&marker).await {
        Ok(injected) => info!("diagnostic: {attribute} initial? {injected}"),
        Err(e) => warn!("diagnostic: page eval error: {e}"),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}
