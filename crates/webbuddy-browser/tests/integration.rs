//! Integration tests for webbuddy-browser
//!
//! These tests require Chrome/Chromium to be installed and are marked #[ignore]
//! by default. Run with: cargo test --package webbuddy-browser -- --ignored

use std::path::PathBuf;
use std::time::Duration;
use webbuddy_browser::{
    ConsoleCapture, ContextKind, ExtensionBrowser, LaunchConfig, ProbeServer,
    WaitConfig, extension_url, resolve_extension_id,
};

fn fixture_extension() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("extension")
}

fn launch_config(profile: &tempfile::TempDir) -> LaunchConfig {
    LaunchConfig::new(fixture_extension()).with_profile_dir(profile.path())
}

async fn launch(profile: &tempfile::TempDir) -> ExtensionBrowser {
    let browser = ExtensionBrowser::launch(launch_config(profile))
        .await
        .expect("failed to launch browser");
    // Service workers register shortly after startup
    tokio::time::sleep(Duration::from_millis(1500)).await;
    browser
}

#[test]
fn fixture_manifest_is_loadable() {
    let manifest = webbuddy_browser::ExtensionManifest::load(&fixture_extension())
        .expect("fixture manifest should parse");
    assert_eq!(manifest.popup_page(), Some("popup.html"));
    assert_eq!(manifest.first_content_script(), Some("content.js"));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_browser_launch_and_close() {
    let profile = tempfile::tempdir().unwrap();
    let browser = launch(&profile).await;

    assert!(!browser.is_closed().await, "Browser should not be closed");

    browser.close().await.expect("failed to close browser");
    assert!(browser.is_closed().await);

    // Closing twice is a no-op
    browser.close().await.expect("second close should succeed");
}

#[tokio::test]
#[ignore]
async fn test_service_worker_registers_and_resolves_id() {
    let profile = tempfile::tempdir().unwrap();
    let browser = launch(&profile).await;

    let contexts = browser.contexts().await.expect("failed to list targets");
    assert!(
        contexts
            .iter()
            .any(|c| c.kind == ContextKind::ServiceWorker && c.url.starts_with("chrome-extension://")),
        "expected an extension service worker, got {contexts:?}"
    );

    let id = resolve_extension_id(&browser).await.expect("id should resolve");
    assert_eq!(id.len(), 32);

    browser.close().await.expect("failed to close");
}

#[tokio::test]
#[ignore]
async fn test_content_script_marks_probe_page() {
    let profile = tempfile::tempdir().unwrap();
    let browser = launch(&profile).await;
    let server = ProbeServer::start().await.expect("failed to start server");

    let page = browser.new_page().await.expect("failed to create page");
    page.navigate(&server.url()).await.expect("failed to navigate");
    page.wait_for_load(WaitConfig::default())
        .await
        .expect("page never loaded");
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let injected: bool = page
        .evaluate("!!document.documentElement.getAttribute('data-web-buddy-injected')")
        .await
        .expect("failed to evaluate");
    assert!(injected, "content script marker missing");

    let heading: String = page
        .evaluate("document.getElementById('hello').textContent")
        .await
        .expect("failed to read heading");
    assert_eq!(heading, "Hello E2E");

    page.close().await.expect("failed to close page");
    server.stop().await;
    browser.close().await.expect("failed to close");
}

#[tokio::test]
#[ignore]
async fn test_external_message_round_trip() {
    let profile = tempfile::tempdir().unwrap();
    let browser = launch(&profile).await;
    let server = ProbeServer::start().await.expect("failed to start server");
    let id = resolve_extension_id(&browser).await.expect("id should resolve");

    let page = browser.new_page().await.expect("failed to create page");
    page.navigate(&server.url()).await.expect("failed to navigate");

    let script = format!(
        "new Promise((resolve) => chrome.runtime.sendMessage({id:?}, \
         {{operation: 'echo_test', payload: 'ping'}}, (r) => resolve(r === undefined ? null : r)))"
    );
    let reply = page
        .evaluate_async(&script, Duration::from_secs(5))
        .await
        .expect("message script failed")
        .expect("background should reply");
    assert_eq!(reply["payload"], "ping");

    server.stop().await;
    browser.close().await.expect("failed to close");
}

#[tokio::test]
#[ignore]
async fn test_popup_renders_record_control() {
    let profile = tempfile::tempdir().unwrap();
    let browser = launch(&profile).await;
    let id = resolve_extension_id(&browser).await.expect("id should resolve");

    let page = browser.new_page().await.expect("failed to create page");
    let capture = ConsoleCapture::new();
    page.subscribe(std::sync::Arc::new(capture.clone()))
        .await
        .expect("failed to subscribe");

    page.navigate(&extension_url(&id, "popup.html"))
        .await
        .expect("failed to open popup");
    assert!(page.has_selector("#record").await.expect("query failed"));
    assert!(!page.has_selector("#missing").await.expect("query failed"));
    assert_eq!(capture.error_count(), 0);

    browser.close().await.expect("failed to close");
}
