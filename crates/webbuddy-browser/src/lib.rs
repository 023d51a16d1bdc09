//! # webbuddy-browser
//!
//! Chromium session control for exercising an unpacked browser extension.
//!
//! This crate launches Chromium over the DevTools protocol with one extension
//! loaded from disk, enumerates the extension's execution contexts, serves a
//! synthetic probe page over loopback HTTP, and wraps tabs with navigation,
//! evaluation, screenshot and event-subscription helpers.
//!
//! ## Architecture
//!
//! - **ExtensionBrowser**: launches a persistent profile with the extension
//!   loaded, lists background/service-worker contexts, closes exactly once
//! - **Page**: a tab with navigation, reload, script evaluation and
//!   page-scoped event observers
//! - **ConsoleCapture / LogForwarder**: observers for console output and
//!   uncaught page exceptions
//! - **ProbeServer**: loopback HTTP responder for the synthetic test page
//! - **identity**: extension identifier parsing and resolution
//! - **ExtensionManifest**: typed view over `manifest.json`
//!
//! ## Example Usage
//!
//! ```ignore
//! use webbuddy_browser::{ExtensionBrowser, LaunchConfig, ProbeServer, resolve_extension_id};
//!
//! let browser = ExtensionBrowser::launch(LaunchConfig::new(".")).await?;
//! let server = ProbeServer::start().await?;
//!
//! let page = browser.new_page().await?;
//! page.navigate(&server.url()).await?;
//! let injected: bool = page
//!     .evaluate("!!document.documentElement.getAttribute('data-web-buddy-injected')")
//!     .await?;
//!
//! let id = resolve_extension_id(&browser).await;
//!
//! server.stop().await;
//! browser.close().await?;
//! ```
//!
//! Tests that need a real Chromium are `#[ignore]`d; run them with
//! `cargo test -p webbuddy-browser -- --ignored`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod console;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod page;
pub mod server;
pub mod wait;

pub use browser::{ContextKind, ExecutionContext, ExtensionBrowser, LaunchConfig};
pub use console::{
    ConsoleCapture, ConsoleLevel, ConsoleMessage, LogForwarder, PageError, PageObserver,
};
pub use error::{BrowserError, Result};
pub use identity::{
    ExecutionContexts, extension_url, parse_identifier_from_url, resolve_extension_id,
};
pub use manifest::ExtensionManifest;
pub use page::Page;
pub use server::{PROBE_PAGE_HTML, ProbeServer, fallback_page_url};
pub use wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, WaitConfig};
