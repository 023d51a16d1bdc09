//! Error types for extension session operations.
//!
//! Setup failures (missing manifest, browser launch) are kept distinct from
//! the per-operation failures that checks run into, so callers can decide
//! which ones abort a run and which ones become a failing outcome.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for all session and page operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The extension root has no `manifest.json` at its top level.
    #[error("manifest.json not found in {root:?}; cannot load extension")]
    ManifestMissing {
        /// Extension root that was inspected
        root: PathBuf,
    },

    /// `manifest.json` exists but is not valid JSON.
    #[error("manifest.json at {path:?} is not valid JSON: {source}")]
    ManifestInvalid {
        /// Path to the manifest
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Failed to launch the browser process.
    ///
    /// This typically occurs when Chromium is not installed, or when the
    /// profile directory is locked by another running instance.
    #[error("failed to launch browser: {reason}")]
    LaunchFailed {
        /// Human-readable reason for the launch failure
        reason: String,
        /// Optional underlying error that caused the failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A DevTools protocol command failed.
    #[error("CDP connection failed: {0}")]
    ConnectionFailed(String),

    /// Navigation to a URL failed or timed out.
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed {
        /// The URL that failed to load
        url: String,
        /// Reason for the navigation failure
        reason: String,
    },

    /// A wait condition was not satisfied within the timeout.
    #[error("wait condition '{condition}' timed out after {timeout:?}")]
    WaitTimeout {
        /// Description of the condition that timed out
        condition: String,
        /// How long we waited before timing out
        timeout: Duration,
    },

    /// JavaScript execution in the page context failed.
    #[error("JavaScript execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// The probe server could not bind its loopback listener.
    #[error("probe server failed to start: {0}")]
    ServerStartFailed(#[source] std::io::Error),

    /// An operation was attempted on a closed browser instance.
    #[error("browser instance is already closed")]
    AlreadyClosed,

    /// Wraps errors from the chromiumoxide library.
    #[error("chromiumoxide error: {0}")]
    ChromiumOxide(#[from] chromiumoxide::error::CdpError),

    /// Generic I/O errors (profile directory, screenshots, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for browser operations.
pub type Result<T> = std::result::Result<T, BrowserError>;
