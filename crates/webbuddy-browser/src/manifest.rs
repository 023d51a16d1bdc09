//! Typed view over the extension's `manifest.json`.
//!
//! Only the handful of fields the harness needs are modelled; everything
//! else in the manifest is ignored. The manifest must exist and parse before
//! a browser is ever launched.

use crate::error::{BrowserError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the manifest at the extension root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// The subset of `manifest.json` the harness reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionManifest {
    /// `manifest_version` (2 or 3)
    #[serde(default)]
    pub manifest_version: Option<u8>,

    /// Display name of the extension
    #[serde(default)]
    pub name: Option<String>,

    /// Extension version string
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    action: Option<ActionEntry>,

    #[serde(default)]
    browser_action: Option<ActionEntry>,

    #[serde(default)]
    content_scripts: Vec<ContentScriptEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ActionEntry {
    #[serde(default)]
    default_popup: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ContentScriptEntry {
    #[serde(default)]
    js: Vec<String>,
}

impl ExtensionManifest {
    /// Reads and parses `manifest.json` from the extension root.
    ///
    /// # Errors
    ///
    /// Returns `ManifestMissing` if the file does not exist at the top level
    /// of `root`, and `ManifestInvalid` if it is not valid JSON.
    pub fn load(root: &Path) -> Result<Self> {
        let path = manifest_path(root);
        if !path.is_file() {
            return Err(BrowserError::ManifestMissing {
                root: root.to_path_buf(),
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        Self::parse(&raw).map_err(|source| BrowserError::ManifestInvalid { path, source })
    }

    /// Parses manifest JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error if `raw` is not a JSON object.
    pub fn parse(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Popup page declared by the manifest, relative to the extension root.
    ///
    /// MV3 `action.default_popup` wins over MV2 `browser_action.default_popup`.
    #[must_use]
    pub fn popup_page(&self) -> Option<&str> {
        self.action
            .as_ref()
            .and_then(|a| a.default_popup.as_deref())
            .or_else(|| {
                self.browser_action
                    .as_ref()
                    .and_then(|a| a.default_popup.as_deref())
            })
            .map(|p| p.trim_start_matches('/'))
            .filter(|p| !p.is_empty())
    }

    /// First content script file of the first `content_scripts` entry.
    #[must_use]
    pub fn first_content_script(&self) -> Option<&str> {
        self.content_scripts
            .iter()
            .flat_map(|entry| entry.js.iter())
            .next()
            .map(|p| p.trim_start_matches('/'))
    }
}

/// Location of the manifest for an extension root.
#[must_use]
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}
