//! Harness configuration.
//!
//! Priority, lowest to highest: built-in defaults, `e2e.config.json` (or the
//! file given with `--config`), `E2E_*` environment variables, command-line
//! arguments. The mode signals `E2E_HEADED`, `E2E_DEBUG` and `DISPLAY` are
//! read separately into [`EnvSignals`].

use crate::error::{HarnessError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use webbuddy_browser::{ExtensionManifest, LaunchConfig};

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "e2e.config.json";

/// Popup page used when neither config nor manifest names one.
pub const DEFAULT_POPUP_PAGE: &str = "src/popup.html";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Extension root containing `manifest.json`.
    pub extension_dir: PathBuf,
    /// Chromium executable; auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    /// Persistent browser profile.
    pub profile_dir: PathBuf,
    /// Where screenshots and logs are written.
    pub artifacts_dir: PathBuf,
    /// Delay after launch for background contexts to register.
    pub settle_ms: u64,
    /// Popup page relative to the extension root; overrides the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup_path: Option<String>,
    /// Selector of the control the popup must render.
    pub popup_control: String,
    /// Attribute the content script sets on `<html>`.
    pub injection_attribute: String,
    pub message_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub popup_init_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    #[serde(skip)]
    pub signals: EnvSignals,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            extension_dir: PathBuf::from("."),
            chrome_path: None,
            profile_dir: PathBuf::from(".e2e-profile"),
            artifacts_dir: PathBuf::from("test").join("artifacts"),
            settle_ms: 2500,
            popup_path: None,
            popup_control: "#record".to_string(),
            injection_attribute: "data-web-buddy-injected".to_string(),
            message_timeout_ms: 5000,
            probe_timeout_ms: 3000,
            popup_init_ms: 800,
            window_width: 1280,
            window_height: 800,
            signals: EnvSignals::default(),
        }
    }
}

/// Values given on the command line; `None` leaves lower layers in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub extension_dir: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
}

impl HarnessConfig {
    /// Loads configuration from every layer.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if a layer has the wrong shape or an
    /// explicitly requested config file does not exist.
    pub fn load(overrides: &ConfigOverrides, signals: EnvSignals) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match &overrides.config_file {
            Some(path) if !path.is_file() => {
                return Err(HarnessError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => figment = figment.merge(Json::file(path)),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    figment = figment.merge(Json::file(default_path));
                }
            }
        }

        // E2E_HEADED and E2E_DEBUG are mode signals, not config values
        figment = figment.merge(Env::prefixed("E2E_").ignore(&["headed", "debug"]));

        if let Some(dir) = &overrides.extension_dir {
            figment = figment.merge(("extension_dir", dir));
        }
        if let Some(path) = &overrides.chrome_path {
            figment = figment.merge(("chrome_path", path));
        }

        let mut config: Self = figment
            .extract()
            .map_err(|e| HarnessError::Config(e.to_string()))?;
        config.signals = signals;
        Ok(config)
    }

    /// Launch options for the browser session.
    pub fn launch_config(&self) -> LaunchConfig {
        LaunchConfig::new(&self.extension_dir)
            .with_profile_dir(&self.profile_dir)
            .headless(!self.signals.should_run_headed())
            .with_chrome_path(self.chrome_path.clone())
            .with_window_size(self.window_width, self.window_height)
    }

    /// Popup page to open: explicit config, then manifest, then the default.
    pub fn popup_page<'a>(&'a self, manifest: &'a ExtensionManifest) -> &'a str {
        self.popup_path
            .as_deref()
            .or_else(|| manifest.popup_page())
            .unwrap_or(DEFAULT_POPUP_PAGE)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn popup_init(&self) -> Duration {
        Duration::from_millis(self.popup_init_ms)
    }
}

/// Mode switches taken from the process environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvSignals {
    /// `E2E_HEADED` is truthy.
    pub headed: bool,
    /// `E2E_DEBUG` is truthy.
    pub debug: bool,
    /// `DISPLAY` is set.
    pub display: bool,
}

impl EnvSignals {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            headed: lookup("E2E_HEADED").is_some_and(|v| is_truthy(&v)),
            debug: lookup("E2E_DEBUG").is_some_and(|v| is_truthy(&v)),
            display: lookup("DISPLAY").is_some_and(|v| !v.is_empty()),
        }
    }

    /// Headless unless forced headed or a display is available.
    pub fn should_run_headed(&self) -> bool {
        self.headed || self.display
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn signals(vars: &[(&str, &str)]) -> EnvSignals {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvSignals::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn headless_by_default() {
        assert!(!signals(&[]).should_run_headed());
    }

    #[test]
    fn headed_when_forced_or_display_present() {
        assert!(signals(&[("E2E_HEADED", "1")]).should_run_headed());
        assert!(signals(&[("DISPLAY", ":99")]).should_run_headed());
        assert!(!signals(&[("E2E_HEADED", "0")]).should_run_headed());
        assert!(!signals(&[("DISPLAY", "")]).should_run_headed());
    }

    #[test]
    fn truthiness() {
        for value in ["1", "true", "yes", "on", "anything"] {
            assert!(is_truthy(value), "{value} should be truthy");
        }
        for value in ["", "  ", "0", "false", "FALSE", "no", "off"] {
            assert!(!is_truthy(value), "{value:?} should be falsy");
        }
        assert!(signals(&[("E2E_DEBUG", "1")]).debug);
    }

    #[test]
    fn popup_page_precedence() {
        let manifest =
            ExtensionManifest::parse(r#"{ "action": { "default_popup": "popup/index.html" } }"#)
                .unwrap();
        let mut config = HarnessConfig::default();

        assert_eq!(config.popup_page(&ExtensionManifest::default()), DEFAULT_POPUP_PAGE);
        assert_eq!(config.popup_page(&manifest), "popup/index.html");

        config.popup_path = Some("custom.html".into());
        assert_eq!(config.popup_page(&manifest), "custom.html");
    }

    #[test]
    fn launch_config_follows_signals() {
        let mut config = HarnessConfig::default();
        assert!(config.launch_config().headless);

        config.signals = signals(&[("DISPLAY", ":0")]);
        assert!(!config.launch_config().headless);
    }

    #[test]
    #[serial]
    fn layers_merge_in_priority_order() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r##"{ "settle_ms": 100, "popup_control": "#start", "probe_timeout_ms": 10 }"##,
            )?;
            jail.set_env("E2E_PROBE_TIMEOUT_MS", "20");
            jail.set_env("E2E_HEADED", "1");

            let overrides = ConfigOverrides {
                extension_dir: Some(PathBuf::from("dist")),
                ..ConfigOverrides::default()
            };
            let config = HarnessConfig::load(&overrides, EnvSignals::default())
                .map_err(|e| e.to_string())?;

            assert_eq!(config.settle_ms, 100);
            assert_eq!(config.popup_control, "#start");
            assert_eq!(config.probe_timeout_ms, 20);
            assert_eq!(config.extension_dir, PathBuf::from("dist"));
            assert_eq!(config.message_timeout_ms, 5000);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn missing_explicit_config_file_is_an_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/definitely/not/here.json")),
            ..ConfigOverrides::default()
        };
        let err = HarnessConfig::load(&overrides, EnvSignals::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
