use super::Check;
use crate::outcome::CheckOutcome;
use crate::session::ExtensionSession;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};
use webbuddy_browser::{extension_url, resolve_extension_id};

/// Opens the popup page by URL and asserts its main control renders.
///
/// Skipped when the extension id cannot be resolved.
pub struct PopupLoad;

/// Skip reason recorded when no extension id is available.
pub const NO_EXTENSION_ID: &str = "no-extension-id";

/// Artifact label for a popup missing `selector`, e.g. `#record` gives
/// `popup-missing-record.png`.
pub fn missing_control_label(selector: &str) -> String {
    let slug: String = selector
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "popup-missing-control.png".to_string()
    } else {
        format!("popup-missing-{slug}.png")
    }
}

#[async_trait]
impl Check<ExtensionSession> for PopupLoad {
    fn name(&self) -> &'static str {
        "popup-load"
    }

    async fn run(&self, session: &ExtensionSession) -> anyhow::Result<Vec<CheckOutcome>> {
        let Some(id) = resolve_extension_id(session.browser()).await else {
            warn!("could not determine extension id; skipping popup checks");
            return Ok(vec![CheckOutcome::skip(self.name(), NO_EXTENSION_ID)]);
        };

        let config = session.config();
        let url = extension_url(&id, config.popup_page(session.browser().manifest()));
        let control = &config.popup_control;

        let popup = session.open_page("popup").await.context("opening popup tab")?;
        let found = async {
            popup.navigate(&url).await?;
            tokio::time::sleep(config.popup_init()).await;
            popup.has_selector(control).await
        }
        .await;

        if let Ok(false) = found {
            session
                .save_screenshot(&popup, &missing_control_label(control))
                .await;
            error!(%url, %control, "popup control missing; screenshot saved");
        }
        if let Err(e) = popup.close().await {
            debug!("ignoring popup close error: {e}");
        }

        let found = found.with_context(|| format!("loading popup {url}"))?;
        let payload = json!({ "url": url, "control": control });

        Ok(vec![if found {
            CheckOutcome::pass(self.name()).with_payload(payload)
        } else {
            CheckOutcome::fail(self.name(), format!("popup control '{control}' not found"))
                .with_payload(payload)
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_label_from_selector() {
        assert_eq!(missing_control_label("#record"), "popup-missing-record.png");
        assert_eq!(
            missing_control_label("button.start-now"),
            "popup-missing-button-start-now.png"
        );
        assert_eq!(missing_control_label("#"), "popup-missing-control.png");
    }
}
