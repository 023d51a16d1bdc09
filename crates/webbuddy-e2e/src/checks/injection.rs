use super::Check;
use crate::diagnostics;
use crate::outcome::CheckOutcome;
use crate::session::ExtensionSession;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};
use webbuddy_browser::WaitConfig;

const FIRST_LOAD_SETTLE: Duration = Duration::from_millis(1000);
const POST_RELOAD_SETTLE: Duration = Duration::from_millis(1500);

/// Confirms the content script ran by looking for its marker attribute on
/// `<html>`.
///
/// Content scripts live in an isolated world, so their globals are invisible
/// to page evaluation; only DOM mutations cross that boundary.
pub struct ContentInjection;

/// Expression that reads the marker attribute off the document root.
pub fn marker_script(attribute: &str) -> String {
    let attribute = serde_json::to_string(attribute).unwrap_or_else(|_| "\"\"".to_string());
    format!("!!document.documentElement.getAttribute({attribute})")
}

#[async_trait]
impl Check<ExtensionSession> for ContentInjection {
    fn name(&self) -> &'static str {
        "content-injection"
    }

    async fn run(&self, session: &ExtensionSession) -> anyhow::Result<Vec<CheckOutcome>> {
        let attribute = &session.config().injection_attribute;
        let page = session
            .fresh_probe_page()
            .await
            .context("opening probe page")?;

        diagnostics::probe_page(&page, attribute).await;

        sleep(FIRST_LOAD_SETTLE).await;
        page.wait_for_load(WaitConfig::default())
            .await
            .context("waiting for probe page load")?;
        sleep(FIRST_LOAD_SETTLE).await;

        // A content script can miss the very first navigation after launch
        if let Err(e) = page.reload().await {
            warn!("probe page reload failed: {e}");
        }
        sleep(POST_RELOAD_SETTLE).await;

        let injected: bool = page
            .evaluate(&marker_script(attribute))
            .await
            .context("reading injection marker")?;
        let payload = json!({ "injected": injected, "attribute": attribute });

        if injected {
            return Ok(vec![CheckOutcome::pass(self.name()).with_payload(payload)]);
        }

        session
            .save_screenshot(&page, "content-not-injected.png")
            .await;
        error!("content script not injected; screenshot saved");

        Ok(vec![
            CheckOutcome::fail(
                self.name(),
                format!("content script marker '{attribute}' not set on document root"),
            )
            .with_payload(payload),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_script_quotes_attribute() {
        assert_eq!(
            marker_script("data-web-buddy-injected"),
            r#"!!document.documentElement.getAttribute("data-web-buddy-injected")"#
        );
        assert_eq!(
            marker_script(r#"x")||("y"#),
            r#"!!document.documentElement.getAttribute("x\")||(\"y")"#
        );
    }
}
