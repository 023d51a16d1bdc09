use super::Check;
use crate::outcome::CheckOutcome;
use crate::session::ExtensionSession;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use webbuddy_browser::ExecutionContexts;

/// Counts the extension's background pages.
///
/// Zero is informational: MV3 extensions run a service worker instead of a
/// persistent page.
pub struct BackgroundPresence;

#[async_trait]
impl Check<ExtensionSession> for BackgroundPresence {
    fn name(&self) -> &'static str {
        "background-pages"
    }

    async fn run(&self, session: &ExtensionSession) -> anyhow::Result<Vec<CheckOutcome>> {
        let pages = session
            .browser()
            .background_page_urls()
            .await
            .context("listing background pages")?;

        info!(count = pages.len(), "background pages count");

        Ok(vec![
            CheckOutcome::pass(self.name()).with_payload(json!({
                "count": pages.len(),
                "urls": pages,
            })),
        ])
    }
}
