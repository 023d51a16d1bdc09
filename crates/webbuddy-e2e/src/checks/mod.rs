//! The ordered checks and the sequencer that runs them.
//!
//! Checks run one after another against the same session. Each contributes
//! at least one outcome; an error or panic inside a check becomes a failing
//! outcome for that check and the sequence carries on.

mod background;
mod injection;
mod messaging;
mod popup;

pub use background::BackgroundPresence;
pub use injection::{ContentInjection, marker_script};
pub use messaging::{MessageReply, RuntimeMessage, StoragePing, classify_reply, message_script};
pub use popup::PopupLoad;

use crate::outcome::CheckOutcome;
use crate::session::{ExtensionSession, Session};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

#[async_trait]
pub trait Check<S: Session>: Send + Sync {
    /// Outcome name; unique within a run.
    fn name(&self) -> &'static str;

    async fn run(&self, session: &S) -> anyhow::Result<Vec<CheckOutcome>>;
}

pub struct Sequencer<S: Session> {
    checks: Vec<Box<dyn Check<S>>>,
}

impl<S: Session> Default for Sequencer<S> {
    fn default() -> Self {
        Self { checks: Vec::new() }
    }
}

impl<S: Session> Sequencer<S> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, check: impl Check<S> + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Runs every check in order and collects their outcomes.
    pub async fn run(&self, session: &S) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let name = check.name();
            info!(check = name, "running check");

            let result = AssertUnwindSafe(check.run(session)).catch_unwind().await;
            let produced = match result {
                Ok(Ok(produced)) if produced.is_empty() => {
                    vec![CheckOutcome::fail(name, "check produced no outcome")]
                }
                Ok(Ok(produced)) => produced,
                Ok(Err(e)) => {
                    error!(check = name, "check errored: {e:#}");
                    session.capture_error_artifacts().await;
                    vec![CheckOutcome::fail(name, format!("{e:#}"))]
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(check = name, "check panicked: {message}");
                    session.capture_error_artifacts().await;
                    vec![CheckOutcome::fail(name, format!("panic: {message}"))]
                }
            };

            for outcome in &produced {
                if outcome.ok {
                    info!(check = %outcome.name, "pass");
                } else if let Some(reason) = &outcome.skip_reason {
                    warn!(check = %outcome.name, %reason, "skip");
                } else {
                    error!(
                        check = %outcome.name,
                        error = outcome.error.as_deref().unwrap_or(""),
                        "fail"
                    );
                }
            }
            outcomes.extend(produced);
        }

        outcomes
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The extension checks, in their required order.
pub fn extension_checks() -> Sequencer<ExtensionSession> {
    Sequencer::new()
        .with(BackgroundPresence)
        .with(ContentInjection)
        .with(RuntimeMessage)
        .with(PopupLoad)
        .with(StoragePing)
}
