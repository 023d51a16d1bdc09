//! One harness run: setup, checks, teardown, result.

use crate::checks::{self, Sequencer};
use crate::config::HarnessConfig;
use crate::diagnostics;
use crate::outcome::{ExitStatus, RunResult};
use crate::session::{ExtensionSession, Session};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay before the debug-mode safety valve forces the process to exit.
pub const EXIT_VALVE_DELAY: Duration = Duration::from_secs(3);

/// Runs `sequencer` against `session`, then tears the session down.
///
/// Teardown happens exactly once, after the last check, however the checks
/// ended.
pub async fn drive<S: Session>(session: S, sequencer: &Sequencer<S>) -> RunResult {
    let outcomes = sequencer.run(&session).await;
    session.teardown().await;
    RunResult::from_outcomes(outcomes)
}

/// Sets up the extension session and runs every check.
///
/// A setup failure (missing manifest, browser launch) produces a crashed
/// result without launching anything further.
pub async fn run(config: HarnessConfig) -> RunResult {
    let session = match ExtensionSession::setup(config).await {
        Ok(session) => session,
        Err(e) => {
            error!("E2E harness error: {e}");
            return RunResult::crashed();
        }
    };

    if let Err(panic) = AssertUnwindSafe(diagnostics::probe_extension(&session))
        .catch_unwind()
        .await
    {
        warn!("diagnostic: extension probe panicked: {panic:?}");
    }

    drive(session, &checks::extension_checks()).await
}

/// Forces the process to exit with `status` after `delay` if it has not
/// exited on its own. Debug mode only: guards CI against a hung browser.
pub fn arm_exit_valve(status: ExitStatus, delay: Duration) {
    let spawned = std::thread::Builder::new()
        .name("exit-valve".into())
        .spawn(move || {
            std::thread::sleep(delay);
            info!("exiting process explicitly with code {}", status.code());
            std::process::exit(i32::from(status.code()));
        });
    if let Err(e) = spawned {
        warn!("could not arm exit safety valve: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::tests::{Behavior, FakeSession, Scripted};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session_with_counter() -> (FakeSession, Arc<AtomicUsize>) {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let session = FakeSession {
            teardowns: teardowns.clone(),
            ..FakeSession::default()
        };
        (session, teardowns)
    }

    #[tokio::test]
    async fn teardown_runs_once_when_all_pass() {
        let (session, teardowns) = session_with_counter();
        let sequencer = Sequencer::new()
            .with(Scripted("a", Behavior::Pass))
            .with(Scripted("b", Behavior::Pass));

        let result = drive(session, &sequencer).await;

        assert_eq!(result.status, ExitStatus::Success);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_runs_once_when_checks_throw() {
        let (session, teardowns) = session_with_counter();
        let sequencer = Sequencer::new()
            .with(Scripted("a", Behavior::Panic))
            .with(Scripted("b", Behavior::Error))
            .with(Scripted("c", Behavior::Pass));

        let result = drive(session, &sequencer).await;

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.status, ExitStatus::CheckFailure);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skipped_popup_does_not_fail_the_run() {
        let (session, _) = session_with_counter();
        let sequencer = Sequencer::new()
            .with(Scripted("background-pages", Behavior::Pass))
            .with(Scripted("content-injection", Behavior::Pass))
            .with(Scripted("runtime-sendMessage", Behavior::Pass))
            .with(Scripted("popup-load", Behavior::Skip))
            .with(Scripted("background-storage-ping", Behavior::Pass));

        let result = drive(session, &sequencer).await;

        assert_eq!(result.status, ExitStatus::Success);
        assert_eq!(result.outcomes[3].skip_reason.as_deref(), Some("no-extension-id"));
    }

    #[tokio::test]
    async fn missing_manifest_crashes_without_launching() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            extension_dir: dir.path().to_path_buf(),
            profile_dir: dir.path().join("profile"),
            artifacts_dir: dir.path().join("artifacts"),
            settle_ms: 0,
            ..HarnessConfig::default()
        };

        let result = run(config).await;

        assert_eq!(result.status, ExitStatus::HarnessCrash);
        assert!(result.outcomes.is_empty());
        assert!(!dir.path().join("profile").exists());
    }
}
