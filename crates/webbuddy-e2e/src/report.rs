//! Final summary of a run.
//!
//! Failures are printed as one line, `E2E FAILURES: <json array>`, so CI logs
//! can be grepped for it.

use crate::outcome::{ExitStatus, RunResult};
use tracing::info;

pub const FAILURE_PREFIX: &str = "E2E FAILURES:";

/// The one-line failure summary, or `None` when nothing hard-failed.
pub fn failure_summary(result: &RunResult) -> Option<String> {
    let failures: Vec<_> = result.failures().collect();
    if failures.is_empty() {
        return None;
    }
    let json = serde_json::to_string(&failures).unwrap_or_else(|e| format!("<unserializable: {e}>"));
    Some(format!("{FAILURE_PREFIX} {json}"))
}

/// Prints the outcome of a run to stdout/stderr.
pub fn print_report(result: &RunResult) {
    for outcome in &result.outcomes {
        let verdict = if outcome.ok {
            "pass"
        } else if outcome.is_skipped() {
            "skip"
        } else {
            "FAIL"
        };
        info!("{verdict:>4}  {}", outcome.name);
    }

    match result.status {
        ExitStatus::Success => {
            println!("E2E SUCCESS: all checks passed (or skipped when impossible)");
        }
        ExitStatus::CheckFailure => {
            if let Some(summary) = failure_summary(result) {
                eprintln!("{summary}");
            }
        }
        ExitStatus::HarnessCrash => {
            eprintln!("E2E HARNESS ERROR: run aborted before results were aggregated");
        }
    }
}
