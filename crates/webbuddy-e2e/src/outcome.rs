//! Check outcomes, run results and exit statuses.

use serde::Serialize;
use serde_json::Value;

/// Result of one check (or one facet of a multi-facet check).
///
/// An outcome with a skip reason never counts as a failure, whatever `ok`
/// says.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl CheckOutcome {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            payload: None,
            error: None,
            skip_reason: None,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            payload: None,
            error: Some(error.into()),
            skip_reason: None,
        }
    }

    /// A check whose precondition could not be established.
    pub fn skip(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            payload: None,
            error: None,
            skip_reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_failure(&self) -> bool {
        !self.ok && self.skip_reason.is_none()
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitStatus {
    /// Every check passed or was validly skipped.
    Success,
    /// At least one hard check failure.
    CheckFailure,
    /// The harness failed before results could be aggregated.
    HarnessCrash,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::CheckFailure => 2,
            ExitStatus::HarnessCrash => 3,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Final aggregate of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outcomes: Vec<CheckOutcome>,
    pub status: ExitStatus,
}

impl RunResult {
    /// Derives the status from the outcomes.
    pub fn from_outcomes(outcomes: Vec<CheckOutcome>) -> Self {
        let status = if outcomes.iter().any(CheckOutcome::is_failure) {
            ExitStatus::CheckFailure
        } else {
            ExitStatus::Success
        };
        Self { outcomes, status }
    }

    /// A run that crashed before producing outcomes.
    pub fn crashed() -> Self {
        Self {
            outcomes: Vec::new(),
            status: ExitStatus::HarnessCrash,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skip_is_never_a_failure() {
        let skipped = CheckOutcome::skip("popup-load", "no-extension-id");
        assert!(!skipped.ok);
        assert!(skipped.is_skipped());
        assert!(!skipped.is_failure());
        assert!(CheckOutcome::fail("content-injection", "marker missing").is_failure());
        assert!(!CheckOutcome::pass("background-pages").is_failure());
    }

    #[test]
    fn status_follows_hard_failures_only() {
        let passing = RunResult::from_outcomes(vec![
            CheckOutcome::pass("a"),
            CheckOutcome::skip("b", "no-extension-id"),
        ]);
        assert_eq!(passing.status, ExitStatus::Success);
        assert_eq!(passing.failures().count(), 0);

        let failing = RunResult::from_outcomes(vec![
            CheckOutcome::pass("a"),
            CheckOutcome::fail("b", "boom"),
        ]);
        assert_eq!(failing.status, ExitStatus::CheckFailure);
        assert_eq!(failing.failures().count(), 1);

        assert_eq!(RunResult::crashed().status, ExitStatus::HarnessCrash);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            ExitStatus::Success.code(),
            ExitStatus::CheckFailure.code(),
            ExitStatus::HarnessCrash.code(),
        ];
        assert_eq!(codes, [0, 2, 3]);
    }

    #[test]
    fn serializes_with_camel_case_and_omits_empty_fields() {
        let outcome = CheckOutcome::skip("popup-load", "no-extension-id");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "name": "popup-load", "ok": false, "skipReason": "no-extension-id" })
        );

        let with_payload = CheckOutcome::pass("runtime-sendMessage").with_payload(json!(null));
        assert_eq!(
            serde_json::to_value(&with_payload).unwrap(),
            json!({ "name": "runtime-sendMessage", "ok": true, "payload": null })
        );
    }
}
