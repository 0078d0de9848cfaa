//! Per-unit outcomes and the aggregated transfer report
//!
//! Outcomes are appended in completion order as units settle; callers that
//! need deterministic ordering sort by destination with
//! [`TransferReport::sort_by_destination`].

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, ErrorKind};

/// Terminal state of one transfer unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Record of one settled transfer unit; immutable once created
#[derive(Debug, Serialize)]
pub struct TransferOutcome {
    pub source: String,
    pub destination: String,
    pub status: OutcomeStatus,
    pub bytes_transferred: u64,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub duration: Duration,
    /// False when no expected checksum was available and verification was
    /// skipped
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferOutcome {
    pub(crate) fn failure(
        source: String,
        destination: String,
        attempts: u32,
        duration: Duration,
        error: &Error,
    ) -> Self {
        Self {
            source,
            destination,
            // Cancelled units never ran to completion but did not fail
            // either; they settle as Skipped with the cancellation noted
            status: if matches!(error, Error::Cancelled) {
                OutcomeStatus::Skipped
            } else {
                OutcomeStatus::Failed
            },
            bytes_transferred: 0,
            attempts,
            duration,
            verified: false,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate result of one transfer invocation, always fully itemized so a
/// caller can retry just the failed subset
#[derive(Debug, Serialize)]
pub struct TransferReport {
    pub outcomes: Vec<TransferOutcome>,
    pub started_at: jiff::Timestamp,
    pub finished_at: jiff::Timestamp,
}

impl TransferReport {
    /// True only when every unit settled cleanly (Succeeded, or Skipped
    /// because the destination already matched)
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status != OutcomeStatus::Failed && o.error_kind.is_none())
    }

    pub fn succeeded(&self) -> usize {
        self.count(OutcomeStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes_transferred).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }

    /// Stable ordering for display and diffing
    pub fn sort_by_destination(&mut self) {
        self.outcomes.sort_by(|a, b| a.destination.cmp(&b.destination));
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transferred, {} skipped, {} failed ({})",
            self.succeeded(),
            self.skipped(),
            self.failed(),
            humansize::format_size(self.bytes_transferred(), humansize::BINARY)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(destination: &str, status: OutcomeStatus, bytes: u64) -> TransferOutcome {
        TransferOutcome {
            source: "libs/a".into(),
            destination: destination.into(),
            status,
            bytes_transferred: bytes,
            attempts: 1,
            duration: Duration::from_millis(5),
            verified: true,
            error_kind: None,
            error: None,
        }
    }

    fn report(outcomes: Vec<TransferOutcome>) -> TransferReport {
        let now = jiff::Timestamp::now();
        TransferReport {
            outcomes,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_success_requires_no_failures() {
        let ok = report(vec![
            outcome("out/a", OutcomeStatus::Succeeded, 10),
            outcome("out/b", OutcomeStatus::Skipped, 0),
        ]);
        assert!(ok.is_success());

        let mixed = report(vec![
            outcome("out/a", OutcomeStatus::Succeeded, 10),
            TransferOutcome::failure(
                "libs/b".into(),
                "out/b".into(),
                3,
                Duration::from_millis(1),
                &Error::transport("reset"),
            ),
        ]);
        assert!(!mixed.is_success());
        assert_eq!(mixed.failed(), 1);
        assert_eq!(mixed.failures().count(), 1);
    }

    #[test]
    fn test_cancelled_units_settle_as_skipped_but_not_success() {
        let cancelled = report(vec![TransferOutcome::failure(
            "libs/a".into(),
            "out/a".into(),
            1,
            Duration::ZERO,
            &Error::Cancelled,
        )]);
        assert_eq!(cancelled.skipped(), 1);
        assert_eq!(cancelled.failed(), 0);
        assert!(!cancelled.is_success());
    }

    #[test]
    fn test_sort_by_destination() {
        let mut r = report(vec![
            outcome("out/z", OutcomeStatus::Succeeded, 1),
            outcome("out/a", OutcomeStatus::Succeeded, 2),
        ]);
        r.sort_by_destination();
        assert_eq!(r.outcomes[0].destination, "out/a");
    }

    #[test]
    fn test_bytes_total_and_display() {
        let r = report(vec![
            outcome("out/a", OutcomeStatus::Succeeded, 1024),
            outcome("out/b", OutcomeStatus::Succeeded, 1024),
        ]);
        assert_eq!(r.bytes_transferred(), 2048);
        let line = r.to_string();
        assert!(line.contains("2 transferred"));
        assert!(line.contains("KiB"));
    }

    #[test]
    fn test_outcome_serializes_error_fields_only_when_present() {
        let ok = outcome("out/a", OutcomeStatus::Succeeded, 1);
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));

        let failed = TransferOutcome::failure(
            "libs/a".into(),
            "out/a".into(),
            2,
            Duration::from_millis(1),
            &Error::transport_terminal("403 Forbidden"),
        );
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"error_kind\":\"transport\""));
    }
}
