//! Deciding whether a finished review passed.

use crate::core::status::DONE;
use crate::io::prompt::REVIEW_PASSED_SENTINEL;
use crate::io::sprint_status::SprintStatus;

/// Why a review counts as passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassSignal {
    /// The sprint status records the story as done.
    SprintStatus,
    /// The sprint status was unreadable; the agent printed the sentinel.
    Sentinel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Passed(PassSignal),
    NeedsWork,
}

impl ReviewOutcome {
    pub fn passed(self) -> bool {
        matches!(self, ReviewOutcome::Passed(_))
    }
}

/// Classify a review that exited successfully.
///
/// A readable sprint status is authoritative; stdout is only consulted when the
/// document is missing or malformed.
pub fn classify_review(
    status: Option<&SprintStatus>,
    story_id: &str,
    stdout: &str,
) -> ReviewOutcome {
    match status {
        Some(doc) if doc.status_of(story_id) == Some(DONE) => {
            ReviewOutcome::Passed(PassSignal::SprintStatus)
        }
        Some(_) => ReviewOutcome::NeedsWork,
        None if stdout.contains(REVIEW_PASSED_SENTINEL) => {
            ReviewOutcome::Passed(PassSignal::Sentinel)
        }
        None => ReviewOutcome::NeedsWork,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: &str) -> SprintStatus {
        SprintStatus::parse(&format!("development_status:\n  1-1-a: {status}\n")).expect("parse")
    }

    #[test]
    fn done_in_sprint_status_passes() {
        let outcome = classify_review(Some(&doc("done")), "1-1-a", "");
        assert_eq!(outcome, ReviewOutcome::Passed(PassSignal::SprintStatus));
    }

    #[test]
    fn readable_status_wins_over_sentinel() {
        let outcome = classify_review(Some(&doc("in-progress")), "1-1-a", "REVIEW_PASSED");
        assert_eq!(outcome, ReviewOutcome::NeedsWork);
    }

    #[test]
    fn sentinel_counts_only_without_status_document() {
        assert!(classify_review(None, "1-1-a", "all good\nREVIEW_PASSED\n").passed());
        assert!(!classify_review(None, "1-1-a", "found issues").passed());
    }
}
