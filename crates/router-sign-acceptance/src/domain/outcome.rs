//! Per-request outcomes and service statistics.

use super::entities::Decision;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to one sign request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another task holds (or already handled) the key.
    AlreadyInProgress,
    /// Never answered; key retained.
    Discarded,
    /// Not answered now; key released for a later poll.
    Ignored,
    /// Decision accepted by the MPC network; key retained.
    Submitted(Decision),
    /// Submission failed; key released for a later poll.
    SubmissionFailed,
}

/// Snapshot of decision counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AcceptStats {
    /// AGREE decisions submitted.
    pub agreed: u64,
    /// DISAGREE decisions submitted.
    pub disagreed: u64,
    /// Requests discarded without an answer.
    pub discarded: u64,
    /// Requests ignored for now.
    pub ignored: u64,
    /// Failed submissions.
    pub submit_failures: u64,
}

/// Live counters behind [`AcceptStats`].
#[derive(Debug, Default)]
pub struct StatsCounters {
    agreed: AtomicU64,
    disagreed: AtomicU64,
    discarded: AtomicU64,
    ignored: AtomicU64,
    submit_failures: AtomicU64,
}

impl StatsCounters {
    /// Count one outcome.
    pub fn record(&self, outcome: &ProcessOutcome) {
        let counter = match outcome {
            ProcessOutcome::AlreadyInProgress => return,
            ProcessOutcome::Discarded => &self.discarded,
            ProcessOutcome::Ignored => &self.ignored,
            ProcessOutcome::SubmissionFailed => &self.submit_failures,
            ProcessOutcome::Submitted(decision) => match decision.result {
                super::AcceptResult::Agree => &self.agreed,
                super::AcceptResult::Disagree => &self.disagreed,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> AcceptStats {
        AcceptStats {
            agreed: self.agreed.load(Ordering::Relaxed),
            disagreed: self.disagreed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let counters = StatsCounters::default();
        counters.record(&ProcessOutcome::Submitted(Decision::agree("a")));
        counters.record(&ProcessOutcome::Submitted(Decision::disagree("b", "bad")));
        counters.record(&ProcessOutcome::Discarded);
        counters.record(&ProcessOutcome::Ignored);
        counters.record(&ProcessOutcome::SubmissionFailed);
        counters.record(&ProcessOutcome::AlreadyInProgress);

        assert_eq!(
            counters.snapshot(),
            AcceptStats {
                agreed: 1,
                disagreed: 1,
                discarded: 1,
                ignored: 1,
                submit_failures: 1,
            }
        );
    }
}
