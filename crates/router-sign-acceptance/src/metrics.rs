//! # Sign Acceptance Metrics
//!
//! Prometheus counters for the decisions this node sends and withholds.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! router-sign-acceptance = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `accept_agreed_total` - AGREE decisions submitted
//! - `accept_disagreed_total` - DISAGREE decisions submitted
//! - `accept_discarded_total` - Requests never answered (foreign or unanswerable)
//! - `accept_ignored_total` - Requests left for a later poll
//! - `accept_submit_failures_total` - Decisions the MPC network did not take
//! - `accept_already_in_progress_total` - Deliveries of a key another task holds
//!
//! Counters are registered in the default prometheus registry and are
//! process-wide. Per-service values come from `SignAcceptanceApi::stats`.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, IntCounter};

use crate::domain::{AcceptResult, ProcessOutcome};

#[cfg(feature = "metrics")]
lazy_static! {
    /// AGREE decisions submitted
    pub static ref AGREED: IntCounter = register_int_counter!(
        "accept_agreed_total",
        "Total number of AGREE decisions submitted"
    )
    .expect("Failed to create AGREED metric");

    /// DISAGREE decisions submitted
    pub static ref DISAGREED: IntCounter = register_int_counter!(
        "accept_disagreed_total",
        "Total number of DISAGREE decisions submitted"
    )
    .expect("Failed to create DISAGREED metric");

    /// Requests discarded without an answer
    pub static ref DISCARDED: IntCounter = register_int_counter!(
        "accept_discarded_total",
        "Total number of sign requests discarded without an answer"
    )
    .expect("Failed to create DISCARDED metric");

    /// Requests ignored until a later poll
    pub static ref IGNORED: IntCounter = register_int_counter!(
        "accept_ignored_total",
        "Total number of sign requests ignored for a later poll"
    )
    .expect("Failed to create IGNORED metric");

    /// Failed decision submissions
    pub static ref SUBMIT_FAILURES: IntCounter = register_int_counter!(
        "accept_submit_failures_total",
        "Total number of decision submissions that failed"
    )
    .expect("Failed to create SUBMIT_FAILURES metric");

    /// Requests skipped because the key was already held
    pub static ref ALREADY_IN_PROGRESS: IntCounter = register_int_counter!(
        "accept_already_in_progress_total",
        "Total number of sign requests skipped as already in progress"
    )
    .expect("Failed to create ALREADY_IN_PROGRESS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a submitted decision
#[cfg(feature = "metrics")]
pub fn record_submitted(result: AcceptResult) {
    match result {
        AcceptResult::Agree => AGREED.inc(),
        AcceptResult::Disagree => DISAGREED.inc(),
    }
}

/// Record a discarded request
#[cfg(feature = "metrics")]
pub fn record_discarded() {
    DISCARDED.inc();
}

/// Record an ignored request
#[cfg(feature = "metrics")]
pub fn record_ignored() {
    IGNORED.inc();
}

/// Record a failed submission
#[cfg(feature = "metrics")]
pub fn record_submit_failure() {
    SUBMIT_FAILURES.inc();
}

/// Record a request whose key was already held
#[cfg(feature = "metrics")]
pub fn record_already_in_progress() {
    ALREADY_IN_PROGRESS.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

/// Record a submitted decision
#[cfg(not(feature = "metrics"))]
pub fn record_submitted(_result: AcceptResult) {}

/// Record a discarded request
#[cfg(not(feature = "metrics"))]
pub fn record_discarded() {}

/// Record an ignored request
#[cfg(not(feature = "metrics"))]
pub fn record_ignored() {}

/// Record a failed submission
#[cfg(not(feature = "metrics"))]
pub fn record_submit_failure() {}

/// Record a request whose key was already held
#[cfg(not(feature = "metrics"))]
pub fn record_already_in_progress() {}

/// Record one request outcome on the matching counter.
pub fn record_outcome(outcome: &ProcessOutcome) {
    match outcome {
        ProcessOutcome::AlreadyInProgress => record_already_in_progress(),
        ProcessOutcome::Discarded => record_discarded(),
        ProcessOutcome::Ignored => record_ignored(),
        ProcessOutcome::SubmissionFailed => record_submit_failure(),
        ProcessOutcome::Submitted(decision) => record_submitted(decision.result),
    }
}
