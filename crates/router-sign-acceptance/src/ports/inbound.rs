//! # Inbound Ports
//!
//! API trait defining what the sign-acceptance worker offers to the node
//! embedding it.

use crate::domain::{AcceptStats, ProcessOutcome, SignRequest};
use async_trait::async_trait;

/// Sign acceptance API - inbound port.
#[async_trait]
pub trait SignAcceptanceApi: Send + Sync {
    /// Verify one sign request and answer it according to the decision table.
    async fn process_sign_request(&self, request: SignRequest) -> ProcessOutcome;

    /// Verifier tasks currently admitted.
    fn in_flight(&self) -> usize;

    /// Decision counters.
    fn stats(&self) -> AcceptStats;
}
