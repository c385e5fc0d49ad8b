//! # Decision Table
//!
//! Maps a verification result and the tolerant-mode flag to what the node
//! does with the request. Kept free of I/O so the table can be tested alone.

use super::entities::Decision;
use super::errors::{AcceptError, ErrorCategory};

/// Maximum length (in characters) of a disagree reason sent to the network.
pub const MAX_REASON_CHARS: usize = 1000;

/// What to do with a verified (or failed) sign request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptAction {
    /// Send this decision to the MPC network.
    Respond(Decision),
    /// Never answer; keep the key cached as handled.
    Discard,
    /// Don't answer now; release the key so a later poll retries it.
    Ignore,
}

/// Decide how to answer a request.
///
/// | category            | strict   | tolerant |
/// |---------------------|----------|----------|
/// | ProtocolMismatch    | Discard  | Discard  |
/// | UnresolvedState     | DISAGREE | Ignore   |
/// | ConfigMismatch      | DISAGREE | Discard  |
/// | VerificationFailure | DISAGREE | DISAGREE |
/// | success             | AGREE    | AGREE    |
pub fn decide(key_id: &str, result: &Result<(), AcceptError>, tolerant: bool) -> AcceptAction {
    let err = match result {
        Ok(()) => return AcceptAction::Respond(Decision::agree(key_id)),
        Err(err) => err,
    };

    match (err.category(), tolerant) {
        (ErrorCategory::ProtocolMismatch, _) => AcceptAction::Discard,
        (ErrorCategory::UnresolvedState, true) => AcceptAction::Ignore,
        (ErrorCategory::ConfigMismatch, true) => AcceptAction::Discard,
        _ => AcceptAction::Respond(Decision::disagree(key_id, &err.to_string())),
    }
}

/// Truncate a reason to at most [`MAX_REASON_CHARS`] characters.
pub fn truncate_reason(reason: &str) -> String {
    match reason.char_indices().nth(MAX_REASON_CHARS) {
        Some((idx, _)) => reason[..idx].to_string(),
        None => reason.to_string(),
    }
}
