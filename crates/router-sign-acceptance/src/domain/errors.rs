//! # Domain Errors
//!
//! Error types for sign acceptance.
//!
//! Every verification failure is an [`AcceptError`] and belongs to exactly one
//! [`ErrorCategory`]. The responder only looks at the category, so adding a
//! variant forces a decision about how it is treated.

use super::value_objects::ChainId;
use thiserror::Error;

/// Classification of verification failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or foreign traffic (other bridges or routers). Never answered.
    ProtocolMismatch,
    /// Wrong initiator, wrong contract, unregistered chain, nonce conflict.
    ConfigMismatch,
    /// Source state not decidable yet (not stable, not found, RPC failure).
    UnresolvedState,
    /// The request is provably wrong. Always disagreed.
    VerificationFailure,
}

/// Errors produced while verifying a sign request.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// Message context is not exactly one valid build-args payload.
    #[error("wrong msg context: {0}")]
    WrongMsgContext(String),

    /// Request belongs to another bridge or router deployment.
    #[error("cross chain bridge identifier mismatch: expected {expected}, got {got}")]
    IdentifierMismatch {
        /// Identifier of this node
        expected: String,
        /// Identifier in the request
        got: String,
    },

    /// Request was not initiated by the configured MPC initiator.
    #[error("initiator mismatch: {0}")]
    InitiatorMismatch(String),

    /// No bridge registered for a chain id.
    #[error("no bridge for chain id {0}")]
    NoBridgeForChainId(ChainId),

    /// Source transaction called an unexpected contract.
    #[error("tx with wrong contract")]
    TxWithWrongContract,

    /// The nonce was already accepted for a different swap.
    #[error("accept record conflict: nonce {nonce} on chain {chain_id} already used by swap {existing}")]
    AcceptRecordConflict {
        /// Destination chain
        chain_id: ChainId,
        /// Destination nonce
        nonce: u64,
        /// Swap id holding the nonce
        existing: String,
    },

    /// Source transaction has not enough confirmations.
    #[error("tx not stable")]
    TxNotStable,

    /// Source transaction not found.
    #[error("tx not found")]
    TxNotFound,

    /// Source chain RPC query failed.
    #[error("rpc query error: {0}")]
    RpcQuery(String),

    /// Accept record store could not be queried.
    #[error("accept record store unavailable: {0}")]
    RecordStore(String),

    /// Swap type outside the known set.
    #[error("unknown router swap type {0}")]
    UnknownSwapType(u32),

    /// Source transaction verification failed for another reason.
    #[error("verify swap failed: {0}")]
    TxVerification(String),

    /// Destination raw transaction could not be built.
    #[error("build raw tx failed: {0}")]
    BuildRawTx(String),

    /// Requested hash differs from the locally rebuilt one.
    #[error("verify message hash failed: {0}")]
    MsgHashMismatch(String),
}

impl AcceptError {
    /// Category driving the responder decision.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::WrongMsgContext(_) | Self::IdentifierMismatch { .. } => {
                ErrorCategory::ProtocolMismatch
            }
            Self::InitiatorMismatch(_)
            | Self::NoBridgeForChainId(_)
            | Self::TxWithWrongContract
            | Self::AcceptRecordConflict { .. } => ErrorCategory::ConfigMismatch,
            Self::TxNotStable | Self::TxNotFound | Self::RpcQuery(_) | Self::RecordStore(_) => {
                ErrorCategory::UnresolvedState
            }
            Self::UnknownSwapType(_)
            | Self::TxVerification(_)
            | Self::BuildRawTx(_)
            | Self::MsgHashMismatch(_) => ErrorCategory::VerificationFailure,
        }
    }
}

/// Errors returned by chain bridge adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Transaction exists but is not confirmed enough.
    #[error("tx not stable")]
    TxNotStable,

    /// Transaction not found on chain.
    #[error("tx not found")]
    TxNotFound,

    /// Chain RPC failed.
    #[error("rpc query error: {0}")]
    RpcQuery(String),

    /// Transaction interacted with an unexpected contract.
    #[error("tx with wrong contract")]
    TxWithWrongContract,

    /// Message hash does not match the raw transaction.
    #[error("msg hash mismatch: {0}")]
    MsgHashMismatch(String),

    /// Bridge does not support the operation.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Any other bridge failure.
    #[error("{0}")]
    Other(String),
}

impl From<BridgeError> for AcceptError {
    /// Maps source-transaction verification errors.
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TxNotStable => Self::TxNotStable,
            BridgeError::TxNotFound => Self::TxNotFound,
            BridgeError::RpcQuery(msg) => Self::RpcQuery(msg),
            BridgeError::TxWithWrongContract => Self::TxWithWrongContract,
            other => Self::TxVerification(other.to_string()),
        }
    }
}

/// Errors returned by the MPC network client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MpcClientError {
    /// RPC call failed; `result` is whatever the node answered.
    #[error("mpc rpc call {method} failed: {message}")]
    Rpc {
        /// RPC method name
        method: String,
        /// Error message
        message: String,
        /// Raw RPC result text, if any
        result: Option<String>,
    },

    /// Node answered with something unparseable.
    #[error("invalid mpc response: {0}")]
    InvalidResponse(String),
}

impl MpcClientError {
    /// Raw RPC result text, if the node returned one.
    pub fn rpc_result(&self) -> Option<&str> {
        match self {
            Self::Rpc { result, .. } => result.as_deref(),
            Self::InvalidResponse(_) => None,
        }
    }
}

/// Errors returned by accept record stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordStoreError {
    /// Nonce already recorded for another swap.
    #[error("nonce {nonce} on chain {chain_id} already used by swap {existing}")]
    Conflict {
        /// Destination chain
        chain_id: ChainId,
        /// Destination nonce
        nonce: u64,
        /// Swap id holding the nonce
        existing: String,
    },

    /// Backend failure (I/O, encoding).
    #[error("record store backend error: {0}")]
    Backend(String),
}

impl From<RecordStoreError> for AcceptError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::Conflict {
                chain_id,
                nonce,
                existing,
            } => Self::AcceptRecordConflict {
                chain_id,
                nonce,
                existing,
            },
            RecordStoreError::Backend(msg) => Self::RecordStore(msg),
        }
    }
}
