//! # Outbound Ports
//!
//! Traits for external dependencies: the MPC network client, chain bridges,
//! the bridge registry and the accept record store.

use crate::domain::{
    AcceptResult, BridgeError, BuildTxArgs, ChainId, MpcClientError, RawTx, RecordStoreError,
    SignRequest, SwapInfo, VerifyArgs,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;

/// MPC network client - outbound port.
#[async_trait]
pub trait MpcClient: Send + Sync {
    /// Pending sign requests for this node not older than `max_age_secs`.
    ///
    /// Entries may be `None` when the MPC node returns partial data.
    async fn pending_sign_requests(
        &self,
        max_age_secs: u64,
    ) -> Result<Vec<Option<SignRequest>>, MpcClientError>;

    /// Submit this node's decision. Returns the raw RPC result text.
    async fn submit_decision(
        &self,
        key_id: &str,
        result: AcceptResult,
        msg_hash: &[String],
        reasons: &[String],
    ) -> Result<String, MpcClientError>;
}

/// Chain bridge - outbound port.
///
/// One implementation per chain family. Retry and backoff against chain RPC
/// are the bridge's business.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Router MPC address on this chain (sender of destination transactions).
    fn router_mpc(&self) -> String;

    /// Verify a source swap transaction and extract its swap data.
    async fn verify_transaction(
        &self,
        swap_id: &str,
        args: &VerifyArgs,
    ) -> Result<SwapInfo, BridgeError>;

    /// Build the destination raw transaction for these args.
    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, BridgeError>;

    /// Check that `msg_hash` is exactly the signing hash of `raw_tx`.
    fn verify_msg_hash(&self, raw_tx: &RawTx, msg_hash: &[String]) -> Result<(), BridgeError>;

    /// Optional capability mapping a ceremony key to its signed tx hash.
    fn signed_tx_hash_source(&self) -> Option<&dyn SignedTxHashSource> {
        None
    }
}

/// Bridges that can tell the hash of the transaction signed by a ceremony.
#[async_trait]
pub trait SignedTxHashSource: Send + Sync {
    /// Hash of `raw_tx` once signed by ceremony `key_id`.
    async fn signed_tx_hash_for_key(
        &self,
        key_id: &str,
        raw_tx: &RawTx,
    ) -> Result<String, BridgeError>;
}

/// Bridge registry - outbound port.
pub trait BridgeRegistry: Send + Sync {
    /// Bridge serving `chain_id`, if any.
    fn bridge(&self, chain_id: &ChainId) -> Option<Arc<dyn Bridge>>;
}

/// Accept record store - outbound port.
///
/// Remembers which swap each destination nonce was accepted for, so a nonce
/// is never co-signed for two different swaps, including across restarts.
#[async_trait]
pub trait AcceptRecordStore: Send + Sync {
    /// Fails if the nonce of `args` is recorded for a different swap.
    async fn check_accept_record(&self, args: &BuildTxArgs) -> Result<(), RecordStoreError>;

    /// Record that `args` was accepted with destination tx hash `swap_tx`.
    async fn add_accept_record(
        &self,
        args: &BuildTxArgs,
        swap_tx: &str,
    ) -> Result<(), RecordStoreError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Hex SHA-256 of a raw transaction, as the mock bridge signs it.
pub fn mock_msg_hash(raw_tx: &RawTx) -> String {
    format!("0x{}", hex::encode(Sha256::digest(raw_tx.as_bytes())))
}

/// Mock bridge for testing.
///
/// Raw transactions are the JSON encoding of the destination build args and
/// the signing hash is their SHA-256.
pub struct MockBridge {
    /// Router MPC address.
    pub router_mpc: String,
    /// Result of source verification.
    pub verify_result: Mutex<Result<SwapInfo, BridgeError>>,
    /// Make raw transaction building fail.
    pub build_error: Mutex<Option<BridgeError>>,
    /// Expose the signed tx hash capability.
    pub signed_tx_hash: bool,
    /// Verify args seen by `verify_transaction`.
    pub seen_verify_args: Mutex<Vec<VerifyArgs>>,
}

impl MockBridge {
    /// Mock bridge whose source verification succeeds with `swap_info`.
    pub fn new(router_mpc: impl Into<String>, swap_info: SwapInfo) -> Self {
        Self {
            router_mpc: router_mpc.into(),
            verify_result: Mutex::new(Ok(swap_info)),
            build_error: Mutex::new(None),
            signed_tx_hash: false,
            seen_verify_args: Mutex::new(Vec::new()),
        }
    }

    /// Enable the signed tx hash capability.
    pub fn with_signed_tx_hash(mut self) -> Self {
        self.signed_tx_hash = true;
        self
    }

    /// Make source verification fail with `err`.
    pub fn fail_verify(&self, err: BridgeError) {
        *self.verify_result.lock() = Err(err);
    }

    /// Raw transaction this bridge builds for `args`.
    pub fn encode(args: &BuildTxArgs) -> RawTx {
        RawTx(serde_json::to_vec(args).unwrap_or_default())
    }

    /// Message hash a destination mock bridge (with `router_mpc`) expects
    /// for swap `args` verified by a source mock bridge returning `swap_info`.
    pub fn expected_msg_hash(router_mpc: &str, swap_info: &SwapInfo, args: &BuildTxArgs) -> String {
        let dst = args.for_destination(router_mpc.to_string(), swap_info);
        mock_msg_hash(&Self::encode(&dst))
    }
}

#[async_trait]
impl Bridge for MockBridge {
    fn router_mpc(&self) -> String {
        self.router_mpc.clone()
    }

    async fn verify_transaction(
        &self,
        _swap_id: &str,
        args: &VerifyArgs,
    ) -> Result<SwapInfo, BridgeError> {
        self.seen_verify_args.lock().push(args.clone());
        self.verify_result.lock().clone()
    }

    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, BridgeError> {
        if let Some(err) = self.build_error.lock().clone() {
            return Err(err);
        }
        Ok(Self::encode(args))
    }

    fn verify_msg_hash(&self, raw_tx: &RawTx, msg_hash: &[String]) -> Result<(), BridgeError> {
        let expected = mock_msg_hash(raw_tx);
        match msg_hash {
            [single] if single.eq_ignore_ascii_case(&expected) => Ok(()),
            _ => Err(BridgeError::MsgHashMismatch(format!(
                "expected [{}], got {:?}",
                expected, msg_hash
            ))),
        }
    }

    fn signed_tx_hash_source(&self) -> Option<&dyn SignedTxHashSource> {
        if self.signed_tx_hash {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl SignedTxHashSource for MockBridge {
    async fn signed_tx_hash_for_key(
        &self,
        key_id: &str,
        raw_tx: &RawTx,
    ) -> Result<String, BridgeError> {
        let mut hasher = Sha256::new();
        hasher.update(key_id.as_bytes());
        hasher.update(raw_tx.as_bytes());
        Ok(format!("0x{}", hex::encode(hasher.finalize())))
    }
}

/// Decision recorded by [`MockMpcClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedDecision {
    /// Ceremony id.
    pub key_id: String,
    /// AGREE or DISAGREE.
    pub result: AcceptResult,
    /// Hashes echoed back.
    pub msg_hash: Vec<String>,
    /// Disagree reasons.
    pub reasons: Vec<String>,
}

/// Mock MPC client for testing.
#[derive(Default)]
pub struct MockMpcClient {
    /// Returned by every poll.
    pub pending: Mutex<Vec<Option<SignRequest>>>,
    /// Queued poll failures, consumed before `pending` is returned.
    pub poll_failures: Mutex<VecDeque<MpcClientError>>,
    /// Queued submit failures, consumed one per submission.
    pub submit_failures: Mutex<VecDeque<MpcClientError>>,
    /// Successful submissions.
    pub submissions: Mutex<Vec<SubmittedDecision>>,
    /// Number of polls served.
    pub polls: Mutex<usize>,
}

impl MockMpcClient {
    /// Mock client returning `pending` on every poll.
    pub fn with_pending(pending: Vec<Option<SignRequest>>) -> Self {
        Self {
            pending: Mutex::new(pending),
            ..Default::default()
        }
    }

    /// Make the next submission fail.
    pub fn fail_next_submit(&self, err: MpcClientError) {
        self.submit_failures.lock().push_back(err);
    }

    /// Make the next poll fail.
    pub fn fail_next_poll(&self, err: MpcClientError) {
        self.poll_failures.lock().push_back(err);
    }

    /// Successful submissions so far.
    pub fn submitted(&self) -> Vec<SubmittedDecision> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl MpcClient for MockMpcClient {
    async fn pending_sign_requests(
        &self,
        _max_age_secs: u64,
    ) -> Result<Vec<Option<SignRequest>>, MpcClientError> {
        *self.polls.lock() += 1;
        if let Some(err) = self.poll_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.pending.lock().clone())
    }

    async fn submit_decision(
        &self,
        key_id: &str,
        result: AcceptResult,
        msg_hash: &[String],
        reasons: &[String],
    ) -> Result<String, MpcClientError> {
        if let Some(err) = self.submit_failures.lock().pop_front() {
            return Err(err);
        }
        self.submissions.lock().push(SubmittedDecision {
            key_id: key_id.to_string(),
            result,
            msg_hash: msg_hash.to_vec(),
            reasons: reasons.to_vec(),
        });
        Ok("Success".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SwapType;
    use primitive_types::U256;

    fn swap_info() -> SwapInfo {
        SwapInfo {
            from: "0xuser".into(),
            tx_to: "0xrouter".into(),
            value: U256::from(5u64),
        }
    }

    #[tokio::test]
    async fn test_mock_bridge_records_verify_args() {
        let bridge = MockBridge::new("0xmpc", swap_info());
        let args = VerifyArgs::stable_only(SwapType::Bridge, 2);
        let info = bridge.verify_transaction("0xtx", &args).await.unwrap();
        assert_eq!(info, swap_info());
        assert_eq!(bridge.seen_verify_args.lock()[0], args);
    }

    #[tokio::test]
    async fn test_mock_bridge_msg_hash() {
        let bridge = MockBridge::new("0xmpc", swap_info());
        let raw = bridge.build_raw_transaction(&BuildTxArgs::default()).await.unwrap();
        let hash = mock_msg_hash(&raw);

        assert!(bridge.verify_msg_hash(&raw, &[hash.clone()]).is_ok());
        assert!(bridge.verify_msg_hash(&raw, &["0x00".into()]).is_err());
        assert!(bridge.verify_msg_hash(&raw, &[hash.clone(), hash]).is_err());
    }

    #[tokio::test]
    async fn test_mock_bridge_capability() {
        let plain = MockBridge::new("0xmpc", swap_info());
        assert!(plain.signed_tx_hash_source().is_none());

        let capable = MockBridge::new("0xmpc", swap_info()).with_signed_tx_hash();
        let source = capable.signed_tx_hash_source().unwrap();
        let hash = source
            .signed_tx_hash_for_key("key", &RawTx(vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(hash.starts_with("0x"));
    }

    #[tokio::test]
    async fn test_mock_mpc_client_failures_consumed() {
        let client = MockMpcClient::default();
        client.fail_next_poll(MpcClientError::InvalidResponse("eof".into()));
        assert!(client.pending_sign_requests(600).await.is_err());
        assert!(client.pending_sign_requests(600).await.unwrap().is_empty());
        assert_eq!(*client.polls.lock(), 2);
    }
}
