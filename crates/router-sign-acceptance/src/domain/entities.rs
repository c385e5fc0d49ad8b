//! # Domain Entities
//!
//! Sign requests, build arguments and decisions.

use super::value_objects::{AcceptResult, ChainId, SwapType};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// One pending MPC signing ceremony visible to this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    /// Unique ceremony id.
    pub key: String,
    /// Hashes the MPC network wants signed, in order.
    pub msg_hash: Vec<String>,
    /// Opaque payloads describing what is being signed.
    pub msg_context: Vec<String>,
    /// Account that initiated the ceremony.
    pub account: String,
}

/// Arguments to build a destination-chain transaction.
///
/// The swap fields travel inside the message context. The destination
/// fields (`from`, `origin_*`) are filled in locally before building.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTxArgs {
    /// Router deployment identifier.
    pub identifier: String,
    /// Swap type.
    #[serde(rename = "swapType")]
    pub swap_type: SwapType,
    /// Source chain.
    #[serde(rename = "fromChainID")]
    pub from_chain_id: ChainId,
    /// Destination chain.
    #[serde(rename = "toChainID")]
    pub to_chain_id: ChainId,
    /// Source transaction id.
    #[serde(rename = "swapID")]
    pub swap_id: String,
    /// Log index of the swap event in the source transaction.
    #[serde(rename = "logIndex", default)]
    pub log_index: u32,
    /// Token id on the router.
    #[serde(rename = "tokenID", default)]
    pub token_id: String,
    /// Destination nonce (0 for chains without account nonces).
    #[serde(default)]
    pub nonce: u64,
    /// Chain-specific build extras (gas, fees, replace count).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,

    /// Destination sender (router MPC address).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Sender of the source transaction.
    #[serde(rename = "originFrom", default, skip_serializing_if = "String::is_empty")]
    pub origin_from: String,
    /// Receiver of the source transaction.
    #[serde(rename = "originTxTo", default, skip_serializing_if = "String::is_empty")]
    pub origin_tx_to: String,
    /// Value of the source transaction.
    #[serde(rename = "originValue", default, skip_serializing_if = "Option::is_none")]
    pub origin_value: Option<U256>,
}

impl BuildTxArgs {
    /// Parse build args from one message context element.
    pub fn from_msg_context(context: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(context)
    }

    /// Whether the destination chain uses account nonces for replay protection.
    pub fn is_nonce_bearing(&self) -> bool {
        self.nonce > 0
    }

    /// Identity of the swap these args belong to.
    pub fn identity(&self) -> AcceptRecordIdentity {
        AcceptRecordIdentity {
            identifier: self.identifier.clone(),
            swap_type: self.swap_type,
            from_chain_id: self.from_chain_id.clone(),
            swap_id: self.swap_id.clone(),
            log_index: self.log_index,
        }
    }

    /// Destination build args: these swap args plus the locally verified
    /// source data and the router MPC sender.
    pub fn for_destination(&self, router_mpc: String, swap_info: &SwapInfo) -> Self {
        Self {
            from: router_mpc,
            origin_from: swap_info.from.clone(),
            origin_tx_to: swap_info.tx_to.clone(),
            origin_value: Some(swap_info.value),
            ..self.clone()
        }
    }
}

/// Arguments for source transaction verification.
///
/// Unstable transactions are never accepted here, so there is no way to
/// construct args that allow them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyArgs {
    /// Swap type.
    pub swap_type: SwapType,
    /// Log index of the swap event.
    pub log_index: u32,
    allow_unstable: bool,
}

impl VerifyArgs {
    /// Verify args requiring a stable (confirmed) source transaction.
    pub fn stable_only(swap_type: SwapType, log_index: u32) -> Self {
        Self {
            swap_type,
            log_index,
            allow_unstable: false,
        }
    }

    /// Always `false`.
    pub fn allow_unstable(&self) -> bool {
        self.allow_unstable
    }
}

/// Verified source swap data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapInfo {
    /// Source transaction sender.
    pub from: String,
    /// Source transaction receiver.
    pub tx_to: String,
    /// Source transaction value.
    pub value: U256,
}

/// Chain-encoded raw transaction built by a bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTx(pub Vec<u8>);

impl RawTx {
    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Decision sent back to the MPC network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Ceremony id.
    pub key_id: String,
    /// AGREE or DISAGREE.
    pub result: AcceptResult,
    /// Disagree reasons (empty on agree).
    pub reasons: Vec<String>,
}

impl Decision {
    /// Agree decision.
    pub fn agree(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            result: AcceptResult::Agree,
            reasons: Vec::new(),
        }
    }

    /// Disagree decision with one reason (truncated).
    pub fn disagree(key_id: impl Into<String>, reason: &str) -> Self {
        Self {
            key_id: key_id.into(),
            result: AcceptResult::Disagree,
            reasons: vec![super::decision::truncate_reason(reason)],
        }
    }
}

/// Which swap holds a destination nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRecordIdentity {
    /// Router deployment identifier.
    pub identifier: String,
    /// Swap type.
    pub swap_type: SwapType,
    /// Source chain.
    pub from_chain_id: ChainId,
    /// Source transaction id.
    pub swap_id: String,
    /// Log index.
    pub log_index: u32,
}

/// Persistent record of an accepted nonce-bearing request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRecord {
    /// Swap identity.
    pub identity: AcceptRecordIdentity,
    /// Destination chain.
    pub to_chain_id: ChainId,
    /// Destination nonce.
    pub nonce: u64,
    /// Hash of the signed destination transaction.
    pub swap_tx: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str = r#"{
        "identifier": "router-mainnet",
        "swapType": 1,
        "fromChainID": 1,
        "toChainID": 56,
        "swapID": "0xabc",
        "logIndex": 3,
        "tokenID": "USDC",
        "nonce": 12,
        "extra": {"gas": 90000}
    }"#;

    #[test]
    fn test_parse_msg_context() {
        let args = BuildTxArgs::from_msg_context(CONTEXT).unwrap();
        assert_eq!(args.identifier, "router-mainnet");
        assert_eq!(args.swap_type, SwapType::Bridge);
        assert_eq!(args.from_chain_id, ChainId::from(1));
        assert_eq!(args.to_chain_id, ChainId::from(56));
        assert_eq!(args.log_index, 3);
        assert!(args.is_nonce_bearing());
        assert!(args.from.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BuildTxArgs::from_msg_context("not json").is_err());
        assert!(BuildTxArgs::from_msg_context("{\"identifier\": 5}").is_err());
    }

    #[test]
    fn test_for_destination_keeps_swap_fields() {
        let args = BuildTxArgs::from_msg_context(CONTEXT).unwrap();
        let info = SwapInfo {
            from: "0xsender".into(),
            tx_to: "0xrouter".into(),
            value: U256::from(1000u64),
        };
        let dst = args.for_destination("0xmpc".into(), &info);
        assert_eq!(dst.from, "0xmpc");
        assert_eq!(dst.origin_value, Some(U256::from(1000u64)));
        assert_eq!(dst.extra, args.extra);
        assert_eq!(dst.identity(), args.identity());
    }

    #[test]
    fn test_verify_args_never_allow_unstable() {
        let args = VerifyArgs::stable_only(SwapType::Bridge, 0);
        assert!(!args.allow_unstable());
    }

    #[test]
    fn test_disagree_truncates_reason() {
        let reason = "x".repeat(1500);
        let decision = Decision::disagree("k", &reason);
        assert_eq!(decision.reasons[0].chars().count(), 1000);
    }
}
