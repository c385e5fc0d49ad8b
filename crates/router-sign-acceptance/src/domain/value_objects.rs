//! # Domain Value Objects
//!
//! Immutable value types shared by the verifier and the responder.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Router swap type carried in the signed message context.
///
/// The wire format is a plain number. Unrecognised numbers deserialize into
/// [`SwapType::Unknown`] so the verifier can reject them explicitly instead of
/// treating the whole context as malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SwapType {
    /// Token bridge swap (ERC20-like assets).
    Bridge,
    /// Non-fungible token swap.
    NftSwap,
    /// Cross-chain contract call.
    AnyCallSwap,
    /// Any other value seen on the wire.
    Unknown(u32),
}

impl SwapType {
    /// Check if this is a swap type the router knows how to rebuild.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Wire number of this swap type.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Bridge => 1,
            Self::NftSwap => 2,
            Self::AnyCallSwap => 3,
            Self::Unknown(n) => *n,
        }
    }
}

impl Default for SwapType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl From<u32> for SwapType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Bridge,
            2 => Self::NftSwap,
            3 => Self::AnyCallSwap,
            n => Self::Unknown(n),
        }
    }
}

impl From<SwapType> for u32 {
    fn from(value: SwapType) -> Self {
        value.as_u32()
    }
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge => write!(f, "bridgeswap"),
            Self::NftSwap => write!(f, "nftswap"),
            Self::AnyCallSwap => write!(f, "anycallswap"),
            Self::Unknown(n) => write!(f, "unknownswap({})", n),
        }
    }
}

/// Chain identifier in canonical decimal form.
///
/// Chain ids may exceed 64 bits (stub ids of non-EVM chains are derived from
/// hashes), so they are kept as decimal strings. Deserializes from a JSON
/// number of any size or from a decimal string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain id from its decimal representation.
    ///
    /// Leading zeros of a decimal id are dropped so `"056"` and `56` name the
    /// same chain.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.len() > 1 && id.starts_with('0') && id.bytes().all(|b| b.is_ascii_digit()) {
            let digits = id.trim_start_matches('0');
            if digits.is_empty() {
                return Self("0".to_string());
            }
            return Self(digits.to_string());
        }
        Self(id)
    }

    /// Decimal representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Numbers when they fit, decimal strings otherwise; both deserialize back.
        match self.0.parse::<u64>() {
            Ok(n) => serializer.serialize_u64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ChainIdVisitor)
    }
}

struct ChainIdVisitor;

impl<'de> Visitor<'de> for ChainIdVisitor {
    type Value = ChainId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer chain id")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ChainId, E> {
        Ok(ChainId::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ChainId, E> {
        if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
            return Err(E::invalid_value(de::Unexpected::Str(v), &self));
        }
        Ok(ChainId::new(v))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, map: A) -> Result<ChainId, A::Error> {
        // serde_json with `arbitrary_precision` hands big numbers over as a
        // single-entry map; let `Number` unwrap it.
        let number = serde_json::Number::deserialize(de::value::MapAccessDeserializer::new(map))?;
        self.visit_str(&number.to_string())
    }
}

/// Decision result sent back to the MPC network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcceptResult {
    /// Contribute this node's signature share.
    #[serde(rename = "AGREE")]
    Agree,
    /// Refuse to sign.
    #[serde(rename = "DISAGREE")]
    Disagree,
}

impl AcceptResult {
    /// Wire string of the result.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agree => "AGREE",
            Self::Disagree => "DISAGREE",
        }
    }
}

impl fmt::Display for AcceptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
