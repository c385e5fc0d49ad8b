//! # Router Sign Acceptance
//!
//! Approval gate of a cross-chain router MPC node.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! The MPC network asks every node to co-sign destination-chain
//! transactions. This worker independently re-derives each transaction from a
//! stable source-chain swap and only agrees when the hashes it would sign
//! match exactly what was requested.
//!
//! ## Decision Table
//!
//! | Failure category      | strict   | tolerant |
//! |-----------------------|----------|----------|
//! | Protocol mismatch     | discard  | discard  |
//! | Unresolved state      | DISAGREE | ignore   |
//! | Config mismatch       | DISAGREE | discard  |
//! | Verification failure  | DISAGREE | DISAGREE |
//!
//! ## Module Structure
//!
//! ```text
//! router-sign-acceptance/
//! ├── domain/          # SignRequest, BuildTxArgs, DedupCache, errors, decide()
//! ├── algorithms/      # SignInfoVerifier
//! ├── ports/           # SignAcceptanceApi, MpcClient, Bridge, AcceptRecordStore
//! ├── adapters/        # StaticBridgeRegistry, record stores
//! ├── service.rs       # producer / dispatcher / responder
//! ├── metrics.rs       # prometheus counters (feature `metrics`)
//! └── telemetry.rs     # tracing subscriber setup
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports
pub use adapters::{InMemoryAcceptRecordStore, StaticBridgeRegistry};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbAcceptRecordStore, RocksDbRecordConfig};
pub use algorithms::SignInfoVerifier;
pub use domain::{
    decide, AcceptAction, AcceptConfig, AcceptError, AcceptRecord, AcceptResult, AcceptStats,
    BridgeError, BuildTxArgs, ChainId, ConfigError, Decision, DedupCache, ErrorCategory,
    MpcClientError, ProcessOutcome, RawTx, RecordStoreError, SignRequest, SwapInfo, SwapType,
    VerifyArgs,
};
pub use ports::{
    AcceptRecordStore, Bridge, BridgeRegistry, MockBridge, MockMpcClient, MpcClient,
    SignAcceptanceApi, SignedTxHashSource,
};
pub use service::SignAcceptanceService;
pub use telemetry::{init_tracing, LogConfig, TelemetryError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
