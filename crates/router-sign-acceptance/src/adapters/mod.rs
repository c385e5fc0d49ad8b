//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: bridge lookup and accept record storage.

mod bridge_registry;
mod record_store;
#[cfg(feature = "rocksdb")]
mod rocksdb_store;

pub use bridge_registry::StaticBridgeRegistry;
pub use record_store::InMemoryAcceptRecordStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbAcceptRecordStore, RocksDbRecordConfig, CF_ACCEPT_RECORDS};
