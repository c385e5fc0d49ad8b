//! In-Memory Accept Record Store Adapter
//!
//! Implements `AcceptRecordStore` for tests and single-process deployments
//! that accept losing records on restart.

use crate::domain::{AcceptRecord, BuildTxArgs, ChainId, RecordStoreError};
use crate::ports::outbound::AcceptRecordStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// In-memory accept records keyed by destination chain and nonce.
#[derive(Default)]
pub struct InMemoryAcceptRecordStore {
    records: RwLock<HashMap<(ChainId, u64), AcceptRecord>>,
}

impl InMemoryAcceptRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a destination nonce.
    pub fn get(&self, chain_id: &ChainId, nonce: u64) -> Option<AcceptRecord> {
        self.records.read().get(&(chain_id.clone(), nonce)).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AcceptRecordStore for InMemoryAcceptRecordStore {
    async fn check_accept_record(&self, args: &BuildTxArgs) -> Result<(), RecordStoreError> {
        let records = self.records.read();
        ensure_same_swap(records.get(&(args.to_chain_id.clone(), args.nonce)), args)
    }

    async fn add_accept_record(
        &self,
        args: &BuildTxArgs,
        swap_tx: &str,
    ) -> Result<(), RecordStoreError> {
        let mut records = self.records.write();
        let key = (args.to_chain_id.clone(), args.nonce);
        ensure_same_swap(records.get(&key), args)?;

        debug!(chain_id = %args.to_chain_id, nonce = args.nonce, "[accept] storing accept record");
        records.insert(key, new_record(args, swap_tx));
        Ok(())
    }
}

/// Fails if `existing` belongs to a different swap than `args`.
pub(crate) fn ensure_same_swap(
    existing: Option<&AcceptRecord>,
    args: &BuildTxArgs,
) -> Result<(), RecordStoreError> {
    match existing {
        Some(record) if record.identity != args.identity() => Err(RecordStoreError::Conflict {
            chain_id: args.to_chain_id.clone(),
            nonce: args.nonce,
            existing: record.identity.swap_id.clone(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn new_record(args: &BuildTxArgs, swap_tx: &str) -> AcceptRecord {
    AcceptRecord {
        identity: args.identity(),
        to_chain_id: args.to_chain_id.clone(),
        nonce: args.nonce,
        swap_tx: swap_tx.to_string(),
    }
}
