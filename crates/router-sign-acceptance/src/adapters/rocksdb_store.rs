//! # RocksDB Accept Record Store
//!
//! Durable `AcceptRecordStore`: accepted nonces survive restarts, so a node
//! never co-signs a reused nonce for a second swap after coming back up.
//!
//! Records are JSON-encoded in the `accept_records` column family under the
//! key `"{to_chain_id}:{nonce}"`.

use super::record_store::{ensure_same_swap, new_record};
use crate::domain::{AcceptRecord, BuildTxArgs, ChainId, RecordStoreError};
use crate::ports::outbound::AcceptRecordStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use tracing::{debug, info};

/// Column family holding accept records.
pub const CF_ACCEPT_RECORDS: &str = "accept_records";

/// RocksDB store configuration.
#[derive(Debug, Clone)]
pub struct RocksDbRecordConfig {
    /// Path to the database directory
    pub path: String,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbRecordConfig {
    fn default() -> Self {
        Self {
            path: "./data/accept_records".to_string(),
            sync_writes: true,
        }
    }
}

impl RocksDbRecordConfig {
    /// Create config for testing (no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
        }
    }
}

/// RocksDB-backed accept record store.
pub struct RocksDbAcceptRecordStore {
    db: RwLock<DB>,
    config: RocksDbRecordConfig,
}

impl RocksDbAcceptRecordStore {
    /// Open or create the database.
    pub fn open(config: RocksDbRecordConfig) -> Result<Self, RecordStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let cf = ColumnFamilyDescriptor::new(CF_ACCEPT_RECORDS, cf_opts);

        let db = DB::open_cf_descriptors(&opts, &config.path, vec![cf])
            .map_err(|e| RecordStoreError::Backend(format!("Failed to open RocksDB: {}", e)))?;

        info!(path = %config.path, "[accept] accept record store opened");
        Ok(Self {
            db: RwLock::new(db),
            config,
        })
    }

    /// Record for a destination nonce.
    pub fn get(
        &self,
        chain_id: &ChainId,
        nonce: u64,
    ) -> Result<Option<AcceptRecord>, RecordStoreError> {
        let db = self.db.read();
        read_record(&db, &record_key(chain_id, nonce))
    }
}

fn record_key(chain_id: &ChainId, nonce: u64) -> String {
    format!("{}:{}", chain_id, nonce)
}

fn read_record(db: &DB, key: &str) -> Result<Option<AcceptRecord>, RecordStoreError> {
    let cf = db
        .cf_handle(CF_ACCEPT_RECORDS)
        .ok_or_else(|| RecordStoreError::Backend("missing column family".into()))?;
    let bytes = db
        .get_cf(&cf, key.as_bytes())
        .map_err(|e| RecordStoreError::Backend(format!("RocksDB get failed: {}", e)))?;

    bytes
        .map(|b| {
            serde_json::from_slice(&b)
                .map_err(|e| RecordStoreError::Backend(format!("corrupt record {}: {}", key, e)))
        })
        .transpose()
}

#[async_trait]
impl AcceptRecordStore for RocksDbAcceptRecordStore {
    async fn check_accept_record(&self, args: &BuildTxArgs) -> Result<(), RecordStoreError> {
        let db = self.db.read();
        let existing = read_record(&db, &record_key(&args.to_chain_id, args.nonce))?;
        ensure_same_swap(existing.as_ref(), args)
    }

    async fn add_accept_record(
        &self,
        args: &BuildTxArgs,
        swap_tx: &str,
    ) -> Result<(), RecordStoreError> {
        let db = self.db.write();
        let key = record_key(&args.to_chain_id, args.nonce);
        let existing = read_record(&db, &key)?;
        ensure_same_swap(existing.as_ref(), args)?;

        let value = serde_json::to_vec(&new_record(args, swap_tx))
            .map_err(|e| RecordStoreError::Backend(format!("encode record failed: {}", e)))?;
        let cf = db
            .cf_handle(CF_ACCEPT_RECORDS)
            .ok_or_else(|| RecordStoreError::Backend("missing column family".into()))?;
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);

        db.put_cf_opt(&cf, key.as_bytes(), value, &write_opts)
            .map_err(|e| RecordStoreError::Backend(format!("RocksDB put failed: {}", e)))?;

        debug!(key = %key, swap_tx = %swap_tx, "[accept] accept record persisted");
        Ok(())
    }
}
