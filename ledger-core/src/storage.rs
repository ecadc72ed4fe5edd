//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - latest account records (key: 16-byte big-endian id)
//! - `transfers` - transfer records (key: 16-byte big-endian id)
//!
//! Counters on account records only ever grow, so "latest record" is the
//! full history the engine needs; the transfer log itself is append-only.
//! One applied ledger batch maps to one `WriteBatch` commit.

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    types::{Account, Transfer},
    Config,
};

const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSFERS: &str = "transfers";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_TRANSFERS, Self::cf_options()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "opened ledger storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    /// Load every account record (engine warm-up at open)
    pub fn load_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }

    /// Load every transfer record (engine warm-up at open)
    pub fn load_transfers(&self) -> Result<Vec<Transfer>> {
        let cf = self.cf_handle(CF_TRANSFERS)?;
        let mut transfers = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            transfers.push(bincode::deserialize(&value)?);
        }
        Ok(transfers)
    }

    /// Commit one applied ledger batch atomically
    ///
    /// The caller passes every account and transfer record touched by the
    /// batch; the write either lands fully or not at all.
    pub fn commit(&self, accounts: &[Account], transfers: &[Transfer]) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transfers = self.cf_handle(CF_TRANSFERS)?;

        let mut batch = WriteBatch::default();

        for account in accounts {
            let key = account.id.value().to_be_bytes();
            let value = bincode::serialize(account)?;
            batch.put_cf(&cf_accounts, key, &value);
        }

        for transfer in transfers {
            let key = transfer.id.value().to_be_bytes();
            let value = bincode::serialize(transfer)?;
            batch.put_cf(&cf_transfers, key, &value);
        }

        self.db.write(batch)?;

        tracing::debug!(
            accounts = accounts.len(),
            transfers = transfers.len(),
            "batch committed"
        );

        Ok(())
    }
}
