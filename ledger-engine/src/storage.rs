//! Storage layer using RocksDB optimistic transactions
//!
//! # Column Families
//!
//! - `stock` - Current stock balances (key: encoded stock key)
//! - `wallets` - Current wallet balances (key: wallet id)
//! - `transactions` - Append-only transaction log (key: transaction id, v7)
//! - `requests` - Financial requests (key: request id)
//!
//! Every mutation happens through a [`Unit`]: reads inside the unit go
//! through `get_for_update` so the storage engine tracks them, and a commit
//! that raced with another writer on any read key fails validation and is
//! surfaced as [`CommitOutcome::Contended`] for the caller to retry. Plain
//! reads outside a unit never lock and may be used freely for dashboards.

use crate::{
    config::Config,
    error::{Error, Result},
    types::{FinancialRequest, StockKey, StockRecord, TransactionRecord, WalletId, WalletRecord},
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode,
    OptimisticTransactionDB, Options, Transaction,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Column family names
const CF_STOCK: &str = "stock";
const CF_WALLETS: &str = "wallets";
const CF_TRANSACTIONS: &str = "transactions";
const CF_REQUESTS: &str = "requests";

/// Storage wrapper for the optimistic-transaction database
pub struct Storage {
    db: OptimisticTransactionDB,
}

/// Result of committing a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All writes applied atomically
    Committed,
    /// A concurrent commit touched a key this unit read; nothing applied
    Contended,
}

impl Storage {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_STOCK, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Self::cf_options_log()),
        ];

        let db = OptimisticTransactionDB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened ledger storage");

        Ok(Self { db })
    }

    // Column family options

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Balances are frequently re-read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Begin an atomic unit
    pub fn begin_unit(&self) -> Result<Unit<'_>> {
        Ok(Unit {
            txn: self.db.transaction(),
            stock: self.cf(CF_STOCK)?,
            wallets: self.cf(CF_WALLETS)?,
            transactions: self.cf(CF_TRANSACTIONS)?,
            requests: self.cf(CF_REQUESTS)?,
        })
    }

    // Read-only access (eventually consistent is fine for dashboards;
    // operations re-read through their unit)

    /// Get current stock record
    pub fn get_stock(&self, key: &StockKey) -> Result<Option<StockRecord>> {
        decode(self.db.get_cf(self.cf(CF_STOCK)?, key.encode())?)
    }

    /// Get current wallet record
    pub fn get_wallet(&self, wallet_id: &WalletId) -> Result<Option<WalletRecord>> {
        decode(self.db.get_cf(self.cf(CF_WALLETS)?, wallet_id.as_str())?)
    }

    /// Get a transaction record by id
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<TransactionRecord>> {
        decode(
            self.db
                .get_cf(self.cf(CF_TRANSACTIONS)?, transaction_id.as_bytes())?,
        )
    }

    /// Get a financial request by id
    pub fn get_request(&self, request_id: Uuid) -> Result<Option<FinancialRequest>> {
        decode(self.db.get_cf(self.cf(CF_REQUESTS)?, request_id.as_bytes())?)
    }

    /// Scan the transaction log in id (time) order, starting after the
    /// cursor, keeping records the predicate accepts, up to `limit`.
    pub fn scan_transactions<F>(
        &self,
        after: Option<Uuid>,
        limit: usize,
        mut keep: F,
    ) -> Result<Vec<TransactionRecord>>
    where
        F: FnMut(&TransactionRecord) -> bool,
    {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mode = match after {
            Some(cursor) => IteratorMode::From(cursor.as_bytes(), Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item.map_err(Error::from)?;
            // The cursor itself was already seen
            if let Some(cursor) = after {
                if key.as_ref() == cursor.as_bytes().as_slice() {
                    continue;
                }
            }
            let record: TransactionRecord = bincode::deserialize(&value)?;
            if keep(&record) {
                records.push(record);
                if records.len() >= limit {
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Visit every transaction record in id (time) order
    pub fn for_each_transaction<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(TransactionRecord) -> Result<()>,
    {
        let cf = self.cf(CF_TRANSACTIONS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(Error::from)?;
            visit(bincode::deserialize(&value)?)?;
        }
        Ok(())
    }

    /// All current stock records
    pub fn all_stock(&self) -> Result<Vec<StockRecord>> {
        let cf = self.cf(CF_STOCK)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(Error::from)?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// All current wallet records
    pub fn all_wallets(&self) -> Result<Vec<WalletRecord>> {
        let cf = self.cf(CF_WALLETS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(Error::from)?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }
}

/// One atomic read-validate-write unit
///
/// All reads go through `get_for_update`; all writes are buffered until
/// [`Unit::commit`]. Dropping the unit without committing discards every
/// write, which is how validation failures abort with zero side effects.
pub struct Unit<'db> {
    txn: Transaction<'db, OptimisticTransactionDB>,
    stock: &'db ColumnFamily,
    wallets: &'db ColumnFamily,
    transactions: &'db ColumnFamily,
    requests: &'db ColumnFamily,
}

impl Unit<'_> {
    /// Read a stock record, tracking the key for conflict detection
    pub fn get_stock(&self, key: &StockKey) -> Result<Option<StockRecord>> {
        decode(self.txn.get_for_update_cf(self.stock, key.encode(), true)?)
    }

    /// Write a stock record
    pub fn put_stock(&self, record: &StockRecord) -> Result<()> {
        self.txn
            .put_cf(self.stock, record.key.encode(), bincode::serialize(record)?)?;
        Ok(())
    }

    /// Read a wallet record, tracking the key for conflict detection
    pub fn get_wallet(&self, wallet_id: &WalletId) -> Result<Option<WalletRecord>> {
        decode(
            self.txn
                .get_for_update_cf(self.wallets, wallet_id.as_str(), true)?,
        )
    }

    /// Write a wallet record
    pub fn put_wallet(&self, record: &WalletRecord) -> Result<()> {
        self.txn.put_cf(
            self.wallets,
            record.wallet_id.as_str(),
            bincode::serialize(record)?,
        )?;
        Ok(())
    }

    /// Read a transaction record, tracking the key for conflict detection
    ///
    /// Tracking the read of an absent id is what makes duplicate
    /// submissions of the same id collide instead of double-applying.
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<TransactionRecord>> {
        decode(
            self.txn
                .get_for_update_cf(self.transactions, transaction_id.as_bytes(), true)?,
        )
    }

    /// Write a transaction record
    pub fn put_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.txn.put_cf(
            self.transactions,
            record.transaction_id.as_bytes(),
            bincode::serialize(record)?,
        )?;
        Ok(())
    }

    /// Read a financial request, tracking the key for conflict detection
    pub fn get_request(&self, request_id: Uuid) -> Result<Option<FinancialRequest>> {
        decode(
            self.txn
                .get_for_update_cf(self.requests, request_id.as_bytes(), true)?,
        )
    }

    /// Write a financial request
    pub fn put_request(&self, request: &FinancialRequest) -> Result<()> {
        self.txn.put_cf(
            self.requests,
            request.request_id.as_bytes(),
            bincode::serialize(request)?,
        )?;
        Ok(())
    }

    /// Commit all buffered writes atomically
    pub fn commit(self) -> Result<CommitOutcome> {
        match self.txn.commit() {
            Ok(()) => Ok(CommitOutcome::Committed),
            Err(e) if is_conflict(&e) => Ok(CommitOutcome::Contended),
            Err(e) => Err(Error::from(e)),
        }
    }
}

fn is_conflict(err: &rocksdb::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut
    )
}

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> Result<Option<T>> {
    match bytes {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}
