//! Bahari Ledger Engine
//!
//! Transactional stock and cash ledger for seafood trading operations.
//!
//! # Architecture
//!
//! - **Balance Store**: current stock quantities and wallet balances, one
//!   RocksDB record per key, written only inside an atomic unit
//! - **Ledger Operation**: one business operation (receive, produce, sell,
//!   transfer, expense) executed as a single read-validate-write unit
//! - **Transaction Log**: append-only audit record per operation
//! - **Optimistic Concurrency**: callers in separate processes share the
//!   store; conflicting commits are detected by the storage engine and
//!   retried with bounded backoff
//!
//! # Invariants
//!
//! - Stock quantities never go negative at any committed state
//! - Wallet debits never drive a balance negative
//! - Balances move only together with exactly one transaction record
//! - Transaction records are never modified after commit, except the
//!   status of a record awaiting approval

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod metrics;
pub mod reconcile;
mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use feed::TransactionFeed;
pub use ledger::{Ledger, TransactionFilter, TransactionPage};
pub use reconcile::ReconciliationReport;
pub use types::{
    Currency, FinancialRequest, GradeId, ItemId, LocationId, Operation, OperationKind,
    RequestStatus, RequestType, Scope, StockKey, StockRecord, StorageState, TransactionRecord,
    TransactionStatus, UnitId, WalletId, WalletRecord,
};
