//! Atomic ledger operations
//!
//! Every business operation runs as one unit: resolve the balance keys it
//! touches, read them inside the unit, validate against the fresh values,
//! write the deltas plus exactly one transaction record, commit. A
//! validation failure aborts before any write; a commit conflict re-runs
//! the whole sequence with bounded backoff.
//!
//! # Example
//!
//! ```no_run
//! use ledger_engine::{Config, Currency, Ledger, Operation, WalletId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> ledger_engine::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let tx = ledger
//!         .submit_operation(Operation::CapitalInjection {
//!             wallet: WalletId::new("HQ"),
//!             amount: Decimal::from(10_000_000),
//!             currency: Currency::Idr,
//!             source: "opening capital".to_string(),
//!         })
//!         .await?;
//!     println!("committed {tx}");
//!
//!     Ok(())
//! }
//! ```

use crate::{
    config::Config,
    error::{Error, Result},
    feed::TransactionFeed,
    metrics::Metrics,
    reconcile::{self, ReconciliationReport},
    storage::{CommitOutcome, Storage, Unit},
    types::{
        Currency, FinancialRequest, HistoryEntry, ItemId, Operation, OperationKind, RequestAction,
        RequestStatus, StockKey, StockRecord, StorageState, TransactionRecord, TransactionStatus,
        WalletId, WalletRecord,
    },
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Main ledger interface
///
/// Cheap to share behind an `Arc`; every method takes `&self` and
/// concurrent callers are serialized per balance key by the storage
/// engine's commit validation, not by an in-process lock.
pub struct Ledger {
    storage: Arc<Storage>,
    feed: TransactionFeed,
    metrics: Metrics,
    config: Config,
}

enum SubmitOutcome {
    Committed(TransactionRecord),
    Replayed(Uuid),
}

impl Ledger {
    /// Open the ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let feed = TransactionFeed::new(config.feed.capacity);
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("metrics registry: {}", e)))?;

        Ok(Self {
            storage,
            feed,
            metrics,
            config,
        })
    }

    /// Submit an operation with a generated transaction id
    pub async fn submit_operation(&self, op: Operation) -> Result<Uuid> {
        self.submit_with_id(Uuid::now_v7(), op).await
    }

    /// Submit an operation under a caller-supplied transaction id
    ///
    /// Replaying an id that already committed returns the original id and
    /// applies nothing, so callers may safely retry after e.g. a lost
    /// response.
    pub async fn submit_with_id(&self, transaction_id: Uuid, op: Operation) -> Result<Uuid> {
        let started = Instant::now();
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            let unit = self.storage.begin_unit()?;

            if let Some(existing) = unit.get_transaction(transaction_id)? {
                break SubmitOutcome::Replayed(existing.transaction_id);
            }

            let record = match apply_operation(&unit, transaction_id, &op) {
                Ok(record) => record,
                Err(e) => {
                    self.metrics.record_rejection();
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        kind = %op.kind(),
                        error = %e,
                        "operation rejected"
                    );
                    return Err(e);
                }
            };
            unit.put_transaction(&record)?;

            match unit.commit()? {
                CommitOutcome::Committed => break SubmitOutcome::Committed(record),
                CommitOutcome::Contended => {
                    self.metrics.record_conflict();
                    if attempt >= self.config.retry.max_attempts {
                        self.metrics.record_exhausted();
                        return Err(Error::ContentionExhausted { attempts: attempt });
                    }
                    self.backoff(attempt).await;
                }
            }
        };

        self.metrics
            .record_duration(started.elapsed().as_secs_f64());

        match outcome {
            SubmitOutcome::Committed(record) => {
                self.metrics.record_commit();
                tracing::info!(
                    transaction_id = %record.transaction_id,
                    kind = %record.kind,
                    "operation committed"
                );
                self.feed.publish(&record);
                Ok(transaction_id)
            }
            SubmitOutcome::Replayed(existing) => {
                tracing::debug!(transaction_id = %existing, "duplicate submission replayed");
                Ok(existing)
            }
        }
    }

    /// Persist a new financial request together with its PENDING_APPROVAL
    /// transaction record, atomically
    pub async fn create_request(
        &self,
        request: &FinancialRequest,
        record: &TransactionRecord,
    ) -> Result<Uuid> {
        if record.transaction_id != request.transaction_id {
            return Err(Error::InvalidInput {
                field: "transaction_id",
                reason: "request and record must share a transaction id".to_string(),
            });
        }
        if record.status != TransactionStatus::PendingApproval {
            return Err(Error::InvalidInput {
                field: "status",
                reason: format!("expected PENDING_APPROVAL, got {}", record.status),
            });
        }
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidInput {
                field: "amount",
                reason: format!("must be positive, got {}", request.amount),
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let unit = self.storage.begin_unit()?;

            if unit.get_request(request.request_id)?.is_some() {
                return Err(Error::InvalidInput {
                    field: "request_id",
                    reason: format!("request {} already exists", request.request_id),
                });
            }
            unit.put_request(request)?;
            unit.put_transaction(record)?;

            match unit.commit()? {
                CommitOutcome::Committed => {
                    tracing::info!(
                        request_id = %request.request_id,
                        kind = %request.kind,
                        amount = %request.amount,
                        "financial request created"
                    );
                    self.feed.publish(record);
                    return Ok(request.request_id);
                }
                CommitOutcome::Contended => {
                    self.metrics.record_conflict();
                    if attempt >= self.config.retry.max_attempts {
                        self.metrics.record_exhausted();
                        return Err(Error::ContentionExhausted { attempts: attempt });
                    }
                    self.backoff(attempt).await;
                }
            }
        }
    }

    /// Decide a pending request, atomically with its ledger effect
    ///
    /// Approval applies the operation's deltas and flips the linked record
    /// to COMPLETED inside the same unit that moves the request to
    /// APPROVED, so the request reaches a terminal state only if the
    /// operation commits. If validation fails (say, insufficient funds)
    /// the unit aborts and the request stays PENDING. Rejection flips
    /// both statuses with no balance effect. A second decision fails with
    /// [`Error::RequestAlreadyDecided`].
    pub async fn commit_decision(
        &self,
        request_id: Uuid,
        actor: &str,
        decision: RequestStatus,
        note: Option<String>,
        op: Option<Operation>,
    ) -> Result<FinancialRequest> {
        let action = match (decision, op.as_ref()) {
            (RequestStatus::Approved, Some(_)) => RequestAction::Approved,
            (RequestStatus::Rejected, None) => RequestAction::Rejected,
            _ => {
                return Err(Error::InvalidInput {
                    field: "decision",
                    reason: "approval carries an operation, rejection does not".to_string(),
                })
            }
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let unit = self.storage.begin_unit()?;

            let mut request = unit
                .get_request(request_id)?
                .ok_or(Error::RequestNotFound(request_id))?;
            if request.status.is_terminal() {
                return Err(Error::RequestAlreadyDecided {
                    request_id,
                    status: request.status,
                });
            }

            let mut record = unit
                .get_transaction(request.transaction_id)?
                .ok_or(Error::TransactionNotFound(request.transaction_id))?;

            if let Some(op) = op.as_ref() {
                if let Err(e) = apply_deltas(&unit, op) {
                    self.metrics.record_rejection();
                    tracing::warn!(
                        request_id = %request_id,
                        error = %e,
                        "approval failed, request stays pending"
                    );
                    return Err(e);
                }
                record.status = TransactionStatus::Completed;
            } else {
                record.status = TransactionStatus::Rejected;
            }
            unit.put_transaction(&record)?;

            let now = Utc::now();
            request.status = decision;
            request.updated_at = now;
            request.history.push(HistoryEntry {
                action,
                actor: actor.to_string(),
                timestamp: now,
                note: note.clone(),
            });
            unit.put_request(&request)?;

            match unit.commit()? {
                CommitOutcome::Committed => {
                    self.metrics.record_commit();
                    tracing::info!(
                        request_id = %request_id,
                        status = %request.status,
                        actor,
                        "request decided"
                    );
                    self.feed.publish(&record);
                    return Ok(request);
                }
                CommitOutcome::Contended => {
                    self.metrics.record_conflict();
                    if attempt >= self.config.retry.max_attempts {
                        self.metrics.record_exhausted();
                        return Err(Error::ContentionExhausted { attempts: attempt });
                    }
                    self.backoff(attempt).await;
                }
            }
        }
    }

    /// Current stock record for a key (read-only)
    pub fn query_stock(&self, key: &StockKey) -> Result<Option<StockRecord>> {
        self.storage.get_stock(key)
    }

    /// Current wallet record (read-only)
    pub fn query_wallet(&self, wallet_id: &WalletId) -> Result<Option<WalletRecord>> {
        self.storage.get_wallet(wallet_id)
    }

    /// Transaction record by id
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<TransactionRecord>> {
        self.storage.get_transaction(transaction_id)
    }

    /// Financial request by id
    pub fn get_request(&self, request_id: Uuid) -> Result<Option<FinancialRequest>> {
        self.storage.get_request(request_id)
    }

    /// Page through the transaction log
    pub fn query_transactions(&self, filter: &TransactionFilter) -> Result<TransactionPage> {
        let limit = filter.limit.max(1);
        let records =
            self.storage
                .scan_transactions(filter.after, limit, |record| filter.matches(record))?;
        let next_cursor = if records.len() == limit {
            records.last().map(|r| r.transaction_id)
        } else {
            None
        };
        Ok(TransactionPage {
            records,
            next_cursor,
        })
    }

    /// Subscribe to committed transaction records
    ///
    /// Fire-and-forget from the commit path: a slow or absent subscriber
    /// never blocks or gates a commit.
    pub fn subscribe(&self) -> BroadcastStream<TransactionRecord> {
        self.feed.subscribe()
    }

    /// Replay the transaction log against current balances
    pub fn reconcile(&self) -> Result<ReconciliationReport> {
        reconcile::run(&self.storage)
    }

    /// Prometheus metrics for this ledger
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn storage_for_tests(&self) -> &Storage {
        &self.storage
    }

    async fn backoff(&self, attempt: u32) {
        let base = self.config.retry.backoff_base_ms.max(1);
        let exp = base.saturating_mul(1u64 << attempt.min(10));
        let capped = exp.min(self.config.retry.backoff_max_ms);
        let jitter = rand::thread_rng().gen_range(0..base);
        tokio::time::sleep(Duration::from_millis(capped + jitter)).await;
    }
}

/// Filter for paging the transaction log
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    /// Keep only this operation kind
    pub kind: Option<OperationKind>,
    /// Keep only this status
    pub status: Option<TransactionStatus>,
    /// Keep records touching this wallet on either side
    pub wallet: Option<WalletId>,
    /// Keep records touching this item on either side
    pub item: Option<ItemId>,
    /// Resume after this transaction id (exclusive)
    pub after: Option<Uuid>,
    /// Page size
    pub limit: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            kind: None,
            status: None,
            wallet: None,
            item: None,
            after: None,
            limit: 100,
        }
    }
}

impl TransactionFilter {
    fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(wallet) = &self.wallet {
            if record.source_wallet.as_ref() != Some(wallet)
                && record.target_wallet.as_ref() != Some(wallet)
            {
                return false;
            }
        }
        if let Some(item) = &self.item {
            if record.source_stock.as_ref().map(|k| &k.item) != Some(item)
                && record.target_stock.as_ref().map(|k| &k.item) != Some(item)
            {
                return false;
            }
        }
        true
    }
}

/// One page of transaction records
#[derive(Debug, Clone)]
pub struct TransactionPage {
    /// Records in id (time) order
    pub records: Vec<TransactionRecord>,
    /// Cursor for the next page, if more records may exist
    pub next_cursor: Option<Uuid>,
}

/// Balance movement applied by one operation, used to fill the record
struct Movement {
    source_stock: Option<StockKey>,
    target_stock: Option<StockKey>,
    source_wallet: Option<WalletId>,
    target_wallet: Option<WalletId>,
    quantity_kg: Option<Decimal>,
    raw_used_kg: Option<Decimal>,
    amount: Option<Decimal>,
    description: String,
}

fn apply_operation(unit: &Unit<'_>, transaction_id: Uuid, op: &Operation) -> Result<TransactionRecord> {
    let movement = apply_deltas(unit, op)?;
    Ok(TransactionRecord {
        transaction_id,
        kind: op.kind(),
        status: TransactionStatus::Completed,
        source_stock: movement.source_stock,
        target_stock: movement.target_stock,
        source_wallet: movement.source_wallet,
        target_wallet: movement.target_wallet,
        quantity_kg: movement.quantity_kg,
        raw_used_kg: movement.raw_used_kg,
        amount: movement.amount,
        timestamp: Utc::now(),
        description: movement.description,
    })
}

/// Read, validate, and write the balance deltas for one operation
///
/// All reads happen through the unit so validation always sees the latest
/// committed values; an error return leaves the unit with no buffered
/// balance writes that will ever commit, because the caller drops it.
fn apply_deltas(unit: &Unit<'_>, op: &Operation) -> Result<Movement> {
    let now = Utc::now();
    match op {
        Operation::Receive {
            location,
            unit: unit_id,
            item,
            grade,
            quantity_kg,
            unit_price,
            wallet,
        } => {
            require_positive("quantity_kg", *quantity_kg)?;
            require_non_negative("unit_price", *unit_price)?;
            let cost = *quantity_kg * *unit_price;
            debit_wallet(unit, wallet, cost, now)?;
            let key = StockKey::new(
                location.clone(),
                unit_id.clone(),
                StorageState::Raw,
                item.clone(),
                grade.clone(),
            );
            credit_stock(unit, &key, *quantity_kg, now)?;
            Ok(Movement {
                source_stock: None,
                target_stock: Some(key),
                source_wallet: Some(wallet.clone()),
                target_wallet: None,
                quantity_kg: Some(*quantity_kg),
                raw_used_kg: None,
                amount: Some(cost),
                description: format!(
                    "received {} kg {} grade {} at {}/kg",
                    quantity_kg, item, grade, unit_price
                ),
            })
        }

        Operation::Produce {
            location,
            unit: unit_id,
            item,
            grade,
            raw_used_kg,
            output_state,
            output_quantity_kg,
        } => {
            require_positive("raw_used_kg", *raw_used_kg)?;
            require_positive("output_quantity_kg", *output_quantity_kg)?;
            if *output_state == StorageState::Raw {
                return Err(Error::InvalidInput {
                    field: "output_state",
                    reason: "production output cannot remain RAW".to_string(),
                });
            }
            let raw_key = StockKey::new(
                location.clone(),
                unit_id.clone(),
                StorageState::Raw,
                item.clone(),
                grade.clone(),
            );
            debit_stock(unit, &raw_key, *raw_used_kg, now)?;
            let out_key = StockKey::new(
                location.clone(),
                unit_id.clone(),
                *output_state,
                item.clone(),
                grade.clone(),
            );
            credit_stock(unit, &out_key, *output_quantity_kg, now)?;
            Ok(Movement {
                source_stock: Some(raw_key),
                target_stock: Some(out_key),
                source_wallet: None,
                target_wallet: None,
                quantity_kg: Some(*output_quantity_kg),
                raw_used_kg: Some(*raw_used_kg),
                amount: None,
                description: format!(
                    "produced {} kg {} {} from {} kg raw",
                    output_quantity_kg, output_state, item, raw_used_kg
                ),
            })
        }

        Operation::Sale {
            location,
            unit: unit_id,
            state,
            item,
            grade,
            quantity_kg,
            unit_price,
            wallet,
        } => {
            require_positive("quantity_kg", *quantity_kg)?;
            require_non_negative("unit_price", *unit_price)?;
            let key = StockKey::new(
                location.clone(),
                unit_id.clone(),
                *state,
                item.clone(),
                grade.clone(),
            );
            debit_stock(unit, &key, *quantity_kg, now)?;
            let proceeds = *quantity_kg * *unit_price;
            credit_existing_wallet(unit, wallet, proceeds, now)?;
            Ok(Movement {
                source_stock: Some(key),
                target_stock: None,
                source_wallet: None,
                target_wallet: Some(wallet.clone()),
                quantity_kg: Some(*quantity_kg),
                raw_used_kg: None,
                amount: Some(proceeds),
                description: format!(
                    "sold {} kg {} {} grade {} at {}/kg",
                    quantity_kg, state, item, grade, unit_price
                ),
            })
        }

        Operation::Expense {
            wallet,
            amount,
            recipient,
        } => {
            require_positive("amount", *amount)?;
            debit_wallet(unit, wallet, *amount, now)?;
            Ok(Movement {
                source_stock: None,
                target_stock: None,
                source_wallet: Some(wallet.clone()),
                target_wallet: None,
                quantity_kg: None,
                raw_used_kg: None,
                amount: Some(*amount),
                description: format!("expense {} paid to {}", amount, recipient),
            })
        }

        Operation::CashTransfer {
            source,
            target,
            amount,
        } => {
            require_positive("amount", *amount)?;
            if source == target {
                return Err(Error::InvalidInput {
                    field: "target",
                    reason: "source and target wallets must differ".to_string(),
                });
            }
            let source_record = debit_wallet(unit, source, *amount, now)?;
            credit_wallet(unit, target, *amount, source_record.currency, now)?;
            Ok(Movement {
                source_stock: None,
                target_stock: None,
                source_wallet: Some(source.clone()),
                target_wallet: Some(target.clone()),
                quantity_kg: None,
                raw_used_kg: None,
                amount: Some(*amount),
                description: format!("transferred {} from {} to {}", amount, source, target),
            })
        }

        Operation::CapitalInjection {
            wallet,
            amount,
            currency,
            source,
        } => {
            require_positive("amount", *amount)?;
            credit_wallet(unit, wallet, *amount, *currency, now)?;
            Ok(Movement {
                source_stock: None,
                target_stock: None,
                source_wallet: None,
                target_wallet: Some(wallet.clone()),
                quantity_kg: None,
                raw_used_kg: None,
                amount: Some(*amount),
                description: format!("capital injection {} from {}", amount, source),
            })
        }

        Operation::AdjustStock {
            key,
            new_quantity_kg,
            reason,
        } => {
            require_non_negative("new_quantity_kg", *new_quantity_kg)?;
            let old = unit
                .get_stock(key)?
                .map(|r| r.quantity_kg)
                .unwrap_or(Decimal::ZERO);
            unit.put_stock(&StockRecord {
                key: key.clone(),
                quantity_kg: *new_quantity_kg,
                last_updated: now,
            })?;
            Ok(Movement {
                source_stock: None,
                target_stock: Some(key.clone()),
                source_wallet: None,
                target_wallet: None,
                quantity_kg: Some(*new_quantity_kg),
                raw_used_kg: None,
                amount: None,
                description: format!(
                    "stock adjusted {} -> {} kg: {}",
                    old, new_quantity_kg, reason
                ),
            })
        }

        Operation::AdjustWallet {
            wallet,
            new_balance,
            currency,
            reason,
        } => {
            require_non_negative("new_balance", *new_balance)?;
            let old = unit
                .get_wallet(wallet)?
                .map(|r| r.balance)
                .unwrap_or(Decimal::ZERO);
            unit.put_wallet(&WalletRecord {
                wallet_id: wallet.clone(),
                balance: *new_balance,
                currency: *currency,
                last_updated: now,
            })?;
            Ok(Movement {
                source_stock: None,
                target_stock: None,
                source_wallet: None,
                target_wallet: Some(wallet.clone()),
                quantity_kg: None,
                raw_used_kg: None,
                amount: Some(*new_balance),
                description: format!("wallet adjusted {} -> {}: {}", old, new_balance, reason),
            })
        }
    }
}

fn require_positive(field: &'static str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::InvalidInput {
            field,
            reason: format!("must be positive, got {}", value),
        });
    }
    Ok(())
}

fn require_non_negative(field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(Error::InvalidInput {
            field,
            reason: format!("must not be negative, got {}", value),
        });
    }
    Ok(())
}

/// Debit a wallet that must already exist and hold enough
fn debit_wallet(
    unit: &Unit<'_>,
    wallet_id: &WalletId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<WalletRecord> {
    let mut record = unit
        .get_wallet(wallet_id)?
        .ok_or_else(|| Error::KeyNotFound(format!("wallet {}", wallet_id)))?;
    if record.balance < amount {
        return Err(Error::InsufficientFunds {
            wallet: wallet_id.clone(),
            available: record.balance,
            requested: amount,
        });
    }
    record.balance -= amount;
    record.last_updated = now;
    unit.put_wallet(&record)?;
    Ok(record)
}

/// Credit a wallet, creating it on first funding
fn credit_wallet(
    unit: &Unit<'_>,
    wallet_id: &WalletId,
    amount: Decimal,
    currency: Currency,
    now: DateTime<Utc>,
) -> Result<WalletRecord> {
    let mut record = match unit.get_wallet(wallet_id)? {
        Some(record) => {
            if record.currency != currency {
                return Err(Error::InvalidInput {
                    field: "currency",
                    reason: format!(
                        "wallet {} holds {}, not {}",
                        wallet_id, record.currency, currency
                    ),
                });
            }
            record
        }
        None => WalletRecord {
            wallet_id: wallet_id.clone(),
            balance: Decimal::ZERO,
            currency,
            last_updated: now,
        },
    };
    record.balance += amount;
    record.last_updated = now;
    unit.put_wallet(&record)?;
    Ok(record)
}

/// Credit a wallet that must already exist (sale proceeds)
fn credit_existing_wallet(
    unit: &Unit<'_>,
    wallet_id: &WalletId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<WalletRecord> {
    let mut record = unit
        .get_wallet(wallet_id)?
        .ok_or_else(|| Error::KeyNotFound(format!("wallet {}", wallet_id)))?;
    record.balance += amount;
    record.last_updated = now;
    unit.put_wallet(&record)?;
    Ok(record)
}

/// Debit a stock key that must already exist and hold enough
fn debit_stock(
    unit: &Unit<'_>,
    key: &StockKey,
    quantity_kg: Decimal,
    now: DateTime<Utc>,
) -> Result<StockRecord> {
    let mut record = unit
        .get_stock(key)?
        .ok_or_else(|| Error::KeyNotFound(format!("stock {}", key)))?;
    if record.quantity_kg < quantity_kg {
        return Err(Error::InsufficientStock {
            key: key.to_string(),
            available: record.quantity_kg,
            requested: quantity_kg,
        });
    }
    record.quantity_kg -= quantity_kg;
    record.last_updated = now;
    unit.put_stock(&record)?;
    Ok(record)
}

/// Credit a stock key, creating the record on first deposit
fn credit_stock(
    unit: &Unit<'_>,
    key: &StockKey,
    quantity_kg: Decimal,
    now: DateTime<Utc>,
) -> Result<StockRecord> {
    let mut record = unit.get_stock(key)?.unwrap_or(StockRecord {
        key: key.clone(),
        quantity_kg: Decimal::ZERO,
        last_updated: now,
    });
    record.quantity_kg += quantity_kg;
    record.last_updated = now;
    unit.put_stock(&record)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GradeId, LocationId, UnitId};
    use rust_decimal_macros::dec;

    fn test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).unwrap(), temp_dir)
    }

    fn hq() -> WalletId {
        WalletId::new("HQ")
    }

    async fn fund(ledger: &Ledger, wallet: &WalletId, amount: Decimal) {
        ledger
            .submit_operation(Operation::CapitalInjection {
                wallet: wallet.clone(),
                amount,
                currency: Currency::Idr,
                source: "test funding".to_string(),
            })
            .await
            .unwrap();
    }

    fn receive_op(quantity_kg: Decimal, unit_price: Decimal) -> Operation {
        Operation::Receive {
            location: LocationId::new("MUARA"),
            unit: UnitId::new("K1"),
            item: ItemId::new("TUNA"),
            grade: GradeId::new("A"),
            quantity_kg,
            unit_price,
            wallet: hq(),
        }
    }

    fn raw_key() -> StockKey {
        StockKey::new(
            LocationId::new("MUARA"),
            UnitId::new("K1"),
            StorageState::Raw,
            ItemId::new("TUNA"),
            GradeId::new("A"),
        )
    }

    #[tokio::test]
    async fn test_receive_credits_stock_and_debits_wallet() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(10_000_000)).await;

        let tx = ledger
            .submit_operation(receive_op(dec!(100), dec!(45_000)))
            .await
            .unwrap();

        let stock = ledger.query_stock(&raw_key()).unwrap().unwrap();
        assert_eq!(stock.quantity_kg, dec!(100));

        let wallet = ledger.query_wallet(&hq()).unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(5_500_000));

        let record = ledger.get_transaction(tx).unwrap().unwrap();
        assert_eq!(record.kind, OperationKind::Receive);
        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.amount, Some(dec!(4_500_000)));
    }

    #[tokio::test]
    async fn test_receive_rejects_zero_quantity() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(10_000_000)).await;

        let result = ledger
            .submit_operation(receive_op(dec!(0), dec!(45_000)))
            .await;
        assert!(matches!(
            result,
            Err(Error::InvalidInput {
                field: "quantity_kg",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_receive_from_missing_wallet_is_key_not_found() {
        let (ledger, _temp) = test_ledger();

        let result = ledger
            .submit_operation(receive_op(dec!(10), dec!(1_000)))
            .await;
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_balances_untouched() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(1_000_000)).await;

        let result = ledger
            .submit_operation(Operation::Expense {
                wallet: hq(),
                amount: dec!(1_500_000),
                recipient: "fuel supplier".to_string(),
            })
            .await;

        match result {
            Err(Error::InsufficientFunds {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, dec!(1_000_000));
                assert_eq!(requested, dec!(1_500_000));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        let wallet = ledger.query_wallet(&hq()).unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(1_000_000));
    }

    #[tokio::test]
    async fn test_idempotent_replay_applies_once() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(10_000_000)).await;

        let id = Uuid::now_v7();
        let first = ledger
            .submit_with_id(id, receive_op(dec!(10), dec!(1_000)))
            .await
            .unwrap();
        let second = ledger
            .submit_with_id(id, receive_op(dec!(10), dec!(1_000)))
            .await
            .unwrap();

        assert_eq!(first, id);
        assert_eq!(second, id);

        let stock = ledger.query_stock(&raw_key()).unwrap().unwrap();
        assert_eq!(stock.quantity_kg, dec!(10));

        let wallet = ledger.query_wallet(&hq()).unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(9_990_000));
    }

    #[tokio::test]
    async fn test_transfer_currency_mismatch_rejected() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(1_000_000)).await;
        ledger
            .submit_operation(Operation::CapitalInjection {
                wallet: WalletId::new("USD-RESERVE"),
                amount: dec!(1_000),
                currency: Currency::Usd,
                source: "fx".to_string(),
            })
            .await
            .unwrap();

        let result = ledger
            .submit_operation(Operation::CashTransfer {
                source: hq(),
                target: WalletId::new("USD-RESERVE"),
                amount: dec!(500_000),
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::InvalidInput {
                field: "currency",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(1_000_000)).await;

        let result = ledger
            .submit_operation(Operation::CashTransfer {
                source: hq(),
                target: hq(),
                amount: dec!(100),
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::InvalidInput { field: "target", .. })
        ));
    }

    #[tokio::test]
    async fn test_adjustment_is_logged() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(1_000_000)).await;

        let tx = ledger
            .submit_operation(Operation::AdjustWallet {
                wallet: hq(),
                new_balance: dec!(750_000),
                currency: Currency::Idr,
                reason: "cash count after audit".to_string(),
            })
            .await
            .unwrap();

        let wallet = ledger.query_wallet(&hq()).unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(750_000));

        let record = ledger.get_transaction(tx).unwrap().unwrap();
        assert_eq!(record.kind, OperationKind::WalletAdjustment);
        assert!(record.description.contains("cash count after audit"));
        assert!(record.description.contains("1000000"));
    }

    #[tokio::test]
    async fn test_query_transactions_filters_by_kind() {
        let (ledger, _temp) = test_ledger();
        fund(&ledger, &hq(), dec!(10_000_000)).await;
        ledger
            .submit_operation(receive_op(dec!(10), dec!(1_000)))
            .await
            .unwrap();
        ledger
            .submit_operation(receive_op(dec!(5), dec!(1_000)))
            .await
            .unwrap();

        let filter = TransactionFilter {
            kind: Some(OperationKind::Receive),
            ..Default::default()
        };
        let page = ledger.query_transactions(&filter).unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(page
            .records
            .iter()
            .all(|r| r.kind == OperationKind::Receive));
        assert!(page.next_cursor.is_none());
    }
}
