//! Read-only reconciliation over the transaction log
//!
//! Replays every COMPLETED transaction record in time order into expected
//! stock and wallet balances, then compares against the live balance
//! store. Divergence is reported, never self-healed: correcting a drifted
//! balance takes an explicit adjustment operation so the correction itself
//! lands in the log.

use crate::{
    error::Result,
    storage::Storage,
    types::{OperationKind, StockKey, TransactionStatus, WalletId},
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One stock balance that does not match its replayed movements
#[derive(Debug, Clone)]
pub struct StockDiscrepancy {
    /// Stock key
    pub key: StockKey,
    /// Balance the log implies
    pub expected_kg: Decimal,
    /// Balance the store holds
    pub actual_kg: Decimal,
}

/// One wallet balance that does not match its replayed movements
#[derive(Debug, Clone)]
pub struct WalletDiscrepancy {
    /// Wallet id
    pub wallet: WalletId,
    /// Balance the log implies
    pub expected: Decimal,
    /// Balance the store holds
    pub actual: Decimal,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// COMPLETED records replayed
    pub transactions_replayed: u64,
    /// Stock balances that diverge from the log
    pub stock_discrepancies: Vec<StockDiscrepancy>,
    /// Wallet balances that diverge from the log
    pub wallet_discrepancies: Vec<WalletDiscrepancy>,
}

impl ReconciliationReport {
    /// True when every balance matches its replayed movements
    pub fn is_clean(&self) -> bool {
        self.stock_discrepancies.is_empty() && self.wallet_discrepancies.is_empty()
    }
}

pub(crate) fn run(storage: &Storage) -> Result<ReconciliationReport> {
    let mut expected_stock: HashMap<StockKey, Decimal> = HashMap::new();
    let mut expected_wallets: HashMap<WalletId, Decimal> = HashMap::new();
    let mut replayed = 0u64;

    storage.for_each_transaction(|record| {
        if record.status != TransactionStatus::Completed {
            return Ok(());
        }
        replayed += 1;

        match record.kind {
            OperationKind::Receive => {
                if let (Some(key), Some(qty)) = (&record.target_stock, record.quantity_kg) {
                    *expected_stock.entry(key.clone()).or_default() += qty;
                }
                if let (Some(wallet), Some(amount)) = (&record.source_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() -= amount;
                }
            }
            OperationKind::Produce => {
                if let (Some(key), Some(raw)) = (&record.source_stock, record.raw_used_kg) {
                    *expected_stock.entry(key.clone()).or_default() -= raw;
                }
                if let (Some(key), Some(qty)) = (&record.target_stock, record.quantity_kg) {
                    *expected_stock.entry(key.clone()).or_default() += qty;
                }
            }
            OperationKind::Sale => {
                if let (Some(key), Some(qty)) = (&record.source_stock, record.quantity_kg) {
                    *expected_stock.entry(key.clone()).or_default() -= qty;
                }
                if let (Some(wallet), Some(amount)) = (&record.target_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() += amount;
                }
            }
            OperationKind::Expense => {
                if let (Some(wallet), Some(amount)) = (&record.source_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() -= amount;
                }
            }
            OperationKind::CashTransfer => {
                if let (Some(wallet), Some(amount)) = (&record.source_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() -= amount;
                }
                if let (Some(wallet), Some(amount)) = (&record.target_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() += amount;
                }
            }
            OperationKind::CapitalInjection => {
                if let (Some(wallet), Some(amount)) = (&record.target_wallet, record.amount) {
                    *expected_wallets.entry(wallet.clone()).or_default() += amount;
                }
            }
            OperationKind::StockAdjustment => {
                // Adjustments replay as the absolute value they set
                if let (Some(key), Some(qty)) = (&record.target_stock, record.quantity_kg) {
                    expected_stock.insert(key.clone(), qty);
                }
            }
            OperationKind::WalletAdjustment => {
                if let (Some(wallet), Some(amount)) = (&record.target_wallet, record.amount) {
                    expected_wallets.insert(wallet.clone(), amount);
                }
            }
        }
        Ok(())
    })?;

    let mut stock_discrepancies = Vec::new();
    for record in storage.all_stock()? {
        let expected = expected_stock
            .remove(&record.key)
            .unwrap_or(Decimal::ZERO);
        if expected != record.quantity_kg {
            stock_discrepancies.push(StockDiscrepancy {
                key: record.key,
                expected_kg: expected,
                actual_kg: record.quantity_kg,
            });
        }
    }
    // Movements for keys the store no longer holds at all
    for (key, expected) in expected_stock {
        if expected != Decimal::ZERO {
            stock_discrepancies.push(StockDiscrepancy {
                key,
                expected_kg: expected,
                actual_kg: Decimal::ZERO,
            });
        }
    }

    let mut wallet_discrepancies = Vec::new();
    for record in storage.all_wallets()? {
        let expected = expected_wallets
            .remove(&record.wallet_id)
            .unwrap_or(Decimal::ZERO);
        if expected != record.balance {
            wallet_discrepancies.push(WalletDiscrepancy {
                wallet: record.wallet_id,
                expected,
                actual: record.balance,
            });
        }
    }
    for (wallet, expected) in expected_wallets {
        if expected != Decimal::ZERO {
            wallet_discrepancies.push(WalletDiscrepancy {
                wallet,
                expected,
                actual: Decimal::ZERO,
            });
        }
    }

    Ok(ReconciliationReport {
        transactions_replayed: replayed,
        stock_discrepancies,
        wallet_discrepancies,
    })
}
