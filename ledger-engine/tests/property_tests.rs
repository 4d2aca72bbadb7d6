//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Stock conservation: final quantity == initial + sum of committed deltas
//! - No committed state ever holds a negative balance
//! - Wallet bookkeeping: balance == initial - debits + credits
//! - The transaction log replays exactly to the live balances

use ledger_engine::{
    Config, Currency, Error, GradeId, ItemId, Ledger, LocationId, Operation, StockKey,
    StorageState, UnitId, WalletId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

const BUY_PRICE: u32 = 1_000;
const SELL_PRICE: u32 = 2_000;

/// One step of a simulated trading day against a single item/grade
#[derive(Debug, Clone)]
enum Step {
    Receive(u32),
    Produce { raw_used: u32, output: u32 },
    Sale(u32),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u32..50).prop_map(Step::Receive),
        (1u32..50, 1u32..50).prop_map(|(raw_used, output)| Step::Produce { raw_used, output }),
        (1u32..50).prop_map(Step::Sale),
    ]
}

fn test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Ledger::open(config).unwrap(), temp_dir)
}

fn location() -> LocationId {
    LocationId::new("MUARA")
}

fn unit() -> UnitId {
    UnitId::new("K1")
}

fn item() -> ItemId {
    ItemId::new("TUNA")
}

fn grade() -> GradeId {
    GradeId::new("A")
}

fn raw_key() -> StockKey {
    StockKey::new(location(), unit(), StorageState::Raw, item(), grade())
}

fn cold_key() -> StockKey {
    StockKey::new(location(), unit(), StorageState::Cold, item(), grade())
}

fn receive(quantity: u32) -> Operation {
    Operation::Receive {
        location: location(),
        unit: unit(),
        item: item(),
        grade: grade(),
        quantity_kg: Decimal::from(quantity),
        unit_price: Decimal::from(BUY_PRICE),
        wallet: WalletId::new("HQ"),
    }
}

fn produce(raw_used: u32, output: u32) -> Operation {
    Operation::Produce {
        location: location(),
        unit: unit(),
        item: item(),
        grade: grade(),
        raw_used_kg: Decimal::from(raw_used),
        output_state: StorageState::Cold,
        output_quantity_kg: Decimal::from(output),
    }
}

fn sale(quantity: u32) -> Operation {
    Operation::Sale {
        location: location(),
        unit: unit(),
        state: StorageState::Cold,
        item: item(),
        grade: grade(),
        quantity_kg: Decimal::from(quantity),
        unit_price: Decimal::from(SELL_PRICE),
        wallet: WalletId::new("HQ"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: after any step sequence, live balances equal the model
    /// and no committed state ever went negative
    #[test]
    fn prop_balances_match_model(steps in prop::collection::vec(step_strategy(), 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = test_ledger();
            let hq = WalletId::new("HQ");
            let initial_funds = Decimal::from(100_000_000u64);

            ledger
                .submit_operation(Operation::CapitalInjection {
                    wallet: hq.clone(),
                    amount: initial_funds,
                    currency: Currency::Idr,
                    source: "model seed".to_string(),
                })
                .await
                .unwrap();

            let mut model_raw = Decimal::ZERO;
            let mut model_cold = Decimal::ZERO;
            let mut model_wallet = initial_funds;

            for step in &steps {
                match step {
                    Step::Receive(q) => {
                        let quantity = Decimal::from(*q);
                        let cost = quantity * Decimal::from(BUY_PRICE);
                        ledger.submit_operation(receive(*q)).await.unwrap();
                        model_raw += quantity;
                        model_wallet -= cost;
                    }
                    Step::Produce { raw_used, output } => {
                        let used = Decimal::from(*raw_used);
                        let result = ledger.submit_operation(produce(*raw_used, *output)).await;
                        if model_raw >= used {
                            prop_assert!(result.is_ok());
                            model_raw -= used;
                            model_cold += Decimal::from(*output);
                        } else if model_raw == Decimal::ZERO {
                            prop_assert!(matches!(
                                result,
                                Err(Error::KeyNotFound(_)) | Err(Error::InsufficientStock { .. })
                            ));
                        } else {
                            prop_assert!(matches!(result, Err(Error::InsufficientStock { .. })));
                        }
                    }
                    Step::Sale(q) => {
                        let quantity = Decimal::from(*q);
                        let result = ledger.submit_operation(sale(*q)).await;
                        if model_cold >= quantity {
                            prop_assert!(result.is_ok());
                            model_cold -= quantity;
                            model_wallet += quantity * Decimal::from(SELL_PRICE);
                        } else if model_cold == Decimal::ZERO
                            && ledger.query_stock(&cold_key()).unwrap().is_none()
                        {
                            prop_assert!(matches!(result, Err(Error::KeyNotFound(_))));
                        } else {
                            prop_assert!(matches!(result, Err(Error::InsufficientStock { .. })));
                        }
                    }
                }

                // Invariant: no committed state is ever negative
                if let Some(stock) = ledger.query_stock(&raw_key()).unwrap() {
                    prop_assert!(stock.quantity_kg >= Decimal::ZERO);
                }
                if let Some(stock) = ledger.query_stock(&cold_key()).unwrap() {
                    prop_assert!(stock.quantity_kg >= Decimal::ZERO);
                }
                let wallet = ledger.query_wallet(&hq).unwrap().unwrap();
                prop_assert!(wallet.balance >= Decimal::ZERO);
            }

            let live_raw = ledger
                .query_stock(&raw_key())
                .unwrap()
                .map(|r| r.quantity_kg)
                .unwrap_or(Decimal::ZERO);
            let live_cold = ledger
                .query_stock(&cold_key())
                .unwrap()
                .map(|r| r.quantity_kg)
                .unwrap_or(Decimal::ZERO);
            let live_wallet = ledger.query_wallet(&hq).unwrap().unwrap().balance;

            prop_assert_eq!(live_raw, model_raw);
            prop_assert_eq!(live_cold, model_cold);
            prop_assert_eq!(live_wallet, model_wallet);

            // And the log replays exactly to what the store holds
            let report = ledger.reconcile().unwrap();
            prop_assert!(report.is_clean());

            Ok(())
        })?;
    }

    /// Property: wallet balance equals initial minus debits plus credits
    /// over any transfer/expense sequence, and never goes negative
    #[test]
    fn prop_wallet_bookkeeping(moves in prop::collection::vec((0u8..2, 1u64..1_000_000), 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = test_ledger();
            let hq = WalletId::new("HQ");
            let branch = WalletId::new("LOC-MUARA");
            let initial = Decimal::from(5_000_000u64);

            ledger
                .submit_operation(Operation::CapitalInjection {
                    wallet: hq.clone(),
                    amount: initial,
                    currency: Currency::Idr,
                    source: "model seed".to_string(),
                })
                .await
                .unwrap();

            let mut model_hq = initial;
            let mut model_branch = Decimal::ZERO;

            for (kind, amount) in &moves {
                let amount = Decimal::from(*amount);
                match kind {
                    0 => {
                        // HQ -> branch transfer
                        let result = ledger
                            .submit_operation(Operation::CashTransfer {
                                source: hq.clone(),
                                target: branch.clone(),
                                amount,
                            })
                            .await;
                        if model_hq >= amount {
                            prop_assert!(result.is_ok());
                            model_hq -= amount;
                            model_branch += amount;
                        } else {
                            prop_assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
                        }
                    }
                    _ => {
                        // Branch expense
                        let result = ledger
                            .submit_operation(Operation::Expense {
                                wallet: branch.clone(),
                                amount,
                                recipient: "supplier".to_string(),
                            })
                            .await;
                        if model_branch == Decimal::ZERO
                            && ledger.query_wallet(&branch).unwrap().is_none()
                        {
                            prop_assert!(matches!(result, Err(Error::KeyNotFound(_))));
                        } else if model_branch >= amount {
                            prop_assert!(result.is_ok());
                            model_branch -= amount;
                        } else {
                            prop_assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
                        }
                    }
                }

                let live_hq = ledger.query_wallet(&hq).unwrap().unwrap().balance;
                prop_assert!(live_hq >= Decimal::ZERO);
                prop_assert_eq!(live_hq, model_hq);
            }

            let live_branch = ledger
                .query_wallet(&branch)
                .unwrap()
                .map(|w| w.balance)
                .unwrap_or(Decimal::ZERO);
            prop_assert_eq!(live_branch, model_branch);

            let report = ledger.reconcile().unwrap();
            prop_assert!(report.is_clean());

            Ok(())
        })?;
    }
}
