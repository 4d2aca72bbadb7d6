//! Concurrency and end-to-end scenario tests
//!
//! Concurrent callers share one ledger through an `Arc`; correctness under
//! interleaving comes from the storage engine's commit validation, so these
//! tests drive real tokio tasks against the same keys.

use ledger_engine::{
    Config, Currency, Error, GradeId, ItemId, Ledger, LocationId, Operation, OperationKind,
    StockKey, StorageState, TransactionFilter, UnitId, WalletId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn test_ledger() -> (Arc<Ledger>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Arc::new(Ledger::open(config).unwrap()), temp_dir)
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

async fn seed_raw_stock(ledger: &Ledger, quantity_kg: Decimal) {
    ledger
        .submit_operation(Operation::CapitalInjection {
            wallet: WalletId::new("HQ"),
            amount: dec!(100_000_000),
            currency: Currency::Idr,
            source: "seed".to_string(),
        })
        .await
        .unwrap();
    ledger
        .submit_operation(Operation::Receive {
            location: LocationId::new("MUARA"),
            unit: UnitId::new("K1"),
            item: ItemId::new("TUNA"),
            grade: GradeId::new("A"),
            quantity_kg,
            unit_price: dec!(45_000),
            wallet: WalletId::new("HQ"),
        })
        .await
        .unwrap();
}

fn sale_60() -> Operation {
    Operation::Sale {
        location: LocationId::new("MUARA"),
        unit: UnitId::new("K1"),
        state: StorageState::Raw,
        item: ItemId::new("TUNA"),
        grade: GradeId::new("A"),
        quantity_kg: dec!(60),
        unit_price: dec!(90_000),
        wallet: WalletId::new("HQ"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let (ledger, _temp) = test_ledger();
    seed_raw_stock(&ledger, dec!(100)).await;

    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.submit_operation(sale_60()).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.submit_operation(sale_60()).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "exactly one of two 60 kg sales may commit");

    let failure = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one sale must fail");
    assert!(
        matches!(failure, Error::InsufficientStock { .. }),
        "loser must see the post-commit quantity, got {:?}",
        failure
    );

    let stock = ledger.query_stock(&raw_key()).unwrap().unwrap();
    assert_eq!(stock.quantity_kg, dec!(40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disjoint_operations_all_commit() {
    let (ledger, _temp) = test_ledger();

    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .submit_operation(Operation::CapitalInjection {
                    wallet: WalletId::new(format!("UNIT-MUARA-K{}", i)),
                    amount: dec!(1_000_000),
                    currency: Currency::Idr,
                    source: "parallel seed".to_string(),
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..8 {
        let wallet = ledger
            .query_wallet(&WalletId::new(format!("UNIT-MUARA-K{}", i)))
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, dec!(1_000_000));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_transfers_conserve_money() {
    let (ledger, _temp) = test_ledger();
    ledger
        .submit_operation(Operation::CapitalInjection {
            wallet: WalletId::new("HQ"),
            amount: dec!(10_000_000),
            currency: Currency::Idr,
            source: "seed".to_string(),
        })
        .await
        .unwrap();

    // Many small transfers hammering the same source wallet
    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .submit_operation(Operation::CashTransfer {
                    source: WalletId::new("HQ"),
                    target: WalletId::new(format!("LOC-{}", i % 3)),
                    amount: dec!(100_000),
                })
                .await
        }));
    }

    let mut committed = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(Error::ContentionExhausted { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    let hq = ledger
        .query_wallet(&WalletId::new("HQ"))
        .unwrap()
        .unwrap()
        .balance;
    let mut branches = Decimal::ZERO;
    for i in 0..3 {
        if let Some(wallet) = ledger
            .query_wallet(&WalletId::new(format!("LOC-{}", i)))
            .unwrap()
        {
            branches += wallet.balance;
        }
    }

    assert_eq!(hq, dec!(10_000_000) - Decimal::from(committed) * dec!(100_000));
    assert_eq!(branches, Decimal::from(committed) * dec!(100_000));
    assert!(ledger.reconcile().unwrap().is_clean());
}

#[tokio::test]
async fn test_produce_yield_scenario() {
    let (ledger, _temp) = test_ledger();
    seed_raw_stock(&ledger, dec!(100)).await;

    ledger
        .submit_operation(Operation::Produce {
            location: LocationId::new("MUARA"),
            unit: UnitId::new("K1"),
            item: ItemId::new("TUNA"),
            grade: GradeId::new("A"),
            raw_used_kg: dec!(60),
            output_state: StorageState::Cold,
            output_quantity_kg: dec!(42),
        })
        .await
        .unwrap();

    let raw = ledger.query_stock(&raw_key()).unwrap().unwrap();
    assert_eq!(raw.quantity_kg, dec!(40));

    let cold = ledger
        .query_stock(&StockKey::new(
            LocationId::new("MUARA"),
            UnitId::new("K1"),
            StorageState::Cold,
            ItemId::new("TUNA"),
            GradeId::new("A"),
        ))
        .unwrap()
        .unwrap();
    assert_eq!(cold.quantity_kg, dec!(42));

    let filter = TransactionFilter {
        kind: Some(OperationKind::Produce),
        ..Default::default()
    };
    let page = ledger.query_transactions(&filter).unwrap();
    assert_eq!(page.records.len(), 1);
    let record = &page.records[0];
    assert_eq!(record.raw_used_kg, Some(dec!(60)));
    assert_eq!(record.quantity_kg, Some(dec!(42)));
}

#[tokio::test]
async fn test_transfer_scenario_hq_to_kai() {
    let (ledger, _temp) = test_ledger();
    ledger
        .submit_operation(Operation::CapitalInjection {
            wallet: WalletId::new("HQ"),
            amount: dec!(10_000_000),
            currency: Currency::Idr,
            source: "seed".to_string(),
        })
        .await
        .unwrap();

    let tx = ledger
        .submit_operation(Operation::CashTransfer {
            source: WalletId::new("HQ"),
            target: WalletId::new("KAI"),
            amount: dec!(500_000),
        })
        .await
        .unwrap();

    let hq = ledger.query_wallet(&WalletId::new("HQ")).unwrap().unwrap();
    assert_eq!(hq.balance, dec!(9_500_000));

    let kai = ledger.query_wallet(&WalletId::new("KAI")).unwrap().unwrap();
    assert_eq!(kai.balance, dec!(500_000));
    assert_eq!(kai.currency, Currency::Idr);

    let record = ledger.get_transaction(tx).unwrap().unwrap();
    assert_eq!(record.source_wallet, Some(WalletId::new("HQ")));
    assert_eq!(record.target_wallet, Some(WalletId::new("KAI")));
    assert_eq!(record.amount, Some(dec!(500_000)));
}

#[tokio::test]
async fn test_sale_of_missing_key_is_key_not_found() {
    let (ledger, _temp) = test_ledger();
    ledger
        .submit_operation(Operation::CapitalInjection {
            wallet: WalletId::new("HQ"),
            amount: dec!(1_000_000),
            currency: Currency::Idr,
            source: "seed".to_string(),
        })
        .await
        .unwrap();

    let result = ledger.submit_operation(sale_60()).await;
    assert!(matches!(result, Err(Error::KeyNotFound(_))));
}

#[tokio::test]
async fn test_feed_sees_each_commit_once() {
    use tokio_stream::StreamExt;

    let (ledger, _temp) = test_ledger();
    let mut stream = ledger.subscribe();

    seed_raw_stock(&ledger, dec!(100)).await;

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.kind, OperationKind::CapitalInjection);

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.kind, OperationKind::Receive);
}
