// Trading-day simulator - drives the full ledger flow end to end:
// capital injection, funding approval, receiving, production, sales,
// expense approval, and a closing reconciliation pass.

use anyhow::Result;
use approval::{ApprovalConfig, ApprovalWorkflow, Decision, Role, UserProfile};
use ledger_engine::{
    Config, Currency, GradeId, ItemId, Ledger, LocationId, Operation, RequestType, Scope,
    StockKey, StorageState, TransactionStatus, UnitId, WalletId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let data_dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.data_dir = data_dir.path().to_path_buf();

    let ledger = Arc::new(Ledger::open(config)?);
    let workflow = ApprovalWorkflow::new(ledger.clone(), ApprovalConfig::default());

    // Stand-in for the external advisory analyzer: consumes committed
    // records and comments, without ever gating a commit
    let mut advisories = ledger.subscribe();
    let advisory_task = tokio::spawn(async move {
        while let Some(Ok(record)) = advisories.next().await {
            if record.status != TransactionStatus::Completed {
                continue;
            }
            if let Some(amount) = record.amount {
                if amount >= dec!(5_000_000) {
                    println!(
                        "  [advisory] large movement: {} {} ({})",
                        record.kind, amount, record.description
                    );
                }
            }
        }
    });

    let location = LocationId::new("MUARA");
    let unit = UnitId::new("K1");
    let item = ItemId::new("TUNA");
    let grade = GradeId::new("A");
    let unit_scope = Scope::Unit(location.clone(), unit.clone());
    let hq_wallet = WalletId::for_scope(&Scope::Hq);
    let unit_wallet = WalletId::for_scope(&unit_scope);

    let budi = UserProfile::new("budi", Role::UnitOp, unit_scope.clone());
    let sari = UserProfile::new(
        "sari",
        Role::LocManager,
        Scope::Location(location.clone()),
    );

    println!("=== Bahari trading day: {} / {} ===\n", location, unit);

    // Morning: open the books
    ledger
        .submit_operation(Operation::CapitalInjection {
            wallet: hq_wallet.clone(),
            amount: dec!(50_000_000),
            currency: Currency::Idr,
            source: "investor deposit".to_string(),
        })
        .await?;
    println!("HQ funded with 50,000,000 IDR");

    // Unit asks HQ for working capital; the location manager signs off
    let funding = workflow
        .create_request(
            &budi,
            RequestType::Funding,
            dec!(10_000_000),
            unit_scope.clone(),
            "working capital for the week",
        )
        .await?;
    workflow.decide(&sari, funding, Decision::Approve, None).await?;
    println!("Funding request approved: 10,000,000 IDR to {}", unit_wallet);

    // Landings come in
    ledger
        .submit_operation(Operation::Receive {
            location: location.clone(),
            unit: unit.clone(),
            item: item.clone(),
            grade: grade.clone(),
            quantity_kg: dec!(100),
            unit_price: dec!(45_000),
            wallet: unit_wallet.clone(),
        })
        .await?;
    println!("Received 100 kg {} grade {} at 45,000/kg", item, grade);

    // Afternoon: processing with the usual yield loss
    ledger
        .submit_operation(Operation::Produce {
            location: location.clone(),
            unit: unit.clone(),
            item: item.clone(),
            grade: grade.clone(),
            raw_used_kg: dec!(60),
            output_state: StorageState::Cold,
            output_quantity_kg: dec!(42),
        })
        .await?;
    println!("Processed 60 kg raw into 42 kg cold loin");

    ledger
        .submit_operation(Operation::Sale {
            location: location.clone(),
            unit: unit.clone(),
            state: StorageState::Cold,
            item: item.clone(),
            grade: grade.clone(),
            quantity_kg: dec!(30),
            unit_price: dec!(120_000),
            wallet: unit_wallet.clone(),
        })
        .await?;
    println!("Sold 30 kg cold at 120,000/kg");

    // An expense that needs sign-off
    let ice = workflow
        .create_request(
            &budi,
            RequestType::Expense,
            dec!(250_000),
            unit_scope.clone(),
            "ice resupply",
        )
        .await?;
    workflow.decide(&sari, ice, Decision::Approve, None).await?;
    println!("Expense approved: 250,000 IDR for ice");

    // And one that does not make the cut
    let cooler = workflow
        .create_request(
            &budi,
            RequestType::Expense,
            dec!(4_000_000),
            unit_scope.clone(),
            "second-hand cooler",
        )
        .await?;
    workflow
        .decide(
            &sari,
            cooler,
            Decision::Reject,
            Some("repair the current one first".to_string()),
        )
        .await?;
    println!("Expense rejected: second-hand cooler");

    // A guard rail in action: overspending fails cleanly
    let overspend = ledger
        .submit_operation(Operation::Expense {
            wallet: unit_wallet.clone(),
            amount: dec!(100_000_000),
            recipient: "boat yard".to_string(),
        })
        .await;
    if let Err(e) = overspend {
        println!("Overspend refused: {}", e);
    }

    // Evening: close the books
    println!("\n--- End of day ---");
    for wallet_id in [&hq_wallet, &unit_wallet] {
        if let Some(wallet) = ledger.query_wallet(wallet_id)? {
            println!(
                "wallet {:<14} {:>12} {}",
                wallet.wallet_id.to_string(),
                wallet.balance.to_string(),
                wallet.currency
            );
        }
    }
    for state in [StorageState::Raw, StorageState::Cold] {
        let key = StockKey::new(
            location.clone(),
            unit.clone(),
            state,
            item.clone(),
            grade.clone(),
        );
        let on_hand = ledger
            .query_stock(&key)?
            .map(|r| r.quantity_kg)
            .unwrap_or(Decimal::ZERO);
        println!("stock  {:<14} {:>12} kg", state.code(), on_hand.to_string());
    }

    let report = ledger.reconcile()?;
    println!(
        "reconciliation: {} records replayed, {}",
        report.transactions_replayed,
        if report.is_clean() {
            "books are clean".to_string()
        } else {
            format!(
                "{} stock / {} wallet discrepancies",
                report.stock_discrepancies.len(),
                report.wallet_discrepancies.len()
            )
        }
    );

    let metrics = ledger.metrics();
    println!(
        "metrics: {} committed, {} rejected, {} conflicts retried",
        metrics.operations_committed.get(),
        metrics.operations_rejected.get(),
        metrics.commit_conflicts.get()
    );

    // Let the advisory consumer drain before shutting down
    sleep(Duration::from_millis(100)).await;
    advisory_task.abort();

    Ok(())
}
