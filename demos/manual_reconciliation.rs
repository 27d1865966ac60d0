//! Manual reconciliation walkthrough

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use manual_reconciliation::utils::MemoryStorage;
use manual_reconciliation::{
    Account, AccountType, EntryState, Journal, LedgerEntry, Move, MoveLine, PaymentMethod,
    ReconcileOutcome, ReconciliationConfig, ReconciliationEngine, Statement, StatementLine,
};
use std::str::FromStr;

fn seed(storage: &MemoryStorage, date: NaiveDate) -> Result<(), Box<dyn std::error::Error>> {
    storage.insert_account(Account::new("bank_acc", "Bank", AccountType::Asset))?;
    storage.insert_account(Account::new("bank_fees", "Bank Fees", AccountType::Expense))?;

    let mut journal = Journal::new("bank", "Main Bank", "bank_acc");
    journal
        .inbound_payment_methods
        .push(PaymentMethod::new("manual_in", "Manual", "manual"));
    journal
        .outbound_payment_methods
        .push(PaymentMethod::new("manual_out", "Manual", "manual"));
    storage.insert_journal(journal)?;

    for (id, amount, name) in [
        ("st-1", "1500.00", "ACME transfer"),
        ("st-2", "-249.50", "Card payment"),
    ] {
        storage.insert_statement_line(StatementLine::new(
            id,
            "2024-06",
            "bank",
            date,
            BigDecimal::from_str(amount)?,
            name,
        ))?;
    }

    for (id, amount, name) in [("ml-1", "1500.00", "INV/2024/0042"), ("ml-2", "-245.00", "BILL/2024/0007")] {
        let mut entry = LedgerEntry::new("bank", "USD", date);
        entry.id = format!("entry-{}", id);
        entry.state = EntryState::Posted;
        let line = MoveLine::new(id, &entry.id, "bank_acc", date, BigDecimal::from_str(amount)?, name);
        storage.insert_ledger_entry(entry, vec![line])?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let date = NaiveDate::from_ymd_opt(2024, 6, 28).ok_or("invalid date")?;
    let storage = MemoryStorage::new();
    seed(&storage, date)?;

    let config = ReconciliationConfig::load("reconcile.toml")?;
    let mut engine = ReconciliationEngine::with_config(storage, config)?;
    let mut session = engine.open_session("bank", date).await?;

    println!("Available statement lines:");
    for entry in session.available_statements().iter() {
        println!("  {} {:>10} {}", entry.id, entry.amount, entry.line.name);
    }
    println!("Available move lines:");
    for entry in session.available_moves().iter() {
        println!("  {} {:>10} {}", entry.id, entry.amount, entry.line.name);
    }

    // Exact match
    session.select_line::<Statement>("st-1")?;
    session.select_line::<Move>("ml-1")?;
    println!("\nDifference before reconcile: {}", session.difference());
    let outcome = engine.reconcile(&mut session).await?;
    println!("Outcome: {:?}", outcome);

    // Off by a 4.50 bank fee
    session.select_line::<Statement>("st-2")?;
    session.select_line::<Move>("ml-2")?;
    println!("\nDifference before reconcile: {}", session.difference());
    if let ReconcileOutcome::AdjustmentRequired(context) = engine.reconcile(&mut session).await? {
        let mut form = engine.adjustment_form(context);
        form.add_remaining_row("bank_fees", "Card fee");
        let receipt = engine.finalize(&mut session, &form).await?;
        println!(
            "Adjustment booked: payment {} entry {} (posted: {})",
            receipt.payment_id, receipt.entry_id, receipt.posted
        );
    }

    let remaining = engine.open_session("bank", date).await?;
    println!(
        "\nLeft to reconcile: {} statement lines, {} move lines",
        remaining.available_statements().len(),
        remaining.available_moves().len()
    );
    Ok(())
}
