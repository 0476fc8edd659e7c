use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::env;

use transaction_risk::{
    seed_rules, Account, Channel, Customer, RiskEngine, SqliteStore, Transaction,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args: Vec<String> = env::args().collect();
    let db_path = args.get(1).map(String::as_str).unwrap_or("transactions.db");

    // 1. Open database and apply schema
    println!("Setting up database at {db_path}...");
    let conn = Connection::open(db_path).context("Failed to open database")?;
    let store = SqliteStore::new(conn);
    store.setup_schema().context("Failed to set up schema")?;
    println!("✓ Schema ready (WAL mode)");

    // 2. Seed the initial rule set (idempotent upsert)
    let seeded = seed_rules(&store).context("Failed to seed rules")?;
    println!("✓ Seeded {seeded} behavioral rules");

    // 3. Demo fixture: one customer, two accounts, a known destination.
    //    Account inserts fail on re-runs (unique agency/account) - fine.
    if let Ok(customer_id) = store.insert_customer("John Doe", 30) {
        let _ = store.insert_account(123, 456, customer_id);
        let _ = store.insert_account(123, 789, customer_id);
    }
    store.record_known_destination(1, 2, Utc::now())?;
    println!("✓ Demo accounts in place");

    // 4. Evaluate sample transactions
    let engine = RiskEngine::new(&store, &store);

    let samples = [
        ("Teller payment at 09:30", sample(500, Channel::Teller, 9, 30)),
        ("Teller payment at 11:00", sample(500, Channel::Teller, 11, 0)),
        ("ATM withdrawal of 10000 at 02:00", sample(10000, Channel::Atm, 2, 0)),
        ("ATM withdrawal of 10000 at 14:00", sample(10000, Channel::Atm, 14, 0)),
    ];

    println!("\nEvaluating sample transactions:");
    for (label, mut trx) in samples {
        let verdict = engine.evaluate_and_mark(&mut trx)?;
        match &verdict.matched_rule {
            Some(rule) => println!("  ⚠ {label}: SUSPECT (rule: {rule})"),
            None => println!("  ✓ {label}: clean"),
        }
        store.insert_transaction(&trx)?;
    }

    // 5. Housekeeping: drop expired known-destination records
    let purged = store.purge_expired_destinations(Utc::now())?;
    println!("\n✓ Purged {purged} expired known destinations");

    Ok(())
}

fn sample(amount: i64, channel: Channel, hour: u32, minute: u32) -> Transaction {
    let customer = Customer {
        id: 1,
        name: "John Doe".to_string(),
        age: 30,
    };
    Transaction {
        id: 0,
        created_at: today_at(hour, minute),
        amount: Decimal::from(amount),
        channel,
        suspect: false,
        origin_account: Account {
            id: 1,
            agency: 123,
            account: 456,
            customer: customer.clone(),
        },
        destination_account: Account {
            id: 2,
            agency: 123,
            account: 789,
            customer,
        },
    }
}

fn today_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(|| Utc::now() - Duration::hours(1))
}
