// Initial rule set
// Migration-style seeding: a fixed set of behavioral heuristics written
// once into the rule store. Each rule encodes one heuristic; the engine
// ORs across all of them.

use serde_json::json;
use tracing::info;

use crate::error::RiskError;
use crate::filter::RuleDocument;
use crate::store::SqliteStore;

/// The seed rules, as stored documents.
pub fn initial_rules() -> Vec<RuleDocument> {
    vec![
        // Teller transactions outside business hours (before 10:00 or
        // after 16:00)
        RuleDocument::new(
            "teller_outside_business_hours",
            json!([{
                "filter": {"or": [
                    {"and": [
                        {"field": "channel", "op": "eq", "value": "TELLER"},
                        {"field": "created_at", "op": "lt", "transform": "time", "params": {"hour": 10}},
                    ]},
                    {"and": [
                        {"field": "channel", "op": "eq", "value": "TELLER"},
                        {"field": "created_at", "op": "gt", "transform": "time", "params": {"hour": 16}},
                    ]},
                ]},
                "suspect": true,
            }]),
        ),
        // High-value ATM withdrawal during dawn hours
        RuleDocument::new(
            "high_value_dawn_atm",
            json!([{
                "filter": {"and": [
                    {"field": "channel", "op": "eq", "value": "ATM"},
                    {"field": "amount", "op": "gte", "value": 1000},
                    {"field": "created_at", "op": "lt", "transform": "time", "params": {"hour": 6}},
                ]},
                "suspect": true,
            }]),
        ),
        // Repeated same-pair digital transactions in a short window
        RuleDocument::new(
            "repeated_digital_transactions",
            json!([{
                "filter": {
                    "field": "", "op": "gte", "value": 2,
                    "transform": "count_same_trx_by_channel_user_in_last_in_period",
                    "params": {"channel": ["IBK", "MBK"], "interval_minutes": 30},
                },
                "suspect": true,
            }]),
        ),
        // High-value transfer to a destination this origin has never
        // used before
        RuleDocument::new(
            "first_time_destination_high_value",
            json!([{
                "filter": {"and": [
                    {"field": "", "op": "eq", "value": 0,
                     "transform": "destination_account_frequency"},
                    {"field": "amount", "op": "gte", "value": 10000},
                ]},
                "suspect": true,
            }]),
        ),
        // Elevated-value digital-channel transaction by an older
        // customer
        RuleDocument::new(
            "elderly_high_value_digital",
            json!([{
                "filter": {"and": [
                    {"field": "origin_account.customer.age", "op": "gte", "value": 60},
                    {"field": "channel", "op": "in", "value": ["IBK", "MBK"]},
                    {"field": "amount", "op": "gte", "value": 5000},
                ]},
                "suspect": true,
            }]),
        ),
        // Burst of typical-amount transactions: at least three amounts
        // inside the 20% median band within an hour
        RuleDocument::new(
            "typical_amount_burst",
            json!([{
                "filter": {
                    "field": "", "op": "gte", "value": 3,
                    "transform": "count_same_trx_by_channel_user_in_last_in_period",
                    "params": {
                        "channel": ["ATM", "TELLER", "IBK", "MBK"],
                        "interval_minutes": 60,
                        "sensibility_variation_percentage": 0.2,
                    },
                },
                "suspect": true,
            }]),
        ),
    ]
}

/// Write the initial rules into the store (upsert by name, so reseeding
/// is idempotent). Returns how many documents were written.
pub fn seed_rules(store: &SqliteStore) -> Result<usize, RiskError> {
    let rules = initial_rules();
    for doc in &rules {
        store.save_rule(doc)?;
    }
    info!(count = rules.len(), "seeded initial rules");
    Ok(rules.len())
}
