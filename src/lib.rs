// Transaction Risk Engine - Core Library
// Rule-based behavioral risk evaluation for financial transactions:
// declarative JSON rules, a recursive condition evaluator, and stateful
// transforms over transaction history.

pub mod channel;    // Channel codes and aliases
pub mod model;      // Transaction / Account / Customer
pub mod value;      // Comparison value model
pub mod filter;     // FilterExpression: rules as data
pub mod transforms; // Transform library (time, windowed counts, frequency)
pub mod evaluator;  // Recursive condition evaluator
pub mod engine;     // Risk engine (OR across all rules)
pub mod store;      // Rule/history store traits + SQLite implementation
pub mod seed;       // Initial rule set
pub mod error;      // Typed errors

// Re-export commonly used types
pub use channel::Channel;
pub use engine::{RiskEngine, Verdict};
pub use error::RiskError;
pub use filter::{Condition, ConditionBlock, FilterExpression, Rule, RuleDocument, TransformKind};
pub use model::{Account, Customer, Transaction};
pub use seed::{initial_rules, seed_rules};
pub use store::{
    HistoryStore, RuleStore, SqliteStore, TransactionGroup, KNOWN_DESTINATION_TTL_SECONDS,
};
pub use transforms::EvalContext;
pub use value::{compare, CompareOp, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
