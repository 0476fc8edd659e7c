// Transaction, Account and Customer records
// The engine treats a transaction as read-only input; `suspect` is the
// single field it ever writes. Rule conditions address fields by dotted
// path ("origin_account.customer.age"), resolved here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::value::Value;

/// Customer owning one or more accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub age: i64,
}

/// Bank account. Unique per (agency, account) - enforced by the store
/// schema, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub agency: i64,
    pub account: i64,
    pub customer: Customer,
}

/// A financial transaction between two accounts.
///
/// Immutable once evaluated. `amount` must be > 0 (CHECK constraint in
/// the store schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub channel: Channel,
    /// Risk verdict. Engine output; defaults to false.
    #[serde(default)]
    pub suspect: bool,
    pub origin_account: Account,
    pub destination_account: Account,
}

impl Transaction {
    /// Resolve a dotted field path against this transaction.
    ///
    /// Returns None for paths that do not exist - rule authors may
    /// reference placeholder fields (`field: ""`) on transform-only
    /// conditions, and an unresolvable leaf must evaluate false rather
    /// than abort the rule tree.
    pub fn resolve_field(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;

        match head {
            "id" => leaf(parts, Value::Int(self.id)),
            "created_at" => leaf(parts, Value::DateTime(self.created_at)),
            "amount" => leaf(parts, Value::Number(self.amount)),
            "channel" => leaf(parts, Value::Channel(self.channel)),
            "suspect" => leaf(parts, Value::Bool(self.suspect)),
            "origin_account" => self.origin_account.resolve_field(parts),
            "destination_account" => self.destination_account.resolve_field(parts),
            _ => None,
        }
    }
}

impl Account {
    fn resolve_field<'a>(&self, mut parts: impl Iterator<Item = &'a str>) -> Option<Value> {
        match parts.next()? {
            "id" => leaf(parts, Value::Int(self.id)),
            "agency" => leaf(parts, Value::Int(self.agency)),
            "account" => leaf(parts, Value::Int(self.account)),
            "customer" => self.customer.resolve_field(parts),
            _ => None,
        }
    }
}

impl Customer {
    fn resolve_field<'a>(&self, mut parts: impl Iterator<Item = &'a str>) -> Option<Value> {
        match parts.next()? {
            "id" => leaf(parts, Value::Int(self.id)),
            "name" => leaf(parts, Value::Str(self.name.clone())),
            "age" => leaf(parts, Value::Int(self.age)),
            _ => None,
        }
    }
}

/// A path segment only resolves if it is the last one.
fn leaf<'a>(mut rest: impl Iterator<Item = &'a str>, value: Value) -> Option<Value> {
    match rest.next() {
        Some(_) => None,
        None => Some(value),
    }
}
