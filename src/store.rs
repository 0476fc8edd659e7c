// Rule and history stores
// The engine only sees the two traits; SqliteStore implements both over
// one connection. Schema follows the original relational layout:
// customer 1:N account, transactions referencing origin/destination
// accounts, plus the known-destinations cache and the rules collection
// (JSON documents in a TEXT column).

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::error::RiskError;
use crate::filter::RuleDocument;
use crate::model::Transaction;

/// Known-destination records expire after 30 days (the original cache
/// used a TTL index with this lifetime).
pub const KNOWN_DESTINATION_TTL_SECONDS: i64 = 2_592_000;

/// One grouped row of matching history: how many times this exact
/// (channel, amount, destination, origin) combination occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionGroup {
    pub channel: i64,
    pub amount: Decimal,
    pub destination_account_id: i64,
    pub origin_account_id: i64,
    pub count: i64,
}

/// Supplies rule documents. Read fresh on every evaluation, so rule
/// updates take effect without an engine restart.
pub trait RuleStore {
    fn list_rules(&self) -> Result<Vec<RuleDocument>, RiskError>;
}

/// Read-only transaction history, queried by transforms. Lookback is
/// always bounded by the caller (`since`), keeping query cost
/// proportional to the window.
pub trait HistoryStore {
    /// Count past transactions between the two accounts over the given
    /// channels since `since`, grouped by (channel, amount, destination,
    /// origin).
    fn count_transactions_by_channel_and_accounts(
        &self,
        channels: &[i64],
        since: DateTime<Utc>,
        origin_account_id: i64,
        destination_account_id: i64,
    ) -> Result<Vec<TransactionGroup>, RiskError>;

    /// How many live (non-expired) known-destination records exist for
    /// this origin/destination pair. 0 means a never-seen destination.
    fn count_known_destination_pairs(
        &self,
        origin_account_id: i64,
        destination_account_id: i64,
    ) -> Result<i64, RiskError>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed rule + history store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wrap an open connection. Call [`SqliteStore::setup_schema`] once
    /// per database.
    pub fn new(conn: Connection) -> Self {
        SqliteStore { conn }
    }

    /// Open an in-memory database with the schema applied. Test and
    /// demo convenience.
    pub fn open_in_memory() -> Result<Self, RiskError> {
        let store = SqliteStore::new(Connection::open_in_memory()?);
        store.setup_schema()?;
        Ok(store)
    }

    pub fn setup_schema(&self) -> Result<(), RiskError> {
        // WAL for concurrent readers during evaluation
        self.conn.pragma_update(None, "journal_mode", "WAL")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS customer (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agency INTEGER NOT NULL,
                account INTEGER NOT NULL,
                customer_id INTEGER NOT NULL REFERENCES customer(id) ON DELETE CASCADE,
                UNIQUE (agency, account)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                amount TEXT NOT NULL CHECK (CAST(amount AS REAL) > 0),
                channel INTEGER NOT NULL,
                suspect INTEGER NOT NULL DEFAULT 0,
                origin_account_id INTEGER NOT NULL REFERENCES account(id),
                destination_account_id INTEGER NOT NULL REFERENCES account(id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS known_destinations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                origin_user INTEGER NOT NULL,
                destination_user INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                conditions TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_accounts_created
             ON transactions(origin_account_id, destination_account_id, created_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_known_destinations_pair
             ON known_destinations(origin_user, destination_user, created_at)",
            [],
        )?;

        Ok(())
    }

    pub fn insert_customer(&self, name: &str, age: i64) -> Result<i64, RiskError> {
        self.conn.execute(
            "INSERT INTO customer (name, age) VALUES (?1, ?2)",
            params![name, age],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_account(&self, agency: i64, account: i64, customer_id: i64) -> Result<i64, RiskError> {
        self.conn.execute(
            "INSERT INTO account (agency, account, customer_id) VALUES (?1, ?2, ?3)",
            params![agency, account, customer_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Persist a transaction (history for later evaluations). The
    /// engine itself never writes; callers insert after evaluation.
    pub fn insert_transaction(&self, trx: &Transaction) -> Result<i64, RiskError> {
        self.conn.execute(
            "INSERT INTO transactions (
                created_at, amount, channel, suspect,
                origin_account_id, destination_account_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                fmt_ts(trx.created_at),
                trx.amount.to_string(),
                trx.channel.code(),
                trx.suspect,
                trx.origin_account.id,
                trx.destination_account.id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Remember that this origin transferred to this destination.
    pub fn record_known_destination(
        &self,
        origin_account_id: i64,
        destination_account_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        self.conn.execute(
            "INSERT INTO known_destinations (origin_user, destination_user, created_at)
             VALUES (?1, ?2, ?3)",
            params![origin_account_id, destination_account_id, fmt_ts(seen_at)],
        )?;
        Ok(())
    }

    /// Delete known-destination records past their TTL. SQLite has no
    /// TTL index; queries also bound on `created_at`, so purging is
    /// housekeeping, not correctness.
    pub fn purge_expired_destinations(&self, now: DateTime<Utc>) -> Result<usize, RiskError> {
        let cutoff = now - Duration::seconds(KNOWN_DESTINATION_TTL_SECONDS);
        let deleted = self.conn.execute(
            "DELETE FROM known_destinations WHERE created_at <= ?1",
            params![fmt_ts(cutoff)],
        )?;
        Ok(deleted)
    }

    /// Insert or replace a rule document by name.
    pub fn save_rule(&self, doc: &RuleDocument) -> Result<(), RiskError> {
        self.conn.execute(
            "INSERT INTO rules (name, conditions) VALUES (?1, ?2)
             ON CONFLICT (name) DO UPDATE SET conditions = excluded.conditions",
            params![doc.name, doc.conditions.to_string()],
        )?;
        Ok(())
    }
}

impl RuleStore for SqliteStore {
    fn list_rules(&self) -> Result<Vec<RuleDocument>, RiskError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, conditions FROM rules ORDER BY id")?;

        let rules = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let conditions_json: String = row.get(1)?;
                // Invalid JSON compiles to a malformed rule later; keep
                // the listing itself infallible per document
                let conditions =
                    serde_json::from_str(&conditions_json).unwrap_or(serde_json::Value::Null);
                Ok(RuleDocument { name, conditions })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rules)
    }
}

impl HistoryStore for SqliteStore {
    fn count_transactions_by_channel_and_accounts(
        &self,
        channels: &[i64],
        since: DateTime<Utc>,
        origin_account_id: i64,
        destination_account_id: i64,
    ) -> Result<Vec<TransactionGroup>, RiskError> {
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; channels.len()].join(", ");
        let sql = format!(
            "SELECT channel, amount, destination_account_id, origin_account_id, COUNT(id)
             FROM transactions
             WHERE channel IN ({placeholders})
               AND created_at > ?
               AND origin_account_id = ?
               AND destination_account_id = ?
             GROUP BY channel, amount, destination_account_id, origin_account_id"
        );

        let mut bind: Vec<rusqlite::types::Value> =
            channels.iter().map(|c| (*c).into()).collect();
        bind.push(fmt_ts(since).into());
        bind.push(origin_account_id.into());
        bind.push(destination_account_id.into());

        let mut stmt = self.conn.prepare(&sql)?;
        let groups = stmt
            .query_map(rusqlite::params_from_iter(bind), |row| {
                let amount_text: String = row.get(1)?;
                Ok(TransactionGroup {
                    channel: row.get(0)?,
                    amount: amount_text.parse::<Decimal>().map_err(|_| {
                        rusqlite::Error::InvalidColumnType(
                            1,
                            "amount".to_string(),
                            rusqlite::types::Type::Text,
                        )
                    })?,
                    destination_account_id: row.get(2)?,
                    origin_account_id: row.get(3)?,
                    count: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    fn count_known_destination_pairs(
        &self,
        origin_account_id: i64,
        destination_account_id: i64,
    ) -> Result<i64, RiskError> {
        let cutoff = Utc::now() - Duration::seconds(KNOWN_DESTINATION_TTL_SECONDS);
        let count = self.conn.query_row(
            "SELECT COUNT(id) FROM known_destinations
             WHERE origin_user = ?1 AND destination_user = ?2 AND created_at > ?3",
            params![origin_account_id, destination_account_id, fmt_ts(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Fixed-width RFC3339 so lexicographic TEXT comparison matches
/// chronological order.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::model::tests::test_transaction;
    use serde_json::json;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let customer = store.insert_customer("John Doe", 30).unwrap();
        store.insert_account(123, 456, customer).unwrap();
        store.insert_account(123, 789, customer).unwrap();
        store
    }

    fn history_transaction(amount: i64, channel: Channel, minutes_ago: i64) -> Transaction {
        let mut trx = test_transaction(amount, channel);
        trx.created_at = Utc::now() - Duration::minutes(minutes_ago);
        trx
    }

    #[test]
    fn test_grouped_history_count() {
        let store = seeded_store();
        // three at 100, one at 1000, all IBK within the window
        for amount in [100, 100, 100, 1000] {
            store
                .insert_transaction(&history_transaction(amount, Channel::InternetBanking, 5))
                .unwrap();
        }
        // outside the window
        store
            .insert_transaction(&history_transaction(100, Channel::InternetBanking, 90))
            .unwrap();
        // wrong channel
        store
            .insert_transaction(&history_transaction(100, Channel::Atm, 5))
            .unwrap();

        let since = Utc::now() - Duration::minutes(30);
        let groups = store
            .count_transactions_by_channel_and_accounts(
                &[Channel::InternetBanking.code()],
                since,
                1,
                2,
            )
            .unwrap();

        assert_eq!(groups.len(), 2);
        let hundred = groups
            .iter()
            .find(|g| g.amount == Decimal::from(100))
            .unwrap();
        assert_eq!(hundred.count, 3);
        let thousand = groups
            .iter()
            .find(|g| g.amount == Decimal::from(1000))
            .unwrap();
        assert_eq!(thousand.count, 1);
    }

    #[test]
    fn test_empty_channel_list_returns_no_groups() {
        let store = seeded_store();
        let groups = store
            .count_transactions_by_channel_and_accounts(&[], Utc::now(), 1, 2)
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_known_destination_count_and_ttl() {
        let store = seeded_store();
        assert_eq!(store.count_known_destination_pairs(1, 2).unwrap(), 0);

        store.record_known_destination(1, 2, Utc::now()).unwrap();
        store
            .record_known_destination(1, 2, Utc::now() - Duration::days(10))
            .unwrap();
        // past the 30-day TTL: neither counted nor kept after a purge
        store
            .record_known_destination(1, 2, Utc::now() - Duration::days(45))
            .unwrap();
        // different pair
        store.record_known_destination(1, 99, Utc::now()).unwrap();

        assert_eq!(store.count_known_destination_pairs(1, 2).unwrap(), 2);

        let purged = store.purge_expired_destinations(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.count_known_destination_pairs(1, 2).unwrap(), 2);
    }

    #[test]
    fn test_rule_round_trip_and_upsert() {
        let store = seeded_store();
        let doc = RuleDocument::new(
            "dawn_atm",
            json!([{"filter": {"field": "amount", "op": "gte", "value": 1000}}]),
        );
        store.save_rule(&doc).unwrap();

        let listed = store.list_rules().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "dawn_atm");
        assert_eq!(listed[0].conditions, doc.conditions);

        // upsert by name replaces the conditions
        let updated = RuleDocument::new(
            "dawn_atm",
            json!([{"filter": {"field": "amount", "op": "gte", "value": 5000}}]),
        );
        store.save_rule(&updated).unwrap();
        let listed = store.list_rules().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].conditions, updated.conditions);
    }

    #[test]
    fn test_amount_check_constraint() {
        let store = seeded_store();
        let mut trx = test_transaction(100, Channel::Atm);
        trx.amount = Decimal::from(0);
        assert!(matches!(
            store.insert_transaction(&trx),
            Err(RiskError::Store(_))
        ));
    }
}
