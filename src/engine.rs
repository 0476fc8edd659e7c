// Risk engine
// Iterates every rule's condition blocks and flags the transaction on
// the first matching filter - a pure OR across all rules, no priority or
// scoring. Rules are fetched fresh on every call, so updated documents
// take effect immediately; malformed documents are skipped with a
// warning instead of aborting the decision.

use chrono::{DateTime, Utc};

use crate::error::RiskError;
use crate::evaluator;
use crate::filter::Rule;
use crate::model::Transaction;
use crate::store::{HistoryStore, RuleStore};
use crate::transforms::EvalContext;

/// Outcome of one evaluation: the suspect flag plus, for observability,
/// which rule matched (None when clean).
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub suspect: bool,
    pub matched_rule: Option<String>,
}

impl Verdict {
    fn clean() -> Self {
        Verdict {
            suspect: false,
            matched_rule: None,
        }
    }

    fn matched(rule: &str) -> Self {
        Verdict {
            suspect: true,
            matched_rule: Some(rule.to_string()),
        }
    }
}

/// Rule-based risk evaluator. Holds no mutable state; both stores are
/// injected, so concurrent evaluations against different rule sets are
/// just different engine values.
pub struct RiskEngine<'a> {
    rules: &'a dyn RuleStore,
    history: &'a dyn HistoryStore,
}

impl<'a> RiskEngine<'a> {
    pub fn new(rules: &'a dyn RuleStore, history: &'a dyn HistoryStore) -> Self {
        RiskEngine { rules, history }
    }

    /// Evaluate a transaction against the current rule set.
    pub fn evaluate(&self, trx: &Transaction) -> Result<Verdict, RiskError> {
        self.evaluate_at(trx, Utc::now())
    }

    /// Evaluate with an explicit "now" - every time computation in this
    /// call sees the same instant.
    pub fn evaluate_at(&self, trx: &Transaction, now: DateTime<Utc>) -> Result<Verdict, RiskError> {
        let ctx = EvalContext {
            history: self.history,
            now,
        };

        for doc in self.rules.list_rules()? {
            let rule = match Rule::compile(&doc) {
                Ok(rule) => rule,
                Err(err) => {
                    tracing::warn!(rule = %doc.name, error = %err, "skipping malformed rule");
                    continue;
                }
            };

            for block in &rule.blocks {
                if evaluator::evaluate(&block.filter, trx, &ctx)? {
                    tracing::info!(
                        rule = %rule.name,
                        transaction = trx.id,
                        "transaction flagged as suspect"
                    );
                    return Ok(Verdict::matched(&rule.name));
                }
            }
        }

        Ok(Verdict::clean())
    }

    /// Evaluate and write the verdict onto the transaction's `suspect`
    /// flag - the only field the engine ever writes.
    pub fn evaluate_and_mark(&self, trx: &mut Transaction) -> Result<Verdict, RiskError> {
        let verdict = self.evaluate(trx)?;
        trx.suspect = verdict.suspect;
        Ok(verdict)
    }
}
