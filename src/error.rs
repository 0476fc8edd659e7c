// Error types for the risk engine
// Two fail-loud kinds; everything soft (unresolvable field, undefined
// median) degrades inside evaluation instead of surfacing here.

use thiserror::Error;

/// Errors surfaced by rule loading and evaluation.
#[derive(Debug, Error)]
pub enum RiskError {
    /// A rule's filter expression is structurally invalid (unknown
    /// combinator key, leaf missing `op`, unknown operator or transform
    /// name). The engine treats the offending rule as inert.
    #[error("malformed rule{}: {reason}", rule_label(.rule))]
    MalformedRule {
        /// Name of the offending rule, when known at the failure site.
        rule: Option<String>,
        reason: String,
    },

    /// The backing rule or history store failed (connectivity, SQL).
    /// Never swallowed: the caller decides the fail-open/fail-closed
    /// policy for the transaction.
    #[error("store lookup failed: {0}")]
    Store(#[from] rusqlite::Error),
}

impl RiskError {
    /// Shorthand for a malformed-rule error with no rule attribution yet.
    pub fn malformed(reason: impl Into<String>) -> Self {
        RiskError::MalformedRule {
            rule: None,
            reason: reason.into(),
        }
    }

    /// Attach the rule name once it is known (the parser works on bare
    /// filter JSON; the engine knows which document it came from).
    pub fn with_rule(self, name: &str) -> Self {
        match self {
            RiskError::MalformedRule { reason, .. } => RiskError::MalformedRule {
                rule: Some(name.to_string()),
                reason,
            },
            other => other,
        }
    }
}

fn rule_label(rule: &Option<String>) -> String {
    match rule {
        Some(name) => format!(" `{}`", name),
        None => String::new(),
    }
}
