// Filter expressions - rules as data
// Rule documents are JSON condition trees: combinator objects ({"and":
// [...]}, {"or": [...]}) over leaf conditions ({"field", "op", "value",
// "transform", "params"}). The tree is built and validated once at rule
// load, never re-interpreted from raw JSON during evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::RiskError;
use crate::value::CompareOp;

// ============================================================================
// RULE DOCUMENTS (store shape)
// ============================================================================

/// A rule as the store hands it over: a unique name and a JSON array of
/// condition blocks. Validation happens in [`Rule::compile`], so one
/// malformed document can be skipped without failing the whole listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    pub name: String,
    pub conditions: Json,
}

impl RuleDocument {
    pub fn new(name: &str, conditions: Json) -> Self {
        RuleDocument {
            name: name.to_string(),
            conditions,
        }
    }
}

// ============================================================================
// COMPILED RULES
// ============================================================================

/// A compiled rule: ordered condition blocks, any of which marks the
/// transaction suspect when its filter matches.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub blocks: Vec<ConditionBlock>,
}

/// One `{filter, suspect?}` block. The `suspect` key is preserved from
/// the document but a filter match alone decides the verdict; blocks
/// that omit it behave identically.
#[derive(Debug, Clone)]
pub struct ConditionBlock {
    pub filter: FilterExpression,
    pub suspect: Option<bool>,
}

impl Rule {
    /// Build and structurally validate a rule from its stored document.
    pub fn compile(doc: &RuleDocument) -> Result<Rule, RiskError> {
        let blocks = doc
            .conditions
            .as_array()
            .ok_or_else(|| RiskError::malformed("`conditions` must be an array of blocks"))
            .and_then(|blocks| blocks.iter().map(ConditionBlock::from_json).collect())
            .map_err(|e| e.with_rule(&doc.name))?;

        Ok(Rule {
            name: doc.name.clone(),
            blocks,
        })
    }
}

impl ConditionBlock {
    fn from_json(json: &Json) -> Result<ConditionBlock, RiskError> {
        let obj = json
            .as_object()
            .ok_or_else(|| RiskError::malformed("condition block must be an object"))?;

        let filter = obj
            .get("filter")
            .ok_or_else(|| RiskError::malformed("condition block missing `filter`"))?;

        let suspect = match obj.get("suspect") {
            None => None,
            Some(Json::Bool(b)) => Some(*b),
            Some(_) => return Err(RiskError::malformed("`suspect` must be a boolean")),
        };

        Ok(ConditionBlock {
            filter: FilterExpression::from_json(filter)?,
            suspect,
        })
    }
}

// ============================================================================
// FILTER EXPRESSION
// ============================================================================

/// Recursive boolean expression over a transaction.
///
/// `And([])` is vacuously true and `Or([])` is false - both boundary
/// cases are relied on by the evaluator.
#[derive(Debug, Clone)]
pub enum FilterExpression {
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Condition(Condition),
}

/// Leaf condition: compare a (possibly transformed) transaction-derived
/// value against a literal.
#[derive(Debug, Clone)]
pub struct Condition {
    /// Dotted field path on the transaction. May be empty for
    /// transform-only conditions.
    pub field: String,
    pub op: CompareOp,
    /// Literal comparison value. Channel names resolve to codes at
    /// evaluation time, never here.
    pub value: Option<Json>,
    pub transform: Option<TransformKind>,
    /// Transform parameters (ignored without a transform).
    pub params: Option<serde_json::Map<String, Json>>,
}

/// Closed set of transform names. Unknown names are rejected at rule
/// load instead of silently falling back to the raw field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// "today at HH:MM:SS" - computes the comparison target
    Time,
    /// Windowed count of same-pair transactions per channel, optionally
    /// restricted to a median variation band
    CountSameTrxByChannelUserInPeriod,
    /// How often this origin already transferred to this destination
    DestinationAccountFrequency,
}

impl TransformKind {
    /// Parse a transform name. A leading `!` is accepted and stripped
    /// (older rule documents wrote `!time`).
    pub fn parse(name: &str) -> Option<TransformKind> {
        match name.trim_start_matches('!') {
            "time" => Some(TransformKind::Time),
            "count_same_trx_by_channel_user_in_last_in_period" => {
                Some(TransformKind::CountSameTrxByChannelUserInPeriod)
            }
            "destination_account_frequency" => Some(TransformKind::DestinationAccountFrequency),
            _ => None,
        }
    }
}

impl FilterExpression {
    /// Parse a JSON condition tree. Purely structural: leaf value types
    /// are checked at evaluation time (channel aliases resolve late).
    ///
    /// Combinator keys are `and` / `or`; a leading `$` is accepted and
    /// stripped (`$and`, `$or`).
    pub fn from_json(json: &Json) -> Result<FilterExpression, RiskError> {
        let obj = json
            .as_object()
            .ok_or_else(|| RiskError::malformed("filter must be an object"))?;

        // Combinator detection: a single `and`/`or` key holding an array
        if let Some((key, value)) = obj.iter().next().filter(|_| obj.len() == 1) {
            match key.trim_start_matches('$') {
                combinator @ ("and" | "or") => {
                    let children = value
                        .as_array()
                        .ok_or_else(|| {
                            RiskError::malformed(format!("`{}` must hold an array", combinator))
                        })?
                        .iter()
                        .map(FilterExpression::from_json)
                        .collect::<Result<Vec<_>, _>>()?;

                    return Ok(match combinator {
                        "and" => FilterExpression::And(children),
                        _ => FilterExpression::Or(children),
                    });
                }
                _ => {}
            }
        }

        Self::leaf_from_json(obj)
    }

    fn leaf_from_json(obj: &serde_json::Map<String, Json>) -> Result<FilterExpression, RiskError> {
        let field = obj
            .get("field")
            .and_then(Json::as_str)
            .ok_or_else(|| {
                RiskError::malformed("mapping is neither a combinator nor a leaf with `field`")
            })?
            .to_string();

        let op_name = obj
            .get("op")
            .and_then(Json::as_str)
            .ok_or_else(|| RiskError::malformed("leaf condition missing `op`"))?;
        let op = CompareOp::parse(op_name)
            .ok_or_else(|| RiskError::malformed(format!("unknown operator `{}`", op_name)))?;

        let transform = match obj.get("transform") {
            None | Some(Json::Null) => None,
            Some(Json::String(name)) => Some(TransformKind::parse(name).ok_or_else(|| {
                RiskError::malformed(format!("unknown transform `{}`", name))
            })?),
            Some(_) => return Err(RiskError::malformed("`transform` must be a string")),
        };

        let params = match obj.get("params") {
            None | Some(Json::Null) => None,
            Some(Json::Object(map)) => Some(map.clone()),
            Some(_) => return Err(RiskError::malformed("`params` must be an object")),
        };

        Ok(FilterExpression::Condition(Condition {
            field,
            op,
            value: obj.get("value").cloned(),
            transform,
            params,
        }))
    }
}
