// Condition evaluator
// Recursive walk over a compiled filter expression against a single
// transaction. Short-circuits combinators, fails closed on unresolvable
// leaves, and propagates store failures untouched.

use crate::error::RiskError;
use crate::filter::{Condition, FilterExpression, TransformKind};
use crate::model::Transaction;
use crate::transforms::{self, EvalContext};
use crate::value::{self, Value};

/// Evaluate a filter expression. `And([])` is true, `Or([])` is false.
pub fn evaluate(
    expr: &FilterExpression,
    trx: &Transaction,
    ctx: &EvalContext,
) -> Result<bool, RiskError> {
    match expr {
        FilterExpression::And(children) => {
            for child in children {
                if !evaluate(child, trx, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        FilterExpression::Or(children) => {
            for child in children {
                if evaluate(child, trx, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        FilterExpression::Condition(cond) => evaluate_condition(cond, trx, ctx),
    }
}

/// Evaluate one leaf.
///
/// Operand convention: the `time` transform computes the comparison
/// target (right-hand side) against the transaction's field; every other
/// transform computes the subject (left-hand side) compared against the
/// literal `value`. Without a transform, field vs literal. A leaf whose
/// field does not resolve - and no transform supplies a subject - is
/// false, never an error.
fn evaluate_condition(
    cond: &Condition,
    trx: &Transaction,
    ctx: &EvalContext,
) -> Result<bool, RiskError> {
    let field_value = if cond.field.is_empty() {
        None
    } else {
        trx.resolve_field(&cond.field)
    };

    if let Some(kind) = cond.transform {
        let Some(computed) = transforms::apply(kind, ctx, trx, cond)? else {
            return Ok(false);
        };

        return Ok(match kind {
            TransformKind::Time => match field_value {
                Some(lhs) => value::compare(cond.op, &lhs, &computed),
                None => false,
            },
            _ => match cond.value.as_ref().and_then(Value::from_json) {
                Some(rhs) => value::compare(cond.op, &computed, &rhs),
                None => false,
            },
        });
    }

    let literal = cond.value.as_ref().and_then(Value::from_json);
    match (field_value, literal) {
        (Some(lhs), Some(rhs)) => Ok(value::compare(cond.op, &lhs, &rhs)),
        _ => Ok(false),
    }
}
