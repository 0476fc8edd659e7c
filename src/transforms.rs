// Transform library
// Transforms compute derived values in place of a raw field read: a
// normalized "today at HH:MM:SS" instant, a windowed count of repeated
// transactions, or the frequency of an origin/destination pairing.
//
// Degradation contract: missing params or not enough data for a median
// yield a safe 0 (risk evaluation must not crash transaction
// processing); a failing store is a real error and propagates.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::channel::Channel;
use crate::error::RiskError;
use crate::filter::{Condition, TransformKind};
use crate::model::Transaction;
use crate::store::HistoryStore;
use crate::value::Value;

/// Evaluation-scoped context. `now` is captured once per engine call so
/// every time computation within one evaluation sees the same instant.
pub struct EvalContext<'a> {
    pub history: &'a dyn HistoryStore,
    pub now: DateTime<Utc>,
}

/// Run a transform for a leaf condition. `Ok(None)` means the transform
/// could not produce a value (e.g. nonsensical time params) and the leaf
/// evaluates false.
pub fn apply(
    kind: TransformKind,
    ctx: &EvalContext,
    trx: &Transaction,
    cond: &Condition,
) -> Result<Option<Value>, RiskError> {
    match kind {
        TransformKind::Time => Ok(today_at(ctx, cond)),
        TransformKind::CountSameTrxByChannelUserInPeriod => {
            windowed_count(ctx, trx, cond).map(|n| Some(Value::Int(n)))
        }
        TransformKind::DestinationAccountFrequency => {
            let count = ctx
                .history
                .count_known_destination_pairs(trx.origin_account.id, trx.destination_account.id)?;
            Ok(Some(Value::Int(count)))
        }
    }
}

/// `time`: today (relative to the evaluation instant) at the
/// hour/minute/second given in `params` (or in `value`, for rule
/// documents that wrote the components there).
fn today_at(ctx: &EvalContext, cond: &Condition) -> Option<Value> {
    let components = cond
        .params
        .as_ref()
        .map(|p| Json::Object(p.clone()))
        .or_else(|| cond.value.clone())?;
    let obj = components.as_object()?;

    let hour = component(obj, "hour")?;
    let minute = component(obj, "minute")?;
    let second = component(obj, "second")?;

    let naive = ctx.now.date_naive().and_hms_opt(hour, minute, second)?;
    Some(Value::DateTime(DateTime::from_naive_utc_and_offset(
        naive,
        Utc,
    )))
}

/// A time component, defaulting to 0 when absent. Out-of-range or
/// non-integer values poison the whole transform (None).
fn component(obj: &serde_json::Map<String, Json>, key: &str) -> Option<u32> {
    match obj.get(key) {
        None => Some(0),
        Some(v) => v.as_u64().and_then(|n| u32::try_from(n).ok()),
    }
}

/// `count_same_trx_by_channel_user_in_last_in_period`: count the
/// transactions between this pair of accounts over the given channels
/// within the last `interval_minutes`. With a
/// `sensibility_variation_percentage`, only amounts inside the inclusive
/// median band `[median*(1-p), median*(1+p)]` count - repeated
/// typical-amount transactions, with one-off outliers excluded.
fn windowed_count(
    ctx: &EvalContext,
    trx: &Transaction,
    cond: &Condition,
) -> Result<i64, RiskError> {
    let Some(params) = cond.params.as_ref() else {
        return Ok(0);
    };

    let channels: Vec<i64> = match params.get("channel").and_then(Json::as_array) {
        Some(names) => names
            .iter()
            .filter_map(Json::as_str)
            .filter_map(Channel::parse)
            .map(|c| c.code())
            .collect(),
        None => return Ok(0),
    };

    let Some(interval_minutes) = params.get("interval_minutes").and_then(Json::as_i64) else {
        return Ok(0);
    };

    let since = ctx.now - Duration::minutes(interval_minutes);
    let groups = ctx.history.count_transactions_by_channel_and_accounts(
        &channels,
        since,
        trx.origin_account.id,
        trx.destination_account.id,
    )?;

    // Flat multiset of amounts, each repeated by its occurrence count
    let mut amounts: Vec<Decimal> = Vec::new();
    for group in &groups {
        for _ in 0..group.count {
            amounts.push(group.amount);
        }
    }

    let variation = params
        .get("sensibility_variation_percentage")
        .and_then(json_decimal);

    match variation {
        None => Ok(amounts.len() as i64),
        Some(p) => {
            let Some(median) = median(&mut amounts) else {
                // no data, no median: zero matches by design
                return Ok(0);
            };
            let low = median * (Decimal::ONE - p);
            let high = median * (Decimal::ONE + p);
            Ok(amounts.iter().filter(|a| **a >= low && **a <= high).count() as i64)
        }
    }
}

/// Median over the (sorted-in-place) amounts; None when empty.
fn median(amounts: &mut [Decimal]) -> Option<Decimal> {
    if amounts.is_empty() {
        return None;
    }
    amounts.sort();
    let mid = amounts.len() / 2;
    if amounts.len() % 2 == 1 {
        Some(amounts[mid])
    } else {
        Some((amounts[mid - 1] + amounts[mid]) / Decimal::from(2))
    }
}

fn json_decimal(json: &Json) -> Option<Decimal> {
    match Value::from_json(json)? {
        Value::Int(i) => Some(Decimal::from(i)),
        Value::Number(d) => Some(d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::test_transaction;
    use crate::store::TransactionGroup;
    use crate::value::CompareOp;
    use serde_json::json;

    struct StubHistory {
        groups: Vec<TransactionGroup>,
        pair_count: i64,
    }

    impl StubHistory {
        fn empty() -> Self {
            StubHistory {
                groups: Vec::new(),
                pair_count: 0,
            }
        }

        fn with_amounts(counted: &[(i64, i64)]) -> Self {
            StubHistory {
                groups: counted
                    .iter()
                    .map(|(amount, count)| TransactionGroup {
                        channel: Channel::InternetBanking.code(),
                        amount: Decimal::from(*amount),
                        destination_account_id: 2,
                        origin_account_id: 1,
                        count: *count,
                    })
                    .collect(),
                pair_count: 0,
            }
        }
    }

    impl HistoryStore for StubHistory {
        fn count_transactions_by_channel_and_accounts(
            &self,
            _channels: &[i64],
            _since: DateTime<Utc>,
            _origin_account_id: i64,
            _destination_account_id: i64,
        ) -> Result<Vec<TransactionGroup>, RiskError> {
            Ok(self.groups.clone())
        }

        fn count_known_destination_pairs(
            &self,
            _origin_account_id: i64,
            _destination_account_id: i64,
        ) -> Result<i64, RiskError> {
            Ok(self.pair_count)
        }
    }

    fn condition(transform: TransformKind, params: Json) -> Condition {
        Condition {
            field: String::new(),
            op: CompareOp::Gte,
            value: None,
            transform: Some(transform),
            params: params.as_object().cloned(),
        }
    }

    fn ctx<'a>(history: &'a StubHistory) -> EvalContext<'a> {
        EvalContext {
            history,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_time_transform_is_today_at_given_time() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::Teller);
        let cond = condition(TransformKind::Time, json!({"hour": 10, "minute": 30}));

        let Some(Value::DateTime(at)) = apply(TransformKind::Time, &ctx, &trx, &cond).unwrap()
        else {
            panic!("expected a datetime");
        };
        assert_eq!(at.date_naive(), ctx.now.date_naive());
        assert_eq!(at.time(), chrono::NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn test_time_transform_idempotent_within_evaluation() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::Teller);
        let cond = condition(TransformKind::Time, json!({"hour": 23, "minute": 59, "second": 59}));

        let first = apply(TransformKind::Time, &ctx, &trx, &cond).unwrap();
        let second = apply(TransformKind::Time, &ctx, &trx, &cond).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_time_transform_reads_components_from_value() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::Teller);
        let cond = Condition {
            field: "created_at".to_string(),
            op: CompareOp::Lt,
            value: Some(json!({"hour": 6})),
            transform: Some(TransformKind::Time),
            params: None,
        };

        let Some(Value::DateTime(at)) = apply(TransformKind::Time, &ctx, &trx, &cond).unwrap()
        else {
            panic!("expected a datetime");
        };
        assert_eq!(at.time(), chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn test_time_transform_invalid_components_yield_none() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::Teller);
        let cond = condition(TransformKind::Time, json!({"hour": 25}));
        assert_eq!(apply(TransformKind::Time, &ctx, &trx, &cond).unwrap(), None);
    }

    #[test]
    fn test_windowed_count_without_variation_is_total() {
        let history = StubHistory::with_amounts(&[(100, 3), (1000, 1)]);
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::InternetBanking);
        let cond = condition(
            TransformKind::CountSameTrxByChannelUserInPeriod,
            json!({"channel": ["IBK", "MBK"], "interval_minutes": 30}),
        );

        let result = apply(TransformKind::CountSameTrxByChannelUserInPeriod, &ctx, &trx, &cond)
            .unwrap();
        assert_eq!(result, Some(Value::Int(4)));
    }

    #[test]
    fn test_variation_band_excludes_outlier() {
        // amounts [100, 100, 100, 1000], median 100, band [80, 120]
        let history = StubHistory::with_amounts(&[(100, 3), (1000, 1)]);
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::InternetBanking);
        let cond = condition(
            TransformKind::CountSameTrxByChannelUserInPeriod,
            json!({
                "channel": ["IBK"],
                "interval_minutes": 30,
                "sensibility_variation_percentage": 0.2
            }),
        );

        let result = apply(TransformKind::CountSameTrxByChannelUserInPeriod, &ctx, &trx, &cond)
            .unwrap();
        assert_eq!(result, Some(Value::Int(3)));
    }

    #[test]
    fn test_empty_history_median_degrades_to_zero() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::InternetBanking);
        let cond = condition(
            TransformKind::CountSameTrxByChannelUserInPeriod,
            json!({
                "channel": ["IBK"],
                "interval_minutes": 30,
                "sensibility_variation_percentage": 0.2
            }),
        );

        let result = apply(TransformKind::CountSameTrxByChannelUserInPeriod, &ctx, &trx, &cond)
            .unwrap();
        assert_eq!(result, Some(Value::Int(0)));
    }

    #[test]
    fn test_missing_params_degrade_to_zero() {
        let history = StubHistory::with_amounts(&[(100, 3)]);
        let ctx = ctx(&history);
        let trx = test_transaction(100, Channel::InternetBanking);

        for params in [json!({}), json!({"channel": ["IBK"]}), json!({"interval_minutes": 30})] {
            let cond = condition(TransformKind::CountSameTrxByChannelUserInPeriod, params);
            let result =
                apply(TransformKind::CountSameTrxByChannelUserInPeriod, &ctx, &trx, &cond)
                    .unwrap();
            assert_eq!(result, Some(Value::Int(0)));
        }
    }

    #[test]
    fn test_destination_frequency_zero_for_new_pair() {
        let history = StubHistory::empty();
        let ctx = ctx(&history);
        let trx = test_transaction(10000, Channel::InternetBanking);
        let cond = condition(TransformKind::DestinationAccountFrequency, json!({}));

        let result =
            apply(TransformKind::DestinationAccountFrequency, &ctx, &trx, &cond).unwrap();
        assert_eq!(result, Some(Value::Int(0)));
    }

    #[test]
    fn test_destination_frequency_counts_pairs() {
        let history = StubHistory {
            groups: Vec::new(),
            pair_count: 7,
        };
        let ctx = ctx(&history);
        let trx = test_transaction(10000, Channel::InternetBanking);
        let cond = condition(TransformKind::DestinationAccountFrequency, json!({}));

        let result =
            apply(TransformKind::DestinationAccountFrequency, &ctx, &trx, &cond).unwrap();
        assert_eq!(result, Some(Value::Int(7)));
    }

    #[test]
    fn test_median_even_and_odd() {
        let mut odd = vec![Decimal::from(3), Decimal::from(1), Decimal::from(2)];
        assert_eq!(median(&mut odd), Some(Decimal::from(2)));

        let mut even = vec![
            Decimal::from(100),
            Decimal::from(100),
            Decimal::from(100),
            Decimal::from(1000),
        ];
        assert_eq!(median(&mut even), Some(Decimal::from(100)));

        let mut empty: Vec<Decimal> = Vec::new();
        assert_eq!(median(&mut empty), None);
    }
}
