// Runtime value model - what a condition actually compares
// Rule documents are plain JSON; transaction fields are typed. Both sides
// meet here, with the cross-type coercions the rules need: integer vs
// decimal, channel name vs stored code, datetime vs time-of-day.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::channel::Channel;

/// Comparison operators allowed in a leaf condition.
/// Parsed at rule-load time; an unknown name is a malformed rule, not a
/// silent `false` at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
    Gte,
    Lte,
    In,
}

impl CompareOp {
    /// Parse an operator name. A leading `$` is accepted and stripped
    /// (older rule documents wrote `$eq`, `$lt`, ...).
    pub fn parse(name: &str) -> Option<CompareOp> {
        match name.trim_start_matches('$') {
            "eq" => Some(CompareOp::Eq),
            "lt" => Some(CompareOp::Lt),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lte" => Some(CompareOp::Lte),
            "in" => Some(CompareOp::In),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Lt => "lt",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lte => "lte",
            CompareOp::In => "in",
        }
    }
}

/// A value on either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Number(Decimal),
    Str(String),
    Bool(bool),
    Channel(Channel),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    /// Convert a rule-document JSON value. Objects and nulls have no
    /// comparable representation and yield None (objects only appear as
    /// transform params, which are read separately).
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    // serde_json renders the number exactly; Decimal
                    // parses it without binary-float rounding
                    n.to_string().parse::<Decimal>().ok().map(Value::Number)
                }
            }
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => Some(Value::List(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            _ => None,
        }
    }

    /// Time-of-day view, when this value is temporal (or a string that
    /// spells a time, e.g. "09:30" / "09:30:00").
    fn as_time_of_day(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            Value::DateTime(dt) => Some(dt.time()),
            Value::Str(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok(),
            _ => None,
        }
    }
}

/// Apply a comparison operator. Incomparable kinds never flag a
/// transaction: the result is simply false.
pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    if op == CompareOp::In {
        return match rhs {
            Value::List(items) => items.iter().any(|item| compare(CompareOp::Eq, lhs, item)),
            _ => false,
        };
    }

    let Some(ordering) = coerced_cmp(lhs, rhs) else {
        return false;
    };

    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        // membership handled above
        CompareOp::In => false,
    }
}

/// Ordering with the late coercions the rule DSL relies on:
/// - integers and decimals compare numerically;
/// - channel codes match channel names and aliases;
/// - when both sides are temporal they are reduced to time-of-day, so a
///   "before 10:00" rule works regardless of calendar date.
fn coerced_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    use Value::*;

    match (lhs, rhs) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Number(a), Number(b)) => Some(a.cmp(b)),
        (Int(a), Number(b)) => Some(Decimal::from(*a).cmp(b)),
        (Number(a), Int(b)) => Some(a.cmp(&Decimal::from(*b))),
        (Str(a), Str(b)) => Some(a.cmp(b)),
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (Channel(a), Channel(b)) => Some(a.code().cmp(&b.code())),
        (Channel(a), Int(code)) => Some(a.code().cmp(code)),
        (Int(code), Channel(b)) => Some(code.cmp(&b.code())),
        (Channel(a), Str(name)) => {
            crate::channel::Channel::parse(name).map(|c| a.code().cmp(&c.code()))
        }
        (Str(name), Channel(b)) => {
            crate::channel::Channel::parse(name).map(|c| c.code().cmp(&b.code()))
        }
        _ => match (lhs.as_time_of_day(), rhs.as_time_of_day()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_int_decimal_coercion() {
        let thousand = Value::Int(1000);
        let amount = Value::Number(Decimal::new(100000, 2)); // 1000.00
        assert!(compare(CompareOp::Eq, &amount, &thousand));
        assert!(compare(CompareOp::Gte, &amount, &thousand));
        assert!(!compare(CompareOp::Gt, &amount, &thousand));
    }

    #[test]
    fn test_channel_name_and_alias_match_code() {
        let stored = Value::Channel(Channel::InternetBanking);
        assert!(compare(CompareOp::Eq, &stored, &Value::Str("IBK".into())));
        assert!(compare(
            CompareOp::Eq,
            &stored,
            &Value::Str("INTERNET_BANKING".into())
        ));
        assert!(compare(CompareOp::Eq, &stored, &Value::Int(3)));
        assert!(!compare(CompareOp::Eq, &stored, &Value::Str("ATM".into())));
    }

    #[test]
    fn test_unknown_channel_name_is_false_not_error() {
        let stored = Value::Channel(Channel::Atm);
        assert!(!compare(
            CompareOp::Eq,
            &stored,
            &Value::Str("CARRIER_PIGEON".into())
        ));
    }

    #[test]
    fn test_in_membership_with_channel_names() {
        let stored = Value::Channel(Channel::MobileBanking);
        let digital = Value::List(vec![Value::Str("IBK".into()), Value::Str("MBK".into())]);
        assert!(compare(CompareOp::In, &stored, &digital));

        let branch = Value::List(vec![Value::Str("ATM".into()), Value::Str("TELLER".into())]);
        assert!(!compare(CompareOp::In, &stored, &branch));
    }

    #[test]
    fn test_in_against_non_list_is_false() {
        assert!(!compare(CompareOp::In, &Value::Int(1), &Value::Int(1)));
    }

    #[test]
    fn test_both_temporal_reduce_to_time_of_day() {
        // Different calendar dates, same clock time window
        let created = Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        let cutoff = Value::DateTime(Utc.with_ymd_and_hms(2026, 8, 23, 10, 0, 0).unwrap());
        assert!(compare(CompareOp::Lt, &created, &cutoff));
        assert!(!compare(CompareOp::Gt, &created, &cutoff));
    }

    #[test]
    fn test_datetime_against_time_string() {
        let created = Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap());
        assert!(compare(CompareOp::Gt, &created, &Value::Str("10:00".into())));
        assert!(compare(
            CompareOp::Lt,
            &created,
            &Value::Str("16:00:00".into())
        ));
    }

    #[test]
    fn test_incomparable_kinds_are_false() {
        assert!(!compare(CompareOp::Eq, &Value::Int(1), &Value::Str("1".into())));
        assert!(!compare(CompareOp::Lt, &Value::Bool(true), &Value::Int(1)));
    }

    #[test]
    fn test_from_json_keeps_decimal_exact() {
        let v = Value::from_json(&serde_json::json!(0.2)).unwrap();
        assert_eq!(v, Value::Number("0.2".parse::<Decimal>().unwrap()));
    }

    #[test]
    fn test_op_parse_accepts_dollar_prefix() {
        assert_eq!(CompareOp::parse("$eq"), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("gte"), Some(CompareOp::Gte));
        assert_eq!(CompareOp::parse("between"), None);
    }
}
