use serde_json::Value;

use crate::models::{Condition, ConditionOp};

/// Flat AND conjunction: every condition must hold.
pub fn matches_all(record: &Value, conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|c| evaluate(record.get(&c.field), c.operator, &c.value))
}

/// Compare a stored value against a configured value. Ordering operators
/// compare numerically when both sides parse as numbers, otherwise as
/// strings; the string operators work on stringified values.
pub fn evaluate(stored: Option<&Value>, op: ConditionOp, expected: &Value) -> bool {
    let stored = stored.unwrap_or(&Value::Null);

    match op {
        ConditionOp::Eq => loose_eq(stored, expected),
        ConditionOp::Ne => !loose_eq(stored, expected),
        ConditionOp::Gt => compare(stored, expected).is_some_and(|o| o == std::cmp::Ordering::Greater),
        ConditionOp::Lt => compare(stored, expected).is_some_and(|o| o == std::cmp::Ordering::Less),
        ConditionOp::Gte => compare(stored, expected).is_some_and(|o| o != std::cmp::Ordering::Less),
        ConditionOp::Lte => compare(stored, expected).is_some_and(|o| o != std::cmp::Ordering::Greater),
        ConditionOp::Contains => as_text(stored).contains(&as_text(expected)),
        ConditionOp::StartsWith => as_text(stored).starts_with(&as_text(expected)),
        ConditionOp::EndsWith => as_text(stored).ends_with(&as_text(expected)),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    if a == b {
        return true;
    }
    as_text(a) == as_text(b)
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if a.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    Some(as_text(a).cmp(&as_text(b)))
}

pub(crate) fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
