use serde_json::{Value, json};

use crate::error::EngineError;

use super::conditions::as_number;

/// Reduce one field across a filtered record set. `total` is an alias of
/// `sum`. Records whose field is absent or non-numeric are skipped for
/// the numeric reductions; `processedValues` reports how many counted.
pub fn aggregate_field(records: &[Value], field: &str, aggregator: &str) -> Result<Value, EngineError> {
    let op = aggregator.to_ascii_lowercase();
    let total_records = records.len();

    let present: Vec<&Value> = records.iter().filter_map(|r| r.get(field)).collect();

    let result = match op.as_str() {
        "count" => json!({
            "field": field,
            "aggregator": "count",
            "value": present.len(),
            "totalRecords": total_records,
            "processedValues": present.len(),
        }),
        "sum" | "total" | "avg" | "min" | "max" => {
            let numbers: Vec<f64> = present.iter().filter_map(|v| as_number(v)).collect();
            let value = match op.as_str() {
                "sum" | "total" => Some(numbers.iter().sum::<f64>()),
                "avg" => {
                    if numbers.is_empty() {
                        Some(0.0)
                    } else {
                        Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
                    }
                }
                "min" => numbers.iter().copied().reduce(f64::min),
                "max" => numbers.iter().copied().reduce(f64::max),
                _ => unreachable!(),
            };
            json!({
                "field": field,
                "aggregator": if op == "total" { "sum" } else { op.as_str() },
                "value": value,
                "totalRecords": total_records,
                "processedValues": numbers.len(),
            })
        }
        other => {
            return Err(EngineError::MalformedInput(format!(
                "Unknown aggregator: {other}"
            )));
        }
    };

    Ok(result)
}

/// One aggregation result per configured field; a single field unwraps to
/// a bare result object.
pub fn aggregate(records: &[Value], fields: &[String], aggregator: &str) -> Result<Value, EngineError> {
    let mut results = Vec::with_capacity(fields.len());
    for field in fields {
        results.push(aggregate_field(records, field, aggregator)?);
    }
    if results.len() == 1 {
        Ok(results.pop().expect("one result"))
    } else {
        Ok(Value::Array(results))
    }
}

/// Project each record to the configured field subset. Exactly one field
/// unwraps to the bare value per record rather than a single-key object.
pub fn project(record: &Value, fields: &[String]) -> Value {
    if fields.len() == 1 {
        return record.get(&fields[0]).cloned().unwrap_or(Value::Null);
    }
    let mut out = serde_json::Map::new();
    for field in fields {
        if let Some(v) = record.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    Value::Object(out)
}

pub fn project_all(records: Vec<Value>, fields: &[String]) -> Vec<Value> {
    records.iter().map(|r| project(r, fields)).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn prices() -> Vec<Value> {
        vec![json!({"price": 10}), json!({"price": 20}), json!({"price": 30})]
    }

    #[test]
    fn avg_over_prices() {
        let result = aggregate(&prices(), &["price".to_string()], "avg").unwrap();
        assert_eq!(
            result,
            json!({
                "field": "price",
                "aggregator": "avg",
                "value": 20.0,
                "totalRecords": 3,
                "processedValues": 3,
            })
        );
    }

    #[test]
    fn total_is_an_alias_of_sum() {
        let result = aggregate(&prices(), &["price".to_string()], "total").unwrap();
        assert_eq!(result["aggregator"], "sum");
        assert_eq!(result["value"], 60.0);
    }

    #[test]
    fn non_numeric_values_are_skipped() {
        let records = vec![json!({"price": 10}), json!({"price": "n/a"}), json!({})];
        let result = aggregate(&records, &["price".to_string()], "sum").unwrap();
        assert_eq!(result["value"], 10.0);
        assert_eq!(result["totalRecords"], 3);
        assert_eq!(result["processedValues"], 1);
    }

    #[test]
    fn min_max_empty_set_is_null() {
        let result = aggregate(&[], &["price".to_string()], "min").unwrap();
        assert_eq!(result["value"], Value::Null);
    }

    #[test]
    fn multiple_fields_yield_an_array() {
        let records = vec![json!({"a": 1, "b": 2})];
        let result =
            aggregate(&records, &["a".to_string(), "b".to_string()], "sum").unwrap();
        assert!(result.is_array());
        assert_eq!(result.as_array().unwrap().len(), 2);
    }

    #[test]
    fn unknown_aggregator_is_rejected() {
        assert!(aggregate(&prices(), &["price".to_string()], "median").is_err());
    }

    #[test]
    fn single_field_projection_unwraps() {
        let record = json!({"id": "r1", "name": "x", "price": 5});
        assert_eq!(project(&record, &["name".to_string()]), json!("x"));
        assert_eq!(
            project(&record, &["name".to_string(), "price".to_string()]),
            json!({"name": "x", "price": 5})
        );
    }
}
